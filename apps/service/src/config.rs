use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::catalog::{Endpoint, EndpointCatalog, default_endpoints};
use crate::error::ConfigError;
use crate::monitoring::validation::{
    validate_check_interval, validate_concurrency, validate_http_target, validate_run_deadline,
    validate_timeout,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between runs in `watch` mode
    pub interval_seconds: u64,
    /// Per-probe timeout
    pub timeout_seconds: u64,
    /// Probes allowed in flight at once
    pub max_concurrency: usize,
    /// Upper bound for a whole run; unset means no bound
    pub run_deadline_seconds: Option<u64>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            timeout_seconds: 30,
            max_concurrency: 8,
            run_deadline_seconds: Some(240),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
    pub pool_size: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "uppe-uptime.db".into(), pool_size: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSourceKind {
    Env,
    File,
}

impl fmt::Display for SecretSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSourceKind::Env => write!(f, "env"),
            SecretSourceKind::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// When false, transitions are only logged
    pub enabled: bool,
    pub webhook_url: String,
    pub recipient: String,
    /// Id handed to the secret source to obtain the webhook credential
    pub secret_id: String,
    pub secret_source: SecretSourceKind,
    /// Directory holding secret files when `secret_source = "file"`
    pub secret_dir: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            recipient: String::new(),
            secret_id: "UPPE_ALERT_TOKEN".into(),
            secret_source: SecretSourceKind::Env,
            secret_dir: None,
            timeout_seconds: 10,
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/uptime.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Ok(home_dir) = env::var("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/uptime.toml"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorSettings::default(),
            database: DatabaseSettings::default(),
            alert: AlertSettings::default(),
            endpoints: default_endpoints(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let deadline = match self.monitor.run_deadline_seconds {
            Some(seconds) => format!("{seconds}s"),
            None => "none".to_string(),
        };

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Interval", &format!("{}s", self.monitor.interval_seconds))?;
        write_1(f, "Probe Timeout", &format!("{}s", self.monitor.timeout_seconds))?;
        write_1(f, "Max Concurrency", &self.monitor.max_concurrency)?;
        write_1(f, "Run Deadline", &deadline)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Alert")?;
        write_1(f, "Enabled", &self.alert.enabled)?;
        write_1(f, "Webhook", &self.alert.webhook_url)?;
        write_1(f, "Recipient", &self.alert.recipient)?;
        write_1(f, "Secret", &format!("{} ({})", self.alert.secret_id, self.alert.secret_source))?;
        write_title_1(f, "Endpoints")?;
        for endpoint in &self.endpoints {
            write_1(f, &endpoint.name, &endpoint.url)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/uptime.toml
    ///  or the specified path if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::ReadFailed { path: config_path.display().to_string(), source }
            })?;
            toml::from_str(raw_string.as_str()).map_err(|source| ConfigError::ParseFailed {
                path: config_path.display().to_string(),
                source,
            })?
        } else {
            tracing::info!("No config at {}, writing defaults", config_path.display());
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        let write_failed =
            |source| ConfigError::WriteFailed { path: path.display().to_string(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Reject settings that would make every run misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;
        validate_check_interval(monitor.interval_seconds).map_err(ConfigError::Invalid)?;
        validate_timeout(monitor.timeout_seconds).map_err(ConfigError::Invalid)?;
        validate_concurrency(monitor.max_concurrency).map_err(ConfigError::Invalid)?;
        if let Some(deadline) = monitor.run_deadline_seconds {
            validate_run_deadline(deadline, monitor.timeout_seconds).map_err(ConfigError::Invalid)?;
        }

        if self.database.pool_size == 0 {
            return Err(ConfigError::Invalid(anyhow::anyhow!("database.pool_size must be at least 1")));
        }

        if self.alert.enabled {
            validate_http_target(&self.alert.webhook_url)
                .map_err(|e| ConfigError::Invalid(e.context("alert.webhook_url")))?;
            if self.alert.secret_id.is_empty() {
                return Err(ConfigError::Invalid(anyhow::anyhow!("alert.secret_id is empty")));
            }
            if self.alert.secret_source == SecretSourceKind::File && self.alert.secret_dir.is_none() {
                return Err(ConfigError::Invalid(anyhow::anyhow!(
                    "alert.secret_dir is required when alert.secret_source = \"file\""
                )));
            }
        }

        self.catalog()?;
        Ok(())
    }

    /// The validated endpoint catalog for this configuration
    pub fn catalog(&self) -> Result<EndpointCatalog, ConfigError> {
        Ok(EndpointCatalog::new(self.endpoints.clone())?)
    }
}
