use anyhow::{Context, Result, anyhow, bail};
use std::path::{Component, Path, PathBuf};

/// Looks up a secret value by id
#[async_trait::async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(&self, id: &str) -> Result<String>;
}

/// Secret id names an environment variable
#[derive(Debug, Default)]
pub struct EnvSecretSource;

#[async_trait::async_trait]
impl SecretSource for EnvSecretSource {
    async fn get_secret(&self, id: &str) -> Result<String> {
        let value = std::env::var(id).map_err(|e| anyhow!("environment variable {id}: {e}"))?;
        if value.is_empty() {
            bail!("environment variable {id} is empty");
        }
        Ok(value)
    }
}

/// Secret id names a file inside a directory, e.g. a mounted secrets volume
#[derive(Debug)]
pub struct FileSecretSource {
    dir: PathBuf,
}

impl FileSecretSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl SecretSource for FileSecretSource {
    async fn get_secret(&self, id: &str) -> Result<String> {
        let relative = Path::new(id);
        let plain = relative.components().all(|part| matches!(part, Component::Normal(_)));
        if id.is_empty() || !plain {
            bail!("secret id {id:?} must be a plain file name");
        }

        let path = self.dir.join(relative);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading secret file {}", path.display()))?;

        let value = raw.trim_end_matches(['\r', '\n']).to_string();
        if value.is_empty() {
            bail!("secret file {} is empty", path.display());
        }
        Ok(value)
    }
}
