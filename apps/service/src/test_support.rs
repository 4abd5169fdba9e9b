//! Fakes and fixtures shared by the unit tests.

use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::{TempDir, tempdir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::alert::{AlertTransport, SecretSource};
use crate::catalog::{Endpoint, EndpointCatalog};
use crate::database::{HistoryStore, LibsqlStore, StateStore, open_store};
use crate::monitoring::checker::Checker;
use crate::monitoring::types::{ProbeResult, StatusMap};

pub fn endpoint_for(name: &str) -> Endpoint {
    Endpoint::new(name, format!("https://{name}.example.com/"))
}

pub fn catalog_of(names: &[&str]) -> EndpointCatalog {
    EndpointCatalog::new(names.iter().map(|name| endpoint_for(name)).collect()).unwrap()
}

pub fn result_with(name: &str, success: bool) -> ProbeResult {
    let endpoint = endpoint_for(name);
    let now = SystemTime::now();
    let took = Duration::from_millis(42);
    if success {
        ProbeResult::success(&endpoint, now, took)
    } else {
        ProbeResult::unexpected_status(&endpoint, 503, "Service Unavailable", now, took)
    }
}

/// Temporary on-disk LibSQL store with the schema applied
///
/// The returned directory must outlive the store.
pub async fn create_test_store() -> Result<(LibsqlStore, TempDir)> {
    let dir = tempdir()?;
    let path = dir.path().join("uptime.db");
    let store = open_store(&path.to_string_lossy(), 4).await?;
    Ok((store, dir))
}

/// Checker answering from a script instead of the network
#[derive(Default)]
pub struct ScriptedChecker {
    failing: Mutex<HashSet<String>>,
    slow: HashMap<String, Duration>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl ScriptedChecker {
    /// Endpoints listed with `false` fail with a 500; everything else succeeds
    pub fn new(outcomes: &[(&str, bool)]) -> Self {
        let failing = outcomes
            .iter()
            .filter(|(_, success)| !success)
            .map(|(name, _)| name.to_string())
            .collect();
        Self { failing: Mutex::new(failing), ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_slow(mut self, name: &str, delay: Duration) -> Self {
        self.slow.insert(name.to_string(), delay);
        self
    }

    /// Change which endpoints fail from the next check on
    pub fn set_failing(&self, names: &[&str]) {
        *self.failing.lock().unwrap() = names.iter().map(|name| name.to_string()).collect();
    }
}

#[async_trait::async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, endpoint: &Endpoint) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = self.slow.get(&endpoint.name).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let tested_at = SystemTime::now();
        let fails = self.failing.lock().unwrap().contains(&endpoint.name);
        if fails {
            ProbeResult::unexpected_status(endpoint, 500, "Internal Server Error", tested_at, delay)
        } else {
            ProbeResult::success(endpoint, tested_at, delay)
        }
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<StatusMap>,
}

impl MemoryStateStore {
    pub fn snapshot(&self) -> StatusMap {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, name: &str) -> Result<Option<ProbeResult>> {
        Ok(self.entries.lock().unwrap().get(name).cloned())
    }

    async fn put(&self, name: &str, result: &ProbeResult) -> Result<()> {
        self.entries.lock().unwrap().insert(name.to_string(), result.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<ProbeResult>>,
}

impl MemoryHistoryStore {
    pub fn records(&self) -> Vec<ProbeResult> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, result: &ProbeResult) -> Result<()> {
        self.records.lock().unwrap().push(result.clone());
        Ok(())
    }
}

/// Store whose every operation fails
pub struct FailingStore;

#[async_trait::async_trait]
impl StateStore for FailingStore {
    async fn get(&self, _name: &str) -> Result<Option<ProbeResult>> {
        Err(anyhow!("state store unavailable"))
    }

    async fn put(&self, _name: &str, _result: &ProbeResult) -> Result<()> {
        Err(anyhow!("state store unavailable"))
    }
}

#[async_trait::async_trait]
impl HistoryStore for FailingStore {
    async fn append(&self, _result: &ProbeResult) -> Result<()> {
        Err(anyhow!("history store unavailable"))
    }
}

/// Transport recording every (credential, subject, body) it is asked to send
#[derive(Default)]
pub struct CountingTransport {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl CountingTransport {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AlertTransport for CountingTransport {
    async fn send(&self, credential: &str, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((credential.to_string(), subject.to_string(), body.to_string()));
        if self.fail { Err(anyhow!("webhook rejected the message")) } else { Ok(()) }
    }
}

pub struct StaticSecret(Option<String>);

impl StaticSecret {
    pub fn ok(value: &str) -> Self {
        Self(Some(value.to_string()))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

#[async_trait::async_trait]
impl SecretSource for StaticSecret {
    async fn get_secret(&self, id: &str) -> Result<String> {
        self.0.clone().ok_or_else(|| anyhow!("secret {id} not found"))
    }
}

/// Read one HTTP/1.1 request, headers plus a Content-Length body
async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(String::from_utf8_lossy(&buffer).into_owned());
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Local server answering every request with `status` and `body`
pub async fn spawn_http_server(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                respond(&mut socket, status, body).await;
            });
        }
    });

    format!("http://{addr}/")
}

/// Local server promising a 100-byte 200 body, sending 5 bytes and hanging up
pub async fn spawn_truncating_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let response = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/")
}

/// Local server that hands the first raw request back to the test
pub async fn spawn_capturing_server(status: u16) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let request = read_request(&mut socket).await.unwrap_or_default();
            let _ = tx.send(request);
            respond(&mut socket, status, "").await;
        }
    });

    (format!("http://{addr}/alerts"), rx)
}

/// Local server that accepts connections and never answers
pub async fn spawn_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/")
}

/// URL of a local port nothing listens on
pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}
