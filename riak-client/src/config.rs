//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via RIAK_CONFIG or --config)
//! 3. Environment variables

use riak_protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cluster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Nodes to connect to.
    pub nodes: Vec<NodeConfig>,
    /// Security settings. When present every connection performs the
    /// StartTLS and authentication handshake.
    pub auth: Option<AuthConfig>,
    /// How many times a retryable failure is re-attempted.
    pub retries: u32,
    /// Pause between attempts in milliseconds.
    pub retry_wait_ms: u64,
    /// How often offline nodes are probed, in milliseconds.
    pub health_check_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: vec![NodeConfig::default()],
            auth: None,
            retries: 3,
            retry_wait_ms: 200,
            health_check_interval_ms: 5000,
        }
    }
}

impl ClusterConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("RIAK_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClusterConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Creates a single-node configuration.
    pub fn single(node: NodeConfig) -> Self {
        Self {
            nodes: vec![node],
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Node-level variables apply to the first node.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.nodes.is_empty() {
            self.nodes.push(NodeConfig::default());
        }
        self.nodes[0].apply_overrides(&var);

        if let Some(retries) = var("RIAK_RETRIES").and_then(|v| v.parse().ok()) {
            self.retries = retries;
        }
        if let Some(wait) = var("RIAK_RETRY_WAIT_MS").and_then(|v| v.parse().ok()) {
            self.retry_wait_ms = wait;
        }

        if let Some(username) = var("RIAK_USERNAME") {
            self.auth.get_or_insert_with(AuthConfig::default).username = username;
        }
        if let Some(auth) = self.auth.as_mut() {
            auth.apply_overrides(&var);
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one node must be configured".to_string(),
            ));
        }
        for node in &self.nodes {
            node.validate()?;
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }
}

/// Settings for a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Display name, used in logs.
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Number of pooled connections. Zero opens a connection per operation.
    pub pool_size: usize,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// The address is a load balancer; never take it out of rotation.
    pub external_load_balancer: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "riak@127.0.0.1".to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            pool_size: 30,
            connect_timeout_ms: 4000,
            read_timeout_ms: 4000,
            write_timeout_ms: 4000,
            external_load_balancer: false,
        }
    }
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            name: format!("riak@{}", host),
            host,
            port,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_external_load_balancer(mut self, enabled: bool) -> Self {
        self.external_load_balancer = enabled;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("RIAK_HOST") {
            self.host = host;
        }
        if let Some(port) = var("RIAK_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(size) = var("RIAK_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.pool_size = size;
        }
        if let Some(ms) = var("RIAK_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = var("RIAK_READ_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.read_timeout_ms = ms;
        }
        if let Some(ms) = var("RIAK_WRITE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.write_timeout_ms = ms;
        }
        if let Some(lb) = var("RIAK_EXTERNAL_LOAD_BALANCER") {
            self.external_load_balancer = lb == "1" || lb.to_lowercase() == "true";
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "node '{}' has no host",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "node '{}' has port 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Security settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// Path to PEM-encoded client certificate.
    pub client_cert_path: Option<PathBuf>,
    /// Path to PEM-encoded client private key.
    pub client_key_path: Option<PathBuf>,
    /// Path to PEM-encoded CA certificate(s). Falls back to the webpki roots.
    pub ca_cert_path: Option<PathBuf>,
    /// Reject server certificates listed in `crl_path`.
    pub check_certificate_revocation: bool,
    /// Path to PEM-encoded certificate revocation list(s).
    pub crl_path: Option<PathBuf>,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn with_client_cert(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.client_cert_path = Some(cert_path.into());
        self.client_key_path = Some(key_path.into());
        self
    }

    pub fn with_revocation_check(mut self, crl_path: impl Into<PathBuf>) -> Self {
        self.check_certificate_revocation = true;
        self.crl_path = Some(crl_path.into());
        self
    }

    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(password) = var("RIAK_PASSWORD") {
            self.password = password;
        }
        if let Some(path) = var("RIAK_CA_CERT") {
            self.ca_cert_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("RIAK_CLIENT_CERT") {
            self.client_cert_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("RIAK_CLIENT_KEY") {
            self.client_key_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth configured but username not set".to_string(),
            ));
        }
        if self.client_cert_path.is_some() != self.client_key_path.is_some() {
            return Err(ConfigError::ValidationError(
                "client_cert_path and client_key_path must be set together".to_string(),
            ));
        }
        if self.check_certificate_revocation && self.crl_path.is_none() {
            return Err(ConfigError::ValidationError(
                "certificate revocation check enabled but crl_path not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
