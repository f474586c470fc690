//! Pool configuration: identity, credentials, and `racf-pool.toml` parsing.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Default telnet port for TN3270 hosts.
pub const DEFAULT_PORT: u16 = 23;
/// Default connection implementation.
pub const DEFAULT_CONNECTION_CLASS: &str = "tn3270";
/// Sessions idle longer than this are logged out by the reaper (default: 300s).
pub const DEFAULT_IDLE_REAP_THRESHOLD: Duration = Duration::from_secs(300);
/// Per-command timeout; also paces the close-all drain loop (default: 10s).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
/// Reaper tick period (default: 60s).
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Key identifying a pool: one pool per target host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey(String);

impl PoolKey {
    pub fn new(host: &str) -> Self {
        Self(host.to_string())
    }

    pub fn host(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A password that never shows up in logs.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One credential slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_name: String,
    pub password: Secret,
}

impl Credential {
    pub fn new(user_name: &str, password: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            password: Secret::new(password),
        }
    }
}

/// Everything that defines a pool. Immutable once a pool is built from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfiguration {
    pub host: String,
    pub port: u16,
    /// Ordered credential slots; slot `i` is `credentials[i]`.
    pub credentials: Vec<Credential>,
    pub connect_script: Option<String>,
    pub disconnect_script: Option<String>,
    /// Selects the session implementation (e.g. `tn3270`).
    pub connection_class: String,
    pub idle_reap_threshold: Duration,
    pub command_timeout: Duration,
}

impl PoolConfiguration {
    /// Minimal configuration with defaults for everything but host and credentials.
    pub fn new(host: &str, credentials: Vec<Credential>) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            credentials,
            connect_script: None,
            disconnect_script: None,
            connection_class: DEFAULT_CONNECTION_CLASS.to_string(),
            idle_reap_threshold: DEFAULT_IDLE_REAP_THRESHOLD,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn key(&self) -> PoolKey {
        PoolKey::new(&self.host)
    }

    pub fn slot_count(&self) -> usize {
        self.credentials.len()
    }

    /// Whether a pool built from `other` would be interchangeable with one
    /// built from `self`.
    ///
    /// Reap threshold and command timeout are tuning knobs and do not count.
    pub fn same_identity(&self, other: &PoolConfiguration) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.credentials == other.credentials
            && self.connect_script == other.connect_script
            && self.disconnect_script == other.disconnect_script
            && self.connection_class == other.connection_class
    }

    pub fn with_port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    pub fn with_scripts(self, connect: Option<String>, disconnect: Option<String>) -> Self {
        Self {
            connect_script: connect,
            disconnect_script: disconnect,
            ..self
        }
    }

    pub fn with_connection_class(self, connection_class: &str) -> Self {
        Self {
            connection_class: connection_class.to_string(),
            ..self
        }
    }

    pub fn with_idle_reap_threshold(self, idle_reap_threshold: Duration) -> Self {
        Self {
            idle_reap_threshold,
            ..self
        }
    }

    pub fn with_command_timeout(self, command_timeout: Duration) -> Self {
        Self {
            command_timeout,
            ..self
        }
    }

    /// Reject configurations no pool could be built from.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.credentials.is_empty() {
            bail!("at least one credential is required for {}", self.host);
        }
        if let Some(index) = self
            .credentials
            .iter()
            .position(|c| c.user_name.trim().is_empty())
        {
            bail!("credential {index} for {} has an empty user name", self.host);
        }
        Ok(())
    }

    /// Load and validate a `racf-pool.toml` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let file: PoolConfigFile = toml::from_str(content)?;
        file.into_configuration()
    }
}

/// Registry-wide settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrySettings {
    pub reap_interval: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

// ── File model ──────────────────────────────────────────────────────

/// On-disk shape of `racf-pool.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfigFile {
    pub host: String,
    pub port: Option<u16>,
    pub connection_class: Option<String>,
    pub connect_script: Option<String>,
    pub disconnect_script: Option<String>,
    pub idle_reap_threshold: Option<String>,
    pub command_timeout: Option<String>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl PoolConfigFile {
    pub fn into_configuration(self) -> anyhow::Result<PoolConfiguration> {
        let idle_reap_threshold = match self.idle_reap_threshold.as_deref() {
            Some(s) => parse_duration(s).context("idle_reap_threshold")?,
            None => DEFAULT_IDLE_REAP_THRESHOLD,
        };
        let command_timeout = match self.command_timeout.as_deref() {
            Some(s) => parse_duration(s).context("command_timeout")?,
            None => DEFAULT_COMMAND_TIMEOUT,
        };

        let config = PoolConfiguration {
            host: self.host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            credentials: self.credentials,
            connect_script: self.connect_script,
            disconnect_script: self.disconnect_script,
            connection_class: self
                .connection_class
                .unwrap_or_else(|| DEFAULT_CONNECTION_CLASS.to_string()),
            idle_reap_threshold,
            command_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse `"250ms"`, `"30s"`, `"5m"` or a bare number of seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().map(Duration::from_secs)
    };
    parsed.with_context(|| format!("invalid duration {s:?}"))
}
