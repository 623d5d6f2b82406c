//! Pool and connection-target configuration.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;
use crate::row::Value;

/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_SIZE: u32 = 10;

/// Default port used when the target does not name one.
pub const DEFAULT_PORT: u16 = 50000;

/// Default transport protocol keyword.
pub const DEFAULT_PROTOCOL: &str = "TCPIP";

/// The database the pool connects to.
///
/// Renders to the `KEY=value;` descriptor handed to the pool primitive and
/// the direct provider. Both `Display` and `Debug` mask the password.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionTarget {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport protocol keyword (e.g. `TCPIP`).
    pub protocol: String,
    /// Database name.
    pub database: String,
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Additional driver options, emitted after the standard keys.
    pub options: BTreeMap<String, String>,
}

impl Default for ConnectionTarget {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            protocol: DEFAULT_PROTOCOL.to_string(),
            database: String::new(),
            user: None,
            password: None,
            options: BTreeMap::new(),
        }
    }
}

impl ConnectionTarget {
    /// Create a target with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `KEY=value;` connection string.
    ///
    /// ```text
    /// DATABASE=sample;HOSTNAME=db.local;PORT=50000;PROTOCOL=TCPIP;UID=app;PWD=secret;
    /// ```
    ///
    /// Keys are case-insensitive. Unrecognized keys are kept as driver
    /// options.
    pub fn from_connection_string(conn_str: &str) -> Result<Self, ConfigError> {
        let mut target = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part.split_once('=').ok_or_else(|| {
                ConfigError::InvalidConnectionString(format!("invalid key-value: {part}"))
            })?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "hostname" | "host" | "server" => {
                    target.host = value.to_string();
                }
                "port" => {
                    target.port = value.parse().map_err(|_| {
                        ConfigError::InvalidConnectionString(format!("invalid port: {value}"))
                    })?;
                }
                "protocol" => {
                    target.protocol = value.to_string();
                }
                "database" | "dbname" => {
                    target.database = value.to_string();
                }
                "uid" | "user" | "user id" => {
                    target.user = Some(value.to_string());
                }
                "pwd" | "password" => {
                    target.password = Some(value.to_string());
                }
                _ => {
                    tracing::debug!(key = %key, "keeping unrecognized connection option");
                    target.options.insert(key.to_uppercase(), value.to_string());
                }
            }
        }

        Ok(target)
    }

    /// Render the descriptor passed to the driver. Contains the password.
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        self.render(false)
    }

    /// Render the descriptor with the password replaced by `***`.
    #[must_use]
    pub fn masked(&self) -> String {
        self.render(true)
    }

    fn render(&self, mask: bool) -> String {
        let mut out = format!(
            "DATABASE={};HOSTNAME={};PORT={};PROTOCOL={};",
            self.database, self.host, self.port, self.protocol
        );
        if let Some(user) = &self.user {
            out.push_str(&format!("UID={user};"));
        }
        if let Some(password) = &self.password {
            if mask {
                out.push_str("PWD=***;");
            } else {
                out.push_str(&format!("PWD={password};"));
            }
        }
        for (key, value) in &self.options {
            out.push_str(&format!("{key}={value};"));
        }
        out
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the transport protocol keyword.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set user name and password.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Add a driver option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into().to_uppercase(), value.into());
        self
    }

    /// Validate the target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingDatabase);
        }
        Ok(())
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("options", &self.options)
            .finish()
    }
}

/// Liveness probe settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProbeConfig {
    /// Side-effect-free statement to run.
    pub statement: String,
    /// Column holding the expected value. `None` means the row must have
    /// exactly one column.
    pub column: Option<String>,
    /// Literal the probe must return.
    pub expected: Value,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            statement: "SELECT 1 AS \"1\" FROM SYSIBM.SYSDUMMY1".to_string(),
            column: Some("1".to_string()),
            expected: Value::Int(1),
        }
    }
}

impl ProbeConfig {
    /// Set the probe statement.
    #[must_use]
    pub fn statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = statement.into();
        self
    }

    /// Set the column to read, or `None` for a single-column row.
    #[must_use]
    pub fn column(mut self, column: Option<String>) -> Self {
        self.column = column;
        self
    }

    /// Set the expected literal.
    #[must_use]
    pub fn expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = expected.into();
        self
    }
}

/// Configuration for a [`PoolManager`](crate::PoolManager).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of pooled connections.
    pub max_size: u32,
    /// Database the pool and the direct provider connect to.
    pub target: ConnectionTarget,
    /// Liveness probe settings.
    pub probe: ProbeConfig,
    /// Discard the pool primitive after draining, so a restart builds a
    /// fresh one instead of reinitializing the old instance.
    pub replace_on_restart: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            target: ConnectionTarget::default(),
            probe: ProbeConfig::default(),
            replace_on_restart: false,
        }
    }
}

impl PoolConfig {
    /// Create a configuration for the given target.
    #[must_use]
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Set the maximum pool size.
    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the liveness probe.
    #[must_use]
    pub fn probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Rebuild the primitive on every restart.
    #[must_use]
    pub fn replace_on_restart(mut self, enabled: bool) -> Self {
        self.replace_on_restart = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        if self.probe.statement.trim().is_empty() {
            return Err(ConfigError::EmptyProbeStatement);
        }
        self.target.validate()
    }
}
