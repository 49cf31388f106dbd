//! Probe and broker connection configuration.

use std::fmt;
use std::time::Duration;

/// Deadline for the round trip, measured from publish.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Bound on TCP connect plus the CONNECT/CONNECTED handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Queue used when none is given.
pub const DEFAULT_DESTINATION: &str = "zabbix.health";

/// Broker login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub passcode: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, passcode: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            passcode: passcode.into(),
        }
    }
}

// Keep the passcode out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("passcode", &"***")
            .finish()
    }
}

/// Where and how to reach the broker.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub connect_timeout: Duration,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Immutable input to a single probe run.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub broker: BrokerConfig,
    /// Queue the probe message is sent to and read back from.
    pub destination: String,
    /// Ask the broker to persist the probe message.
    pub durable: bool,
    pub deadline: Duration,
}

impl ProbeConfig {
    pub fn new(broker: BrokerConfig) -> Self {
        Self {
            broker,
            destination: DEFAULT_DESTINATION.to_string(),
            durable: false,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::debug;

        debug!("Configuration loaded:");
        debug!("  Broker: {}", self.broker.address());
        debug!("  Destination: {}", self.destination);
        debug!("  Persistent: {}", self.durable);
        debug!("  Deadline: {:?}", self.deadline);
        debug!("  Connect timeout: {:?}", self.broker.connect_timeout);
        if let Some(ref creds) = self.broker.credentials {
            debug!("  Login: {}", creds.login);
        }
    }
}
