//! Command-line interface.
//!
//! Every flag can also come from a `PROBE_*` environment variable, which is
//! handy when the probe runs from a Zabbix external-check wrapper.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::error;

use crate::config::parse::{duration_value, port_value};
use crate::config::{BrokerConfig, ConfigError, Credentials, ProbeConfig, DEFAULT_DESTINATION};
use crate::probe::ProbeStatus;

/// Round-trip health check for a STOMP broker (ActiveMQ, RabbitMQ, ...).
///
/// Sends a uniquely numbered message to a queue and reads it back. Exits 0
/// if the message comes back before the timeout, 1 otherwise.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stomp-probe",
    version,
    after_help = "Example:\n  stomp-probe --host 127.0.0.1 --port 61613 --queue zabbix.health"
)]
pub struct Cli {
    /// Broker host name or address
    #[arg(long, env = "PROBE_HOST")]
    pub host: Option<String>,

    /// Broker STOMP port
    #[arg(long, env = "PROBE_PORT")]
    pub port: Option<String>,

    /// Login for the broker (optional)
    #[arg(long, env = "PROBE_USERNAME")]
    pub username: Option<String>,

    /// Passcode for the broker (optional)
    #[arg(long, env = "PROBE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Queue the probe message goes through
    #[arg(long, env = "PROBE_QUEUE", default_value = DEFAULT_DESTINATION)]
    pub queue: String,

    /// Ask the broker to persist the probe message (off by default, it is
    /// only a health check)
    #[arg(long, env = "PROBE_PERSISTENT")]
    pub persistent: bool,

    /// How long to wait for the message to come back (e.g. 10s, 500ms, 1m)
    #[arg(long, env = "PROBE_TIMEOUT", default_value = "10s")]
    pub timeout: String,

    /// Bound on connecting and the STOMP handshake
    #[arg(long, env = "PROBE_CONNECT_TIMEOUT", default_value = "5s")]
    pub connect_timeout: String,
}

impl Cli {
    /// Validate the flags and build the probe configuration.
    pub fn into_config(self) -> Result<ProbeConfig, ConfigError> {
        let host = self
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing { key: "host".into() })?;
        let port = self
            .port
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing { key: "port".into() })?;
        let port = port_value("port", &port)?;

        if self.queue.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "queue".into(),
                message: "queue name must not be empty".into(),
            });
        }

        let mut broker = BrokerConfig::new(host.trim(), port)
            .with_connect_timeout(duration_value("connect-timeout", &self.connect_timeout)?);
        if let Some(login) = self.username.filter(|u| !u.is_empty()) {
            broker = broker.with_credentials(Credentials::new(
                login,
                self.password.unwrap_or_default(),
            ));
        }

        Ok(ProbeConfig::new(broker)
            .with_destination(self.queue)
            .with_durable(self.persistent)
            .with_deadline(duration_value("timeout", &self.timeout)?))
    }

    /// Build the configuration or report why the probe can't start.
    ///
    /// A missing host or port prints usage; other mistakes are logged.
    /// Either way the check counts as failed.
    pub fn into_config_or_status(self) -> Result<ProbeConfig, ProbeStatus> {
        match self.into_config() {
            Ok(config) => Ok(config),
            Err(ConfigError::Missing { .. }) => {
                let _ = Cli::command().print_help();
                Err(ProbeStatus::Failed)
            }
            Err(e) => {
                error!("{}", e);
                Err(ProbeStatus::Failed)
            }
        }
    }
}

/// Exit status for a command line clap refused to parse.
///
/// `--help` and `--version` are not failures.
pub fn parse_error_status(err: &clap::Error) -> ProbeStatus {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ProbeStatus::Passed,
        _ => ProbeStatus::Failed,
    }
}
