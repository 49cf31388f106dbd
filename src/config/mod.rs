//! Configuration module for stomp_probe.
//!
//! Probe settings come from command-line flags (see [`crate::cli`]), each of
//! which can also be supplied through an environment variable. Logging is
//! configured from the environment only.
//!
//! # Example
//!
//! ```rust,ignore
//! use stomp_probe::config::{BrokerConfig, ProbeConfig};
//!
//! let config = ProbeConfig::new(BrokerConfig::new("127.0.0.1", 61613))
//!     .with_destination("zabbix.health")
//!     .with_durable(true);
//! ```

mod error;
mod logging;
pub(crate) mod parse;
mod probe;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use probe::{
    BrokerConfig, Credentials, ProbeConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DEADLINE,
    DEFAULT_DESTINATION,
};
