//! stomp_probe - round-trip health check for STOMP message brokers.
//!
//! The probe connects to a broker, sends a uniquely numbered `text/plain`
//! message to a queue, subscribes to the same queue and waits for that
//! message to come back. The process exits 0 if it does within the
//! deadline and 1 otherwise, which is all a Zabbix-style external check
//! needs.
//!
//! # Architecture
//!
//! - [`probe`] - the round trip itself: token, completion gate, listener
//!   and deadline tasks, reporting
//! - [`broker`] - the session interface the probe is written against
//! - [`stomp`] - that interface implemented over an `iridium_stomp` connection
//! - [`config`], [`cli`], [`logging`] - process wiring
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stomp_probe::config::{BrokerConfig, ProbeConfig};
//! use stomp_probe::logging::TracingLogger;
//! use stomp_probe::probe::{report, Prober};
//! use stomp_probe::stomp::StompConnector;
//!
//! let config = ProbeConfig::new(BrokerConfig::new("127.0.0.1", 61613));
//! let log = Arc::new(TracingLogger);
//! let result = Prober::new(StompConnector::new(), log.clone()).run(&config).await;
//! std::process::exit(report(&result, log.as_ref()).code() as i32);
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty when built outside a checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

pub mod broker;
pub mod cli;
pub mod config;
pub mod logging;
pub mod probe;
pub mod stomp;

// Re-exports for convenience
pub use config::ProbeConfig;
pub use probe::{report, ProbeOutcome, ProbeStatus, Prober};
