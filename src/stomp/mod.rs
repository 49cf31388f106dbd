//! STOMP broker sessions.
//!
//! Implements [`Connector`](crate::broker::Connector) and
//! [`BrokerSession`](crate::broker::BrokerSession) on top of
//! [`iridium_stomp::Connection`], which owns the socket, the frame codec and
//! the CONNECT handshake. This layer adds what the probe needs on top:
//! per-subscription delivery queues, ERROR fan-out, and closing every
//! subscription when the connection goes away.
//!
//! # Example
//!
//! ```rust,ignore
//! use stomp_probe::broker::{AckMode, BrokerSession, Connector, PublishOptions};
//! use stomp_probe::config::BrokerConfig;
//! use stomp_probe::stomp::StompConnector;
//!
//! let session = StompConnector::new()
//!     .connect(&BrokerConfig::new("127.0.0.1", 61613))
//!     .await?;
//! let mut sub = session.subscribe("zabbix.health", AckMode::Auto).await?;
//! session
//!     .publish("zabbix.health", "text/plain", b"42", PublishOptions::default())
//!     .await?;
//! let msg = sub.next_message().await;
//! session.disconnect().await?;
//! ```

mod session;

pub use session::{StompConnector, StompSession, SUBSCRIPTION_BUFFER};
