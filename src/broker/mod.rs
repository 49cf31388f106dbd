//! Message broker session abstraction.
//!
//! The probe only needs a handful of operations from the messaging layer:
//! connect, publish, subscribe, read the next delivery, and tear down.
//! [`Connector`] and [`BrokerSession`] capture exactly that, so the probe
//! core can run against the STOMP client in [`crate::stomp`] or an
//! in-memory double in tests.
//!
//! ```text
//! Connector::connect ──▶ BrokerSession ──publish──▶ broker
//!                              │
//!                              └─subscribe──▶ Subscription ◀── deliveries
//! ```
//!
//! Unsubscribing closes the local [`Subscription`]: its
//! [`next_message`](Subscription::next_message) returns `None` from then on.

mod error;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::BrokerConfig;

pub use error::{BrokerError, BrokerResult};

/// Content type of the probe payload.
pub const TEXT_PLAIN: &str = "text/plain";

/// How deliveries are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// The broker considers a message consumed once it is sent.
    Auto,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
        }
    }
}

/// Per-message publish flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Ask the broker to persist the message.
    pub durable: bool,
}

/// One delivery read from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Set when the broker reported an error instead of a message.
    pub error: Option<String>,
}

impl IncomingMessage {
    pub fn new(content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            body: body.into(),
            error: None,
        }
    }

    /// A delivery that carries only a broker-side error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content_type: None,
            body: Bytes::new(),
            error: Some(message.into()),
        }
    }

    /// True if the content type is `text/plain`, ignoring parameters
    /// such as `;charset=utf-8`.
    pub fn is_text_plain(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().eq_ignore_ascii_case(TEXT_PLAIN))
            .unwrap_or(false)
    }

    /// Body as text, lossy.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Identifier of an open subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    destination: String,
    rx: mpsc::Receiver<IncomingMessage>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        destination: impl Into<String>,
        rx: mpsc::Receiver<IncomingMessage>,
    ) -> Self {
        Self {
            id,
            destination: destination.into(),
            rx,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Wait for the next delivery. `None` once the subscription is closed.
    pub async fn next_message(&mut self) -> Option<IncomingMessage> {
        self.rx.recv().await
    }
}

/// An established broker session.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Send `body` to `destination`.
    async fn publish(
        &self,
        destination: &str,
        content_type: &str,
        body: &[u8],
        options: PublishOptions,
    ) -> BrokerResult<()>;

    /// Start receiving messages from `destination`.
    async fn subscribe(&self, destination: &str, ack: AckMode) -> BrokerResult<Subscription>;

    /// Stop a subscription. Unknown or already closed ids are not an error.
    async fn unsubscribe(&self, id: &SubscriptionId) -> BrokerResult<()>;

    /// Close the session. Calling it again is a no-op.
    async fn disconnect(&self) -> BrokerResult<()>;
}

/// Opens broker sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: BrokerSession + 'static;

    /// Single connection attempt, no retries.
    async fn connect(&self, config: &BrokerConfig) -> BrokerResult<Self::Session>;
}
