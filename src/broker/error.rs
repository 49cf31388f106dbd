//! Broker session error types.

use std::fmt;

/// Errors raised by a broker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// TCP connect or handshake failed.
    Connect(String),
    /// Sending a message failed.
    Publish(String),
    /// Opening a subscription failed.
    Subscribe(String),
    /// Closing a subscription failed.
    Unsubscribe(String),
    /// Closing the session failed.
    Disconnect(String),
    /// The connection is gone.
    Closed,
}

impl BrokerError {
    /// Get the error message for logging.
    pub fn message(&self) -> &str {
        match self {
            BrokerError::Connect(msg)
            | BrokerError::Publish(msg)
            | BrokerError::Subscribe(msg)
            | BrokerError::Unsubscribe(msg)
            | BrokerError::Disconnect(msg) => msg,
            BrokerError::Closed => "connection closed",
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Connect(msg) => write!(f, "connect failed: {}", msg),
            BrokerError::Publish(msg) => write!(f, "publish failed: {}", msg),
            BrokerError::Subscribe(msg) => write!(f, "subscribe failed: {}", msg),
            BrokerError::Unsubscribe(msg) => write!(f, "unsubscribe failed: {}", msg),
            BrokerError::Disconnect(msg) => write!(f, "disconnect failed: {}", msg),
            BrokerError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for BrokerError {}

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
