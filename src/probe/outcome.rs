//! Probe results and errors.

use std::fmt;
use std::time::Duration;

use crate::broker::BrokerError;

/// How a probe run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Our own message came back.
    Matched,
    /// Some other message was read. Logged by the listener while it keeps
    /// waiting; never the final result of a run.
    Mismatched { expected: String, received: String },
    /// Nothing matching arrived before the deadline.
    TimedOut { deadline: Duration },
}

impl ProbeOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, ProbeOutcome::Matched)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, ProbeOutcome::TimedOut { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Matched => write!(f, "probe message received"),
            ProbeOutcome::Mismatched { expected, received } => {
                write!(
                    f,
                    "did not consume the expected message, expected: {} got: {}",
                    expected, received
                )
            }
            ProbeOutcome::TimedOut { deadline } => {
                write!(
                    f,
                    "expected message not consumed within {}s, check that the broker is running",
                    deadline.as_secs_f64()
                )
            }
        }
    }
}

/// Failures that end a run before the round trip starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Could not open a session.
    Connect { address: String, source: BrokerError },
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Connect { address, source } => {
                write!(f, "failed to connect to broker {}: {}", address, source)
            }
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Connect { source, .. } => Some(source),
        }
    }
}
