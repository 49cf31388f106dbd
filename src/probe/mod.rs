//! Round-trip health probe.
//!
//! One run of the probe:
//!
//! ```text
//! connect ──▶ publish token ──▶ subscribe
//!                  │                │
//!                  ▼                ▼
//!            deadline timer     listener ── mismatch? log, keep reading
//!                  │                │
//!                  └──▶ gate ◀──────┘   first one wins
//!                         │
//!                         ▼
//!           cleanup (unsubscribe, disconnect) ──▶ report
//! ```
//!
//! The listener and the deadline timer are separate tasks racing to
//! resolve a [`CompletionGate`]. Whichever resolves it first decides the
//! [`ProbeOutcome`]; the other one's attempt is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stomp_probe::logging::TracingLogger;
//! use stomp_probe::probe::{report, Prober};
//! use stomp_probe::stomp::StompConnector;
//!
//! let log = Arc::new(TracingLogger);
//! let result = Prober::new(StompConnector::new(), log.clone()).run(&config).await;
//! let status = report(&result, log.as_ref());
//! ```

mod coordinator;
mod gate;
mod outcome;
mod report;
mod token;

pub use coordinator::{Listener, ListenerState, Prober, DEFAULT_LISTENER_GRACE};
pub use gate::CompletionGate;
pub use outcome::{ProbeError, ProbeOutcome};
pub use report::{report, ProbeStatus};
pub use token::ProbeToken;
