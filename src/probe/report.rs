//! Maps a finished run to a log line and exit status.

use std::process::ExitCode;

use super::outcome::{ProbeError, ProbeOutcome};
use crate::logging::ProbeLogger;

/// Pass/fail verdict handed to the monitoring system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Passed,
    Failed,
}

impl ProbeStatus {
    /// Process exit code: 0 on pass, 1 on any failure.
    pub fn code(&self) -> u8 {
        match self {
            ProbeStatus::Passed => 0,
            ProbeStatus::Failed => 1,
        }
    }
}

impl From<ProbeStatus> for ExitCode {
    fn from(status: ProbeStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Emit exactly one verdict line for `result` and return the status.
pub fn report(result: &Result<ProbeOutcome, ProbeError>, log: &dyn ProbeLogger) -> ProbeStatus {
    match result {
        Ok(ProbeOutcome::Matched) => {
            log.info("health check passed");
            ProbeStatus::Passed
        }
        Ok(outcome @ ProbeOutcome::TimedOut { .. }) => {
            log.error(&outcome.to_string());
            ProbeStatus::Failed
        }
        Ok(outcome @ ProbeOutcome::Mismatched { .. }) => {
            // Mismatches are intermediate; the coordinator never ends on one
            if cfg!(debug_assertions) {
                panic!("mismatch reported as final outcome: {}", outcome);
            }
            log.error(&outcome.to_string());
            ProbeStatus::Failed
        }
        Err(e) => {
            log.error(&e.to_string());
            ProbeStatus::Failed
        }
    }
}
