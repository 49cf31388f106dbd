//! Probe correlation token.

use std::fmt;

/// Per-run marker carried as the probe message body.
///
/// Decimal rendering of a non-negative 63-bit random integer. Only used to
/// tell this run's message apart from other traffic on the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeToken(String);

impl ProbeToken {
    /// Draw a fresh token.
    pub fn generate() -> Self {
        // Low half of a v4 UUID: 62 random bits below the variant bits
        let random = uuid::Uuid::new_v4().as_u128() as u64;
        Self((random & i64::MAX as u64).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True if `body` is exactly this token.
    pub fn matches(&self, body: &[u8]) -> bool {
        body == self.0.as_bytes()
    }
}

impl fmt::Display for ProbeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProbeToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
