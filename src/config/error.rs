//! Configuration error types.

use std::fmt;

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to parse a flag or environment value.
    Parse {
        key: String,
        value: String,
        error: String,
    },
    /// Missing required flag.
    Missing { key: String },
    /// Invalid value for a flag.
    Invalid { key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { key, value, error } => {
                write!(f, "failed to parse {}='{}': {}", key, value, error)
            }
            ConfigError::Missing { key } => {
                write!(f, "missing required flag: --{}", key)
            }
            ConfigError::Invalid { key, message } => {
                write!(f, "invalid value for --{}: {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
