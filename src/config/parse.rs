//! Flag and environment value parsing utilities.

use std::time::Duration;

use super::ConfigError;

/// Get optional environment variable (None if empty or missing).
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse duration string (e.g., "500ms", "30s", "2m", "1h").
/// Plain numbers are seconds. Zero durations are rejected: a probe
/// with no time budget can never pass.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    // "ms" has to be checked before "s" and "m"
    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = s.strip_suffix('h') {
        (num, "h")
    } else {
        (s.as_str(), "s")
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {}", s))?;

    let secs = |factor: u64| {
        num.checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration out of range: {}", s))
    };
    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => secs(60)?,
        "h" => secs(3600)?,
        _ => return Err(format!("invalid unit: {}", unit)),
    };

    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(duration)
}

/// Parse a named duration value, wrapping failures in [`ConfigError`].
pub fn duration_value(key: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|error| ConfigError::Parse {
        key: key.into(),
        value: value.into(),
        error,
    })
}

/// Parse a TCP port. Port 0 is not a connectable endpoint.
pub fn port_value(key: &str, value: &str) -> Result<u16, ConfigError> {
    let port: u16 = value.trim().parse().map_err(|e| ConfigError::Parse {
        key: key.into(),
        value: value.into(),
        error: format!("{}", e),
    })?;

    if port == 0 {
        return Err(ConfigError::Invalid {
            key: key.into(),
            message: "port must be between 1 and 65535".into(),
        });
    }

    Ok(port)
}
