//! Environment variable utilities
//!
//! Used by `PoolConfig::from_env()` and logging setup.
//!
//! ```ignore
//! let workers: usize = env_get("SVCPOOL_WORKERS", 4);
//! let threads = env_get_bool("SVCPOOL_LOG_THREADS", true);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or return `default`.
///
/// Unset and unparsable values both fall back to the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean.
///
/// "1", "true", "yes", "on" (case-insensitive) are true, anything else set
/// is false, unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// `Some(T)` if the variable is set and parses, `None` otherwise.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
