//! Logging setup for svcpool binaries and tests.
//!
//! Library code only emits `tracing` events. Nothing is printed until the
//! owner of the process installs a subscriber, either its own or the one
//! built here.
//!
//! # Environment Variables
//!
//! - `SVCPOOL_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//! - `SVCPOOL_LOG_THREADS=1` - include thread names (worker identity) in each line; off by default
//!
//! # Usage
//!
//! ```ignore
//! svcpool_core::logging::init();
//! tracing::info!(workers = 4, "pool started");
//! ```

use crate::env::{env_get_bool, env_get_opt};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::level_filters::LevelFilter;

/// Log levels (matches common conventions)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "1" => Ok(LogLevel::Error),
            "warn" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Level requested by the environment, `Info` when unset or unparsable.
pub fn level_from_env() -> LogLevel {
    env_get_opt("SVCPOOL_LOG_LEVEL").unwrap_or(LogLevel::Info)
}

/// Whether `SVCPOOL_LOG_THREADS` asks for thread names; off when unset.
pub fn thread_names_from_env() -> bool {
    env_get_bool("SVCPOOL_LOG_THREADS", false)
}

/// Install a stderr subscriber configured from the environment.
///
/// Safe to call more than once; only the first call does anything. If some
/// other subscriber is already the global default it is left in place.
pub fn init() {
    init_with_level(level_from_env());
}

/// Install a stderr subscriber at an explicit level.
pub fn init_with_level(level: LogLevel) {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(level.to_filter())
        .with_writer(std::io::stderr)
        .with_thread_names(thread_names_from_env())
        .with_target(false)
        .try_init();
}

/// True once `init` or `init_with_level` has run.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}
