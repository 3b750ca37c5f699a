//! # svcpool-core
//!
//! Core types shared by every svcpool crate.
//!
//! This crate knows nothing about threads, routers or services. It defines
//! the vocabulary they use to talk to each other.
//!
//! ## Modules
//!
//! - `id` - Handle and context identifiers
//! - `wire` - Payload body (value, error, dead sentinel) and its encoding
//! - `message` - The routed message unit and the `Route` trait
//! - `latch` - Blocking MPMC queue with close semantics
//! - `error` - Error types
//! - `logging` - `tracing` subscriber setup driven by environment variables
//! - `env` - Environment variable utilities

pub mod id;
pub mod wire;
pub mod message;
pub mod latch;
pub mod error;
pub mod logging;
pub mod env;

// Re-exports for convenience
pub use id::{ContextId, Handle};
pub use wire::{Body, CallError};
pub use message::{Message, Route};
pub use latch::Latch;
pub use error::{Error, Result};
pub use logging::LogLevel;
pub use env::{env_get, env_get_bool, env_get_opt};

/// Re-exported so handlers and callers share one value type.
pub use serde_json::{json, Value};

/// Constants for handle allocation and pool sizing
pub mod constants {
    /// First handle handed out by dynamic allocation.
    /// Handles below this are reserved for fixed, well-known services.
    pub const FIRST_DYNAMIC_HANDLE: u32 = 1000;

    /// Maximum workers (OS threads) per pool
    pub const MAX_WORKERS: usize = 64;

    /// Context id of the local router
    pub const LOCAL_CONTEXT: u32 = 0;
}
