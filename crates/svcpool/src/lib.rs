//! # svcpool - Service dispatch and worker pools
//!
//! Run request handlers ("services") on a fixed set of OS worker threads.
//! Each service owns one handle; a pool multiplexes all of its services'
//! receivers so any idle worker serves whichever service has work.
//!
//! ## Quick Start
//!
//! ```ignore
//! use svcpool::{call, json, FnHandler, Pool, Router, Service};
//! use std::sync::Arc;
//!
//! let router = Router::local();
//! let echo = Service::new(&router, FnHandler::new("echo", |v, _| Ok(v)).max_message_size(4096))?;
//! let handle = echo.handle();
//! let pool = Pool::new(&router, [Arc::new(echo)], 4)?;
//!
//! assert_eq!(call(&router.context(), handle, &json!("hi"))?, json!("hi"));
//! pool.stop()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   caller ──call()──► Router ──deliver──► Receiver (per service)
//!                                              │
//!                                              ▼
//!                                        Select (per pool)
//!                                              │
//!                        ┌─────────────────────┼─────────────────────┐
//!                        ▼                     ▼                     ▼
//!                   worker-0              worker-1              worker-N
//!                        └───── service.dispatch_one(msg) ──► reply ─┘
//! ```
//!
//! ## Failure containment
//!
//! - handler `Err` or panic: error reply to the caller, worker keeps going
//! - panic escaping the dispatch step: logged, worker keeps going
//! - anything else unwinding the worker loop: logged, that worker dies
//! - select closed (router shutdown or `stop()`): every worker exits

pub mod config;
pub mod service;
pub mod pool;
pub mod call;

pub use config::PoolConfig;
pub use service::{
    DispatchError, DispatchResult, Disposition, DropReason, FnHandler, Handler, Service,
};
pub use pool::Pool;
pub use call::{call, call_timeout};

// Re-export transport and core types
pub use svcpool_router::{Context, Receiver, Router, Select};
pub use svcpool_core::{
    Body,
    CallError,
    ContextId,
    Error,
    Handle,
    Message,
    Result,
    json,
    Value,
};

// Re-export logging setup and env utilities
pub use svcpool_core::logging::{self, LogLevel, init as init_logging};
pub use svcpool_core::{env_get, env_get_bool, env_get_opt};
