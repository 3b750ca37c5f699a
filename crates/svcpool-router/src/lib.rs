//! # svcpool-router - In-process message transport
//!
//! Provides the transport primitives the service layer consumes:
//!
//! | Primitive  | Role                                                    |
//! |------------|---------------------------------------------------------|
//! | `Router`   | Handle allocation, delivery by handle, global shutdown  |
//! | `Receiver` | Per-handle inbound queue with blocking `get`            |
//! | `Select`   | Fan-in over many receivers, safe for concurrent `get`   |
//! | `Context`  | Addressed sender with reply-receiver allocation         |
//!
//! Every message stays inside one process. The router is a loopback: it
//! delivers to whichever receiver is bound to the destination handle.

pub mod router;
pub mod receiver;
pub mod select;
pub mod context;

pub use router::Router;
pub use receiver::Receiver;
pub use select::Select;
pub use context::Context;

pub use svcpool_core::{Body, CallError, ContextId, Error, Handle, Message, Result};
