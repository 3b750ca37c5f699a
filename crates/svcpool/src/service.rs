//! Services: one handle, one handler.
//!
//! A [`Service`] owns the receiver for its handle and turns each incoming
//! message into at most one reply:
//!
//! ```text
//! message ─► size check ──too big──► reply CallError("Message size exceeded")
//!               │
//!               ▼
//!            decode ──undecodable / dead / error body / invalid──► drop (warn)
//!               │
//!               ▼
//!            dispatch ──Ok(v)──► reply v
//!               └──────Err / panic──► reply CallError
//! ```
//!
//! Handler logic lives behind the [`Handler`] trait. [`FnHandler`] adapts a
//! closure for the common case.

use svcpool_core::error::Result;
use svcpool_core::id::Handle;
use svcpool_core::message::Message;
use svcpool_core::wire::{Body, CallError};
use svcpool_router::{Receiver, Router};

use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Error type handlers return. Anything convertible with `?` works.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one handler invocation.
pub type DispatchResult = std::result::Result<Value, DispatchError>;

/// Request handling logic for one service.
///
/// **Contract:**
/// - `dispatch()` is called at most once per accepted message, possibly
///   from several pool workers at the same time.
/// - Errors and panics from `dispatch()` reach the caller as a `CallError`.
/// - `max_message_size()` defaults to 0, which accepts nothing; every real
///   handler overrides it.
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Fixed handle to bind, or `None` to let the router allocate one.
    fn handle(&self) -> Option<Handle> {
        None
    }

    /// Largest accepted payload in bytes.
    fn max_message_size(&self) -> usize {
        0
    }

    /// Reject structurally invalid requests before dispatch.
    fn validate_args(&self, _args: &Value) -> bool {
        true
    }

    /// Handle one request and produce the reply value.
    fn dispatch(&self, args: Value, msg: &Message) -> DispatchResult;
}

type Validator = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// `Handler` built from a closure.
///
/// ```ignore
/// let echo = FnHandler::new("echo", |args, _msg| Ok(args)).max_message_size(4096);
/// let service = Service::new(&router, echo)?;
/// ```
pub struct FnHandler<F> {
    name: String,
    handle: Option<Handle>,
    max_message_size: usize,
    validator: Option<Validator>,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Value, &Message) -> DispatchResult + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            handle: None,
            max_message_size: 0,
            validator: None,
            func,
        }
    }

    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    pub fn validate<V>(mut self, validator: V) -> Self
    where
        V: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Value, &Message) -> DispatchResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self) -> Option<Handle> {
        self.handle
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn validate_args(&self, args: &Value) -> bool {
        self.validator.as_ref().map_or(true, |v| v(args))
    }

    fn dispatch(&self, args: Value, msg: &Message) -> DispatchResult {
        (self.func)(args, msg)
    }
}

/// Why a message was dropped without reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload did not decode
    Undecodable,
    /// Payload was the dead sentinel
    Dead,
    /// Payload was an error value
    ErrorBody,
    /// `validate_args` rejected it
    Invalid,
}

/// What `dispatch_one` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handler succeeded; its value was sent as the reply
    Replied,
    /// Handler failed; a `CallError` was sent as the reply
    Failed,
    /// Payload too large; a size-exceeded `CallError` was sent
    Oversized,
    /// Junk input; nothing was sent
    Dropped(DropReason),
}

impl Disposition {
    /// True if a reply was sent (or at least attempted).
    pub fn replied(self) -> bool {
        !matches!(self, Disposition::Dropped(_))
    }
}

/// A handler bound to its own receiver.
pub struct Service {
    handle: Handle,
    max_message_size: usize,
    receiver: Receiver,
    running: AtomicBool,
    handler: Box<dyn Handler>,
}

impl Service {
    /// Bind `handler` on `router`, at its fixed handle or a new one.
    pub fn new<H: Handler + 'static>(router: &Router, handler: H) -> Result<Self> {
        Self::from_boxed(router, Box::new(handler))
    }

    pub fn from_boxed(router: &Router, handler: Box<dyn Handler>) -> Result<Self> {
        let receiver = Receiver::new(router, handler.handle())?;
        let service = Self {
            handle: receiver.handle(),
            max_message_size: handler.max_message_size(),
            receiver,
            running: AtomicBool::new(true),
            handler,
        };
        debug!(service = %service, max_message_size = service.max_message_size, "service bound");
        Ok(service)
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    #[inline]
    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// False once the receiver reported closure to `run_once`.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Validate, dispatch and reply to one message.
    ///
    /// Never panics because of the handler's `dispatch`, and sends at most
    /// one reply.
    pub fn dispatch_one(&self, msg: &Message) -> Disposition {
        if msg.len() > self.max_message_size {
            error!(
                service = %self,
                ?msg,
                limit = self.max_message_size,
                "larger than permitted size"
            );
            self.send_reply(msg, Body::Error(CallError::new("Message size exceeded")));
            return Disposition::Oversized;
        }

        let args = match msg.decode(false) {
            Ok(Body::Value(args)) => args,
            Ok(Body::Dead) => return self.junk(msg, DropReason::Dead),
            Ok(Body::Error(_)) => return self.junk(msg, DropReason::ErrorBody),
            Err(e) => {
                warn!(service = %self, error = %e, "undecodable message");
                return self.junk(msg, DropReason::Undecodable);
            }
        };
        if !self.handler.validate_args(&args) {
            return self.junk(msg, DropReason::Invalid);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.handler.dispatch(args, msg))) {
            Ok(Ok(value)) => {
                self.send_reply(msg, Body::Value(value));
                Disposition::Replied
            }
            Ok(Err(e)) => {
                error!(service = %self, error = %e, "while invoking dispatch()");
                self.send_reply(msg, Body::Error(CallError::from_error(&*e)));
                Disposition::Failed
            }
            Err(payload) => {
                let err = CallError::from_panic(payload.as_ref());
                error!(service = %self, error = %err, "dispatch() panicked");
                self.send_reply(msg, Body::Error(err));
                Disposition::Failed
            }
        }
    }

    fn junk(&self, msg: &Message, reason: DropReason) -> Disposition {
        warn!(service = %self, ?reason, ?msg, "received junk message");
        Disposition::Dropped(reason)
    }

    fn send_reply(&self, msg: &Message, body: Body) {
        if let Err(e) = msg.reply(&body) {
            warn!(service = %self, ?msg, error = %e, "reply not delivered");
        }
    }

    /// Pull one message from this service's own receiver and dispatch it.
    ///
    /// Returns `None` when the receiver is closed; `is_running()` is false
    /// from then on.
    pub fn run_once(&self) -> Option<Disposition> {
        match self.receiver.get() {
            Ok(msg) => Some(self.dispatch_one(&msg)),
            Err(e) => {
                // channel closed, normally router shutdown
                debug!(service = %self, error = %e, "channel closed");
                self.running.store(false, Ordering::Release);
                None
            }
        }
    }

    /// Serve this service alone on the calling thread until its receiver
    /// closes.
    pub fn run(&self) {
        while self.is_running() {
            self.run_once();
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.handle)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name())
            .field("handle", &self.handle)
            .field("max_message_size", &self.max_message_size)
            .field("running", &self.is_running())
            .finish()
    }
}
