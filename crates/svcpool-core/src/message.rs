//! The routed message unit.
//!
//! A `Message` is owned by whoever currently holds it: the router while in
//! flight, a receiver's latch while queued, and the worker that pulled it
//! afterwards. It carries a weak link back to the router that delivered it
//! so a reply can be routed without keeping the router alive.

use crate::error::{Error, Result};
use crate::id::{ContextId, Handle};
use crate::wire::{self, Body};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// Delivers messages to the receiver bound to `msg.handle`.
///
/// **Contract:**
/// - `route()` must NEVER block on the destination draining its queue.
/// - Routing to an unbound handle fails with `Error::NoRoute`.
pub trait Route: Send + Sync {
    /// Deliver a message.
    fn route(&self, msg: Message) -> Result<()>;

    /// Context id stamped as `src_id` on replies.
    fn context_id(&self) -> ContextId;
}

/// One transport-level message.
pub struct Message {
    /// Destination context
    pub dst_id: ContextId,
    /// Originating context
    pub src_id: ContextId,
    /// Destination handle
    pub handle: Handle,
    /// Handle in `src_id` that expects the reply, if any
    pub reply_to: Option<Handle>,
    /// Handle of the receiver that queued this message (set on delivery)
    pub receiver: Option<Handle>,
    /// Encoded `Body`
    pub data: Vec<u8>,
    router: Option<Weak<dyn Route>>,
}

impl Message {
    /// Build a message from raw payload bytes.
    pub fn new(handle: Handle, data: Vec<u8>) -> Self {
        Self {
            dst_id: ContextId::LOCAL,
            src_id: ContextId::LOCAL,
            handle,
            reply_to: None,
            receiver: None,
            data,
            router: None,
        }
    }

    /// Build a message carrying an encoded body.
    pub fn with_body(handle: Handle, body: &Body) -> Result<Self> {
        Ok(Self::new(handle, wire::encode(body)?))
    }

    /// Build a request message carrying `value`.
    pub fn from_value(handle: Handle, value: &Value) -> Result<Self> {
        Self::with_body(handle, &Body::Value(value.clone()))
    }

    /// Build the dead sentinel addressed to `handle`.
    pub fn dead(handle: Handle) -> Self {
        // "dead" is a fixed literal; encoding it cannot fail
        Self::new(handle, br#""dead""#.to_vec())
    }

    /// Attach the router used for replies. Called by routers on delivery.
    pub fn set_router(&mut self, router: Weak<dyn Route>) {
        self.router = Some(router);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the payload.
    ///
    /// With `strict == false` error and dead bodies are returned as-is so
    /// the caller can inspect them. With `strict == true` they become `Err`
    /// (`Error::Remote` and `Error::ChannelClosed` respectively).
    pub fn decode(&self, strict: bool) -> Result<Body> {
        let body = wire::decode(&self.data)?;
        if strict {
            match body {
                Body::Error(e) => return Err(Error::Remote(e)),
                Body::Dead => {
                    return Err(Error::ChannelClosed(format!(
                        "dead message on {}",
                        self.handle
                    )))
                }
                Body::Value(_) => {}
            }
        }
        Ok(body)
    }

    /// Send `body` back to the handle named in `reply_to`.
    pub fn reply(&self, body: &Body) -> Result<()> {
        let reply_to = self.reply_to.ok_or(Error::NoReplyTo)?;
        let router = self
            .router
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::ChannelClosed("router is gone".to_string()))?;

        let mut reply = Message::with_body(reply_to, body)?;
        reply.dst_id = self.src_id;
        reply.src_id = router.context_id();
        router.route(reply)
    }

    /// Reply with a successful value.
    pub fn reply_value(&self, value: Value) -> Result<()> {
        self.reply(&Body::Value(value))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("dst_id", &self.dst_id)
            .field("src_id", &self.src_id)
            .field("handle", &self.handle)
            .field("reply_to", &self.reply_to)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Downgrade a concrete router into the weak trait object messages carry.
pub fn weak_route<R: Route + 'static>(router: &Arc<R>) -> Weak<dyn Route> {
    let weak: Weak<R> = Arc::downgrade(router);
    weak
}
