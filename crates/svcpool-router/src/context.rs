//! `Context`: addressed sender.

use crate::receiver::Receiver;
use crate::router::Router;

use svcpool_core::error::Result;
use svcpool_core::id::ContextId;
use svcpool_core::message::Message;

/// Sends messages into one context through a router.
#[derive(Clone, Debug)]
pub struct Context {
    router: Router,
    context_id: ContextId,
}

impl Context {
    pub fn new(router: Router, context_id: ContextId) -> Self {
        Self { router, context_id }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.context_id
    }

    #[inline]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Fire-and-forget send.
    pub fn send(&self, mut msg: Message) -> Result<()> {
        msg.dst_id = self.context_id;
        msg.src_id = self.router.context_id();
        self.router.route(msg)
    }

    /// Send with a freshly allocated reply receiver and return it.
    ///
    /// The receiver unbinds its handle when dropped, so a reply arriving
    /// after the caller gave up is discarded by the router.
    pub fn send_async(&self, mut msg: Message) -> Result<Receiver> {
        let recv = Receiver::new(&self.router, None)?;
        msg.reply_to = Some(recv.handle());
        self.send(msg)?;
        Ok(recv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use svcpool_core::Handle;

    #[test]
    fn send_async_round_trip() {
        let router = Router::local();
        let server = Receiver::new(&router, Some(Handle(10))).unwrap();
        let ctx = router.context();

        let reply_recv = ctx
            .send_async(Message::from_value(Handle(10), &json!({"op": "ping"})).unwrap())
            .unwrap();

        let request = server.get().unwrap();
        assert_eq!(request.reply_to, Some(reply_recv.handle()));
        assert_eq!(request.src_id, router.context_id());
        request.reply_value(json!({"ok": true})).unwrap();

        let reply = reply_recv.get().unwrap();
        assert_eq!(reply.decode(true).unwrap().into_value().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn send_to_unbound_handle_fails_without_leaking_reply_handle() {
        let router = Router::local();
        let ctx = router.context();
        let msg = Message::from_value(Handle(11), &json!(1)).unwrap();
        assert!(ctx.send_async(msg).is_err());
        assert_eq!(router.bound(), 0);
    }
}
