//! Synchronous request/response over a [`Context`].

use svcpool_core::error::Result;
use svcpool_core::id::Handle;
use svcpool_core::message::Message;
use svcpool_router::Context;

use serde_json::Value;
use std::time::Duration;

/// Send `args` to `to` and block for the reply.
///
/// An error reply surfaces as `Error::Remote`; a dead reply or a closed
/// reply channel as `Error::ChannelClosed`.
pub fn call(ctx: &Context, to: Handle, args: &Value) -> Result<Value> {
    let recv = ctx.send_async(Message::from_value(to, args)?)?;
    recv.get()?.decode(true)?.into_value()
}

/// Like [`call`], failing with `Error::Timeout` if no reply arrives in time.
///
/// The reply receiver is dropped on timeout, so a late reply is discarded.
pub fn call_timeout(ctx: &Context, to: Handle, args: &Value, timeout: Duration) -> Result<Value> {
    let recv = ctx.send_async(Message::from_value(to, args)?)?;
    recv.get_timeout(timeout)?.decode(true)?.into_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;
    use svcpool_core::error::Error;
    use svcpool_core::wire::{Body, CallError};
    use svcpool_router::{Receiver, Router};

    /// Answer exactly one request on `handle` with `body`.
    fn answer_once(router: &Router, handle: Handle, body: Body) -> thread::JoinHandle<()> {
        let server = Receiver::new(router, Some(handle)).unwrap();
        thread::spawn(move || {
            let req = server.get().unwrap();
            req.reply(&body).unwrap();
        })
    }

    #[test]
    fn returns_reply_value() {
        let router = Router::local();
        let t = answer_once(&router, Handle(20), Body::Value(json!(42)));
        assert_eq!(call(&router.context(), Handle(20), &json!(null)).unwrap(), json!(42));
        t.join().unwrap();
    }

    #[test]
    fn error_reply_becomes_remote_error() {
        let router = Router::local();
        let t = answer_once(&router, Handle(21), Body::Error(CallError::new("nope")));
        let err = call(&router.context(), Handle(21), &json!(null)).unwrap_err();
        assert_eq!(err, Error::Remote(CallError::new("nope")));
        t.join().unwrap();
    }

    #[test]
    fn dead_reply_is_channel_closed() {
        let router = Router::local();
        let t = answer_once(&router, Handle(22), Body::Dead);
        let err = call(&router.context(), Handle(22), &json!(null)).unwrap_err();
        assert!(matches!(err, Error::ChannelClosed(_)));
        t.join().unwrap();
    }

    #[test]
    fn unknown_target_fails_immediately() {
        let router = Router::local();
        let err = call(&router.context(), Handle(23), &json!(null)).unwrap_err();
        assert_eq!(err, Error::NoRoute(Handle(23)));
    }

    #[test]
    fn times_out_without_reply() {
        let router = Router::local();
        let _silent = Receiver::new(&router, Some(Handle(24))).unwrap();
        let err = call_timeout(
            &router.context(),
            Handle(24),
            &json!(null),
            Duration::from_millis(20),
        )
        .unwrap_err();
        assert_eq!(err, Error::Timeout);
        // the reply receiver was released
        assert_eq!(router.bound(), 1);
    }
}
