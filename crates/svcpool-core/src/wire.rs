//! Payload body and its encoding.
//!
//! Every message payload is the JSON encoding of a [`Body`]. Requests and
//! successful replies carry `Body::Value`; failures travel as
//! `Body::Error`; `Body::Dead` tells the receiver that the sender has gone
//! and nothing more will arrive.
//!
//! ```text
//! {"value":{"op":"ping"}}
//! {"error":{"kind":"CallError","message":"Message size exceeded"}}
//! "dead"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Error value carried inside a reply.
///
/// Serializable so a handler failure on one side becomes a typed error on
/// the other instead of a hung caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    /// Short classification (`CallError`, `DispatchError`, `Panic`)
    pub kind: String,
    /// Human-readable description
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "CallError".to_string(),
            message: message.into(),
        }
    }

    /// Wrap an error returned by a handler.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            kind: "DispatchError".to_string(),
            message,
        }
    }

    /// Wrap a panic payload caught at a failure boundary.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self {
            kind: "Panic".to_string(),
            message: panic_message(payload),
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CallError {}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Decoded payload of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    /// A request or a successful reply
    Value(Value),
    /// A remote-reported failure
    Error(CallError),
    /// Sender closed, no more messages
    Dead,
}

impl Body {
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Body::Error(_))
    }

    /// Unwrap a value, turning error and dead bodies into `Err`.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Body::Value(v) => Ok(v),
            Body::Error(e) => Err(Error::Remote(e)),
            Body::Dead => Err(Error::ChannelClosed("received dead message".to_string())),
        }
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Body::Value(v)
    }
}

impl From<CallError> for Body {
    fn from(e: CallError) -> Self {
        Body::Error(e)
    }
}

/// Encode a body into payload bytes.
pub fn encode(body: &Body) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| Error::Encode(e.to_string()))
}

/// Decode payload bytes into a body.
pub fn decode(data: &[u8]) -> Result<Body> {
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_encoding_shape() {
        let bytes = encode(&Body::Value(json!({"op": "ping"}))).unwrap();
        assert_eq!(bytes, br#"{"value":{"op":"ping"}}"#);
    }

    #[test]
    fn test_dead_and_error_decode() {
        assert_eq!(decode(br#""dead""#).unwrap(), Body::Dead);

        let body = decode(br#"{"error":{"kind":"CallError","message":"nope"}}"#).unwrap();
        assert_eq!(body, Body::Error(CallError::new("nope")));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode(b"\x80\x03junk"), Err(Error::Decode(_))));
        // valid JSON but not a body
        assert!(matches!(decode(br#"{"op":"ping"}"#), Err(Error::Decode(_))));
    }

    #[test]
    fn test_into_value() {
        assert_eq!(Body::Value(json!(1)).into_value().unwrap(), json!(1));
        assert!(matches!(
            Body::Error(CallError::new("x")).into_value(),
            Err(Error::Remote(_))
        ));
        assert!(Body::Dead.into_value().unwrap_err().is_closed());
    }

    #[test]
    fn test_from_error_includes_sources() {
        #[derive(Debug)]
        struct Inner;
        impl fmt::Display for Inner {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "disk full")
            }
        }
        impl std::error::Error for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "write failed")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let e = CallError::from_error(&Outer(Inner));
        assert_eq!(e.kind, "DispatchError");
        assert_eq!(e.message, "write failed: disk full");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("attempt to divide by zero");
        assert_eq!(CallError::from_panic(payload.as_ref()).message, "attempt to divide by zero");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
