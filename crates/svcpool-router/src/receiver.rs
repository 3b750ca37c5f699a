//! `Receiver`: inbound queue bound to one handle.

use crate::router::Router;
use crate::select::SelectShared;

use svcpool_core::error::{Error, Result};
use svcpool_core::id::Handle;
use svcpool_core::latch::Latch;
use svcpool_core::message::Message;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// State shared between a `Receiver`, the router table and at most one
/// `Select`.
pub(crate) struct ReceiverShared {
    pub(crate) handle: Handle,
    pub(crate) latch: Latch<Message>,
    /// Select this receiver currently feeds, if any
    select: Mutex<Option<Weak<SelectShared>>>,
}

impl ReceiverShared {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            handle,
            latch: Latch::new(),
            select: Mutex::new(None),
        }
    }

    fn link(&self) -> MutexGuard<'_, Option<Weak<SelectShared>>> {
        self.select.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn deliver(&self, msg: Message) -> Result<()> {
        self.latch
            .put(msg)
            .map_err(|_| Error::ChannelClosed(format!("receiver {} is closed", self.handle)))?;
        self.notify();
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.latch.close();
        self.notify();
    }

    /// Tell the owning select (if any) that this receiver has something to
    /// report: a message or its own closure.
    fn notify(&self) {
        let select = self.link().as_ref().and_then(Weak::upgrade);
        if let Some(select) = select {
            select.ready(self.handle);
        }
    }

    pub(crate) fn attach(&self, select: &Arc<SelectShared>) -> Result<()> {
        let mut link = self.link();
        if link.as_ref().is_some_and(|w| w.strong_count() > 0) {
            return Err(Error::AlreadySelected(self.handle));
        }
        *link = Some(Arc::downgrade(select));
        Ok(())
    }

    pub(crate) fn detach(&self) {
        *self.link() = None;
    }
}

/// Receives messages addressed to one handle.
///
/// Dropping the receiver unbinds the handle; messages still queued are
/// discarded.
pub struct Receiver {
    router: Router,
    shared: Arc<ReceiverShared>,
}

impl Receiver {
    /// Bind a receiver on `router`, to `handle` if given, otherwise to a
    /// freshly allocated handle.
    pub fn new(router: &Router, handle: Option<Handle>) -> Result<Self> {
        let shared = router.bind(handle)?;
        Ok(Self {
            router: router.clone(),
            shared,
        })
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.shared.handle
    }

    pub(crate) fn shared(&self) -> &Arc<ReceiverShared> {
        &self.shared
    }

    fn closed_error(&self) -> Error {
        Error::ChannelClosed(format!("receiver {} is closed", self.handle()))
    }

    /// Block until a message arrives. Fails with `Error::ChannelClosed` once
    /// the receiver is closed.
    pub fn get(&self) -> Result<Message> {
        self.shared.latch.get().map_err(|_| self.closed_error())
    }

    /// Like `get`, failing with `Error::Timeout` after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Message> {
        match self.shared.latch.get_timeout(timeout) {
            Err(Error::Timeout) => Err(Error::Timeout),
            Err(_) => Err(self.closed_error()),
            Ok(msg) => Ok(msg),
        }
    }

    /// Non-blocking `get`.
    pub fn try_get(&self) -> Result<Option<Message>> {
        self.shared.latch.try_get().map_err(|_| self.closed_error())
    }

    /// Unbind the handle and wake every waiter with a closed error.
    pub fn close(&self) {
        self.router.unbind(self.handle());
        self.shared.close();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.latch.is_closed()
    }

    /// Number of queued messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.latch.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.latch.is_empty()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("handle", &self.handle())
            .field("queued", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
