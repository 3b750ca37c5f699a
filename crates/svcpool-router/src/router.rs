//! `Router`: handle allocation and delivery.
//!
//! The router owns the handle → receiver table. Receivers hold the router
//! (to unbind on drop); the router holds only the receivers' shared queues,
//! so there is no ownership cycle through `Receiver`.

use crate::context::Context;
use crate::receiver::ReceiverShared;

use svcpool_core::constants::FIRST_DYNAMIC_HANDLE;
use svcpool_core::error::{Error, Result};
use svcpool_core::id::{ContextId, Handle};
use svcpool_core::message::{Message, Route};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

pub(crate) struct RouterInner {
    context_id: ContextId,
    /// Weak self-reference stamped into delivered messages for replies
    me: Weak<RouterInner>,
    next_handle: AtomicU32,
    receivers: Mutex<HashMap<Handle, Arc<ReceiverShared>>>,
    shut_down: AtomicBool,
}

impl RouterInner {
    fn table(&self) -> MutexGuard<'_, HashMap<Handle, Arc<ReceiverShared>>> {
        self.receivers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Route for RouterInner {
    fn route(&self, mut msg: Message) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::RouterShutdown);
        }
        let target = self.table().get(&msg.handle).cloned();
        let Some(target) = target else {
            warn!(handle = %msg.handle, ?msg, "no receiver bound, dropping message");
            return Err(Error::NoRoute(msg.handle));
        };

        msg.receiver = Some(target.handle);
        let me: Weak<dyn Route> = self.me.clone();
        msg.set_router(me);
        target.deliver(msg)
    }

    fn context_id(&self) -> ContextId {
        self.context_id
    }
}

/// Cloneable handle to one in-process router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(context_id: ContextId) -> Self {
        let inner = Arc::new_cyclic(|me| RouterInner {
            context_id,
            me: me.clone(),
            next_handle: AtomicU32::new(FIRST_DYNAMIC_HANDLE),
            receivers: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        });
        Self { inner }
    }

    /// Router for the local context.
    pub fn local() -> Self {
        Self::new(ContextId::LOCAL)
    }

    #[inline]
    pub fn context_id(&self) -> ContextId {
        self.inner.context_id
    }

    /// Sender addressed at this router's own context.
    pub fn context(&self) -> Context {
        Context::new(self.clone(), self.context_id())
    }

    /// Deliver a message to the receiver bound to `msg.handle`.
    pub fn route(&self, msg: Message) -> Result<()> {
        self.inner.route(msg)
    }

    /// Bind a receiver queue to a fixed handle or a freshly allocated one.
    pub(crate) fn bind(&self, handle: Option<Handle>) -> Result<Arc<ReceiverShared>> {
        let mut table = self.inner.table();
        if self.is_shut_down() {
            return Err(Error::RouterShutdown);
        }

        let handle = match handle {
            Some(h) if table.contains_key(&h) => return Err(Error::HandleInUse(h)),
            Some(h) => h,
            None => loop {
                let h = Handle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
                if !table.contains_key(&h) {
                    break h;
                }
            },
        };

        let shared = Arc::new(ReceiverShared::new(handle));
        table.insert(handle, Arc::clone(&shared));
        debug!(handle = %handle, "bound receiver");
        Ok(shared)
    }

    pub(crate) fn unbind(&self, handle: Handle) {
        if self.inner.table().remove(&handle).is_some() {
            debug!(handle = %handle, "unbound receiver");
        }
    }

    /// Close every bound receiver and refuse further binds and routes.
    ///
    /// Idempotent. Receivers see the closure as a channel-closed error on
    /// their next `get`.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<_> = self.inner.table().drain().map(|(_, r)| r).collect();
        debug!(receivers = drained.len(), "router shutdown");
        for receiver in drained {
            receiver.close();
        }
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Number of handles currently bound.
    pub fn bound(&self) -> usize {
        self.inner.table().len()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("context_id", &self.context_id())
            .field("bound", &self.bound())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
