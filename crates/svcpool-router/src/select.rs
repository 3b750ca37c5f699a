//! `Select`: fan-in over many receivers.
//!
//! Each member receiver pushes its handle onto the select's `ready` latch
//! once per delivered message (and once more when it closes). `get()` pops
//! a handle, then takes one message from that member without blocking.
//! Many threads may call `get()` concurrently; each message goes to exactly
//! one of them because it is popped from the member's own lock-free queue.
//!
//! ```text
//!  Receiver A ──put──► latch A ─┐
//!  Receiver B ──put──► latch B ─┼─notify(handle)─► ready latch ─► get()
//!  Receiver C ──put──► latch C ─┘
//! ```
//!
//! A member whose receiver closes is removed. When the last member goes,
//! the select closes itself, so every waiter observes the shutdown.

use crate::receiver::{Receiver, ReceiverShared};

use svcpool_core::error::{Error, Result};
use svcpool_core::id::Handle;
use svcpool_core::latch::Latch;
use svcpool_core::message::Message;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) struct SelectShared {
    ready: Latch<Handle>,
    members: Mutex<HashMap<Handle, Arc<ReceiverShared>>>,
    oneshot: bool,
}

impl SelectShared {
    pub(crate) fn ready(&self, handle: Handle) {
        // A closed select no longer cares
        let _ = self.ready.put(handle);
    }

    fn members(&self) -> MutexGuard<'_, HashMap<Handle, Arc<ReceiverShared>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a member, returning how many remain.
    fn forget(&self, handle: Handle) -> usize {
        let mut members = self.members();
        if let Some(member) = members.remove(&handle) {
            member.detach();
        }
        members.len()
    }

    fn close(&self) {
        self.ready.close();
        for (_, member) in self.members().drain() {
            member.detach();
        }
    }
}

pub struct Select {
    shared: Arc<SelectShared>,
}

impl Select {
    /// Create an empty select.
    ///
    /// With `oneshot` set, a member is removed after yielding one message.
    pub fn new(oneshot: bool) -> Self {
        Self {
            shared: Arc::new(SelectShared {
                ready: Latch::new(),
                members: Mutex::new(HashMap::new()),
                oneshot,
            }),
        }
    }

    /// Create a select over `receivers`.
    pub fn with_receivers<'a, I>(receivers: I, oneshot: bool) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Receiver>,
    {
        let select = Self::new(oneshot);
        for recv in receivers {
            select.add(recv)?;
        }
        Ok(select)
    }

    /// Register a receiver. A receiver can feed only one select at a time.
    pub fn add(&self, recv: &Receiver) -> Result<()> {
        if self.is_closed() {
            return Err(Error::LatchClosed);
        }
        let member = recv.shared();
        member.attach(&self.shared)?;
        self.shared.members().insert(member.handle, Arc::clone(member));

        // Account for messages (or closure) that happened before attaching.
        for _ in 0..member.latch.len() {
            self.shared.ready(member.handle);
        }
        if member.latch.is_closed() {
            self.shared.ready(member.handle);
        }
        Ok(())
    }

    /// Unregister a receiver.
    pub fn remove(&self, recv: &Receiver) -> Result<()> {
        let removed = self.shared.members().remove(&recv.handle());
        match removed {
            Some(member) => {
                member.detach();
                Ok(())
            }
            None => Err(Error::NotSelected(recv.handle())),
        }
    }

    /// Block until any member yields a message.
    ///
    /// Returns the message and the handle of the member it came from.
    /// Fails with `Error::LatchClosed` after `close()`, or with
    /// `Error::ChannelClosed` when the last member closed or the select is
    /// empty.
    pub fn get(&self) -> Result<(Message, Handle)> {
        self.next(None)
    }

    /// Like `get`, failing with `Error::Timeout` after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<(Message, Handle)> {
        self.next(Some(Instant::now() + timeout))
    }

    fn next(&self, deadline: Option<Instant>) -> Result<(Message, Handle)> {
        loop {
            if self.is_empty() && self.shared.ready.is_empty() && !self.is_closed() {
                return Err(Error::ChannelClosed("select has no members".to_string()));
            }

            let handle = match deadline {
                None => self.shared.ready.get()?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout);
                    }
                    self.shared.ready.get_timeout(deadline - now)?
                }
            };

            let member = self.shared.members().get(&handle).cloned();
            let Some(member) = member else {
                // stale notification for a removed member
                continue;
            };

            match member.latch.try_get() {
                Ok(Some(msg)) => {
                    if self.shared.oneshot {
                        self.shared.forget(handle);
                    }
                    return Ok((msg, handle));
                }
                // another consumer pulled from the receiver directly
                Ok(None) => continue,
                Err(_) => {
                    let remaining = self.shared.forget(handle);
                    debug!(handle = %handle, remaining, "select member closed");
                    if remaining == 0 {
                        self.shared.close();
                        return Err(Error::ChannelClosed(
                            "all select members closed".to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Close the select, releasing every member and failing every pending
    /// and future `get` with `Error::LatchClosed`. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.ready.is_closed()
    }

    /// Number of member receivers.
    pub fn len(&self) -> usize {
        self.shared.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.members().is_empty()
    }
}

impl Drop for Select {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Debug for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("members", &self.len())
            .field("pending", &self.shared.ready.len())
            .field("oneshot", &self.shared.oneshot)
            .field("closed", &self.is_closed())
            .finish()
    }
}
