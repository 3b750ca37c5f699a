//! `Pool`: N worker threads serving M services.
//!
//! All workers block on one shared [`Select`] spanning every service's
//! receiver, so any idle worker can serve any ready service:
//!
//! ```text
//! loop {
//!     1. select.get()          → (message, handle)   [closed? log + exit]
//!     2. handle → service      (index map, non-owning)
//!     3. service.dispatch_one(message)               [panic? log + continue]
//! }
//! ```
//!
//! Construction spawns the workers; `stop()` closes the select and joins
//! them. There is no restart: a worker that dies stays dead, and
//! `live_workers()` shows the reduced capacity.

use crate::config::PoolConfig;
use crate::service::Service;

use svcpool_core::error::{Error, Result};
use svcpool_core::id::Handle;
use svcpool_core::wire::panic_message;
use svcpool_router::{Router, Select};

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

/// State shared between the pool owner and its workers.
struct PoolShared {
    name: String,
    services: Vec<Arc<Service>>,
    /// Receiver handle → index into `services`
    by_handle: HashMap<Handle, usize>,
    select: Select,
    /// Workers that have not yet exited
    live: AtomicUsize,
}

/// Body of one worker thread between start and exit.
type WorkerLoop = fn(&PoolShared, usize);

/// Decrements the live-worker count when a worker exits, normally or by
/// unwinding.
struct LiveGuard<'a>(&'a AtomicUsize);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct Pool {
    id: usize,
    router: Router,
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl Pool {
    /// Start `size` workers serving `services`.
    ///
    /// Everything else comes from `PoolConfig::defaults()`; the environment
    /// is not consulted. Pass `PoolConfig::from_env()` to `with_config` for
    /// env overrides.
    pub fn new<I>(router: &Router, services: I, size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<Service>>,
    {
        Self::with_config(router, services, &PoolConfig::defaults().workers(size))
    }

    /// Start a pool sized and named by `config`.
    pub fn with_config<I>(router: &Router, services: I, config: &PoolConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<Service>>,
    {
        Self::start(router, services, config, worker_run)
    }

    fn start<I>(router: &Router, services: I, config: &PoolConfig, run: WorkerLoop) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<Service>>,
    {
        config.validate()?;
        let services: Vec<Arc<Service>> = services.into_iter().collect();
        if services.is_empty() {
            return Err(Error::InvalidConfig("pool needs at least one service"));
        }

        let select = Select::with_receivers(services.iter().map(|s| s.receiver()), false)?;
        let by_handle = services
            .iter()
            .enumerate()
            .map(|(i, s)| (s.handle(), i))
            .collect();

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(PoolShared {
            name: format!("{}.{:x}", config.name, id),
            services,
            by_handle,
            select,
            live: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let mut builder =
                thread::Builder::new().name(format!("{}.worker-{}", shared.name, index));
            if let Some(bytes) = config.stack_size {
                builder = builder.stack_size(bytes);
            }

            shared.live.fetch_add(1, Ordering::AcqRel);
            let worker_shared = Arc::clone(&shared);
            match builder.spawn(move || worker_main(worker_shared, index, run)) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.live.fetch_sub(1, Ordering::AcqRel);
                    error!(pool = %shared.name, worker = index, error = %e, "spawn failed");
                    shared.select.close();
                    let panicked = join_all(workers);
                    if panicked > 0 {
                        error!(
                            pool = %shared.name,
                            panicked,
                            "workers panicked during aborted start"
                        );
                    }
                    return Err(Error::Spawn(e.to_string()));
                }
            }
        }

        info!(
            pool = %shared.name,
            workers = config.workers,
            services = shared.services.len(),
            "pool started"
        );
        Ok(Self {
            id,
            router: router.clone(),
            shared,
            workers,
            size: config.workers,
        })
    }

    /// Close the select and join every worker.
    ///
    /// Returns `Error::WorkersPanicked` if any worker died abnormally during
    /// the pool's lifetime.
    pub fn stop(mut self) -> Result<()> {
        self.shared.select.close();
        let panicked = join_all(self.workers.drain(..));
        info!(pool = %self.shared.name, panicked, "pool stopped");
        if panicked > 0 {
            Err(Error::WorkersPanicked(panicked))
        } else {
            Ok(())
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// `<config name>.<pool id>`, the prefix of every worker thread name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of workers started.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers that have not exited yet.
    #[inline]
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    pub fn services(&self) -> &[Arc<Service>] {
        &self.shared.services
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            // Dropped without stop(): let workers exit, but don't block
            // the dropping thread on joins.
            self.shared.select.close();
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = thread::current();
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("name", &self.shared.name)
            .field("size", &self.size)
            .field("live", &self.live_workers())
            .field("th", &current.name().unwrap_or("<unnamed>"))
            .finish()
    }
}

/// Join every worker, returning how many of them panicked.
fn join_all<I: IntoIterator<Item = JoinHandle<()>>>(workers: I) -> usize {
    workers.into_iter().map(JoinHandle::join).filter(|r| r.is_err()).count()
}

/// Worker thread entry point.
///
/// Anything that unwinds out of the loop machinery is logged with the
/// worker identity and then allowed to continue unwinding, killing only
/// this thread.
fn worker_main(shared: Arc<PoolShared>, index: usize, run: WorkerLoop) {
    let _live = LiveGuard(&shared.live);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| run(&shared, index))) {
        error!(
            pool = %shared.name,
            worker = index,
            panic = %panic_message(payload.as_ref()),
            "worker crashed"
        );
        panic::resume_unwind(payload);
    }
}

fn worker_run(shared: &PoolShared, index: usize) {
    debug!(pool = %shared.name, worker = index, "worker started");
    loop {
        let (msg, handle) = match shared.select.get() {
            Ok(next) => next,
            Err(e) if e.is_closed() => {
                error!(
                    pool = %shared.name,
                    worker = index,
                    error = %e,
                    "channel or latch closed, exiting"
                );
                return;
            }
            Err(e) => panic!("select failed unexpectedly: {e}"),
        };

        let Some(&slot) = shared.by_handle.get(&handle) else {
            error!(pool = %shared.name, handle = %handle, ?msg, "no service owns handle");
            continue;
        };
        let service = &shared.services[slot];

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| service.dispatch_one(&msg))) {
            error!(
                pool = %shared.name,
                worker = index,
                service = %service,
                ?msg,
                panic = %panic_message(payload.as_ref()),
                "while handling message"
            );
        }
    }
}
