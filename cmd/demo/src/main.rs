//! svcpool end-to-end demo
//!
//! Runs a calculator service and a size-limited echo service in one pool
//! and checks:
//!   Part A: ping round-trip
//!   Part B: oversized request refused before the handler runs
//!   Part C: divide by zero comes back as an error reply
//!   Part D: 100 requests over 2 services and 3 workers, then stop()
//!
//! Run: SVCPOOL_LOG_LEVEL=debug ./target/release/svcpool-demo

use svcpool::{
    call_timeout, json, DispatchResult, Error, FnHandler, Handler, Message, Pool, PoolConfig,
    Router, Service, Value,
};

use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const WAIT: Duration = Duration::from_secs(5);

// ── Test harness ──

struct Runner {
    total: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl Runner {
    fn new() -> Self {
        Self { total: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn check(&mut self, name: &str, ok: bool, detail: impl std::fmt::Display) {
        self.total += 1;
        if ok {
            println!("  [{:2}] {:<52} PASS", self.total, name);
        } else {
            self.failed += 1;
            println!("  [{:2}] {:<52} FAIL: {}", self.total, name, detail);
        }
    }

    fn summary(&self) -> ExitCode {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total,
            self.total - self.failed,
            self.failed
        );
        println!("{}", LINE);
        if self.failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

// ── Services ──

struct Calculator {
    calls: Arc<AtomicUsize>,
}

impl Handler for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn max_message_size(&self) -> usize {
        1024
    }

    fn validate_args(&self, args: &Value) -> bool {
        args["op"].is_string()
    }

    fn dispatch(&self, args: Value, _msg: &Message) -> DispatchResult {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match args["op"].as_str().unwrap_or_default() {
            "ping" => Ok(json!({"ok": true})),
            "divide" => {
                let a = args["a"].as_i64().ok_or("a must be an integer")?;
                let b = args["b"].as_i64().ok_or("b must be an integer")?;
                Ok(json!(a / b))
            }
            op => Err(format!("unknown op {op:?}").into()),
        }
    }
}

fn main() -> ExitCode {
    svcpool::init_logging();
    let mut t = Runner::new();

    let router = Router::local();
    let calls = Arc::new(AtomicUsize::new(0));
    let services = Service::new(&router, Calculator { calls: Arc::clone(&calls) }).and_then(|calc| {
        let tiny = Service::new(
            &router,
            FnHandler::new("tiny", |v, _| Ok(v)).max_message_size(16),
        )?;
        Ok((Arc::new(calc), Arc::new(tiny)))
    });
    let (calc, tiny) = match services {
        Ok(s) => s,
        Err(e) => {
            eprintln!("service setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let (hc, ht) = (calc.handle(), tiny.handle());

    let config = PoolConfig::from_env().workers(3).name("demo");
    let pool = match Pool::with_config(&router, [calc, tiny], &config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("pool start failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(pool = %pool.name(), workers = pool.size(), "demo pool running");
    let ctx = router.context();

    t.section("Part A: ping");
    let got = call_timeout(&ctx, hc, &json!({"op": "ping"}), WAIT);
    t.check("ping returns {\"ok\": true}", got == Ok(json!({"ok": true})), format!("{got:?}"));

    t.section("Part B: size limit");
    let before = calls.load(Ordering::Relaxed);
    let got = call_timeout(&ctx, ht, &json!("x".repeat(48)), WAIT);
    let refused = matches!(&got, Err(Error::Remote(e)) if e.message.contains("size exceeded"));
    t.check("60-byte request to 16-byte service refused", refused, format!("{got:?}"));
    t.check("calculator untouched", calls.load(Ordering::Relaxed) == before, "handler ran");

    t.section("Part C: handler fault");
    let got = call_timeout(&ctx, hc, &json!({"op": "divide", "a": 1, "b": 0}), WAIT);
    let faulted = matches!(&got, Err(Error::Remote(e)) if e.kind == "Panic");
    t.check("divide by zero returns error reply", faulted, format!("{got:?}"));
    t.check("all workers alive", pool.live_workers() == 3, pool.live_workers());

    t.section("Part D: 100 requests, 2 services, 3 workers");
    let mut pending = Vec::with_capacity(100);
    for i in 0..100 {
        let (to, args) = if i % 2 == 0 {
            (hc, json!({"op": "divide", "a": i, "b": 1}))
        } else {
            (ht, json!(i))
        };
        match Message::from_value(to, &args).and_then(|m| ctx.send_async(m)) {
            Ok(recv) => pending.push((i, recv)),
            Err(e) => t.check("send", false, e),
        }
    }
    let answered = pending
        .iter()
        .filter(|(i, recv)| {
            let value = recv
                .get_timeout(WAIT)
                .and_then(|m| m.decode(true))
                .and_then(|b| b.into_value());
            value == Ok(json!(i)) && matches!(recv.try_get(), Ok(None))
        })
        .count();
    t.check("every request got exactly one reply", answered == 100, format!("{answered}/100"));

    let started = Instant::now();
    let stopped = pool.stop();
    let elapsed = started.elapsed();
    t.check("stop joined all workers", stopped.is_ok(), format!("{stopped:?}"));
    t.check("stop finished promptly", elapsed < WAIT, format!("{elapsed:?}"));

    t.summary()
}
