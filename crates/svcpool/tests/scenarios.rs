//! End-to-end behavior of services running in a pool.

use svcpool::{
    call, call_timeout, json, DispatchResult, Error, FnHandler, Handle, Handler, Message, Pool,
    PoolConfig, Router, Service, Value,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

/// Arithmetic service used by several tests.
struct Arith {
    calls: Arc<AtomicUsize>,
    limit: usize,
}

impl Handler for Arith {
    fn name(&self) -> &str {
        "arith"
    }

    fn max_message_size(&self) -> usize {
        self.limit
    }

    fn dispatch(&self, args: Value, _msg: &Message) -> DispatchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match args["op"].as_str() {
            Some("ping") => Ok(json!({"ok": true})),
            Some("divide") => {
                let a = args["a"].as_i64().ok_or("a must be an integer")?;
                let b = args["b"].as_i64().ok_or("b must be an integer")?;
                Ok(json!(a / b))
            }
            _ => Err(format!("unknown op {}", args["op"]).into()),
        }
    }
}

fn arith(router: &Router, limit: usize) -> (Arc<Service>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = Arith {
        calls: Arc::clone(&calls),
        limit,
    };
    (Arc::new(Service::new(router, handler).unwrap()), calls)
}

#[test]
fn ping_returns_handler_value() {
    let router = Router::local();
    let (svc, _) = arith(&router, 1024);
    let h = svc.handle();
    let pool = Pool::new(&router, [svc], 2).unwrap();

    let got = call_timeout(&router.context(), h, &json!({"op": "ping"}), WAIT).unwrap();
    assert_eq!(got, json!({"ok": true}));
    pool.stop().unwrap();
}

#[test]
fn oversized_request_is_refused_before_handler_runs() {
    let router = Router::local();
    let (svc, calls) = arith(&router, 10);
    let h = svc.handle();
    let pool = Pool::new(&router, [svc], 1).unwrap();

    let big = json!({"op": "ping", "pad": "x".repeat(30)});
    match call_timeout(&router.context(), h, &big, WAIT) {
        Err(Error::Remote(e)) => assert!(e.message.contains("size exceeded"), "{e}"),
        other => panic!("expected size error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    pool.stop().unwrap();
}

#[test]
fn divide_by_zero_comes_back_as_error_reply() {
    let router = Router::local();
    let (svc, _) = arith(&router, 1024);
    let h = svc.handle();
    let pool = Pool::new(&router, [svc], 1).unwrap();
    let ctx = router.context();

    let err = call_timeout(&ctx, h, &json!({"op": "divide", "a": 1, "b": 0}), WAIT).unwrap_err();
    let Error::Remote(remote) = err else {
        panic!("expected remote error, got {err:?}");
    };
    assert_eq!(remote.kind, "Panic");
    assert!(remote.message.contains("divide by zero"), "{remote}");

    // Same worker is still serving.
    assert_eq!(pool.live_workers(), 1);
    let ok = call_timeout(&ctx, h, &json!({"op": "divide", "a": 9, "b": 3}), WAIT).unwrap();
    assert_eq!(ok, json!(3));
    pool.stop().unwrap();
}

#[test]
fn handler_error_is_reported_to_caller() {
    let router = Router::local();
    let (svc, _) = arith(&router, 1024);
    let h = svc.handle();
    let pool = Pool::new(&router, [svc], 1).unwrap();

    let err = call(&router.context(), h, &json!({"op": "divide", "a": "one", "b": 2})).unwrap_err();
    match err {
        Error::Remote(e) => {
            assert_eq!(e.kind, "DispatchError");
            assert_eq!(e.message, "a must be an integer");
        }
        other => panic!("unexpected {other:?}"),
    }
    pool.stop().unwrap();
}

#[test]
fn hundred_requests_across_two_services_each_get_one_reply() {
    let router = Router::local();
    let (a, a_calls) = arith(&router, 1024);
    let tagger = Arc::new(
        Service::new(
            &router,
            FnHandler::new("tagger", |v, _| Ok(json!({"tag": v}))).max_message_size(1024),
        )
        .unwrap(),
    );
    let (ha, hb) = (a.handle(), tagger.handle());
    let pool = Pool::new(&router, [a, tagger], 3).unwrap();
    let ctx = router.context();

    let pending: Vec<_> = (0..100)
        .map(|i| {
            let msg = if i % 2 == 0 {
                Message::from_value(ha, &json!({"op": "divide", "a": i, "b": 1})).unwrap()
            } else {
                Message::from_value(hb, &json!(i)).unwrap()
            };
            (i, ctx.send_async(msg).unwrap())
        })
        .collect();

    for (i, recv) in &pending {
        let reply = recv.get_timeout(WAIT).unwrap();
        let value = reply.decode(true).unwrap().into_value().unwrap();
        if i % 2 == 0 {
            assert_eq!(value, json!(i));
        } else {
            assert_eq!(value, json!({"tag": i}));
        }
        // exactly one reply
        assert!(recv.try_get().unwrap().is_none());
    }
    assert_eq!(a_calls.load(Ordering::SeqCst), 50);

    let started = Instant::now();
    pool.stop().unwrap();
    assert!(started.elapsed() < WAIT);
}

#[test]
fn idle_workers_serve_other_services_while_one_blocks() {
    let router = Router::local();
    let release = Arc::new(AtomicUsize::new(0));
    let slow = {
        let release = Arc::clone(&release);
        Arc::new(
            Service::new(
                &router,
                FnHandler::new("slow", move |_, _| {
                    let deadline = Instant::now() + WAIT;
                    while release.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Ok(json!("slow"))
                })
                .max_message_size(256),
            )
            .unwrap(),
        )
    };
    let (fast, _) = arith(&router, 256);
    let (hs, hf) = (slow.handle(), fast.handle());
    let pool = Pool::new(&router, [slow, fast], 2).unwrap();
    let ctx = router.context();

    let slow_reply = ctx.send_async(Message::from_value(hs, &json!(null)).unwrap()).unwrap();
    for _ in 0..10 {
        let got = call_timeout(&ctx, hf, &json!({"op": "ping"}), WAIT).unwrap();
        assert_eq!(got, json!({"ok": true}));
    }
    release.store(1, Ordering::SeqCst);

    let got = slow_reply.get_timeout(WAIT).unwrap();
    assert_eq!(got.decode(true).unwrap().into_value().unwrap(), json!("slow"));
    pool.stop().unwrap();
}

#[test]
fn work_spreads_over_named_workers() {
    let router = Router::local();
    let names = Arc::new(std::sync::Mutex::new(HashSet::new()));
    let handler = {
        let names = Arc::clone(&names);
        FnHandler::new("who", move |_, _| {
            let name = thread::current().name().unwrap_or_default().to_string();
            names.lock().unwrap().insert(name);
            thread::sleep(Duration::from_millis(2));
            Ok(json!(null))
        })
        .max_message_size(64)
    };
    let svc = Arc::new(Service::new(&router, handler).unwrap());
    let h = svc.handle();
    let config = PoolConfig::defaults().workers(4).name("spread");
    let pool = Pool::with_config(&router, [svc], &config).unwrap();
    let ctx = router.context();

    let pending: Vec<_> = (0..40)
        .map(|_| ctx.send_async(Message::from_value(h, &json!(null)).unwrap()).unwrap())
        .collect();
    for recv in pending {
        recv.get_timeout(WAIT).unwrap();
    }

    let names = names.lock().unwrap();
    assert!(!names.is_empty());
    assert!(names.iter().all(|n| n.starts_with(pool.name())), "{names:?}");
    drop(names);
    pool.stop().unwrap();
}

#[test]
fn router_shutdown_stops_pool_and_fails_callers() {
    let router = Router::local();
    let (svc, _) = arith(&router, 1024);
    let h = svc.handle();
    let pool = Pool::new(&router, [Arc::clone(&svc)], 3).unwrap();
    router.shutdown();

    let deadline = Instant::now() + WAIT;
    while pool.live_workers() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(pool.live_workers(), 0);
    assert!(call(&router.context(), h, &json!({"op": "ping"})).unwrap_err().is_closed());
    pool.stop().unwrap();
}

#[test]
fn fixed_handle_service_is_reachable_by_well_known_address() {
    let router = Router::local();
    let svc = Service::new(
        &router,
        FnHandler::new("clock", |_, _| Ok(json!("tick")))
            .handle(Handle(7))
            .max_message_size(64),
    )
    .unwrap();
    let pool = Pool::new(&router, [Arc::new(svc)], 1).unwrap();

    assert_eq!(call(&router.context(), Handle(7), &json!(null)).unwrap(), json!("tick"));
    pool.stop().unwrap();
}

#[test]
fn dropping_pool_without_stop_releases_workers() {
    let router = Router::local();
    let (svc, _) = arith(&router, 1024);
    let h = svc.handle();
    drop(Pool::new(&router, [Arc::clone(&svc)], 2).unwrap());

    // The service's receiver is free to join a new pool.
    let pool = Pool::new(&router, [svc], 1).unwrap();
    let got = call_timeout(&router.context(), h, &json!({"op": "ping"}), WAIT).unwrap();
    assert_eq!(got, json!({"ok": true}));
    pool.stop().unwrap();
}
