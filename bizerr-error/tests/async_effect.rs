use bizerr_error::{sink, BizError, Context, ErrorFactory, ErrorOptions, LogSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn channel_sink() -> (LogSink, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = sink::from_fn(move |_, args| {
        let _ = tx.send(args.to_string());
    });
    (sink, rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_effect_receives_snapshot_and_context() {
    let (sink, mut logs) = channel_sink();
    let (tx, mut seen) = mpsc::unbounded_channel();

    let ctx = Context::background().with_value("trace_id", "t-1");
    let opts = ErrorOptions::new()
        .with_sink(sink)
        .with_stack(false)
        .with_detail("orderId=9")
        .with_async_effect(move |ctx, err| {
            let _ = tx.send((
                ctx.value("trace_id").map(String::from),
                err.code().to_string(),
                err.detail().to_string(),
            ));
        });

    let err = BizError::new(&ctx, "E7", "FAIL", "effect", opts).unwrap();
    assert!(err.has_async_effect());

    let (trace_id, code, detail) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(trace_id.as_deref(), Some("t-1"));
    assert_eq!(code, "E7");
    assert_eq!(detail, "orderId=9");

    // Only the construction line was logged.
    assert_eq!(logs.recv().await.unwrap(), err.to_string());
    assert!(logs.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panicking_effect_is_contained() {
    let (sink, mut logs) = channel_sink();

    let opts = ErrorOptions::new()
        .with_sink(sink)
        .with_stack(false)
        .with_async_effect(|_, _| panic!("metrics backend down"));

    let err = BizError::new(&Context::background(), "E8", "FAIL", "panics", opts).unwrap();
    assert_eq!(err.code(), "E8");

    let first = timeout(WAIT, logs.recv()).await.unwrap().unwrap();
    assert!(first.contains("code=E8"));

    let report = timeout(WAIT, logs.recv()).await.unwrap().unwrap();
    assert!(report.starts_with("SafeGo has panic:metrics backend down"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(logs.try_recv().is_err());
}

#[inline(never)]
fn push_order_metrics(code: &str) {
    if !code.is_empty() {
        panic!("metrics push rejected for {}", code);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panic_report_names_the_panicking_function() {
    let (sink, mut logs) = channel_sink();

    let opts = ErrorOptions::new()
        .with_sink(sink)
        .with_stack(false)
        .with_async_effect(|_, err| push_order_metrics(err.code()));

    BizError::new(&Context::background(), "E11", "FAIL", "metrics", opts).unwrap();

    let _constructed = timeout(WAIT, logs.recv()).await.unwrap().unwrap();
    let report = timeout(WAIT, logs.recv()).await.unwrap().unwrap();
    assert!(report.starts_with("SafeGo has panic:metrics push rejected for E11\n"));

    let stack = report.split_once('\n').unwrap().1;
    assert!(stack.contains("push_order_metrics"), "{}", stack);
    assert!(stack.len() <= bizerr_error::PANIC_STACK_CAPACITY);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_one_report_per_panicking_invocation() {
    const ERRORS: usize = 16;
    let (sink, mut logs) = channel_sink();
    let factory = ErrorFactory::new(sink)
        .with_profile(bizerr_error::ErrorProfile {
            store_stack: false,
            ..Default::default()
        })
        .with_async_effect(|_, err| panic!("effect for {}", err.code()));

    for i in 0..ERRORS {
        factory.error(&Context::background(), format!("E{}", i), "FAIL", "burst");
    }

    let mut constructed = 0;
    let mut panics = 0;
    while constructed + panics < ERRORS * 2 {
        let line = timeout(WAIT, logs.recv()).await.unwrap().unwrap();
        if line.starts_with("SafeGo has panic:effect for E") {
            panics += 1;
        } else {
            constructed += 1;
        }
    }

    assert_eq!(constructed, ERRORS);
    assert_eq!(panics, ERRORS);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_healthy_effects_keep_running_next_to_panicking_ones() {
    let (sink, _logs) = channel_sink();
    let ran = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done) = mpsc::unbounded_channel();

    for i in 0..8 {
        let ran = ran.clone();
        let done_tx = done_tx.clone();
        let opts = ErrorOptions::new()
            .with_sink(sink.clone())
            .with_stack(false)
            .with_async_effect(move |_, _| {
                if i % 2 == 0 {
                    panic!("even effect");
                }
                ran.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        BizError::new(&Context::background(), "E9", "FAIL", "mixed", opts).unwrap();
    }

    for _ in 0..4 {
        timeout(WAIT, done.recv()).await.unwrap().unwrap();
    }
    assert_eq!(ran.load(Ordering::SeqCst), 4);
}

#[test]
fn test_effect_without_runtime_uses_thread() {
    let (tx, rx) = std::sync::mpsc::channel();
    let opts = ErrorOptions::new()
        .with_sink(sink::null_sink())
        .with_stack(false)
        .with_async_effect(move |_, err| {
            let name = std::thread::current().name().map(String::from);
            let _ = tx.send((name, err.msg().to_string()));
        });

    BizError::new(&Context::background(), "E10", "FAIL", "no runtime", opts).unwrap();

    let (name, msg) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(name.as_deref(), Some("bizerr-effect"));
    assert_eq!(msg, "no runtime");
}
