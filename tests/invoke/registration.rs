//! Handler identity, disposal and batch registration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eventa_rust::{
    boxed_invoke_handler, define_invoke, define_invoke_events, define_invoke_handler,
    define_invoke_handlers, define_invokes, undefine_invoke_handler, Context, HandlerError,
    InvokeError,
};

#[tokio::test]
async fn same_handler_registered_twice_runs_once() {
    let ctx = Context::new();
    let events = define_invoke_events::<usize, ()>(None);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let handler = Arc::new(move |_: ()| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok::<_, HandlerError>(n) }
    });
    let first = define_invoke_handler(&ctx, &events, handler.clone());
    let second = define_invoke_handler(&ctx, &events, handler);
    assert_eq!(first, second);

    let invoke = define_invoke(&ctx, &events);
    assert_eq!(invoke.call(()).await.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disposed_handler_no_longer_answers() {
    let ctx = Context::new();
    let events = define_invoke_events::<u32, u32>(Some("inc"));
    let token = define_invoke_handler(
        &ctx,
        &events,
        Arc::new(|n: u32| async move { Ok::<_, HandlerError>(n + 1) }),
    );
    let invoke = define_invoke(&ctx, &events);
    assert_eq!(invoke.call(1).await.unwrap(), 2);

    assert!(token.dispose());
    assert!(matches!(
        invoke.call(1).await,
        Err(InvokeError::NoHandler(_))
    ));
}

#[tokio::test]
async fn undefine_without_token_removes_all() {
    let ctx = Context::new();
    let events = define_invoke_events::<u32, u32>(None);
    define_invoke_handler(&ctx, &events, Arc::new(|n: u32| async move { Ok::<_, HandlerError>(n) }));
    define_invoke_handler(&ctx, &events, Arc::new(|n: u32| async move { Ok::<_, HandlerError>(n) }));

    assert!(undefine_invoke_handler(&ctx, &events, None));
    assert_eq!(ctx.listener_count(&events.send), 0);
    assert!(!undefine_invoke_handler(&ctx, &events, None));
}

#[tokio::test]
async fn batch_registration_by_name() {
    let ctx = Context::new();
    let mut events = BTreeMap::new();
    events.insert("double".to_string(), define_invoke_events::<i64, i64>(Some("math.double")));
    events.insert("negate".to_string(), define_invoke_events::<i64, i64>(Some("math.negate")));

    let mut handlers = BTreeMap::new();
    handlers.insert(
        "double".to_string(),
        boxed_invoke_handler(|n: i64| async move { Ok(n * 2) }),
    );
    handlers.insert(
        "negate".to_string(),
        boxed_invoke_handler(|n: i64| async move { Ok(-n) }),
    );

    let tokens = define_invoke_handlers(&ctx, &events, &handlers).unwrap();
    assert_eq!(tokens.len(), 2);

    let invokes = define_invokes(&ctx, &events);
    assert_eq!(invokes["double"].call(21).await.unwrap(), 42);
    assert_eq!(invokes["negate"].call(5).await.unwrap(), -5);
}

#[test]
fn batch_registration_rejects_missing_handler() {
    let ctx = Context::new();
    let mut events = BTreeMap::new();
    events.insert("double".to_string(), define_invoke_events::<i64, i64>(None));
    events.insert("negate".to_string(), define_invoke_events::<i64, i64>(None));

    let mut handlers = BTreeMap::new();
    handlers.insert(
        "double".to_string(),
        boxed_invoke_handler(|n: i64| async move { Ok(n * 2) }),
    );

    let err = define_invoke_handlers(&ctx, &events, &handlers).unwrap_err();
    assert_eq!(
        err,
        InvokeError::MismatchedKeys {
            missing_handlers: vec!["negate".to_string()],
            missing_events: vec![],
        }
    );
    assert_eq!(ctx.listener_count(&events["double"].send), 0);
}
