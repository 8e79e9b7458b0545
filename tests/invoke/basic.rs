//! Round trips, handler failures and the no-handler policy.

use std::sync::Arc;
use std::time::Duration;

use eventa_rust::{
    define_invoke, define_invoke_events, define_invoke_handler, Context, EmitOptions,
    HandlerError, InvokeError,
};

use crate::support::{alice, create_user, init_tracing, CreateUser, UserCreated};

#[tokio::test]
async fn resolves_with_handler_result() {
    init_tracing();
    let ctx = Context::new();
    let events = define_invoke_events::<UserCreated, CreateUser>(Some("user.create"));
    define_invoke_handler(&ctx, &events, Arc::new(create_user));

    let invoke = define_invoke(&ctx, &events);
    let created = invoke.call(alice()).await.unwrap();

    assert_eq!(created, UserCreated { id: "alice-25".to_string() });
    assert_eq!(invoke.pending(), 0);
}

#[tokio::test]
async fn awaits_slow_handlers() {
    let ctx = Context::new();
    let events = define_invoke_events::<u64, u64>(None);
    define_invoke_handler(
        &ctx,
        &events,
        Arc::new(|ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, HandlerError>(ms * 2)
        }),
    );

    let invoke = define_invoke(&ctx, &events);
    assert_eq!(invoke.call(15).await.unwrap(), 30);
}

#[tokio::test]
async fn handler_error_rejects_with_message() {
    let ctx = Context::new();
    let events = define_invoke_events::<UserCreated, CreateUser>(None);
    define_invoke_handler(
        &ctx,
        &events,
        Arc::new(|_: CreateUser| async { Err::<UserCreated, _>(HandlerError::new("bad")) }),
    );

    let invoke = define_invoke(&ctx, &events);
    let err = invoke.call(alice()).await.unwrap_err();

    assert_eq!(err, InvokeError::Handler { message: "bad".to_string() });
    assert_eq!(err.to_string(), "bad");
}

#[tokio::test]
async fn any_display_error_is_carried() {
    let ctx = Context::new();
    let events = define_invoke_events::<i64, String>(None);
    define_invoke_handler(
        &ctx,
        &events,
        Arc::new(|text: String| async move { text.parse::<i64>() }),
    );

    let invoke = define_invoke(&ctx, &events);
    assert_eq!(invoke.call("42".to_string()).await.unwrap(), 42);

    let err = invoke.call("forty-two".to_string()).await.unwrap_err();
    assert_eq!(err.handler_message(), Some("invalid digit found in string"));
}

#[tokio::test]
async fn no_handler_fails_immediately() {
    let ctx = Context::new();
    let events = define_invoke_events::<UserCreated, CreateUser>(Some("user.create"));
    let invoke = define_invoke(&ctx, &events);

    let err = invoke.call(alice()).await.unwrap_err();
    assert_eq!(err.to_string(), "No invoke handler for event: user.create-send");
}

#[tokio::test]
async fn mismatched_response_type_fails_to_decode() {
    let ctx = Context::new();
    let handler_side = define_invoke_events::<String, ()>(Some("shape"));
    let caller_side = define_invoke_events::<u32, ()>(Some("shape"));
    define_invoke_handler(
        &ctx,
        &handler_side,
        Arc::new(|_: ()| async { Ok::<_, HandlerError>("not a number".to_string()) }),
    );

    let invoke = define_invoke(&ctx, &caller_side);
    let err = invoke.call(()).await.unwrap_err();
    assert!(matches!(err, InvokeError::DecodeFailed(_)));
}

#[tokio::test]
async fn timeout_layer_gives_up() {
    let ctx = Context::new();
    let events = define_invoke_events::<(), ()>(None);
    define_invoke_handler(
        &ctx,
        &events,
        Arc::new(|_: ()| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, HandlerError>(())
        }),
    );

    let invoke = define_invoke(&ctx, &events);
    let err = invoke
        .call_with_timeout((), Duration::from_millis(20))
        .await
        .unwrap_err();

    assert_eq!(err, InvokeError::Timeout(Duration::from_millis(20)));
    assert_eq!(invoke.pending(), 0);
}

#[tokio::test]
async fn emit_options_reach_listeners() {
    let ctx = Context::new();
    let events = define_invoke_events::<(), ()>(None);
    let seen = Arc::new(std::sync::Mutex::new(None));

    let sink = seen.clone();
    ctx.on(&events.send, move |_, options| {
        *sink.lock().unwrap() = options.get("trace").map(String::from);
    });
    define_invoke_handler(&ctx, &events, Arc::new(|_: ()| async { Ok::<_, HandlerError>(()) }));

    let invoke = define_invoke(&ctx, &events);
    invoke
        .call_with((), &EmitOptions::new().with_metadata("trace", "abc"))
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("abc"));
}
