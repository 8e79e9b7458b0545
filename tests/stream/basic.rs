//! Stream handlers returning `Stream`s.

use std::sync::Arc;
use std::time::Duration;

use eventa_rust::{
    define_invoke_events, define_stream_invoke, define_stream_invoke_handler, Context,
    HandlerError, InvokeError,
};
use futures::stream::{self, StreamExt};

use crate::support::init_tracing;

fn count_to(n: u32) -> impl futures::Stream<Item = Result<u32, HandlerError>> {
    stream::iter((1..=n).map(Ok))
}

#[tokio::test]
async fn yields_values_in_order_then_ends() {
    init_tracing();
    let ctx = Context::new();
    let events = define_invoke_events::<u32, u32>(Some("count"));
    define_stream_invoke_handler(&ctx, &events, Arc::new(count_to));

    let client = define_stream_invoke(&ctx, &events);
    let values: Vec<u32> = client.call(3).map(|item| item.unwrap()).collect().await;

    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn error_after_values() {
    let ctx = Context::new();
    let events = define_invoke_events::<u32, ()>(None);
    define_stream_invoke_handler(
        &ctx,
        &events,
        Arc::new(|_: ()| {
            stream::iter(vec![Ok(1), Ok(2), Err(HandlerError::new("bad")), Ok(3)])
        }),
    );

    let client = define_stream_invoke(&ctx, &events);
    let items: Vec<_> = client.call(()).collect().await;

    assert_eq!(
        items,
        vec![
            Ok(1),
            Ok(2),
            Err(InvokeError::Handler { message: "bad".to_string() }),
        ]
    );
}

#[tokio::test]
async fn empty_stream_ends_cleanly() {
    let ctx = Context::new();
    let events = define_invoke_events::<u32, u32>(None);
    define_stream_invoke_handler(&ctx, &events, Arc::new(count_to));

    let client = define_stream_invoke(&ctx, &events);
    let items: Vec<_> = client.call(0).collect().await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn concurrent_streams_stay_separate() {
    let ctx = Context::new();
    let events = define_invoke_events::<String, String>(None);
    define_stream_invoke_handler(
        &ctx,
        &events,
        Arc::new(|prefix: String| {
            stream::iter(0..4).then(move |i| {
                let prefix = prefix.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    Ok::<_, HandlerError>(format!("{}{}", prefix, i))
                }
            })
        }),
    );

    let client = define_stream_invoke(&ctx, &events);
    let (a, b) = tokio::join!(
        client.call("a".to_string()).map(Result::unwrap).collect::<Vec<_>>(),
        client.call("b".to_string()).map(Result::unwrap).collect::<Vec<_>>(),
    );

    assert_eq!(a, vec!["a0", "a1", "a2", "a3"]);
    assert_eq!(b, vec!["b0", "b1", "b2", "b3"]);
}

#[tokio::test]
async fn cancelling_consumer_unregisters_call() {
    let ctx = Context::new();
    let events = define_invoke_events::<u64, ()>(None);
    define_stream_invoke_handler(
        &ctx,
        &events,
        Arc::new(|_: ()| {
            stream::unfold(0u64, |n| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Some((Ok::<_, HandlerError>(n), n + 1))
            })
        }),
    );

    let client = define_stream_invoke(&ctx, &events);
    let mut updates = client.call(());
    assert_eq!(updates.next().await, Some(Ok(0)));
    assert_eq!(updates.next().await, Some(Ok(1)));
    assert_eq!(client.pending(), 1);

    drop(updates);
    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn no_handler_is_reported_on_first_poll() {
    let ctx = Context::new();
    let events = define_invoke_events::<u32, u32>(Some("nobody"));
    let client = define_stream_invoke(&ctx, &events);

    let mut stream = client.call(1);
    let first = stream.next().await.unwrap().unwrap_err();
    assert_eq!(first.to_string(), "No invoke handler for event: nobody-send");
    assert!(stream.next().await.is_none());
}
