//! Two contexts bridged by an in-process channel pair.

use std::sync::Arc;
use std::time::Duration;

use eventa_rust::transport::channel::{self, ChannelConfig};
use eventa_rust::transport::transport_error_event;
use eventa_rust::{
    define_invoke, define_invoke_events, define_invoke_handler, define_stream_invoke,
    define_stream_invoke_handler, to_stream_handler, Context, Event, HandlerError, StreamEmitter,
};
use futures::StreamExt;
use serde_json::json;

use crate::support::{body, init_tracing, next, record};

fn bridged() -> (Context, Context, eventa_rust::TransportHandle, eventa_rust::TransportHandle) {
    let main = Context::new();
    let worker = Context::new();
    let (left, right) = channel::pair(&ChannelConfig::default());
    let main_handle = left.attach(&main).unwrap();
    let worker_handle = right.attach(&worker).unwrap();
    (main, worker, main_handle, worker_handle)
}

#[tokio::test]
async fn invoke_across_contexts() {
    init_tracing();
    let (main, worker, _main_handle, _worker_handle) = bridged();
    let events = define_invoke_events::<String, String>(Some("greet"));
    define_invoke_handler(
        &worker,
        &events,
        Arc::new(|name: String| async move { Ok::<_, HandlerError>(format!("hello {}", name)) }),
    );

    let greet = define_invoke(&main, &events);
    let reply = tokio::time::timeout(Duration::from_secs(1), greet.call("alice".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, "hello alice");
}

#[tokio::test]
async fn invoke_error_across_contexts() {
    let (main, worker, _main_handle, _worker_handle) = bridged();
    let events = define_invoke_events::<(), ()>(None);
    define_invoke_handler(
        &worker,
        &events,
        Arc::new(|_: ()| async { Err::<(), _>(HandlerError::new("bad")) }),
    );

    let invoke = define_invoke(&main, &events);
    let err = invoke.call(()).await.unwrap_err();
    assert_eq!(err.to_string(), "bad");
}

#[tokio::test]
async fn concurrent_invokes_across_contexts() {
    let (main, worker, _main_handle, _worker_handle) = bridged();
    let events = define_invoke_events::<u64, u64>(None);
    define_invoke_handler(
        &worker,
        &events,
        Arc::new(|n: u64| async move {
            tokio::time::sleep(Duration::from_millis(20 - n)).await;
            Ok::<_, HandlerError>(n * 10)
        }),
    );

    let invoke = define_invoke(&main, &events);
    let results = futures::future::join_all((0..20).map(|n| invoke.call(n))).await;
    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), n as u64 * 10);
    }
}

#[tokio::test]
async fn stream_across_contexts() {
    let (main, worker, _main_handle, _worker_handle) = bridged();
    let events = define_invoke_events::<u32, u32>(None);
    let handler = to_stream_handler(|n: u32, emit: StreamEmitter<u32>| async move {
        for i in 1..=n {
            emit.emit(i);
        }
        Ok::<_, HandlerError>(())
    });
    define_stream_invoke_handler(&worker, &events, Arc::new(handler));

    let client = define_stream_invoke(&main, &events);
    let values: Vec<u32> = client.call(4).map(|item| item.unwrap()).collect().await;
    assert_eq!(values, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn inbound_events_are_not_echoed() {
    let (main, worker, main_handle, worker_handle) = bridged();
    let ping = Event::new("ping");
    let mut on_main = record(&main, &ping);
    let mut on_worker = record(&worker, &ping);

    main.emit(&ping, json!(1));

    let local = next(&mut on_main).await;
    assert!(!local.is_inbound());
    let remote = next(&mut on_worker).await;
    assert!(remote.is_inbound());
    assert_eq!(body(&remote), &json!(1));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(on_main.try_recv().is_err());
    assert!(on_worker.try_recv().is_err());

    let worker_stats = worker_handle.stop().await;
    let main_stats = main_handle.stop().await;
    assert_eq!(main_stats.sent, 1);
    assert_eq!(worker_stats.received, 1);
    assert_eq!(worker_stats.sent, 0);
}

#[tokio::test]
async fn malformed_wire_data_becomes_error_event() {
    let main = Context::new();
    let (left, right) = channel::pair(&ChannelConfig::default());
    let raw = right.raw_sender();
    let handle = left.attach(&main).unwrap();
    let mut errors = record(&main, &transport_error_event());

    raw.send("{\"id\":".to_string()).await.unwrap();

    let error = next(&mut errors).await;
    assert!(body(&error)["error"]
        .as_str()
        .unwrap()
        .starts_with("malformed envelope"));

    drop(right);
    let stats = handle.stop().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.received, 0);
}

#[tokio::test]
async fn stopped_transport_no_longer_forwards() {
    let (main, worker, main_handle, _worker_handle) = bridged();
    let ping = Event::new("ping");
    let mut on_worker = record(&worker, &ping);

    main_handle.stop().await;
    main.emit(&ping, json!(1));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(on_worker.try_recv().is_err());
}
