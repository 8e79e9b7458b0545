//! Push-style handlers through `to_stream_handler`.

use std::sync::Arc;
use std::time::Duration;

use eventa_rust::{
    define_invoke_events, define_stream_invoke, define_stream_invoke_handler, to_stream_handler,
    Context, HandlerError, StreamEmitter,
};
use futures::StreamExt;

use crate::support::{Job, JobUpdate};

async fn run_job(job: Job, emit: StreamEmitter<JobUpdate>) -> Result<(), HandlerError> {
    for step in 1..=job.steps {
        tokio::time::sleep(Duration::from_millis(1)).await;
        emit.emit(JobUpdate::Progress { step });
    }
    emit.emit(JobUpdate::Result {
        output: format!("{} done", job.name),
    });
    Ok(())
}

#[tokio::test]
async fn progress_then_result() {
    let ctx = Context::new();
    let events = define_invoke_events::<JobUpdate, Job>(Some("job.run"));
    define_stream_invoke_handler(&ctx, &events, Arc::new(to_stream_handler(run_job)));

    let client = define_stream_invoke(&ctx, &events);
    let updates: Vec<JobUpdate> = client
        .call(Job {
            name: "build".to_string(),
            steps: 5,
        })
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(updates.len(), 6);
    assert!(updates[..5].iter().all(JobUpdate::is_progress));
    for (i, update) in updates[..5].iter().enumerate() {
        assert_eq!(*update, JobUpdate::Progress { step: i as u32 + 1 });
    }
    assert_eq!(
        updates[5],
        JobUpdate::Result {
            output: "build done".to_string()
        }
    );
}

#[tokio::test]
async fn emits_across_delays_keep_order() {
    let ctx = Context::new();
    let events = define_invoke_events::<String, ()>(None);
    let handler = to_stream_handler(|_: (), emit: StreamEmitter<String>| async move {
        emit.emit("a".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        emit.emit("b".to_string());
        Ok::<_, HandlerError>(())
    });
    define_stream_invoke_handler(&ctx, &events, Arc::new(handler));

    let client = define_stream_invoke(&ctx, &events);
    let items: Vec<String> = client.call(()).map(|item| item.unwrap()).collect().await;
    assert_eq!(items, vec!["a", "b"]);
}

#[tokio::test]
async fn handler_failure_after_emits() {
    let ctx = Context::new();
    let events = define_invoke_events::<u32, ()>(None);
    let handler = to_stream_handler(|_: (), emit: StreamEmitter<u32>| async move {
        emit.emit(1);
        emit.emit(2);
        Err(HandlerError::new("bad"))
    });
    define_stream_invoke_handler(&ctx, &events, Arc::new(handler));

    let client = define_stream_invoke(&ctx, &events);
    let items: Vec<_> = client.call(()).collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0], Ok(1));
    assert_eq!(items[1], Ok(2));
    assert_eq!(items[2].as_ref().unwrap_err().to_string(), "bad");
}
