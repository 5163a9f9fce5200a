//! ProxySink against a real local TCP listener

use cwbridge_core::{
    Checkpoint, CheckpointStore, DataPoint, MatchRule, MetricEmitter, MetricSink, Pipeline,
    PipelineOptions, ProxySink, RuleMatcher, RunError, SourceResolver, StatKind,
};
use cwbridge_test_utils::{FakeCloudWatch, elb_metric, sample, ts};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// No connection arrives at `listener` within a short grace period
async fn assert_never_connected(listener: &TcpListener) {
    let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
    assert!(accepted.is_err(), "proxy was contacted");
}

#[tokio::test]
async fn test_lines_arrive_after_flush() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).await.unwrap();
        received
    });

    let mut sink = ProxySink::new("127.0.0.1", port);
    assert_eq!(sink.addr(), format!("127.0.0.1:{port}"));
    assert!(!sink.is_connected());

    let mut emitter = MetricEmitter::new(&mut sink);
    emitter
        .emit(&DataPoint {
            metric: "aws.elb.latency".to_string(),
            statistic: StatKind::Average,
            value: 12.5,
            timestamp: ts(1_700_000_000),
            source: "my-lb".to_string(),
            tags: BTreeMap::new(),
        })
        .await
        .unwrap();
    emitter.flush().await.unwrap();
    assert_eq!(emitter.emitted(), 1);

    sink.write_line("aws.elb.requestcount.sum 3 1700000000 source=my-lb")
        .await
        .unwrap();
    sink.flush().await.unwrap();
    drop(sink);

    let received = server.await.unwrap();
    assert_eq!(
        received,
        "aws.elb.latency 12.5 1700000000 source=my-lb\naws.elb.requestcount.sum 3 1700000000 source=my-lb\n"
    );
}

#[tokio::test]
async fn test_locked_run_never_contacts_proxy() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("cp.json"), 5);
    let latency = elb_metric("Latency", "lb");
    let api = FakeCloudWatch::new()
        .with_page(vec![latency.clone()])
        .with_samples(&latency, vec![sample(StatKind::Sum, 1.0, 1_699_999_800)]);
    let matcher = RuleMatcher::new(vec![MatchRule::new("aws", [StatKind::Sum])]).unwrap();
    let resolver = SourceResolver::default();
    let pipeline = Pipeline::new(&api, &matcher, &resolver, &store, PipelineOptions::default());

    let _held = store.lock().unwrap();
    let mut sink = ProxySink::new("127.0.0.1", port);
    let err = pipeline.run(&mut sink, ts(1_700_000_100)).await.unwrap_err();

    assert!(matches!(err, RunError::Checkpoint(_)));
    assert!(!sink.is_connected());
    assert_never_connected(&listener).await;
}

#[tokio::test]
async fn test_empty_window_run_never_contacts_proxy() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("cp.json"), 5);
    store.save(&Checkpoint::new(ts(2_000_000_000))).unwrap();
    let api = FakeCloudWatch::new().with_page(vec![elb_metric("Latency", "lb")]);
    let matcher = RuleMatcher::new(vec![MatchRule::new("aws", [StatKind::Sum])]).unwrap();
    let resolver = SourceResolver::default();
    let pipeline = Pipeline::new(&api, &matcher, &resolver, &store, PipelineOptions::default());

    let mut sink = ProxySink::new("127.0.0.1", port);
    let report = pipeline.run(&mut sink, ts(1_700_000_100)).await.unwrap();

    assert!(report.window.is_empty());
    assert!(!sink.is_connected());
    assert_never_connected(&listener).await;
}
