//! Engine tests
//!
//! Drive the engine synchronously with injected time, then through the async
//! `run` loop on a paused tokio clock.

use std::str::FromStr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tracemesh_config::{BrokerConfig, Config};
use tracemesh_correlate::Color;
use tracemesh_protocol::{InboundMessage, JsonSpanDecoder};
use tracemesh_routing::{RecordingTransport, TransportCall};

use crate::{Engine, PipelineError, RecordingSink};

const ROOT: &str = "0000000000000000";
const TOPIC: &str = "_telemetry/broker/trace";

type TestEngine = Engine<RecordingTransport, JsonSpanDecoder, RecordingSink>;

fn config() -> Config {
    Config::from_str(
        r#"
[metrics]
enabled = false

[[brokers]]
name = "broker1"
region = "us-east-1"
connected_brokers = ["broker2"]

[[brokers]]
name = "broker2"
region = "eu-west-1"

[[brokers]]
name = "broker3"
region = "ap-northeast-1"
"#,
    )
    .unwrap()
}

fn engine() -> TestEngine {
    let mut engine = Engine::new(
        &config(),
        RecordingTransport::new(),
        JsonSpanDecoder::new(),
        RecordingSink::new(),
    )
    .unwrap();
    engine.connect();
    engine.on_connected();
    engine
}

fn span(trace: &str, id: &str, parent: &str, origin: &str) -> Bytes {
    Bytes::from(
        json!({
            "trace_id": trace,
            "span_id": id,
            "parent_span_id": parent,
            "origin": origin,
        })
        .to_string(),
    )
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ============================================================================
// Construction tests
// ============================================================================

#[test]
fn test_new_subscribes_telemetry_topic_on_connect() {
    let engine = engine();

    assert_eq!(
        engine.registry().transport().calls(),
        &[
            TransportCall::Connect,
            TransportCall::Subscribe {
                pattern: "_telemetry/#".into(),
                qos: 0
            }
        ]
    );
    assert_eq!(engine.topology().len(), 3);
}

#[test]
fn test_new_rejects_duplicate_brokers() {
    let mut config = Config::default();
    let broker = BrokerConfig {
        name: "broker1".into(),
        region: "us-east-1".into(),
        connected_brokers: Vec::new(),
    };
    config.brokers = vec![broker.clone(), broker];

    let result = Engine::new(
        &config,
        RecordingTransport::new(),
        JsonSpanDecoder::new(),
        RecordingSink::new(),
    );
    assert!(matches!(result, Err(PipelineError::Topology(_))));
}

#[test]
fn test_new_rejects_empty_topic() {
    let mut config = Config::default();
    config.telemetry.topic.clear();

    let result = Engine::new(
        &config,
        RecordingTransport::new(),
        JsonSpanDecoder::new(),
        RecordingSink::new(),
    );
    assert!(matches!(result, Err(PipelineError::EmptyTopic)));
}

// ============================================================================
// Message handling tests
// ============================================================================

#[test]
fn test_child_span_emits_movement_to_parent_broker() {
    let mut engine = engine();
    let t0 = Instant::now();

    assert_eq!(engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0), 0);
    assert_eq!(engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0), 1);

    let movements = engine.sink().movements();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].from_broker.name, "broker2");
    assert_eq!(movements[0].to_broker.name, "broker1");
    assert_eq!(movements[0].color, Color::Green);

    let metrics = engine.metrics().snapshot();
    assert_eq!(metrics.messages_received, 2);
    assert_eq!(metrics.spans_ingested, 2);
    assert_eq!(metrics.traces_created, 1);
    assert_eq!(metrics.movements_started, 1);
}

#[test]
fn test_unmatched_topic_is_not_ingested() {
    let mut engine = engine();

    engine.handle_message("other/topic", span("aa", "a1", ROOT, "broker1"), Instant::now());

    assert!(engine.store().is_empty());
    assert_eq!(engine.metrics().snapshot().unmatched_messages, 1);
}

#[test]
fn test_decode_failure_is_dropped() {
    let mut engine = engine();

    engine.handle_message(TOPIC, Bytes::from_static(b"not json"), Instant::now());
    engine.handle_message(TOPIC, Bytes::new(), Instant::now());

    let metrics = engine.metrics().snapshot();
    assert_eq!(metrics.decode_failures, 2);
    assert_eq!(metrics.spans_ingested, 0);
    assert!(engine.store().is_empty());
}

#[test]
fn test_failing_extra_subscription_does_not_block_telemetry() {
    let mut engine = engine();
    engine
        .registry_mut()
        .subscribe(0, "_telemetry/+/+", Box::new(|_, _| Err("boom".into())));
    let t0 = Instant::now();

    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);
    engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0);

    assert_eq!(engine.sink().movements().len(), 1);
    assert_eq!(engine.metrics().snapshot().callback_failures, 2);
}

// ============================================================================
// Timer tests
// ============================================================================

#[test]
fn test_completion_timer_starts_next_movement() {
    let mut engine = engine();
    let t0 = Instant::now();
    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);
    engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0);
    engine.handle_message(TOPIC, span("aa", "b2", "a1", "broker3"), t0);
    assert_eq!(engine.sink().movements().len(), 1);
    assert_eq!(engine.next_deadline(), Some(t0 + ms(300)));

    assert_eq!(engine.fire_due(t0 + ms(299)), 0);
    assert_eq!(engine.fire_due(t0 + ms(300)), 1);

    let movements = engine.sink().movements();
    assert_eq!(movements.len(), 2);
    assert_eq!(movements[1].span_id, "b2");
    assert_eq!(movements[1].started_at, t0 + ms(300));

    engine.fire_due(t0 + ms(600));
    assert_eq!(engine.scheduler().in_flight(), 0);
    assert_eq!(engine.metrics().snapshot().movements_completed, 2);
}

#[test]
fn test_renderer_completion_cancels_timer() {
    let mut engine = engine();
    let t0 = Instant::now();
    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);
    engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0);
    let id = engine.sink().movements()[0].id;

    assert!(engine.complete_movement(id, t0 + ms(100)));
    assert!(!engine.complete_movement(id, t0 + ms(101)));

    // Only the eviction timer is left
    assert_eq!(engine.next_deadline(), Some(t0 + ms(15_000)));
    assert_eq!(engine.fire_due(t0 + ms(300)), 0);
}

#[test]
fn test_trace_evicted_at_deadline() {
    let mut engine = engine();
    let t0 = Instant::now();
    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);
    engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0 + ms(14_000));
    engine.fire_due(t0 + ms(14_300));

    engine.fire_due(t0 + ms(14_999));
    assert!(engine.store().contains("aa"));

    engine.fire_due(t0 + ms(15_000));
    assert!(engine.store().is_empty());
    assert_eq!(engine.metrics().snapshot().traces_evicted, 1);
}

#[test]
fn test_sweep_expired_evicts_without_timer() {
    let mut engine = engine();
    let t0 = Instant::now();
    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);
    engine.handle_message(TOPIC, span("bb", "a1", ROOT, "broker1"), t0 + ms(5_000));

    assert_eq!(engine.sweep_expired(t0 + ms(15_000)), 1);
    assert!(!engine.store().contains("aa"));
    assert!(engine.store().contains("bb"));

    // The eviction timer for the swept trace finds nothing to do
    engine.fire_due(t0 + ms(15_000));
    assert_eq!(engine.metrics().snapshot().traces_evicted, 1);
}

#[test]
fn test_movement_outliving_trace_completes() {
    let mut engine = engine();
    let t0 = Instant::now();
    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);
    engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0 + ms(14_900));

    assert_eq!(engine.fire_due(t0 + ms(15_200)), 2);

    assert!(engine.store().is_empty());
    assert_eq!(engine.scheduler().in_flight(), 0);
    assert_eq!(engine.scheduler().stats().orphaned_completions, 1);
}

#[test]
fn test_late_span_after_eviction_opens_new_trace() {
    let mut engine = engine();
    let t0 = Instant::now();
    engine.handle_message(TOPIC, span("aa", "a1", ROOT, "broker1"), t0);

    engine.handle_message(TOPIC, span("aa", "b1", "a1", "broker2"), t0 + ms(15_000));

    // The parent went with the old trace, so nothing can move
    assert!(engine.sink().movements().is_empty());
    assert_eq!(engine.metrics().snapshot().traces_created, 2);
    assert_eq!(engine.metrics().snapshot().traces_evicted, 1);

    // The stale eviction timer leaves the new trace alone
    engine.fire_due(t0 + ms(15_000));
    assert!(engine.store().contains("aa"));
}

// ============================================================================
// Run loop tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_plays_movements_back_to_back_then_stops() {
    let engine = engine();
    let (tx, rx) = mpsc::channel(16);
    let (_completions_tx, completions_rx) = mpsc::channel(16);

    for (id, parent, origin) in [
        ("a1", ROOT, "broker1"),
        ("b1", "a1", "broker2"),
        ("b2", "a1", "broker3"),
        ("c1", "b1", "broker3"),
    ] {
        tx.send(InboundMessage::new(TOPIC, span("aa", id, parent, origin)))
            .await
            .unwrap();
    }
    drop(tx);

    let started = tokio::time::Instant::now();
    let engine = engine
        .run(rx, completions_rx, CancellationToken::new())
        .await;

    let spans: Vec<_> = engine
        .sink()
        .movements()
        .iter()
        .map(|m| m.span_id.clone())
        .collect();
    assert_eq!(spans, vec!["b1", "b2", "c1"]);
    assert_eq!(engine.scheduler().in_flight(), 0);
    assert!(started.elapsed() >= ms(900));
}

#[tokio::test(start_paused = true)]
async fn test_run_accepts_renderer_completions() {
    let engine = engine();
    let (tx, rx) = mpsc::channel(16);
    let (completions_tx, completions_rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(engine.run(rx, completions_rx, shutdown.clone()));

    tx.send(InboundMessage::new(TOPIC, span("aa", "a1", ROOT, "broker1")))
        .await
        .unwrap();
    tx.send(InboundMessage::new(TOPIC, span("aa", "b1", "a1", "broker2")))
        .await
        .unwrap();
    tokio::task::yield_now().await;
    tokio::time::sleep(ms(10)).await;

    completions_tx
        .send(tracemesh_correlate::MovementId::new(1))
        .await
        .unwrap();
    tokio::time::sleep(ms(10)).await;
    shutdown.cancel();

    let engine = handle.await.unwrap();
    assert_eq!(engine.sink().movements().len(), 1);
    assert_eq!(engine.scheduler().in_flight(), 0);
    assert_eq!(engine.metrics().snapshot().movements_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let engine = engine();
    let (_tx, rx) = mpsc::channel::<InboundMessage>(16);
    let (_completions_tx, completions_rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let engine = engine.run(rx, completions_rx, shutdown).await;
    assert!(engine.store().is_empty());
}
