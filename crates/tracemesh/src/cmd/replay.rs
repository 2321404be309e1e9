//! Replay command - feed a recorded capture through the engine
//!
//! A capture is JSON lines, one inbound message per line:
//!
//! ```text
//! {"offset_ms": 0,   "topic": "_telemetry/broker1", "payload": {"trace_id": "aa", ...}}
//! {"offset_ms": 120, "topic": "_telemetry/broker2", "payload": {"trace_id": "aa", ...}}
//! ```
//!
//! Messages are delivered at their offset (divided by `--speed`) and every
//! movement is written to stdout as one JSON line. A string payload is sent
//! as-is, which lets captures carry raw or malformed payloads.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tracemesh_config::Config;
use tracemesh_correlate::{Color, Coordinates, EventMovement};
use tracemesh_pipeline::{
    ChannelSink, DEFAULT_CHANNEL_SIZE, DEFAULT_INBOUND_CHANNEL_SIZE, Engine, MovementSink,
};
use tracemesh_protocol::{InboundMessage, JsonSpanDecoder};
use tracemesh_routing::RecordingTransport;

type ReplayEngine<S> = Engine<RecordingTransport, JsonSpanDecoder, S>;

/// Replay command arguments
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines capture to replay
    #[arg(short, long)]
    pub input: PathBuf,

    /// Playback speed multiplier (2 plays twice as fast)
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,
}

/// One line of a capture file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptureLine {
    /// Delay from the start of the replay
    #[serde(default)]
    pub offset_ms: u64,
    pub topic: String,
    pub payload: serde_json::Value,
}

impl CaptureLine {
    fn into_message(self) -> InboundMessage {
        let payload = match self.payload {
            serde_json::Value::String(raw) => raw,
            other => other.to_string(),
        };
        InboundMessage::new(self.topic, payload)
    }
}

/// Run the replay command
pub async fn run(args: ReplayArgs, config: Config) -> Result<()> {
    if !(args.speed.is_finite() && args.speed > 0.0) {
        anyhow::bail!("--speed must be a positive number, got {}", args.speed);
    }

    let contents = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("failed to read capture {}", args.input.display()))?;
    let lines = parse_capture(&contents)?;

    info!(
        input = %args.input.display(),
        messages = lines.len(),
        speed = args.speed,
        "replaying capture"
    );

    let (movement_tx, movement_rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
    let engine = Engine::new(
        &config,
        RecordingTransport::new(),
        JsonSpanDecoder::new(),
        ChannelSink::new(movement_tx),
    )
    .context("failed to build engine")?;

    let started = tokio::time::Instant::now().into_std();
    let printer = tokio::spawn(print_movements(movement_rx, started));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(shutdown.clone()));

    let engine = replay(engine, lines, args.speed, shutdown).await;
    let snapshot = engine.metrics().snapshot();
    let dropped = engine.sink().dropped();
    // Closes the movement channel so the printer finishes
    drop(engine);

    let printed = printer.await.context("movement printer panicked")??;

    if dropped > 0 {
        warn!(dropped, "movements dropped by a full output channel");
    }
    info!(
        messages = snapshot.messages_received,
        decode_failures = snapshot.decode_failures,
        traces = snapshot.traces_created,
        movements = printed,
        "replay finished"
    );
    Ok(())
}

/// Parse a capture, ordered by offset
///
/// Blank lines are skipped. Lines with equal offsets keep their file order.
pub fn parse_capture(contents: &str) -> Result<Vec<CaptureLine>> {
    let mut lines = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: CaptureLine = serde_json::from_str(line)
            .with_context(|| format!("capture line {} is not a valid message", index + 1))?;
        lines.push(parsed);
    }

    lines.sort_by_key(|line| line.offset_ms);
    Ok(lines)
}

/// Wall-clock delay for a capture offset at the given speed
fn scaled_offset(offset_ms: u64, speed: f64) -> Duration {
    Duration::from_secs_f64(offset_ms as f64 / 1000.0 / speed)
}

/// Drive the engine over a capture and return it once every movement ended
async fn replay<S: MovementSink>(
    mut engine: ReplayEngine<S>,
    lines: Vec<CaptureLine>,
    speed: f64,
    shutdown: CancellationToken,
) -> ReplayEngine<S> {
    engine.connect();
    engine.on_connected();

    let (inbound_tx, inbound_rx) = mpsc::channel(DEFAULT_INBOUND_CHANNEL_SIZE);
    // Nothing reports completions during a replay; timers end every movement
    let (_completions_tx, completions_rx) = mpsc::channel(1);

    tokio::spawn(feed(lines, speed, inbound_tx, shutdown.clone()));
    engine.run(inbound_rx, completions_rx, shutdown).await
}

/// Send each line at its offset; dropping `tx` tells the engine input ended
async fn feed(
    lines: Vec<CaptureLine>,
    speed: f64,
    tx: mpsc::Sender<InboundMessage>,
    shutdown: CancellationToken,
) -> usize {
    let start = tokio::time::Instant::now();
    let mut sent = 0;

    for line in lines {
        let at = start + scaled_offset(line.offset_ms, speed);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep_until(at) => {}
        }
        if tx.send(line.into_message()).await.is_err() {
            break;
        }
        sent += 1;
    }

    sent
}

/// Movement as printed on stdout
#[derive(Debug, Serialize)]
struct MovementLine<'a> {
    id: u64,
    trace_id: &'a str,
    span_id: &'a str,
    from_broker: &'a str,
    to_broker: &'a str,
    from: Option<Coordinates>,
    to: Option<Coordinates>,
    color: Color,
    offset_ms: u64,
    duration_ms: u64,
}

impl<'a> MovementLine<'a> {
    fn new(movement: &'a EventMovement, started: Instant) -> Self {
        Self {
            id: movement.id.get(),
            trace_id: &movement.trace_id,
            span_id: &movement.span_id,
            from_broker: &movement.from_broker.name,
            to_broker: &movement.to_broker.name,
            from: movement.from_broker.coordinates(),
            to: movement.to_broker.coordinates(),
            color: movement.color,
            offset_ms: movement.started_at.saturating_duration_since(started).as_millis() as u64,
            duration_ms: movement.duration.as_millis() as u64,
        }
    }
}

async fn print_movements(mut rx: mpsc::Receiver<EventMovement>, started: Instant) -> Result<u64> {
    let mut stdout = tokio::io::stdout();
    let mut printed = 0;

    while let Some(movement) = rx.recv().await {
        let mut line = serde_json::to_vec(&MovementLine::new(&movement, started))?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        printed += 1;
    }

    stdout.flush().await?;
    Ok(printed)
}

async fn cancel_on_interrupt(shutdown: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, stopping replay");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "failed to install Ctrl+C handler"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use tracemesh_pipeline::RecordingSink;

    const CONFIG: &str = r#"
[metrics]
enabled = false

[[brokers]]
name = "broker1"
region = "us-east-1"

[[brokers]]
name = "broker2"
region = "eu-west-1"
"#;

    const CAPTURE: &str = r#"
{"offset_ms": 50, "topic": "_telemetry/broker2", "payload": {"trace_id": "aa", "span_id": "b1", "parent_span_id": "a1", "origin": "broker2"}}

{"offset_ms": 0, "topic": "_telemetry/broker1", "payload": {"trace_id": "aa", "span_id": "a1", "parent_span_id": "0000000000000000", "origin": "broker1", "attributes": {"color": "red"}}}
{"offset_ms": 60, "topic": "_telemetry/broker2", "payload": "not a span"}
"#;

    fn engine() -> ReplayEngine<RecordingSink> {
        let config = Config::from_str(CONFIG).unwrap();
        Engine::new(
            &config,
            RecordingTransport::new(),
            JsonSpanDecoder::new(),
            RecordingSink::new(),
        )
        .unwrap()
    }

    // ========================================================================
    // Capture parsing tests
    // ========================================================================

    #[test]
    fn test_parse_capture_sorts_by_offset_and_skips_blanks() {
        let lines = parse_capture(CAPTURE).unwrap();

        let offsets: Vec<_> = lines.iter().map(|l| l.offset_ms).collect();
        assert_eq!(offsets, vec![0, 50, 60]);
        assert_eq!(lines[0].topic, "_telemetry/broker1");
    }

    #[test]
    fn test_parse_capture_reports_line_number() {
        let err = parse_capture("{\"topic\": \"t\", \"payload\": {}}\n{oops").unwrap_err();
        assert!(err.to_string().contains("capture line 2"));
    }

    #[test]
    fn test_offset_defaults_to_zero() {
        let lines = parse_capture(r#"{"topic": "t", "payload": {}}"#).unwrap();
        assert_eq!(lines[0].offset_ms, 0);
    }

    #[test]
    fn test_string_payload_is_sent_verbatim() {
        let line = CaptureLine {
            offset_ms: 0,
            topic: "t".into(),
            payload: serde_json::Value::String("raw bytes".into()),
        };
        assert_eq!(&line.into_message().payload[..], b"raw bytes");

        let line = CaptureLine {
            offset_ms: 0,
            topic: "t".into(),
            payload: serde_json::json!({"a": 1}),
        };
        assert_eq!(&line.into_message().payload[..], br#"{"a":1}"#);
    }

    #[test]
    fn test_scaled_offset() {
        assert_eq!(scaled_offset(1000, 1.0), Duration::from_secs(1));
        assert_eq!(scaled_offset(1000, 4.0), Duration::from_millis(250));
        assert_eq!(scaled_offset(0, 2.0), Duration::ZERO);
    }

    // ========================================================================
    // Replay tests
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_replay_emits_movement_and_waits_for_it() {
        let started = tokio::time::Instant::now();
        let lines = parse_capture(CAPTURE).unwrap();

        let engine = replay(engine(), lines, 1.0, CancellationToken::new()).await;

        let movements = engine.sink().movements();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].from_broker.name, "broker2");
        assert_eq!(movements[0].to_broker.name, "broker1");
        assert_eq!(engine.metrics().snapshot().decode_failures, 1);
        assert_eq!(engine.scheduler().in_flight(), 0);
        // Child arrives at 50ms, movement runs 300ms
        assert!(started.elapsed() >= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_speed_shortens_offsets() {
        let started = tokio::time::Instant::now();
        let lines = parse_capture(CAPTURE).unwrap();

        let engine = replay(engine(), lines, 10.0, CancellationToken::new()).await;

        assert_eq!(engine.sink().movements().len(), 1);
        // 50ms / 10 plus the movement itself
        assert!(started.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_stops_on_shutdown() {
        let lines = parse_capture(CAPTURE).unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let engine = replay(engine(), lines, 1.0, shutdown).await;
        assert!(engine.sink().movements().is_empty());
    }

    #[tokio::test]
    async fn test_print_movements_counts_lines_until_channel_closes() {
        let mut engine = engine();
        engine.connect();
        engine.on_connected();
        let t0 = Instant::now();
        for line in parse_capture(CAPTURE).unwrap() {
            let message = line.into_message();
            engine.handle_message(&message.topic, message.payload, t0);
        }

        let (tx, rx) = mpsc::channel(4);
        for movement in engine.sink_mut().drain() {
            tx.send(movement).await.unwrap();
        }
        drop(tx);

        assert_eq!(print_movements(rx, t0).await.unwrap(), 1);
    }

    #[test]
    fn test_movement_line_serializes_brokers_and_color() {
        let mut engine = engine();
        engine.connect();
        engine.on_connected();
        let t0 = Instant::now();
        for line in parse_capture(CAPTURE).unwrap() {
            let message = line.into_message();
            engine.handle_message(&message.topic, message.payload, t0 + Duration::from_millis(5));
        }

        let movement = &engine.sink().movements()[0];
        let json = serde_json::to_value(MovementLine::new(movement, t0)).unwrap();
        assert_eq!(json["from_broker"], "broker2");
        assert_eq!(json["to_broker"], "broker1");
        assert_eq!(json["color"], "green");
        assert_eq!(json["offset_ms"], 5);
        assert_eq!(json["duration_ms"], 300);
        assert_eq!(json["to"]["location"], "Virginia, USA");
    }
}
