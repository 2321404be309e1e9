//! Engine - the single task that owns every component
//!
//! The `Engine` subscribes the telemetry topic on the registry, feeds every
//! delivered payload through decoder, trace store and scheduler, and keeps
//! eviction and completion deadlines in one timer queue. All mutation happens
//! through `&mut self`, so the whole core runs without locks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use tracemesh_config::{Config, MetricsConfig, MetricsFormat};
use tracemesh_correlate::{
    BrokerRegistry, DeferredTask, EventMovement, MovementId, MovementScheduler, TimerQueue,
    TraceStore,
};
use tracemesh_protocol::{InboundMessage, SpanDecoder};
use tracemesh_routing::{
    Callback, CallbackError, SubscriptionId, SubscriptionRegistry, Transport,
};

use crate::error::{PipelineError, Result};
use crate::metrics::EngineMetrics;
use crate::sink::MovementSink;

/// Sleep target when no timer is pending
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Correlation engine
///
/// # Example
///
/// ```ignore
/// let mut engine = Engine::new(&config, transport, JsonSpanDecoder, sink)?;
/// engine.connect();
/// engine.on_connected();
///
/// engine.handle_message("_telemetry/broker1", payload, Instant::now());
/// ```
pub struct Engine<T, D, S> {
    registry: SubscriptionRegistry<T>,
    telemetry_subscription: SubscriptionId,
    /// Payloads forwarded by the telemetry callback, drained after dispatch
    spans: mpsc::UnboundedReceiver<Bytes>,
    decoder: D,
    sink: S,
    topology: BrokerRegistry,
    store: TraceStore,
    scheduler: MovementScheduler,
    timers: TimerQueue<DeferredTask>,
    metrics: Arc<EngineMetrics>,
    metrics_config: MetricsConfig,
}

impl<T, D, S> Engine<T, D, S>
where
    T: Transport,
    D: SpanDecoder,
    S: MovementSink,
{
    /// Build the engine and register the telemetry subscription
    ///
    /// The subscription reaches the transport once it reports connected.
    ///
    /// # Errors
    ///
    /// Fails if the broker topology is inconsistent or no telemetry topic is
    /// configured.
    pub fn new(config: &Config, transport: T, decoder: D, sink: S) -> Result<Self> {
        if config.telemetry.topic.is_empty() {
            return Err(PipelineError::EmptyTopic);
        }

        let topology = BrokerRegistry::new(config.broker_records())?;
        let links = topology.links();

        let correlation = &config.correlation;
        let store = TraceStore::new(
            correlation.trace_ttl,
            correlation.client_origin_prefixes.iter().cloned(),
        );
        let scheduler = MovementScheduler::new(
            correlation.movement_duration,
            correlation.default_color,
            correlation.broker_fade,
        );

        let (tx, spans) = mpsc::unbounded_channel();
        let mut registry = SubscriptionRegistry::new(transport);
        let forward: Callback = Box::new(move |_topic: &str, payload: &Bytes| {
            tx.send(payload.clone())
                .map_err(|e| Box::new(e) as CallbackError)
        });
        let telemetry_subscription =
            registry.subscribe(config.telemetry.qos, &config.telemetry.topic, forward);

        info!(
            brokers = topology.len(),
            links = links.len(),
            topic = %config.telemetry.topic,
            trace_ttl_ms = correlation.trace_ttl.as_millis() as u64,
            movement_ms = correlation.movement_duration.as_millis() as u64,
            "engine configured"
        );

        Ok(Self {
            registry,
            telemetry_subscription,
            spans,
            decoder,
            sink,
            topology,
            store,
            scheduler,
            timers: TimerQueue::new(),
            metrics: Arc::new(EngineMetrics::new()),
            metrics_config: config.metrics.clone(),
        })
    }

    /// Ask the transport to connect
    pub fn connect(&mut self) {
        self.registry.connect();
    }

    /// Transport reports a (re)connection; live patterns are resubscribed
    pub fn on_connected(&mut self) {
        self.registry.on_connected();
    }

    /// Transport reports the connection dropped
    pub fn on_disconnected(&mut self) {
        self.registry.on_disconnected();
    }

    /// Process one inbound message
    ///
    /// Dispatches to every matching subscription, then correlates the spans
    /// the telemetry subscription forwarded. Returns the number of movements
    /// started.
    pub fn handle_message(&mut self, topic: &str, payload: Bytes, now: Instant) -> usize {
        self.metrics.record_message(payload.len() as u64);

        let report = self.registry.dispatch(topic, &payload);
        self.metrics
            .record_dispatch(report.matched, report.delivered, report.failed());
        if report.matched == 0 {
            trace!(topic, "message matched no subscription");
        }

        let mut started = 0;
        while let Ok(payload) = self.spans.try_recv() {
            started += self.process_span(&payload, now);
        }
        started
    }

    fn process_span(&mut self, payload: &[u8], now: Instant) -> usize {
        let span = match self.decoder.decode(payload) {
            Ok(span) => span,
            Err(e) => {
                self.metrics.record_decode_failure();
                debug!(error = %e, bytes = payload.len(), "dropping undecodable span");
                return 0;
            }
        };

        let outcome = self.store.ingest(span, now);
        self.metrics.record_span();
        if outcome.evicted_expired {
            self.metrics.record_trace_evicted();
        }
        if outcome.created {
            self.metrics.record_trace_created();
            self.timers.schedule(
                outcome.expires_at,
                DeferredTask::EvictTrace {
                    trace_id: outcome.trace_id.clone(),
                    epoch: outcome.epoch,
                },
            );
        }

        match self
            .scheduler
            .evaluate(&mut self.store, &self.topology, &outcome.trace_id, now)
        {
            Some(movement) => {
                self.start_movement(movement);
                1
            }
            None => 0,
        }
    }

    fn start_movement(&mut self, movement: EventMovement) {
        self.timers.schedule(
            movement.ends_at(),
            DeferredTask::CompleteMovement(movement.id),
        );
        self.metrics.record_movement_started();
        self.sink.on_event_movement(&movement);
    }

    /// Finish a movement early, e.g. when the renderer reports it done
    ///
    /// The pending completion timer is cancelled. Returns false for ids that
    /// are not in flight.
    pub fn complete_movement(&mut self, id: MovementId, now: Instant) -> bool {
        self.timers
            .cancel(|task| *task == DeferredTask::CompleteMovement(id));
        self.finish_movement(id, now)
    }

    fn finish_movement(&mut self, id: MovementId, now: Instant) -> bool {
        let Some(completion) = self
            .scheduler
            .complete(&mut self.store, &self.topology, id, now)
        else {
            return false;
        };

        self.metrics.record_movement_completed();
        if let Some(next) = completion.next {
            self.start_movement(next);
        }
        true
    }

    /// Run every timer due at or before `now`; returns how many fired
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let due = self.timers.pop_due(now);
        let fired = due.len();

        for task in due {
            match task {
                DeferredTask::EvictTrace { trace_id, epoch } => {
                    if self.store.evict_if_epoch(&trace_id, epoch).is_some() {
                        self.metrics.record_trace_evicted();
                    }
                }
                DeferredTask::CompleteMovement(id) => {
                    self.finish_movement(id, now);
                }
            }
        }

        fired
    }

    /// Drop every trace past its deadline, whether or not its timer fired
    ///
    /// Returns the number of traces evicted.
    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let evicted = self.store.evict_expired(now);
        for trace_id in &evicted {
            self.metrics.record_trace_evicted();
            debug!(trace_id = %trace_id, "expired trace swept");
        }
        evicted.len()
    }

    /// Earliest pending timer
    #[inline]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Run on the current task until shutdown
    ///
    /// Processes inbound messages, renderer completions and timers in one
    /// loop. When `inbound` closes the loop keeps running until the last
    /// movement has completed, then returns the engine.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        mut completions: mpsc::Receiver<MovementId>,
        shutdown: CancellationToken,
    ) -> Self {
        info!(
            subscription = %self.telemetry_subscription,
            connected = self.registry.is_connected(),
            "engine starting"
        );

        let reporting = self.metrics_config.enabled;
        let period = if reporting {
            self.metrics_config.interval
        } else {
            IDLE_WAIT
        };
        let mut report = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let ttl = self.store.ttl();
        let mut sweep = tokio::time::interval_at(tokio::time::Instant::now() + ttl, ttl);

        let mut inbound_open = true;
        let mut completions_open = true;

        loop {
            if !inbound_open && self.scheduler.in_flight() == 0 {
                debug!("input closed and no movement in flight");
                break;
            }

            let wake = self
                .next_deadline()
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + IDLE_WAIT);

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("engine shutdown requested");
                    break;
                }

                _ = tokio::time::sleep_until(wake) => {
                    self.fire_due(clock_now());
                }

                id = completions.recv(), if completions_open => match id {
                    Some(id) => {
                        self.complete_movement(id, clock_now());
                    }
                    None => completions_open = false,
                },

                message = inbound.recv(), if inbound_open => match message {
                    Some(message) => {
                        let now = clock_now();
                        self.fire_due(now);
                        self.handle_message(&message.topic, message.payload, now);
                    }
                    None => inbound_open = false,
                },

                _ = report.tick(), if reporting => {
                    self.report_metrics();
                }

                _ = sweep.tick() => {
                    self.sweep_expired(clock_now());
                }
            }
        }

        self.report_metrics();
        info!(
            traces = self.store.len(),
            in_flight = self.scheduler.in_flight(),
            "engine stopped"
        );
        self
    }

    /// Log the current counters
    pub fn report_metrics(&self) {
        let snapshot = self.metrics.snapshot();
        match self.metrics_config.format {
            MetricsFormat::Human => info!(
                messages = snapshot.messages_received,
                decode_failures = snapshot.decode_failures,
                callback_failures = snapshot.callback_failures,
                spans = snapshot.spans_ingested,
                live_traces = snapshot.live_traces(),
                movements_started = snapshot.movements_started,
                movements_completed = snapshot.movements_completed,
                "engine metrics"
            ),
            MetricsFormat::Json => match serde_json::to_string(&snapshot) {
                Ok(json) => info!(metrics = %json, "engine metrics"),
                Err(e) => debug!(error = %e, "failed to serialize metrics"),
            },
        }
    }

    /// Shared handle to the engine counters
    #[inline]
    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    #[inline]
    pub fn registry(&self) -> &SubscriptionRegistry<T> {
        &self.registry
    }

    /// Registry for adding subscriptions next to the telemetry one
    #[inline]
    pub fn registry_mut(&mut self) -> &mut SubscriptionRegistry<T> {
        &mut self.registry
    }

    #[inline]
    pub fn telemetry_subscription(&self) -> SubscriptionId {
        self.telemetry_subscription
    }

    #[inline]
    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    #[inline]
    pub fn scheduler(&self) -> &MovementScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn topology(&self) -> &BrokerRegistry {
        &self.topology
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<T, D, S> std::fmt::Debug for Engine<T, D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("brokers", &self.topology.len())
            .field("traces", &self.store.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}

/// Current time on tokio's clock, which tests can pause and advance
fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}
