//! Trace store
//!
//! Holds in-flight traces and indexes their spans by id and by parent id.
//! A trace lives for a fixed window measured from its first span; new spans
//! never extend it.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use tracemesh_protocol::{AttributeValue, DecodedSpan};

/// One span inside a trace
#[derive(Debug, Clone)]
pub struct Span {
    span_id: String,
    parent_span_id: Option<String>,
    origin: String,
    client_name: Option<String>,
    attributes: BTreeMap<String, AttributeValue>,
    root: bool,
    eligible_for_movement: bool,
    already_moved: bool,
}

impl Span {
    fn from_decoded(decoded: DecodedSpan, root: bool) -> Self {
        Self {
            span_id: decoded.span_id,
            parent_span_id: decoded.parent_span_id,
            origin: decoded.origin,
            client_name: decoded.client_name,
            attributes: decoded.attributes,
            root,
            eligible_for_movement: root,
            already_moved: root,
        }
    }

    #[inline]
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    #[inline]
    pub fn parent_span_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref()
    }

    /// Broker tag the span was recorded on
    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[inline]
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    #[inline]
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// String value of an attribute
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_str)
    }

    /// Client-edge span; never animated itself
    #[inline]
    pub fn is_root(&self) -> bool {
        self.root
    }

    #[inline]
    pub fn is_eligible_for_movement(&self) -> bool {
        self.eligible_for_movement
    }

    #[inline]
    pub fn is_already_moved(&self) -> bool {
        self.already_moved
    }

    pub(crate) fn mark_eligible(&mut self) {
        self.eligible_for_movement = true;
    }

    pub(crate) fn mark_moved(&mut self) {
        self.eligible_for_movement = true;
        self.already_moved = true;
    }
}

/// All spans seen so far for one trace id
#[derive(Debug, Clone)]
pub struct Trace {
    trace_id: String,
    epoch: u64,
    created_at: Instant,
    expires_at: Instant,
    spans: Vec<Span>,
    span_by_id: HashMap<String, usize>,
    /// Last child seen per parent id; earlier siblings are only reachable
    /// through `spans`
    span_by_parent_id: HashMap<String, usize>,
    in_movement: bool,
}

impl Trace {
    fn new(trace_id: String, epoch: u64, now: Instant, ttl: Duration) -> Self {
        Self {
            trace_id,
            epoch,
            created_at: now,
            expires_at: now + ttl,
            spans: Vec::new(),
            span_by_id: HashMap::new(),
            span_by_parent_id: HashMap::new(),
            in_movement: false,
        }
    }

    #[inline]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Store-wide creation counter; distinguishes a trace from a later one
    /// reusing its id
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Spans in arrival order
    #[inline]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Span by id
    pub fn span(&self, span_id: &str) -> Option<&Span> {
        self.span_by_id.get(span_id).map(|&i| &self.spans[i])
    }

    /// Most recently ingested child of `parent_id`
    pub fn child_of(&self, parent_id: &str) -> Option<&Span> {
        self.span_by_parent_id.get(parent_id).map(|&i| &self.spans[i])
    }

    /// Parent of `span`, if it has arrived
    pub fn parent_of(&self, span: &Span) -> Option<&Span> {
        span.parent_span_id().and_then(|p| self.span(p))
    }

    /// A movement for this trace is being shown
    #[inline]
    pub fn in_movement(&self) -> bool {
        self.in_movement
    }

    pub(crate) fn set_in_movement(&mut self, value: bool) {
        self.in_movement = value;
    }

    pub(crate) fn span_index(&self, span_id: &str) -> Option<usize> {
        self.span_by_id.get(span_id).copied()
    }

    pub(crate) fn span_at(&self, index: usize) -> &Span {
        &self.spans[index]
    }

    pub(crate) fn span_at_mut(&mut self, index: usize) -> &mut Span {
        &mut self.spans[index]
    }

    fn parent_moved(&self, span: &Span) -> bool {
        self.parent_of(span).is_some_and(Span::is_already_moved)
    }

    /// Insert or overwrite a span; returns `(index, replaced)`
    fn insert(&mut self, mut span: Span) -> (usize, bool) {
        if !span.eligible_for_movement && self.parent_moved(&span) {
            span.mark_eligible();
        }

        let (index, replaced) = match self.span_by_id.get(&span.span_id) {
            Some(&index) => {
                // Flags never go back to false
                let previous = std::mem::replace(&mut self.spans[index], span);
                let current = &mut self.spans[index];
                current.eligible_for_movement |= previous.eligible_for_movement;
                current.already_moved |= previous.already_moved;

                // Drop the old parent's entry if it still names this span
                if let Some(old_parent) = previous.parent_span_id
                    && current.parent_span_id.as_deref() != Some(old_parent.as_str())
                    && self.span_by_parent_id.get(&old_parent) == Some(&index)
                {
                    self.span_by_parent_id.remove(&old_parent);
                }
                (index, true)
            }
            None => {
                self.spans.push(span);
                let index = self.spans.len() - 1;
                self.span_by_id
                    .insert(self.spans[index].span_id.clone(), index);
                (index, false)
            }
        };

        if let Some(parent) = self.spans[index].parent_span_id.clone() {
            self.span_by_parent_id.insert(parent, index);
        }

        (index, replaced)
    }
}

/// Result of ingesting one span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub trace_id: String,
    pub epoch: u64,
    /// The span opened a new trace; its eviction deadline is `expires_at`
    pub created: bool,
    pub expires_at: Instant,
    /// An expired trace with the same id was dropped first
    pub evicted_expired: bool,
    /// A span with the same id was already present and got overwritten
    pub replaced: bool,
    pub root: bool,
    pub eligible: bool,
}

/// Store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Traces currently held
    pub traces: usize,
    pub spans_ingested: u64,
    pub spans_replaced: u64,
    pub traces_created: u64,
    pub traces_evicted: u64,
}

/// In-flight traces keyed by trace id
#[derive(Debug)]
pub struct TraceStore {
    traces: HashMap<String, Trace>,
    ttl: Duration,
    client_origin_prefixes: Vec<String>,
    next_epoch: u64,
    stats: StoreStats,
}

impl TraceStore {
    /// Create a store
    ///
    /// Spans whose origin or client name starts with one of
    /// `client_origin_prefixes` are treated as roots.
    pub fn new<I, S>(ttl: Duration, client_origin_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            traces: HashMap::new(),
            ttl,
            client_origin_prefixes: client_origin_prefixes.into_iter().map(Into::into).collect(),
            next_epoch: 1,
            stats: StoreStats::default(),
        }
    }

    /// Trace lifetime
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Root spans are recorded at the client edge: no parent, the all-zero
    /// parent sentinel, or a client origin
    pub fn is_root(&self, span: &DecodedSpan) -> bool {
        if span.has_root_parent() {
            return true;
        }
        self.client_origin_prefixes.iter().any(|prefix| {
            span.origin.starts_with(prefix.as_str())
                || span
                    .client_name
                    .as_deref()
                    .is_some_and(|name| name.starts_with(prefix.as_str()))
        })
    }

    /// Add a span, creating its trace on first sight
    pub fn ingest(&mut self, span: DecodedSpan, now: Instant) -> IngestOutcome {
        let evicted_expired = self
            .traces
            .get(&span.trace_id)
            .is_some_and(|t| t.is_expired(now));
        if evicted_expired {
            self.evict(&span.trace_id);
        }

        let root = self.is_root(&span);
        let created = !self.traces.contains_key(&span.trace_id);
        let ttl = self.ttl;
        let trace_id = span.trace_id.clone();
        let trace = self.traces.entry(trace_id.clone()).or_insert_with(|| {
            let epoch = self.next_epoch;
            self.next_epoch += 1;
            self.stats.traces_created += 1;
            debug!(trace_id = %trace_id, epoch, "trace created");
            Trace::new(trace_id.clone(), epoch, now, ttl)
        });

        let (index, replaced) = trace.insert(Span::from_decoded(span, root));
        let stored = trace.span_at(index);
        trace!(
            trace_id = %trace_id,
            span_id = %stored.span_id,
            root,
            eligible = stored.eligible_for_movement,
            replaced,
            "span ingested"
        );

        self.stats.spans_ingested += 1;
        if replaced {
            self.stats.spans_replaced += 1;
        }

        IngestOutcome {
            epoch: trace.epoch,
            expires_at: trace.expires_at,
            eligible: stored.eligible_for_movement,
            trace_id,
            created,
            evicted_expired,
            replaced,
            root,
        }
    }

    /// Remove a trace and all its spans
    pub fn evict(&mut self, trace_id: &str) -> Option<Trace> {
        let trace = self.traces.remove(trace_id)?;
        self.stats.traces_evicted += 1;
        debug!(trace_id = %trace_id, epoch = trace.epoch, spans = trace.len(), "trace evicted");
        Some(trace)
    }

    /// Remove a trace only if it is still the generation `epoch`
    pub fn evict_if_epoch(&mut self, trace_id: &str, epoch: u64) -> Option<Trace> {
        match self.traces.get(trace_id) {
            Some(trace) if trace.epoch == epoch => self.evict(trace_id),
            _ => None,
        }
    }

    /// Remove every trace whose window has closed; returns their ids
    pub fn evict_expired(&mut self, now: Instant) -> Vec<String> {
        let mut expired: Vec<String> = self
            .traces
            .values()
            .filter(|t| t.is_expired(now))
            .map(|t| t.trace_id.clone())
            .collect();
        expired.sort();
        for trace_id in &expired {
            self.evict(trace_id);
        }
        expired
    }

    #[inline]
    pub fn get(&self, trace_id: &str) -> Option<&Trace> {
        self.traces.get(trace_id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, trace_id: &str) -> Option<&mut Trace> {
        self.traces.get_mut(trace_id)
    }

    #[inline]
    pub fn contains(&self, trace_id: &str) -> bool {
        self.traces.contains_key(trace_id)
    }

    /// Number of traces held
    #[inline]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            traces: self.traces.len(),
            ..self.stats
        }
    }
}
