//! Statistics stage and the process-wide counter set.
//!
//! All counters are lock-free atomics shared across connections through an
//! `Arc`. The `max_open_*` maxima are maintained by a compare-and-swap loop
//! that reads its source counters separately from the CAS target, so a
//! momentary peak between the reads can go unrecorded: the maxima are
//! eventually-max, not exact. Snapshot reads are individually relaxed.

use crate::pipeline::{CloseReason, Command, Event, Stage, StageContext};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide, monotonic server counters.
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    request_starts: AtomicU64,
    response_starts: AtomicU64,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    request_timeouts: AtomicU64,
    idle_timeouts: AtomicU64,
    max_open_requests: AtomicU64,
    max_open_connections: AtomicU64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            request_starts: AtomicU64::new(0),
            response_starts: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            request_timeouts: AtomicU64::new(0),
            idle_timeouts: AtomicU64::new(0),
            max_open_requests: AtomicU64::new(0),
            max_open_connections: AtomicU64::new(0),
        }
    }

    pub(crate) fn request_started(&self) {
        self.request_starts.fetch_add(1, Relaxed);
        let open = self
            .request_starts
            .load(Relaxed)
            .saturating_sub(self.response_starts.load(Relaxed));
        Self::record_max(&self.max_open_requests, open);
    }

    pub(crate) fn response_started(&self) {
        self.response_starts.fetch_add(1, Relaxed);
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Relaxed);
        let open = self
            .connections_opened
            .load(Relaxed)
            .saturating_sub(self.connections_closed.load(Relaxed));
        Self::record_max(&self.max_open_connections, open);
    }

    pub(crate) fn connection_closed(&self, reason: CloseReason) {
        self.connections_closed.fetch_add(1, Relaxed);
        if reason == CloseReason::IdleTimeout {
            self.idle_timeouts.fetch_add(1, Relaxed);
        }
    }

    pub(crate) fn request_timed_out(&self) {
        self.request_timeouts.fetch_add(1, Relaxed);
    }

    /// Installs `candidate` if it is strictly greater, retrying on loss.
    fn record_max(target: &AtomicU64, candidate: u64) {
        loop {
            let current = target.load(Relaxed);
            if candidate <= current {
                return;
            }
            if target.compare_exchange_weak(current, candidate, Relaxed, Relaxed).is_ok() {
                return;
            }
        }
    }

    /// A point-in-time readout of the counter set.
    pub fn snapshot(&self) -> StatsSnapshot {
        let request_starts = self.request_starts.load(Relaxed);
        let response_starts = self.response_starts.load(Relaxed);
        let opened = self.connections_opened.load(Relaxed);
        let closed = self.connections_closed.load(Relaxed);
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            total_requests: request_starts,
            open_requests: request_starts.saturating_sub(response_starts),
            max_open_requests: self.max_open_requests.load(Relaxed),
            total_connections: opened,
            open_connections: opened.saturating_sub(closed),
            max_open_connections: self.max_open_connections.load(Relaxed),
            request_timeouts: self.request_timeouts.load(Relaxed),
            idle_timeouts: self.idle_timeouts.load(Relaxed),
        }
    }

    /// Resets every counter to zero. Uptime keeps counting from construction.
    pub fn clear(&self) {
        self.request_starts.store(0, Relaxed);
        self.response_starts.store(0, Relaxed);
        self.connections_opened.store(0, Relaxed);
        self.connections_closed.store(0, Relaxed);
        self.request_timeouts.store(0, Relaxed);
        self.idle_timeouts.store(0, Relaxed);
        self.max_open_requests.store(0, Relaxed);
        self.max_open_connections.store(0, Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub total_requests: u64,
    pub open_requests: u64,
    pub max_open_requests: u64,
    pub total_connections: u64,
    pub open_connections: u64,
    pub max_open_connections: u64,
    pub request_timeouts: u64,
    pub idle_timeouts: u64,
}

/// Pipeline stage that feeds the counter set. Counts one opened connection
/// at construction, request starts on upward message starts, response starts
/// on downward message starts, and close/timeout events as they pass.
pub struct StatsStage {
    stats: Arc<ServerStats>,
}

impl StatsStage {
    pub fn new(stats: Arc<ServerStats>) -> Self {
        stats.connection_opened();
        Self { stats }
    }
}

impl Stage for StatsStage {
    fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>) {
        if let Command::SendResponsePart(part) = &command {
            if part.is_message_start() {
                self.stats.response_started();
            }
        }
        ctx.send_down(command);
    }

    fn on_event(&mut self, event: Event, ctx: &mut StageContext<'_>) {
        match &event {
            Event::RequestPart(part) if part.is_message_start() => self.stats.request_started(),
            Event::RequestTimeout => self.stats.request_timed_out(),
            Event::Closed(reason) => self.stats.connection_closed(*reason),
            _ => {}
        }
        ctx.send_up(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::protocol::{MessageItem, RequestHead, ResponseHead};
    use bytes::Bytes;
    use http::{Method, StatusCode, Version};

    fn request_start() -> Event {
        let head = RequestHead::new(
            Method::GET,
            Bytes::from_static(b"/"),
            Version::HTTP_11,
            [("host".parse().unwrap(), "a".parse().unwrap())].into_iter().collect(),
        );
        Event::RequestPart(MessageItem::Complete { head, body: Bytes::new() })
    }

    fn response_start() -> Command {
        Command::SendResponsePart(MessageItem::Complete {
            head: ResponseHead::new(StatusCode::OK),
            body: Bytes::new(),
        })
    }

    struct Sink;

    impl Stage for Sink {
        fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>) {
            ctx.send_down(command);
        }
        fn on_event(&mut self, _event: Event, _ctx: &mut StageContext<'_>) {}
    }

    #[test]
    fn counts_requests_responses_and_connections() {
        let stats = Arc::new(ServerStats::new());
        let mut pipeline =
            Pipeline::builder().stage(StatsStage::new(stats.clone())).stage(Sink).build();

        assert_eq!(stats.snapshot().total_connections, 1);
        assert_eq!(stats.snapshot().open_connections, 1);

        pipeline.fire_event(request_start());
        pipeline.fire_event(request_start());
        pipeline.fire_command(response_start());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.open_requests, 1);
        assert_eq!(snapshot.max_open_requests, 2);

        pipeline.fire_event(Event::Closed(CloseReason::PeerClosed));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.open_connections, 0);
        assert_eq!(snapshot.idle_timeouts, 0);
    }

    #[test]
    fn idle_timeout_closes_are_counted_separately() {
        let stats = Arc::new(ServerStats::new());
        let mut pipeline =
            Pipeline::builder().stage(StatsStage::new(stats.clone())).stage(Sink).build();

        pipeline.fire_event(Event::Closed(CloseReason::IdleTimeout));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.idle_timeouts, 1);
        assert_eq!(snapshot.total_connections, 1);
        assert_eq!(snapshot.open_connections, 0);
    }

    #[test]
    fn request_timeout_events_are_counted() {
        let stats = Arc::new(ServerStats::new());
        let mut pipeline =
            Pipeline::builder().stage(StatsStage::new(stats.clone())).stage(Sink).build();

        pipeline.fire_event(Event::RequestTimeout);
        assert_eq!(stats.snapshot().request_timeouts, 1);
    }

    #[test]
    fn max_open_survives_drops() {
        let stats = Arc::new(ServerStats::new());
        let mut pipeline =
            Pipeline::builder().stage(StatsStage::new(stats.clone())).stage(Sink).build();

        for _ in 0..5 {
            pipeline.fire_event(request_start());
        }
        for _ in 0..5 {
            pipeline.fire_command(response_start());
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.open_requests, 0);
        assert_eq!(snapshot.max_open_requests, 5);
    }

    #[test]
    fn clear_resets_counters_only() {
        let stats = Arc::new(ServerStats::new());
        let _stage = StatsStage::new(stats.clone());
        stats.request_started();
        stats.clear();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.total_connections, 0);
        assert_eq!(snapshot.max_open_requests, 0);
    }

    #[test]
    fn record_max_never_regresses_under_contention() {
        let stats = Arc::new(ServerStats::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let stats = stats.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.request_started();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 4000);
        // the maximum is eventually-max: at least the final open count,
        // never more than the total
        assert!(snapshot.max_open_requests <= 4000);
        assert!(snapshot.max_open_requests >= snapshot.open_requests);
    }
}
