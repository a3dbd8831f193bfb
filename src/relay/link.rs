//! Upstream connection state machine
//!
//! ```text
//!   ┌──────────────┐  connect()   ┌────────────┐   Ok(stream)   ┌───────────┐
//!   │ Disconnected │ ───────────► │ Connecting │ ─────────────► │ Connected │
//!   └──────────────┘              └────────────┘                └───────────┘
//!          ▲                            │ Err                         │ read error / EOF
//!          └──── sleep(backoff) ◄───────┴─────────────────────────────┘
//! ```
//!
//! Per-event problems never leave the Connected state: a malformed event is
//! logged, counted and skipped.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use super::source::{EventSource, EventStream};
use crate::error::Result;
use crate::hub::StreamHub;
use crate::media::{AudioFormatInfo, Chunk};
use crate::stats::{LinkCounters, LinkStats};
use crate::wire::{decode_inbound, InboundEvent};

/// Upstream connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Where the upstream loop was at its latest chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamState {
    pub source_interval_id: String,
    pub source_loop_count: u64,
    pub source_position: u32,
    pub total_chunks: u32,
    pub audio_format: AudioFormatInfo,
}

impl From<&Chunk> for UpstreamState {
    fn from(chunk: &Chunk) -> Self {
        Self {
            source_interval_id: chunk.sequence.interval_id.to_string(),
            source_loop_count: chunk.sequence.loop_count,
            source_position: chunk.sequence.position,
            total_chunks: chunk.sequence.total_chunks,
            audio_format: chunk.format.info(),
        }
    }
}

/// Shared, read-mostly view of a [`SourceLink`]
#[derive(Debug)]
pub struct LinkMonitor {
    state: RwLock<LinkState>,
    connected: AtomicBool,
    upstream: RwLock<Option<UpstreamState>>,
    counters: LinkCounters,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LinkState::Disconnected),
            connected: AtomicBool::new(false),
            upstream: RwLock::new(None),
            counters: LinkCounters::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// Whether a live upstream connection exists
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Snapshot of the latest chunk's sequence info
    pub fn upstream(&self) -> Option<UpstreamState> {
        self.upstream.read().clone()
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    fn set_connecting(&self) {
        *self.state.write() = LinkState::Connecting;
    }

    fn set_connected(&self) {
        *self.state.write() = LinkState::Connected;
        self.connected.store(true, Ordering::Release);
        self.counters.record_connect();
    }

    /// Returns whether the link had been connected
    fn set_disconnected(&self) -> bool {
        *self.state.write() = LinkState::Disconnected;
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        if was_connected {
            self.counters.record_disconnect();
        }
        was_connected
    }

    fn record_chunk(&self, chunk: &Chunk) {
        *self.upstream.write() = Some(UpstreamState::from(chunk));
        self.counters.record_event();
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Feeds a relay hub from an upstream [`EventSource`], reconnecting forever
pub struct SourceLink<S: EventSource> {
    source: S,
    hub: Arc<StreamHub>,
    monitor: Arc<LinkMonitor>,
    backoff: Duration,
}

impl<S: EventSource> SourceLink<S> {
    pub fn new(source: S, hub: Arc<StreamHub>, backoff: Duration) -> Self {
        Self {
            source,
            hub,
            monitor: Arc::new(LinkMonitor::new()),
            backoff,
        }
    }

    pub fn monitor(&self) -> &Arc<LinkMonitor> {
        &self.monitor
    }

    /// Decode one event payload and publish it if it is a chunk
    ///
    /// Returns whether a chunk was published.
    pub async fn handle_event(&self, data: &str) -> bool {
        match decode_inbound(data) {
            Ok(InboundEvent::Chunk(chunk)) => {
                self.monitor.record_chunk(&chunk);
                self.hub.publish(chunk).await;
                true
            }
            Ok(InboundEvent::Other(object)) => {
                tracing::debug!(
                    keys = ?object.keys().collect::<Vec<_>>(),
                    "Skipping non-chunk upstream event"
                );
                false
            }
            Err(e) => {
                self.monitor.counters.record_malformed();
                tracing::warn!(error = %e, "Skipping malformed upstream event");
                false
            }
        }
    }

    /// One connection from connect to end of stream
    ///
    /// Shutdown is only observed while waiting on the upstream; an event
    /// already read is always published in full. `None` means shutdown.
    async fn session<F>(&self, shutdown: &mut Pin<&mut F>) -> Option<Result<()>>
    where
        F: Future<Output = ()>,
    {
        self.monitor.set_connecting();
        let connected = tokio::select! {
            _ = shutdown.as_mut() => return None,
            connected = self.source.connect() => connected,
        };
        let mut stream = match connected {
            Ok(stream) => stream,
            Err(e) => return Some(Err(e)),
        };

        self.monitor.set_connected();
        tracing::info!(source = %self.source.describe(), "Connected to upstream");

        loop {
            let next = tokio::select! {
                _ = shutdown.as_mut() => return None,
                next = stream.next_event() => next,
            };
            match next {
                Ok(Some(data)) => {
                    self.handle_event(&data).await;
                }
                Ok(None) => return Some(Ok(())),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Run the reconnect loop until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let outcome = self.session(&mut shutdown).await;

            let was_connected = self.monitor.set_disconnected();
            match outcome {
                None => break,
                Some(Ok(())) => {
                    tracing::warn!(source = %self.source.describe(), "Upstream closed the stream");
                }
                Some(Err(e)) if was_connected => {
                    tracing::warn!(source = %self.source.describe(), error = %e, "Upstream connection lost");
                }
                Some(Err(e)) => {
                    tracing::error!(source = %self.source.describe(), error = %e, "Connection to upstream failed");
                }
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }

        tracing::info!(source = %self.source.describe(), "Source link stopped");
    }

    /// Spawn the reconnect loop as a background task
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let link = Arc::clone(self);
        tokio::spawn(async move {
            link.run_until(std::future::pending()).await;
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::Error;
    use crate::history::buffer::tests::make_chunk;
    use crate::hub::HubConfig;
    use crate::wire::encode_chunk;

    /// One scripted step of a mock upstream stream
    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        Event(String),
        /// Pause before the next step
        Wait(Duration),
        Fail,
    }

    /// Each connect() pops the next script; `None` scripts refuse the connection
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedSource {
        scripts: Arc<Mutex<VecDeque<Option<Vec<Step>>>>>,
        pub(crate) attempts: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl ScriptedSource {
        pub(crate) fn new(scripts: Vec<Option<Vec<Step>>>) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(scripts.into())),
                attempts: Default::default(),
            }
        }
    }

    pub(crate) struct ScriptedStream {
        steps: VecDeque<Step>,
    }

    impl EventSource for ScriptedSource {
        type Stream = ScriptedStream;

        async fn connect(&self) -> Result<ScriptedStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = self.scripts.lock().pop_front();
            match next {
                Some(Some(steps)) => Ok(ScriptedStream { steps: steps.into() }),
                Some(None) => Err(Error::Io(std::io::ErrorKind::ConnectionRefused.into())),
                // Script exhausted: hang like an unreachable host
                None => std::future::pending().await,
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    impl EventStream for ScriptedStream {
        async fn next_event(&mut self) -> Result<Option<String>> {
            loop {
                match self.steps.pop_front() {
                    Some(Step::Event(data)) => return Ok(Some(data)),
                    Some(Step::Wait(duration)) => tokio::time::sleep(duration).await,
                    Some(Step::Fail) => {
                        return Err(Error::Io(std::io::ErrorKind::ConnectionReset.into()));
                    }
                    None => return Ok(None),
                }
            }
        }
    }

    pub(crate) fn chunk_event(position: u32) -> Step {
        Step::Event(encode_chunk(&make_chunk(position)).unwrap())
    }

    fn link(source: ScriptedSource) -> SourceLink<ScriptedSource> {
        let hub = Arc::new(StreamHub::with_config(HubConfig::default()));
        SourceLink::new(source, hub, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_handle_event_publishes_chunk() {
        let link = link(ScriptedSource::default());
        let sub = link.hub.attach(0).await;

        let Step::Event(data) = chunk_event(4) else { unreachable!() };
        assert!(link.handle_event(&data).await);

        assert_eq!(sub.try_recv().unwrap().chunk.sequence.position, 4);
        assert_eq!(link.hub.history_len(), 1);

        let upstream = link.monitor().upstream().unwrap();
        assert_eq!(upstream.source_position, 4);
        assert_eq!(upstream.source_interval_id, "interval");
        assert_eq!(link.monitor().stats().events, 1);
    }

    #[tokio::test]
    async fn test_handle_event_skips_status_and_garbage() {
        let link = link(ScriptedSource::default());

        assert!(!link.handle_event(r#"{"loop_count": 1, "current_position": 0}"#).await);
        assert!(!link.handle_event("{not json").await);
        assert!(!link.handle_event(r#"{"audio": "xyz", "timestamp": 1}"#).await);

        assert_eq!(link.hub.history_len(), 0);
        assert!(link.monitor().upstream().is_none());
        let stats = link.monitor().stats();
        assert_eq!(stats.events, 0);
        assert_eq!(stats.malformed_events, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_loss() {
        let source = ScriptedSource::new(vec![
            Some(vec![chunk_event(0), chunk_event(1), Step::Fail]),
            None,
            Some(vec![chunk_event(2), Step::Wait(Duration::from_secs(3600))]),
        ]);
        let attempts = Arc::clone(&source.attempts);
        let link = Arc::new(link(source));
        let task = link.spawn();

        tokio::time::sleep(Duration::from_millis(10)).await;
        // First session ended with a failure; link is backing off
        assert_eq!(link.hub.history_len(), 2);
        assert!(!link.monitor().is_connected());
        assert_eq!(link.monitor().state(), LinkState::Disconnected);

        // Second attempt is refused, third succeeds after another backoff
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!link.monitor().is_connected());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(link.monitor().is_connected());
        assert_eq!(link.monitor().state(), LinkState::Connected);
        assert_eq!(link.hub.history_len(), 3);

        let stats = link.monitor().stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.disconnects, 1);
        assert_eq!(stats.reconnects(), 1);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close_also_backs_off() {
        let source = ScriptedSource::new(vec![Some(vec![chunk_event(0)])]);
        let attempts = Arc::clone(&source.attempts);
        let link = Arc::new(link(source));
        let task = link.spawn();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!link.monitor().is_connected());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // Script exhausted: second attempt hangs in Connecting
        assert_eq!(link.monitor().state(), LinkState::Connecting);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_read() {
        let source = ScriptedSource::new(vec![Some(vec![
            chunk_event(0),
            Step::Wait(Duration::from_secs(3600)),
        ])]);
        let link = link(source);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let run = link.run_until(async {
            let _ = rx.await;
        });
        tokio::pin!(run);

        tokio::select! {
            _ = &mut run => panic!("stopped before shutdown"),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        assert!(link.monitor().is_connected());

        tx.send(()).unwrap();
        run.await;

        assert!(!link.monitor().is_connected());
        assert_eq!(link.hub.history_len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_lets_inflight_publish_finish() {
        let source = ScriptedSource::new(vec![Some(vec![
            chunk_event(0),
            Step::Wait(Duration::from_secs(3600)),
        ])]);
        let link = Arc::new(link(source));
        let sub = link.hub.attach(0).await;

        // Stand-in for an attach or detach holding the registry
        let registry_guard = link.hub.listeners().hold_write_lock().await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let running = Arc::clone(&link);
        let task = tokio::spawn(async move {
            running
                .run_until(async {
                    let _ = rx.await;
                })
                .await;
        });

        // Chunk is in history; its fan-out is parked on the registry lock
        while link.hub.history_len() == 0 {
            tokio::task::yield_now().await;
        }
        tx.send(()).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(sub.try_recv().is_none());

        drop(registry_guard);
        task.await.unwrap();

        assert_eq!(sub.try_recv().unwrap().chunk.sequence.position, 0);
        assert!(!link.monitor().is_connected());
    }
}
