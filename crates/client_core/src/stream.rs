use std::{future::Future, sync::Arc, time::Duration};

use shared::{domain::HandleId, protocol::StreamEvent};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    capabilities::RenderSink,
    identity::IdentityResolver,
    notify::NotificationDispatcher,
    reconnect::{Backoff, ReconnectPolicy},
    transport::{
        ConnectRequest, FrameSink, StreamConnector, TaggedEvent, TransportEvent, TransportHandle,
        DEFAULT_EVENT_TYPE,
    },
};

/// Timers further out than this are clamped.
const MAX_TIMER: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from + delay.min(MAX_TIMER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Error,
    Closed,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream client has been torn down")]
    TornDown,
    #[error("failed to open stream subscription to {endpoint}: {source}")]
    Open {
        endpoint: Url,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub endpoint: Url,
    pub reconnect: ReconnectPolicy,
    /// Reconnect when nothing arrives for this long. `None` disables it.
    pub stall_timeout: Option<Duration>,
}

impl StreamSettings {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectPolicy::default(),
            stall_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub rendered: u64,
    pub decode_failures: u64,
    pub ignored_frames: u64,
    pub connects: u64,
    pub transport_faults: u64,
}

struct LiveHandle {
    id: HandleId,
    transport: Box<dyn TransportHandle>,
}

/// Owns the single subscription to the feed and everything that flows out
/// of it.
///
/// All transport callbacks arrive on one channel tagged with the handle that
/// produced them; anything tagged with a superseded handle is discarded.
pub struct StreamConnectionManager {
    settings: StreamSettings,
    connector: Arc<dyn StreamConnector>,
    identity: IdentityResolver,
    renderer: Arc<dyn RenderSink>,
    dispatcher: NotificationDispatcher,
    state: ConnectionState,
    live: Option<LiveHandle>,
    last_handle_id: HandleId,
    backoff: Backoff,
    reconnect_at: Option<Instant>,
    last_activity: Instant,
    last_event_id: Option<String>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    stats: StreamStats,
}

impl StreamConnectionManager {
    pub fn new(
        settings: StreamSettings,
        connector: Arc<dyn StreamConnector>,
        identity: IdentityResolver,
        renderer: Arc<dyn RenderSink>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let backoff = Backoff::new(settings.reconnect.clone());
        Self {
            settings,
            connector,
            identity,
            renderer,
            dispatcher,
            state: ConnectionState::Connecting,
            live: None,
            last_handle_id: HandleId(0),
            backoff,
            reconnect_at: None,
            last_activity: Instant::now(),
            last_event_id: None,
            events_tx,
            events_rx,
            stats: StreamStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn live_handle(&self) -> Option<HandleId> {
        self.live.as_ref().map(|live| live.id)
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn pending_reconnect(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Opens a fresh subscription, closing the current one first.
    pub fn connect(&mut self) -> Result<HandleId, StreamError> {
        if self.state == ConnectionState::Closed {
            return Err(StreamError::TornDown);
        }
        self.release_live();
        self.reconnect_at = None;

        let id = self.last_handle_id.next();
        self.last_handle_id = id;
        let request = ConnectRequest {
            endpoint: self.settings.endpoint.clone(),
            cookie_header: self.identity.cookie_header(),
            last_event_id: self.last_event_id.clone(),
        };
        let sink = FrameSink::new(id, self.events_tx.clone());
        self.stats.connects += 1;
        self.state = ConnectionState::Connecting;

        match self.connector.open(request, sink) {
            Ok(transport) => {
                info!(handle_id = %id, endpoint = %self.settings.endpoint, "stream subscription started");
                self.live = Some(LiveHandle { id, transport });
                self.last_activity = Instant::now();
                Ok(id)
            }
            Err(source) => {
                self.state = ConnectionState::Error;
                self.stats.transport_faults += 1;
                let delay = self.schedule_reconnect();
                error!(
                    handle_id = %id,
                    delay_ms = delay.as_millis() as u64,
                    "failed to start stream subscription: {source:#}"
                );
                Err(StreamError::Open {
                    endpoint: self.settings.endpoint.clone(),
                    source,
                })
            }
        }
    }

    /// Routes one transport callback. Events from anything but the live
    /// handle are dropped.
    pub fn handle_event(&mut self, handle_id: HandleId, event: TransportEvent) {
        if self.state == ConnectionState::Closed || self.live_handle() != Some(handle_id) {
            debug!(%handle_id, ?event, "dropping event from stale stream handle");
            return;
        }
        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Activity => self.last_activity = Instant::now(),
            TransportEvent::Frame { event, data, id } => {
                self.last_activity = Instant::now();
                if let Some(id) = id {
                    self.last_event_id = Some(id);
                }
                if event.is_empty() || event == DEFAULT_EVENT_TYPE {
                    self.on_message(&data);
                } else {
                    self.stats.ignored_frames += 1;
                    debug!(%handle_id, event = %event, "ignoring named stream event");
                }
            }
            TransportEvent::Error(reason) => self.on_error(&reason),
        }
    }

    /// Drains callbacks already queued without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok((handle_id, event)) = self.events_rx.try_recv() {
            self.handle_event(handle_id, event);
            processed += 1;
        }
        processed
    }

    fn on_open(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Open;
        }
        self.backoff.reset();
        self.last_activity = Instant::now();
        debug!(handle_id = ?self.live_handle(), "stream open");
    }

    /// Decodes one frame and hands it to the renderer and the notifier.
    pub fn on_message(&mut self, data: &str) {
        let event = match StreamEvent::decode(data) {
            Ok(event) => event,
            Err(err) => {
                self.stats.decode_failures += 1;
                warn!(handle_id = ?self.live_handle(), "dropping undecodable stream frame: {err}");
                return;
            }
        };
        self.renderer.prepend(&event.message);
        self.stats.rendered += 1;
        self.dispatcher
            .maybe_notify(&event.sender, &event.preview, event.notify);
    }

    /// The channel is presumed lost; drop it and schedule the next attempt.
    pub fn on_error(&mut self, reason: &str) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.stats.transport_faults += 1;
        self.state = ConnectionState::Error;
        let failed = self.live_handle();
        self.release_live();
        let delay = self.schedule_reconnect();
        warn!(
            handle_id = ?failed,
            attempt = self.backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "stream connection lost, reconnecting: {reason}"
        );
        if delay.is_zero() {
            self.reconnect_now();
        }
    }

    /// Fires due timers: pending reconnects and stall detection.
    pub fn poll_deadlines(&mut self, now: Instant) {
        if self.reconnect_at.is_some_and(|at| at <= now) {
            self.reconnect_now();
            return;
        }
        if let Some(timeout) = self.settings.stall_timeout {
            let live = matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Open
            );
            if live && self.live.is_some() && now.duration_since(self.last_activity) >= timeout {
                self.on_error(&format!("no stream activity for {}s", timeout.as_secs()));
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.reconnect_at.is_some() {
            return self.reconnect_at;
        }
        match (self.settings.stall_timeout, &self.live) {
            (Some(timeout), Some(_)) => Some(deadline_after(self.last_activity, timeout)),
            _ => None,
        }
    }

    /// Closes the subscription for good. Idempotent.
    pub fn teardown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.release_live();
        self.reconnect_at = None;
        self.state = ConnectionState::Closed;
        info!(stats = ?self.stats, "stream connection closed");
    }

    /// Drives the connection until `shutdown` resolves, then tears down.
    pub async fn run<F>(mut self, shutdown: F) -> StreamStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        while self.state != ConnectionState::Closed {
            let deadline = self.next_deadline();
            tokio::select! {
                _ = &mut shutdown => self.teardown(),
                Some((handle_id, event)) = self.events_rx.recv() => {
                    self.handle_event(handle_id, event);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.poll_deadlines(Instant::now());
                }
            }
        }
        self.stats
    }

    fn reconnect_now(&mut self) {
        self.reconnect_at = None;
        if let Err(err) = self.connect() {
            debug!("reconnect attempt deferred: {err}");
        }
    }

    fn schedule_reconnect(&mut self) -> Duration {
        let delay = self.backoff.next_delay();
        self.reconnect_at = Some(deadline_after(Instant::now(), delay));
        delay
    }

    fn release_live(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.transport.close();
            debug!(handle_id = %live.id, "stream handle closed");
        }
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
