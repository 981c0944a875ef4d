//! Push-channel plumbing: the connector seam and the HTTP Server-Sent Events
//! implementation behind it.

use anyhow::{Context, Result};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE},
    Client, StatusCode,
};
use shared::domain::HandleId;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_EVENT_TYPE: &str = "message";
const EVENT_STREAM_MIME: &str = "text/event-stream";
const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Something that happened on one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    /// Bytes arrived, including keep-alive comments that carry no frame.
    Activity,
    Frame {
        event: String,
        data: String,
        id: Option<String>,
    },
    Error(String),
}

impl TransportEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self::Frame {
            event: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: None,
        }
    }
}

pub type TaggedEvent = (HandleId, TransportEvent);

/// Write side handed to a transport; every event is tagged with the
/// subscription it belongs to.
#[derive(Clone)]
pub struct FrameSink {
    handle_id: HandleId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl FrameSink {
    pub fn new(handle_id: HandleId, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { handle_id, tx }
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle_id
    }

    /// Returns `false` once nobody is listening anymore.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.handle_id, event)).is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub endpoint: Url,
    pub cookie_header: String,
    pub last_event_id: Option<String>,
}

/// A live subscription. Closing it stops all further delivery.
pub trait TransportHandle: Send {
    fn close(&mut self);
}

pub trait StreamConnector: Send + Sync {
    /// Starts a subscription without waiting for it to open; progress is
    /// reported through `sink`.
    fn open(&self, request: ConnectRequest, sink: FrameSink) -> Result<Box<dyn TransportHandle>>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("stream endpoint answered with status {0}")]
    Status(StatusCode),
    #[error("stream endpoint answered with content type '{0}', expected text/event-stream")]
    UnexpectedContentType(String),
    #[error("stream body failed: {0}")]
    Body(String),
    #[error("stream ended by server")]
    Ended,
}

pub struct HttpSseConnector {
    http: Client,
}

impl HttpSseConnector {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl Default for HttpSseConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConnector for HttpSseConnector {
    fn open(&self, request: ConnectRequest, sink: FrameSink) -> Result<Box<dyn TransportHandle>> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("event stream transport requires a tokio runtime")?;
        let http = self.http.clone();
        let task = runtime.spawn(run_session(http, request, sink));
        Ok(Box::new(SseTaskHandle { task: Some(task) }))
    }
}

struct SseTaskHandle {
    task: Option<JoinHandle<()>>,
}

impl TransportHandle for SseTaskHandle {
    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SseTaskHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_session(http: Client, request: ConnectRequest, sink: FrameSink) {
    let handle_id = sink.handle_id();
    match stream_frames(&http, &request, &sink).await {
        Ok(()) => debug!(%handle_id, "stream listener gone; session finished"),
        Err(err) => {
            sink.emit(TransportEvent::Error(err.to_string()));
        }
    }
}

async fn stream_frames(
    http: &Client,
    request: &ConnectRequest,
    sink: &FrameSink,
) -> Result<(), TransportError> {
    let mut builder = http
        .get(request.endpoint.clone())
        .header(ACCEPT, EVENT_STREAM_MIME)
        .header(CACHE_CONTROL, "no-cache");
    if !request.cookie_header.is_empty() {
        builder = builder.header(COOKIE, request.cookie_header.as_str());
    }
    if let Some(last_event_id) = &request.last_event_id {
        builder = builder.header(LAST_EVENT_ID_HEADER, last_event_id.as_str());
    }

    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status));
    }
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with(EVENT_STREAM_MIME) {
        return Err(TransportError::UnexpectedContentType(content_type));
    }

    info!(handle_id = %sink.handle_id(), endpoint = %request.endpoint, "stream opened");
    if !sink.emit(TransportEvent::Open) {
        return Ok(());
    }

    let activity = sink.clone();
    let mut frames = Box::pin(
        response
            .bytes_stream()
            .inspect(move |chunk| {
                if chunk.is_ok() {
                    activity.emit(TransportEvent::Activity);
                }
            })
            .eventsource(),
    );

    while let Some(frame) = frames.next().await {
        let frame = frame.map_err(|err| TransportError::Body(err.to_string()))?;
        let event = if frame.event.is_empty() {
            DEFAULT_EVENT_TYPE.to_string()
        } else {
            frame.event
        };
        let delivered = sink.emit(TransportEvent::Frame {
            event,
            data: frame.data,
            id: (!frame.id.is_empty()).then_some(frame.id),
        });
        if !delivered {
            return Ok(());
        }
    }

    Err(TransportError::Ended)
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
