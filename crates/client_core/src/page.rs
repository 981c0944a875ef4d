use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    capabilities::{
        ComposeField, CookieStore, DialogWidget, HostDocument, NotificationCenter, RenderSink,
    },
    identity::IdentityResolver,
    notify::NotificationDispatcher,
    picker::{DialogState, PickerCoordinator},
    stream::{StreamConnectionManager, StreamSettings, StreamStats},
    transport::StreamConnector,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    PickerIconClicked,
    GlyphSelected(String),
}

pub struct PageCapabilities {
    pub cookies: Arc<dyn CookieStore>,
    pub renderer: Arc<dyn RenderSink>,
    pub notifications: Arc<dyn NotificationCenter>,
    pub document: Arc<dyn HostDocument>,
    pub compose: Arc<dyn ComposeField>,
    pub dialog: Arc<dyn DialogWidget>,
}

/// One loaded chat page: the running feed stream plus the picker wiring.
pub struct ChatPage {
    identity: IdentityResolver,
    picker: PickerCoordinator,
    wired: bool,
    shutdown: Option<oneshot::Sender<()>>,
    stream_task: Option<JoinHandle<StreamStats>>,
}

impl ChatPage {
    /// Writes the timezone cookie, then subscribes to the feed on the
    /// current tokio runtime.
    pub fn load(
        capabilities: PageCapabilities,
        settings: StreamSettings,
        connector: Arc<dyn StreamConnector>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("chat page must be loaded inside a tokio runtime")?;

        let identity = IdentityResolver::new(capabilities.cookies);
        match identity.write_timezone_cookie() {
            Ok(offset) => debug!(minutes = offset.minutes(), "timezone recorded"),
            Err(err) => warn!("failed to write timezone cookie: {err:#}"),
        }

        let dispatcher = NotificationDispatcher::new(
            identity.clone(),
            capabilities.notifications,
            capabilities.document,
        );
        let mut stream = StreamConnectionManager::new(
            settings,
            connector,
            identity.clone(),
            capabilities.renderer,
            dispatcher,
        );
        if let Err(err) = stream.connect() {
            warn!("initial stream connect failed: {err}");
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stream_task = runtime.spawn(stream.run(async move {
            let _ = shutdown_rx.await;
        }));

        info!(sender = ?identity.sender_name(), "chat page loaded");
        Ok(Self {
            identity,
            picker: PickerCoordinator::new(capabilities.dialog, capabilities.compose),
            wired: false,
            shutdown: Some(shutdown_tx),
            stream_task: Some(stream_task),
        })
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn picker_state(&self) -> DialogState {
        self.picker.state()
    }

    /// Hooks up the picker entry points. Only the first call has an effect.
    pub fn on_document_loaded(&mut self) {
        if self.wired {
            debug!("picker already wired");
            return;
        }
        self.wired = true;
    }

    /// Returns whether the event was handled.
    pub fn handle_ui(&mut self, event: UiEvent) -> bool {
        if !self.wired {
            debug!(?event, "ui event before document load ignored");
            return false;
        }
        match event {
            UiEvent::PickerIconClicked => self.picker.toggle(),
            UiEvent::GlyphSelected(glyph) => self.picker.on_glyph_selected(&glyph),
        }
        true
    }

    /// Tears the stream down and waits for it to finish.
    pub async fn unload(mut self) -> StreamStats {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(task) = self.stream_task.take() else {
            return StreamStats::default();
        };
        match task.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!("stream task ended abnormally: {err}");
                StreamStats::default()
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
