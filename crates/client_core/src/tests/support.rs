//! In-memory capabilities shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use shared::domain::{HandleId, NotificationPermission};

use crate::{
    capabilities::{ComposeField, DialogWidget, HostDocument, NotificationCenter},
    transport::{ConnectRequest, FrameSink, StreamConnector, TransportEvent, TransportHandle},
};

pub struct FakeNotificationCenter {
    supported: bool,
    permission: NotificationPermission,
    fail_permission: bool,
    fail_show: bool,
    show_attempts: AtomicUsize,
    shown: Mutex<Vec<(String, String)>>,
}

impl FakeNotificationCenter {
    pub fn new(supported: bool, permission: NotificationPermission) -> Self {
        Self {
            supported,
            permission,
            fail_permission: false,
            fail_show: false,
            show_attempts: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(true, NotificationPermission::Granted)
    }

    pub fn failing_permission(mut self) -> Self {
        self.fail_permission = true;
        self
    }

    pub fn failing_show(mut self) -> Self {
        self.fail_show = true;
        self
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().expect("shown lock").clone()
    }

    pub fn show_attempts(&self) -> usize {
        self.show_attempts.load(Ordering::SeqCst)
    }
}

impl NotificationCenter for FakeNotificationCenter {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Result<NotificationPermission> {
        if self.fail_permission {
            return Err(anyhow!("permission revoked mid-session"));
        }
        Ok(self.permission)
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        self.show_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_show {
            return Err(anyhow!("notification construction failed"));
        }
        self.shown
            .lock()
            .expect("shown lock")
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct FakeDocument {
    focused: AtomicBool,
}

impl FakeDocument {
    pub fn new(focused: bool) -> Self {
        Self {
            focused: AtomicBool::new(focused),
        }
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }
}

impl HostDocument for FakeDocument {
    fn has_focus(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeComposeField {
    value: Mutex<String>,
    focus_count: AtomicUsize,
}

impl FakeComposeField {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: Mutex::new(value.to_string()),
            focus_count: AtomicUsize::new(0),
        }
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }
}

impl ComposeField for FakeComposeField {
    fn value(&self) -> String {
        self.value.lock().expect("value lock").clone()
    }

    fn set_value(&self, value: String) {
        *self.value.lock().expect("value lock") = value;
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeDialog {
    open: AtomicBool,
    modal_opens: AtomicUsize,
}

impl FakeDialog {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn modal_opens(&self) -> usize {
        self.modal_opens.load(Ordering::SeqCst)
    }
}

impl DialogWidget for FakeDialog {
    fn show_modal(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.modal_opens.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// One subscription opened through [`FakeConnector`].
pub struct FakeSubscription {
    pub request: ConnectRequest,
    pub sink: FrameSink,
    pub closed: Arc<AtomicBool>,
}

impl FakeSubscription {
    pub fn id(&self) -> HandleId {
        self.sink.handle_id()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pushes an event the way a real transport would, regardless of
    /// whether the handle was closed.
    pub fn emit(&self, event: TransportEvent) {
        self.sink.emit(event);
    }
}

struct FakeHandle {
    closed: Arc<AtomicBool>,
}

impl TransportHandle for FakeHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeConnector {
    subscriptions: Mutex<Vec<Arc<FakeSubscription>>>,
    failures_remaining: AtomicUsize,
    open_attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn failing_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn subscriptions(&self) -> Vec<Arc<FakeSubscription>> {
        self.subscriptions.lock().expect("subscriptions lock").clone()
    }

    pub fn last(&self) -> Arc<FakeSubscription> {
        self.subscriptions()
            .last()
            .cloned()
            .expect("at least one subscription")
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn live_count(&self) -> usize {
        self.subscriptions()
            .iter()
            .filter(|subscription| !subscription.is_closed())
            .count()
    }
}

impl StreamConnector for FakeConnector {
    fn open(&self, request: ConnectRequest, sink: FrameSink) -> Result<Box<dyn TransportHandle>> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("connection refused"));
        }
        let closed = Arc::new(AtomicBool::new(false));
        self.subscriptions
            .lock()
            .expect("subscriptions lock")
            .push(Arc::new(FakeSubscription {
                request,
                sink,
                closed: closed.clone(),
            }));
        Ok(Box::new(FakeHandle { closed }))
    }
}
