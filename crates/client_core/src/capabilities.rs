//! Host capabilities the core talks to.
//!
//! Every piece of ambient state (cookie jar, render target, notification
//! system, document focus, compose field, picker widget) is reached through
//! one of these traits so hosts and tests can substitute their own.

use anyhow::{anyhow, Result};
use shared::domain::NotificationPermission;

/// Per-origin key/value store backing the `Cookie` header.
pub trait CookieStore: Send + Sync {
    /// Full header string, `name=value` pairs joined by `"; "`.
    fn cookie_header(&self) -> String;
    /// Insert or replace a single pair.
    fn set_cookie(&self, name: &str, value: &str) -> Result<()>;
}

/// Display list for incoming messages.
pub trait RenderSink: Send + Sync {
    /// Insert trusted markup as the new first item.
    fn prepend(&self, markup: &str);
}

pub trait NotificationCenter: Send + Sync {
    fn is_supported(&self) -> bool;
    /// Current permission state. Never prompts.
    fn permission(&self) -> Result<NotificationPermission>;
    fn show(&self, title: &str, body: &str) -> Result<()>;
}

pub trait HostDocument: Send + Sync {
    fn has_focus(&self) -> bool;
}

/// Text input the user composes messages in.
pub trait ComposeField: Send + Sync {
    fn value(&self) -> String;
    fn set_value(&self, value: String);
    fn focus(&self);
}

/// Modal emoji picker surface.
pub trait DialogWidget: Send + Sync {
    fn show_modal(&self);
    fn close(&self);
}

/// Host without any notification support.
pub struct MissingNotificationCenter;

impl NotificationCenter for MissingNotificationCenter {
    fn is_supported(&self) -> bool {
        false
    }

    fn permission(&self) -> Result<NotificationPermission> {
        Err(anyhow!("notifications are unavailable on this host"))
    }

    fn show(&self, _title: &str, _body: &str) -> Result<()> {
        Err(anyhow!("notifications are unavailable on this host"))
    }
}

/// Document whose focus never changes.
pub struct FixedFocus(pub bool);

impl HostDocument for FixedFocus {
    fn has_focus(&self) -> bool {
        self.0
    }
}
