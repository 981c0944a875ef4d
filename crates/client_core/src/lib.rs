//! Client side of the chat feed: the live message stream, notifications and
//! the glyph picker, with every host facility injected as a trait object.

pub mod actions;
pub mod capabilities;
pub mod config;
pub mod cookies;
pub mod identity;
pub mod notify;
pub mod page;
pub mod picker;
pub mod reconnect;
pub mod render;
pub mod stream;
pub mod transport;

pub use actions::{ActionError, ChatActions};
pub use capabilities::{
    ComposeField, CookieStore, DialogWidget, FixedFocus, HostDocument, MissingNotificationCenter,
    NotificationCenter, RenderSink,
};
pub use config::{load_settings, ClientSettings};
pub use cookies::{FileCookieStore, MemoryCookieStore};
pub use identity::IdentityResolver;
pub use notify::NotificationDispatcher;
pub use page::{ChatPage, PageCapabilities, UiEvent};
pub use picker::{DialogState, PickerCoordinator};
pub use reconnect::ReconnectPolicy;
pub use render::MessageList;
pub use stream::{ConnectionState, StreamConnectionManager, StreamSettings, StreamStats};
pub use transport::{HttpSseConnector, StreamConnector};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
