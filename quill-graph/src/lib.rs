//! Microsoft identity platform and Graph API client for the quill bridge.
//!
//! Covers the device-code OAuth flow (login, polling, refresh), Graph
//! change-notification subscriptions, and chat message fetch/post. All
//! clients are plain structs over a `reqwest::Client`; base URLs are
//! constructor parameters so tests can point them at a local server.

mod chats;
mod error;
mod oauth;
mod subscriptions;
mod types;

pub use chats::{Chats, DEFAULT_GRAPH_BASE};
pub use error::{GraphError, Result};
pub use oauth::{Auth, DEFAULT_AUTHORITY_BASE, REFRESH_MARGIN_SECS};
pub use subscriptions::Subscriptions;
pub use types::{
    ChatMessage, CreateSubscription, DeviceAuthorization, IdClaims, LifecycleNotification,
    MessageBody, MessageSender, ProviderError, SenderUser, Subscription, TokenSet,
};
