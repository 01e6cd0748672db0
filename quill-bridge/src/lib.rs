//! Discord ⇄ Microsoft Teams chat bridge
//!
//! A single-process service: webhook ingress for Graph change
//! notifications, two FIFO relay workers, a device-code login surface,
//! and per-guild settings in Postgres. The Discord gateway client that
//! delivers messages and slash commands is an external collaborator; it
//! drives the operations in [`connect`].

use std::sync::Arc;

use quill_graph::{Auth, Chats, Subscriptions};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub mod client_state;
pub mod config;
pub mod connect;
pub mod discord;
pub mod error;
pub mod ingress;
pub mod relay;
pub mod settings;
pub mod translate;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};

use connect::LoginTracker;
use discord::DiscordClient;
use settings::SettingsStore;

/// Shared application state
pub struct AppState {
    pub config: BridgeConfig,
    pub store: Arc<dyn SettingsStore>,
    pub auth: Auth,
    pub subscriptions: Subscriptions,
    pub chats: Chats,
    pub discord: DiscordClient,
    pub logins: LoginTracker,
    pub chat_queue: UnboundedSender<JsonValue>,
    pub lifecycle_queue: UnboundedSender<JsonValue>,
}

/// Receiving ends of the relay queues, handed to the workers.
pub struct RelayReceivers {
    pub chat: UnboundedReceiver<JsonValue>,
    pub lifecycle: UnboundedReceiver<JsonValue>,
}

impl AppState {
    pub fn new(config: BridgeConfig, store: Arc<dyn SettingsStore>) -> (Arc<Self>, RelayReceivers) {
        let auth = Auth::with_authority_base(
            config.client_id.clone(),
            config.tenant.clone(),
            &config.authority_base,
        );
        let subscriptions = Subscriptions::new(config.graph_base.clone(), auth.clone());
        let chats = Chats::new(config.graph_base.clone());
        let discord = DiscordClient::new(config.discord_api_base.clone(), config.bot_token.clone());

        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();

        let state = Arc::new(Self {
            config,
            store,
            auth,
            subscriptions,
            chats,
            discord,
            logins: LoginTracker::default(),
            chat_queue: chat_tx,
            lifecycle_queue: lifecycle_tx,
        });
        (
            state,
            RelayReceivers {
                chat: chat_rx,
                lifecycle: lifecycle_rx,
            },
        )
    }
}
