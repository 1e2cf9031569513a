//! Application state wiring the core to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use chatwire_core::chat::ChatController;
use chatwire_core::persistence::KvGateway;
use chatwire_core::store::{ConversationStore, TokioClock};
use chatwire_infra::config::load_client_config;
use chatwire_infra::filesystem::{FileKv, resolve_data_dir, store_dir};
use chatwire_infra::http::HttpTransport;
use chatwire_infra::secret::resolve_token;
use chatwire_types::config::ClientConfig;

/// Controller pinned to the HTTP transport and file-backed storage.
pub type ConcreteController = ChatController<HttpTransport, KvGateway<FileKv>, TokioClock>;

pub struct AppState {
    pub config: ClientConfig,
    pub data_dir: PathBuf,
    /// Raw store, shared with the controller's gateway (credentials live here).
    pub kv: FileKv,
    pub controller: ConcreteController,
}

impl AppState {
    /// Load config, open storage, restore the conversation store.
    pub async fn init(endpoint_override: Option<String>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let mut config = load_client_config(&data_dir).await;
        if let Some(endpoint) = endpoint_override {
            config.endpoint = endpoint;
        }

        let kv = FileKv::open(store_dir(&data_dir)).context("failed to open local store")?;
        let token = resolve_token(&kv);
        let transport =
            HttpTransport::new(&config, token).context("failed to set up HTTP transport")?;

        let mut store = ConversationStore::new(
            KvGateway::new(kv.clone()),
            TokioClock,
            Duration::from_millis(config.persist_debounce_ms),
        );
        store.restore();

        tracing::debug!(
            data_dir = %data_dir.display(),
            endpoint = %config.endpoint,
            framing = %config.framing,
            "application state initialised"
        );

        let controller =
            ChatController::new(Arc::new(transport), store, config.user_id, config.framing);

        Ok(Self {
            config,
            data_dir,
            kv,
            controller,
        })
    }
}
