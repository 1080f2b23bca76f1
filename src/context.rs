//! Shared handles passed to every pipeline operation.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::events::{EventSink, TracingSink};
use crate::llm::{ChatClient, HttpChatClient, UnconfiguredChatClient};
use crate::storage::{LocalObjectStore, ObjectStore};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub llm: Arc<dyn ChatClient>,
    pub store: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventSink>,
}

impl AppContext {
    /// Connect to the database and build the default collaborators: the HTTP
    /// chat client (when `[llm]` is configured), a local object store under
    /// `storage.root`, and a tracing event sink.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;

        let llm: Arc<dyn ChatClient> = if config.llm.is_configured() {
            match HttpChatClient::from_config(&config.llm) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::warn!("chat client unavailable: {:#}", e);
                    Arc::new(UnconfiguredChatClient)
                }
            }
        } else {
            Arc::new(UnconfiguredChatClient)
        };

        Ok(Self {
            config: Arc::new(config.clone()),
            pool,
            llm,
            store: Arc::new(LocalObjectStore::new(config.storage.root.clone())),
            events: Arc::new(TracingSink),
        })
    }

    pub fn with_llm(mut self, llm: Arc<dyn ChatClient>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}
