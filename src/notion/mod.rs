//! Notion-backed store adapters.
//!
//! Property names are discovered from each database schema; nothing above
//! this module sees them.

pub mod client;
pub mod schema;
pub mod tags;
pub mod works;

use std::sync::Arc;

use serde_json::Value;

pub use client::NotionClient;
pub use tags::NotionTagStore;
pub use works::NotionWorkStore;

use crate::config::AdminConfig;
use crate::error::StoreError;
use crate::store::{StoreProvider, TagStore, WorkStore};
use schema::PropertyRef;

/// Relation ids of `page`, fetching the full list when the inline one was
/// truncated.
pub(crate) async fn full_relation(
    client: &NotionClient,
    page: &Value,
    page_id: &str,
    prop: &PropertyRef,
) -> Result<Vec<String>, StoreError> {
    let (ids, has_more) = schema::relation_ids(page, &prop.name);
    if !has_more {
        return Ok(ids);
    }
    tracing::debug!(page_id, property = %prop.name, inline = ids.len(), "expanding relation");
    client.relation_property(page_id, &prop.id).await
}

/// Builds fresh Notion adapters for every invocation so cached schemas never
/// outlive one run.
#[derive(Clone)]
pub struct NotionStores {
    client: NotionClient,
    config: AdminConfig,
}

impl NotionStores {
    pub fn new(config: AdminConfig) -> Self {
        Self {
            client: NotionClient::new(&config.notion),
            config,
        }
    }
}

impl StoreProvider for NotionStores {
    fn tag_store(&self) -> Arc<dyn TagStore> {
        Arc::new(NotionTagStore::new(
            self.client.clone(),
            self.config.notion.tags_database_id.clone(),
            self.config.status_labels.clone(),
        ))
    }

    fn work_store(&self) -> Arc<dyn WorkStore> {
        Arc::new(NotionWorkStore::new(
            self.client.clone(),
            self.config.notion.works_database_id.clone(),
            self.config.work_properties.clone(),
        ))
    }
}
