//! Store seams consumed by the recalculation engine.
//!
//! The engine only talks to these traits. `NotionStores` backs them with the
//! document database; `MemoryStore` backs them with an in-process snapshot
//! for tests and offline runs.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Tag, TagId, Work, WorkFilter};

pub use memory::{MemoryStore, Snapshot};

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait TagStore: Send + Sync {
    /// The complete tag set. Implementations drain pagination themselves.
    async fn load_all_tags(&self) -> Result<Vec<Tag>>;

    /// Status label given to newly created tags.
    fn default_active_status(&self) -> &str;

    /// Create a tag with the default active status and return its id.
    async fn create_tag(&self, name: &str) -> Result<TagId>;
}

#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Every work matching `filter`. Implementations drain pagination themselves.
    async fn query_works(&self, filter: &WorkFilter) -> Result<Vec<Work>>;

    /// Replace the tag list of one work in a single update.
    async fn patch_work_tags(&self, work_id: &str, tag_ids: &[TagId]) -> Result<()>;
}

/// Hands out store handles for one invocation.
///
/// Long-lived callers (the HTTP server) ask for fresh handles per request so
/// no adapter state leaks across requests.
pub trait StoreProvider: Send + Sync {
    fn tag_store(&self) -> Arc<dyn TagStore>;
    fn work_store(&self) -> Arc<dyn WorkStore>;
}
