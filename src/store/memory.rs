//! In-memory store.
//!
//! Holds a tag/work snapshot behind async locks. Used by the test suites and
//! by `gallery_admin --snapshot <file>` for offline dry runs; writes stay in
//! process.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{Result, StoreProvider, TagStore, WorkStore};
use crate::error::StoreError;
use crate::model::{Tag, TagId, Work, WorkFilter, WorkId};

/// Serialized form: `{"tags": [...], "works": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub tags: Vec<Tag>,
    pub works: Vec<Work>,
}

#[derive(Debug)]
pub struct MemoryStore {
    tags: RwLock<Vec<Tag>>,
    works: RwLock<Vec<Work>>,
    patches: RwLock<Vec<(WorkId, Vec<TagId>)>>,
    failing_writes: RwLock<HashSet<WorkId>>,
    failing_reads: RwLock<bool>,
    active_status: String,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new(tags: Vec<Tag>, works: Vec<Work>) -> Self {
        Self {
            tags: RwLock::new(tags),
            works: RwLock::new(works),
            patches: RwLock::new(Vec::new()),
            failing_writes: RwLock::new(HashSet::new()),
            failing_reads: RwLock::new(false),
            active_status: "active".to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::new(snapshot.tags, snapshot.works)
    }

    /// Load a JSON snapshot file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            tags = snapshot.tags.len(),
            works = snapshot.works.len(),
            "snapshot loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn with_active_status(mut self, status: impl Into<String>) -> Self {
        self.active_status = status.into();
        self
    }

    /// Make every later patch of `work_id` fail.
    pub async fn fail_writes_for(&self, work_id: impl Into<WorkId>) {
        self.failing_writes.write().await.insert(work_id.into());
    }

    /// Make every later read fail.
    pub async fn fail_reads(&self) {
        *self.failing_reads.write().await = true;
    }

    pub async fn work(&self, work_id: &str) -> Option<Work> {
        self.works
            .read()
            .await
            .iter()
            .find(|work| work.id == work_id)
            .cloned()
    }

    /// Successful patches in the order they were applied.
    pub async fn patches(&self) -> Vec<(WorkId, Vec<TagId>)> {
        self.patches.read().await.clone()
    }

    async fn check_reads(&self) -> Result<()> {
        if *self.failing_reads.read().await {
            return Err(StoreError::Rejected("reads disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn load_all_tags(&self) -> Result<Vec<Tag>> {
        self.check_reads().await?;
        Ok(self.tags.read().await.clone())
    }

    fn default_active_status(&self) -> &str {
        &self.active_status
    }

    async fn create_tag(&self, name: &str) -> Result<TagId> {
        let id = format!("tag-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tags.write().await.push(Tag::new(id.clone(), name));
        Ok(id)
    }
}

#[async_trait]
impl WorkStore for MemoryStore {
    async fn query_works(&self, filter: &WorkFilter) -> Result<Vec<Work>> {
        self.check_reads().await?;
        Ok(self
            .works
            .read()
            .await
            .iter()
            .filter(|work| filter.matches(work))
            .cloned()
            .collect())
    }

    async fn patch_work_tags(&self, work_id: &str, tag_ids: &[TagId]) -> Result<()> {
        if self.failing_writes.read().await.contains(work_id) {
            return Err(StoreError::Rejected(format!("write to {work_id} refused")));
        }

        let mut works = self.works.write().await;
        let work = works
            .iter_mut()
            .find(|work| work.id == work_id)
            .ok_or_else(|| StoreError::NotFound(format!("work {work_id}")))?;
        work.tag_ids = tag_ids.to_vec();
        drop(works);

        self.patches
            .write()
            .await
            .push((work_id.to_string(), tag_ids.to_vec()));
        Ok(())
    }
}

impl StoreProvider for Arc<MemoryStore> {
    fn tag_store(&self) -> Arc<dyn TagStore> {
        self.clone()
    }

    fn work_store(&self) -> Arc<dyn WorkStore> {
        self.clone()
    }
}
