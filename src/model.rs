//! Catalog records shared by the graph, the engine and the store adapters.
//!
//! Adapters hand the engine already-resolved records; document-database
//! property names never reach this layer.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque tag identifier assigned by the store.
pub type TagId = String;

/// Opaque work identifier assigned by the store.
pub type WorkId = String;

/// Lifecycle state of a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    #[default]
    Active,
    /// Redirected to `merge_to`.
    Merged,
    /// Excluded from suggestions, still part of the graph.
    Hidden,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Merged => "merged",
            Self::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for TagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A taxonomy node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub status: TagStatus,
    /// Present only when `status == Merged`; may point at another merged tag.
    pub merge_to: Option<TagId>,
    pub parents: BTreeSet<TagId>,
    /// Inverse of `parents`; reconciled by `TagGraph::build`.
    pub children: BTreeSet<TagId>,
    pub aliases: Vec<String>,
    pub usage_count: u64,
}

impl Tag {
    pub fn new(id: impl Into<TagId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<TagId>) -> Self {
        self.parents.insert(parent.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Mark this tag as merged into `target`. An empty target is kept as-is
    /// so dirty data can be represented faithfully.
    pub fn merged_into(mut self, target: impl Into<TagId>) -> Self {
        self.status = TagStatus::Merged;
        self.merge_to = Some(target.into());
        self
    }

    /// Hide this tag from suggestions. It stays part of the graph.
    pub fn hidden(mut self) -> Self {
        self.status = TagStatus::Hidden;
        self
    }

    pub fn is_merged(&self) -> bool {
        self.status == TagStatus::Merged
    }

    /// The merge target when it is set and non-blank.
    pub fn merge_target(&self) -> Option<&str> {
        self.merge_to
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }
}

/// A catalog entry carrying assigned tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Work {
    pub id: WorkId,
    pub title: String,
    /// ISO `YYYY-MM-DD`; an empty string reads as no date.
    #[serde(deserialize_with = "blank_date_as_none")]
    pub completed_date: Option<NaiveDate>,
    pub ready: bool,
    /// Order is irrelevant; duplicates are tolerated on read.
    pub tag_ids: Vec<TagId>,
}

fn blank_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Work {
    pub fn new(id: impl Into<WorkId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TagId>,
    {
        self.tag_ids = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn completed_on(mut self, date: NaiveDate) -> Self {
        self.completed_date = Some(date);
        self
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }
}

/// Selection criteria for candidate works. All present criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkFilter {
    /// Inclusive lower bound on the completed date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the completed date.
    pub to: Option<NaiveDate>,
    pub tag_id: Option<TagId>,
    pub unprepared_only: bool,
}

impl WorkFilter {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.tag_id.is_none() && !self.unprepared_only
    }

    /// Evaluate the filter in memory. Works without a completed date never
    /// match a date bound.
    pub fn matches(&self, work: &Work) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = work.completed_date else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        if let Some(tag_id) = &self.tag_id {
            if !work.tag_ids.iter().any(|id| id == tag_id) {
                return false;
            }
        }

        !(self.unprepared_only && work.ready)
    }
}
