//! Tag creation with duplicate detection.

use serde::Serialize;

use crate::error::RecalcError;
use crate::model::{TagId, TagStatus};
use crate::normalize::TagNameIndex;
use crate::store::TagStore;
use crate::tag_graph::TagGraph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TagOutcome {
    /// Matched an existing name or alias.
    Existing { id: TagId },
    Created { id: TagId },
    /// Dry run: no match, nothing written.
    WouldCreate,
}

impl TagOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Existing { id } | Self::Created { id } => Some(id),
            Self::WouldCreate => None,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagResolution {
    pub name: String,
    #[serde(flatten)]
    pub outcome: TagOutcome,
}

/// A search hit, reported with the status of the tag it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagMatch {
    pub id: TagId,
    pub status: TagStatus,
}

async fn load_graph(store: &dyn TagStore) -> Result<TagGraph, RecalcError> {
    let tags = store
        .load_all_tags()
        .await
        .map_err(|source| RecalcError::StoreRead {
            resource: "tags",
            source,
        })?;
    Ok(TagGraph::build(tags))
}

/// Look up the tag matching `name`, if any.
///
/// Hidden tags are left out of search results unless `include_hidden` is
/// set. Creation still dedups against them.
pub async fn find_tag(
    store: &dyn TagStore,
    name: &str,
    include_hidden: bool,
) -> Result<Option<TagMatch>, RecalcError> {
    let graph = load_graph(store).await?;
    let index = TagNameIndex::build(&graph);
    let Some(id) = index.find(name) else {
        return Ok(None);
    };

    let status = graph.get(id).map(|tag| tag.status).unwrap_or_default();
    if status == TagStatus::Hidden && !include_hidden {
        return Ok(None);
    }
    Ok(Some(TagMatch {
        id: id.to_string(),
        status,
    }))
}

/// Resolve each name to an existing tag, creating the missing ones.
///
/// Names that normalize to the same key within one call create a single tag.
pub async fn find_or_create_tags(
    store: &dyn TagStore,
    names: &[String],
    dry_run: bool,
) -> Result<Vec<TagResolution>, RecalcError> {
    let mut index = TagNameIndex::build(&load_graph(store).await?);
    let mut resolutions = Vec::with_capacity(names.len());

    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let outcome = match index.find(name) {
            Some(id) => TagOutcome::Existing { id: id.to_string() },
            None if dry_run => TagOutcome::WouldCreate,
            None => {
                let id = store
                    .create_tag(name)
                    .await
                    .map_err(|source| RecalcError::StoreWrite {
                        resource: "tags",
                        source,
                    })?;
                index.insert(name, id.clone());
                TagOutcome::Created { id }
            }
        };

        tracing::debug!(name, ?outcome, "tag resolved");
        resolutions.push(TagResolution {
            name: name.to_string(),
            outcome,
        });
    }

    Ok(resolutions)
}

/// Single-name form used by the HTTP surface. Returns the id and whether it
/// was created.
pub async fn find_or_create_tag(
    store: &dyn TagStore,
    name: &str,
) -> Result<(TagId, bool), RecalcError> {
    if name.trim().is_empty() {
        return Err(RecalcError::InvalidRequest("name is blank".into()));
    }
    let resolutions = find_or_create_tags(store, &[name.to_string()], false).await?;
    match resolutions.into_iter().next().map(|r| r.outcome) {
        Some(TagOutcome::Existing { id }) => Ok((id, false)),
        Some(TagOutcome::Created { id }) => Ok((id, true)),
        _ => Err(RecalcError::InvalidRequest("name is blank".into())),
    }
}
