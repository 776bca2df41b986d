//! Per-work tag diff.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{TagId, Work, WorkId};
use crate::tag_graph::TagGraph;

/// A work whose stored tags differ from their normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub work_id: WorkId,
    pub title: String,
    pub completed_date: Option<NaiveDate>,
    /// Stored tag ids, deduplicated and sorted.
    pub before: Vec<TagId>,
    /// Normalized tag ids, sorted.
    pub after: Vec<TagId>,
}

impl Change {
    pub fn added(&self) -> impl Iterator<Item = &TagId> {
        self.after.iter().filter(|id| !self.before.contains(id))
    }

    pub fn removed(&self) -> impl Iterator<Item = &TagId> {
        self.before.iter().filter(|id| !self.after.contains(id))
    }
}

/// Merge-resolve `tag_ids` and add every ancestor.
///
/// Blank ids are dropped. Ids unknown to the graph are kept as they are.
pub fn normalize_tag_set<'a, I>(graph: &TagGraph, tag_ids: I) -> BTreeSet<TagId>
where
    I: IntoIterator<Item = &'a str>,
{
    let resolved: BTreeSet<&str> = tag_ids
        .into_iter()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| graph.resolve_merge(id))
        .collect();

    let mut normalized: BTreeSet<TagId> = graph.compute_ancestors(resolved.iter().copied());
    normalized.extend(resolved.into_iter().map(str::to_string));
    normalized
}

/// The change needed to normalize `work`, or `None` when its tag set is
/// already normalized.
pub fn compute_change(graph: &TagGraph, work: &Work) -> Option<Change> {
    let before: BTreeSet<&str> = work.tag_ids.iter().map(String::as_str).collect();
    let after = normalize_tag_set(graph, before.iter().copied());

    if after.len() == before.len() && after.iter().all(|id| before.contains(id.as_str())) {
        return None;
    }

    Some(Change {
        work_id: work.id.clone(),
        title: work.title.clone(),
        completed_date: work.completed_date,
        before: before.into_iter().map(str::to_string).collect(),
        after: after.into_iter().collect(),
    })
}

/// Changes for every work, in input order.
pub fn plan_changes(graph: &TagGraph, works: &[Work]) -> Vec<Change> {
    works
        .iter()
        .filter_map(|work| compute_change(graph, work))
        .collect()
}
