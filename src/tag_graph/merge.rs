//! Merge resolution.
//!
//! Every tag's merge chain is walked once when the graph is built and the
//! destination is kept in a `MergeTable` owned by that graph. Nothing is
//! cached outside of a graph instance.
//!
//! A chain that runs into a loop resolves to the smallest id on that loop, so
//! resolving a destination again always yields the same destination.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{Tag, TagId};

/// Why a merge walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStop {
    /// Reached a tag that is not merged.
    Resolved,
    /// The start id is not a known tag.
    Unknown,
    /// A merged tag without a merge target.
    MissingTarget,
    /// A merge target that is not a known tag.
    DanglingTarget,
    /// The next hop would revisit a tag already on this chain.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTrace {
    pub destination: TagId,
    /// Number of `merge_to` hops followed.
    pub steps: usize,
    pub stop: MergeStop,
}

/// Follow `merge_to` pointers from `start` until the chain ends, breaks or loops.
pub fn trace_merge(tags: &BTreeMap<TagId, Tag>, start: &str) -> MergeTrace {
    let mut current = start;
    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut steps = 0;

    let stop = loop {
        let Some(tag) = tags.get(current) else {
            break MergeStop::Unknown;
        };
        if !tag.is_merged() {
            break MergeStop::Resolved;
        }
        let Some(target) = tag.merge_target() else {
            break MergeStop::MissingTarget;
        };
        let Some((target, _)) = tags.get_key_value(target) else {
            break MergeStop::DanglingTarget;
        };
        if !visited.insert(target.as_str()) {
            break MergeStop::Cycle;
        }
        current = target.as_str();
        steps += 1;
    };

    MergeTrace {
        destination: current.to_string(),
        steps,
        stop,
    }
}

/// Smallest id on the merge loop that `last` closes.
fn loop_representative(tags: &BTreeMap<TagId, Tag>, last: &str) -> TagId {
    let mut smallest = last;
    let mut current = last;
    while let Some(next) = tags
        .get(current)
        .and_then(Tag::merge_target)
        .and_then(|target| tags.get_key_value(target))
        .map(|(id, _)| id.as_str())
    {
        if next == last {
            break;
        }
        smallest = smallest.min(next);
        current = next;
    }
    smallest.to_string()
}

/// Resolved merge destination for every tag of one graph.
#[derive(Debug, Clone, Default)]
pub struct MergeTable {
    destinations: HashMap<TagId, TagId>,
    cycles: Vec<TagId>,
}

impl MergeTable {
    pub(crate) fn build(tags: &BTreeMap<TagId, Tag>) -> Self {
        let mut table = Self::default();
        for id in tags.keys() {
            let trace = trace_merge(tags, id);
            let destination = if trace.stop == MergeStop::Cycle {
                table.cycles.push(id.clone());
                loop_representative(tags, &trace.destination)
            } else {
                trace.destination
            };
            if destination != *id {
                table.destinations.insert(id.clone(), destination);
            }
        }
        table
    }

    /// Destination for `id`; unknown and unmerged ids resolve to themselves.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.destinations.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Tags whose merge chain loops back on itself.
    pub fn cyclic_chains(&self) -> &[TagId] {
        &self.cycles
    }

    /// Number of tags redirected somewhere other than themselves.
    pub fn redirect_count(&self) -> usize {
        self.destinations.len()
    }
}
