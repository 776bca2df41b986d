//! In-memory tag graph.
//!
//! Built once per run from the full tag set:
//! 1. Reconcile `children` as the inverse of `parents`
//! 2. Resolve every merge chain into a `MergeTable`
//! 3. Answer merge, ancestor and cycle queries synchronously
//!
//! The graph never repairs cycles or broken merges. It reports them through
//! `GraphDiagnostics` and keeps working with whatever resolves.

pub mod cycles;
pub mod merge;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::model::{Tag, TagId};

pub use cycles::detect_parent_cycles;
pub use merge::{trace_merge, MergeStop, MergeTable, MergeTrace};

#[derive(Debug, Clone, Default)]
pub struct TagGraph {
    tags: BTreeMap<TagId, Tag>,
    merges: MergeTable,
}

impl TagGraph {
    /// Build the graph. Duplicate ids keep the first record seen.
    pub fn build(tags: impl IntoIterator<Item = Tag>) -> Self {
        let mut index: BTreeMap<TagId, Tag> = BTreeMap::new();
        for tag in tags {
            if index.contains_key(&tag.id) {
                tracing::debug!(tag_id = %tag.id, "duplicate tag record ignored");
                continue;
            }
            index.insert(tag.id.clone(), tag);
        }

        reconcile_children(&mut index);
        let merges = MergeTable::build(&index);

        Self {
            tags: index,
            merges,
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Tag> {
        self.tags.get(id)
    }

    /// Tags in id order.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Merge destination of `id`. Ids that are not tags, or cannot be
    /// followed further, come back unchanged.
    pub fn resolve_merge<'a>(&'a self, id: &'a str) -> &'a str {
        self.merges.resolve(id)
    }

    /// Strict ancestors of `tag_ids` (already merge-resolved).
    ///
    /// Parents are merge-resolved before they are added. Merged tags
    /// contribute no parents of their own, parent ids missing from the graph
    /// are skipped, and the inputs never appear in the result.
    pub fn compute_ancestors<'a, I>(&'a self, tag_ids: I) -> BTreeSet<TagId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        for id in tag_ids {
            if seen.insert(id) {
                stack.push(id);
            }
        }

        let mut ancestors = BTreeSet::new();
        while let Some(id) = stack.pop() {
            let Some(tag) = self.tags.get(id) else {
                continue;
            };
            if tag.is_merged() {
                continue;
            }
            for parent in &tag.parents {
                if !self.tags.contains_key(parent) {
                    continue;
                }
                let parent = self.resolve_merge(parent);
                if seen.insert(parent) {
                    ancestors.insert(parent.to_string());
                    stack.push(parent);
                }
            }
        }

        ancestors
    }

    /// Tags that resolve to a different tag.
    pub fn redirect_count(&self) -> usize {
        self.merges.redirect_count()
    }

    pub fn detect_cycles(&self) -> Vec<Vec<TagId>> {
        detect_parent_cycles(&self.tags)
    }

    /// Data-quality findings. Never fatal.
    pub fn diagnostics(&self) -> GraphDiagnostics {
        let mut diagnostics = GraphDiagnostics::default();

        for tag in self.tags.values() {
            if tag.is_merged() {
                match tag.merge_target() {
                    None => diagnostics.merged_without_target.push(tag.id.clone()),
                    Some(target) if !self.tags.contains_key(target) => diagnostics
                        .dangling_merge_targets
                        .push((tag.id.clone(), target.to_string())),
                    Some(_) => {}
                }
            }
            for parent in &tag.parents {
                if !self.tags.contains_key(parent) {
                    diagnostics
                        .unknown_parents
                        .push((tag.id.clone(), parent.clone()));
                }
            }
        }

        diagnostics.merge_cycles = self.merges.cyclic_chains().to_vec();
        diagnostics.parent_cycles = self.detect_cycles();
        diagnostics
    }

    /// `name [id]` for warnings, or the bare id when the tag is unknown.
    pub fn label(&self, id: &str) -> String {
        match self.tags.get(id) {
            Some(tag) if !tag.name.is_empty() => format!("{} [{}]", tag.name, id),
            _ => id.to_string(),
        }
    }
}

/// Add missing `children` entries for every known parent. Idempotent.
fn reconcile_children(tags: &mut BTreeMap<TagId, Tag>) {
    let edges: Vec<(TagId, TagId)> = tags
        .values()
        .flat_map(|tag| {
            tag.parents
                .iter()
                .map(move |parent| (parent.clone(), tag.id.clone()))
        })
        .collect();

    let mut repaired = 0usize;
    for (parent, child) in edges {
        if let Some(parent_tag) = tags.get_mut(&parent) {
            if parent_tag.children.insert(child) {
                repaired += 1;
            }
        }
    }

    if repaired > 0 {
        tracing::debug!(repaired, "reconciled missing child edges");
    }
}

/// Data-quality findings for one graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDiagnostics {
    pub merged_without_target: Vec<TagId>,
    /// `(tag, missing target)`
    pub dangling_merge_targets: Vec<(TagId, TagId)>,
    /// Tags whose merge chain loops.
    pub merge_cycles: Vec<TagId>,
    /// `(tag, missing parent)`
    pub unknown_parents: Vec<(TagId, TagId)>,
    pub parent_cycles: Vec<Vec<TagId>>,
}

impl GraphDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.warning_count() == 0
    }

    pub fn warning_count(&self) -> usize {
        self.merged_without_target.len()
            + self.dangling_merge_targets.len()
            + self.merge_cycles.len()
            + self.unknown_parents.len()
            + self.parent_cycles.len()
    }

    /// Human-readable warnings. Counts are complete; only the first
    /// `detail_limit` examples of each category are spelled out.
    pub fn warnings(&self, graph: &TagGraph, detail_limit: usize) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.merged_without_target.is_empty() {
            lines.push(format!(
                "{} merged tag(s) without a merge target: {}",
                self.merged_without_target.len(),
                sample(
                    self.merged_without_target.iter().map(|id| graph.label(id)),
                    detail_limit
                )
            ));
        }

        if !self.dangling_merge_targets.is_empty() {
            lines.push(format!(
                "{} merged tag(s) pointing at a missing tag: {}",
                self.dangling_merge_targets.len(),
                sample(
                    self.dangling_merge_targets
                        .iter()
                        .map(|(id, target)| format!("{} -> {}", graph.label(id), target)),
                    detail_limit
                )
            ));
        }

        if !self.merge_cycles.is_empty() {
            lines.push(format!(
                "{} tag(s) with a looping merge chain: {}",
                self.merge_cycles.len(),
                sample(
                    self.merge_cycles.iter().map(|id| graph.label(id)),
                    detail_limit
                )
            ));
        }

        if !self.unknown_parents.is_empty() {
            lines.push(format!(
                "{} parent reference(s) to a missing tag: {}",
                self.unknown_parents.len(),
                sample(
                    self.unknown_parents
                        .iter()
                        .map(|(id, parent)| format!("{} -> {}", graph.label(id), parent)),
                    detail_limit
                )
            ));
        }

        for cycle in self.parent_cycles.iter().take(detail_limit) {
            let chain: Vec<String> = cycle.iter().map(|id| graph.label(id)).collect();
            lines.push(format!("parent cycle: {}", chain.join(" -> ")));
        }
        if self.parent_cycles.len() > detail_limit {
            lines.push(format!(
                "... and {} more parent cycle(s)",
                self.parent_cycles.len() - detail_limit
            ));
        }

        lines
    }
}

fn sample(items: impl ExactSizeIterator<Item = String>, limit: usize) -> String {
    let total = items.len();
    let shown: Vec<String> = items.take(limit).collect();
    if total > shown.len() {
        format!("{} (+{} more)", shown.join(", "), total - shown.len())
    } else {
        shown.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn set(ids: &[&str]) -> BTreeSet<TagId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn sample_graph() -> TagGraph {
        TagGraph::build(vec![
            Tag::new("art", "Art"),
            Tag::new("craft", "Craft").with_parent("art"),
            Tag::new("wood", "Woodwork").with_parent("craft"),
            Tag::new("carving", "Carving").with_parent("wood"),
            Tag::new("mokuchou", "木彫").merged_into("carving"),
        ])
    }

    #[test]
    fn build_reconciles_children() {
        let graph = sample_graph();
        assert_eq!(graph.get("art").unwrap().children, set(&["craft"]));
        assert_eq!(graph.get("wood").unwrap().children, set(&["carving"]));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let once = sample_graph();
        let twice = TagGraph::build(once.tags().cloned().collect::<Vec<_>>());
        let a: Vec<&Tag> = once.tags().collect();
        let b: Vec<&Tag> = twice.tags().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn ancestors_walk_the_full_chain() {
        let graph = sample_graph();
        assert_eq!(
            graph.compute_ancestors(["carving"]),
            set(&["art", "craft", "wood"])
        );
    }

    #[test]
    fn ancestors_exclude_inputs() {
        let graph = sample_graph();
        assert_eq!(graph.compute_ancestors(["carving", "craft"]), set(&["art", "wood"]));
    }

    #[test]
    fn ancestors_resolve_merged_parents() {
        let graph = TagGraph::build(vec![
            Tag::new("new-parent", "New"),
            Tag::new("old-parent", "Old").merged_into("new-parent"),
            Tag::new("child", "Child").with_parent("old-parent"),
        ]);
        assert_eq!(graph.compute_ancestors(["child"]), set(&["new-parent"]));
    }

    #[test]
    fn merged_tags_contribute_no_parents() {
        let graph = TagGraph::build(vec![
            Tag::new("p", "P"),
            Tag::new("x", "X").merged_into("").with_parent("p"),
        ]);
        assert!(graph.compute_ancestors(["x"]).is_empty());
    }

    #[test]
    fn hidden_tags_take_part_in_the_graph() {
        let graph = TagGraph::build(vec![
            Tag::new("root", "Root").hidden(),
            Tag::new("mid", "Mid").hidden().with_parent("root"),
            Tag::new("leaf", "Leaf").with_parent("mid"),
            Tag::new("legacy", "Legacy").merged_into("mid"),
        ]);

        assert_eq!(graph.get("root").unwrap().children, set(&["mid"]));
        assert_eq!(graph.compute_ancestors(["leaf"]), set(&["mid", "root"]));
        assert_eq!(graph.compute_ancestors(["mid"]), set(&["root"]));
        assert_eq!(graph.resolve_merge("legacy"), "mid");
        assert_eq!(graph.resolve_merge("mid"), "mid");
        assert_eq!(graph.diagnostics().warning_count(), 0);
    }

    #[test]
    fn ancestors_terminate_on_cycles() {
        let graph = TagGraph::build(vec![
            Tag::new("a", "A").with_parent("b"),
            Tag::new("b", "B").with_parent("c"),
            Tag::new("c", "C").with_parent("a"),
        ]);
        assert_eq!(graph.compute_ancestors(["a"]), set(&["b", "c"]));
    }

    #[test]
    fn resolve_merge_scenarios() {
        let graph = TagGraph::build(vec![
            Tag::new("a", "A"),
            Tag::new("b", "B").merged_into("a"),
            Tag::new("x", "X").merged_into(""),
        ]);
        assert_eq!(graph.resolve_merge("b"), "a");
        assert_eq!(graph.resolve_merge("x"), "x");
        assert_eq!(graph.resolve_merge("nope"), "nope");
    }

    #[test]
    fn diagnostics_report_every_category() {
        let graph = TagGraph::build(vec![
            Tag::new("x", "X").merged_into(""),
            Tag::new("y", "Y").merged_into("gone"),
            Tag::new("m1", "M1").merged_into("m2"),
            Tag::new("m2", "M2").merged_into("m1"),
            Tag::new("orphan", "Orphan").with_parent("ghost"),
            Tag::new("c1", "C1").with_parent("c2"),
            Tag::new("c2", "C2").with_parent("c1"),
        ]);
        let diagnostics = graph.diagnostics();
        assert_eq!(diagnostics.merged_without_target, vec!["x"]);
        assert_eq!(
            diagnostics.dangling_merge_targets,
            vec![("y".to_string(), "gone".to_string())]
        );
        assert_eq!(diagnostics.merge_cycles, vec!["m1", "m2"]);
        assert_eq!(
            diagnostics.unknown_parents,
            vec![("orphan".to_string(), "ghost".to_string())]
        );
        assert_eq!(diagnostics.parent_cycles, vec![vec!["c1", "c2", "c1"]]);
        assert_eq!(diagnostics.warning_count(), 6);

        let warnings = diagnostics.warnings(&graph, 10);
        assert_eq!(warnings.len(), 5);
        assert_eq!(warnings[0], "1 merged tag(s) without a merge target: X [x]");
        assert_eq!(warnings[4], "parent cycle: C1 [c1] -> C2 [c2] -> C1 [c1]");
    }

    #[test]
    fn warning_detail_is_capped() {
        let tags: Vec<Tag> = (0..15)
            .map(|i| Tag::new(format!("t{i:02}"), "").merged_into(""))
            .collect();
        let graph = TagGraph::build(tags);
        let warnings = graph.diagnostics().warnings(&graph, 3);
        assert_eq!(
            warnings,
            vec!["15 merged tag(s) without a merge target: t00, t01, t02 (+12 more)"]
        );
    }

    #[test]
    fn clean_graph_has_no_warnings() {
        let graph = sample_graph();
        let diagnostics = graph.diagnostics();
        assert!(diagnostics.is_clean());
        assert!(diagnostics.warnings(&graph, 10).is_empty());
    }

    // -- Property tests --

    fn arb_tags() -> impl Strategy<Value = Vec<Tag>> {
        let ids: Vec<String> = (0..8).map(|i| format!("t{i}")).collect();
        let id_pick = proptest::sample::select(ids.clone());
        let parents = proptest::collection::btree_set(id_pick.clone(), 0..3);
        let merge = proptest::option::of(proptest::option::of(id_pick));
        proptest::collection::vec((parents, merge), 8).prop_map(move |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (parents, merge))| {
                    let mut tag = Tag::new(format!("t{i}"), format!("Tag {i}"));
                    tag.parents = parents;
                    match merge {
                        None => {}
                        Some(None) => tag = tag.merged_into(""),
                        Some(Some(target)) => tag = tag.merged_into(target),
                    }
                    tag
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merge_resolution_terminates_within_tag_count(tags in arb_tags()) {
            let index: BTreeMap<TagId, Tag> =
                tags.iter().map(|t| (t.id.clone(), t.clone())).collect();
            for id in index.keys() {
                let trace = trace_merge(&index, id);
                prop_assert!(trace.steps <= index.len());
            }
        }

        #[test]
        fn ancestors_never_contain_inputs(
            tags in arb_tags(),
            picks in proptest::collection::btree_set(0usize..8, 0..4),
        ) {
            let graph = TagGraph::build(tags);
            let inputs: Vec<String> = picks
                .iter()
                .map(|i| graph.resolve_merge(&format!("t{i}")).to_string())
                .collect();
            let ancestors = graph.compute_ancestors(inputs.iter().map(String::as_str));
            for input in &inputs {
                prop_assert!(!ancestors.contains(input));
            }
        }

        #[test]
        fn cycle_chains_start_and_end_on_the_same_tag(tags in arb_tags()) {
            let graph = TagGraph::build(tags);
            for cycle in graph.detect_cycles() {
                prop_assert!(cycle.len() >= 2);
                prop_assert_eq!(cycle.first(), cycle.last());
            }
        }
    }
}
