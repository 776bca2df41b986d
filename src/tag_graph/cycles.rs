//! Cycle detection over parent edges (child -> parent).
//!
//! DFS with path tracking. Every tag is used as a root once unless an earlier
//! traversal already finished it, so the whole pass is O(V + E).

use std::collections::{BTreeMap, HashSet};

use crate::model::{Tag, TagId};

/// Each cycle is the DFS path from the first occurrence of the repeated id
/// through the current id, with the repeated id appended: `[a, b, c, a]`.
pub fn detect_parent_cycles(tags: &BTreeMap<TagId, Tag>) -> Vec<Vec<TagId>> {
    let mut finished: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();

    for id in tags.keys() {
        if finished.contains(id.as_str()) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        visit(id, tags, &mut finished, &mut path, &mut on_path, &mut cycles);
    }

    cycles
}

fn visit<'a>(
    id: &'a str,
    tags: &'a BTreeMap<TagId, Tag>,
    finished: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    on_path: &mut HashSet<&'a str>,
    cycles: &mut Vec<Vec<TagId>>,
) {
    if on_path.contains(id) {
        if let Some(pos) = path.iter().position(|step| *step == id) {
            let mut chain: Vec<TagId> = path[pos..].iter().map(|step| step.to_string()).collect();
            chain.push(id.to_string());
            cycles.push(chain);
        }
        return;
    }

    if finished.contains(id) {
        return;
    }

    let Some(tag) = tags.get(id) else {
        return;
    };

    path.push(id);
    on_path.insert(id);

    for parent in &tag.parents {
        if tags.contains_key(parent) {
            visit(parent, tags, finished, path, on_path, cycles);
        }
    }

    path.pop();
    on_path.remove(id);
    finished.insert(id);
}
