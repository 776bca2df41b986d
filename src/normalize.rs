//! Tag name normalization for duplicate detection.
//!
//! Katakana U+30A1..=U+30F6 folds to hiragana (code point - 0x60) and ASCII
//! letters fold to lower case. Both sides of a comparison go through the
//! same function.

use std::collections::HashMap;

use crate::model::TagId;
use crate::tag_graph::TagGraph;

const KATAKANA_START: char = '\u{30A1}';
const KATAKANA_END: char = '\u{30F6}';
const KANA_OFFSET: u32 = 0x60;

pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            KATAKANA_START..=KATAKANA_END => char::from_u32(c as u32 - KANA_OFFSET).unwrap_or(c),
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Split free-form tag input such as `"#木彫り　#作品"` into names.
/// Separators are ASCII whitespace and the ideographic space; a leading `#`
/// is dropped and duplicates keep their first position.
pub fn parse_tag_input(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for raw in input.split(|c: char| c.is_whitespace() || c == '\u{3000}') {
        let name = raw.trim().trim_start_matches('#').trim();
        if !name.is_empty() && !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Lookup from normalized names and aliases to canonical tag ids.
#[derive(Debug, Clone, Default)]
pub struct TagNameIndex {
    entries: HashMap<String, TagId>,
}

impl TagNameIndex {
    /// Names take precedence over aliases; merged tags point at their merge
    /// destination.
    pub fn build(graph: &TagGraph) -> Self {
        let mut entries = HashMap::new();

        for tag in graph.tags() {
            let key = normalize_name(tag.name.trim());
            if !key.is_empty() {
                entries
                    .entry(key)
                    .or_insert_with(|| graph.resolve_merge(&tag.id).to_string());
            }
        }

        for tag in graph.tags() {
            for alias in &tag.aliases {
                let key = normalize_name(alias.trim());
                if !key.is_empty() {
                    entries
                        .entry(key)
                        .or_insert_with(|| graph.resolve_merge(&tag.id).to_string());
                }
            }
        }

        Self { entries }
    }

    /// Register a name created after the index was built. Existing entries win.
    pub fn insert(&mut self, name: &str, id: impl Into<TagId>) {
        let key = normalize_name(name.trim());
        if !key.is_empty() {
            self.entries.entry(key).or_insert_with(|| id.into());
        }
    }

    pub fn find(&self, candidate: &str) -> Option<&str> {
        self.entries
            .get(&normalize_name(candidate.trim()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;

    #[test]
    fn folds_katakana_to_hiragana() {
        assert_eq!(normalize_name("カタカナ"), "かたかな");
        assert_eq!(normalize_name("ァ"), "ぁ");
        assert_eq!(normalize_name("ヶ"), "ゖ");
    }

    #[test]
    fn leaves_characters_outside_the_range() {
        // U+30FC (prolonged sound mark) and U+30F7 are outside the folded range.
        assert_eq!(normalize_name("ー"), "ー");
        assert_eq!(normalize_name("ヷ"), "ヷ");
        assert_eq!(normalize_name("木彫り"), "木彫り");
    }

    #[test]
    fn lowercases_ascii_only() {
        assert_eq!(normalize_name("Wood CARVING"), "wood carving");
        assert_eq!(normalize_name("ÀB"), "Àb");
    }

    #[test]
    fn parses_hash_tags_with_ideographic_spaces() {
        assert_eq!(
            parse_tag_input("#木彫り　#作品  #木彫り\tfree"),
            vec!["木彫り", "作品", "free"]
        );
        assert!(parse_tag_input("  # ").is_empty());
    }

    #[test]
    fn index_matches_names_and_aliases_symmetrically() {
        let graph = TagGraph::build(vec![
            Tag::new("t1", "ネコ").with_alias("Cat"),
            Tag::new("t2", "いぬ"),
            Tag::new("old", "Kitty").merged_into("t1"),
        ]);
        let index = TagNameIndex::build(&graph);
        assert_eq!(index.find("ねこ"), Some("t1"));
        assert_eq!(index.find("CAT"), Some("t1"));
        assert_eq!(index.find("イヌ"), Some("t2"));
        assert_eq!(index.find(" kitty "), Some("t1"));
        assert_eq!(index.find("bird"), None);
    }

    #[test]
    fn names_win_over_aliases() {
        let graph = TagGraph::build(vec![
            Tag::new("a", "Alpha").with_alias("beta"),
            Tag::new("b", "Beta"),
        ]);
        let index = TagNameIndex::build(&graph);
        assert_eq!(index.find("beta"), Some("b"));
        assert_eq!(index.len(), 2);
    }
}
