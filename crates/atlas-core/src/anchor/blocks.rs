//! Block detection: repeated DOM containers found by sibling-structure
//! similarity (§4.1).
//!
//! A block is one member of a set of ≥ 2 siblings sharing a tag name,
//! overlapping class prefixes, and similar immediate child tag sequences
//! (Jaccard ≥ 0.8 over the multiset of immediate child tags). Each
//! qualifying sibling gets its own block id — promotion quorum and
//! entity assembly both count blocks as instances, not as a single
//! shared section id.

use super::AnchorIndex;
use indexmap::IndexMap;
use scraper::{ElementRef, Node};
use std::collections::{HashMap, HashSet};

pub(super) fn assign_block_ids(index: &mut AnchorIndex) {
    // IndexMap, not HashMap: groups are walked below in insertion order
    // (i.e. DOM order) so that block id assignment is deterministic
    // across runs of the same document.
    let mut groups: IndexMap<(ego_tree::NodeId, String), Vec<usize>> = IndexMap::new();

    for (i, &node_id) in index.node_ids.iter().enumerate() {
        let Some(node_ref) = index.document.tree.get(node_id) else { continue };
        let Some(parent) = node_ref.parent() else { continue };
        let tag = index.entries[i].tag.clone();
        groups.entry((parent.id(), tag)).or_default().push(i);
    }

    let mut block_counter = 0u32;
    for ((_parent_id, tag), members) in groups {
        if members.len() < 2 {
            continue;
        }
        let child_tags: Vec<HashMap<String, u32>> = members
            .iter()
            .map(|&i| child_tag_multiset(index, index.node_ids[i]))
            .collect();
        let class_tokens: Vec<HashSet<String>> =
            members.iter().map(|&i| class_tokens_of(index, index.node_ids[i])).collect();

        let mut remaining: Vec<usize> = (0..members.len()).collect();
        while remaining.len() >= 2 {
            let reference = remaining[0];
            let mut cluster = vec![reference];
            let mut rest = Vec::new();
            for &candidate in &remaining[1..] {
                let structurally_similar =
                    multiset_jaccard(&child_tags[reference], &child_tags[candidate]) >= 0.8;
                let classes_overlap = class_prefixes_overlap(&class_tokens[reference], &class_tokens[candidate]);
                if structurally_similar && classes_overlap {
                    cluster.push(candidate);
                } else {
                    rest.push(candidate);
                }
            }
            if cluster.len() >= 2 {
                for &member_idx in &cluster {
                    index.entries[members[member_idx]].block_id = Some(format!("b_{tag}_{block_counter}"));
                    block_counter += 1;
                }
            }
            remaining = rest;
        }
    }
}

/// Whitespace-split `class` attribute tokens for a node, or an empty set
/// if the element has no `class` attribute at all.
fn class_tokens_of(index: &AnchorIndex, node_id: ego_tree::NodeId) -> HashSet<String> {
    let Some(node_ref) = index.document.tree.get(node_id) else { return HashSet::new() };
    let Some(element) = ElementRef::wrap(node_ref) else { return HashSet::new() };
    element
        .value()
        .attr("class")
        .map(|classes| classes.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Siblings with no `class` attribute on either side impose no
/// class-based constraint — plain markup (bare `<li>`s, say) still
/// clusters on tag + child-shape alone. When both sides do carry
/// classes, at least one class token (e.g. a shared `card`/`row`/`item`
/// prefix in a BEM-style naming scheme) must be shared between them.
fn class_prefixes_overlap(a: &HashSet<String>, b: &HashSet<String>) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    a.iter().any(|token| b.contains(token)) || a.iter().any(|token| b.iter().any(|other| share_prefix(token, other)))
}

/// BEM-style prefix match: `card-header` and `card-footer` share the
/// `card` prefix even though no whole token matches.
fn share_prefix(a: &str, b: &str) -> bool {
    let a_prefix = a.split(['-', '_']).next().unwrap_or(a);
    let b_prefix = b.split(['-', '_']).next().unwrap_or(b);
    !a_prefix.is_empty() && a_prefix == b_prefix
}

fn child_tag_multiset(index: &AnchorIndex, node_id: ego_tree::NodeId) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    let Some(node_ref) = index.document.tree.get(node_id) else { return counts };
    for child in node_ref.children() {
        if let Node::Element(el) = child.value() {
            *counts.entry(el.name().to_string()).or_insert(0u32) += 1;
        }
    }
    counts
}

fn multiset_jaccard(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let mut intersection = 0u32;
    let mut union = 0u32;
    let keys: std::collections::HashSet<&String> = a.keys().chain(b.keys()).collect();
    for key in keys {
        let ca = a.get(key).copied().unwrap_or(0);
        let cb = b.get(key).copied().unwrap_or(0);
        intersection += ca.min(cb);
        union += ca.max(cb);
    }
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorIndex;

    #[test]
    fn similar_siblings_each_get_a_distinct_block_id() {
        let html = "<html><body><ul>\
            <li><h3>A</h3><p>a</p></li>\
            <li><h3>B</h3><p>b</p></li>\
            <li><h3>C</h3><p>c</p></li>\
            </ul></body></html>";
        let index = AnchorIndex::build(html);
        let li_ids: Vec<_> = index.iter().filter(|id| index.tag_of(id) == Some("li")).collect();
        assert_eq!(li_ids.len(), 3);
        let blocks: Vec<_> = li_ids.iter().map(|id| index.block_of(id)).collect();
        assert!(blocks.iter().all(|b| b.is_some()));
        assert_ne!(blocks[0], blocks[1]);
        assert_ne!(blocks[1], blocks[2]);
    }

    #[test]
    fn dissimilar_siblings_get_no_block() {
        let html = "<html><body><div><span>lonely</span></div></body></html>";
        let index = AnchorIndex::build(html);
        let span_id = index.iter().find(|id| index.tag_of(id) == Some("span")).unwrap();
        assert!(index.block_of(&span_id).is_none());
    }

    #[test]
    fn multiset_jaccard_identical_sets_is_one() {
        let mut a = HashMap::new();
        a.insert("p".to_string(), 2);
        let b = a.clone();
        assert_eq!(multiset_jaccard(&a, &b), 1.0);
    }

    #[test]
    fn shared_class_prefix_still_clusters() {
        let html = "<html><body><ul>\
            <li class=\"card-header\"><h3>A</h3><p>a</p></li>\
            <li class=\"card-footer\"><h3>B</h3><p>b</p></li>\
            </ul></body></html>";
        let index = AnchorIndex::build(html);
        let li_ids: Vec<_> = index.iter().filter(|id| index.tag_of(id) == Some("li")).collect();
        assert!(li_ids.iter().all(|id| index.block_of(id).is_some()));
    }

    #[test]
    fn disjoint_classes_prevent_clustering() {
        let html = "<html><body><ul>\
            <li class=\"promo\"><h3>A</h3><p>a</p></li>\
            <li class=\"listing\"><h3>B</h3><p>b</p></li>\
            </ul></body></html>";
        let index = AnchorIndex::build(html);
        let li_ids: Vec<_> = index.iter().filter(|id| index.tag_of(id) == Some("li")).collect();
        assert!(li_ids.iter().all(|id| index.block_of(id).is_none()));
    }
}
