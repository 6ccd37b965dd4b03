//! Anchor Index (C1): an opaque, stable map from node-ids to DOM nodes.
//!
//! Only node-ids ever leave this module's owning job. Selectors and node
//! handles are an implementation detail used internally for cross-
//! validation (`reExtract`) and evidence construction; callers outside
//! `atlas-core` see `n_<int>` strings and nothing else.

mod blocks;

use crate::types::FieldType;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const TEXT_SAMPLE_MAX_CHARS: usize = 200;

struct AnchorEntry {
    selector: String,
    tag: String,
    text_sample: String,
    text_hash: String,
    block_id: Option<String>,
}

/// An opaque, stable identifier for a DOM node within one job's lifetime.
/// Format: `n_<int>`, assigned by depth-first pre-order numbering.
pub type AnchorId = String;

/// Builds and owns the parsed DOM for one job. Destroyed with the job —
/// never persisted, never shared across jobs.
pub struct AnchorIndex {
    document: Html,
    node_ids: Vec<NodeId>,
    entries: Vec<AnchorEntry>,
    id_to_index: HashMap<AnchorId, usize>,
    index_by_node: HashMap<NodeId, usize>,
}

impl AnchorIndex {
    /// Parse `html` and assign anchor ids by depth-first numbering,
    /// skipping script, style, and comment nodes.
    pub fn build(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut node_ids = Vec::new();
        let mut entries = Vec::new();
        let mut id_to_index = HashMap::new();

        walk(document.tree.root(), "", &mut |node_ref, selector| {
            let idx = node_ids.len();
            let id = format!("n_{idx}");
            let tag = match node_ref.value() {
                Node::Element(el) => el.name().to_string(),
                _ => return,
            };
            let text = collect_text(node_ref);
            let text_sample = truncate_chars(&text, TEXT_SAMPLE_MAX_CHARS);
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            let text_hash = hex::encode(hasher.finalize());

            node_ids.push(node_ref.id());
            entries.push(AnchorEntry {
                selector: selector.to_string(),
                tag,
                text_sample,
                text_hash,
                block_id: None,
            });
            id_to_index.insert(id, idx);
        });

        let index_by_node: HashMap<NodeId, usize> =
            node_ids.iter().enumerate().map(|(idx, &node_id)| (node_id, idx)).collect();

        let mut index = Self { document, node_ids, entries, id_to_index, index_by_node };
        blocks::assign_block_ids(&mut index);
        index
    }

    /// `lookup(id) → node handle or not-found`.
    pub fn lookup(&self, id: &str) -> Option<ElementRef<'_>> {
        let idx = *self.id_to_index.get(id)?;
        let node_ref = self.document.tree.get(self.node_ids[idx])?;
        ElementRef::wrap(node_ref)
    }

    /// `textOf(id) → short normalized text sample (≤200 chars)`.
    pub fn text_of(&self, id: &str) -> Option<&str> {
        let idx = *self.id_to_index.get(id)?;
        Some(self.entries[idx].text_sample.as_str())
    }

    /// `selectorOf(id) → canonical selector`. Internal use only: never
    /// forward this value into a response payload or evidence record
    /// seen outside this job.
    pub fn selector_of(&self, id: &str) -> Option<&str> {
        let idx = *self.id_to_index.get(id)?;
        Some(self.entries[idx].selector.as_str())
    }

    /// The enclosing repeated-container block, if `id` is itself a
    /// clustered sibling or descends from one — fields detected on a
    /// card's inner elements (a heading, a mailto link) still resolve to
    /// the card's shared block id this way.
    pub fn block_of(&self, id: &str) -> Option<&str> {
        let idx = *self.id_to_index.get(id)?;
        if self.entries[idx].block_id.is_some() {
            return self.entries[idx].block_id.as_deref();
        }

        let mut node_id = self.node_ids[idx];
        while let Some(node_ref) = self.document.tree.get(node_id) {
            let Some(parent) = node_ref.parent() else { break };
            node_id = parent.id();
            let Some(&pidx) = self.index_by_node.get(&node_id) else { continue };
            if self.entries[pidx].block_id.is_some() {
                return self.entries[pidx].block_id.as_deref();
            }
        }
        None
    }

    pub fn tag_of(&self, id: &str) -> Option<&str> {
        let idx = *self.id_to_index.get(id)?;
        Some(self.entries[idx].tag.as_str())
    }

    fn text_hash_of(&self, id: &str) -> Option<&str> {
        let idx = *self.id_to_index.get(id)?;
        Some(self.entries[idx].text_hash.as_str())
    }

    /// `reExtract(id, type) → typed value via canonical extractor`.
    ///
    /// Returns `None` if the id doesn't resolve or the node's full text
    /// doesn't pass the validator for `field_type` — either case means
    /// "not anchored" to a caller doing cross-validation.
    pub fn re_extract(&self, id: &str, field_type: FieldType) -> Option<serde_json::Value> {
        let element = self.lookup(id)?;
        let text = collect_text(*element);
        crate::detect::validators::canonical_extract(&text, field_type)
    }

    /// Full (untruncated) normalized text for a node — used by
    /// cross-validation's token-Jaccard comparison, never surfaced
    /// outside `atlas-core`.
    pub fn full_text_of(&self, id: &str) -> Option<String> {
        let element = self.lookup(id)?;
        Some(collect_text(*element))
    }

    /// A node's own direct text, excluding descendant elements' text.
    /// Pattern-matching detectors (email, phone, price, date) scan this
    /// instead of `text_of` so a leaf's match isn't re-reported at every
    /// ancestor up to the document root.
    pub fn own_text_of(&self, id: &str) -> Option<String> {
        let idx = *self.id_to_index.get(id)?;
        let node_ref = self.document.tree.get(self.node_ids[idx])?;
        let raw: String = node_ref
            .children()
            .filter_map(|child| match child.value() {
                Node::Text(text) => Some(text.text.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        Some(collapse_ws(&raw))
    }

    /// `buildSamples(k) → k representative anchor ids across distinct
    /// blocks`, used to feed the model a bounded sample.
    pub fn build_samples(&self, k: usize) -> Vec<AnchorId> {
        let mut seen_blocks = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(k);
        for (id, idx) in self.ordered_ids() {
            if out.len() >= k {
                break;
            }
            let entry = &self.entries[idx];
            if entry.text_sample.trim().is_empty() {
                continue;
            }
            let block_key = self.block_of(&id).map(str::to_string).unwrap_or_else(|| id.clone());
            if seen_blocks.insert(block_key) {
                out.push(id.clone());
            }
        }
        out
    }

    /// All anchor ids in DFS order, paired with their index — exposed for
    /// detectors that need to scan the whole document.
    pub fn iter(&self) -> impl Iterator<Item = AnchorId> + '_ {
        (0..self.entries.len()).map(|i| format!("n_{i}"))
    }

    fn ordered_ids(&self) -> impl Iterator<Item = (AnchorId, usize)> + '_ {
        (0..self.entries.len()).map(|idx| (format!("n_{idx}"), idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn walk<'a, F>(node_ref: ego_tree::NodeRef<'a, Node>, parent_selector: &str, visit: &mut F)
where
    F: FnMut(ego_tree::NodeRef<'a, Node>, &str),
{
    match node_ref.value() {
        Node::Element(el) => {
            if matches!(el.name(), "script" | "style") {
                return;
            }
        }
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => return,
        _ => {}
    }

    let mut own_selector = parent_selector.to_string();
    if let Node::Element(el) = node_ref.value() {
        let nth = node_ref
            .prev_siblings()
            .filter(|n| matches!(n.value(), Node::Element(_)))
            .count()
            + 1;
        own_selector = format!("{parent_selector}>{}:nth-child({nth})", el.name());
        visit(node_ref, &own_selector);
    }

    for child in node_ref.children() {
        walk(child, &own_selector, visit);
    }
}

fn collect_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect::<Vec<_>>().join(" ");
    collapse_ws(&raw)
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
