//! DOM-normalized content hashing and acquisition metadata.

use ego_tree::NodeRef;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Attributes that vary between otherwise-identical renders of the same
/// page and must not affect the content hash.
const VOLATILE_ATTRS: &[&str] = &[
    "data-reactid",
    "data-react-checksum",
    "data-timestamp",
    "data-request-id",
    "data-nonce",
    "nonce",
];

fn is_volatile(name: &str) -> bool {
    VOLATILE_ATTRS.contains(&name) || name.ends_with("-id") && name.starts_with("data-auto")
}

/// Serialize a parsed document into a canonical, whitespace-collapsed
/// form with comments, scripts, and styles removed, and attributes sorted
/// with volatile ones stripped.
///
/// Two renders of the same page differing only in volatile fields
/// (timestamps, auto-generated ids, nonces) must normalize to the same
/// string.
pub fn normalize_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);
    normalize_node(document.tree.root(), &mut out);
    collapse_whitespace(&out)
}

fn normalize_node(node_ref: NodeRef<'_, Node>, out: &mut String) {
    match node_ref.value() {
        Node::Element(el) => {
            let tag = el.name();
            if matches!(tag, "script" | "style") {
                return;
            }
            out.push('<');
            out.push_str(tag);
            let mut attrs: Vec<(&str, &str)> = el
                .attrs()
                .filter(|(name, _)| !is_volatile(name))
                .collect();
            attrs.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push('=');
                out.push_str(value);
            }
            out.push('>');
            for child in node_ref.children() {
                normalize_node(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Text(text) => {
            out.push_str(text.trim());
            out.push(' ');
        }
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
        Node::Document | Node::Fragment => {
            for child in node_ref.children() {
                normalize_node(child, out);
            }
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// sha-256 over [`normalize_html`]'s output, hex-encoded.
pub fn content_hash(html: &str) -> String {
    let normalized = normalize_html(html);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// One attempt made by a C9 strategy while acquiring a page, recorded for
/// telemetry and for the `acquisition_metadata` field of the content
/// acquisition interface (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Unreachable,
    Blocked,
    InvalidResponse,
    Miss,
}

/// Returned by every C9 strategy alongside the acquired HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionMetadata {
    pub strategy_used: String,
    pub attempts: Vec<StrategyAttempt>,
    pub partial: bool,
}

impl AcquisitionMetadata {
    pub fn new(strategy_used: impl Into<String>) -> Self {
        Self { strategy_used: strategy_used.into(), attempts: Vec::new(), partial: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scripts_and_styles() {
        let html = "<html><body><script>evil()</script><style>.x{}</style><p>Hi</p></body></html>";
        let normalized = normalize_html(html);
        assert!(!normalized.contains("evil"));
        assert!(!normalized.contains(".x{}"));
        assert!(normalized.contains("Hi"));
    }

    #[test]
    fn normalize_strips_comments() {
        let html = "<html><body><!-- a comment --><p>Hi</p></body></html>";
        let normalized = normalize_html(html);
        assert!(!normalized.contains("a comment"));
    }

    #[test]
    fn content_hash_ignores_volatile_attributes() {
        let a = "<div data-timestamp=\"111\">x</div>";
        let b = "<div data-timestamp=\"222\">x</div>";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn content_hash_changes_with_real_content() {
        let a = "<div>x</div>";
        let b = "<div>y</div>";
        assert_ne!(content_hash(a), content_hash(b));
    }

    #[test]
    fn normalize_is_idempotent() {
        let html = "<html><body><p>Hello   World</p></body></html>";
        let once = normalize_html(html);
        let twice = normalize_html(&once);
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn content_hash_is_invariant_to_volatile_attribute_values(
            timestamp in "[a-zA-Z0-9]{1,16}",
            nonce in "[a-zA-Z0-9]{1,16}",
        ) {
            let html = format!(
                "<div data-timestamp=\"{timestamp}\" nonce=\"{nonce}\">same text</div>"
            );
            proptest::prop_assert_eq!(content_hash(&html), content_hash("<div>same text</div>"));
        }
    }
}
