//! Detectors (C2): pure functions `dom → []hit`. Each hit carries an
//! anchor id, a match confidence in `[0,1]`, and the name of the detector
//! that produced it.

use crate::anchor::AnchorIndex;
use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct DetectorHit {
    pub anchor_id: String,
    pub value: String,
    pub confidence: f32,
    pub detector: &'static str,
}

lazy_static! {
    static ref EMAIL_TEXT_RE: Regex =
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();
    static ref PHONE_RE: Regex =
        Regex::new(r"(\+?\d{1,2}[\s.\-]?)?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}").unwrap();
    static ref PRICE_RE: Regex = Regex::new(r"[$€£¥]\s?\d[\d,]*(\.\d{1,2})?").unwrap();
    static ref DATE_TEXT_RE: Regex = Regex::new(
        r"\b(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4}|[A-Z][a-z]+ \d{1,2},? \d{4})\b"
    )
    .unwrap();
}

/// The minimum detector library (§4.2): title, heading, description,
/// link, email, phone, price, date, image, label-value pair, list item.
pub fn all_detector_names() -> &'static [&'static str] {
    &["title", "heading", "description", "link", "email", "phone", "price", "date", "image", "label_value", "list_item"]
}

pub fn run(name: &str, index: &AnchorIndex) -> Vec<DetectorHit> {
    match name {
        "title" => detect_title(index),
        "heading" => detect_heading(index),
        "description" => detect_description(index),
        "link" => detect_link(index),
        "email" => detect_email(index),
        "phone" => detect_phone(index),
        "price" => detect_price(index),
        "date" => detect_date(index),
        "image" => detect_image(index),
        "label_value" => detect_label_value(index),
        "list_item" => detect_list_item(index),
        _ => Vec::new(),
    }
}

pub fn detect_title(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter(|id| index.tag_of(id) == Some("title") || index.tag_of(id) == Some("h1"))
        .filter_map(|id| {
            let text = index.text_of(&id)?.to_string();
            (!text.trim().is_empty()).then(|| DetectorHit { anchor_id: id, value: text, confidence: 0.9, detector: "title" })
        })
        .collect()
}

pub fn detect_heading(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter(|id| matches!(index.tag_of(id), Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6")))
        .filter_map(|id| {
            let text = index.text_of(&id)?.to_string();
            (!text.trim().is_empty()).then(|| DetectorHit { anchor_id: id, value: text, confidence: 0.8, detector: "heading" })
        })
        .collect()
}

pub fn detect_description(index: &AnchorIndex) -> Vec<DetectorHit> {
    let mut hits = Vec::new();
    for id in index.iter() {
        if index.tag_of(&id) == Some("meta") {
            if let Some(element) = index.lookup(&id) {
                if element.value().attr("name") == Some("description") {
                    if let Some(content) = element.value().attr("content") {
                        hits.push(DetectorHit { anchor_id: id.clone(), value: content.to_string(), confidence: 0.95, detector: "description" });
                    }
                }
            }
        }
    }
    if hits.is_empty() {
        if let Some(id) = index.iter().find(|id| index.tag_of(id) == Some("p")) {
            if let Some(text) = index.text_of(&id) {
                if !text.trim().is_empty() {
                    hits.push(DetectorHit { anchor_id: id, value: text.to_string(), confidence: 0.4, detector: "description" });
                }
            }
        }
    }
    hits
}

pub fn detect_link(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter(|id| index.tag_of(id) == Some("a"))
        .filter_map(|id| {
            let element = index.lookup(&id)?;
            let href = element.value().attr("href")?.to_string();
            Some(DetectorHit { anchor_id: id, value: href, confidence: 0.85, detector: "link" })
        })
        .collect()
}

pub fn detect_email(index: &AnchorIndex) -> Vec<DetectorHit> {
    let mut hits = Vec::new();
    for id in index.iter() {
        if index.tag_of(&id) == Some("a") {
            if let Some(element) = index.lookup(&id) {
                if let Some(href) = element.value().attr("href") {
                    if let Some(addr) = href.strip_prefix("mailto:") {
                        hits.push(DetectorHit { anchor_id: id.clone(), value: addr.to_string(), confidence: 0.95, detector: "email" });
                        continue;
                    }
                }
            }
        }
        if let Some(text) = index.own_text_of(&id) {
            if let Some(found) = EMAIL_TEXT_RE.find(&text) {
                hits.push(DetectorHit { anchor_id: id.clone(), value: found.as_str().to_string(), confidence: 0.7, detector: "email" });
            }
        }
    }
    hits
}

pub fn detect_phone(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter_map(|id| {
            let text = index.own_text_of(&id)?;
            let found = PHONE_RE.find(&text)?;
            let value = found.as_str().to_string();
            Some(DetectorHit { anchor_id: id, value, confidence: 0.6, detector: "phone" })
        })
        .collect()
}

pub fn detect_price(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter_map(|id| {
            let text = index.own_text_of(&id)?;
            let found = PRICE_RE.find(&text)?;
            let value = found.as_str().to_string();
            Some(DetectorHit { anchor_id: id, value, confidence: 0.75, detector: "price" })
        })
        .collect()
}

pub fn detect_date(index: &AnchorIndex) -> Vec<DetectorHit> {
    let mut hits = Vec::new();
    for id in index.iter() {
        if index.tag_of(&id) == Some("time") {
            if let Some(element) = index.lookup(&id) {
                if let Some(dt) = element.value().attr("datetime") {
                    hits.push(DetectorHit { anchor_id: id.clone(), value: dt.to_string(), confidence: 0.9, detector: "date" });
                    continue;
                }
            }
        }
        if let Some(text) = index.own_text_of(&id) {
            if let Some(found) = DATE_TEXT_RE.find(&text) {
                hits.push(DetectorHit { anchor_id: id.clone(), value: found.as_str().to_string(), confidence: 0.6, detector: "date" });
            }
        }
    }
    hits
}

pub fn detect_image(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter(|id| index.tag_of(id) == Some("img"))
        .filter_map(|id| {
            let element = index.lookup(&id)?;
            let src = element.value().attr("src")?.to_string();
            Some(DetectorHit { anchor_id: id, value: src, confidence: 0.85, detector: "image" })
        })
        .collect()
}

/// Label-like elements: `dt`, elements whose text ends with `:`.
pub fn detect_label_value(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter_map(|id| {
            let tag = index.tag_of(&id)?;
            let text = index.text_of(&id)?;
            let is_label = tag == "dt" || text.trim_end().ends_with(':');
            is_label.then(|| DetectorHit { anchor_id: id, value: text.trim_end_matches(':').trim().to_string(), confidence: 0.5, detector: "label_value" })
        })
        .collect()
}

/// List-like items: `li`, or elements the block detector clustered
/// together (repeated cards/containers).
pub fn detect_list_item(index: &AnchorIndex) -> Vec<DetectorHit> {
    index
        .iter()
        .filter(|id| index.tag_of(id) == Some("li") || index.block_of(id).is_some())
        .filter_map(|id| {
            let text = index.text_of(&id)?.to_string();
            (!text.trim().is_empty()).then(|| DetectorHit { anchor_id: id, value: text, confidence: 0.6, detector: "list_item" })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_title_prefers_title_or_h1() {
        let index = AnchorIndex::build("<html><head><title>Page</title></head><body><h1>Heading</h1></body></html>");
        let hits = detect_title(&index);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn detect_email_finds_mailto_and_text() {
        let index = AnchorIndex::build(
            "<html><body><a href=\"mailto:a@example.com\">Email</a><p>reach b@example.org</p></body></html>",
        );
        let hits = detect_email(&index);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn detect_price_matches_currency() {
        let index = AnchorIndex::build("<html><body><span>$19.99</span></body></html>");
        let hits = detect_price(&index);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "$19.99");
    }

    #[test]
    fn detect_label_value_matches_colon_suffixed_text() {
        let index = AnchorIndex::build("<html><body><dt>Location:</dt><span>Office:</span></body></html>");
        let hits = detect_label_value(&index);
        assert_eq!(hits.len(), 2);
    }
}
