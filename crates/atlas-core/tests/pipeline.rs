//! End-to-end coverage of the two-track pipeline: contract → deterministic
//! + augmentation → negotiation → execution, against hand-built HTML
//! fixtures standing in for real directory/listing pages.

use atlas_core::pipeline::{augmentation, contract, deterministic, executor, negotiate};
use atlas_core::testing::MockModelClient;
use atlas_core::types::{EvidencePolicy, FieldKind, FieldSpec, FieldType, Governance, Mode};
use atlas_core::{AnchorIndex, AtlasError};

fn field(name: &str, kind: FieldKind, field_type: FieldType) -> FieldSpec {
    FieldSpec::new(name, kind, field_type)
}

/// I1: no key outside `final_schema` ever appears in an assembled entity.
#[test]
fn no_key_outside_the_negotiated_schema_appears_in_output() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3><a href=\"mailto:ada@example.org\">ada@example.org</a></li>\
        <li><h3>Alan Turing</h3><a href=\"mailto:alan@example.org\">alan@example.org</a></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![
        field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"]),
        field("email", FieldKind::Expected, FieldType::Email).with_detectors(["email"]),
    ];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());
    let execution = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Strict, &[]).unwrap();

    let allowed: std::collections::HashSet<&str> =
        negotiation.final_schema.iter().map(|f| f.name.as_str()).collect();
    for entity in &execution.data {
        for key in entity.keys() {
            assert!(allowed.contains(key.as_str()), "unexpected key '{key}' in output");
        }
    }
}

/// S2-style team directory: each `<li>` card resolves to one entity
/// carrying both its heading-detected name and its mailto-detected email.
#[test]
fn team_directory_builds_one_entity_per_member() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3><a href=\"mailto:ada@example.org\">ada@example.org</a></li>\
        <li><h3>Alan Turing</h3><a href=\"mailto:alan@example.org\">alan@example.org</a></li>\
        <li><h3>Grace Hopper</h3><a href=\"mailto:grace@example.org\">grace@example.org</a></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![
        field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"]),
        field("email", FieldKind::Expected, FieldType::Email).with_detectors(["email"]),
    ];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());
    assert_eq!(negotiation.status, atlas_core::NegotiationStatus::Success);
    let execution = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Strict, &[]).unwrap();

    assert_eq!(execution.data.len(), 3);
    let names: std::collections::HashSet<String> = execution
        .data
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains("Ada Lovelace"));
    assert!(names.contains("Alan Turing"));
    assert!(names.contains("Grace Hopper"));
    for entity in &execution.data {
        assert!(entity["email"].as_str().unwrap().contains('@'));
    }
}

/// S3-style directory with no email anywhere on the page: the expected
/// `email` field is pruned by negotiation, and no entity is dropped for
/// its absence.
#[test]
fn page_with_no_emails_prunes_the_email_field_without_dropping_entities() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3><p>Mathematician</p></li>\
        <li><h3>Alan Turing</h3><p>Cryptanalyst</p></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![
        field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"]),
        field("email", FieldKind::Expected, FieldType::Email).with_detectors(["email"]),
    ];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());

    assert_eq!(negotiation.status, atlas_core::NegotiationStatus::Success);
    assert!(negotiation.changes.pruned.contains(&"email".to_string()));
    assert!(!negotiation.final_schema.iter().any(|f| f.name == "email"));

    let execution = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Strict, &[]).unwrap();
    assert_eq!(execution.data.len(), 2);
    assert_eq!(execution.dropped_entities_count, 0);
}

/// S4-style ambiguous query: the contract generator abstains (no queued
/// response), so the job falls back to the generic single-field default
/// contract rather than failing.
#[tokio::test]
async fn contract_generator_abstention_falls_back_to_the_default_contract() {
    let model = MockModelClient::new();
    let proposed = contract::generate(&model, "hmm, something about this page?", "<p>content</p>", 1, "2026-01-01T00:00:00Z")
        .await
        .unwrap();
    assert!(proposed.is_none());

    let fallback = contract::default_contract(1, "2026-01-01T00:00:00Z");
    assert_eq!(fallback.fields.len(), 1);
    assert_eq!(fallback.fields[0].kind, FieldKind::Discoverable);
}

/// S5-style strict-mode all-drop: two required fields are each
/// discoverable somewhere on the page (so negotiation's global-support
/// check is satisfied), but no single block has both, so every assembled
/// entity is missing one of them and the job fails in strict mode.
#[test]
fn strict_mode_fails_the_job_when_every_entity_drops() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3></li>\
        <li><a href=\"mailto:alan@example.org\">alan@example.org</a></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![
        field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"]),
        field("email", FieldKind::Required, FieldType::Email).with_detectors(["email"]),
    ];
    let findings = deterministic::run(&index, &fields);
    assert_eq!(findings.support_for("name"), 1);
    assert_eq!(findings.support_for("email"), 1);

    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());
    assert_eq!(negotiation.status, atlas_core::NegotiationStatus::Success);

    let result = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Strict, &[]);
    match result {
        Err(AtlasError::StrictModeDrop { selectors_tried, .. }) => {
            assert!(selectors_tried.contains(&"name".to_string()));
            assert!(selectors_tried.contains(&"email".to_string()));
        }
        other => panic!("expected StrictModeDrop, got {other:?}"),
    }
}

/// I6: in soft mode, a required field present on under 60% of surviving
/// entities is demoted to optional in the echoed schema rather than
/// dropping anything.
#[test]
fn soft_mode_demotes_a_sparsely_supported_required_field() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3><a href=\"mailto:ada@example.org\">ada@example.org</a></li>\
        <li><h3>Alan Turing</h3><a href=\"#bio\">bio</a></li>\
        <li><h3>Grace Hopper</h3><a href=\"#bio\">bio</a></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![
        field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"]),
        field("email", FieldKind::Required, FieldType::Email).with_detectors(["email"]),
    ];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());
    assert_eq!(negotiation.status, atlas_core::NegotiationStatus::Success);

    let execution = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Soft, &[]).unwrap();
    assert_eq!(execution.dropped_entities_count, 0);
    assert_eq!(execution.data.len(), 3);
    let email_field = execution.echoed_schema.iter().find(|f| f.name == "email").unwrap();
    assert_eq!(email_field.kind, FieldKind::Optional);
    let name_field = execution.echoed_schema.iter().find(|f| f.name == "name").unwrap();
    assert_eq!(name_field.kind, FieldKind::Required);
}

/// Negotiation idempotence law (§8): equal `(fields, findings,
/// augmentation)` always yields an equal result.
#[test]
fn negotiation_is_idempotent_over_equal_inputs() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3><a href=\"mailto:ada@example.org\">ada@example.org</a></li>\
        <li><h3>Alan Turing</h3><a href=\"mailto:alan@example.org\">alan@example.org</a></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![
        field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"]),
        field("email", FieldKind::Expected, FieldType::Email).with_detectors(["email"]),
    ];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let governance = Governance::default();

    let first = negotiate::negotiate(&fields, &findings, &augmentation, &governance);
    let second = negotiate::negotiate(&fields, &findings, &augmentation, &governance);

    assert_eq!(first.status, second.status);
    assert_eq!(first.changes.pruned, second.changes.pruned);
    assert_eq!(first.changes.added, second.changes.added);
    assert_eq!(first.changes.demoted, second.changes.demoted);
    assert_eq!(first.evidence_summary.total_support, second.evidence_summary.total_support);
    assert_eq!(first.evidence_summary.field_coverage, second.evidence_summary.field_coverage);
    let first_names: Vec<&str> = first.final_schema.iter().map(|f| f.name.as_str()).collect();
    let second_names: Vec<&str> = second.final_schema.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(first_names, second_names);
}

/// Augmentation cross-validation rejects a completion whose cited anchor
/// doesn't resolve — it never reaches the final entities.
#[tokio::test]
async fn augmentation_completion_with_unresolvable_anchor_is_discarded() {
    let html = "<html><body><ul>\
        <li><h3>Ada Lovelace</h3></li>\
        <li><h3>Alan Turing</h3></li>\
        </ul></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"])];
    let findings = deterministic::run(&index, &fields);

    let model = MockModelClient::new().with_response(
        atlas_core::Stage::Augmentation,
        serde_json::json!({
            "completions": [
                { "field": "name", "value": "Ghost Writer", "anchor_ids": ["n_9999"] }
            ],
            "new_fields": [],
            "normalizations": []
        }),
    );
    let result = augmentation::run(&model, &index, &findings, &fields, &EvidencePolicy::default(), 1).await.unwrap();
    assert!(result.completions.is_empty());
}

/// Boundary: an empty DOM produces no blocks and no entities, without
/// erroring, as long as no required field demands support.
#[test]
fn empty_dom_yields_no_entities_for_an_optional_only_schema() {
    let index = AnchorIndex::build("<html><body></body></html>");
    let fields = vec![field("value", FieldKind::Optional, FieldType::String)];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());
    assert_eq!(negotiation.status, atlas_core::NegotiationStatus::Success);
    let execution = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Strict, &[]).unwrap();
    assert!(execution.data.is_empty());
}

/// Boundary: a single-entity page (no repeated siblings, so no block id
/// is ever assigned) still produces exactly one entity, keyed by the
/// anchor itself.
#[test]
fn single_entity_page_with_no_repeated_siblings_still_extracts_one_entity() {
    let html = "<html><body><h1>Ada Lovelace</h1></body></html>";
    let index = AnchorIndex::build(html);
    let fields = vec![field("name", FieldKind::Required, FieldType::String).with_detectors(["heading"])];
    let findings = deterministic::run(&index, &fields);
    let augmentation = Default::default();
    let negotiation = negotiate::negotiate(&fields, &findings, &augmentation, &Governance::default());
    let execution = executor::execute(&index, &negotiation.final_schema, &findings, &augmentation, Mode::Strict, &[]).unwrap();
    assert_eq!(execution.data.len(), 1);
    assert_eq!(execution.data[0]["name"], serde_json::json!("Ada Lovelace"));
}
