//! WIS2 Topic Hierarchy Integration Tests
//!
//! Validates topics against the hierarchy derived from the fixture bundle's
//! `wis2-topic-hierarchy/all.json`.

mod common;

use std::collections::BTreeSet;

use wcmp_conformance::topics::LevelStatus;

fn set(tokens: &[&str]) -> BTreeSet<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

const SYNOP: &str = "origin/a/wis2/can/eccc-msc/data/core/weather/surface-based-observations/synop";

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_full_topic_is_strictly_valid() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    let result = validator.validate(SYNOP, false);
    assert!(result.valid, "{result:#?}");
    assert_eq!(result.matched, 10);
    assert_eq!(result.matched_prefix, SYNOP);
    assert!(result.next_tokens.is_empty());

    let dotted = SYNOP.replace('/', ".");
    assert!(validator.validate(&dotted, false).valid);
}

#[test]
fn test_short_topic_is_only_fuzzily_valid() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    let strict = validator.validate("origin/a/wis2/can", false);
    assert!(!strict.valid);
    assert_eq!(strict.levels[4].status, LevelStatus::MissingLevel);

    let fuzzy = validator.validate("origin/a/wis2/can", true);
    assert!(fuzzy.valid);
    assert!(fuzzy.complete);
    assert_eq!(fuzzy.matched, 4);
    assert_eq!(fuzzy.next_tokens, set(&["eccc-msc"]));
}

#[test]
fn test_unknown_token_is_located() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    let result = validator.validate("origin/a/wis2/deu/dwd", true);
    assert!(result.valid);
    assert!(!result.complete);
    assert_eq!(result.matched, 3);
    assert_eq!(result.matched_prefix, "origin/a/wis2");
    let failed = result.levels.last().unwrap();
    assert_eq!(failed.status, LevelStatus::UnknownToken);
    assert_eq!(failed.token.as_deref(), Some("deu"));
    assert_eq!(result.next_tokens, set(&["can", "fra"]));
}

#[test]
fn test_tokens_are_scoped_to_their_parent() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    // meteofrance publishes under fra only.
    let result = validator.validate("origin/a/wis2/can/meteofrance", true);
    assert!(!result.complete);
    assert_eq!(result.matched, 4);
}

#[test]
fn test_topic_past_deepest_level_is_extra() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    let result = validator.validate(&format!("{SYNOP}/hourly"), false);
    assert!(!result.valid);
    assert_eq!(result.levels.last().unwrap().status, LevelStatus::ExtraLevel);
}

#[test]
fn test_diverging_topic_is_a_partial_match_of_length_zero() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    let result = validator.validate("wis2.can", true);
    assert!(result.valid);
    assert!(!result.complete);
    assert_eq!(result.matched, 0);
    assert_eq!(result.matched_prefix, "");
    assert_eq!(result.levels.len(), 1);
    assert_eq!(result.levels[0].status, LevelStatus::UnknownToken);
    assert_eq!(result.next_tokens, set(&["cache", "origin"]));

    assert!(!validator.validate("wis2.can", false).valid);
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_list_children_walks_the_hierarchy() {
    let engine = common::engine();
    let validator = engine.topics().unwrap();

    assert_eq!(validator.list_children(""), set(&["cache", "origin"]));
    assert_eq!(validator.list_children("origin/a/wis2"), set(&["can", "fra"]));
    assert_eq!(
        validator.list_children("origin/a/wis2/can/eccc-msc"),
        set(&["data", "metadata"])
    );
    assert_eq!(
        validator.list_children("origin/a/wis2/fra/meteofrance/data"),
        set(&["core", "recommended"])
    );
    assert_eq!(
        validator.list_children("origin/a/wis2/can/eccc-msc/data"),
        set(&["core"])
    );
    assert!(validator.list_children(SYNOP).is_empty());
    assert!(validator.list_children("origin/b").is_empty());
}
