//! Reference Bundle Integration Tests
//!
//! Loads the fixture bundle in `tests/data/bundle` and exercises reloads on
//! a scratch copy.

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use wcmp_conformance::ets::SuiteVersion;
use wcmp_conformance::topics::LevelStatus;
use wcmp_conformance::{Authority, Bundle, Engine, Error};

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_fixture_bundle_loads_every_source() {
    let bundle = Bundle::open(common::bundle_dir()).unwrap();
    let data = bundle.data();
    let lists = data.codelists();

    assert!(lists.contains(Authority::Wmo, "WMO_CategoryCode", "weatherObservations"));
    assert!(lists.contains(Authority::Wmo, "WMO_DistributionScopeCode", "GlobalExchange"));
    assert!(lists.contains(Authority::Iso, "CI_RoleCode", "pointOfContact"));
    assert!(lists.contains(Authority::Iso, "MD_TopicCategoryCode", "climatologyMeteorologyAtmosphere"));
    assert!(lists.contains(Authority::Wcmp2, "resource-type", "dataset"));
    assert!(!lists.contains(Authority::Wmo, "CI_RoleCode", "pointOfContact"));
    assert_eq!(lists.len(), 12);

    assert_eq!(data.topics().unwrap().depth(), 10);
    assert!(data.schema().is_some());
    assert_eq!(data.weights().weight(SuiteVersion::Legacy, "kpi_001"), 2.0);
    assert_eq!(data.weights().weight(SuiteVersion::Current, "kpi_009"), 0.5);
}

#[test]
fn test_empty_bundle_loads_but_cannot_run_suites() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = Bundle::open(dir.path()).unwrap();
    let data = bundle.data();
    assert!(data.codelists().is_empty());
    assert!(data.topics().is_none());
    assert!(data.schema().is_none());

    let engine = wcmp_conformance::Engine::new(data);
    assert!(matches!(engine.run_tests(&common::current()), Err(Error::ReferenceData(_))));
    assert!(matches!(engine.topics(), Err(Error::ReferenceData(_))));
}

#[test]
fn test_malformed_source_is_reference_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("codelists.json"), "{\"wmo\": [1, 2]}").unwrap();
    assert!(matches!(Bundle::open(dir.path()), Err(Error::ReferenceData(_))));
}

#[test]
fn test_malformed_schema_is_reference_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("wcmp-2")).unwrap();
    fs::write(dir.path().join("wcmp-2/wcmp2-bundled.json"), r#"{"type": 12}"#).unwrap();
    assert!(matches!(Bundle::open(dir.path()), Err(Error::ReferenceData(_))));
}

#[test]
fn test_explicit_levels_take_precedence_over_topic_list() {
    let dir = tempfile::tempdir().unwrap();
    copy_dir(&common::bundle_dir(), dir.path());
    fs::write(
        dir.path().join("wis2-topic-hierarchy/levels.json"),
        r#"{
  "anchor": "floating",
  "levels": [
    {"name": "channel", "tokens": ["origin", "cache"]},
    {"name": "version", "tokens": ["a"]},
    {"name": "system", "tokens": ["wis2"]},
    {"name": "centre-id", "wildcard": true},
    {"name": "notification-type", "tokens": ["data", "metadata"]}
  ]
}"#,
    )
    .unwrap();

    let engine = Engine::new(Bundle::open(dir.path()).unwrap().data());
    let validator = engine.topics().unwrap();
    assert_eq!(validator.definition().depth(), 5);

    let strict = validator.validate("origin/a/wis2/ca-eccc-msc/data", false);
    assert!(strict.valid, "{strict:#?}");
    assert_eq!(strict.levels[3].status, LevelStatus::WildcardAccepted);
    assert!(!validator.validate("wis2/ca-eccc-msc/data", false).valid);

    let inner = validator.validate("wis2/de-dwd/metadata", true);
    assert!(inner.complete);
    assert_eq!(inner.start_level, 2);
    assert_eq!(inner.matched, 3);

    assert_eq!(
        validator.list_children("origin/a/wis2/ca-eccc-msc"),
        BTreeSet::from(["data".to_string(), "metadata".to_string()])
    );
}

// ============================================================================
// Reloading
// ============================================================================

#[test]
fn test_reload_leaves_handed_out_snapshots_untouched() {
    let dir = tempfile::tempdir().unwrap();
    copy_dir(&common::bundle_dir(), dir.path());

    let mut bundle = Bundle::open(dir.path()).unwrap();
    let before = bundle.data();

    fs::write(dir.path().join("kpi-weights.toml"), "[legacy]\nkpi_001 = 4.0\n").unwrap();
    bundle.reload().unwrap();
    let after = bundle.data();

    assert_eq!(before.weights().weight(SuiteVersion::Legacy, "kpi_001"), 2.0);
    assert_eq!(after.weights().weight(SuiteVersion::Legacy, "kpi_001"), 4.0);
    assert_eq!(before.codelists(), after.codelists());
}

#[test]
fn test_failed_reload_keeps_current_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    copy_dir(&common::bundle_dir(), dir.path());

    let mut bundle = Bundle::open(dir.path()).unwrap();
    fs::write(dir.path().join("kpi-weights.toml"), "[legacy]\nkpi_001 = -1.0\n").unwrap();

    assert!(matches!(bundle.reload(), Err(Error::ReferenceData(_))));
    assert_eq!(
        bundle.data().weights().weight(SuiteVersion::Legacy, "kpi_001"),
        2.0
    );
}
