//! Fixture loading shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use wcmp_conformance::{Bundle, DocumentKind, Engine, NormalizedDocument, ReferenceData};

/// `tests/data` inside the crate.
pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

/// The miniature reference bundle under `tests/data/bundle`.
pub fn bundle_dir() -> PathBuf {
    data_dir().join("bundle")
}

/// Raw bytes of a fixture file.
pub fn raw(name: &str) -> Vec<u8> {
    std::fs::read(data_dir().join(name)).unwrap()
}

/// Reference data loaded from the fixture bundle.
pub fn reference() -> Arc<ReferenceData> {
    Bundle::open(bundle_dir()).unwrap().data()
}

/// An engine over the fixture bundle.
pub fn engine() -> Engine {
    Engine::new(reference())
}

/// The WCMP 1.3 fixture record.
pub fn legacy() -> NormalizedDocument {
    wcmp_conformance::document::parse(&raw("legacy.xml"), Some(DocumentKind::Legacy)).unwrap()
}

/// The WCMP2 fixture record.
pub fn current() -> NormalizedDocument {
    wcmp_conformance::document::parse(&raw("current.json"), Some(DocumentKind::Current)).unwrap()
}

/// The WCMP2 fixture with `edit` applied to its JSON text.
pub fn current_with(edit: impl FnOnce(String) -> String) -> NormalizedDocument {
    let text = String::from_utf8(raw("current.json")).unwrap();
    wcmp_conformance::document::parse(edit(text).as_bytes(), None).unwrap()
}

/// The WCMP 1.3 fixture with `edit` applied to its XML text.
pub fn legacy_with(edit: impl FnOnce(String) -> String) -> NormalizedDocument {
    let text = String::from_utf8(raw("legacy.xml")).unwrap();
    wcmp_conformance::document::parse(edit(text).as_bytes(), None).unwrap()
}
