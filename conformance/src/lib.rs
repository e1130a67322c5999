//! WMO Core Metadata Profile conformance and scoring engine.
//!
//! The crate checks discovery metadata records against the two generations
//! of the WMO Core Metadata Profile and grades their quality. It is the
//! engine only: retrieval of records and presentation of reports belong to
//! the callers (see the `wcmp` binary in the clients crate).
//!
//! # Components
//!
//! | Component | Module | Produces |
//! |-----------|--------|----------|
//! | Document model adapter | [`document`] | [`NormalizedDocument`] |
//! | Executable test suites | [`ets`] | [`ConformanceReport`] |
//! | KPI scoring engine | [`kpi`] | [`ScoreReport`] |
//! | WIS2 topic hierarchy validator | [`topics`] | [`TopicValidationResult`] |
//! | Reference data loader | [`reference`] | [`ReferenceData`] |
//!
//! # Entry Point
//!
//! ```no_run
//! use wcmp_conformance::{Bundle, Engine, KpiOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundle = Bundle::open("bundle")?;
//! let engine = Engine::new(bundle.data());
//!
//! let raw = std::fs::read("record.json")?;
//! let document = engine.parse(&raw, None)?;
//!
//! let report = engine.run_tests(&document)?;
//! println!("{}: {} failure(s)", report.status(), report.failure_count());
//!
//! let scores = engine.evaluate(&document, &KpiOptions::default())?;
//! println!("{:?}", scores.summary.grade);
//! # Ok(())
//! # }
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod document;
pub mod error;
pub mod ets;
pub mod kpi;
pub mod reference;
pub mod report;
pub mod topics;

mod temporal;

use std::fmt;
use std::sync::Arc;

pub use document::{DocumentKind, Node, NormalizedDocument};
pub use error::{Error, Result, TestSuiteError};
pub use ets::SuiteVersion;
pub use kpi::links::{LinkProbe, LinkStatus, OfflineProbe};
pub use kpi::{Category, Grade, KpiOptions, ScoreReport};
pub use reference::{Authority, Bundle, CodeLists, ReferenceData, WeightTable, Wcmp2Schema};
pub use report::{ClauseResult, ClauseStatus, ConformanceReport};
pub use topics::{TopicHierarchyDefinition, TopicValidationResult, TopicValidator};

/// A loaded reference-data snapshot plus a link probe.
///
/// The engine is immutable and `Send + Sync`; one instance can serve
/// concurrent validations.
pub struct Engine {
    reference: Arc<ReferenceData>,
    probe: Box<dyn LinkProbe>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over `reference` that judges links offline.
    #[must_use]
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            reference,
            probe: Box::new(OfflineProbe),
        }
    }

    /// Replaces the link probe.
    #[must_use]
    pub fn with_probe(mut self, probe: impl LinkProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// The reference data snapshot in use.
    #[must_use]
    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Parses a raw record; see [`document::parse`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] or [`Error::UnknownDocumentKind`].
    pub fn parse(&self, raw: &[u8], declared: Option<DocumentKind>) -> Result<NormalizedDocument> {
        document::parse(raw, declared)
    }

    /// Runs the test suite matching the document's kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] when the suite's reference data is
    /// not loaded.
    pub fn run_tests(&self, document: &NormalizedDocument) -> Result<ConformanceReport> {
        ets::run_tests(document, document.kind().into(), &self.reference)
    }

    /// Runs the test suite and fails unless every clause passes or skips.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TestSuite`] carrying every failure message, or
    /// [`Error::ReferenceData`] as for [`Engine::run_tests`].
    pub fn validate(&self, document: &NormalizedDocument) -> Result<ConformanceReport> {
        ets::validate(document, document.kind().into(), &self.reference)
    }

    /// Scores the document; see [`kpi::evaluate`].
    ///
    /// # Errors
    ///
    /// See [`kpi::evaluate`].
    pub fn evaluate(&self, document: &NormalizedDocument, options: &KpiOptions) -> Result<ScoreReport> {
        kpi::evaluate(document, &self.reference, self.probe.as_ref(), options)
    }

    /// A validator over the loaded topic hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] when no hierarchy is loaded.
    pub fn topics(&self) -> Result<TopicValidator<'_>> {
        self.reference
            .topics()
            .map(TopicValidator::new)
            .ok_or_else(|| Error::reference("no WIS2 topic hierarchy loaded"))
    }
}
