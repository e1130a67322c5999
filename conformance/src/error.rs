//! Error taxonomy shared by the document adapter, the test suites, the KPI
//! engine and the reference-data loader.
//!
//! Clause and indicator failures are never errors: they are collected into
//! reports. Only structural problems (unreadable input, missing reference
//! data) and the strict [`crate::ets::validate`] entry point produce an
//! [`Error`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the conformance engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw document is not well-formed, or its structure contradicts the
    /// declared document kind.
    #[error("cannot parse {format} document: {diagnostic}")]
    Parse {
        /// Input format that was being parsed (`"XML"` or `"JSON"`).
        format: &'static str,
        /// Diagnostic reported by the underlying parser.
        diagnostic: String,
    },

    /// The document kind could not be determined from its content.
    #[error("unknown document kind: {0}")]
    UnknownDocumentKind(String),

    /// A schema, code list or topic hierarchy needed by the run is missing or
    /// unreadable.
    #[error("reference data error: {0}")]
    ReferenceData(String),

    /// The strict ETS entry point found at least one failing clause.
    #[error(transparent)]
    TestSuite(#[from] TestSuiteError),

    /// A KPI selection named an indicator the suite does not define.
    #[error("unknown indicator {requested}; known indicators are {known}")]
    UnknownIndicator {
        /// Identifier as supplied by the caller.
        requested: String,
        /// Comma-separated list of valid identifiers.
        known: String,
    },

    /// A suite was asked to run against a document of the other kind.
    #[error("{suite} test suite cannot run against a {kind} document")]
    SuiteMismatch {
        /// Requested suite.
        suite: String,
        /// Kind of the supplied document.
        kind: String,
    },
}

impl Error {
    pub(crate) fn reference(message: impl Into<String>) -> Self {
        Error::ReferenceData(message.into())
    }
}

/// Aggregated ETS failure carrying every failure message, in clause order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid metadata: {} requirement(s) failed", .errors.len())]
pub struct TestSuiteError {
    /// Human-readable failure messages, one per failing clause.
    pub errors: Vec<String>,
}
