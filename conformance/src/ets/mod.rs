//! Executable test suites.
//!
//! A suite is an ordered, static table of [`TestClause`]s. Every clause is a
//! pure function of a [`ClauseContext`] (the document plus the reference
//! data) and classifies the record as PASS, FAIL or SKIP. Clauses never see
//! each other's results, so every clause runs even after an earlier one
//! fails and the report is always complete.
//!
//! Two suites share this machinery:
//!
//! | Suite | Document | Registry |
//! |-------|----------|----------|
//! | [`SuiteVersion::Legacy`] | WCMP 1.3 (ISO 19139 XML) | [`legacy::CLAUSES`] |
//! | [`SuiteVersion::Current`] | WCMP2 (GeoJSON) | [`current::CLAUSES`] |

pub mod current;
pub mod legacy;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{DocumentKind, NormalizedDocument};
use crate::error::{Error, Result, TestSuiteError};
use crate::reference::{ReferenceData, Requirement};
use crate::report::{ClauseResult, ClauseStatus, ConformanceReport};

/// Which test suite to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteVersion {
    /// WMO Core Metadata Profile 1.3, Part 2.
    Legacy,
    /// WMO Core Metadata Profile 2, Annex A.
    Current,
}

impl SuiteVersion {
    /// Short lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SuiteVersion::Legacy => "legacy",
            SuiteVersion::Current => "current",
        }
    }

    /// Profile title used in text reports.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            SuiteVersion::Legacy => "WMO Core Metadata Profile 1.3",
            SuiteVersion::Current => "WMO Core Metadata Profile 2",
        }
    }

    /// Registered clauses, in report order.
    #[must_use]
    pub fn clauses(self) -> &'static [TestClause] {
        match self {
            SuiteVersion::Legacy => legacy::CLAUSES,
            SuiteVersion::Current => current::CLAUSES,
        }
    }

    /// Reference data the suite cannot run without.
    #[must_use]
    pub fn requirements(self) -> &'static [Requirement] {
        match self {
            SuiteVersion::Legacy => legacy::REQUIREMENTS,
            SuiteVersion::Current => current::REQUIREMENTS,
        }
    }

    /// Document kind the suite applies to.
    #[must_use]
    pub fn document_kind(self) -> DocumentKind {
        match self {
            SuiteVersion::Legacy => DocumentKind::Legacy,
            SuiteVersion::Current => DocumentKind::Current,
        }
    }

    /// Stable test URI of a clause.
    #[must_use]
    pub fn test_uri(self, clause: &TestClause) -> String {
        match self {
            SuiteVersion::Legacy => format!("http://wis.wmo.int/2012/metadata/conf/{}", clause.slug),
            SuiteVersion::Current => {
                format!("http://www.wmo.int/spec/wcmp/2.0/req/conf/core/{}", clause.slug)
            }
        }
    }
}

impl From<DocumentKind> for SuiteVersion {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Legacy => SuiteVersion::Legacy,
            DocumentKind::Current => SuiteVersion::Current,
        }
    }
}

impl fmt::Display for SuiteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a clause has access to.
#[derive(Debug, Clone, Copy)]
pub struct ClauseContext<'a> {
    /// The record under test.
    pub document: &'a NormalizedDocument,
    /// Code lists and topic hierarchy.
    pub reference: &'a ReferenceData,
}

/// Classification produced by a clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The requirement holds.
    Pass,
    /// The requirement is violated; the detail says where and how.
    Fail(String),
    /// The requirement does not apply to this record.
    Skip(String),
}

/// A numbered conformance requirement.
#[derive(Debug, Clone, Copy)]
pub struct TestClause {
    /// Clause identifier, unique within its suite.
    pub id: &'static str,
    /// Final segment of the clause's test URI.
    pub slug: &'static str,
    /// Requirement text.
    pub description: &'static str,
    /// Pure predicate over the record.
    pub check: fn(&ClauseContext<'_>) -> Outcome,
}

impl TestClause {
    fn run(&self, suite: SuiteVersion, ctx: &ClauseContext<'_>) -> ClauseResult {
        let outcome = (self.check)(ctx);
        debug!(suite = %suite, clause = self.id, ?outcome, "clause evaluated");

        let (status, message) = match outcome {
            Outcome::Pass => (ClauseStatus::Pass, None),
            Outcome::Fail(detail) => (ClauseStatus::Fail, Some(detail)),
            Outcome::Skip(reason) => (ClauseStatus::Skip, Some(reason)),
        };

        ClauseResult {
            id: self.id.to_string(),
            uri: suite.test_uri(self),
            description: self.description.to_string(),
            status,
            message,
        }
    }
}

/// Looks up a clause by id.
#[must_use]
pub fn find_clause(suite: SuiteVersion, id: &str) -> Option<&'static TestClause> {
    suite.clauses().iter().find(|c| c.id == id)
}

/// Runs `clauses` in the given order. Never fails: each clause contributes
/// exactly one result.
#[must_use]
pub fn run_clauses(
    suite: SuiteVersion,
    ctx: &ClauseContext<'_>,
    clauses: &[TestClause],
) -> ConformanceReport {
    let identifier = ctx.document.identifier().map(str::to_string);
    let mut report = ConformanceReport::new(suite, identifier);
    for clause in clauses {
        report.push(clause.run(suite, ctx));
    }
    report
}

/// Runs every clause of `suite` against `document`.
///
/// # Errors
///
/// Returns [`Error::SuiteMismatch`] if the document is of the other profile
/// and [`Error::ReferenceData`] if the suite's reference data is incomplete.
/// Clause failures are reported in the returned report, never as errors.
pub fn run_tests(
    document: &NormalizedDocument,
    suite: SuiteVersion,
    reference: &ReferenceData,
) -> Result<ConformanceReport> {
    if SuiteVersion::from(document.kind()) != suite {
        return Err(Error::SuiteMismatch {
            suite: suite.to_string(),
            kind: document.kind().to_string(),
        });
    }
    reference.require(suite.requirements())?;

    info!(suite = %suite, clauses = suite.clauses().len(), "running test suite");
    let ctx = ClauseContext {
        document,
        reference,
    };
    let report = run_clauses(suite, &ctx, suite.clauses());

    let summary = report.summary();
    info!(
        suite = %suite,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "test suite finished"
    );
    Ok(report)
}

/// Runs the suite and fails unless every clause passed or was skipped.
///
/// # Errors
///
/// Same as [`run_tests`], plus [`Error::TestSuite`] carrying one message per
/// failing clause, in clause order.
pub fn validate(
    document: &NormalizedDocument,
    suite: SuiteVersion,
    reference: &ReferenceData,
) -> Result<ConformanceReport> {
    let report = run_tests(document, suite, reference)?;
    if report.all_passed() {
        Ok(report)
    } else {
        Err(TestSuiteError {
            errors: report.failure_messages(),
        }
        .into())
    }
}
