//! Conformance report types: clause results, statuses, and report aggregation.

use std::fmt;

use serde::Serialize;

use crate::ets::SuiteVersion;

/// Outcome of a single test clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClauseStatus {
    /// The clause passed.
    Pass,
    /// The clause found a violation (blocks conformance).
    Fail,
    /// The clause's precondition is absent; it does not affect the outcome.
    Skip,
}

impl ClauseStatus {
    /// Upper-case label used in text reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ClauseStatus::Pass => "PASS",
            ClauseStatus::Fail => "FAIL",
            ClauseStatus::Skip => "SKIP",
        }
    }
}

impl fmt::Display for ClauseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single clause result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClauseResult {
    /// Clause identifier (e.g. `"8.1.1"` or `"identifier"`).
    pub id: String,
    /// Test URI of the clause.
    pub uri: String,
    /// Human-readable requirement text.
    pub description: String,
    /// Outcome.
    pub status: ClauseStatus,
    /// Optional detail explaining the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClauseResult {
    /// Returns true if this result represents a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == ClauseStatus::Fail
    }

    /// Failure message in the form surfaced by [`crate::TestSuiteError`].
    #[must_use]
    pub fn failure_message(&self) -> String {
        match &self.message {
            Some(detail) => format!("Requirement {}: {} {}", self.id, self.description, detail),
            None => format!("Requirement {}: {}", self.id, self.description),
        }
    }
}

/// Pass/fail/skip counts of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Clauses that passed.
    pub passed: usize,
    /// Clauses that failed.
    pub failed: usize,
    /// Clauses that were skipped.
    pub skipped: usize,
}

/// Ordered clause results of one ETS run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConformanceReport {
    /// Suite the report was produced by.
    pub suite: SuiteVersion,
    /// Record identifier, when the document carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// One result per registered clause, in registry order.
    pub results: Vec<ClauseResult>,
}

impl ConformanceReport {
    /// Creates a new empty report.
    #[must_use]
    pub fn new(suite: SuiteVersion, identifier: Option<String>) -> Self {
        Self {
            suite,
            identifier,
            results: Vec::new(),
        }
    }

    /// Appends a result to this report.
    pub fn push(&mut self, result: ClauseResult) {
        self.results.push(result);
    }

    /// Returns the count of failed clauses.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    /// Overall status: FAIL iff any clause failed. Skipped clauses do not
    /// count against the record.
    #[must_use]
    pub fn status(&self) -> ClauseStatus {
        if self.failure_count() == 0 {
            ClauseStatus::Pass
        } else {
            ClauseStatus::Fail
        }
    }

    /// Returns true if no clause failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.status() == ClauseStatus::Pass
    }

    /// Looks up a result by clause id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ClauseResult> {
        self.results.iter().find(|r| r.id == id)
    }

    /// Counts results per status.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        self.results
            .iter()
            .fold(ReportSummary::default(), |mut acc, r| {
                match r.status {
                    ClauseStatus::Pass => acc.passed += 1,
                    ClauseStatus::Fail => acc.failed += 1,
                    ClauseStatus::Skip => acc.skipped += 1,
                }
                acc
            })
    }

    /// Failure messages of every failing clause, in report order.
    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_failure())
            .map(ClauseResult::failure_message)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, status: ClauseStatus) -> ClauseResult {
        ClauseResult {
            id: id.into(),
            uri: format!("urn:test:{id}"),
            description: format!("clause {id}"),
            status,
            message: (status == ClauseStatus::Fail).then(|| "broken".to_string()),
        }
    }

    #[test]
    fn skip_does_not_fail_the_report() {
        let mut report = ConformanceReport::new(SuiteVersion::Current, None);
        report.push(result("a", ClauseStatus::Pass));
        report.push(result("b", ClauseStatus::Skip));
        assert_eq!(report.status(), ClauseStatus::Pass);

        report.push(result("c", ClauseStatus::Fail));
        assert_eq!(report.status(), ClauseStatus::Fail);
        assert_eq!(
            report.summary(),
            ReportSummary {
                passed: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(
            report.failure_messages(),
            vec!["Requirement c: clause c broken".to_string()]
        );
    }
}
