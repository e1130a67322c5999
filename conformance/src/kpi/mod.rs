//! Key performance indicators.
//!
//! An [`Indicator`] is a pure, gradable quality check: it returns an
//! [`Assessment`] of achieved points out of a maximum, plus comments
//! explaining every lost point. [`evaluate`] runs the indicator registry of
//! the document's profile, weights and aggregates the results into a
//! [`ScoreReport`]:
//!
//! - indicator percentage = achieved / maximum, rounded to 3 decimals
//! - category subtotal = weighted sum of achieved / weighted sum of maximum
//! - overall total = the same aggregation over every evaluated indicator
//!
//! Re-running `evaluate` on an unchanged document with unchanged reference
//! data yields an identical report.

pub mod current;
pub mod legacy;
pub mod links;
pub mod text;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::document::NormalizedDocument;
use crate::error::{Error, Result};
use crate::ets::{self, SuiteVersion};
use crate::reference::ReferenceData;
use crate::report::ConformanceReport;

use links::LinkProbe;

/// Identifier of the ETS-compliance indicator in both registries.
pub const ETS_INDICATOR: &str = "kpi_001";

/// Decimal places kept in percentages.
const ROUND: i32 = 3;

/// Indicator grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Profile conformance.
    Mandatory,
    /// Descriptive quality of the record.
    ContentInformation,
    /// How the data can be obtained and under which policy.
    DistributionInformation,
    /// Extras such as link health and code list hygiene.
    Enhancements,
}

impl Category {
    /// Snake-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Mandatory => "mandatory",
            Category::ContentInformation => "content_information",
            Category::DistributionInformation => "distribution_information",
            Category::Enhancements => "enhancements",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points earned by one indicator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    /// Points achieved.
    pub achieved: f64,
    /// Points available.
    pub maximum: f64,
    /// One comment per lost point (or other observation).
    pub comments: Vec<String>,
}

impl Assessment {
    /// An empty assessment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a one-point criterion: earned when `passed`, otherwise the
    /// comment is recorded.
    pub fn criterion(&mut self, passed: bool, comment: impl Into<String>) {
        self.maximum += 1.0;
        if passed {
            self.achieved += 1.0;
        } else {
            self.comments.push(comment.into());
        }
    }

    /// Adds `points` to the maximum without earning them.
    pub fn available(&mut self, points: f64) {
        self.maximum += points;
    }

    /// Earns `points`.
    pub fn earn(&mut self, points: f64) {
        self.achieved += points;
    }

    /// Records a comment.
    pub fn comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }
}

/// What an indicator evaluator sees.
#[derive(Clone, Copy)]
pub struct KpiContext<'a> {
    /// The record under evaluation.
    pub document: &'a NormalizedDocument,
    /// Code lists and topic hierarchy.
    pub reference: &'a ReferenceData,
    /// Link resolver.
    pub probe: &'a dyn LinkProbe,
    /// ETS report, available when the compliance indicator is selected.
    pub ets: Option<&'a ConformanceReport>,
}

impl fmt::Debug for KpiContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KpiContext")
            .field("document", &self.document.identifier())
            .field("ets", &self.ets.map(ConformanceReport::status))
            .finish_non_exhaustive()
    }
}

/// A named quality check.
#[derive(Debug, Clone, Copy)]
pub struct Indicator {
    /// Identifier (`kpi_NNN`).
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Fixed category.
    pub category: Category,
    /// Pure evaluator.
    pub evaluate: fn(&KpiContext<'_>) -> Assessment,
}

/// Registry of `suite`, in evaluation order.
#[must_use]
pub fn indicators(suite: SuiteVersion) -> &'static [Indicator] {
    match suite {
        SuiteVersion::Legacy => legacy::INDICATORS,
        SuiteVersion::Current => current::INDICATORS,
    }
}

/// Evaluation switches; each is independent of the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KpiOptions {
    /// Run the strict ETS first and surface its failure instead of scoring.
    pub fail_on_ets: bool,
    /// Indicators to run (`kpi_002`, `kpi-2` or `2`); empty runs all.
    pub selected: Vec<String>,
    /// Omit per-indicator detail, keeping totals.
    pub summary_only: bool,
    /// Add per-category subtotals.
    pub group_by_category: bool,
}

/// Overall letter grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    /// 80 % and above.
    A,
    /// 65 % and above.
    B,
    /// 50 % and above.
    C,
    /// 35 % and above.
    D,
    /// 20 % and above.
    E,
    /// Below 20 %.
    F,
    /// Unqualified: the record is not fully ETS compliant.
    U,
}

impl Grade {
    /// Letter for a percentage in `[0, 100]`.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p >= 80.0 => Grade::A,
            p if p >= 65.0 => Grade::B,
            p if p >= 50.0 => Grade::C,
            p if p >= 35.0 => Grade::D,
            p if p >= 20.0 => Grade::E,
            _ => Grade::F,
        }
    }
}

/// Outcome of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    /// Indicator identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category.
    pub category: Category,
    /// Points achieved, clamped to `[0, maximum]`.
    pub achieved: f64,
    /// Points available.
    pub maximum: f64,
    /// Weight applied in aggregates.
    pub weight: f64,
    /// `achieved / maximum` in percent; `None` when nothing was assessable.
    pub percentage: Option<f64>,
    /// Comments explaining lost points.
    pub comments: Vec<String>,
}

/// Weighted achieved/maximum pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Weighted points achieved.
    pub achieved: f64,
    /// Weighted points available.
    pub maximum: f64,
    /// `achieved / maximum` in percent.
    pub percentage: Option<f64>,
}

impl Totals {
    /// Aggregates `results` by weight.
    pub fn of<'a>(results: impl IntoIterator<Item = &'a IndicatorResult>) -> Self {
        let (achieved, maximum) = results.into_iter().fold((0.0, 0.0), |(a, m), r| {
            (a + r.achieved * r.weight, m + r.maximum * r.weight)
        });
        Self {
            achieved,
            maximum,
            percentage: percentage(achieved, maximum),
        }
    }
}

/// Subtotal of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    /// Indicators in the category, in evaluation order.
    pub indicators: Vec<String>,
    /// Category subtotal.
    #[serde(flatten)]
    pub totals: Totals,
}

/// Overall totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Number of indicators evaluated.
    pub evaluated: usize,
    /// Overall total.
    #[serde(flatten)]
    pub totals: Totals,
    /// Letter grade, when more than one indicator was evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    /// Comments keyed by indicator id.
    pub comments: BTreeMap<String, Vec<String>>,
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    /// Registry the indicators came from.
    pub suite: SuiteVersion,
    /// Record identifier, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Per-indicator detail (empty in summary-only mode).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<IndicatorResult>,
    /// Per-category subtotals, when grouping was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<Category, CategorySummary>>,
    /// Overall totals.
    pub summary: Summary,
}

impl ScoreReport {
    /// Looks up an indicator result.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&IndicatorResult> {
        self.indicators.iter().find(|r| r.id == id)
    }

    /// Overall totals recomputed from the per-indicator detail.
    #[must_use]
    pub fn recompute(&self) -> Totals {
        Totals::of(&self.indicators)
    }
}

fn round(value: f64) -> f64 {
    let factor = 10f64.powi(ROUND);
    (value * factor).round() / factor
}

fn percentage(achieved: f64, maximum: f64) -> Option<f64> {
    (maximum > 0.0).then(|| round(achieved / maximum * 100.0))
}

/// ETS compliance as points: one per clause, minus each failing clause not
/// listed in `tolerated`.
pub(crate) fn ets_compliance(
    ctx: &KpiContext<'_>,
    suite: SuiteVersion,
    tolerated: &[&str],
) -> Assessment {
    let owned;
    let report = match ctx.ets {
        Some(report) => report,
        None => {
            let clause_ctx = ets::ClauseContext {
                document: ctx.document,
                reference: ctx.reference,
            };
            owned = ets::run_clauses(suite, &clause_ctx, suite.clauses());
            &owned
        }
    };

    let mut assessment = Assessment::new();
    assessment.available(report.results.len() as f64);
    assessment.earn(report.results.len() as f64);
    for result in report.results.iter().filter(|r| r.is_failure()) {
        if tolerated.contains(&result.id.as_str()) {
            debug!(clause = %result.id, "tolerating clause failure");
            continue;
        }
        assessment.earn(-1.0);
        assessment.comment(result.failure_message());
    }
    assessment
}

/// Title heuristics: presence, length, wording, casing, acronyms and
/// embedded bulletin headers. A bulletin header costs an extra point.
pub(crate) fn assess_title(title: Option<&str>, location: &str) -> Assessment {
    const CRITERIA: f64 = 7.0;

    let mut assessment = Assessment::new();
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        assessment.available(CRITERIA);
        assessment.comment("Title not found");
        return assessment;
    };

    let words = title.split_whitespace().count();
    assessment.available(1.0);
    assessment.earn(1.0);
    assessment.criterion(words >= 3, format!("{location}title has less than 3 words"));
    assessment.criterion(
        title.chars().count() <= 150,
        format!("{location}title has more than 150 characters"),
    );
    assessment.criterion(
        text::words_are_alphanumeric(title),
        format!("{location}title contains non-alphanumeric characters"),
    );
    assessment.criterion(
        text::is_title_case(title),
        format!("{location}title is not title case"),
    );
    assessment.criterion(
        text::acronym_count(title) <= 3,
        format!("{location}title has more than 3 acronyms"),
    );
    let header = text::has_bulletin_header(title);
    assessment.criterion(!header, format!("{location}title contains bulletin header"));
    if header {
        assessment.earn(-1.0);
    }
    assessment
}

/// Abstract heuristics, three points per abstract: length between 16 and
/// 2048 characters, no markup, no bulletin header.
pub(crate) fn assess_abstract(assessment: &mut Assessment, text: Option<&str>, location: &str) {
    let Some(abstract_text) = text else {
        assessment.available(3.0);
        assessment.comment(format!("{location}abstract is empty"));
        return;
    };
    assessment.criterion(
        (16..=2048).contains(&abstract_text.chars().count()),
        format!("{location}abstract is not between 16 and 2048 characters"),
    );
    assessment.criterion(
        !text::contains_markup(abstract_text),
        format!("{location}abstract contains markup"),
    );
    assessment.criterion(
        !text::has_bulletin_header(abstract_text),
        format!("{location}abstract contains bulletin header"),
    );
}

/// Two points per unique link: reachable, then served securely.
pub(crate) fn assess_links<'a>(
    probe: &dyn LinkProbe,
    links: impl IntoIterator<Item = &'a str>,
) -> Assessment {
    let unique: BTreeSet<&str> = links
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    debug!(links = unique.len(), "probing unique links");

    let mut assessment = Assessment::new();
    for link in unique {
        let status = probe.probe(link);
        assessment.available(2.0);
        if !status.accessible {
            assessment.comment(format!("\"{link}\" cannot be resolved"));
            continue;
        }
        assessment.earn(1.0);
        if status.resolved != link {
            debug!(link, resolved = %status.resolved, "link redirects");
        }
        if status.secure {
            assessment.earn(1.0);
        } else {
            assessment.comment(format!("\"{link}\" is not served over a secure scheme"));
        }
    }
    assessment
}

/// Canonical `kpi_NNN` form of a user-supplied indicator id.
fn normalize_id(raw: &str) -> Option<String> {
    let lower = raw.trim().to_ascii_lowercase();
    let digits = lower
        .strip_prefix("kpi")
        .map(|rest| rest.trim_start_matches(['_', '-']))
        .unwrap_or(&lower);
    let number: u32 = digits.parse().ok()?;
    Some(format!("kpi_{number:03}"))
}

/// Resolves `selected` against `registry`, keeping registry order.
///
/// # Errors
///
/// Returns [`Error::UnknownIndicator`] for an id the registry does not
/// define.
pub fn select<'r>(registry: &'r [Indicator], selected: &[String]) -> Result<Vec<&'r Indicator>> {
    if selected.is_empty() {
        return Ok(registry.iter().collect());
    }

    let mut wanted = BTreeSet::new();
    for raw in selected {
        let id = normalize_id(raw)
            .filter(|id| registry.iter().any(|i| i.id == id))
            .ok_or_else(|| Error::UnknownIndicator {
                requested: raw.clone(),
                known: registry.iter().map(|i| i.id).collect::<Vec<_>>().join(", "),
            })?;
        wanted.insert(id);
    }

    Ok(registry
        .iter()
        .filter(|i| wanted.contains(i.id))
        .collect())
}

fn run(indicator: &Indicator, ctx: &KpiContext<'_>, suite: SuiteVersion) -> IndicatorResult {
    info!(indicator = indicator.id, "running {}", indicator.name);
    let assessment = (indicator.evaluate)(ctx);

    let maximum = assessment.maximum.max(0.0);
    let achieved = assessment.achieved.clamp(0.0, maximum);
    if achieved != assessment.achieved {
        debug!(
            indicator = indicator.id,
            raw = assessment.achieved,
            clamped = achieved,
            "score clamped"
        );
    }

    let result = IndicatorResult {
        id: indicator.id.to_string(),
        name: indicator.name.to_string(),
        category: indicator.category,
        achieved,
        maximum,
        weight: ctx.reference.weights().weight(suite, indicator.id),
        percentage: percentage(achieved, maximum),
        comments: assessment.comments,
    };
    debug!(
        indicator = indicator.id,
        achieved = result.achieved,
        maximum = result.maximum,
        percentage = ?result.percentage,
        "indicator evaluated"
    );
    result
}

/// Scores `document` with the indicator registry of its profile.
///
/// # Errors
///
/// Returns [`Error::UnknownIndicator`] for an invalid selection,
/// [`Error::ReferenceData`] when the ETS cannot run, and
/// [`Error::TestSuite`] when `fail_on_ets` is set and the record fails the
/// ETS.
pub fn evaluate(
    document: &NormalizedDocument,
    reference: &ReferenceData,
    probe: &dyn LinkProbe,
    options: &KpiOptions,
) -> Result<ScoreReport> {
    let suite = SuiteVersion::from(document.kind());
    let selected = select(indicators(suite), &options.selected)?;

    let ets_report = if options.fail_on_ets {
        Some(ets::validate(document, suite, reference)?)
    } else if selected.iter().any(|i| i.id == ETS_INDICATOR) {
        Some(ets::run_tests(document, suite, reference)?)
    } else {
        None
    };

    info!(suite = %suite, indicators = selected.len(), "evaluating indicators");
    let ctx = KpiContext {
        document,
        reference,
        probe,
        ets: ets_report.as_ref(),
    };
    let results: Vec<IndicatorResult> = selected.iter().map(|i| run(i, &ctx, suite)).collect();

    let categories = options.group_by_category.then(|| {
        let mut grouped: BTreeMap<Category, Vec<&IndicatorResult>> = BTreeMap::new();
        for result in &results {
            grouped.entry(result.category).or_default().push(result);
        }
        grouped
            .into_iter()
            .map(|(category, members)| {
                let summary = CategorySummary {
                    indicators: members.iter().map(|r| r.id.clone()).collect(),
                    totals: Totals::of(members.iter().copied()),
                };
                (category, summary)
            })
            .collect()
    });

    let totals = Totals::of(&results);
    let grade = (results.len() > 1).then(|| {
        let compliant = results
            .iter()
            .find(|r| r.id == ETS_INDICATOR)
            .map(|r| r.percentage == Some(100.0))
            .unwrap_or(true);
        match totals.percentage {
            _ if !compliant => Some(Grade::U),
            Some(p) => Some(Grade::from_percentage(p)),
            None => None,
        }
    });

    let summary = Summary {
        evaluated: results.len(),
        totals,
        grade: grade.flatten(),
        comments: results
            .iter()
            .filter(|r| !r.comments.is_empty())
            .map(|r| (r.id.clone(), r.comments.clone()))
            .collect(),
    };
    info!(
        achieved = summary.totals.achieved,
        maximum = summary.totals.maximum,
        grade = ?summary.grade,
        "evaluation finished"
    );

    Ok(ScoreReport {
        suite,
        identifier: document.identifier().map(str::to_string),
        indicators: if options.summary_only { Vec::new() } else { results },
        categories,
        summary,
    })
}
