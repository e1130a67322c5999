//! Date and time parsing shared by clauses and indicators.
//!
//! Nothing here reads the system clock: indeterminate GML positions
//! (`now`, `unknown`, `before`, `after`) compare symbolically.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::document::Node;

/// Strict RFC 3339 timestamp.
pub(crate) fn parse_rfc3339(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text.trim()).ok()
}

/// RFC 3339 timestamp, zone-less timestamp (read as UTC) or calendar date
/// (midnight UTC).
pub(crate) fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(dt) = parse_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = text.strip_suffix('Z').unwrap_or(text);
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// A time position, possibly indeterminate. Positions order as
/// `Before < Instant(..) < Now < After`, instants by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum TimePosition {
    Before,
    Instant(DateTime<Utc>),
    Now,
    After,
}

impl TimePosition {
    /// Reads a `gml:beginPosition` / `gml:endPosition` style element.
    pub(crate) fn from_gml(node: &Node) -> Option<Self> {
        match node.attribute("indeterminatePosition") {
            Some("now") | Some("unknown") => Some(TimePosition::Now),
            Some("before") => Some(TimePosition::Before),
            Some("after") => Some(TimePosition::After),
            Some(other) => {
                debug!(value = other, "unexpected indeterminatePosition");
                None
            }
            None => Self::parse(node.text()?),
        }
    }

    /// Reads a textual position; `..` and `now` are open or current ends.
    pub(crate) fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "now" | "unknown" => Some(TimePosition::Now),
            other => parse_instant(other).map(TimePosition::Instant),
        }
    }
}

impl fmt::Display for TimePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePosition::Before => f.write_str("before"),
            TimePosition::Instant(dt) => write!(f, "{}", dt.to_rfc3339()),
            TimePosition::Now => f.write_str("now"),
            TimePosition::After => f.write_str("after"),
        }
    }
}
