//! Indicators for WMO Core Metadata Profile 2 records.
//!
//! Gradable indicators earn partial credit: a keyword block with half of
//! its themes carrying a scheme earns half of that criterion's point.

use std::collections::BTreeSet;

use tracing::debug;

use crate::document::{Node, NormalizedDocument};
use crate::ets::current::contacts;
use crate::ets::SuiteVersion;
use crate::temporal::TimePosition;

use super::{assess_abstract, assess_links, assess_title, ets_compliance};
use super::{Assessment, Category, Indicator, KpiContext};

/// Contact members whose presence is scored.
pub const RECOMMENDED_CONTACT_FIELDS: &[&str] = &[
    "organization",
    "emails",
    "phones",
    "addresses",
    "links",
    "contactInstructions",
    "roles",
];

/// Link relations that point at the data itself.
const DATA_RELATIONS: &[&str] = &["data", "items", "collection", "enclosure"];

const GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Registered indicators, in evaluation order.
pub const INDICATORS: &[Indicator] = &[
    Indicator {
        id: "kpi_001",
        name: "WCMP2 compliance",
        category: Category::Mandatory,
        evaluate: compliance,
    },
    Indicator {
        id: "kpi_002",
        name: "Good quality title",
        category: Category::ContentInformation,
        evaluate: title,
    },
    Indicator {
        id: "kpi_003",
        name: "Good quality description",
        category: Category::ContentInformation,
        evaluate: description,
    },
    Indicator {
        id: "kpi_004",
        name: "Temporal information",
        category: Category::ContentInformation,
        evaluate: temporal,
    },
    Indicator {
        id: "kpi_005",
        name: "Spatial extent",
        category: Category::ContentInformation,
        evaluate: spatial,
    },
    Indicator {
        id: "kpi_006",
        name: "Keywords and themes",
        category: Category::ContentInformation,
        evaluate: keywords,
    },
    Indicator {
        id: "kpi_007",
        name: "Contact information",
        category: Category::ContentInformation,
        evaluate: contact_information,
    },
    Indicator {
        id: "kpi_008",
        name: "Links health",
        category: Category::Enhancements,
        evaluate: links_health,
    },
    Indicator {
        id: "kpi_009",
        name: "Distribution information",
        category: Category::DistributionInformation,
        evaluate: distribution,
    },
    Indicator {
        id: "kpi_010",
        name: "Data policy",
        category: Category::DistributionInformation,
        evaluate: data_policy,
    },
];

fn is_null(node: &Node) -> bool {
    node.text().is_none() && node.children().is_empty()
}

/// Earns a fraction of one point: `hits` out of `total`.
fn proportion(assessment: &mut Assessment, hits: usize, total: usize, comment: String) {
    assessment.available(1.0);
    if total == 0 {
        assessment.comment(comment);
        return;
    }
    assessment.earn(hits as f64 / total as f64);
    if hits < total {
        assessment.comment(comment);
    }
}

fn time_member(doc: &NormalizedDocument) -> Option<&Node> {
    doc.first("time").or_else(|| doc.first("properties/time"))
}

fn data_links(doc: &NormalizedDocument) -> Vec<&Node> {
    doc.select("links")
        .into_iter()
        .filter(|l| {
            l.value("rel")
                .is_some_and(|rel| DATA_RELATIONS.contains(&rel))
                || l.exists("channel")
        })
        .collect()
}

fn compliance(ctx: &KpiContext<'_>) -> Assessment {
    ets_compliance(ctx, SuiteVersion::Current, &[])
}

fn title(ctx: &KpiContext<'_>) -> Assessment {
    assess_title(ctx.document.value("properties/title"), "")
}

fn description(ctx: &KpiContext<'_>) -> Assessment {
    let mut assessment = Assessment::new();
    let text = ctx
        .document
        .value("properties/description")
        .map(str::trim)
        .filter(|t| !t.is_empty());
    assess_abstract(&mut assessment, text, "");
    assessment
}

/// Start or end of an interval; `..` and `null` leave that end open.
fn interval_end(node: &Node, open: TimePosition) -> Option<TimePosition> {
    match node.text().map(str::trim) {
        None | Some("..") => Some(open),
        Some(text) => TimePosition::parse(text),
    }
}

fn temporal(ctx: &KpiContext<'_>) -> Assessment {
    let mut assessment = Assessment::new();
    let time = time_member(ctx.document).filter(|t| !is_null(t));
    let Some(time) = time else {
        assessment.available(4.0);
        assessment.comment("Temporal information not found");
        return assessment;
    };
    assessment.available(1.0);
    assessment.earn(1.0);

    let interval = time.select("interval");
    if interval.is_empty() {
        let instant = time
            .value("timestamp")
            .or_else(|| time.value("date"))
            .and_then(TimePosition::parse);
        // ordering does not apply to a single instant
        assessment.criterion(
            instant.is_some(),
            "Time has neither a valid interval nor a valid timestamp or date",
        );
    } else {
        let bounds = match interval.as_slice() {
            [begin, end] => interval_end(begin, TimePosition::Before)
                .zip(interval_end(end, TimePosition::After)),
            _ => None,
        };
        assessment.criterion(
            bounds.is_some(),
            format!(
                "Interval must hold two valid positions, found {} value(s)",
                interval.len()
            ),
        );
        let ordered = bounds.is_some_and(|(begin, end)| begin < end);
        if let Some((begin, end)) = bounds {
            debug!(begin = %begin, end = %end, ordered, "interval read");
        }
        assessment.criterion(ordered, "Interval begin is not before its end");
    }

    assessment.criterion(
        time.exists("resolution"),
        "Temporal resolution not found",
    );
    assessment
}

fn spatial(ctx: &KpiContext<'_>) -> Assessment {
    let mut assessment = Assessment::new();
    let geometry = ctx.document.first("geometry").filter(|g| !is_null(g));
    let Some(geometry) = geometry else {
        assessment.available(3.0);
        assessment.comment("Geometry not found");
        return assessment;
    };
    assessment.available(1.0);
    assessment.earn(1.0);

    let kind = geometry.value("type").unwrap_or_default();
    assessment.criterion(
        GEOMETRY_TYPES.contains(&kind),
        format!("Invalid geometry type {kind:?}"),
    );

    let mut coordinates = geometry.values("coordinates");
    coordinates.extend(geometry.values("geometries/coordinates"));
    let numbers: Vec<f64> = coordinates
        .iter()
        .filter_map(|c| c.parse::<f64>().ok())
        .filter(|c| c.is_finite())
        .collect();
    assessment.criterion(
        !coordinates.is_empty()
            && numbers.len() == coordinates.len()
            && numbers.iter().all(|c| (-180.0..=180.0).contains(c)),
        "Coordinates are missing, not numeric or out of range",
    );
    assessment
}

fn keywords(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let mut assessment = Assessment::new();

    assessment.criterion(
        !doc.values("properties/keywords").is_empty(),
        "No keywords found",
    );

    let themes = doc.select("properties/themes");
    let concepts: Vec<&Node> = themes.iter().flat_map(|t| t.select("concepts")).collect();
    assessment.criterion(!concepts.is_empty(), "No themes found");

    let with_scheme = themes.iter().filter(|t| t.value("scheme").is_some()).count();
    proportion(
        &mut assessment,
        with_scheme,
        themes.len(),
        format!(
            "{} of {} themes declare a scheme",
            with_scheme,
            themes.len()
        ),
    );

    let with_id = concepts.iter().filter(|c| c.value("id").is_some()).count();
    proportion(
        &mut assessment,
        with_id,
        concepts.len(),
        format!(
            "{} of {} concepts have an id",
            with_id,
            concepts.len()
        ),
    );
    assessment
}

fn contact_information(ctx: &KpiContext<'_>) -> Assessment {
    let contacts = contacts(ctx.document);
    let fields = RECOMMENDED_CONTACT_FIELDS.len() as f64;
    let mut assessment = Assessment::new();
    assessment.available(fields);
    if contacts.is_empty() {
        assessment.comment("No contacts found");
        return assessment;
    }

    let share = fields / contacts.len() as f64;
    for (index, contact) in contacts.iter().enumerate() {
        let missing: Vec<&str> = RECOMMENDED_CONTACT_FIELDS
            .iter()
            .copied()
            .filter(|f| !contact.exists(f))
            .collect();
        let present = RECOMMENDED_CONTACT_FIELDS.len() - missing.len();
        assessment.earn(share * present as f64 / fields);
        if !missing.is_empty() {
            assessment.comment(format!("Contact {index} lacks {}", missing.join(", ")));
        }
    }
    assessment
}

fn links_health(ctx: &KpiContext<'_>) -> Assessment {
    assess_links(ctx.probe, ctx.document.values("//href"))
}

fn distribution(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let mut assessment = Assessment::new();
    let links = data_links(doc);

    assessment.criterion(!links.is_empty(), "No data access link found");

    let typed = links.iter().filter(|l| l.value("type").is_some()).count();
    proportion(
        &mut assessment,
        typed,
        links.len(),
        format!("{typed} of {} data links declare a media type", links.len()),
    );

    let subscribable = links.iter().any(|l| {
        l.exists("channel")
            && l.value("href")
                .is_some_and(|h| h.starts_with("mqtt://") || h.starts_with("mqtts://"))
    });
    assessment.criterion(subscribable, "No WIS2 notification subscription link found");

    let secure = links
        .iter()
        .filter_map(|l| l.value("href"))
        .filter(|h| ctx.probe.probe(h).secure)
        .count();
    proportion(
        &mut assessment,
        secure,
        links.len(),
        format!("{secure} of {} data links use a secure scheme", links.len()),
    );
    assessment
}

fn data_policy(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let mut assessment = Assessment::new();
    let policy = doc.first("properties/wmo:dataPolicy");
    let name = policy.and_then(|p| p.text().or_else(|| p.value("name")));

    assessment.criterion(
        matches!(name, Some("core" | "recommended")),
        format!(
            "Data policy {:?} is not core or recommended",
            name.unwrap_or_default()
        ),
    );

    let rels: BTreeSet<&str> = doc.values("links/rel").into_iter().collect();
    assessment.criterion(
        rels.contains("license") || doc.exists("properties/rights"),
        "No license link or rights statement found",
    );

    let conditions = policy.map(|p| p.select("additionalConditions")).unwrap_or_default();
    let described = !conditions.is_empty()
        && conditions
            .iter()
            .all(|c| c.exists("name") && c.exists("scheme"));
    assessment.criterion(
        name == Some("core") || described,
        "Recommended data lacks additionalConditions with name and scheme",
    );
    assessment
}
