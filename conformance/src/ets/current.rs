//! WMO Core Metadata Profile 2, Annex A test suite.

use std::collections::BTreeSet;

use crate::document::{Node, NormalizedDocument};
use crate::reference::{Authority, Requirement};
use crate::temporal::{parse_rfc3339, TimePosition};
use crate::topics::{LevelStatus, TopicValidator};

use super::{ClauseContext, Outcome, TestClause};

/// Conformance classes accepted as declaring WCMP2.
pub const CONFORMANCE_CLASSES: &[&str] = &[
    "http://wis.wmo.int/spec/wcmp/2/conf/core",
    "http://wis.wmo.int/spec/wcmp/2.0",
];

/// Identifier prefix of WCMP2 records.
pub const IDENTIFIER_PREFIX: &str = "urn:x-wmo:md:";

/// Topic levels (channel, version, system) a dataset topic must omit.
pub const INFRASTRUCTURE_LEVELS: usize = 3;

/// Reference data the suite cannot run without.
pub const REQUIREMENTS: &[Requirement] = &[Requirement::Schema, Requirement::TopicHierarchy];

const REQUIRED_ROLES: &[&str] = &["originator", "pointOfContact"];
const GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Registered clauses, in report order.
pub const CLAUSES: &[TestClause] = &[
    TestClause {
        id: "validation",
        slug: "validation",
        description: "Validate that a WCMP record is valid to the authoritative WCMP schema.",
        check: validation,
    },
    TestClause {
        id: "identifier",
        slug: "identifier",
        description: "Validate that a WCMP record has a valid identifier.",
        check: identifier,
    },
    TestClause {
        id: "conformance",
        slug: "conformance",
        description: "Validate that a WCMP record provides valid conformance information.",
        check: conformance,
    },
    TestClause {
        id: "type",
        slug: "type",
        description: "Check for the existence of a valid properties.type property in the WCMP record.",
        check: resource_type,
    },
    TestClause {
        id: "extent_geospatial",
        slug: "extent_geospatial",
        description: "Validate that a WCMP record provides a valid geospatial extent.",
        check: extent_geospatial,
    },
    TestClause {
        id: "extent_temporal",
        slug: "extent_temporal",
        description: "Validate that a WCMP record provides a valid temporal extent property.",
        check: extent_temporal,
    },
    TestClause {
        id: "title",
        slug: "title",
        description: "Validate that a WCMP record provides a title property.",
        check: title,
    },
    TestClause {
        id: "description",
        slug: "description",
        description: "Validate that a WCMP record provides a description property.",
        check: description,
    },
    TestClause {
        id: "topic_hierarchy",
        slug: "topic_hierarchy",
        description: "Validate that a WCMP record provides a valid WIS2 Topic Hierarchy.",
        check: topic_hierarchy,
    },
    TestClause {
        id: "providers",
        slug: "providers",
        description: "Validate that a WCMP record provides contact information for the metadata point of contact and originator of the data.",
        check: providers,
    },
    TestClause {
        id: "record_creation_date",
        slug: "record_creation_date",
        description: "Validate that a WCMP record provides a record creation date.",
        check: record_creation_date,
    },
    TestClause {
        id: "data_policy",
        slug: "data_policy",
        description: "Validate that a WCMP record provides information about data policy and, if applicable additional information about licensing and/or rights.",
        check: data_policy,
    },
    TestClause {
        id: "links",
        slug: "links",
        description: "Validate that a WCMP record provides a link property.",
        check: links,
    },
];

/// Whether a JSON node is `null` (present without value or members).
fn is_null(node: &Node) -> bool {
    node.text().is_none() && node.children().is_empty()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Contact entries, under either member name used by WCMP2 drafts.
pub(crate) fn contacts(doc: &NormalizedDocument) -> Vec<&Node> {
    let mut contacts = doc.select("properties/contacts");
    contacts.extend(doc.select("properties/providers"));
    contacts
}

/// Role names of a contact: plain strings or `{name: ..}` objects.
pub(crate) fn roles(contact: &Node) -> Vec<&str> {
    let mut roles = contact.values("roles");
    roles.extend(contact.values("roles/name"));
    roles
}

fn validation(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(schema) = ctx.reference.schema() else {
        return Outcome::Skip("no WCMP2 schema loaded".into());
    };
    let Some(record) = ctx.document.json() else {
        return Outcome::Fail("Record is not a JSON document.".into());
    };

    let violations = schema.violations(record);
    if violations.is_empty() {
        Outcome::Pass
    } else {
        Outcome::Fail(format!("Invalid document: {}", violations.join("; ")))
    }
}

fn identifier(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(id) = non_empty(ctx.document.value("id")) else {
        return Outcome::Fail("Record has no id.".into());
    };

    let parts: Vec<&str> = id.split(':').collect();
    let [_, _, _, country, centre_id, _] = parts.as_slice() else {
        return Outcome::Fail(format!("Identifier {id} does not have six ':' delimited parts."));
    };
    if !id.starts_with(IDENTIFIER_PREFIX) {
        return Outcome::Fail(format!("Identifier {id} does not start with {IDENTIFIER_PREFIX}."));
    }
    if !id.is_ascii() {
        return Outcome::Fail(format!("Identifier {id} contains non-ASCII characters."));
    }

    let Some(topics) = ctx.reference.topics() else {
        return Outcome::Skip("no topic hierarchy loaded".into());
    };
    let validator = TopicValidator::new(topics);
    if !validator.list_children("origin/a/wis2").contains(*country) {
        return Outcome::Fail(format!("Invalid country: {country}."));
    }
    if !validator
        .list_children(&format!("origin/a/wis2/{country}"))
        .contains(*centre_id)
    {
        return Outcome::Fail(format!("Invalid centre_id: {centre_id}."));
    }
    Outcome::Pass
}

fn conformance(ctx: &ClauseContext<'_>) -> Outcome {
    let declared = ctx.document.values("conformsTo");
    if declared.iter().any(|c| CONFORMANCE_CLASSES.contains(c)) {
        Outcome::Pass
    } else {
        Outcome::Fail(format!(
            "Missing conformance class {}.",
            CONFORMANCE_CLASSES[0]
        ))
    }
}

fn resource_type(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(codes) = ctx.reference.codelists().get(Authority::Wcmp2, "resource-type") else {
        return Outcome::Skip("Test needs the WCMP2 resource-type code list".into());
    };
    match non_empty(ctx.document.value("properties/type")) {
        None => Outcome::Fail("properties.type is missing.".into()),
        Some(code) if codes.contains(code) => Outcome::Pass,
        Some(code) => Outcome::Fail(format!("{code} is not a resource-type code.")),
    }
}

fn extent_geospatial(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(geometry) = ctx.document.first("geometry") else {
        return Outcome::Fail("Record has no geometry.".into());
    };
    if is_null(geometry) {
        return Outcome::Fail("Geometry is null.".into());
    }

    let kind = geometry.value("type").unwrap_or_default();
    if !GEOMETRY_TYPES.contains(&kind) {
        return Outcome::Fail(format!("Unknown geometry type {kind:?}."));
    }
    if kind == "GeometryCollection" {
        return if geometry.exists("geometries") {
            Outcome::Pass
        } else {
            Outcome::Fail("GeometryCollection has no geometries.".into())
        };
    }

    let coordinates = geometry.select("coordinates");
    if coordinates.is_empty() {
        return Outcome::Fail(format!("{kind} has no coordinates."));
    }
    match coordinates
        .iter()
        .find(|c| c.text().and_then(|t| t.parse::<f64>().ok()).is_none())
    {
        Some(bad) => Outcome::Fail(format!(
            "Coordinate {:?} is not a number.",
            bad.text().unwrap_or("null")
        )),
        None => Outcome::Pass,
    }
}

fn extent_temporal(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(time) = ctx
        .document
        .first("time")
        .or_else(|| ctx.document.first("properties/time"))
    else {
        return Outcome::Skip("record has no temporal extent".into());
    };
    if is_null(time) {
        return Outcome::Pass;
    }

    let interval = time.select("interval");
    if !interval.is_empty() {
        let [begin, end] = interval.as_slice() else {
            return Outcome::Fail(format!(
                "Interval must have exactly two positions, found {}.",
                interval.len()
            ));
        };
        let mut positions = Vec::with_capacity(2);
        for bound in [begin, end] {
            match bound.text() {
                None | Some("..") => positions.push(None),
                Some(text) => match TimePosition::parse(text) {
                    Some(position) => positions.push(Some(position)),
                    None => return Outcome::Fail(format!("Invalid interval position {text:?}.")),
                },
            }
        }
        if let [Some(begin), Some(end)] = positions.as_slice() {
            if end < begin {
                return Outcome::Fail(format!("Interval ends ({end}) before it begins ({begin})."));
            }
        }
        return Outcome::Pass;
    }

    match time.value("timestamp").or_else(|| time.value("date")) {
        Some(text) if TimePosition::parse(text).is_some() => Outcome::Pass,
        Some(text) => Outcome::Fail(format!("Invalid time instant {text:?}.")),
        None => Outcome::Fail("Time has neither interval nor timestamp/date.".into()),
    }
}

fn title(ctx: &ClauseContext<'_>) -> Outcome {
    match non_empty(ctx.document.value("properties/title")) {
        Some(_) => Outcome::Pass,
        None => Outcome::Fail("properties.title is missing or empty.".into()),
    }
}

fn description(ctx: &ClauseContext<'_>) -> Outcome {
    match non_empty(ctx.document.value("properties/description")) {
        Some(_) => Outcome::Pass,
        None => Outcome::Fail("properties.description is missing or empty.".into()),
    }
}

fn topic_hierarchy(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(topic) = ctx.document.value("properties/wmo:topicHierarchy") else {
        return Outcome::Skip("record declares no topic hierarchy".into());
    };
    let Some(topics) = ctx.reference.topics() else {
        return Outcome::Skip("no topic hierarchy loaded".into());
    };
    let validator = TopicValidator::new(topics);

    if validator.validate_from(0, topic, true).matched > 0 {
        return Outcome::Fail(format!(
            "Topic {topic} should not include levels 1-{INFRASTRUCTURE_LEVELS}."
        ));
    }

    let result = validator.validate_from(INFRASTRUCTURE_LEVELS, topic, true);
    if result.complete {
        return Outcome::Pass;
    }
    match result.levels.iter().find(|l| !l.status.is_accepted()) {
        Some(level) if level.status == LevelStatus::ExtraLevel => {
            Outcome::Fail(format!("Invalid topic {topic}: too many levels."))
        }
        Some(level) => Outcome::Fail(format!(
            "Invalid topic {topic}: {:?} is not permitted at level {}.",
            level.token.as_deref().unwrap_or_default(),
            level.name.as_deref().unwrap_or("?")
        )),
        None => Outcome::Fail(format!("Invalid topic {topic:?}.")),
    }
}

fn providers(ctx: &ClauseContext<'_>) -> Outcome {
    let contacts = contacts(ctx.document);
    if contacts.is_empty() {
        return Outcome::Fail("Record lists no providers or contacts.".into());
    }

    let declared: BTreeSet<&str> = contacts.iter().flat_map(|c| roles(c)).collect();
    let missing: Vec<&str> = REQUIRED_ROLES
        .iter()
        .copied()
        .filter(|r| !declared.contains(r))
        .collect();
    if missing.is_empty() {
        Outcome::Pass
    } else {
        Outcome::Fail(format!("Missing role(s) {}.", missing.join(", ")))
    }
}

fn record_creation_date(ctx: &ClauseContext<'_>) -> Outcome {
    match ctx.document.value("properties/created") {
        None => Outcome::Fail("properties.created is missing.".into()),
        Some(created) if parse_rfc3339(created).is_some() => Outcome::Pass,
        Some(created) => Outcome::Fail(format!("{created:?} is not an RFC 3339 timestamp.")),
    }
}

fn data_policy(ctx: &ClauseContext<'_>) -> Outcome {
    let Some(policy) = ctx.document.first("properties/wmo:dataPolicy") else {
        return Outcome::Fail("properties.wmo:dataPolicy is missing.".into());
    };
    let name = policy.text().or_else(|| policy.value("name"));

    match name {
        Some("core") => Outcome::Pass,
        Some("recommended") => {
            let conditions = policy.select("additionalConditions");
            if conditions.is_empty() {
                let licensed = ctx
                    .document
                    .select("links")
                    .iter()
                    .any(|l| l.value("rel") == Some("license"));
                return if licensed {
                    Outcome::Pass
                } else {
                    Outcome::Fail("Recommended data needs additionalConditions or a license link.".into())
                };
            }
            if !conditions.iter().any(|c| c.exists("name")) {
                return Outcome::Fail("Missing additionalConditions name.".into());
            }
            if conditions
                .iter()
                .any(|c| !c.exists("name") && !c.exists("scheme"))
            {
                return Outcome::Fail("Missing additionalConditions name/scheme.".into());
            }
            Outcome::Pass
        }
        Some(other) => Outcome::Fail(format!("Invalid data policy {other}.")),
        None => Outcome::Fail("Data policy has no name.".into()),
    }
}

fn links(ctx: &ClauseContext<'_>) -> Outcome {
    let links = ctx.document.select("links");
    if links.is_empty() {
        return Outcome::Fail("Record has no links.".into());
    }

    let without_href: Vec<String> = links
        .iter()
        .enumerate()
        .filter(|(_, l)| non_empty(l.value("href")).is_none())
        .map(|(i, _)| i.to_string())
        .collect();
    if !without_href.is_empty() {
        return Outcome::Fail(format!("Link(s) {} have no href.", without_href.join(", ")));
    }

    if links.iter().any(|l| l.value("rel") == Some("canonical")) {
        Outcome::Pass
    } else {
        Outcome::Fail("Missing at least one canonical link.".into())
    }
}
