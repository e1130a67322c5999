//! Indicators for WMO Core Metadata Profile 1.3 records.

use std::collections::BTreeSet;

use tracing::debug;

use crate::document::Node;
use crate::ets::legacy::{
    codelist_value, string_or_anchor, wmo_keyword_blocks, KEYWORD_BLOCKS, OTHER_CONSTRAINTS,
};
use crate::ets::SuiteVersion;
use crate::reference::Authority;
use crate::temporal::TimePosition;

use super::{assess_abstract, assess_links, assess_title, ets_compliance};
use super::{Assessment, Category, Indicator, KpiContext};

/// ETS clauses whose failure does not cost compliance points.
pub const TOLERATED_CLAUSES: &[&str] = &["6.1.1", "6.1.2", "6.2.1"];

/// Media types accepted for a graphic overview.
const WEB_IMAGES: &[&str] = &[
    "image/apng",
    "image/avif",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/webp",
];

const LEGAL_CONSTRAINTS: &str =
    "gmd:identificationInfo//gmd:resourceConstraints/gmd:MD_LegalConstraints";
const ONLINE_LINKAGE: &str = "gmd:distributionInfo/gmd:MD_Distribution/gmd:transferOptions/gmd:MD_DigitalTransferOptions/gmd:onLine/gmd:CI_OnlineResource/gmd:linkage";

/// Coded elements checked against the list their `codeList` attribute names.
const CODED_ELEMENTS: &[(Authority, &str)] = &[
    (Authority::Wmo, "//gmd:date/gmd:CI_Date/gmd:dateType/gmd:CI_DateTypeCode"),
    (Authority::Wmo, "//gmd:MD_Keywords/gmd:type/gmd:MD_KeywordTypeCode"),
    (Authority::Iso, "//gmd:CI_ResponsibleParty/gmd:role/gmd:CI_RoleCode"),
    (Authority::Iso, "//gmd:resourceConstraints//gmd:MD_RestrictionCode"),
    (Authority::Iso, "//gmd:scope//gmd:MD_ScopeCode"),
];

/// WMO lists whose terms earn a point wherever they appear in constraints or
/// keywords.
const WMO_TERM_LISTS: &[&str] = &[
    "WMO_GTSProductCategoryCode",
    "WMO_CategoryCode",
    "WMO_DistributionScopeCode",
];

/// Registered indicators, in evaluation order.
pub const INDICATORS: &[Indicator] = &[
    Indicator {
        id: "kpi_001",
        name: "WCMP 1.3, Part 2 compliance",
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
        name: "Good quality abstract",
        category: Category::ContentInformation,
        evaluate: abstracts,
    },
    Indicator {
        id: "kpi_004",
        name: "Temporal information",
        category: Category::ContentInformation,
        evaluate: temporal,
    },
    Indicator {
        id: "kpi_005",
        name: "DOI citation",
        category: Category::ContentInformation,
        evaluate: doi,
    },
    Indicator {
        id: "kpi_006",
        name: "Keywords",
        category: Category::ContentInformation,
        evaluate: keywords,
    },
    Indicator {
        id: "kpi_007",
        name: "Graphic overview for non bulletins metadata records",
        category: Category::ContentInformation,
        evaluate: graphic_overview,
    },
    Indicator {
        id: "kpi_008",
        name: "Links health",
        category: Category::Enhancements,
        evaluate: links_health,
    },
    Indicator {
        id: "kpi_009",
        name: "Data policy",
        category: Category::DistributionInformation,
        evaluate: data_policy,
    },
    Indicator {
        id: "kpi_010",
        name: "Distribution information",
        category: Category::DistributionInformation,
        evaluate: distribution,
    },
    Indicator {
        id: "kpi_011",
        name: "Codelists validation",
        category: Category::Enhancements,
        evaluate: codelists,
    },
];

/// Plain text and anchor text of a string-or-anchor element, without
/// anchor targets.
fn texts(node: &Node) -> Vec<&str> {
    let mut values = node.values("gco:CharacterString");
    values.extend(node.values("gmx:Anchor"));
    values
}

fn compliance(ctx: &KpiContext<'_>) -> Assessment {
    ets_compliance(ctx, SuiteVersion::Legacy, TOLERATED_CLAUSES)
}

fn title(ctx: &KpiContext<'_>) -> Assessment {
    let node = ctx.document.first(
        "gmd:identificationInfo//gmd:citation/gmd:CI_Citation/gmd:title/gco:CharacterString",
    );
    let location = node.map(Node::location).unwrap_or_default();
    assess_title(node.and_then(Node::text), &location)
}

fn abstracts(ctx: &KpiContext<'_>) -> Assessment {
    let mut assessment = Assessment::new();
    for node in ctx
        .document
        .select("gmd:identificationInfo//gmd:abstract/gco:CharacterString")
    {
        assess_abstract(&mut assessment, node.text(), &node.location());
    }
    assessment
}

fn temporal(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let mut assessment = Assessment::new();

    let periods = doc.select(
        "gmd:identificationInfo//gmd:temporalElement/gmd:EX_TemporalExtent/gmd:extent/gml:TimePeriod",
    );
    if periods.is_empty() {
        assessment.available(3.0);
        assessment.comment("Temporal information not found");
    }
    for period in periods {
        assessment.available(3.0);
        assessment.earn(1.0);
        let (Some(begin), Some(end)) = (
            period.first("gml:beginPosition"),
            period.first("gml:endPosition"),
        ) else {
            assessment.comment(format!(
                "{}Temporal information - begin or end time not found",
                period.location()
            ));
            continue;
        };
        assessment.earn(1.0);

        match (TimePosition::from_gml(begin), TimePosition::from_gml(end)) {
            (Some(b), Some(e)) if b < e => {
                debug!(begin = %b, end = %e, "temporal information is valid");
                assessment.earn(1.0);
            }
            (Some(b), Some(e)) => assessment.comment(format!(
                "{}Temporal information is invalid ({b} is not before {e})",
                begin.location()
            )),
            (None, _) => assessment.comment(format!(
                "{}Temporal information - begin time has unknown format",
                begin.location()
            )),
            (_, None) => assessment.comment(format!(
                "{}Temporal information - end time has unknown format",
                end.location()
            )),
        }
    }

    let frequency = doc.select(
        "gmd:identificationInfo//gmd:resourceMaintenance//gmd:maintenanceAndUpdateFrequency",
    );
    assessment.criterion(!frequency.is_empty(), "Update frequency not found");
    if frequency.len() > 1 {
        assessment.comment(format!(
            "Multiple ({}) update frequency elements found",
            frequency.len()
        ));
    }

    assessment.criterion(
        doc.exists("gmd:identificationInfo//gmd:status"),
        "Data status not found",
    );
    assessment
}

fn doi(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let mut assessment = Assessment::new();

    let Some(anchor) =
        doc.first("gmd:identificationInfo//gmd:citation//gmd:identifier//gmd:code/gmx:Anchor")
    else {
        assessment.comment("No DOI found");
        return assessment;
    };
    assessment.available(1.0);
    assessment.earn(1.0);

    assessment.criterion(
        anchor.attribute("xlink:title") == Some("DOI"),
        format!("{}DOI title is not equal to \"DOI\"", anchor.location()),
    );

    let doi = anchor.text().unwrap_or_default();
    let cited = doc
        .values("gmd:identificationInfo//gmd:resourceConstraints//gmd:otherConstraints/gco:CharacterString")
        .into_iter()
        .any(|c| c.contains("Cite as:") && !doi.is_empty() && c.contains(doi));
    assessment.criterion(
        cited,
        "No citation constraint starts with \"Cite as:\" and quotes the DOI",
    );
    assessment
}

fn keywords(ctx: &KpiContext<'_>) -> Assessment {
    let mut assessment = Assessment::new();
    let blocks = ctx
        .document
        .select("//gmd:MD_DataIdentification/gmd:descriptiveKeywords/gmd:MD_Keywords");

    let (mut total, mut anchors, mut typed, mut with_thesaurus) = (0, 0, 0, 0);
    for block in &blocks {
        let keywords = block.select("gmd:keyword");
        total += keywords.len();
        if block.exists("gmd:type") {
            typed += keywords.len();
        }
        if block.exists("gmd:thesaurusName") {
            with_thesaurus += keywords.len();
        }
        anchors += keywords
            .iter()
            .filter(|k| !k.exists("gco:CharacterString"))
            .count();
    }
    debug!(total, anchors, typed, with_thesaurus, "keywords counted");

    assessment.criterion(total > 0, "No keywords found");
    assessment.criterion(
        anchors >= total,
        format!(
            "Found {} keywords that are not gmx:Anchor but a bare character string",
            total - anchors
        ),
    );
    assessment.criterion(
        typed >= total,
        format!("Found {} keywords without type definition", total - typed),
    );
    assessment.criterion(
        with_thesaurus >= total,
        format!("Found {} keywords without thesaurus", total - with_thesaurus),
    );
    assessment
}

fn graphic_overview(ctx: &KpiContext<'_>) -> Assessment {
    let mut assessment = Assessment::new();
    let Some(file) = ctx.document.first(
        "gmd:identificationInfo/gmd:MD_DataIdentification/gmd:graphicOverview/gmd:MD_BrowseGraphic/gmd:fileName",
    ) else {
        assessment.comment("No graphic overview found");
        return assessment;
    };
    assessment.available(1.0);
    assessment.earn(1.0);

    let link = file
        .value("gmx:Anchor/@xlink:href")
        .or_else(|| file.value("gco:CharacterString"))
        .unwrap_or_default();
    let status = ctx.probe.probe(link);
    assessment.criterion(
        status.accessible,
        format!("{}URL not accessible: {link}", file.location()),
    );
    let media_type = status.media_type.as_deref().unwrap_or("unknown");
    assessment.criterion(
        WEB_IMAGES.contains(&media_type),
        format!("{}MIME type not a web image: {media_type}", file.location()),
    );
    assessment
}

fn links_health(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let mut links = doc.values("//gmd:URL");
    links.extend(doc.values("//gmx:Anchor/@xlink:href"));
    links.extend(doc.values("//gmd:CI_DateTypeCode/@codeList"));
    links.extend(doc.values(
        "//gmd:graphicOverview/gmd:MD_BrowseGraphic/gmd:fileName/gco:CharacterString",
    ));
    assess_links(ctx.probe, links)
}

fn data_policy(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let lists = ctx.reference.codelists();
    let mut assessment = Assessment::new();

    let constraints = doc.select(OTHER_CONSTRAINTS);
    let mut licence_found = false;
    let mut licence_anchor = false;
    let mut checked = Vec::new();
    for constraint in &constraints {
        let plain = constraint.select("gco:CharacterString").into_iter().map(|n| (n, false));
        let anchored = constraint.select("gmx:Anchor").into_iter().map(|n| (n, true));
        for (element, is_anchor) in plain.chain(anchored) {
            let value = element.text().unwrap_or_default();
            if !lists.contains(Authority::Wmo, "WMO_DataLicenseCode", value) {
                checked.push(value);
                continue;
            }
            licence_found = true;
            if is_anchor {
                licence_anchor = true;
            } else {
                assessment.comment(format!(
                    "{}WMO_DataLicenseCode is not defined as an anchor",
                    element.location()
                ));
            }
        }
    }
    assessment.criterion(
        licence_found,
        format!(
            "None of [{}] is a known WMO_DataLicenseCode value",
            checked.join(", ")
        ),
    );

    assessment.available(1.0);
    let mut restricted = 0;
    for element in ["gmd:accessConstraints", "gmd:useConstraints"] {
        let codes = doc.select(&format!("{LEGAL_CONSTRAINTS}/{element}/gmd:MD_RestrictionCode"));
        if codes.is_empty() {
            assessment.comment(format!("Legal constraint {element} not found"));
            continue;
        }
        let mut valid = true;
        for code in codes {
            let value = codelist_value(code).unwrap_or_default();
            if value != "otherRestrictions" {
                valid = false;
                assessment.comment(format!(
                    "{}Unexpected value at {element}: {value}",
                    code.location()
                ));
            }
        }
        if valid {
            restricted += 1;
        }
    }
    if restricted == 2 {
        assessment.earn(1.0);
    }

    let mut scope_defined = false;
    let mut scope_anchor = false;
    let mut thesaurus_anchor = false;
    let mut exchanged = false;
    for block in wmo_keyword_blocks(doc, "WMO_DistributionScopeCode") {
        let types: Vec<&str> = block
            .select("gmd:type/gmd:MD_KeywordTypeCode")
            .into_iter()
            .filter_map(codelist_value)
            .collect();
        if types.len() > 1 {
            assessment.comment(format!(
                "{}Ambiguous definition of keyword type ({})",
                block.location(),
                types.join(", ")
            ));
            continue;
        }
        if types.iter().any(|t| matches!(*t, "dataCentre" | "dataCenter")) {
            scope_defined = true;
        }

        if block.exists("gmd:thesaurusName/gmd:CI_Citation/gmd:title/gmx:Anchor") {
            thesaurus_anchor = true;
        } else {
            assessment.comment(format!(
                "{}WMO_DistributionScopeCode thesaurus title is not defined as an anchor",
                block.location()
            ));
        }

        for keyword in block.select("gmd:keyword") {
            let anchor = keyword.value("gmx:Anchor");
            let Some(value) = anchor.or_else(|| keyword.value("gco:CharacterString")) else {
                continue;
            };
            if !lists.contains(Authority::Wmo, "WMO_DistributionScopeCode", value) {
                continue;
            }
            if anchor.is_some() {
                scope_anchor = true;
            } else {
                assessment.comment(format!(
                    "{}WMO_DistributionScopeCode is not defined as an anchor",
                    keyword.location()
                ));
            }
            if matches!(value, "GlobalExchange" | "RegionalExchange") {
                exchanged = true;
            }
        }
    }

    let mut category_defined = false;
    if exchanged {
        let values: Vec<&str> = constraints.iter().flat_map(|c| string_or_anchor(*c)).collect();
        category_defined = values
            .iter()
            .any(|v| lists.contains(Authority::Wmo, "WMO_GTSProductCategoryCode", v));
        if values.contains(&"WMOEssential") {
            assessment.criterion(
                doc.exists(ONLINE_LINKAGE),
                "Resource transferOption link not found for WMOEssential data",
            );
        }
    }

    assessment.criterion(
        scope_defined,
        "No definition of the distribution scope found (keyword from WMO_DistributionScopeCode thesaurus)",
    );
    assessment.criterion(
        category_defined,
        "No product category code defined for globally or regionally exchanged data (keyword from WMO_GTSProductCategoryCode code list)",
    );
    assessment.criterion(
        licence_anchor && scope_anchor && thesaurus_anchor,
        "Data licence, distribution scope and distribution scope thesaurus are not all anchors",
    );
    assessment
}

fn distribution(ctx: &KpiContext<'_>) -> Assessment {
    const FORMAT: &str = "//gmd:distributionInfo//gmd:distributionFormat/gmd:MD_Format";
    const ORGANISATION: &str =
        "//gmd:distributionInfo//gmd:MD_Distributor//gmd:organisationName/gco:CharacterString";
    const EMAIL: &str = "//gmd:distributionInfo//gmd:MD_Distributor//gmd:contactInfo//gmd:electronicMailAddress/gco:CharacterString";
    const TRANSFER: &str =
        "//gmd:distributionInfo//gmd:MD_DigitalTransferOptions//gmd:onLine//gmd:URL";

    let doc = ctx.document;
    let mut assessment = Assessment::new();

    match doc.first(FORMAT) {
        Some(format) => {
            assessment.available(2.0);
            assessment.earn(1.0);
            match format.first("//gmd:specification/gmx:Anchor") {
                Some(anchor) => {
                    let link = anchor.attribute("xlink:href").unwrap_or_default();
                    if ctx.probe.probe(link).accessible {
                        assessment.earn(1.0);
                    } else {
                        assessment.comment(format!(
                            "{}The format specification URL is not accessible: {link}",
                            anchor.location()
                        ));
                    }
                }
                None => assessment.comment("Format specification URL is missing"),
            }
        }
        None => {
            assessment.available(2.0);
            assessment.comment(format!("Distribution format not found (expected at {FORMAT})"));
        }
    }

    assessment.criterion(
        doc.exists(ORGANISATION),
        format!("Distribution contact organization not found (expected at {ORGANISATION})"),
    );
    assessment.criterion(
        doc.exists(EMAIL),
        format!("Distribution contact email not found (expected at {EMAIL})"),
    );
    assessment.criterion(
        doc.exists(TRANSFER),
        format!("No transfer options found (expected at {TRANSFER})"),
    );
    assessment
}

fn codelists(ctx: &KpiContext<'_>) -> Assessment {
    let doc = ctx.document;
    let lists = ctx.reference.codelists();
    let mut assessment = Assessment::new();

    for (authority, expr) in CODED_ELEMENTS {
        for element in doc.select(expr) {
            let value = codelist_value(element).unwrap_or_default();
            let Some(list) = element
                .attribute("codeList")
                .and_then(|c| c.rsplit('#').next())
                .filter(|l| !l.is_empty())
            else {
                assessment.criterion(
                    false,
                    format!("{}Missing codeList attribute: '{value}'", element.location()),
                );
                continue;
            };
            match lists.get(*authority, list) {
                Some(values) => assessment.criterion(
                    values.contains(value),
                    format!(
                        "{}Invalid codelist value: '{value}' not in '{list}'",
                        element.location()
                    ),
                ),
                None => assessment.criterion(
                    false,
                    format!(
                        "{}Invalid code list reference: '{list}' is not defined in '{authority}'",
                        element.location()
                    ),
                ),
            }
        }
    }

    for element in doc.select("//gmd:topicCategory/gmd:MD_TopicCategoryCode") {
        let value = element.text().unwrap_or_default();
        assessment.criterion(
            lists.contains(Authority::Iso, "MD_TopicCategoryCode", value),
            format!(
                "{}Invalid codelist value: {value} not in MD_TopicCategoryCode",
                element.location()
            ),
        );
    }

    let mut terms: Vec<&Node> = doc.select("//gmd:resourceConstraints//gmd:otherConstraints");
    terms.extend(doc.select(&format!("{KEYWORD_BLOCKS}/gmd:keyword")));
    let known: BTreeSet<&str> = WMO_TERM_LISTS
        .iter()
        .filter_map(|list| lists.get(Authority::Wmo, list))
        .flatten()
        .map(String::as_str)
        .collect();
    for value in terms.into_iter().flat_map(texts) {
        if known.contains(value) {
            assessment.available(1.0);
            assessment.earn(1.0);
        }
    }
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse, DocumentKind, NormalizedDocument};
    use crate::kpi::links::OfflineProbe;
    use crate::reference::{CodeLists, ReferenceData};

    const NS: &str = r#"xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco" xmlns:gmx="http://www.isotc211.org/2005/gmx" xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:xlink="http://www.w3.org/1999/xlink""#;

    fn record(body: &str) -> NormalizedDocument {
        let xml = format!("<gmd:MD_Metadata {NS}>{body}</gmd:MD_Metadata>");
        parse(xml.as_bytes(), Some(DocumentKind::Legacy)).unwrap()
    }

    fn identification(inner: &str) -> String {
        format!("<gmd:identificationInfo><gmd:MD_DataIdentification>{inner}</gmd:MD_DataIdentification></gmd:identificationInfo>")
    }

    fn reference() -> ReferenceData {
        let mut lists = CodeLists::default();
        lists.insert(Authority::Wmo, "WMO_DataLicenseCode", ["WMOEssential", "WMOAdditional"]);
        lists.insert(Authority::Wmo, "WMO_DistributionScopeCode", ["GlobalExchange"]);
        lists.insert(Authority::Wmo, "WMO_GTSProductCategoryCode", ["GTSPriority2"]);
        lists.insert(Authority::Wmo, "CI_DateTypeCode", ["creation", "publication"]);
        lists.insert(Authority::Iso, "MD_TopicCategoryCode", ["climatologyMeteorologyAtmosphere"]);
        ReferenceData::new().with_codelists(lists)
    }

    fn assess(indicator: fn(&KpiContext<'_>) -> Assessment, doc: &NormalizedDocument) -> Assessment {
        let reference = reference();
        let ctx = KpiContext {
            document: doc,
            reference: &reference,
            probe: &OfflineProbe,
            ets: None,
        };
        indicator(&ctx)
    }

    fn titled(title: &str) -> NormalizedDocument {
        record(&identification(&format!(
            "<gmd:citation><gmd:CI_Citation><gmd:title><gco:CharacterString>{title}</gco:CharacterString></gmd:title></gmd:CI_Citation></gmd:citation>"
        )))
    }

    #[test]
    fn good_title_scores_full_marks() {
        let a = assess(title, &titled("Hourly Synoptic Observations"));
        assert_eq!((a.achieved, a.maximum), (7.0, 7.0));
        assert!(a.comments.is_empty());
    }

    #[test]
    fn bulletin_header_costs_an_extra_point() {
        let a = assess(title, &titled("SMCA01 KWBC"));
        // present, short, alphanumeric and two acronyms, less the penalty
        assert_eq!(a.maximum, 7.0);
        assert_eq!(a.achieved, 3.0);
        assert!(a.comments.iter().any(|c| c.contains("bulletin header")));
    }

    #[test]
    fn missing_title_scores_nothing() {
        let a = assess(title, &record(""));
        assert_eq!((a.achieved, a.maximum), (0.0, 7.0));
    }

    #[test]
    fn abstracts_earn_three_points_each() {
        let doc = record(&identification(
            "<gmd:abstract><gco:CharacterString>Hourly observations from surface stations.</gco:CharacterString></gmd:abstract>",
        ));
        let a = assess(abstracts, &doc);
        assert_eq!((a.achieved, a.maximum), (3.0, 3.0));

        let doc = record(&identification(
            "<gmd:abstract><gco:CharacterString>Short</gco:CharacterString></gmd:abstract>",
        ));
        let a = assess(abstracts, &doc);
        assert_eq!((a.achieved, a.maximum), (2.0, 3.0));
    }

    #[test]
    fn temporal_period_order_is_checked() {
        let period = |begin: &str, end: &str| {
            record(&identification(&format!(
                r#"<gmd:extent><gmd:EX_Extent><gmd:temporalElement><gmd:EX_TemporalExtent><gmd:extent>
                <gml:TimePeriod><gml:beginPosition>{begin}</gml:beginPosition>{end}</gml:TimePeriod>
                </gmd:extent></gmd:EX_TemporalExtent></gmd:temporalElement></gmd:EX_Extent></gmd:extent>
                <gmd:resourceMaintenance><gmd:MD_MaintenanceInformation><gmd:maintenanceAndUpdateFrequency/></gmd:MD_MaintenanceInformation></gmd:resourceMaintenance>
                <gmd:status/>"#
            )))
        };

        let a = assess(
            temporal,
            &period("2000-01-01", r#"<gml:endPosition indeterminatePosition="now"/>"#),
        );
        assert_eq!((a.achieved, a.maximum), (5.0, 5.0));

        let a = assess(
            temporal,
            &period("2020-01-01", "<gml:endPosition>2010-01-01</gml:endPosition>"),
        );
        assert_eq!((a.achieved, a.maximum), (4.0, 5.0));

        let a = assess(temporal, &period("2020-01-01", ""));
        assert_eq!((a.achieved, a.maximum), (3.0, 5.0));
    }

    #[test]
    fn missing_doi_has_nothing_to_assess() {
        let a = assess(doi, &record(""));
        assert_eq!(a.maximum, 0.0);
    }

    #[test]
    fn keyword_quality_counts_anchors_types_and_thesauri() {
        let doc = record(&identification(
            r#"<gmd:descriptiveKeywords><gmd:MD_Keywords>
              <gmd:keyword><gmx:Anchor xlink:href="http://example.org/kw">rain</gmx:Anchor></gmd:keyword>
              <gmd:keyword><gco:CharacterString>wind</gco:CharacterString></gmd:keyword>
              <gmd:type/>
            </gmd:MD_Keywords></gmd:descriptiveKeywords>"#,
        ));
        let a = assess(keywords, &doc);
        assert_eq!((a.achieved, a.maximum), (2.0, 4.0));
        assert_eq!(a.comments.len(), 2);
    }

    #[test]
    fn graphic_overview_must_be_a_web_image() {
        let overview = |file: &str| {
            record(&identification(&format!(
                "<gmd:graphicOverview><gmd:MD_BrowseGraphic><gmd:fileName><gco:CharacterString>{file}</gco:CharacterString></gmd:fileName></gmd:MD_BrowseGraphic></gmd:graphicOverview>"
            )))
        };
        let a = assess(graphic_overview, &overview("https://example.org/overview.png"));
        assert_eq!((a.achieved, a.maximum), (3.0, 3.0));
        let a = assess(graphic_overview, &overview("https://example.org/overview.pdf"));
        assert_eq!((a.achieved, a.maximum), (2.0, 3.0));
    }

    #[test]
    fn links_are_deduplicated() {
        let doc = record(
            r#"<gmd:distributionInfo><gmd:MD_Distribution><gmd:transferOptions><gmd:MD_DigitalTransferOptions>
              <gmd:onLine><gmd:CI_OnlineResource><gmd:linkage><gmd:URL>https://example.org/data</gmd:URL></gmd:linkage></gmd:CI_OnlineResource></gmd:onLine>
              <gmd:onLine><gmd:CI_OnlineResource><gmd:linkage><gmd:URL>https://example.org/data</gmd:URL></gmd:linkage></gmd:CI_OnlineResource></gmd:onLine>
              <gmd:onLine><gmd:CI_OnlineResource><gmd:linkage><gmd:URL>http://example.org/plain</gmd:URL></gmd:linkage></gmd:CI_OnlineResource></gmd:onLine>
            </gmd:MD_DigitalTransferOptions></gmd:transferOptions></gmd:MD_Distribution></gmd:distributionInfo>"#,
        );
        let a = assess(links_health, &doc);
        assert_eq!((a.achieved, a.maximum), (3.0, 4.0));
    }

    #[test]
    fn global_essential_data_policy() {
        let doc = record(&format!(
            "{}{}",
            identification(
                r#"<gmd:descriptiveKeywords><gmd:MD_Keywords>
                  <gmd:keyword><gmx:Anchor xlink:href="http://wis.wmo.int/2012/codelists/WMOCodeLists.xml#WMO_DistributionScopeCode_GlobalExchange">GlobalExchange</gmx:Anchor></gmd:keyword>
                  <gmd:type><gmd:MD_KeywordTypeCode codeListValue="dataCentre">dataCentre</gmd:MD_KeywordTypeCode></gmd:type>
                  <gmd:thesaurusName><gmd:CI_Citation><gmd:title><gmx:Anchor xlink:href="http://wis.wmo.int/2012/codelists/WMOCodeLists.xml#WMO_DistributionScopeCode">WMO_DistributionScopeCode</gmx:Anchor></gmd:title></gmd:CI_Citation></gmd:thesaurusName>
                </gmd:MD_Keywords></gmd:descriptiveKeywords>
                <gmd:resourceConstraints><gmd:MD_LegalConstraints>
                  <gmd:accessConstraints><gmd:MD_RestrictionCode codeListValue="otherRestrictions">otherRestrictions</gmd:MD_RestrictionCode></gmd:accessConstraints>
                  <gmd:useConstraints><gmd:MD_RestrictionCode codeListValue="otherRestrictions">otherRestrictions</gmd:MD_RestrictionCode></gmd:useConstraints>
                  <gmd:otherConstraints><gmx:Anchor xlink:href="http://wis.wmo.int/2012/codelists/WMOCodeLists.xml#WMO_DataLicenseCode_WMOEssential">WMOEssential</gmx:Anchor></gmd:otherConstraints>
                  <gmd:otherConstraints><gco:CharacterString>GTSPriority2</gco:CharacterString></gmd:otherConstraints>
                </gmd:MD_LegalConstraints></gmd:resourceConstraints>"#,
            ),
            r#"<gmd:distributionInfo><gmd:MD_Distribution><gmd:transferOptions><gmd:MD_DigitalTransferOptions>
              <gmd:onLine><gmd:CI_OnlineResource><gmd:linkage><gmd:URL>https://example.org/data</gmd:URL></gmd:linkage></gmd:CI_OnlineResource></gmd:onLine>
            </gmd:MD_DigitalTransferOptions></gmd:transferOptions></gmd:MD_Distribution></gmd:distributionInfo>"#
        ));
        let a = assess(data_policy, &doc);
        assert_eq!((a.achieved, a.maximum), (6.0, 6.0), "{:?}", a.comments);
    }

    #[test]
    fn codelist_values_are_checked_against_named_lists() {
        let doc = record(&identification(
            r#"<gmd:citation><gmd:CI_Citation><gmd:date><gmd:CI_Date>
              <gmd:dateType><gmd:CI_DateTypeCode codeList="http://wis.wmo.int/2012/codelists/WMOCodeLists.xml#CI_DateTypeCode" codeListValue="publication">publication</gmd:CI_DateTypeCode></gmd:dateType>
            </gmd:CI_Date></gmd:date>
            <gmd:date><gmd:CI_Date>
              <gmd:dateType><gmd:CI_DateTypeCode codeList="http://wis.wmo.int/2012/codelists/WMOCodeLists.xml#CI_DateTypeCode" codeListValue="yesterday">yesterday</gmd:CI_DateTypeCode></gmd:dateType>
            </gmd:CI_Date></gmd:date></gmd:CI_Citation></gmd:citation>
            <gmd:topicCategory><gmd:MD_TopicCategoryCode>climatologyMeteorologyAtmosphere</gmd:MD_TopicCategoryCode></gmd:topicCategory>"#,
        ));
        let a = assess(codelists, &doc);
        assert_eq!((a.achieved, a.maximum), (2.0, 3.0));
        assert!(a.comments[0].contains("'yesterday' not in 'CI_DateTypeCode'"));
    }
}
