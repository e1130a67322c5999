//! WMO Core Metadata Profile 1.3, Part 2 test suite.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::{path, Node, NormalizedDocument};
use crate::reference::{Authority, Requirement};

use super::{ClauseContext, Outcome, TestClause};

/// Anchor base of thesauri taken from the WMO code lists.
pub const CODELIST_PREFIX: &str = "http://wis.wmo.int/2012/codelists/WMOCodeLists.xml";

/// Identifier prefix of globally exchanged records.
pub const GLOBAL_IDENTIFIER_PREFIX: &str = "urn:x-wmo:md:int.wmo.wis::";

pub(crate) const KEYWORD_BLOCKS: &str =
    "gmd:identificationInfo/gmd:MD_DataIdentification/gmd:descriptiveKeywords/gmd:MD_Keywords";
pub(crate) const OTHER_CONSTRAINTS: &str = "gmd:identificationInfo/gmd:MD_DataIdentification/gmd:resourceConstraints/gmd:MD_LegalConstraints/gmd:otherConstraints";
const BOUNDING_BOX: &str = "gmd:identificationInfo/gmd:MD_DataIdentification/gmd:extent/gmd:EX_Extent/gmd:geographicElement/gmd:EX_GeographicBoundingBox";

/// Code lists the suite cannot run without.
pub const REQUIREMENTS: &[Requirement] = &[
    Requirement::CodeList(Authority::Wmo, "WMO_CategoryCode"),
    Requirement::CodeList(Authority::Wmo, "WMO_DataLicenseCode"),
    Requirement::CodeList(Authority::Wmo, "WMO_GTSProductCategoryCode"),
];

/// Registered clauses, in report order.
pub const CLAUSES: &[TestClause] = &[
    TestClause {
        id: "6.1.1",
        slug: "ISO-TS-19139-2007-xml-schema-validation",
        description: "Each WIS Discovery Metadata record shall validate without error against the XML schemas defined in ISO/TS 19139:2007.",
        check: schema_validation,
    },
    TestClause {
        id: "6.1.2",
        slug: "ISO-TS-19139-2007-rule-based-validation",
        description: "Each WIS Discovery Metadata record shall validate without error against the rule-based constraints listed in ISO/TS 19139:2007 Annex A (Table A.1).",
        check: rule_based_validation,
    },
    TestClause {
        id: "6.2.1",
        slug: "explicit-xml-namespace-identification",
        description: "Each WIS Discovery Metadata record shall explicitly name all namespaces used within the record; use of default namespaces is prohibited.",
        check: explicit_namespaces,
    },
    TestClause {
        id: "6.3.1",
        slug: "gml-namespace-specification",
        description: "Each WIS Discovery Metadata record shall declare the following XML namespace for GML: http://www.opengis.net/gml/3.2.",
        check: gml_namespace,
    },
    TestClause {
        id: "8.1.1",
        slug: "fileIdentifier-cardinality",
        description: "Each WIS Discovery Metadata record shall include one gmd:MD_Metadata/gmd:fileIdentifier attribute.",
        check: file_identifier_cardinality,
    },
    TestClause {
        id: "8.2.1",
        slug: "WMO_CategoryCode-keyword-cardinality",
        description: "Each WIS Discovery Metadata record shall include at least one keyword from the WMO_CategoryCode code list.",
        check: category_keyword,
    },
    TestClause {
        id: "8.2.2",
        slug: "WMO_CategoryCode-keyword-theme",
        description: "Keywords from WMO_CategoryCode code list shall be defined as keyword type \"theme\".",
        check: category_keyword_theme,
    },
    TestClause {
        id: "8.2.3",
        slug: "keyword-grouping",
        description: "All keywords sourced from a particular keyword thesaurus shall be grouped into a single instance of the MD_Keywords class.",
        check: keyword_grouping,
    },
    TestClause {
        id: "8.2.4",
        slug: "geographic-bounding-box",
        description: "Each WIS Discovery Metadata record describing geographic data shall include the description of at least one geographic bounding box defining the spatial extent of the data.",
        check: geographic_bounding_box,
    },
    TestClause {
        id: "9.1.1",
        slug: "identification-of-globally-exchanged-data",
        description: "A WIS Discovery Metadata record describing data for global exchange via the WIS shall indicate the scope of distribution using the keyword \"GlobalExchange\" of type \"dataCentre\" from thesaurus WMO_DistributionScopeCode.",
        check: global_exchange_scope,
    },
    TestClause {
        id: "9.2.1",
        slug: "fileIdentifier-for-globally-exchanged-data",
        description: "A WIS Discovery Metadata record describing data for global exchange via the WIS shall have a gmd:MD_Metadata/gmd:fileIdentifier attribute formatted as follows (where {uid} is a unique identifier derived from the GTS bulletin or file name): urn:x-wmo:md:int.wmo.wis::{uid}.",
        check: global_file_identifier,
    },
    TestClause {
        id: "9.3.1",
        slug: "WMO-data-policy-for-globally-exchanged-data",
        description: "A WIS Discovery Metadata record describing data for global exchange via the WIS shall indicate the WMO Data License as Legal Constraint (type: \"otherConstraints\") using one and only one term from the WMO_DataLicenseCode code list.",
        check: global_data_licence,
    },
    TestClause {
        id: "9.3.2",
        slug: "GTS-priority-for-globally-exchanged-data",
        description: "A WIS Discovery Metadata record describing data for global exchange via the WIS shall indicate the GTS Priority as Legal Constraint (type: \"otherConstraints\") using one and only one term from the WMO_GTSProductCategoryCode code list.",
        check: global_gts_priority,
    },
];

/// Text of `gco:CharacterString` and `gmx:Anchor` children, plus anchor
/// targets.
pub(crate) fn string_or_anchor(node: &Node) -> Vec<&str> {
    let mut values = node.values("gco:CharacterString");
    values.extend(node.values("gmx:Anchor"));
    values.extend(node.values("gmx:Anchor/@xlink:href"));
    values
}

/// A code list value carried either in `@codeListValue` or as text.
pub(crate) fn codelist_value(node: &Node) -> Option<&str> {
    node.attribute("codeListValue")
        .filter(|v| !v.is_empty())
        .or_else(|| node.text())
}

/// Thesaurus title of a keyword block: the anchor target, or the plain title.
pub(crate) fn thesaurus_name(block: &Node) -> Option<&str> {
    let title = block.first("gmd:thesaurusName/gmd:CI_Citation/gmd:title")?;
    title
        .value("gmx:Anchor/@xlink:href")
        .or_else(|| title.value("gmx:Anchor"))
        .or_else(|| title.value("gco:CharacterString"))
}

/// Whether a keyword block's thesaurus is the WMO code list `code`.
pub(crate) fn uses_thesaurus(block: &Node, code: &str) -> bool {
    let Some(title) = block.first("gmd:thesaurusName/gmd:CI_Citation/gmd:title") else {
        return false;
    };
    match title.first("gmx:Anchor") {
        Some(anchor) => {
            let target = format!("{CODELIST_PREFIX}#{code}");
            anchor.attribute("xlink:href") == Some(target.as_str()) || anchor.text() == Some(code)
        }
        None => title.value("gco:CharacterString") == Some(code),
    }
}

/// Keyword blocks whose thesaurus is the WMO code list `code`.
pub(crate) fn wmo_keyword_blocks<'a>(doc: &'a NormalizedDocument, code: &str) -> Vec<&'a Node> {
    doc.select(KEYWORD_BLOCKS)
        .into_iter()
        .filter(|block| uses_thesaurus(block, code))
        .collect()
}

/// Every candidate value of the given `gmd:keyword` nodes.
pub(crate) fn keyword_values<'a>(keywords: &[&'a Node]) -> Vec<&'a str> {
    keywords.iter().flat_map(|k| string_or_anchor(*k)).collect()
}

/// Whether the record is flagged for global exchange.
pub(crate) fn is_for_global_exchange(doc: &NormalizedDocument) -> bool {
    let keywords = doc.select(&format!("{KEYWORD_BLOCKS}//gmd:keyword"));
    keyword_values(&keywords).contains(&"GlobalExchange")
}

fn lines(nodes: &[&Node]) -> String {
    let lines: Vec<String> = nodes
        .iter()
        .filter_map(|n| n.line())
        .map(|l| l.to_string())
        .collect();
    format!("[{}]", lines.join(", "))
}

fn not_global() -> Outcome {
    Outcome::Skip("record does not describe data for global exchange".into())
}

fn schema_validation(_: &ClauseContext<'_>) -> Outcome {
    Outcome::Skip("XML schema validation is delegated to an external XSD processor".into())
}

fn rule_based_validation(_: &ClauseContext<'_>) -> Outcome {
    Outcome::Skip("ISO/TS 19139 Annex A rule checks are delegated to an external validator".into())
}

fn explicit_namespaces(ctx: &ClauseContext<'_>) -> Outcome {
    match ctx.document.declared_namespace(None) {
        Some(uri) => Outcome::Fail(format!("Default namespace {uri} is declared.")),
        None => Outcome::Pass,
    }
}

fn gml_namespace(ctx: &ClauseContext<'_>) -> Outcome {
    let expected = path::namespace_uri("gml").unwrap_or_default();
    match ctx.document.declared_namespace(Some("gml")) {
        None => Outcome::Skip("record does not declare the gml prefix".into()),
        Some(uri) if uri == expected => Outcome::Pass,
        Some(uri) => Outcome::Fail(format!("Prefix gml is bound to {uri}.")),
    }
}

fn file_identifier_cardinality(ctx: &ClauseContext<'_>) -> Outcome {
    let ids = ctx.document.select("gmd:fileIdentifier");
    match ids.len() {
        0 => Outcome::Fail("No gmd:fileIdentifier found.".into()),
        1 => Outcome::Pass,
        _ => Outcome::Fail(format!("Multiple definitions found at lines {}.", lines(&ids))),
    }
}

fn category_keyword(ctx: &ClauseContext<'_>) -> Outcome {
    let blocks = wmo_keyword_blocks(ctx.document, "WMO_CategoryCode");
    if blocks.is_empty() {
        return Outcome::Fail("No keyword block uses the WMO_CategoryCode thesaurus.".into());
    }

    let codelists = ctx.reference.codelists();
    let mut invalid = Vec::new();
    for block in &blocks {
        let values = keyword_values(&block.select("gmd:keyword"));
        if values
            .iter()
            .any(|v| codelists.contains(Authority::Wmo, "WMO_CategoryCode", v))
        {
            return Outcome::Pass;
        }
        invalid.push(*block);
    }

    Outcome::Fail(format!("Invalid keyword(s) found at line(s) {}.", lines(&invalid)))
}

fn category_keyword_theme(ctx: &ClauseContext<'_>) -> Outcome {
    let blocks = wmo_keyword_blocks(ctx.document, "WMO_CategoryCode");
    if blocks.is_empty() {
        return Outcome::Skip("record has no WMO_CategoryCode keyword block".into());
    }

    for block in blocks {
        let types = block.select("gmd:type/gmd:MD_KeywordTypeCode");
        if types.is_empty() {
            return Outcome::Fail(format!("{}Keyword block has no type.", block.location()));
        }
        for keyword_type in types {
            if codelist_value(keyword_type) != Some("theme") {
                return Outcome::Fail(format!(
                    "{}Invalid keyword type {:?}.",
                    keyword_type.location(),
                    codelist_value(keyword_type).unwrap_or_default()
                ));
            }
        }
    }
    Outcome::Pass
}

fn keyword_grouping(ctx: &ClauseContext<'_>) -> Outcome {
    if wmo_keyword_blocks(ctx.document, "WMO_CategoryCode").is_empty() {
        return Outcome::Skip("record has no WMO_CategoryCode keyword block".into());
    }

    let mut by_thesaurus: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for block in ctx.document.select(KEYWORD_BLOCKS) {
        if let Some(name) = thesaurus_name(block) {
            by_thesaurus.entry(name).or_default().push(block);
        }
    }

    let split: Vec<String> = by_thesaurus
        .iter()
        .filter(|(_, blocks)| blocks.len() > 1)
        .map(|(name, blocks)| format!("{name} at lines {}", lines(blocks)))
        .collect();

    if split.is_empty() {
        Outcome::Pass
    } else {
        Outcome::Fail(format!("Thesaurus split across keyword blocks: {}.", split.join("; ")))
    }
}

fn geographic_bounding_box(ctx: &ClauseContext<'_>) -> Outcome {
    if let Some(scope) = ctx.document.first("gmd:hierarchyLevel/gmd:MD_ScopeCode") {
        if codelist_value(scope) == Some("nonGeographicDataset") {
            return Outcome::Skip(format!(
                "{}record describes non-geographic data",
                scope.location()
            ));
        }
    }

    if ctx.document.exists(BOUNDING_BOX) {
        Outcome::Pass
    } else {
        Outcome::Fail("No gmd:EX_GeographicBoundingBox found.".into())
    }
}

fn global_exchange_scope(ctx: &ClauseContext<'_>) -> Outcome {
    debug!("checking whether the record describes data for global exchange");
    if !is_for_global_exchange(ctx.document) {
        return not_global();
    }

    let blocks = wmo_keyword_blocks(ctx.document, "WMO_DistributionScopeCode");
    if blocks.is_empty() {
        return Outcome::Fail(
            "GlobalExchange keyword is not taken from the WMO_DistributionScopeCode thesaurus.".into(),
        );
    }

    for block in blocks {
        for keyword_type in block.select("gmd:type/gmd:MD_KeywordTypeCode") {
            let value = codelist_value(keyword_type).unwrap_or_default();
            if value != "dataCentre" && value != "dataCenter" {
                return Outcome::Fail(format!(
                    "{}Invalid keyword type {value:?}.",
                    keyword_type.location()
                ));
            }
        }
        let values = keyword_values(&block.select("gmd:keyword"));
        if !values.contains(&"GlobalExchange") {
            return Outcome::Fail(format!(
                "{}Invalid keyword(s) ({}) found.",
                block.location(),
                values.join(", ")
            ));
        }
    }
    Outcome::Pass
}

fn global_file_identifier(ctx: &ClauseContext<'_>) -> Outcome {
    if !is_for_global_exchange(ctx.document) {
        return not_global();
    }

    let Some(element) = ctx.document.first("gmd:fileIdentifier/gco:CharacterString") else {
        return Outcome::Fail("No gmd:fileIdentifier found.".into());
    };
    let identifier = element.text().unwrap_or_default();
    if identifier.starts_with(GLOBAL_IDENTIFIER_PREFIX) {
        Outcome::Pass
    } else {
        Outcome::Fail(format!(
            "{}Invalid identifier ({identifier}).",
            element.location()
        ))
    }
}

/// Exactly one `otherConstraints` value must come from code list `list`.
fn single_constraint_from(ctx: &ClauseContext<'_>, list: &str) -> Outcome {
    if !is_for_global_exchange(ctx.document) {
        return not_global();
    }

    let constraints = ctx.document.select(OTHER_CONSTRAINTS);
    let codelists = ctx.reference.codelists();
    let count = constraints
        .iter()
        .filter(|c| {
            // An anchor counts once even when both its text and target match.
            string_or_anchor(c)
                .iter()
                .any(|v| codelists.contains(Authority::Wmo, list, v))
        })
        .count();

    match count {
        1 => Outcome::Pass,
        0 if constraints.is_empty() => Outcome::Fail("No gmd:otherConstraints found.".into()),
        n => Outcome::Fail(format!(
            "Found {n} {list} terms; please check constraints at lines {}.",
            lines(&constraints)
        )),
    }
}

fn global_data_licence(ctx: &ClauseContext<'_>) -> Outcome {
    single_constraint_from(ctx, "WMO_DataLicenseCode")
}

fn global_gts_priority(ctx: &ClauseContext<'_>) -> Outcome {
    single_constraint_from(ctx, "WMO_GTSProductCategoryCode")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse, DocumentKind};
    use crate::ets::{run_tests, SuiteVersion};
    use crate::reference::{CodeLists, ReferenceData};
    use crate::report::ClauseStatus;

    fn reference() -> ReferenceData {
        let mut lists = CodeLists::default();
        lists.insert(Authority::Wmo, "WMO_CategoryCode", ["weatherObservations"]);
        lists.insert(Authority::Wmo, "WMO_DataLicenseCode", ["WMOEssential", "WMOAdditional"]);
        lists.insert(Authority::Wmo, "WMO_GTSProductCategoryCode", ["GTSPriority2"]);
        ReferenceData::new().with_codelists(lists)
    }

    fn record(keywords: &str, constraints: &str) -> String {
        format!(
            r#"<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd"
                 xmlns:gco="http://www.isotc211.org/2005/gco"
                 xmlns:gmx="http://www.isotc211.org/2005/gmx"
                 xmlns:xlink="http://www.w3.org/1999/xlink">
  <gmd:fileIdentifier><gco:CharacterString>urn:x-wmo:md:int.wmo.wis::SMCA01KWBC</gco:CharacterString></gmd:fileIdentifier>
  <gmd:identificationInfo><gmd:MD_DataIdentification>
    {keywords}
    <gmd:resourceConstraints><gmd:MD_LegalConstraints>{constraints}</gmd:MD_LegalConstraints></gmd:resourceConstraints>
    <gmd:extent><gmd:EX_Extent><gmd:geographicElement><gmd:EX_GeographicBoundingBox/></gmd:geographicElement></gmd:EX_Extent></gmd:extent>
  </gmd:MD_DataIdentification></gmd:identificationInfo>
</gmd:MD_Metadata>"#
        )
    }

    const CATEGORY: &str = r#"<gmd:descriptiveKeywords><gmd:MD_Keywords>
      <gmd:keyword><gco:CharacterString>weatherObservations</gco:CharacterString></gmd:keyword>
      <gmd:type><gmd:MD_KeywordTypeCode codeListValue="theme">theme</gmd:MD_KeywordTypeCode></gmd:type>
      <gmd:thesaurusName><gmd:CI_Citation><gmd:title><gmx:Anchor xlink:href="http://wis.wmo.int/2012/codelists/WMOCodeLists.xml#WMO_CategoryCode">WMO_CategoryCode</gmx:Anchor></gmd:title></gmd:CI_Citation></gmd:thesaurusName>
    </gmd:MD_Keywords></gmd:descriptiveKeywords>"#;

    const SCOPE: &str = r#"<gmd:descriptiveKeywords><gmd:MD_Keywords>
      <gmd:keyword><gco:CharacterString>GlobalExchange</gco:CharacterString></gmd:keyword>
      <gmd:type><gmd:MD_KeywordTypeCode codeListValue="dataCentre">dataCentre</gmd:MD_KeywordTypeCode></gmd:type>
      <gmd:thesaurusName><gmd:CI_Citation><gmd:title><gco:CharacterString>WMO_DistributionScopeCode</gco:CharacterString></gmd:title></gmd:CI_Citation></gmd:thesaurusName>
    </gmd:MD_Keywords></gmd:descriptiveKeywords>"#;

    fn status(xml: &str, id: &str) -> ClauseStatus {
        let doc = parse(xml.as_bytes(), Some(DocumentKind::Legacy)).unwrap();
        let report = run_tests(&doc, SuiteVersion::Legacy, &reference()).unwrap();
        report.get(id).unwrap().status
    }

    #[test]
    fn regional_record_skips_global_clauses() {
        let xml = record(CATEGORY, "");
        for id in ["9.1.1", "9.2.1", "9.3.1", "9.3.2"] {
            assert_eq!(status(&xml, id), ClauseStatus::Skip, "{id}");
        }
        assert_eq!(status(&xml, "8.2.1"), ClauseStatus::Pass);
        assert_eq!(status(&xml, "8.2.2"), ClauseStatus::Pass);
        assert_eq!(status(&xml, "8.2.4"), ClauseStatus::Pass);
        assert_eq!(status(&xml, "6.3.1"), ClauseStatus::Skip);
    }

    #[test]
    fn global_record_needs_exactly_one_licence() {
        let constraints = r#"<gmd:otherConstraints><gco:CharacterString>WMOEssential</gco:CharacterString></gmd:otherConstraints>
            <gmd:otherConstraints><gco:CharacterString>GTSPriority2</gco:CharacterString></gmd:otherConstraints>"#;
        let xml = record(&format!("{CATEGORY}{SCOPE}"), constraints);
        for id in ["9.1.1", "9.2.1", "9.3.1", "9.3.2"] {
            assert_eq!(status(&xml, id), ClauseStatus::Pass, "{id}");
        }

        let doubled = r#"<gmd:otherConstraints><gco:CharacterString>WMOEssential</gco:CharacterString></gmd:otherConstraints>
            <gmd:otherConstraints><gco:CharacterString>WMOAdditional</gco:CharacterString></gmd:otherConstraints>"#;
        let xml = record(&format!("{CATEGORY}{SCOPE}"), doubled);
        assert_eq!(status(&xml, "9.3.1"), ClauseStatus::Fail);
        assert_eq!(status(&xml, "9.3.2"), ClauseStatus::Fail);
    }

    #[test]
    fn missing_category_block_fails_and_skips_dependents() {
        let xml = record("", "");
        assert_eq!(status(&xml, "8.2.1"), ClauseStatus::Fail);
        assert_eq!(status(&xml, "8.2.2"), ClauseStatus::Skip);
        assert_eq!(status(&xml, "8.2.3"), ClauseStatus::Skip);
    }

    #[test]
    fn duplicated_thesaurus_blocks_fail_grouping() {
        let xml = record(&format!("{CATEGORY}{CATEGORY}"), "");
        assert_eq!(status(&xml, "8.2.3"), ClauseStatus::Fail);
        assert_eq!(status(&xml, "8.2.1"), ClauseStatus::Pass);
    }

    #[test]
    fn default_namespace_is_prohibited() {
        let xml = r#"<MD_Metadata xmlns="http://www.isotc211.org/2005/gmd"/>"#;
        assert_eq!(status(xml, "6.2.1"), ClauseStatus::Fail);
        assert_eq!(status(xml, "8.1.1"), ClauseStatus::Fail);
    }
}
