//! Reference data: code lists, the WCMP2 schema, the WIS2 topic hierarchy
//! and KPI weights.
//!
//! Reference data is loaded once, before any validation starts, and is
//! immutable afterwards. [`ReferenceData`] is the loaded snapshot handed to
//! [`crate::Engine`]; [`Bundle`] ties a snapshot to the directory it came
//! from and offers an explicit [`Bundle::reload`].
//!
//! # Bundle Layout
//!
//! | Path | Content |
//! |------|---------|
//! | `wcmp-1.3/WMOCodeLists.xml` | WMO code lists (gmx catalogue) |
//! | `wcmp-1.3/**/gmxCodelists.xml` | ISO code lists (gmx catalogue) |
//! | `wcmp-2/wcmp2-bundled.json` | WCMP2 JSON Schema (Draft 2020-12) |
//! | `codelists.json` | extra lists, `{authority: {list: [values]}}` |
//! | `wis2-topic-hierarchy/levels.json` | explicit level definition |
//! | `wis2-topic-hierarchy/all.json` | flat topic list, `{"topics": [..]}` |
//! | `kpi-weights.toml` | `[legacy]` / `[current]` indicator weights |
//!
//! Every file is optional; a suite that needs a missing list fails its
//! preflight with [`Error::ReferenceData`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ets::SuiteVersion;
use crate::topics::TopicHierarchyDefinition;

const WCMP1_DIR: &str = "wcmp-1.3";
const WMO_CODELISTS: &str = "WMOCodeLists.xml";
const ISO_CODELISTS: &str = "gmxCodelists.xml";
const WCMP2_DIR: &str = "wcmp-2";
const WCMP2_SCHEMA: &str = "wcmp2-bundled.json";
const JSON_CODELISTS: &str = "codelists.json";
const TOPIC_DIR: &str = "wis2-topic-hierarchy";
const TOPIC_LEVELS: &str = "levels.json";
const TOPIC_LIST: &str = "all.json";
const WEIGHTS: &str = "kpi-weights.toml";

/// Publisher of a code list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// WMO code lists used by WCMP 1.3.
    Wmo,
    /// ISO 19139 code lists.
    Iso,
    /// WCMP2 code lists.
    Wcmp2,
}

impl Authority {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Authority::Wmo => "wmo",
            Authority::Iso => "iso",
            Authority::Wcmp2 => "wcmp2",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named code lists grouped by authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeLists {
    lists: BTreeMap<Authority, BTreeMap<String, BTreeSet<String>>>,
}

impl CodeLists {
    /// Values of list `name` published by `authority`.
    #[must_use]
    pub fn get(&self, authority: Authority, name: &str) -> Option<&BTreeSet<String>> {
        self.lists.get(&authority).and_then(|lists| lists.get(name))
    }

    /// Whether the list exists and contains `value`.
    #[must_use]
    pub fn contains(&self, authority: Authority, name: &str, value: &str) -> bool {
        self.get(authority, name)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    /// Adds values to a list, creating it when needed.
    pub fn insert<I, S>(&mut self, authority: Authority, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .entry(authority)
            .or_default()
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Merges `other` into `self`, unioning lists of the same name.
    pub fn merge(&mut self, other: CodeLists) {
        for (authority, lists) in other.lists {
            for (name, values) in lists {
                self.insert(authority, name, values);
            }
        }
    }

    /// Number of lists across all authorities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.values().map(BTreeMap::len).sum()
    }

    /// Whether no list is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List names per authority.
    pub fn names(&self) -> impl Iterator<Item = (Authority, &str)> {
        self.lists
            .iter()
            .flat_map(|(a, lists)| lists.keys().map(move |name| (*a, name.as_str())))
    }

    /// Parses a gmx code list catalogue: every `CodeListDictionary` becomes
    /// a list named by its `gml:id`, holding the `gml:identifier` of each
    /// `CodeDefinition`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] if `xml` is not well-formed.
    pub fn from_gmx(authority: Authority, xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| Error::reference(format!("{authority} code list catalogue: {e}")))?;

        let mut codelists = CodeLists::default();
        for dictionary in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name().ends_with("CodeListDictionary"))
        {
            let Some(id) = dictionary
                .attributes()
                .find(|a| a.name() == "id")
                .map(|a| a.value().to_string())
            else {
                warn!(%authority, "code list dictionary without gml:id ignored");
                continue;
            };

            let values = dictionary
                .children()
                .filter(|n| n.has_tag_name("codeEntry"))
                .flat_map(|entry| entry.children().filter(|n| n.tag_name().name().ends_with("CodeDefinition")))
                .flat_map(|definition| definition.children().filter(|n| n.has_tag_name("identifier")))
                .filter_map(|identifier| identifier.text())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>();

            debug!(%authority, list = %id, entries = values.len(), "loaded code list");
            codelists.insert(authority, id, values);
        }

        Ok(codelists)
    }
}

/// Per-suite indicator weights. Missing entries weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightTable {
    /// Weights of WCMP 1.3 indicators, keyed by `kpi_NNN`.
    #[serde(default)]
    pub legacy: BTreeMap<String, f64>,
    /// Weights of WCMP2 indicators, keyed by `kpi_NNN`.
    #[serde(default)]
    pub current: BTreeMap<String, f64>,
}

impl WeightTable {
    /// Parses and checks a TOML weight table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] on malformed TOML or on a negative or
    /// non-finite weight.
    pub fn from_toml(text: &str) -> Result<Self> {
        let table: WeightTable =
            toml::from_str(text).map_err(|e| Error::reference(format!("{WEIGHTS}: {e}")))?;
        table.check()?;
        Ok(table)
    }

    /// Weight of `indicator` in `suite`.
    #[must_use]
    pub fn weight(&self, suite: SuiteVersion, indicator: &str) -> f64 {
        let table = match suite {
            SuiteVersion::Legacy => &self.legacy,
            SuiteVersion::Current => &self.current,
        };
        table.get(indicator).copied().unwrap_or(1.0)
    }

    fn check(&self) -> Result<()> {
        for (section, table) in [("legacy", &self.legacy), ("current", &self.current)] {
            for (id, weight) in table {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(Error::reference(format!(
                        "{WEIGHTS}: weight of [{section}] {id} must be a finite non-negative number, got {weight}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The authoritative WCMP2 record schema, compiled once.
#[derive(Clone)]
pub struct Wcmp2Schema {
    source: Arc<Value>,
    validator: Arc<jsonschema::Validator>,
}

impl Wcmp2Schema {
    /// Compiles `schema` as a Draft 2020-12 JSON Schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] if `schema` is not a valid schema.
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(schema)
            .map_err(|e| Error::reference(format!("{WCMP2_SCHEMA}: {e}")))?;
        Ok(Self {
            source: Arc::new(schema.clone()),
            validator: Arc::new(validator),
        })
    }

    /// The schema document.
    #[must_use]
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Every violation found in `record`, as `<instance path>: <message>`.
    /// Empty when the record is valid.
    #[must_use]
    pub fn violations(&self, record: &Value) -> Vec<String> {
        self.validator
            .iter_errors(record)
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "$".to_string() } else { format!("${path}") };
                format!("{path}: {error}")
            })
            .collect()
    }
}

impl fmt::Debug for Wcmp2Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wcmp2Schema")
            .field("id", &self.source.get("$id"))
            .finish_non_exhaustive()
    }
}

impl PartialEq for Wcmp2Schema {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Something a test suite needs from the reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// A named code list.
    CodeList(Authority, &'static str),
    /// The WIS2 topic hierarchy.
    TopicHierarchy,
    /// The WCMP2 JSON Schema.
    Schema,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::CodeList(authority, name) => write!(f, "{authority} code list {name}"),
            Requirement::TopicHierarchy => f.write_str("WIS2 topic hierarchy"),
            Requirement::Schema => f.write_str("WCMP2 schema"),
        }
    }
}

/// Immutable reference data shared by every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    codelists: CodeLists,
    schema: Option<Wcmp2Schema>,
    topics: Option<TopicHierarchyDefinition>,
    weights: WeightTable,
}

impl ReferenceData {
    /// Empty reference data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the code lists.
    #[must_use]
    pub fn with_codelists(mut self, codelists: CodeLists) -> Self {
        self.codelists = codelists;
        self
    }

    /// Replaces the WCMP2 schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Wcmp2Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Replaces the topic hierarchy.
    #[must_use]
    pub fn with_topics(mut self, topics: TopicHierarchyDefinition) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Replaces the weight table.
    #[must_use]
    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = weights;
        self
    }

    /// Loaded code lists.
    #[must_use]
    pub fn codelists(&self) -> &CodeLists {
        &self.codelists
    }

    /// Loaded WCMP2 schema, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&Wcmp2Schema> {
        self.schema.as_ref()
    }

    /// Loaded topic hierarchy, if any.
    #[must_use]
    pub fn topics(&self) -> Option<&TopicHierarchyDefinition> {
        self.topics.as_ref()
    }

    /// Loaded KPI weights.
    #[must_use]
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Whether `requirement` is satisfied.
    #[must_use]
    pub fn provides(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::CodeList(authority, name) => self.codelists.get(authority, name).is_some(),
            Requirement::TopicHierarchy => self.topics.is_some(),
            Requirement::Schema => self.schema.is_some(),
        }
    }

    /// Checks every requirement, reporting all gaps at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] naming each missing item.
    pub fn require(&self, requirements: &[Requirement]) -> Result<()> {
        let missing: Vec<String> = requirements
            .iter()
            .filter(|r| !self.provides(**r))
            .map(ToString::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::reference(format!("missing {}", missing.join(", "))))
        }
    }

    /// Loads reference data from a bundle directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceData`] if the directory does not exist or a
    /// present file cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::reference(format!(
                "bundle directory {} does not exist",
                root.display()
            )));
        }

        let mut codelists = CodeLists::default();

        let wmo = root.join(WCMP1_DIR).join(WMO_CODELISTS);
        if wmo.is_file() {
            codelists.merge(CodeLists::from_gmx(Authority::Wmo, &read(&wmo)?)?);
        }

        if let Some(iso) = find_file(&root.join(WCMP1_DIR), ISO_CODELISTS) {
            codelists.merge(CodeLists::from_gmx(Authority::Iso, &read(&iso)?)?);
        }

        let json = root.join(JSON_CODELISTS);
        if json.is_file() {
            let extra: CodeLists = serde_json::from_str(&read(&json)?)
                .map_err(|e| Error::reference(format!("{}: {e}", json.display())))?;
            codelists.merge(extra);
        }

        let schema_path = root.join(WCMP2_DIR).join(WCMP2_SCHEMA);
        let schema = if schema_path.is_file() {
            let value: Value = serde_json::from_str(&read(&schema_path)?)
                .map_err(|e| Error::reference(format!("{}: {e}", schema_path.display())))?;
            Some(Wcmp2Schema::new(&value)?)
        } else {
            None
        };

        let topics = load_topics(&root.join(TOPIC_DIR))?;

        let weights_path = root.join(WEIGHTS);
        let weights = if weights_path.is_file() {
            WeightTable::from_toml(&read(&weights_path)?)?
        } else {
            WeightTable::default()
        };

        info!(
            bundle = %root.display(),
            codelists = codelists.len(),
            schema = schema.is_some(),
            topic_levels = topics.as_ref().map(TopicHierarchyDefinition::depth).unwrap_or(0),
            "loaded reference data"
        );

        Ok(Self {
            codelists,
            schema,
            topics,
            weights,
        })
    }
}

#[derive(Deserialize)]
struct TopicList {
    topics: Vec<String>,
}

fn load_topics(dir: &Path) -> Result<Option<TopicHierarchyDefinition>> {
    let levels = dir.join(TOPIC_LEVELS);
    if levels.is_file() {
        let definition = serde_json::from_str(&read(&levels)?)
            .map_err(|e| Error::reference(format!("{}: {e}", levels.display())))?;
        return Ok(Some(definition));
    }

    let list = dir.join(TOPIC_LIST);
    if list.is_file() {
        let list: TopicList = serde_json::from_str(&read(&list)?)
            .map_err(|e| Error::reference(format!("{}: {e}", list.display())))?;
        return Ok(Some(TopicHierarchyDefinition::from_topics(&list.topics)));
    }

    Ok(None)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::reference(format!("cannot read {}: {e}", path.display())))
}

/// First file named `name` below `dir`, in sorted walk order.
fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == name)
        .map(|e| e.into_path())
}

/// A reference-data bundle on disk and its current snapshot.
#[derive(Debug, Clone)]
pub struct Bundle {
    root: PathBuf,
    data: Arc<ReferenceData>,
}

impl Bundle {
    /// Loads the bundle at `root`.
    ///
    /// # Errors
    ///
    /// See [`ReferenceData::load`].
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data = Arc::new(ReferenceData::load(&root)?);
        Ok(Self { root, data })
    }

    /// Bundle directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current snapshot.
    #[must_use]
    pub fn data(&self) -> Arc<ReferenceData> {
        Arc::clone(&self.data)
    }

    /// Re-reads the bundle directory. Snapshots handed out earlier keep their
    /// contents; on error the current snapshot is left in place.
    ///
    /// # Errors
    ///
    /// See [`ReferenceData::load`].
    pub fn reload(&mut self) -> Result<()> {
        let data = ReferenceData::load(&self.root)?;
        self.data = Arc::new(data);
        info!(bundle = %self.root.display(), "reloaded reference data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOGUE: &str = r#"<?xml version="1.0"?>
<gmx:CT_CodelistCatalogue xmlns:gmx="http://www.isotc211.org/2005/gmx"
                          xmlns:gml="http://www.opengis.net/gml/3.2">
  <gmx:codelistItem>
    <gmx:CodeListDictionary gml:id="WMO_DataLicenseCode">
      <gml:identifier codeSpace="WMO">WMO_DataLicenseCode</gml:identifier>
      <gmx:codeEntry><gmx:CodeDefinition gml:id="WMO_DataLicenseCode_WMOEssential">
        <gml:identifier codeSpace="WMO">WMOEssential</gml:identifier>
      </gmx:CodeDefinition></gmx:codeEntry>
      <gmx:codeEntry><gmx:CodeDefinition gml:id="WMO_DataLicenseCode_WMOAdditional">
        <gml:identifier codeSpace="WMO">WMOAdditional</gml:identifier>
      </gmx:CodeDefinition></gmx:codeEntry>
    </gmx:CodeListDictionary>
  </gmx:codelistItem>
</gmx:CT_CodelistCatalogue>"#;

    #[test]
    fn parses_gmx_dictionaries() {
        let lists = CodeLists::from_gmx(Authority::Wmo, CATALOGUE).unwrap();
        assert_eq!(lists.len(), 1);
        let values = lists.get(Authority::Wmo, "WMO_DataLicenseCode").unwrap();
        assert_eq!(values.len(), 2);
        assert!(lists.contains(Authority::Wmo, "WMO_DataLicenseCode", "WMOEssential"));
        // The dictionary's own identifier is not an entry.
        assert!(!lists.contains(Authority::Wmo, "WMO_DataLicenseCode", "WMO_DataLicenseCode"));
        assert!(!lists.contains(Authority::Iso, "WMO_DataLicenseCode", "WMOEssential"));
    }

    #[test]
    fn rejects_malformed_catalogue() {
        assert!(matches!(
            CodeLists::from_gmx(Authority::Iso, "<gmx:CT_CodelistCatalogue"),
            Err(Error::ReferenceData(_))
        ));
    }

    #[test]
    fn weights_default_to_one_and_must_be_non_negative() {
        let table = WeightTable::from_toml("[current]\nkpi_002 = 2.5\n").unwrap();
        assert_eq!(table.weight(SuiteVersion::Current, "kpi_002"), 2.5);
        assert_eq!(table.weight(SuiteVersion::Current, "kpi_003"), 1.0);
        assert_eq!(table.weight(SuiteVersion::Legacy, "kpi_002"), 1.0);

        assert!(WeightTable::from_toml("[legacy]\nkpi_001 = -1.0\n").is_err());
        assert!(WeightTable::from_toml("[other]\nkpi_001 = 1.0\n").is_err());
    }

    #[test]
    fn require_names_every_gap() {
        let data = ReferenceData::new();
        let err = data
            .require(&[
                Requirement::CodeList(Authority::Wmo, "WMO_CategoryCode"),
                Requirement::TopicHierarchy,
            ])
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("wmo code list WMO_CategoryCode"));
        assert!(message.contains("WIS2 topic hierarchy"));
        assert!(data.require(&[]).is_ok());
    }

    #[test]
    fn schema_lists_every_violation() {
        let schema = Wcmp2Schema::new(&serde_json::json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["id", "links"],
            "properties": {"links": {"type": "array", "minItems": 1}}
        }))
        .unwrap();

        assert!(schema.violations(&serde_json::json!({"id": "a", "links": [{}]})).is_empty());

        let violations = schema.violations(&serde_json::json!({"links": []}));
        assert_eq!(violations.len(), 2, "{violations:?}");
        assert!(violations.iter().any(|v| v.starts_with("$: ") && v.contains("id")));
        assert!(violations.iter().any(|v| v.starts_with("$/links: ")));
    }

    #[test]
    fn invalid_schema_is_reference_error() {
        let result = Wcmp2Schema::new(&serde_json::json!({"type": 12}));
        assert!(matches!(result, Err(Error::ReferenceData(_))));
    }

    #[test]
    fn missing_bundle_directory_is_reference_error() {
        assert!(matches!(
            ReferenceData::load(Path::new("/nonexistent/wcmp-bundle")),
            Err(Error::ReferenceData(_))
        ));
    }
}
