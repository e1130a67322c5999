//! Document model adapter.
//!
//! Turns raw metadata bytes into a [`NormalizedDocument`]: an immutable tree
//! of [`Node`]s that both test suites and the KPI engine query through the
//! same path language (see [`path`]). XML records (WCMP 1.3, ISO 19139) and
//! JSON records (WCMP2, GeoJSON) map onto the same node shape:
//!
//! | Source | Node name | Text | Children |
//! |--------|-----------|------|----------|
//! | XML element | local name (+ namespace) | trimmed direct text | child elements |
//! | JSON object member | key | - | members |
//! | JSON array member | key, repeated per item | - | item members |
//! | JSON scalar | key | string form (`null` has none) | - |

pub mod path;
mod json;
mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use path::Path;

/// The two metadata profiles the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// WMO Core Metadata Profile 1.3: ISO 19139 XML rooted at `gmd:MD_Metadata`.
    Legacy,
    /// WMO Core Metadata Profile 2: GeoJSON record with a WCMP2 `conformsTo`.
    Current,
}

impl DocumentKind {
    /// Short lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Legacy => "legacy",
            DocumentKind::Current => "current",
        }
    }

    fn format(self) -> Format {
        match self {
            DocumentKind::Legacy => Format::Xml,
            DocumentKind::Current => Format::Json,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "wcmp1" | "wcmp-1.3" | "xml" => Ok(DocumentKind::Legacy),
            "current" | "wcmp2" | "wcmp-2" | "json" => Ok(DocumentKind::Current),
            other => Err(format!("unknown document kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Xml,
    Json,
}

impl Format {
    fn name(self) -> &'static str {
        match self {
            Format::Xml => "XML",
            Format::Json => "JSON",
        }
    }

    /// Guesses the format from the first significant byte.
    fn sniff(raw: &[u8]) -> Option<Format> {
        let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
        match raw.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Some(Format::Xml),
            Some(b'{') | Some(b'[') => Some(Format::Json),
            _ => None,
        }
    }
}

/// Outcome of the structural kind check performed by the format builders.
pub(crate) enum Detection {
    Kind(DocumentKind),
    Unrecognized(String),
}

/// Intermediate result of a format builder.
pub(crate) struct Parsed {
    detection: Detection,
    root: Node,
    namespaces: Vec<NamespaceDecl>,
    json: Option<serde_json::Value>,
}

/// An attribute of an XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    namespace: Option<String>,
    name: String,
    value: String,
}

/// A namespace declared on the document's root element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceDecl {
    /// Declared prefix; `None` for a default namespace.
    pub prefix: Option<String>,
    /// Namespace URI.
    pub uri: String,
}

/// A node of the normalized tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    namespace: Option<String>,
    text: Option<String>,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
    line: Option<u32>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            text: None,
            attributes: Vec::new(),
            children: Vec::new(),
            line: None,
        }
    }

    /// Local name (XML) or member key (JSON).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace URI of an XML element.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Text content, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// 1-based source line for XML elements.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Child nodes in document order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Returns an attribute value by (optionally prefixed) name.
    #[must_use]
    pub fn attribute(&self, qname: &str) -> Option<&str> {
        let (namespace, local) = match qname.split_once(':') {
            Some((prefix, local)) => match path::namespace_uri(prefix) {
                Some(uri) => (Some(uri), local),
                None => return None,
            },
            None => (None, qname),
        };
        self.attributes
            .iter()
            .find(|a| a.name == local && a.namespace.as_deref() == namespace)
            .map(|a| a.value.as_str())
    }

    /// Whether the node's name is `qname` (`prefix:local` for namespaced
    /// elements, the literal key otherwise).
    #[must_use]
    pub fn has_name(&self, qname: &str) -> bool {
        match &self.namespace {
            Some(uri) => match qname.split_once(':') {
                Some((prefix, local)) => {
                    local == self.name && path::namespace_uri(prefix) == Some(uri.as_str())
                }
                None => false,
            },
            None => qname == self.name,
        }
    }

    /// Nodes selected by `expr`, relative to this node.
    #[must_use]
    pub fn select(&self, expr: &str) -> Vec<&Node> {
        match compile(expr) {
            Some(path) => path.select(self),
            None => Vec::new(),
        }
    }

    /// First node selected by `expr`.
    #[must_use]
    pub fn first(&self, expr: &str) -> Option<&Node> {
        self.select(expr).into_iter().next()
    }

    /// Every value selected by `expr` (attribute values for `@` paths, node
    /// text otherwise; nodes without text are skipped).
    #[must_use]
    pub fn values(&self, expr: &str) -> Vec<&str> {
        match compile(expr) {
            Some(path) => path.values(self),
            None => Vec::new(),
        }
    }

    /// First value selected by `expr`.
    #[must_use]
    pub fn value(&self, expr: &str) -> Option<&str> {
        self.values(expr).into_iter().next()
    }

    /// Whether `expr` selects anything (an attribute value for `@` paths).
    #[must_use]
    pub fn exists(&self, expr: &str) -> bool {
        match compile(expr) {
            Some(path) if path.selects_attribute() => !path.values(self).is_empty(),
            Some(path) => !path.select(self).is_empty(),
            None => false,
        }
    }

    /// Human-readable location prefix for messages (`"Line 12: "`), empty for
    /// JSON nodes.
    #[must_use]
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("Line {line}: "),
            None => String::new(),
        }
    }
}

fn compile(expr: &str) -> Option<Path> {
    let path = Path::parse(expr);
    if path.is_none() {
        warn!(path = expr, "malformed path expression");
    }
    path
}

/// An immutable, queryable metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    kind: DocumentKind,
    root: Node,
    namespaces: Vec<NamespaceDecl>,
    json: Option<serde_json::Value>,
}

impl NormalizedDocument {
    /// Profile the record belongs to.
    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Root node (the `MD_Metadata` element, or the top-level JSON object).
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Namespaces declared on the XML root element (empty for JSON).
    #[must_use]
    pub fn namespaces(&self) -> &[NamespaceDecl] {
        &self.namespaces
    }

    /// The record as parsed JSON, for schema validation (`None` for XML).
    #[must_use]
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    /// URI declared for `prefix` on the root element (`None` prefix = default
    /// namespace).
    #[must_use]
    pub fn declared_namespace(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|ns| ns.prefix.as_deref() == prefix)
            .map(|ns| ns.uri.as_str())
    }

    /// Record identifier (`gmd:fileIdentifier` or the GeoJSON `id`).
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self.kind {
            DocumentKind::Legacy => self.value("gmd:fileIdentifier/gco:CharacterString"),
            DocumentKind::Current => self.value("id"),
        }
    }

    /// See [`Node::select`].
    #[must_use]
    pub fn select(&self, expr: &str) -> Vec<&Node> {
        self.root.select(expr)
    }

    /// See [`Node::first`].
    #[must_use]
    pub fn first(&self, expr: &str) -> Option<&Node> {
        self.root.first(expr)
    }

    /// See [`Node::values`].
    #[must_use]
    pub fn values(&self, expr: &str) -> Vec<&str> {
        self.root.values(expr)
    }

    /// See [`Node::value`].
    #[must_use]
    pub fn value(&self, expr: &str) -> Option<&str> {
        self.root.value(expr)
    }

    /// See [`Node::exists`].
    #[must_use]
    pub fn exists(&self, expr: &str) -> bool {
        self.root.exists(expr)
    }
}

/// Parses a raw record into a [`NormalizedDocument`].
///
/// When `declared` is `None` the kind is detected from the root element
/// (XML) or from the `conformsTo` / `type` members (JSON).
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed input or input whose format
/// contradicts `declared`, and [`Error::UnknownDocumentKind`] when no kind
/// is declared and none can be detected.
pub fn parse(raw: &[u8], declared: Option<DocumentKind>) -> Result<NormalizedDocument> {
    let format = match (Format::sniff(raw), declared) {
        (Some(format), _) => format,
        (None, Some(kind)) => kind.format(),
        (None, None) => {
            return Err(Error::UnknownDocumentKind(
                "input is neither an XML nor a JSON document".into(),
            ))
        }
    };

    if let Some(kind) = declared {
        if kind.format() != format {
            return Err(Error::Parse {
                format: format.name(),
                diagnostic: format!(
                    "a {kind} record must be {}, found {}",
                    kind.format().name(),
                    format.name()
                ),
            });
        }
    }

    let text = std::str::from_utf8(raw).map_err(|e| Error::Parse {
        format: format.name(),
        diagnostic: format!("input is not valid UTF-8: {e}"),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let parsed = match format {
        Format::Xml => xml::build(text)?,
        Format::Json => json::build(text)?,
    };

    let kind = match (parsed.detection, declared) {
        (Detection::Kind(detected), None) => detected,
        (Detection::Kind(detected), Some(kind)) if detected == kind => kind,
        (Detection::Kind(detected), Some(kind)) => {
            return Err(Error::Parse {
                format: format.name(),
                diagnostic: format!("document is a {detected} record, not {kind}"),
            })
        }
        (Detection::Unrecognized(reason), Some(kind)) => {
            debug!(%reason, "accepting declared kind {kind}");
            kind
        }
        (Detection::Unrecognized(reason), None) => return Err(Error::UnknownDocumentKind(reason)),
    };

    debug!(%kind, "parsed {} document", format.name());

    Ok(NormalizedDocument {
        kind,
        root: parsed.root,
        namespaces: parsed.namespaces,
        json: parsed.json,
    })
}
