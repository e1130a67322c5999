//! Path query language shared by XML and JSON documents.
//!
//! Grammar:
//!
//! ```text
//! path      := ["//"] step ( ("/" | "//") step )* [ "/@" attribute ]
//! step      := "*" | name | prefix ":" name
//! attribute := name | prefix ":" name
//! ```
//!
//! Paths are evaluated relative to a context node. A leading `//` selects
//! matching nodes anywhere at or below the context node; an inner `//`
//! selects descendants of the previous step. Prefixed names are resolved
//! through [`NAMESPACES`] when the node carries a namespace (XML) and are
//! compared literally otherwise (JSON keys such as `wmo:dataPolicy`).

use std::collections::HashSet;

use super::Node;

/// Namespace prefixes understood by the query language.
pub const NAMESPACES: &[(&str, &str)] = &[
    ("gco", "http://www.isotc211.org/2005/gco"),
    ("gmd", "http://www.isotc211.org/2005/gmd"),
    ("gmi", "http://www.isotc211.org/2005/gmi"),
    ("gml", "http://www.opengis.net/gml/3.2"),
    ("gmx", "http://www.isotc211.org/2005/gmx"),
    ("srv", "http://www.isotc211.org/2005/srv"),
    ("xlink", "http://www.w3.org/1999/xlink"),
];

/// Returns the namespace URI bound to `prefix`, if the prefix is known.
#[must_use]
pub fn namespace_uri(prefix: &str) -> Option<&'static str> {
    NAMESPACES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, uri)| *uri)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: Option<String>,
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Path {
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl Path {
    /// Compiles `expr`, returning `None` when it is malformed.
    pub(crate) fn parse(expr: &str) -> Option<Path> {
        let expr = expr.trim();
        let mut steps = Vec::new();
        let mut attribute = None;

        if expr.is_empty() {
            return Some(Path { steps, attribute });
        }

        let (mut pending, body) = match expr.strip_prefix("//") {
            Some(rest) => (Axis::DescendantOrSelf, rest),
            None if expr.starts_with('/') => return None,
            None => (Axis::Child, expr),
        };

        let segments: Vec<&str> = body.split('/').collect();
        let last = segments.len() - 1;

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                // `a//b`: the empty segment switches the next step's axis.
                if pending != Axis::Child || i == last {
                    return None;
                }
                pending = Axis::Descendant;
                continue;
            }

            if let Some(name) = segment.strip_prefix('@') {
                if i != last || name.is_empty() || pending != Axis::Child {
                    return None;
                }
                attribute = Some(name.to_string());
                continue;
            }

            if segment.contains(['[', ']', '@', ' ']) {
                return None;
            }

            let name = (*segment != "*").then(|| segment.to_string());
            steps.push(Step {
                axis: pending,
                name,
            });
            pending = Axis::Child;
        }

        Some(Path { steps, attribute })
    }

    /// Returns the nodes selected by the element steps.
    pub(crate) fn select<'a>(&self, context: &'a Node) -> Vec<&'a Node> {
        let mut current: Vec<&'a Node> = vec![context];

        for step in &self.steps {
            let mut next: Vec<&'a Node> = Vec::new();
            for node in &current {
                match step.axis {
                    Axis::Child => next.extend(
                        node.children
                            .iter()
                            .filter(|child| step.matches(child)),
                    ),
                    Axis::Descendant => collect_descendants(node, step, false, &mut next),
                    Axis::DescendantOrSelf => collect_descendants(node, step, true, &mut next),
                }
            }
            dedup(&mut next);
            current = next;
        }

        current
    }

    /// Returns the values selected by the path: attribute values when the
    /// path ends in `@name`, otherwise the text of every selected node that
    /// has one.
    pub(crate) fn values<'a>(&self, context: &'a Node) -> Vec<&'a str> {
        let nodes = self.select(context);
        match &self.attribute {
            Some(attribute) => nodes
                .into_iter()
                .filter_map(|node| node.attribute(attribute))
                .collect(),
            None => nodes.into_iter().filter_map(Node::text).collect(),
        }
    }

    /// Whether the path ends in an attribute step.
    pub(crate) fn selects_attribute(&self) -> bool {
        self.attribute.is_some()
    }
}

impl Step {
    fn matches(&self, node: &Node) -> bool {
        match &self.name {
            None => true,
            Some(name) => node.has_name(name),
        }
    }
}

fn collect_descendants<'a>(node: &'a Node, step: &Step, include_self: bool, out: &mut Vec<&'a Node>) {
    if include_self && step.matches(node) {
        out.push(node);
    }
    for child in &node.children {
        collect_descendants(child, step, true, out);
    }
}

fn dedup(nodes: &mut Vec<&Node>) {
    let mut seen: HashSet<*const Node> = HashSet::new();
    nodes.retain(|node| seen.insert(*node as *const Node));
}
