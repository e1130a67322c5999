//! ISO 19139 XML → normalized tree.

use crate::error::{Error, Result};

use super::{path, Attribute, Detection, DocumentKind, NamespaceDecl, Node, Parsed};

const ROOT_ELEMENT: &str = "MD_Metadata";

pub(super) fn build(text: &str) -> Result<Parsed> {
    let doc = roxmltree::Document::parse(text).map_err(|e| Error::Parse {
        format: "XML",
        diagnostic: e.to_string(),
    })?;

    let root = doc.root_element();
    let gmd = path::namespace_uri("gmd");

    let detection = if root.tag_name().name() == ROOT_ELEMENT && root.tag_name().namespace() == gmd {
        Detection::Kind(DocumentKind::Legacy)
    } else {
        Detection::Unrecognized(format!(
            "root element {{{}}}{} is not gmd:{ROOT_ELEMENT}",
            root.tag_name().namespace().unwrap_or_default(),
            root.tag_name().name()
        ))
    };

    let namespaces = root
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect();

    Ok(Parsed {
        detection,
        root: convert(&doc, root),
        namespaces,
        json: None,
    })
}

fn convert(doc: &roxmltree::Document<'_>, element: roxmltree::Node<'_, '_>) -> Node {
    let mut node = Node::new(element.tag_name().name());
    node.namespace = element.tag_name().namespace().map(str::to_string);
    node.line = Some(doc.text_pos_at(element.range().start).row);
    node.attributes = element
        .attributes()
        .map(|a| Attribute {
            namespace: a.namespace().map(str::to_string),
            name: a.name().to_string(),
            value: a.value().to_string(),
        })
        .collect();

    let mut text = String::new();
    for child in element.children() {
        if child.is_element() {
            node.children.push(convert(doc, child));
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    if !text.is_empty() {
        node.text = Some(text.to_string());
    }

    node
}
