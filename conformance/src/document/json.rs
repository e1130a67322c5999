//! WCMP2 / GeoJSON → normalized tree.

use serde_json::Value;

use crate::error::{Error, Result};

use super::{Detection, DocumentKind, Node, Parsed};

/// Prefix shared by every WCMP2 conformance class URI.
pub(crate) const WCMP2_CLASS_PREFIX: &str = "http://wis.wmo.int/spec/wcmp/2";

pub(super) fn build(text: &str) -> Result<Parsed> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::Parse {
        format: "JSON",
        diagnostic: e.to_string(),
    })?;

    let detection = detect(&value);

    let mut root = Node::new("");
    match &value {
        Value::Object(members) => {
            for (key, member) in members {
                push_member(&mut root.children, key, member);
            }
        }
        other => push_member(&mut root.children, "", other),
    }

    Ok(Parsed {
        detection,
        root,
        namespaces: Vec::new(),
        json: Some(value),
    })
}

fn detect(value: &Value) -> Detection {
    let Some(object) = value.as_object() else {
        return Detection::Unrecognized("top-level JSON value is not an object".into());
    };

    let declares_wcmp2 = match object.get("conformsTo") {
        Some(Value::Array(classes)) => classes
            .iter()
            .filter_map(Value::as_str)
            .any(|c| c.starts_with(WCMP2_CLASS_PREFIX)),
        Some(Value::String(class)) => class.starts_with(WCMP2_CLASS_PREFIX),
        _ => false,
    };
    if declares_wcmp2 {
        return Detection::Kind(DocumentKind::Current);
    }

    let is_feature = object.get("type").and_then(Value::as_str) == Some("Feature");
    if is_feature && object.get("properties").map(Value::is_object).unwrap_or(false) {
        return Detection::Kind(DocumentKind::Current);
    }

    Detection::Unrecognized(
        "JSON record declares no WCMP2 conformance class and is not a GeoJSON Feature".into(),
    )
}

fn push_member(out: &mut Vec<Node>, key: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                push_member(out, key, item);
            }
        }
        Value::Object(members) => {
            let mut node = Node::new(key);
            for (name, member) in members {
                push_member(&mut node.children, name, member);
            }
            out.push(node);
        }
        scalar => {
            let mut node = Node::new(key);
            node.text = match scalar {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            };
            out.push(node);
        }
    }
}
