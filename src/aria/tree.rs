//! Compact accessibility tree as exchanged with the model
//!
//! Wire form is positional JSON:
//! - `"text"` / `42` for untargetable leaf content
//! - `["img", name]` for images
//! - `[index, role, name]` or `[index, role, name, [children...]]` for addressable nodes

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Malformed accessibility tree JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized accessibility node: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AriaNode {
    Text(String),
    Number(serde_json::Number),
    Image(String),
    Composite {
        index: usize,
        role: String,
        name: String,
        children: Option<Vec<AriaNode>>,
    },
}

/// Flat view of one addressable node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRef<'a> {
    pub index: usize,
    pub role: &'a str,
    pub name: &'a str,
}

impl AriaNode {
    pub fn from_value(value: &Value) -> Result<Self, TreeError> {
        match value {
            Value::String(s) => Ok(AriaNode::Text(s.clone())),
            Value::Number(n) => Ok(AriaNode::Number(n.clone())),
            Value::Array(items) => match items.as_slice() {
                [Value::String(tag), Value::String(name)] if tag == "img" => {
                    Ok(AriaNode::Image(name.clone()))
                }
                [Value::Number(index), Value::String(role), Value::String(name), rest @ ..]
                    if rest.len() <= 1 =>
                {
                    let index = index
                        .as_u64()
                        .ok_or_else(|| TreeError::Malformed(value.to_string()))?
                        as usize;
                    let children = match rest.first() {
                        None => None,
                        Some(Value::Array(children)) => Some(
                            children
                                .iter()
                                .map(AriaNode::from_value)
                                .collect::<Result<Vec<_>, _>>()?,
                        ),
                        Some(_) => return Err(TreeError::Malformed(value.to_string())),
                    };
                    Ok(AriaNode::Composite {
                        index,
                        role: role.clone(),
                        name: name.clone(),
                        children,
                    })
                }
                _ => Err(TreeError::Malformed(value.to_string())),
            },
            other => Err(TreeError::Malformed(other.to_string())),
        }
    }

    /// All addressable nodes in pre-order
    pub fn composites(&self) -> Vec<CompositeRef<'_>> {
        let mut out = Vec::new();
        self.collect_composites(&mut out);
        out
    }

    fn collect_composites<'a>(&'a self, out: &mut Vec<CompositeRef<'a>>) {
        if let AriaNode::Composite {
            index,
            role,
            name,
            children,
        } = self
        {
            out.push(CompositeRef {
                index: *index,
                role,
                name,
            });
            for child in children.iter().flatten() {
                child.collect_composites(out);
            }
        }
    }
}

impl Serialize for AriaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AriaNode::Text(text) => serializer.serialize_str(text),
            AriaNode::Number(number) => number.serialize(serializer),
            AriaNode::Image(name) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("img")?;
                seq.serialize_element(name)?;
                seq.end()
            }
            AriaNode::Composite {
                index,
                role,
                name,
                children,
            } => {
                let len = if children.is_some() { 4 } else { 3 };
                let mut seq = serializer.serialize_seq(Some(len))?;
                seq.serialize_element(index)?;
                seq.serialize_element(role)?;
                seq.serialize_element(name)?;
                if let Some(children) = children {
                    seq.serialize_element(children)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for AriaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        AriaNode::from_value(&value).map_err(D::Error::custom)
    }
}

/// Serialize a whole tree; an empty extraction renders as `[]`
pub fn serialize_tree(root: Option<&AriaNode>) -> String {
    match root {
        Some(node) => serde_json::to_string(node).unwrap_or_else(|_| "[]".to_string()),
        None => "[]".to_string(),
    }
}

/// Parse a serialized tree produced by [`serialize_tree`]
pub fn parse_tree(serialized: &str) -> Result<Option<AriaNode>, TreeError> {
    let value: Value = serde_json::from_str(serialized)?;
    match &value {
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::Null => Ok(None),
        _ => AriaNode::from_value(&value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE: &str = r#"[0,"RootWebArea","Google",[[1,"link","Gmail"],[5,"combobox","Search"]]]"#;

    #[test]
    fn test_parse_and_reserialize_is_stable() {
        let root = parse_tree(GOOGLE).unwrap().unwrap();
        assert_eq!(serialize_tree(Some(&root)), GOOGLE);
    }

    #[test]
    fn test_composites_in_preorder() {
        let root = parse_tree(GOOGLE).unwrap().unwrap();
        let flat = root.composites();
        let indices: Vec<usize> = flat.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 5]);
        assert_eq!(flat[2].role, "combobox");
        assert_eq!(flat[2].name, "Search");
    }

    #[test]
    fn test_leaves_are_not_composites() {
        let json = r#"[0,"main","",["hello",7,["img","logo"],[1,"button","Go"]]]"#;
        let root = parse_tree(json).unwrap().unwrap();
        assert_eq!(root.composites().len(), 2);
        assert_eq!(serialize_tree(Some(&root)), json);
    }

    #[test]
    fn test_empty_tree() {
        assert!(parse_tree("[]").unwrap().is_none());
        assert_eq!(serialize_tree(None), "[]");
    }

    #[test]
    fn test_malformed_node_rejected() {
        assert!(matches!(
            parse_tree(r#"[0,"button"]"#),
            Err(TreeError::Malformed(_))
        ));
        assert!(parse_tree(r#"{"role":"button"}"#).is_err());
    }
}
