//! A2UI Component Nodes
//!
//! A screen is a single tree of [`ComponentNode`]s decoded from JSON:
//!
//! ```text
//! {
//!   "id": "root",
//!   "type": "column",
//!   "props": {"spacing": 8},
//!   "children": [
//!     {"id": "title", "type": "text", "props": {"text": "Hello"}}
//!   ]
//! }
//! ```
//!
//! Trees are immutable once built. Fields are private and the builder methods
//! consume the node, so a tree shared behind an `Arc` can only be read.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::error::ValidationError;
use super::registry::ElementType;
use super::value::UiValue;

/// Lenient props deserializer: treats `null` like a missing map.
fn lenient_props<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<String, UiValue>, D::Error> {
    Ok(Option::<HashMap<String, UiValue>>::deserialize(d)?.unwrap_or_default())
}

/// Lenient children deserializer: treats `null` like an empty list.
fn lenient_children<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ComponentNode>, D::Error> {
    Ok(Option::<Vec<ComponentNode>>::deserialize(d)?.unwrap_or_default())
}

/// A single UI node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    id: String,

    #[serde(rename = "type")]
    component_type: String,

    #[serde(
        default,
        deserialize_with = "lenient_props",
        skip_serializing_if = "HashMap::is_empty"
    )]
    props: HashMap<String, UiValue>,

    #[serde(
        default,
        deserialize_with = "lenient_children",
        skip_serializing_if = "Vec::is_empty"
    )]
    children: Vec<ComponentNode>,
}

impl ComponentNode {
    /// Create a leaf node with no props
    pub fn new(id: impl Into<String>, component_type: impl Into<String>) -> Self {
        ComponentNode {
            id: id.into(),
            component_type: component_type.into(),
            props: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<UiValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: ComponentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ComponentNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Decode a node from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Decode(e.to_string()))
    }

    /// Decode a node from an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Keys are strings and floats are already finite or null, so this cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw type tag as sent on the wire
    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    /// The catalogue element this node's tag selects, if any
    pub fn element_type(&self) -> Option<ElementType> {
        ElementType::from_tag(&self.component_type)
    }

    pub fn props(&self) -> &HashMap<String, UiValue> {
        &self.props
    }

    pub fn children(&self) -> &[ComponentNode] {
        &self.children
    }

    pub fn prop(&self, key: &str) -> Option<&UiValue> {
        self.props.get(key)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.prop(key).and_then(UiValue::as_str)
    }

    pub fn prop_i64(&self, key: &str) -> Option<i64> {
        self.prop(key).and_then(UiValue::as_i64)
    }

    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        self.prop(key).and_then(UiValue::as_f64)
    }

    pub fn prop_bool(&self, key: &str) -> Option<bool> {
        self.prop(key).and_then(UiValue::as_bool)
    }

    /// Find the first node with the given id, in pre-order.
    pub fn find(&self, id: &str) -> Option<&ComponentNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_node() {
        let json = r#"{"id":"t1","type":"text","props":{"text":"Hello"}}"#;
        let node = ComponentNode::from_json(json).unwrap();

        assert_eq!(node.id(), "t1");
        assert_eq!(node.component_type(), "text");
        assert_eq!(node.prop_str("text"), Some("Hello"));
        assert!(node.children().is_empty());
        assert_eq!(node.element_type(), Some(ElementType::Text));
    }

    #[test]
    fn test_parse_nested_node() {
        let json = r#"{
            "id": "root",
            "type": "column",
            "children": [
                {"id": "a", "type": "text", "props": {"text": "A"}},
                {"id": "b", "type": "button", "props": {"label": "Go", "primary": true},
                 "children": null}
            ]
        }"#;
        let node = ComponentNode::from_json(json).unwrap();

        assert_eq!(node.children().len(), 2);
        assert_eq!(node.children()[1].prop_bool("primary"), Some(true));
        assert!(node.props().is_empty());
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let json = r#"{"id":"t1","type":"text","props":{"text":"Hello}}"#;
        let err = ComponentNode::from_json(json).unwrap_err();
        assert!(matches!(err, ValidationError::Decode(_)));
    }

    #[test]
    fn test_missing_type_is_decode_error() {
        let err = ComponentNode::from_json(r#"{"id":"t1"}"#).unwrap_err();
        assert!(matches!(err, ValidationError::Decode(_)));
    }

    #[test]
    fn test_find() {
        let tree = ComponentNode::new("root", "column")
            .with_child(ComponentNode::new("card", "card").with_child(ComponentNode::new("deep", "text")))
            .with_child(ComponentNode::new("tail", "text"));

        assert_eq!(tree.find("deep").map(|n| n.component_type()), Some("text"));
        assert_eq!(tree.find("root").map(|n| n.id()), Some("root"));
        assert!(tree.find("missing").is_none());
    }

    #[test]
    fn test_json_round_trip_shape() {
        let node = ComponentNode::new("t1", "text").with_prop("text", "Hi");
        let value: serde_json::Value = serde_json::from_str(&node.to_json()).unwrap();
        assert_eq!(value, serde_json::json!({"id": "t1", "type": "text", "props": {"text": "Hi"}}));
    }
}
