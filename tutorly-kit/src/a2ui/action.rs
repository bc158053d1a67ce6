//! A2UI Actions
//!
//! Actions are produced by user input (a tap on a button) or by the system,
//! and reference the component they came from by id only.
//!
//! # Wire format
//!
//! ```text
//! {
//!   "actionId": "open-lesson",
//!   "componentId": "lesson-card-3",
//!   "actionType": "navigate",
//!   "params": {"screenId": "lesson-3"},
//!   "priority": "high"
//! }
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::node::ComponentNode;
use super::value::UiValue;

/// Processing tier; higher tiers are always served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Normal,
    High,
}

impl ActionPriority {
    pub fn name(&self) -> &'static str {
        match self {
            ActionPriority::Low => "low",
            ActionPriority::Normal => "normal",
            ActionPriority::High => "high",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "low" => Some(ActionPriority::Low),
            "normal" => Some(ActionPriority::Normal),
            "high" => Some(ActionPriority::High),
            _ => None,
        }
    }
}

/// What kind of work an action asks for; selects the handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    /// Load another screen
    Navigate,
    /// Local UI state change such as a toggle
    UiInteraction,
    /// Fire-and-forget work that nobody is waiting on
    BackgroundTask,
    /// Anything else, keyed by its tag
    Custom(String),
}

impl ActionType {
    pub fn tag(&self) -> &str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::UiInteraction => "ui-interaction",
            ActionType::BackgroundTask => "background-task",
            ActionType::Custom(tag) => tag,
        }
    }

    /// Parse a tag; unknown tags become [`ActionType::Custom`].
    pub fn from_tag(tag: &str) -> Self {
        let normalized: String = tag
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "navigate" | "navigation" => ActionType::Navigate,
            "uiinteraction" => ActionType::UiInteraction,
            "backgroundtask" => ActionType::BackgroundTask,
            _ => ActionType::Custom(tag.to_string()),
        }
    }

    /// Priority used when an action does not carry one
    pub fn default_priority(&self) -> ActionPriority {
        match self {
            ActionType::Navigate => ActionPriority::High,
            ActionType::UiInteraction | ActionType::Custom(_) => ActionPriority::Normal,
            ActionType::BackgroundTask => ActionPriority::Low,
        }
    }
}

impl From<String> for ActionType {
    fn from(tag: String) -> Self {
        ActionType::from_tag(&tag)
    }
}

impl From<ActionType> for String {
    fn from(action_type: ActionType) -> Self {
        action_type.tag().to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single request to run a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Identifies the intended handler; opaque to the runtime
    pub action_id: String,

    /// Id of the originating component, for lookup only
    pub component_id: String,

    pub action_type: ActionType,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, UiValue>,

    /// Explicit priority; derived from the action type when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ActionPriority>,
}

impl Action {
    pub fn new(
        action_id: impl Into<String>,
        component_id: impl Into<String>,
        action_type: ActionType,
    ) -> Self {
        Action {
            action_id: action_id.into(),
            component_id: component_id.into(),
            action_type,
            params: IndexMap::new(),
            priority: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<UiValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Effective priority
    pub fn priority(&self) -> ActionPriority {
        self.priority
            .unwrap_or_else(|| self.action_type.default_priority())
    }

    pub fn param(&self, key: &str) -> Option<&UiValue> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(UiValue::as_str)
    }

    /// Decode an action payload
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Decode(e.to_string()))
    }
}

/// The action a component declares in its `action` prop.
///
/// Either a bare action id (`"action": "toggle-hints"`, treated as a UI
/// interaction) or an object:
///
/// ```text
/// "action": {
///   "actionId": "open-lesson",
///   "actionType": "navigate",
///   "params": {"screenId": "lesson-3"},
///   "priority": "high"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBinding {
    pub action_id: String,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, UiValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<ActionPriority>,
}

impl ActionBinding {
    /// Read the binding from a node's `action` prop.
    ///
    /// Malformed bindings read as absent rather than failing.
    pub fn from_node(node: &ComponentNode) -> Option<Self> {
        Self::from_value(node.prop("action")?)
    }

    pub fn from_value(value: &UiValue) -> Option<Self> {
        if let Some(action_id) = value.as_str() {
            return Some(ActionBinding {
                action_id: action_id.to_string(),
                action_type: ActionType::UiInteraction,
                params: IndexMap::new(),
                priority: None,
            });
        }

        let action_id = value.get("actionId").and_then(UiValue::as_str)?;
        let action_type = value
            .get("actionType")
            .and_then(UiValue::as_str)
            .map(ActionType::from_tag)
            .unwrap_or(ActionType::UiInteraction);
        let params = value
            .get("params")
            .and_then(UiValue::as_object)
            .cloned()
            .unwrap_or_default();
        let priority = value
            .get("priority")
            .and_then(UiValue::as_str)
            .and_then(ActionPriority::from_name);

        Some(ActionBinding {
            action_id: action_id.to_string(),
            action_type,
            params,
            priority,
        })
    }

    /// Turn the binding into an action fired from `component_id`
    pub fn to_action(&self, component_id: impl Into<String>) -> Action {
        Action {
            action_id: self.action_id.clone(),
            component_id: component_id.into(),
            action_type: self.action_type.clone(),
            params: self.params.clone(),
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_payload() {
        let json = r#"{
            "actionId": "open-lesson",
            "componentId": "card-3",
            "actionType": "navigate",
            "params": {"screenId": "lesson-3"}
        }"#;
        let action = Action::from_json(json).unwrap();

        assert_eq!(action.action_type, ActionType::Navigate);
        assert_eq!(action.param_str("screenId"), Some("lesson-3"));
        assert_eq!(action.priority(), ActionPriority::High);
    }

    #[test]
    fn test_parse_custom_type_and_priority() {
        let json = r#"{"actionId": "x", "componentId": "c", "actionType": "share", "priority": "low"}"#;
        let action = Action::from_json(json).unwrap();

        assert_eq!(action.action_type, ActionType::Custom("share".to_string()));
        assert_eq!(action.priority(), ActionPriority::Low);
        assert!(action.params.is_empty());
    }

    #[test]
    fn test_action_type_tags() {
        assert_eq!(ActionType::from_tag("ui-interaction"), ActionType::UiInteraction);
        assert_eq!(ActionType::from_tag("uiInteraction"), ActionType::UiInteraction);
        assert_eq!(ActionType::from_tag("background_task"), ActionType::BackgroundTask);
        assert_eq!(ActionType::BackgroundTask.default_priority(), ActionPriority::Low);

        let json = serde_json::to_value(ActionType::UiInteraction).unwrap();
        assert_eq!(json, serde_json::json!("ui-interaction"));
    }

    #[test]
    fn test_priority_order() {
        assert!(ActionPriority::High > ActionPriority::Normal);
        assert!(ActionPriority::Normal > ActionPriority::Low);
    }

    #[test]
    fn test_binding_from_object() {
        let node = ComponentNode::from_json(
            r#"{"id": "next", "type": "button", "props": {
                "label": "Next",
                "action": {"actionId": "go", "actionType": "navigate", "params": {"screenId": "s2"}}
            }}"#,
        )
        .unwrap();

        let binding = ActionBinding::from_node(&node).unwrap();
        let action = binding.to_action(node.id());

        assert_eq!(action.component_id, "next");
        assert_eq!(action.action_type, ActionType::Navigate);
        assert_eq!(action.param_str("screenId"), Some("s2"));
    }

    #[test]
    fn test_binding_from_string_and_malformed() {
        let node = ComponentNode::new("hint", "checkbox").with_prop("action", "toggle-hints");
        let binding = ActionBinding::from_node(&node).unwrap();
        assert_eq!(binding.action_id, "toggle-hints");
        assert_eq!(binding.action_type, ActionType::UiInteraction);

        let node = ComponentNode::new("bad", "button").with_prop("action", 12);
        assert!(ActionBinding::from_node(&node).is_none());
    }
}
