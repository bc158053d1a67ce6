//! A2UI Render Dispatcher
//!
//! Turns a validated component tree into a toolkit-neutral [`RenderedElement`]
//! tree. A platform layer maps each [`Element`] onto its native views.
//!
//! Dispatch goes through a lookup table from [`ElementType`] to render
//! function. Unknown type tags and types without a renderer become a visible
//! [`Element::Placeholder`]; gated or unsupported types are swapped for the
//! capability snapshot's fallback before dispatch. Missing props fall back to
//! the defaults documented on each [`Element`] variant.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use super::action::ActionBinding;
use super::capability::CapabilitySnapshot;
use super::node::ComponentNode;
use super::registry::ElementType;

/// Cross-axis alignment of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    #[default]
    Start,
    Center,
    End,
    Stretch,
}

impl Alignment {
    fn from_prop(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("center") => Alignment::Center,
            Some("end") => Alignment::End,
            Some("stretch") => Alignment::Stretch,
            _ => Alignment::Start,
        }
    }
}

/// Typographic role of a text element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TextStyle {
    Title,
    Heading,
    #[default]
    Body,
    Caption,
    Code,
}

impl TextStyle {
    fn from_prop(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("title" | "h1") => TextStyle::Title,
            Some("heading" | "h2" | "h3" | "h4" | "h5") => TextStyle::Heading,
            Some("caption") => TextStyle::Caption,
            Some("code") => TextStyle::Code,
            _ => TextStyle::Body,
        }
    }
}

/// A concrete, fully defaulted UI element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Element {
    /// `spacing` defaults to 8, `alignment` to start
    Column { spacing: f64, alignment: Alignment },
    /// `spacing` defaults to 8, `alignment` to start
    Row { spacing: f64, alignment: Alignment },
    /// `elevation` defaults to 1 and is clamped to 0..=24
    Card { elevation: u8, title: Option<String> },
    List { ordered: bool },
    /// Absent text renders as an empty string
    Text { text: String, style: TextStyle },
    Image { url: String, alt: String },
    /// `size` defaults to 24
    Icon { name: String, size: f64 },
    Divider,
    /// `size` defaults to 16
    Spacer { size: f64 },
    Button {
        label: String,
        primary: bool,
        enabled: bool,
        action: Option<ActionBinding>,
    },
    TextInput {
        label: String,
        placeholder: String,
        value: String,
        multiline: bool,
        action: Option<ActionBinding>,
    },
    Checkbox {
        label: String,
        checked: bool,
        action: Option<ActionBinding>,
    },
    /// Range defaults to 0..=1; the value is clamped into it
    Slider {
        value: f64,
        min: f64,
        max: f64,
        step: f64,
        action: Option<ActionBinding>,
    },
    ImageUpload {
        prompt: String,
        action: Option<ActionBinding>,
    },
    CameraCapture {
        prompt: String,
        front_facing: bool,
        action: Option<ActionBinding>,
    },
    VoiceRecognition {
        prompt: String,
        locale: String,
        action: Option<ActionBinding>,
    },
    HandwritingInput {
        prompt: String,
        action: Option<ActionBinding>,
    },
    /// Shown in place of anything that cannot be rendered
    Placeholder {
        component_type: String,
        message: String,
    },
}

impl Element {
    /// The action an interactive element fires, if any
    pub fn action(&self) -> Option<&ActionBinding> {
        match self {
            Element::Button { action, .. }
            | Element::TextInput { action, .. }
            | Element::Checkbox { action, .. }
            | Element::Slider { action, .. }
            | Element::ImageUpload { action, .. }
            | Element::CameraCapture { action, .. }
            | Element::VoiceRecognition { action, .. }
            | Element::HandwritingInput { action, .. } => action.as_ref(),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Element::Placeholder { .. })
    }
}

/// A rendered node and its rendered children.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedElement {
    /// Id of the source component
    pub id: String,

    pub element: Element,

    /// The type that was asked for when a fallback was rendered instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substituted_for: Option<ElementType>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedElement>,
}

impl RenderedElement {
    /// Find a rendered element by source component id
    pub fn find(&self, id: &str) -> Option<&RenderedElement> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Number of elements in this subtree
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RenderedElement::count).sum::<usize>()
    }

    /// Number of placeholders in this subtree
    pub fn placeholder_count(&self) -> usize {
        usize::from(self.element.is_placeholder())
            + self
                .children
                .iter()
                .map(RenderedElement::placeholder_count)
                .sum::<usize>()
    }

    /// Indented one-line-per-element outline, for logs and the CLI
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, indent: usize) {
        let summary = match &self.element {
            Element::Column { .. } => "column".to_string(),
            Element::Row { .. } => "row".to_string(),
            Element::Card { title, .. } => match title {
                Some(title) => format!("card {:?}", title),
                None => "card".to_string(),
            },
            Element::List { .. } => "list".to_string(),
            Element::Text { text, .. } => format!("text {:?}", text),
            Element::Image { url, .. } => format!("image {}", url),
            Element::Icon { name, .. } => format!("icon {}", name),
            Element::Divider => "divider".to_string(),
            Element::Spacer { size } => format!("spacer {}", size),
            Element::Button { label, .. } => format!("button {:?}", label),
            Element::TextInput { placeholder, .. } => format!("textInput {:?}", placeholder),
            Element::Checkbox { label, checked, .. } => {
                format!("checkbox {:?} [{}]", label, if *checked { "x" } else { " " })
            }
            Element::Slider { value, min, max, .. } => format!("slider {} in {}..={}", value, min, max),
            Element::ImageUpload { prompt, .. } => format!("imageUpload {:?}", prompt),
            Element::CameraCapture { prompt, .. } => format!("cameraCapture {:?}", prompt),
            Element::VoiceRecognition { prompt, .. } => format!("voiceRecognition {:?}", prompt),
            Element::HandwritingInput { prompt, .. } => format!("handwritingInput {:?}", prompt),
            Element::Placeholder {
                component_type,
                message,
            } => format!("placeholder <{}>: {}", component_type, message),
        };

        let _ = write!(out, "{}{} #{}", "  ".repeat(indent), summary, self.id);
        if let Some(original) = self.substituted_for {
            let _ = write!(out, " (fallback for {})", original);
        }
        out.push('\n');

        for child in &self.children {
            child.write_outline(out, indent + 1);
        }
    }
}

/// Builds the element for one node, ignoring its children.
pub type RenderFn = fn(&ComponentNode) -> Element;

/// Maps validated nodes to rendered elements.
///
/// Rendering is a pure function of the tree and the capability snapshot
/// passed in, so the same tree can be re-rendered after a renegotiation
/// without validating it again.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = RenderDispatcher::with_standard_renderers();
/// let rendered = dispatcher.render(&root, &negotiator.snapshot());
/// println!("{}", rendered.outline());
/// ```
#[derive(Debug, Clone)]
pub struct RenderDispatcher {
    table: HashMap<ElementType, RenderFn>,
}

impl Default for RenderDispatcher {
    fn default() -> Self {
        Self::with_standard_renderers()
    }
}

impl RenderDispatcher {
    /// A dispatcher with no renderers; everything renders as a placeholder
    pub fn new() -> Self {
        RenderDispatcher {
            table: HashMap::new(),
        }
    }

    pub fn with_standard_renderers() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(ElementType::Column, render_column);
        dispatcher.register(ElementType::Row, render_row);
        dispatcher.register(ElementType::Card, render_card);
        dispatcher.register(ElementType::List, render_list);
        dispatcher.register(ElementType::Text, render_text);
        dispatcher.register(ElementType::Image, render_image);
        dispatcher.register(ElementType::Icon, render_icon);
        dispatcher.register(ElementType::Divider, |_| Element::Divider);
        dispatcher.register(ElementType::Spacer, render_spacer);
        dispatcher.register(ElementType::Button, render_button);
        dispatcher.register(ElementType::TextInput, render_text_input);
        dispatcher.register(ElementType::Checkbox, render_checkbox);
        dispatcher.register(ElementType::Slider, render_slider);
        dispatcher.register(ElementType::ImageUpload, render_image_upload);
        dispatcher.register(ElementType::CameraCapture, render_camera_capture);
        dispatcher.register(ElementType::VoiceRecognition, render_voice_recognition);
        dispatcher.register(ElementType::HandwritingInput, render_handwriting_input);
        dispatcher
    }

    /// Register or replace the renderer for an element type
    pub fn register(&mut self, element: ElementType, render: RenderFn) {
        self.table.insert(element, render);
    }

    /// Render a node and its subtree.
    ///
    /// Recursion depth follows the tree depth, which validation has bounded.
    pub fn render(&self, node: &ComponentNode, capabilities: &CapabilitySnapshot) -> RenderedElement {
        let (element, substituted_for) = self.render_element(node, capabilities);
        let children = node
            .children()
            .iter()
            .map(|child| self.render(child, capabilities))
            .collect();

        RenderedElement {
            id: node.id().to_string(),
            element,
            substituted_for,
            children,
        }
    }

    fn render_element(
        &self,
        node: &ComponentNode,
        capabilities: &CapabilitySnapshot,
    ) -> (Element, Option<ElementType>) {
        let Some(requested) = node.element_type() else {
            ::log::debug!("[A2UI] Unknown component type {:?} on {}", node.component_type(), node.id());
            return (
                placeholder(node.component_type(), "Unknown component type"),
                None,
            );
        };

        let mut effective = requested;
        // Each hop moves down a fallback chain; its length is bounded by the catalogue
        for _ in 0..ElementType::all().len() {
            if capabilities.is_supported(effective) {
                break;
            }
            match capabilities.fallback(effective) {
                Some(next) => effective = next,
                None => break,
            }
        }

        if !capabilities.is_supported(effective) {
            return (
                placeholder(requested.name(), "Component is not supported on this device"),
                None,
            );
        }

        let substituted_for = (effective != requested).then_some(requested);
        if let Some(original) = substituted_for {
            ::log::debug!("[A2UI] Rendering {} as {} on {}", original, effective, node.id());
        }

        match self.table.get(&effective) {
            Some(render) => (render(node), substituted_for),
            None => (
                placeholder(effective.name(), "No renderer registered"),
                substituted_for,
            ),
        }
    }
}

fn placeholder(component_type: &str, message: &str) -> Element {
    Element::Placeholder {
        component_type: component_type.to_string(),
        message: message.to_string(),
    }
}

/// First string prop found among `keys`
fn first_str(node: &ComponentNode, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| node.prop_str(key))
        .map(str::to_string)
}

fn render_column(node: &ComponentNode) -> Element {
    Element::Column {
        spacing: node.prop_f64("spacing").unwrap_or(8.0),
        alignment: Alignment::from_prop(node.prop_str("alignment")),
    }
}

fn render_row(node: &ComponentNode) -> Element {
    Element::Row {
        spacing: node.prop_f64("spacing").unwrap_or(8.0),
        alignment: Alignment::from_prop(node.prop_str("alignment")),
    }
}

fn render_card(node: &ComponentNode) -> Element {
    Element::Card {
        elevation: node.prop_i64("elevation").unwrap_or(1).clamp(0, 24) as u8,
        title: node.prop_str("title").map(str::to_string),
    }
}

fn render_list(node: &ComponentNode) -> Element {
    Element::List {
        ordered: node.prop_bool("ordered").unwrap_or(false),
    }
}

fn render_text(node: &ComponentNode) -> Element {
    // Fallbacks from richer elements land here too, so accept their labels
    Element::Text {
        text: first_str(node, &["text", "label", "title", "prompt"]).unwrap_or_default(),
        style: TextStyle::from_prop(
            node.prop_str("style").or_else(|| node.prop_str("usageHint")),
        ),
    }
}

fn render_image(node: &ComponentNode) -> Element {
    Element::Image {
        url: first_str(node, &["url", "src"]).unwrap_or_default(),
        alt: node.prop_str("alt").unwrap_or_default().to_string(),
    }
}

fn render_icon(node: &ComponentNode) -> Element {
    Element::Icon {
        name: node.prop_str("name").unwrap_or("info").to_string(),
        size: node.prop_f64("size").unwrap_or(24.0),
    }
}

fn render_spacer(node: &ComponentNode) -> Element {
    Element::Spacer {
        size: node.prop_f64("size").unwrap_or(16.0).max(0.0),
    }
}

fn render_button(node: &ComponentNode) -> Element {
    Element::Button {
        label: first_str(node, &["label", "text"]).unwrap_or_default(),
        primary: node.prop_bool("primary").unwrap_or(false),
        enabled: node.prop_bool("enabled").unwrap_or(true),
        action: ActionBinding::from_node(node),
    }
}

fn render_text_input(node: &ComponentNode) -> Element {
    Element::TextInput {
        label: node.prop_str("label").unwrap_or_default().to_string(),
        placeholder: first_str(node, &["placeholder", "prompt", "hint"]).unwrap_or_default(),
        value: node.prop_str("value").unwrap_or_default().to_string(),
        multiline: node.prop_bool("multiline").unwrap_or(false),
        action: ActionBinding::from_node(node),
    }
}

fn render_checkbox(node: &ComponentNode) -> Element {
    Element::Checkbox {
        label: first_str(node, &["label", "text"]).unwrap_or_default(),
        checked: node.prop_bool("checked").or_else(|| node.prop_bool("value")).unwrap_or(false),
        action: ActionBinding::from_node(node),
    }
}

fn render_slider(node: &ComponentNode) -> Element {
    // Non-finite bounds count as missing; clamp panics on NaN
    let finite = |key: &str| node.prop_f64(key).filter(|v| v.is_finite());
    let mut min = finite("min").unwrap_or(0.0);
    let mut max = finite("max").unwrap_or(1.0);
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    let value = node.prop_f64("value").filter(|v| !v.is_nan()).unwrap_or(min);
    Element::Slider {
        value: value.clamp(min, max),
        min,
        max,
        step: finite("step").unwrap_or(0.0).max(0.0),
        action: ActionBinding::from_node(node),
    }
}

fn render_image_upload(node: &ComponentNode) -> Element {
    Element::ImageUpload {
        prompt: first_str(node, &["prompt", "label"]).unwrap_or_else(|| "Upload an image".to_string()),
        action: ActionBinding::from_node(node),
    }
}

fn render_camera_capture(node: &ComponentNode) -> Element {
    Element::CameraCapture {
        prompt: first_str(node, &["prompt", "label"]).unwrap_or_else(|| "Take a photo".to_string()),
        front_facing: node.prop_str("camera").is_some_and(|c| c.eq_ignore_ascii_case("front")),
        action: ActionBinding::from_node(node),
    }
}

fn render_voice_recognition(node: &ComponentNode) -> Element {
    Element::VoiceRecognition {
        prompt: first_str(node, &["prompt", "label"]).unwrap_or_else(|| "Tap to speak".to_string()),
        locale: node.prop_str("locale").unwrap_or("en-US").to_string(),
        action: ActionBinding::from_node(node),
    }
}

fn render_handwriting_input(node: &ComponentNode) -> Element {
    Element::HandwritingInput {
        prompt: first_str(node, &["prompt", "label"]).unwrap_or_else(|| "Write your answer".to_string()),
        action: ActionBinding::from_node(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2ui::capability::Permission;
    use crate::a2ui::registry::ComponentRegistry;
    use std::collections::BTreeSet;

    fn snapshot(granted: &[Permission]) -> CapabilitySnapshot {
        CapabilitySnapshot::build(
            &ComponentRegistry::with_standard_catalog(),
            granted.iter().copied().collect::<BTreeSet<_>>(),
            1,
        )
    }

    #[test]
    fn test_render_text() {
        let node = ComponentNode::from_json(r#"{"id":"t1","type":"text","props":{"text":"Hello","style":"title"}}"#)
            .unwrap();
        let rendered = RenderDispatcher::default().render(&node, &snapshot(&[]));

        assert_eq!(rendered.id, "t1");
        assert_eq!(
            rendered.element,
            Element::Text {
                text: "Hello".to_string(),
                style: TextStyle::Title
            }
        );
        assert!(rendered.substituted_for.is_none());
    }

    #[test]
    fn test_missing_props_use_defaults() {
        let rendered = RenderDispatcher::default().render(&ComponentNode::new("t", "text"), &snapshot(&[]));
        assert_eq!(
            rendered.element,
            Element::Text {
                text: String::new(),
                style: TextStyle::Body
            }
        );

        let slider = ComponentNode::new("s", "slider").with_prop("value", 7).with_prop("max", "ten");
        match RenderDispatcher::default().render(&slider, &snapshot(&[])).element {
            Element::Slider { value, min, max, .. } => {
                assert_eq!((value, min, max), (1.0, 0.0, 1.0));
            }
            other => panic!("Expected slider, got {:?}", other),
        }
    }

    #[test]
    fn test_slider_non_finite_props() {
        let slider = |node: ComponentNode| match RenderDispatcher::default().render(&node, &snapshot(&[])).element {
            Element::Slider { value, min, max, step, .. } => (value, min, max, step),
            other => panic!("Expected slider, got {:?}", other),
        };

        let nan_min = ComponentNode::new("s", "slider").with_prop("min", f64::NAN).with_prop("value", 0.5);
        assert_eq!(slider(nan_min), (0.5, 0.0, 1.0, 0.0));

        let wild = ComponentNode::new("s", "slider")
            .with_prop("min", f64::NEG_INFINITY)
            .with_prop("max", f64::NAN)
            .with_prop("value", f64::INFINITY)
            .with_prop("step", f64::INFINITY);
        assert_eq!(slider(wild), (1.0, 0.0, 1.0, 0.0));

        let nan_value = ComponentNode::new("s", "slider")
            .with_prop("min", 2)
            .with_prop("max", 4)
            .with_prop("value", f64::NAN);
        assert_eq!(slider(nan_value), (2.0, 2.0, 4.0, 0.0));
    }

    #[test]
    fn test_unknown_type_renders_placeholder() {
        let tree = ComponentNode::new("root", "column")
            .with_child(ComponentNode::new("x", "hologram"))
            .with_child(ComponentNode::new("y", "text").with_prop("text", "still here"));
        let rendered = RenderDispatcher::default().render(&tree, &snapshot(&[]));

        assert_eq!(rendered.children.len(), 2);
        match &rendered.children[0].element {
            Element::Placeholder { component_type, .. } => assert_eq!(component_type, "hologram"),
            other => panic!("Expected placeholder, got {:?}", other),
        }
        assert_eq!(rendered.placeholder_count(), 1);
    }

    #[test]
    fn test_gated_element_falls_back() {
        let node = ComponentNode::new("cam", "cameraCapture").with_prop("prompt", "Photo of your work");
        let dispatcher = RenderDispatcher::default();

        let rendered = dispatcher.render(&node, &snapshot(&[]));
        assert_eq!(rendered.substituted_for, Some(ElementType::CameraCapture));
        assert!(matches!(
            &rendered.element,
            Element::ImageUpload { prompt, .. } if prompt == "Photo of your work"
        ));

        let rendered = dispatcher.render(&node, &snapshot(&[Permission::Camera]));
        assert!(rendered.substituted_for.is_none());
        assert!(matches!(rendered.element, Element::CameraCapture { .. }));
    }

    #[test]
    fn test_voice_falls_back_to_text_input() {
        let node = ComponentNode::new("voice", "voiceRecognition").with_prop("prompt", "Say the answer");
        let rendered = RenderDispatcher::default().render(&node, &snapshot(&[Permission::Microphone]));

        match rendered.element {
            Element::TextInput { placeholder, .. } => assert_eq!(placeholder, "Say the answer"),
            other => panic!("Expected text input, got {:?}", other),
        }
        assert_eq!(rendered.substituted_for, Some(ElementType::VoiceRecognition));
    }

    #[test]
    fn test_missing_renderer_is_placeholder() {
        let mut dispatcher = RenderDispatcher::new();
        dispatcher.register(ElementType::Column, |_| Element::Divider);

        let tree = ComponentNode::new("root", "column").with_child(ComponentNode::new("b", "button"));
        let rendered = dispatcher.render(&tree, &snapshot(&[]));

        assert_eq!(rendered.element, Element::Divider);
        assert!(rendered.children[0].element.is_placeholder());
    }

    #[test]
    fn test_children_in_order_and_actions() {
        let tree = ComponentNode::from_json(
            r#"{"id": "root", "type": "column", "children": [
                {"id": "a", "type": "text", "props": {"text": "First"}},
                {"id": "b", "type": "button", "props": {"label": "Next", "action": "next"}},
                {"id": "c", "type": "divider"}
            ]}"#,
        )
        .unwrap();
        let rendered = RenderDispatcher::default().render(&tree, &snapshot(&[]));

        let ids: Vec<&str> = rendered.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(rendered.count(), 4);

        let button = rendered.find("b").unwrap();
        assert_eq!(button.element.action().map(|a| a.action_id.as_str()), Some("next"));
    }

    #[test]
    fn test_outline() {
        let tree = ComponentNode::new("root", "column")
            .with_child(ComponentNode::new("cam", "cameraCapture"));
        let outline = RenderDispatcher::default().render(&tree, &snapshot(&[])).outline();

        assert_eq!(
            outline,
            "column #root\n  imageUpload \"Upload an image\" #cam (fallback for cameraCapture)\n"
        );
    }
}
