//! A2UI Element Registry
//!
//! The closed set of element types the runtime knows how to render, and the
//! client catalogue declaring which of them this build offers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::capability::Permission;

/// Element type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    // Layout
    Column,
    Row,
    Card,
    List,

    // Display
    Text,
    Image,
    Icon,
    Divider,
    Spacer,

    // Interactive
    Button,
    TextInput,
    Checkbox,
    Slider,
    ImageUpload,

    // Device gated
    CameraCapture,
    VoiceRecognition,
    HandwritingInput,
}

impl ElementType {
    /// Canonical wire tag
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Column => "column",
            ElementType::Row => "row",
            ElementType::Card => "card",
            ElementType::List => "list",
            ElementType::Text => "text",
            ElementType::Image => "image",
            ElementType::Icon => "icon",
            ElementType::Divider => "divider",
            ElementType::Spacer => "spacer",
            ElementType::Button => "button",
            ElementType::TextInput => "textInput",
            ElementType::Checkbox => "checkbox",
            ElementType::Slider => "slider",
            ElementType::ImageUpload => "imageUpload",
            ElementType::CameraCapture => "cameraCapture",
            ElementType::VoiceRecognition => "voiceRecognition",
            ElementType::HandwritingInput => "handwritingInput",
        }
    }

    /// Parse a wire tag.
    ///
    /// Case, `_`, `-` and spaces are ignored, so `textInput`, `text_input`
    /// and `TextInput` all select [`ElementType::TextInput`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Self::all()
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(&normalized))
    }

    /// Get all element types
    pub fn all() -> &'static [ElementType] {
        &[
            ElementType::Column,
            ElementType::Row,
            ElementType::Card,
            ElementType::List,
            ElementType::Text,
            ElementType::Image,
            ElementType::Icon,
            ElementType::Divider,
            ElementType::Spacer,
            ElementType::Button,
            ElementType::TextInput,
            ElementType::Checkbox,
            ElementType::Slider,
            ElementType::ImageUpload,
            ElementType::CameraCapture,
            ElementType::VoiceRecognition,
            ElementType::HandwritingInput,
        ]
    }

    /// Device permissions that must all be granted before this element renders
    pub fn required_permissions(&self) -> &'static [Permission] {
        match self {
            ElementType::CameraCapture => &[Permission::Camera],
            ElementType::VoiceRecognition => {
                &[Permission::Microphone, Permission::SpeechRecognition]
            }
            ElementType::HandwritingInput => &[Permission::Stylus],
            _ => &[],
        }
    }

    pub fn is_permission_gated(&self) -> bool {
        !self.required_permissions().is_empty()
    }

    /// The always-renderable substitute used when this element is unavailable.
    ///
    /// Plain text is the end of every chain and has no fallback of its own.
    pub fn default_fallback(&self) -> Option<ElementType> {
        match self {
            ElementType::VoiceRecognition | ElementType::HandwritingInput => {
                Some(ElementType::TextInput)
            }
            ElementType::CameraCapture => Some(ElementType::ImageUpload),
            ElementType::Text => None,
            _ => Some(ElementType::Text),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ElementType::Column | ElementType::Row | ElementType::Card | ElementType::List
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalogue entry for an element type
#[derive(Debug, Clone)]
pub struct ComponentMapping {
    pub element: ElementType,

    /// Description of the element
    pub description: &'static str,

    /// Substitute rendered when the element is unavailable
    pub fallback: Option<ElementType>,
}

impl ComponentMapping {
    pub fn new(element: ElementType, description: &'static str) -> Self {
        ComponentMapping {
            element,
            description,
            fallback: element.default_fallback(),
        }
    }
}

/// The client's element catalogue.
///
/// A client build declares the elements it can render by registering them.
/// Capability negotiation combines this catalogue with the live permission
/// state; elements missing from the catalogue are never reported supported.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = ComponentRegistry::with_standard_catalog();
/// registry.unregister(ElementType::HandwritingInput);
///
/// assert!(registry.get_by_tag("text_input").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    mappings: HashMap<ElementType, ComponentMapping>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_standard_catalog()
    }
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ComponentRegistry {
            mappings: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in element
    pub fn with_standard_catalog() -> Self {
        let mut registry = Self::new();

        // Layout
        registry.register(ComponentMapping::new(ElementType::Column, "Vertical stack of children"));
        registry.register(ComponentMapping::new(ElementType::Row, "Horizontal stack of children"));
        registry.register(ComponentMapping::new(ElementType::Card, "Elevated container"));
        registry.register(ComponentMapping::new(ElementType::List, "Scrollable list of children"));

        // Display
        registry.register(ComponentMapping::new(ElementType::Text, "Text with style hint"));
        registry.register(ComponentMapping::new(ElementType::Image, "Remote image"));
        registry.register(ComponentMapping::new(ElementType::Icon, "Named icon"));
        registry.register(ComponentMapping::new(ElementType::Divider, "Visual separator"));
        registry.register(ComponentMapping::new(ElementType::Spacer, "Fixed empty space"));

        // Interactive
        registry.register(ComponentMapping::new(ElementType::Button, "Clickable button with action"));
        registry.register(ComponentMapping::new(ElementType::TextInput, "Single or multi line text entry"));
        registry.register(ComponentMapping::new(ElementType::Checkbox, "Boolean toggle"));
        registry.register(ComponentMapping::new(ElementType::Slider, "Numeric range slider"));
        registry.register(ComponentMapping::new(ElementType::ImageUpload, "Pick an image from the library"));

        // Device gated
        registry.register(ComponentMapping::new(ElementType::CameraCapture, "Live camera capture"));
        registry.register(ComponentMapping::new(ElementType::VoiceRecognition, "Speech to text entry"));
        registry.register(ComponentMapping::new(ElementType::HandwritingInput, "Stylus handwriting canvas"));

        registry
    }

    /// Register a component mapping
    pub fn register(&mut self, mapping: ComponentMapping) {
        self.mappings.insert(mapping.element, mapping);
    }

    /// Drop an element from the catalogue
    pub fn unregister(&mut self, element: ElementType) -> Option<ComponentMapping> {
        self.mappings.remove(&element)
    }

    pub fn get(&self, element: ElementType) -> Option<&ComponentMapping> {
        self.mappings.get(&element)
    }

    /// Get a mapping by wire tag
    pub fn get_by_tag(&self, tag: &str) -> Option<&ComponentMapping> {
        ElementType::from_tag(tag).and_then(|t| self.get(t))
    }

    pub fn contains(&self, element: ElementType) -> bool {
        self.mappings.contains_key(&element)
    }

    pub fn all_mappings(&self) -> impl Iterator<Item = &ComponentMapping> {
        self.mappings.values()
    }

    /// Fallback for an element, preferring the catalogue entry over the default
    pub fn fallback_for(&self, element: ElementType) -> Option<ElementType> {
        match self.get(element) {
            Some(mapping) => mapping.fallback,
            None => element.default_fallback(),
        }
    }
}
