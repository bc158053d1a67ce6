//! A2UI Capability Negotiation
//!
//! Decides which element types this client can render right now, from the
//! element catalogue and the device permissions currently granted.
//!
//! Results are published as immutable, versioned [`CapabilitySnapshot`]s.
//! Negotiation builds the next snapshot completely before swapping it in, so
//! a reader holding or fetching a snapshot never sees a half-updated state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::registry::{ComponentRegistry, ElementType};

/// A device permission an element may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Camera,
    Microphone,
    SpeechRecognition,
    Stylus,
}

impl Permission {
    pub fn name(&self) -> &'static str {
        match self {
            Permission::Camera => "camera",
            Permission::Microphone => "microphone",
            Permission::SpeechRecognition => "speechRecognition",
            Permission::Stylus => "stylus",
        }
    }

    /// Parse a permission name, ignoring case, `_` and `-`
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name.chars().filter(|c| !matches!(c, '_' | '-')).collect();
        Self::all()
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(&normalized))
    }

    pub fn all() -> &'static [Permission] {
        &[
            Permission::Camera,
            Permission::Microphone,
            Permission::SpeechRecognition,
            Permission::Stylus,
        ]
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of the live permission state, normally backed by the platform.
pub trait PermissionProvider: Send + Sync {
    fn granted(&self) -> BTreeSet<Permission>;
}

/// Permission state kept in memory and updated by whoever observes the
/// platform prompts.
#[derive(Debug, Default)]
pub struct GrantedPermissions {
    granted: RwLock<BTreeSet<Permission>>,
}

impl GrantedPermissions {
    pub fn new(granted: impl IntoIterator<Item = Permission>) -> Self {
        GrantedPermissions {
            granted: RwLock::new(granted.into_iter().collect()),
        }
    }

    pub fn grant(&self, permission: Permission) {
        self.granted
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(permission);
    }

    pub fn revoke(&self, permission: Permission) {
        self.granted
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&permission);
    }
}

impl PermissionProvider for GrantedPermissions {
    fn granted(&self) -> BTreeSet<Permission> {
        self.granted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One negotiated view of what can be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    version: u64,
    supported: BTreeSet<ElementType>,
    granted: BTreeSet<Permission>,
    /// Resolved substitute for every element type except plain text
    fallbacks: BTreeMap<ElementType, ElementType>,
}

impl CapabilitySnapshot {
    /// Build a snapshot from a catalogue and a permission set.
    ///
    /// Plain text is always supported; it terminates every fallback chain.
    pub fn build(
        registry: &ComponentRegistry,
        granted: BTreeSet<Permission>,
        version: u64,
    ) -> Self {
        let mut supported: BTreeSet<ElementType> = registry
            .all_mappings()
            .map(|m| m.element)
            .filter(|e| e.required_permissions().iter().all(|p| granted.contains(p)))
            .collect();
        supported.insert(ElementType::Text);

        let fallbacks = ElementType::all()
            .iter()
            .copied()
            .filter(|e| *e != ElementType::Text)
            .map(|e| (e, resolve_fallback(registry, &supported, e)))
            .collect();

        CapabilitySnapshot {
            version,
            supported,
            granted,
            fallbacks,
        }
    }

    /// Monotonic version, bumped by every negotiation. Zero before the first.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the element can be rendered as-is.
    ///
    /// Never true for a gated element whose permissions are not all granted.
    pub fn is_supported(&self, element: ElementType) -> bool {
        self.supported.contains(&element) && self.has_permission(element)
    }

    /// Whether every permission the element needs is granted
    pub fn has_permission(&self, element: ElementType) -> bool {
        element
            .required_permissions()
            .iter()
            .all(|p| self.granted.contains(p))
    }

    /// A supported substitute for the element; `None` only for plain text.
    pub fn fallback(&self, element: ElementType) -> Option<ElementType> {
        self.fallbacks.get(&element).copied()
    }

    pub fn supported(&self) -> &BTreeSet<ElementType> {
        &self.supported
    }

    pub fn granted(&self) -> &BTreeSet<Permission> {
        &self.granted
    }
}

/// Follow the catalogue's fallback chain until a supported element turns up.
fn resolve_fallback(
    registry: &ComponentRegistry,
    supported: &BTreeSet<ElementType>,
    element: ElementType,
) -> ElementType {
    let mut current = registry.fallback_for(element);
    // A chain longer than the number of element types has looped
    for _ in 0..ElementType::all().len() {
        match current {
            Some(candidate) if candidate != element && supported.contains(&candidate) => {
                return candidate;
            }
            Some(candidate) => current = registry.fallback_for(candidate),
            None => break,
        }
    }
    ElementType::Text
}

/// Owns the current capability snapshot for a session.
///
/// # Example
///
/// ```rust,ignore
/// let permissions = Arc::new(GrantedPermissions::default());
/// let negotiator = CapabilityNegotiator::new(ComponentRegistry::default(), permissions.clone());
/// negotiator.negotiate(false);
///
/// permissions.grant(Permission::Camera);
/// negotiator.negotiate(true);
/// assert!(negotiator.is_supported(ElementType::CameraCapture));
/// ```
pub struct CapabilityNegotiator {
    registry: ComponentRegistry,
    permissions: Arc<dyn PermissionProvider>,
    current: RwLock<Arc<CapabilitySnapshot>>,
    /// Serializes negotiations; readers never take it
    writer: Mutex<()>,
}

impl CapabilityNegotiator {
    /// Create a negotiator. Until the first [`negotiate`](Self::negotiate) it
    /// answers as if no permission were granted.
    pub fn new(registry: ComponentRegistry, permissions: Arc<dyn PermissionProvider>) -> Self {
        let initial = CapabilitySnapshot::build(&registry, BTreeSet::new(), 0);
        CapabilityNegotiator {
            registry,
            permissions,
            current: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
        }
    }

    /// Negotiate against the live permission state.
    ///
    /// Does nothing if a negotiation already happened, unless `force` is set.
    /// Returns the snapshot in effect afterwards.
    pub fn negotiate(&self, force: bool) -> Arc<CapabilitySnapshot> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.snapshot();
        if previous.version() > 0 && !force {
            return previous;
        }

        let granted = self.permissions.granted();
        let next = Arc::new(CapabilitySnapshot::build(
            &self.registry,
            granted,
            previous.version() + 1,
        ));

        ::log::info!(
            "[A2UI] Capabilities v{}: {} supported, granted [{}]",
            next.version(),
            next.supported().len(),
            next.granted()
                .iter()
                .map(Permission::name)
                .collect::<Vec<_>>()
                .join(", ")
        );

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }

    /// The snapshot currently in effect
    pub fn snapshot(&self) -> Arc<CapabilitySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_supported(&self, element: ElementType) -> bool {
        self.snapshot().is_supported(element)
    }

    pub fn has_permission(&self, element: ElementType) -> bool {
        self.snapshot().has_permission(element)
    }

    pub fn fallback(&self, element: ElementType) -> Option<ElementType> {
        self.snapshot().fallback(element)
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }
}

impl fmt::Debug for CapabilityNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityNegotiator")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
