//! Common imports for hosting A2UI screens.

pub use crate::a2ui::{
    Action, ActionError, ActionHandler, ActionPipeline, ActionPriority, ActionType,
    CapabilityNegotiator, ComponentNode, ComponentRegistry, Element, ElementType,
    FileScreenSource, GrantedPermissions, HostEvent, HttpScreenSource, LoadError, LoadedScreen,
    Permission, RenderDispatcher, RenderedElement, RuntimeConfig, ScreenHost, ScreenLoader,
    ScreenOrigin, ScreenSource, UiValue, ValidationError, ValidationLimits, handler_fn, validate,
};
