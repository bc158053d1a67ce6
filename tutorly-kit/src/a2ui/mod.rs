//! A2UI Runtime for Tutorly
//!
//! A2UI (Agent-to-UI) lets the content backend describe a screen as a JSON
//! component tree. This module validates those trees, decides what the device
//! can show, renders them into toolkit-neutral elements and routes user
//! actions back through a prioritized pipeline.
//!
//! # Architecture
//!
//! ```text
//! ScreenSource (file / http / static)
//!        ↓
//!   ScreenLoader ── timeout, circuit breaker, cache, fallback
//!        ↓
//!   validate() ── depth, size, duplicate ids
//!        ↓
//!   RenderDispatcher ◄── CapabilitySnapshot ◄── CapabilityNegotiator
//!        ↓
//!   RenderedElement tree ──► platform views
//!        │
//!   tap / system ──► ActionPipeline ──► handlers (navigate, remote, ...)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tutorly_kit::a2ui::*;
//!
//! let root = ComponentNode::from_json(r#"{"id":"t1","type":"text","props":{"text":"Hello"}}"#)?;
//! validate(&root, ValidationLimits::default())?;
//!
//! let negotiator = CapabilityNegotiator::new(
//!     ComponentRegistry::with_standard_catalog(),
//!     Arc::new(GrantedPermissions::default()),
//! );
//! let rendered = RenderDispatcher::default().render(&root, &negotiator.negotiate(false));
//! ```

mod action;
mod capability;
mod config;
mod error;
mod host;
mod loader;
mod node;
mod pipeline;
mod registry;
mod remote;
mod render;
mod validator;
mod value;

pub use action::*;
pub use capability::*;
pub use config::*;
pub use error::*;
pub use host::*;
pub use loader::*;
pub use node::*;
pub use pipeline::*;
pub use registry::*;
pub use remote::*;
pub use render::*;
pub use validator::*;
pub use value::*;
