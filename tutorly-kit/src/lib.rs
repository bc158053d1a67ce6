//! # Description
//!
//! Tutorly Kit is the runtime behind Tutorly's server-driven screens. The
//! backend sends each screen as a JSON component tree; this crate validates
//! it, negotiates which elements the device can show, renders a
//! toolkit-neutral element tree and dispatches user actions through a bounded
//! priority pipeline.
//!
//! # Features
//!
//! - Tree validation with depth, size and duplicate-id limits.
//! - Permission-aware capability negotiation with graceful fallbacks.
//! - Table-driven rendering that never fails on unknown content.
//! - Prioritized, bounded action pipeline on tokio.
//! - Screen loading with timeouts, backoff, a circuit breaker and caching.

pub mod a2ui;

pub mod prelude;
