//! A2UI error types
//!
//! Every error here is recoverable. Validation and load failures are resolved
//! by the loader's fallback; dispatch problems never become errors at all and
//! render as placeholders instead.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::validator::ValidationLimits;

/// Why a component tree was rejected before rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("tree depth {depth} exceeds the limit of {}", .limits.max_depth)]
    DepthLimitExceeded {
        depth: usize,
        limits: ValidationLimits,
    },

    #[error("component count {count} exceeds the limit of {}", .limits.max_components)]
    ComponentLimitExceeded {
        count: usize,
        limits: ValidationLimits,
    },

    /// A component id appeared twice in the same tree
    #[error("duplicate component ids {duplicate_ids:?} at /{}", .path.join("/"))]
    CircularReference {
        duplicate_ids: Vec<String>,
        /// Ids from the root down to the offending node
        path: Vec<String>,
    },

    /// The wire payload is not a well-formed component node
    #[error("malformed component payload: {0}")]
    Decode(String),
}

/// Why a screen could not be fetched from its source.
///
/// Never reaches the rendering layer: the loader swallows it and serves a
/// fallback tree, reporting the error alongside.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("screen fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("screen source answered with status {0}")]
    Status(u16),

    #[error("screen {0:?} is not known to the source")]
    NotFound(String),

    /// Payload arrived but failed to decode or validate
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("circuit open, next attempt allowed in {0:?}")]
    CircuitOpen(Duration),
}

/// Failures around action handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("action pipeline is shut down")]
    ShutDown,

    #[error("action {action_id:?} failed: {reason}")]
    Failed { action_id: String, reason: String },

    #[error("action {action_id:?} is missing parameter {param:?}")]
    MissingParam { action_id: String, param: String },

    #[error("component {0:?} is not on the current screen")]
    UnknownComponent(String),

    #[error("component {0:?} does not declare an action")]
    NoActionBinding(String),

    #[error("component {0:?} is disabled or has no control to tap")]
    NotInteractive(String),

    #[error("remote action endpoint failed: {0}")]
    Remote(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
