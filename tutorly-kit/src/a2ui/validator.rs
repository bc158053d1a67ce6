//! A2UI Tree Validator
//!
//! Checks a component tree against depth and size limits and rejects
//! duplicate ids before anything is rendered. The walk stops at the first
//! violation, so its cost is bounded by the limits rather than by the size of
//! the payload a backend chose to send.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::node::ComponentNode;

pub const DEFAULT_MAX_DEPTH: usize = 50;
pub const DEFAULT_MAX_COMPONENTS: usize = 1000;

/// Limits applied by [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationLimits {
    /// Deepest allowed node, the root being at depth 1
    pub max_depth: usize,

    /// Largest allowed node count, root included
    pub max_components: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        ValidationLimits {
            max_depth: DEFAULT_MAX_DEPTH,
            max_components: DEFAULT_MAX_COMPONENTS,
        }
    }
}

/// What a successful validation observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetrics {
    pub max_depth: usize,
    pub total_components: usize,
}

/// Validate a tree against the given limits.
///
/// # Example
///
/// ```rust,ignore
/// let root = ComponentNode::from_json(payload)?;
/// let metrics = validate(&root, ValidationLimits::default())?;
/// println!("{} nodes, {} deep", metrics.total_components, metrics.max_depth);
/// ```
pub fn validate(
    root: &ComponentNode,
    limits: ValidationLimits,
) -> Result<ValidationMetrics, ValidationError> {
    let mut walker = Walker::new(limits);
    walker.run(root)?;
    Ok(ValidationMetrics {
        max_depth: walker.max_depth,
        total_components: walker.count,
    })
}

struct Frame<'a> {
    node: &'a ComponentNode,
    depth: usize,
    next_child: usize,
}

/// Depth-first walk over an explicit stack; the open frames double as the
/// id path reported for duplicates.
struct Walker<'a> {
    limits: ValidationLimits,
    frames: Vec<Frame<'a>>,
    seen: HashSet<&'a str>,
    count: usize,
    max_depth: usize,
}

impl<'a> Walker<'a> {
    fn new(limits: ValidationLimits) -> Self {
        Walker {
            limits,
            frames: Vec::new(),
            seen: HashSet::new(),
            count: 0,
            max_depth: 0,
        }
    }

    fn run(&mut self, root: &'a ComponentNode) -> Result<(), ValidationError> {
        self.enter(root, 1)?;

        loop {
            let next = match self.frames.last_mut() {
                None => break,
                Some(frame) => {
                    let node: &'a ComponentNode = frame.node;
                    match node.children().get(frame.next_child) {
                        Some(child) => {
                            frame.next_child += 1;
                            Some((child, frame.depth + 1))
                        }
                        None => None,
                    }
                }
            };

            match next {
                Some((child, depth)) => self.enter(child, depth)?,
                None => {
                    self.frames.pop();
                }
            }
        }

        Ok(())
    }

    fn enter(&mut self, node: &'a ComponentNode, depth: usize) -> Result<(), ValidationError> {
        if depth > self.limits.max_depth {
            return Err(ValidationError::DepthLimitExceeded {
                depth,
                limits: self.limits,
            });
        }

        self.count += 1;
        if self.count > self.limits.max_components {
            return Err(ValidationError::ComponentLimitExceeded {
                count: self.count,
                limits: self.limits,
            });
        }

        if !self.seen.insert(node.id()) {
            let mut path: Vec<String> = self.frames.iter().map(|f| f.node.id().to_string()).collect();
            path.push(node.id().to_string());
            return Err(ValidationError::CircularReference {
                duplicate_ids: vec![node.id().to_string()],
                path,
            });
        }

        self.max_depth = self.max_depth.max(depth);
        self.frames.push(Frame {
            node,
            depth,
            next_child: 0,
        });
        Ok(())
    }
}
