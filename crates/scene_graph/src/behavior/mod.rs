//! Behavior attachment lifecycle
//!
//! Behaviors are pluggable capability objects attached to nodes without
//! subclassing. The scene drives their lifecycle: `init` is called once when
//! the behavior is added, `attach` immediately after with the target node,
//! and `detach` when the behavior is removed or its node is disposed.

use crate::scene::NodeKey;

/// A reusable capability that can be attached to a scene node.
///
/// Names are expected to be unique within a node; [`crate::Scene::add_behavior`]
/// rejects duplicates on a best-effort basis.
pub trait Behavior {
    /// Name of the behavior, used for lookup and duplicate detection
    fn name(&self) -> &str;

    /// Called once, before the first attach
    fn init(&mut self) {}

    /// Called when the behavior is attached to a node
    fn attach(&mut self, node: NodeKey);

    /// Called when the behavior is removed from its node, or when the node
    /// is disposed
    fn detach(&mut self);
}
