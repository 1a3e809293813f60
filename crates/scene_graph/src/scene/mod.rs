//! Scene registry and node hierarchy
//!
//! The [`Scene`] owns every node in a slotmap arena and hands out stable
//! [`NodeKey`] handles. Parent links are plain keys (non-owning), children
//! lists are ordered key sequences, and parentless nodes are tracked in a
//! root list with O(1) swap-removal.
//!
//! ## Architecture
//!
//! ```text
//! Application code
//!      ↓ mutates transforms / hierarchy
//! Scene (arena + render-id epoch)
//!      ↓ world matrices
//! Renderer / physics / materials
//! ```
//!
//! All scene-graph mutation and traversal is single-threaded and synchronous:
//! there are no locks and no deferred callbacks. The render loop increments
//! the render id once per frame; within one epoch a node's world matrix is
//! computed at most once.

mod hierarchy;
mod node;
mod transform;
mod world_matrix;


use log::warn;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::animation::Animatable;
use crate::behavior::Behavior;

pub use node::{Node, NodeKind};
pub use transform::{BillboardMode, TransformState};

new_key_type! {
    /// Stable handle to a node in the scene arena.
    ///
    /// Keys stay valid for the lifetime of the scene; disposed nodes remain
    /// in the arena with their `is_disposed` flag latched, so a stale key is
    /// always safe to query.
    pub struct NodeKey;
}

/// Errors surfaced by structural scene-graph mutations.
///
/// Both variants are programmer-error classes. They are reported as explicit
/// results rather than panics, and a rejected operation never leaves a
/// partially-applied change in the parent/child/root lists.
#[derive(Error, Debug)]
pub enum SceneError {
    /// A mutating operation targeted a node that has already been disposed
    #[error("node `{0}` has been disposed")]
    NodeDisposed(String),

    /// Reparenting would make a node an ancestor of itself
    #[error("setting parent of `{child}` to `{parent}` would create a cycle")]
    CyclicParenting {
        /// Node being reparented
        child: String,
        /// Requested parent, a descendant of `child`
        parent: String,
    },
}

/// Instrumentation counters for scene-graph work.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneStats {
    /// Slow-path world-matrix recomputations since scene creation
    pub world_matrix_recomputations: u64,
}

/// Callback invoked when a node is disposed or becomes ready.
///
/// Callbacks run synchronously with full scene access, so they may inspect
/// or mutate other nodes; the node they fired for is already detached.
pub type NodeCallback = Box<dyn FnMut(&mut Scene, NodeKey)>;

/// Owner of the node arena, the root-node list, and the render-id epoch.
pub struct Scene {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) root_nodes: Vec<NodeKey>,
    render_id: u64,
    next_unique_id: u64,
    pub(crate) stats: SceneStats,
}

impl Scene {
    /// Create an empty scene at render-id 0.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
            render_id: 0,
            next_unique_id: 0,
            stats: SceneStats::default(),
        }
    }

    /// Current frame epoch.
    pub fn render_id(&self) -> u64 {
        self.render_id
    }

    /// Advance the frame epoch.
    ///
    /// Called by the embedding render loop once per frame, never by the core
    /// algorithms themselves. Incrementing implicitly invalidates every
    /// node's render-id stamp; there is no eager sweep.
    pub fn increment_render_id(&mut self) {
        self.render_id += 1;
    }

    /// Parentless, non-disposed nodes, in no particular order.
    pub fn root_nodes(&self) -> &[NodeKey] {
        &self.root_nodes
    }

    /// Work counters.
    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    /// Create a plain node (no local transform) attached to the scene roots.
    pub fn add_node(&mut self, name: &str) -> NodeKey {
        self.insert_node(name, NodeKind::Plain)
    }

    /// Create a transform node with an identity transform, attached to the
    /// scene roots.
    pub fn add_transform_node(&mut self, name: &str) -> NodeKey {
        self.insert_node(name, NodeKind::Transform(TransformState::new()))
    }

    fn insert_node(&mut self, name: &str, kind: NodeKind) -> NodeKey {
        let unique_id = self.next_unique_id;
        self.next_unique_id += 1;

        let mut node = Node::new(name, unique_id, kind);
        node.init_cache();

        let key = self.nodes.insert(node);
        self.add_to_root_nodes(key);
        key
    }

    /// Borrow a node. Panics on a key from another scene.
    pub fn node(&self, key: NodeKey) -> &Node {
        &self.nodes[key]
    }

    /// Mutably borrow a node. Panics on a key from another scene.
    pub fn node_mut(&mut self, key: NodeKey) -> &mut Node {
        &mut self.nodes[key]
    }

    /// Borrow a node, returning `None` for a foreign key.
    pub fn get_node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Mutably borrow a node, returning `None` for a foreign key.
    pub fn get_node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Number of nodes ever created in this scene, disposed ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Attach a behavior to a node: `init` first, then `attach`.
    ///
    /// Behavior names are unique within a node on a best-effort basis; a
    /// duplicate is logged and skipped.
    pub fn add_behavior(
        &mut self,
        key: NodeKey,
        mut behavior: Box<dyn Behavior>,
    ) -> Result<(), SceneError> {
        let node = &self.nodes[key];
        if node.is_disposed() {
            return Err(SceneError::NodeDisposed(node.name.clone()));
        }
        if node
            .behaviors
            .iter()
            .any(|existing| existing.name() == behavior.name())
        {
            warn!(
                "behavior `{}` already attached to node `{}`",
                behavior.name(),
                node.name
            );
            return Ok(());
        }

        behavior.init();
        behavior.attach(key);
        self.nodes[key].behaviors.push(behavior);
        Ok(())
    }

    /// Detach and remove a behavior by name, returning it to the caller.
    pub fn remove_behavior(&mut self, key: NodeKey, name: &str) -> Option<Box<dyn Behavior>> {
        let index = self.nodes[key]
            .behaviors
            .iter()
            .position(|behavior| behavior.name() == name)?;

        let mut behavior = self.nodes[key].behaviors.remove(index);
        behavior.detach();
        Some(behavior)
    }

    /// Subscribe to a node's disposal. The observer fires exactly once,
    /// synchronously, during `dispose`, after the node's descendants have
    /// been disposed and the node itself detached.
    pub fn on_dispose(&mut self, key: NodeKey, observer: impl FnMut(&mut Scene, NodeKey) + 'static) {
        self.nodes[key].on_dispose.push(Box::new(observer));
    }

    /// Install the readiness callback fired on each false-to-true transition
    /// of the node's ready flag.
    pub fn on_ready(&mut self, key: NodeKey, callback: impl FnMut(&mut Scene, NodeKey) + 'static) {
        self.nodes[key].on_ready = Some(Box::new(callback));
    }

    /// Flip a node's readiness latch.
    ///
    /// Setting `false` before the node ever transitioned to ready is a no-op
    /// on the callback; setting `true` fires the `on_ready` callback.
    pub fn set_ready(&mut self, key: NodeKey, ready: bool) {
        let node = &mut self.nodes[key];
        if node.ready == ready {
            return;
        }
        if !ready {
            node.ready = false;
            return;
        }
        node.ready = true;
        if let Some(mut callback) = self.nodes[key].on_ready.take() {
            callback(self, key);
            let node = &mut self.nodes[key];
            if node.on_ready.is_none() {
                node.on_ready = Some(callback);
            }
        }
    }

    /// Start playback of a named animation range on a node.
    ///
    /// Returns `None` when the range is not registered; callers must check.
    pub fn begin_animation(
        &mut self,
        key: NodeKey,
        range_name: &str,
        loop_animation: bool,
        speed_ratio: f32,
    ) -> Option<Animatable> {
        let range = self.nodes[key].get_animation_range(range_name)?;
        Some(Animatable {
            target: key,
            from: range.from,
            to: range.to,
            loop_animation,
            speed_ratio,
        })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_are_monotonic_and_never_reused() {
        let mut scene = Scene::new();
        let a = scene.add_node("a");
        let b = scene.add_node("b");
        assert!(scene.node(a).unique_id() < scene.node(b).unique_id());

        scene.dispose(a, false);
        let c = scene.add_node("c");
        assert!(scene.node(c).unique_id() > scene.node(b).unique_id());
    }

    #[test]
    fn test_new_nodes_are_roots() {
        let mut scene = Scene::new();
        let a = scene.add_node("a");
        let b = scene.add_transform_node("b");
        assert_eq!(scene.root_nodes(), &[a, b]);
    }

    #[test]
    fn test_render_id_monotonic() {
        let mut scene = Scene::new();
        assert_eq!(scene.render_id(), 0);
        scene.increment_render_id();
        scene.increment_render_id();
        assert_eq!(scene.render_id(), 2);
    }

    #[test]
    fn test_begin_animation_missing_range_returns_none() {
        let mut scene = Scene::new();
        let node = scene.add_node("animated");
        assert!(scene.begin_animation(node, "walk", true, 1.0).is_none());

        scene.node_mut(node).create_animation_range("walk", 0.0, 30.0);
        let playback = scene.begin_animation(node, "walk", true, 1.0).unwrap();
        assert_eq!(playback.from, 0.0);
        assert_eq!(playback.to, 30.0);
        assert_eq!(playback.target, node);
    }

    #[test]
    fn test_ready_latch_contract() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut scene = Scene::new();
        let node = scene.add_node("loader");
        let fired = Rc::new(Cell::new(0));
        let observed = Rc::clone(&fired);
        scene.on_ready(node, move |_, _| observed.set(observed.get() + 1));

        // Nodes start ready; pulling the latch down fires nothing.
        assert!(scene.node(node).is_ready());
        scene.set_ready(node, false);
        assert!(!scene.node(node).is_ready());
        assert_eq!(fired.get(), 0);

        // The rising edge fires the callback once.
        scene.set_ready(node, true);
        assert_eq!(fired.get(), 1);
        scene.set_ready(node, true);
        assert_eq!(fired.get(), 1);
    }
}
