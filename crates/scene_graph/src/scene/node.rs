//! Node data model
//!
//! A [`Node`] is the base entity of the scene graph: identity, hierarchy
//! links, enabled-state, readiness, animation-range bookkeeping, behavior
//! attachments, and the synchronization bookkeeping that gates world-matrix
//! recomputation. Transform-capable nodes additionally carry a
//! [`TransformState`](super::TransformState) payload.
//!
//! Structural operations (reparenting, disposal, world-matrix computation)
//! live on [`Scene`](super::Scene), since they need access to more than one
//! node at a time.

use std::collections::HashMap;
use std::fmt;

use crate::animation::{Animation, AnimationRange};
use crate::behavior::Behavior;
use crate::foundation::math::Mat4;

use super::transform::TransformState;
use super::{NodeCallback, NodeKey};

/// Closed set of node capabilities.
///
/// The per-kind synchronization hooks dispatch over this enum: a plain node
/// is always considered synchronized (its world matrix never changes), while
/// a transform node compares its live fields against the cached snapshot.
pub enum NodeKind {
    /// Grouping/identity node with no local transform of its own
    Plain,
    /// Node carrying position/rotation/scaling state
    Transform(TransformState),
}

/// Generic memo record for the synchronized-check algorithm.
///
/// Distinguishes "never initialized" from "initialized"; a second
/// `init_cache` call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NodeCache {
    pub(crate) initialized: bool,
    /// Parent observed at the last synchronization check
    pub(crate) parent: Option<NodeKey>,
}

/// Base entity of the scene graph.
pub struct Node {
    /// User-facing name, not guaranteed unique
    pub name: String,
    /// User-facing id, not guaranteed unique; defaults to the name
    pub id: String,
    unique_id: u64,

    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    /// Index into the scene root list; `None` when the node is not a root
    pub(crate) root_index: Option<usize>,

    pub(crate) enabled: bool,
    pub(crate) parent_enabled: bool,
    pub(crate) ready: bool,
    pub(crate) disposed: bool,

    pub(crate) world_matrix: Mat4,
    pub(crate) world_matrix_determinant: f32,
    pub(crate) determinant_is_dirty: bool,

    /// Render-id at the last successful recompute; `None` until then, so the
    /// first read always recomputes
    pub(crate) current_render_id: Option<u64>,
    /// Bumped on every recompute so children can cheaply detect parent change
    pub(crate) child_update_id: u64,
    /// The parent's `child_update_id` observed at the last recompute
    pub(crate) parent_update_id: Option<u64>,
    pub(crate) cache: NodeCache,

    /// Animation tracks attached to this node
    pub animations: Vec<Animation>,
    ranges: HashMap<String, AnimationRange>,
    pub(crate) behaviors: Vec<Box<dyn Behavior>>,

    pub(crate) on_dispose: Vec<NodeCallback>,
    pub(crate) on_ready: Option<NodeCallback>,

    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(name: &str, unique_id: u64, kind: NodeKind) -> Self {
        Self {
            name: name.to_owned(),
            id: name.to_owned(),
            unique_id,
            parent: None,
            children: Vec::new(),
            root_index: None,
            enabled: true,
            parent_enabled: true,
            ready: true,
            disposed: false,
            world_matrix: Mat4::identity(),
            world_matrix_determinant: 0.0,
            determinant_is_dirty: true,
            current_render_id: None,
            child_update_id: 0,
            parent_update_id: None,
            cache: NodeCache::default(),
            animations: Vec::new(),
            ranges: HashMap::new(),
            behaviors: Vec::new(),
            on_dispose: Vec::new(),
            on_ready: None,
            kind,
        }
    }

    /// Initialize the synchronization cache. Idempotent.
    pub(crate) fn init_cache(&mut self) {
        if self.cache.initialized {
            return;
        }
        self.cache.initialized = true;
        self.cache.parent = None;

        if let NodeKind::Transform(transform) = &mut self.kind {
            transform.init_cache();
        }
    }

    /// Scene-wide identity, assigned once at construction and never reused.
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    /// Parent handle, if attached below another node.
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Direct children in insertion order.
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Capability set of this node.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Transform payload, `None` for plain nodes.
    pub fn transform(&self) -> Option<&TransformState> {
        match &self.kind {
            NodeKind::Transform(transform) => Some(transform),
            NodeKind::Plain => None,
        }
    }

    /// Mutable transform payload, `None` for plain nodes.
    pub fn transform_mut(&mut self) -> Option<&mut TransformState> {
        match &mut self.kind {
            NodeKind::Transform(transform) => Some(transform),
            NodeKind::Plain => None,
        }
    }

    /// Whether the node has been disposed. Latched; never reverts.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Readiness latch, see [`Scene::set_ready`](super::Scene::set_ready).
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Effective enabled state.
    ///
    /// With `check_ancestors` false only the node's own flag is reported;
    /// otherwise the flag is combined with the cached ancestor-derived state.
    pub fn is_enabled(&self, check_ancestors: bool) -> bool {
        if !check_ancestors {
            return self.enabled;
        }
        self.enabled && self.parent_enabled
    }

    /// Look up an animation track by name.
    pub fn get_animation_by_name(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|animation| animation.name == name)
    }

    /// Register a named frame range and fan it out to every attached
    /// animation track. A name already in use is left untouched.
    pub fn create_animation_range(&mut self, name: &str, from: f32, to: f32) {
        if self.ranges.contains_key(name) {
            return;
        }
        self.ranges
            .insert(name.to_owned(), AnimationRange::new(name, from, to));
        for animation in &mut self.animations {
            animation.create_range(name, from, to);
        }
    }

    /// Delete a named frame range from this node and every attached track.
    pub fn delete_animation_range(&mut self, name: &str, delete_frames: bool) {
        for animation in &mut self.animations {
            animation.delete_range(name, delete_frames);
        }
        self.ranges.remove(name);
    }

    /// Look up a named frame range.
    pub fn get_animation_range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.get(name)
    }

    /// Snapshot of all registered ranges, for serialization.
    pub fn animation_ranges(&self) -> Vec<AnimationRange> {
        self.ranges.values().cloned().collect()
    }

    /// Look up an attached behavior by name.
    pub fn get_behavior_by_name(&self, name: &str) -> Option<&dyn Behavior> {
        self.behaviors
            .iter()
            .find(|behavior| behavior.name() == name)
            .map(AsRef::as_ref)
    }

    /// Names of all attached behaviors, in attach order.
    pub fn behavior_names(&self) -> Vec<&str> {
        self.behaviors.iter().map(|behavior| behavior.name()).collect()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("unique_id", &self.unique_id)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("enabled", &self.enabled)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
