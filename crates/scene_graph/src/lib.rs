//! # Scene Graph
//!
//! The scene-graph update and world-matrix computation core of a modular
//! 3D engine.
//!
//! ## Features
//!
//! - **Arena-owned hierarchy**: nodes live in a [`slotmap`] arena keyed by
//!   [`NodeKey`]; parent links are non-owning keys, so dynamic reparenting
//!   never creates ownership cycles
//! - **Render-id gated caching**: world matrices are recomputed at most once
//!   per frame epoch, with an O(depth) synchronization check for deep chains
//! - **Enable/disable propagation**: effective enabled state is derived
//!   top-down over the ancestor chain
//! - **Lifecycle hooks**: dispose observers, readiness callbacks, and
//!   pluggable [`Behavior`] attachments
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_graph::prelude::*;
//!
//! let mut scene = Scene::new();
//! let root = scene.add_transform_node("root");
//! let child = scene.add_transform_node("child");
//! scene.set_parent(child, Some(root))?;
//!
//! scene
//!     .node_mut(child)
//!     .transform_mut()
//!     .unwrap()
//!     .set_position(Vec3::new(1.0, 0.0, 0.0));
//!
//! let world = scene.get_world_matrix(child);
//! assert_eq!(world[(0, 3)], 1.0);
//! # Ok::<(), scene_graph::SceneError>(())
//! ```

// Foundation utilities (math aliases, logging)
pub mod foundation;

pub mod animation;
pub mod behavior;
pub mod scene;

pub use animation::{Animatable, Animation, AnimationRange};
pub use behavior::Behavior;
pub use scene::{
    BillboardMode, Node, NodeKey, NodeKind, Scene, SceneError, SceneStats, TransformState,
};

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        animation::{Animatable, Animation, AnimationRange},
        behavior::Behavior,
        foundation::math::{Mat4, Quat, Vec3},
        scene::{BillboardMode, Node, NodeKey, Scene, SceneError, TransformState},
    };
}
