//! World-matrix computation and the synchronization protocol
//!
//! The performance-critical path of the crate. Steady-state frames with a
//! static scene must hit the fast paths only: `get_world_matrix` returns the
//! cache untouched while the render-id stamp matches the current epoch, and
//! an unforced `compute_world_matrix` bails out after the synchronized check
//! without composing anything.
//!
//! Staleness detection is layered, cheapest first:
//! 1. render-id stamp vs. scene render-id (one integer compare),
//! 2. cached parent vs. live parent (reparent detection),
//! 3. stored parent-update-id vs. the parent's child-update-id, then the
//!    parent's own synchronized check recursively (O(depth) for a chain),
//! 4. the per-kind snapshot comparison of local transform fields.

use crate::foundation::math::{translation_of, Mat4, Vec3};

use super::node::NodeKind;
use super::{NodeKey, Scene};

impl Scene {
    /// World matrix of a node, recomputing only when the render-id stamp is
    /// stale.
    ///
    /// Render-id equality bypasses the synchronization machinery entirely:
    /// within one frame epoch a computed matrix is treated as immutable. A
    /// mutation made after the first read of an epoch is therefore not
    /// visible until the next epoch (or a forced recompute) — an intentional
    /// staleness window the render loop resolves by incrementing the
    /// render id once per frame.
    pub fn get_world_matrix(&mut self, key: NodeKey) -> Mat4 {
        if self.nodes[key].current_render_id != Some(self.render_id()) {
            return self.compute_world_matrix(key, false);
        }
        self.nodes[key].world_matrix
    }

    /// Cached world matrix with no staleness checks at all.
    ///
    /// For callers that know the matrix was refreshed this epoch. Before the
    /// first compute this is the identity: a defined, if meaningless, value.
    pub fn world_matrix_from_cache(&self, key: NodeKey) -> Mat4 {
        self.nodes[key].world_matrix
    }

    /// Recompute a node's world matrix unless the cache is provably current.
    ///
    /// Unforced calls take the fast path when the node is neither dirty nor
    /// desynchronized; the slow path composes the local TRS matrix, resolves
    /// the parent through its own synchronized check (force does not
    /// propagate upward), multiplies, and stamps the render id. Plain nodes
    /// have no local transform and return their cache unchanged.
    pub fn compute_world_matrix(&mut self, key: NodeKey, force: bool) -> Mat4 {
        let render_id = self.render_id();

        // Plain nodes have no local transform; their cache is the result.
        if matches!(self.nodes[key].kind, NodeKind::Plain) {
            return self.nodes[key].world_matrix;
        }

        {
            let node = &self.nodes[key];
            if let NodeKind::Transform(transform) = &node.kind {
                if transform.is_frozen() && !transform.is_dirty() {
                    return node.world_matrix;
                }
            }
        }

        let dirty = match &self.nodes[key].kind {
            NodeKind::Transform(transform) => transform.is_dirty(),
            NodeKind::Plain => false,
        };
        if !dirty && !force && self.is_synchronized(key) {
            let node = &mut self.nodes[key];
            node.current_render_id = Some(render_id);
            return node.world_matrix;
        }

        self.update_cache(key, true);

        let parent = self.nodes[key].parent;
        let local = {
            let node = &mut self.nodes[key];
            node.current_render_id = Some(render_id);
            node.child_update_id += 1;
            match &mut node.kind {
                NodeKind::Transform(transform) => {
                    transform.clear_dirty();
                    transform.local_matrix()
                }
                // No local transform to compose; the cache is the result.
                NodeKind::Plain => return node.world_matrix,
            }
        };

        let world = if let Some(parent) = parent {
            // The parent resolves its own staleness; a stale parent matrix is
            // never silently used.
            let parent_world = self.compute_world_matrix(parent, false);
            parent_world * local
        } else {
            local
        };

        let node = &mut self.nodes[key];
        node.world_matrix = world;
        node.determinant_is_dirty = true;
        self.mark_synced_with_parent(key);
        self.stats.world_matrix_recomputations += 1;
        world
    }

    /// Whether the cached world matrix still reflects the local transform
    /// and the parent chain.
    ///
    /// Updates the cache's stored parent as a side effect of the mismatch
    /// check, regardless of outcome.
    pub fn is_synchronized(&mut self, key: NodeKey) -> bool {
        let parent = self.nodes[key].parent;
        let node = &mut self.nodes[key];

        if node.cache.parent != parent {
            node.cache.parent = parent;
            return false;
        }

        if parent.is_some() && !self.is_synchronized_with_parent(key) {
            return false;
        }

        match &self.nodes[key].kind {
            NodeKind::Plain => true,
            NodeKind::Transform(transform) => transform.is_cache_synchronized(),
        }
    }

    /// Whether this node has observed the parent's latest recompute, and the
    /// parent itself is synchronized. The update-id compare keeps a deep
    /// chain's invalidation at O(depth).
    pub fn is_synchronized_with_parent(&mut self, key: NodeKey) -> bool {
        let Some(parent) = self.nodes[key].parent else {
            return true;
        };
        if self.nodes[key].parent_update_id != Some(self.nodes[parent].child_update_id) {
            return false;
        }
        self.is_synchronized(parent)
    }

    /// Refresh the synchronization cache: store the live parent and take a
    /// snapshot of the local transform fields. A no-op when not forced and
    /// already synchronized.
    pub fn update_cache(&mut self, key: NodeKey, force: bool) {
        if !force && self.is_synchronized(key) {
            return;
        }
        let parent = self.nodes[key].parent;
        let node = &mut self.nodes[key];
        node.cache.parent = parent;
        if let NodeKind::Transform(transform) = &mut node.kind {
            transform.update_cache();
        }
    }

    /// Stamp this node as caught up with its parent's current update id.
    pub(crate) fn mark_synced_with_parent(&mut self, key: NodeKey) {
        if let Some(parent) = self.nodes[key].parent {
            let parent_child_update_id = self.nodes[parent].child_update_id;
            self.nodes[key].parent_update_id = Some(parent_child_update_id);
        }
    }

    /// Force the next `get_world_matrix` to recompute, bypassing the
    /// render-id short circuit.
    pub fn mark_as_dirty(&mut self, key: NodeKey) {
        let node = &mut self.nodes[key];
        node.current_render_id = None;
        if let NodeKind::Transform(transform) = &mut node.kind {
            transform.mark_dirty();
        }
    }

    /// Recompute once, then pin the world matrix: compute becomes a no-op
    /// until the node is unfrozen or explicitly dirtied.
    pub fn freeze_world_matrix(&mut self, key: NodeKey) {
        self.compute_world_matrix(key, true);
        if let NodeKind::Transform(transform) = &mut self.nodes[key].kind {
            transform.set_frozen(true);
        }
    }

    /// Release a frozen world matrix and recompute it.
    pub fn unfreeze_world_matrix(&mut self, key: NodeKey) {
        if let NodeKind::Transform(transform) = &mut self.nodes[key].kind {
            transform.set_frozen(false);
        }
        self.compute_world_matrix(key, false);
    }

    /// Determinant of the cached world matrix, computed lazily and
    /// invalidated by each recompute.
    pub fn world_matrix_determinant(&mut self, key: NodeKey) -> f32 {
        let node = &mut self.nodes[key];
        if node.determinant_is_dirty {
            node.world_matrix_determinant = node.world_matrix.determinant();
            node.determinant_is_dirty = false;
        }
        node.world_matrix_determinant
    }

    /// World-space position: the translation column of the node's world
    /// matrix, refreshed for the current epoch.
    pub fn absolute_position(&mut self, key: NodeKey) -> Vec3 {
        let world = self.get_world_matrix(key);
        translation_of(&world)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::foundation::math::Quat;

    fn parented_pair(scene: &mut Scene) -> (NodeKey, NodeKey) {
        let parent = scene.add_transform_node("parent");
        let child = scene.add_transform_node("child");
        scene.set_parent(child, Some(parent)).unwrap();
        (parent, child)
    }

    fn set_position(scene: &mut Scene, key: NodeKey, position: Vec3) {
        scene
            .node_mut(key)
            .transform_mut()
            .unwrap()
            .set_position(position);
    }

    #[test]
    fn test_unforced_recompute_is_idempotent() {
        let mut scene = Scene::new();
        let (parent, child) = parented_pair(&mut scene);
        set_position(&mut scene, parent, Vec3::new(1.0, 2.0, 3.0));

        let first = scene.compute_world_matrix(child, false);
        let after_first = scene.stats().world_matrix_recomputations;

        let second = scene.compute_world_matrix(child, false);
        let after_second = scene.stats().world_matrix_recomputations;

        assert_eq!(first, second);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_parent_composition_law() {
        let mut scene = Scene::new();
        let (parent, child) = parented_pair(&mut scene);
        {
            let transform = scene.node_mut(parent).transform_mut().unwrap();
            transform.set_position(Vec3::new(1.0, 0.0, 0.0));
            transform.set_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
            transform.set_scaling(Vec3::new(2.0, 1.0, 1.0));
        }
        set_position(&mut scene, child, Vec3::new(0.0, 0.0, 1.0));

        let world = scene.compute_world_matrix(child, true);
        let parent_world = scene.world_matrix_from_cache(parent);
        let child_local = scene.node(child).transform().unwrap().local_matrix();

        assert_relative_eq!(world, parent_world * child_local, epsilon = 1e-5);
    }

    #[test]
    fn test_world_matrix_of_root_is_local() {
        let mut scene = Scene::new();
        let node = scene.add_transform_node("solo");
        set_position(&mut scene, node, Vec3::new(3.0, -2.0, 0.5));

        let world = scene.get_world_matrix(node);
        assert_relative_eq!(translation_of(&world), Vec3::new(3.0, -2.0, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_reparenting_recomposes_through_new_parent() {
        let mut scene = Scene::new();
        let a = scene.add_transform_node("a");
        let b = scene.add_transform_node("b");
        let c = scene.add_transform_node("c");
        scene.set_parent(c, Some(a)).unwrap();
        set_position(&mut scene, a, Vec3::new(10.0, 0.0, 0.0));
        set_position(&mut scene, b, Vec3::new(0.0, 20.0, 0.0));
        set_position(&mut scene, c, Vec3::new(1.0, 0.0, 0.0));

        let world = scene.get_world_matrix(c);
        assert_relative_eq!(translation_of(&world), Vec3::new(11.0, 0.0, 0.0), epsilon = 1e-5);

        scene.set_parent(c, Some(b)).unwrap();
        scene.increment_render_id();
        let world = scene.compute_world_matrix(c, true);
        assert_relative_eq!(translation_of(&world), Vec3::new(1.0, 20.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_stale_parent_is_never_silently_used() {
        let mut scene = Scene::new();
        let (parent, child) = parented_pair(&mut scene);
        set_position(&mut scene, child, Vec3::new(1.0, 0.0, 0.0));
        scene.get_world_matrix(child);

        set_position(&mut scene, parent, Vec3::new(0.0, 5.0, 0.0));
        scene.increment_render_id();

        // The child itself is clean; only the parent moved.
        let world = scene.get_world_matrix(child);
        assert_relative_eq!(translation_of(&world), Vec3::new(1.0, 5.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_deep_chain_propagation() {
        let mut scene = Scene::new();
        let mut keys = Vec::new();
        let mut parent = None;
        for depth in 0..16 {
            let key = scene.add_transform_node(&format!("link_{depth}"));
            scene.set_parent(key, parent).unwrap();
            set_position(&mut scene, key, Vec3::new(1.0, 0.0, 0.0));
            parent = Some(key);
            keys.push(key);
        }

        let leaf = *keys.last().unwrap();
        let world = scene.get_world_matrix(leaf);
        assert_relative_eq!(translation_of(&world), Vec3::new(16.0, 0.0, 0.0), epsilon = 1e-4);

        // Move the root; the whole chain resynchronizes next epoch.
        set_position(&mut scene, keys[0], Vec3::new(2.0, 0.0, 0.0));
        scene.increment_render_id();
        let world = scene.get_world_matrix(leaf);
        assert_relative_eq!(translation_of(&world), Vec3::new(17.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_quaternion_rotation_in_world_matrix() {
        use std::f32::consts::FRAC_PI_2;

        let mut scene = Scene::new();
        let node = scene.add_transform_node("spinner");
        scene
            .node_mut(node)
            .transform_mut()
            .unwrap()
            .set_rotation_quaternion(Some(Quat::from_euler_angles(0.0, 0.0, FRAC_PI_2)));

        let world = scene.get_world_matrix(node);
        let mapped = world.transform_vector(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(mapped, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_world_matrix_from_cache_before_first_compute() {
        let mut scene = Scene::new();
        let node = scene.add_transform_node("untouched");
        set_position(&mut scene, node, Vec3::new(9.0, 9.0, 9.0));

        // No compute has run: the cache is still the identity.
        assert_eq!(scene.world_matrix_from_cache(node), Mat4::identity());
    }

    #[test]
    fn test_plain_node_world_matrix_is_identity() {
        let mut scene = Scene::new();
        let group = scene.add_node("group");
        assert_eq!(scene.get_world_matrix(group), Mat4::identity());
        assert_eq!(scene.compute_world_matrix(group, true), Mat4::identity());
    }

    #[test]
    fn test_mark_as_dirty_defeats_render_id_short_circuit() {
        let mut scene = Scene::new();
        let node = scene.add_transform_node("n");
        set_position(&mut scene, node, Vec3::new(1.0, 0.0, 0.0));
        scene.get_world_matrix(node);

        set_position(&mut scene, node, Vec3::new(2.0, 0.0, 0.0));
        // Same epoch: stale read.
        assert_relative_eq!(
            translation_of(&scene.get_world_matrix(node)),
            Vec3::new(1.0, 0.0, 0.0),
            epsilon = 1e-6
        );

        scene.mark_as_dirty(node);
        assert_relative_eq!(
            translation_of(&scene.get_world_matrix(node)),
            Vec3::new(2.0, 0.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_freeze_world_matrix() {
        let mut scene = Scene::new();
        let node = scene.add_transform_node("statue");
        set_position(&mut scene, node, Vec3::new(1.0, 1.0, 1.0));
        scene.freeze_world_matrix(node);

        // Forced recomputes are ignored while frozen and clean.
        let frozen = scene.world_matrix_from_cache(node);
        let recomputed = scene.compute_world_matrix(node, true);
        assert_eq!(frozen, recomputed);

        scene.unfreeze_world_matrix(node);
        set_position(&mut scene, node, Vec3::new(5.0, 1.0, 1.0));
        scene.increment_render_id();
        assert_relative_eq!(
            translation_of(&scene.get_world_matrix(node)),
            Vec3::new(5.0, 1.0, 1.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_determinant_caching() {
        let mut scene = Scene::new();
        let node = scene.add_transform_node("scaled");
        // Identity world matrix before any compute.
        assert_relative_eq!(scene.world_matrix_determinant(node), 1.0, epsilon = 1e-6);

        scene
            .node_mut(node)
            .transform_mut()
            .unwrap()
            .set_scaling(Vec3::new(2.0, 2.0, 2.0));
        scene.compute_world_matrix(node, true);
        assert_relative_eq!(scene.world_matrix_determinant(node), 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_absolute_position() {
        let mut scene = Scene::new();
        let (parent, child) = parented_pair(&mut scene);
        set_position(&mut scene, parent, Vec3::new(0.0, 3.0, 0.0));
        set_position(&mut scene, child, Vec3::new(2.0, 0.0, 0.0));

        assert_relative_eq!(
            scene.absolute_position(child),
            Vec3::new(2.0, 3.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_render_id_never_ahead_of_scene() {
        let mut scene = Scene::new();
        let node = scene.add_transform_node("n");
        scene.increment_render_id();
        scene.increment_render_id();
        scene.get_world_matrix(node);
        assert_eq!(scene.node(node).current_render_id, Some(scene.render_id()));
    }
}
