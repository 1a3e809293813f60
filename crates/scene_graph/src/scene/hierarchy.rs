//! Hierarchy mutation, enablement propagation, traversal, and disposal
//!
//! Everything here that touches more than one node lives on [`Scene`], since
//! the arena is the single owner of all nodes. Traversal snapshots child
//! lists before recursing wherever callbacks may run, so disposing unrelated
//! nodes from inside a callback is safe; mutating the exact list being walked
//! from a predicate is not supported.

use log::{debug, trace, warn};

use super::{Node, NodeKey, Scene, SceneError};

impl Scene {
    /// Reparent `child` under `new_parent`, or detach it to the scene roots
    /// when `new_parent` is `None`.
    ///
    /// A no-op when the parent is unchanged. The move is atomic with respect
    /// to the child lists and the root list, and the effective enabled state
    /// of the whole moved subtree is recomputed afterwards.
    ///
    /// # Errors
    ///
    /// [`SceneError::NodeDisposed`] when either end has been disposed, and
    /// [`SceneError::CyclicParenting`] when `new_parent` is `child` itself or
    /// one of its descendants. Neither error leaves a partial change behind.
    pub fn set_parent(
        &mut self,
        child: NodeKey,
        new_parent: Option<NodeKey>,
    ) -> Result<(), SceneError> {
        if self.nodes[child].parent == new_parent {
            return Ok(());
        }
        if self.nodes[child].disposed {
            return Err(SceneError::NodeDisposed(self.nodes[child].name.clone()));
        }
        if let Some(parent) = new_parent {
            if self.nodes[parent].disposed {
                return Err(SceneError::NodeDisposed(self.nodes[parent].name.clone()));
            }
            if parent == child || self.is_descendant_of(parent, child) {
                return Err(SceneError::CyclicParenting {
                    child: self.nodes[child].name.clone(),
                    parent: self.nodes[parent].name.clone(),
                });
            }
        }

        let previous_parent = self.nodes[child].parent;

        // Leave the old parent's child list, or become a root again.
        if let Some(old_parent) = previous_parent {
            self.nodes[old_parent].children.retain(|&key| key != child);
            if new_parent.is_none() {
                self.add_to_root_nodes(child);
            }
        }

        self.nodes[child].parent = new_parent;

        // Join the new parent's child list; a former root stops being one.
        if let Some(parent) = new_parent {
            self.nodes[parent].children.push(child);
            if previous_parent.is_none() {
                self.remove_from_root_nodes(child);
            }
        }

        trace!(
            "reparented `{}` ({:?} -> {:?})",
            self.nodes[child].name,
            previous_parent,
            new_parent
        );

        // World-matrix staleness is implicit: the synchronization cache
        // notices the parent change on the next access.
        self.sync_parent_enabled_state(child);
        Ok(())
    }

    /// True when `ancestor` appears anywhere in `key`'s parent chain.
    pub fn is_descendant_of(&self, key: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = self.nodes[key].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes[parent].parent;
        }
        false
    }

    /// Set a node's own enabled flag and recompute the derived state of the
    /// node and every descendant.
    pub fn set_enabled(&mut self, key: NodeKey, enabled: bool) {
        self.nodes[key].enabled = enabled;
        self.sync_parent_enabled_state(key);
    }

    /// Effective enabled state, see [`Node::is_enabled`].
    pub fn is_enabled(&self, key: NodeKey, check_ancestors: bool) -> bool {
        self.nodes[key].is_enabled(check_ancestors)
    }

    /// Recompute the cached ancestor-derived enabled state for a node and,
    /// depth-first, for all of its descendants. Runs for every descendant
    /// regardless of their own flags, so arbitrarily nested nodes stay
    /// consistent.
    pub(crate) fn sync_parent_enabled_state(&mut self, key: NodeKey) {
        let parent_enabled = match self.nodes[key].parent {
            Some(parent) => self.nodes[parent].is_enabled(true),
            None => true,
        };
        self.nodes[key].parent_enabled = parent_enabled;

        let children = self.nodes[key].children.clone();
        for child in children {
            self.sync_parent_enabled_state(child);
        }
    }

    /// Descendants of a node in pre-order, children before their own
    /// children's siblings. With `direct_descendants_only` the walk stops at
    /// depth one.
    pub fn get_descendants(&self, key: NodeKey, direct_descendants_only: bool) -> Vec<NodeKey> {
        self.get_descendants_where(key, direct_descendants_only, |_, _| true)
    }

    /// Filtered pre-order walk. A node failing the predicate is skipped but
    /// its subtree is still visited, since a non-matching node can have
    /// matching descendants.
    pub fn get_descendants_where<F>(
        &self,
        key: NodeKey,
        direct_descendants_only: bool,
        predicate: F,
    ) -> Vec<NodeKey>
    where
        F: Fn(NodeKey, &Node) -> bool,
    {
        let mut results = Vec::new();
        self.walk_descendants(key, direct_descendants_only, &predicate, &mut results);
        results
    }

    fn walk_descendants(
        &self,
        key: NodeKey,
        direct_descendants_only: bool,
        predicate: &dyn Fn(NodeKey, &Node) -> bool,
        results: &mut Vec<NodeKey>,
    ) {
        for &child in &self.nodes[key].children {
            if predicate(child, &self.nodes[child]) {
                results.push(child);
            }
            if !direct_descendants_only {
                self.walk_descendants(child, false, predicate, results);
            }
        }
    }

    /// Direct children only, in insertion order.
    pub fn get_children(&self, key: NodeKey) -> Vec<NodeKey> {
        self.get_descendants(key, true)
    }

    /// Transform-capable descendants.
    pub fn get_child_transform_nodes(
        &self,
        key: NodeKey,
        direct_descendants_only: bool,
    ) -> Vec<NodeKey> {
        self.get_descendants_where(key, direct_descendants_only, |_, node| {
            node.transform().is_some()
        })
    }

    /// Dispose a node and, unless `do_not_recurse`, its whole subtree.
    ///
    /// The disposed flag is latched before anything else, so reentrant
    /// queries during disposal already see the node as disposed and a second
    /// `dispose` call is a no-op. Direct children are snapshotted before the
    /// recursion so each descendant is disposed exactly once even as they
    /// detach themselves mid-walk. With `do_not_recurse`, direct transform
    /// children are released to the scene roots with a forced recompute so
    /// they keep a current world placement.
    ///
    /// Order per node: descendants first, then detach from parent/root list,
    /// then fire and clear the dispose observers, then detach behaviors.
    pub fn dispose(&mut self, key: NodeKey, do_not_recurse: bool) {
        if self.nodes[key].disposed {
            return;
        }
        self.nodes[key].disposed = true;

        if do_not_recurse {
            let transform_children = self.get_child_transform_nodes(key, true);
            for child in transform_children {
                if let Err(error) = self.set_parent(child, None) {
                    warn!("failed to release `{}`: {error}", self.nodes[child].name);
                    continue;
                }
                self.compute_world_matrix(child, true);
            }
        } else {
            let children = self.nodes[key].children.clone();
            for child in children {
                self.dispose(child, do_not_recurse);
            }
        }

        // Detach without re-adding to the root list: disposed nodes leave
        // the graph entirely.
        if let Some(parent) = self.nodes[key].parent {
            self.nodes[parent].children.retain(|&child| child != key);
            self.nodes[key].parent = None;
        } else {
            self.remove_from_root_nodes(key);
        }

        let mut observers = std::mem::take(&mut self.nodes[key].on_dispose);
        for observer in &mut observers {
            observer(self, key);
        }

        let mut behaviors = std::mem::take(&mut self.nodes[key].behaviors);
        for behavior in &mut behaviors {
            behavior.detach();
        }

        debug!("disposed node `{}`", self.nodes[key].name);
    }

    pub(crate) fn add_to_root_nodes(&mut self, key: NodeKey) {
        if self.nodes[key].root_index.is_none() {
            self.nodes[key].root_index = Some(self.root_nodes.len());
            self.root_nodes.push(key);
        }
    }

    /// O(1) removal: swap the departing root with the last one, patch the
    /// moved node's stored index, pop.
    pub(crate) fn remove_from_root_nodes(&mut self, key: NodeKey) {
        if let Some(index) = self.nodes[key].root_index.take() {
            let last = self.root_nodes.len() - 1;
            if index != last {
                let moved = self.root_nodes[last];
                self.root_nodes[index] = moved;
                self.nodes[moved].root_index = Some(index);
            }
            self.root_nodes.pop();
        }
    }
}
