//! Local transform state for transform-capable nodes
//!
//! Holds position, rotation (Euler or quaternion), scaling, and the billboard
//! mode, plus the dirty flag and the snapshot cache consumed by the
//! synchronization protocol. Every mutator flips the dirty flag; the next
//! `compute_world_matrix` call consumes it.

use bitflags::bitflags;

use crate::foundation::math::{compose_trs, Mat4, Quat, Vec3};

bitflags! {
    /// Axes on which a node orients itself toward the active camera.
    ///
    /// Any non-empty mode forces resynchronization on every frame, since the
    /// composed matrix then depends on camera state the snapshot cache cannot
    /// see. The camera-dependent composition itself is the renderer's
    /// concern, not this crate's.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BillboardMode: u32 {
        /// Billboard around the X axis
        const X = 0b0001;
        /// Billboard around the Y axis
        const Y = 0b0010;
        /// Billboard around the Z axis
        const Z = 0b0100;
        /// Billboard on all three axes
        const ALL = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
        /// Orient using the node position rather than only its rotation
        const USE_POSITION = 0b1_0000;
    }
}

/// Snapshot of the composed fields at the last recompute.
///
/// The scaling snapshot starts at zero on purpose: a fresh node's live
/// scaling of one can never match it, so the first synchronization check
/// always fails and the first compute does real work.
#[derive(Debug, Clone, Copy)]
struct TransformCache {
    position: Vec3,
    rotation: Vec3,
    rotation_quaternion: Option<Quat>,
    scaling: Vec3,
    billboard_mode: BillboardMode,
}

impl Default for TransformCache {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            rotation_quaternion: None,
            scaling: Vec3::zeros(),
            billboard_mode: BillboardMode::empty(),
        }
    }
}

/// Position, rotation, and scaling of a transform node.
///
/// Rotation has two mutually exclusive representations: when a quaternion is
/// present it is authoritative and the Euler triple is ignored by the compose
/// step. Assigning an Euler rotation drops the quaternion.
#[derive(Debug, Clone)]
pub struct TransformState {
    position: Vec3,
    rotation: Vec3,
    rotation_quaternion: Option<Quat>,
    scaling: Vec3,
    billboard_mode: BillboardMode,

    dirty: bool,
    frozen: bool,
    cache: TransformCache,
}

impl TransformState {
    /// Identity transform.
    pub fn new() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            rotation_quaternion: None,
            scaling: Vec3::new(1.0, 1.0, 1.0),
            billboard_mode: BillboardMode::empty(),
            dirty: false,
            frozen: false,
            cache: TransformCache::default(),
        }
    }

    /// Local position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Set the local position.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    /// Offset the local position.
    pub fn translate(&mut self, offset: Vec3) {
        self.set_position(self.position + offset);
    }

    /// Euler rotation in radians (x, y, z). Ignored while a quaternion is set.
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Set the Euler rotation. Drops any quaternion, restoring Euler
    /// authority.
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.rotation_quaternion = None;
        self.dirty = true;
    }

    /// Authoritative rotation quaternion, if one is set.
    pub fn rotation_quaternion(&self) -> Option<Quat> {
        self.rotation_quaternion
    }

    /// Install or clear the rotation quaternion.
    pub fn set_rotation_quaternion(&mut self, rotation: Option<Quat>) {
        self.rotation_quaternion = rotation;
        self.dirty = true;
    }

    /// Local scaling factors.
    pub fn scaling(&self) -> Vec3 {
        self.scaling
    }

    /// Set the local scaling factors.
    pub fn set_scaling(&mut self, scaling: Vec3) {
        self.scaling = scaling;
        self.dirty = true;
    }

    /// Current billboard mode.
    pub fn billboard_mode(&self) -> BillboardMode {
        self.billboard_mode
    }

    /// Change the billboard mode.
    pub fn set_billboard_mode(&mut self, mode: BillboardMode) {
        if self.billboard_mode == mode {
            return;
        }
        self.billboard_mode = mode;
    }

    /// Whether a mutation has been recorded since the last recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Whether the world matrix is frozen, see
    /// [`Scene::freeze_world_matrix`](super::Scene::freeze_world_matrix).
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Compose the local matrix: scale, then rotate, then translate.
    pub(crate) fn local_matrix(&self) -> Mat4 {
        let rotation = self.rotation_quaternion.unwrap_or_else(|| {
            Quat::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z)
        });
        compose_trs(&self.scaling, &rotation, &self.position)
    }

    pub(crate) fn init_cache(&mut self) {
        self.cache = TransformCache::default();
    }

    /// Snapshot the live fields for the next synchronization check.
    pub(crate) fn update_cache(&mut self) {
        self.cache.position = self.position;
        self.cache.rotation = self.rotation;
        self.cache.rotation_quaternion = self.rotation_quaternion;
        self.cache.scaling = self.scaling;
        self.cache.billboard_mode = self.billboard_mode;
    }

    /// Per-kind synchronization hook: the cached world matrix is still valid
    /// iff nothing observable changed since the snapshot was taken.
    pub(crate) fn is_cache_synchronized(&self) -> bool {
        if self.dirty {
            return false;
        }
        // Billboarded nodes depend on the camera every frame.
        if !self.billboard_mode.is_empty() || self.billboard_mode != self.cache.billboard_mode {
            return false;
        }
        if self.cache.position != self.position {
            return false;
        }
        match (self.rotation_quaternion, self.cache.rotation_quaternion) {
            (Some(live), Some(cached)) => {
                if live != cached {
                    return false;
                }
            }
            (Some(_), None) | (None, Some(_)) => return false,
            (None, None) => {
                if self.cache.rotation != self.rotation {
                    return false;
                }
            }
        }
        self.cache.scaling == self.scaling
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::new()
    }
}
