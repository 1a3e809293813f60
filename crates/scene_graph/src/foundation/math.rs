//! Math utilities and types
//!
//! Provides fundamental math types for the scene-graph core. The heavy
//! lifting is delegated to `nalgebra`; this module only pins down the
//! aliases and the TRS composition convention used everywhere else.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Compose a local transform matrix from scaling, rotation, and translation.
///
/// Standard TRS order: scale first, then rotate, then translate. With
/// column-vector matrices this reads `Translation * Rotation * Scaling`.
pub fn compose_trs(scaling: &Vec3, rotation: &Quat, translation: &Vec3) -> Mat4 {
    Mat4::new_translation(translation)
        * rotation.to_homogeneous()
        * Mat4::new_nonuniform_scaling(scaling)
}

/// Extract the translation column of a transform matrix.
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
}
