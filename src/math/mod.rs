//! # Transform Math
//!
//! Small, allocation-free linear algebra for placing geometry on screen:
//!
//! - [`Vector3`] - positions, offsets, rotation axes, scale factors, camera vectors
//! - [`Matrix4`] - column-major 4x4 transforms
//!
//! The free functions in [`mat4`] follow a destination-slot contract: every
//! operation takes its inputs by reference and overwrites a caller-owned
//! `&mut Matrix4`, so per-frame code can reuse preallocated matrices. The
//! result is always computed into a temporary first, which makes it safe to
//! pass a copy of the destination as an input.

pub mod mat4;
pub mod vec3;

pub use mat4::Matrix4;
pub use vec3::Vector3;
