//! # Scene Description
//!
//! What the render loop draws: a camera, the meshes to upload, and an
//! ordered list of objects that each reference a mesh and animate their own
//! model matrix from the frame counter.
//!
//! - [`SceneObject`] - mesh reference, animation and current model matrix
//! - [`Animation`] - maps the frame angle to a model matrix
//! - [`SceneDescription`] - camera, meshes and objects, with tutorial presets

pub mod description;
pub mod object;

pub use description::SceneDescription;
pub use object::{Animation, SceneObject};
