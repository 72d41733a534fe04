//! GPU resource management
//!
//! Shader programs, vertex and index buffers, and the offscreen textures of
//! the wgpu backend.

pub mod manager;
pub mod shader_library;
pub mod texture_resource;

pub use manager::{GpuMesh, MeshAttributes, MeshId, ResourceManager, ShaderProgram};
pub use shader_library::ShaderLibrary;
pub use texture_resource::TextureResource;
