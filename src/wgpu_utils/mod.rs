//! WGPU utility functions and helpers
//!
//! Small wrappers the wgpu backend builds its bind groups and per-draw
//! uniform storage from.

pub mod binding_types;
pub mod uniform_buffer;

pub use binding_types::*;
pub use uniform_buffer::DynamicUniformBuffer;
