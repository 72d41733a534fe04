//! Error types shared by the rendering core.

use thiserror::Error;

use crate::gfx::device::{DeviceError, ShaderKind};

pub type Result<T> = std::result::Result<T, GfxError>;

#[derive(Debug, Error)]
pub enum GfxError {
    /// The shader compiler rejected a source; `log` is its diagnostic output.
    #[error("{kind} shader failed to compile:\n{log}")]
    ShaderCompile { kind: ShaderKind, log: String },

    /// The linker rejected a vertex/fragment pair.
    #[error("shader program failed to link:\n{log}")]
    ProgramLink { log: String },

    #[error("no shader source registered under '{name}'")]
    MissingShaderSource { name: String },

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// 16-bit index buffers address at most 65536 vertices.
    #[error("mesh has {vertex_count} vertices, more than 16-bit indices can address")]
    IndexOverflow { vertex_count: usize },

    #[error("no mesh with id {0}")]
    UnknownMesh(usize),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
