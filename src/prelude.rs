//! # Glint Prelude
//!
//! Commonly used types in one import:
//!
//! ```no_run
//! use glint::prelude::*;
//!
//! fn main() -> glint::Result<()> {
//!     init_logging(LoggingConfig::default());
//!     let config = RenderConfig::default();
//!     let mut render_loop = RenderLoop::setup(
//!         RecordingDevice::new(config.width, config.height),
//!         &ShaderLibrary::with_defaults(),
//!         &config,
//!         SceneDescription::triangles(),
//!     )?;
//!     let mut scheduler = ManualScheduler::new();
//!     render_loop.frame(&mut scheduler, &())?;
//!     Ok(())
//! }
//! ```

pub use crate::config::RenderConfig;
pub use crate::error::{GfxError, Result};
pub use crate::logging::{init_logging, LoggingConfig};

pub use crate::math::{Matrix4, Vector3};

pub use crate::gfx::backend::{RecordingDevice, WgpuDevice};
pub use crate::gfx::camera::Camera;
pub use crate::gfx::color::hsva;
pub use crate::gfx::device::GpuDevice;
pub use crate::gfx::geometry::{generate_torus, generate_triangle, MeshData, TorusParams};
pub use crate::gfx::render_loop::{
    FrameScheduler, FrameStats, ManualScheduler, RenderLoop, StaticToggles, Toggle, ToggleSource,
};
pub use crate::gfx::resources::{ResourceManager, ShaderLibrary};
pub use crate::gfx::scene::{Animation, SceneDescription, SceneObject};
pub use crate::gfx::transform::TransformPipeline;
