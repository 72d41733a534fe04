//! # Graphics Module
//!
//! ## Architecture Overview
//!
//! - **Device** ([`device`]) - the GL-shaped command interface every backend implements
//! - **Backends** ([`backend`]) - wgpu rendering and a command recorder
//! - **Resources** ([`resources`]) - shader programs, buffers and meshes owned on the device
//! - **Scene** ([`scene`], [`camera`], [`geometry`]) - what gets drawn and from where
//! - **Render Loop** ([`render_loop`], [`transform`]) - per-frame MVP composition and draws
//!
//! ```no_run
//! use glint::gfx::{backend::RecordingDevice, render_loop::{ManualScheduler, RenderLoop}};
//! use glint::gfx::{resources::ShaderLibrary, scene::SceneDescription};
//! use glint::config::RenderConfig;
//!
//! let config = RenderConfig::default();
//! let device = RecordingDevice::new(config.width, config.height);
//! let mut render_loop = RenderLoop::setup(
//!     device,
//!     &ShaderLibrary::with_defaults(),
//!     &config,
//!     SceneDescription::triangles(),
//! )
//! .unwrap();
//! render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();
//! ```

pub mod backend;
pub mod camera;
pub mod color;
pub mod device;
pub mod geometry;
pub mod render_loop;
pub mod resources;
pub mod scene;
pub mod shader_interface;
pub mod shaders;
pub mod transform;

pub use render_loop::RenderLoop;
pub use resources::ResourceManager;
