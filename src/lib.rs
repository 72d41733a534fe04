// src/lib.rs
//! Glint rendering core
//!
//! A small real-time rendering core: column-major 4x4 transform math, GPU
//! resource lifecycle behind an abstract command interface, a per-frame
//! render loop and a procedural torus generator. Rendering runs on wgpu or
//! on a recording backend that captures the command stream.

pub mod config;
pub mod error;
pub mod gfx;
pub mod logging;
pub mod math;
pub mod prelude;
pub mod wgpu_utils;

pub use error::{GfxError, Result};
