//! Bundled [`GpuDevice`](crate::gfx::device::GpuDevice) implementations.
//!
//! - [`RecordingDevice`] validates calls and logs them, with no GPU involved
//! - [`WgpuDevice`] renders offscreen through wgpu

pub mod pipelines;
pub mod recording;
pub mod state;
pub mod wgpu_backend;

pub use recording::{Command, DrawCall, RecordingDevice};
pub use state::{AttributeBinding, ContextState, RasterState};
pub use wgpu_backend::WgpuDevice;
