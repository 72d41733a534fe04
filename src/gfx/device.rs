//! # GPU Command Interface
//!
//! [`GpuDevice`] is the host-provided graphics API the core renders through.
//! It deliberately keeps the shape of an immediate-mode GL context: a single
//! "currently bound" vertex buffer and index buffer, a current program, and
//! fixed-function toggles that persist until changed.
//!
//! ## Attribute binding order
//!
//! [`GpuDevice::vertex_attribute_pointer`] reads whichever buffer was last
//! bound to [`BufferTarget::Array`]. Each attribute must therefore be set up
//! as the uninterrupted sequence
//!
//! 1. [`bind_buffer`](GpuDevice::bind_buffer) with the attribute's buffer
//! 2. [`enable_vertex_attribute`](GpuDevice::enable_vertex_attribute)
//! 3. [`vertex_attribute_pointer`](GpuDevice::vertex_attribute_pointer)
//!
//! before moving on to the next attribute.
//! [`ResourceManager::bind_vertex_attribute`](crate::gfx::resources::ResourceManager::bind_vertex_attribute)
//! performs exactly this sequence.

use std::fmt;

use thiserror::Error;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            pub fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// A compiled vertex or fragment shader
    ShaderHandle
);
handle!(
    /// A linked shader program
    ProgramHandle
);
handle!(
    /// A GPU-resident vertex or index buffer
    BufferHandle
);
handle!(
    /// A uniform slot of a linked program
    UniformLocation
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data (`f32` components)
    Array,
    /// Triangle indices (`u16`)
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CullFace,
    DepthTest,
}

/// Vertex order that marks a triangle as front facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Winding {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl Winding {
    pub fn from_clockwise(clockwise: bool) -> Self {
        if clockwise {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

/// Which framebuffer planes [`GpuDevice::clear`] resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
    };
    pub const DEPTH: Self = Self {
        color: false,
        depth: true,
    };
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// Invalid operations reported by a [`GpuDevice`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("attribute {location} described with no vertex buffer bound")]
    NoBoundVertexBuffer { location: u32 },

    #[error("attribute {location} is enabled but has no buffer described")]
    UndescribedAttribute { location: u32 },

    #[error("indexed draw with no index buffer bound")]
    NoBoundIndexBuffer,

    #[error("no program in use")]
    NoActiveProgram,

    #[error("draw reads {required} elements from a buffer holding {available}")]
    OutOfRange { required: usize, available: usize },

    #[error("{0}")]
    Backend(String),
}

/// The graphics API supplied by the host environment.
///
/// Handles returned by the device stay valid until the matching `delete_*`
/// call. Compile and link failures return the compiler's diagnostic text.
pub trait GpuDevice {
    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderHandle, String>;

    /// Links a vertex and a fragment shader into a program.
    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String>;

    /// Makes `program` current for uniform uploads and draws.
    fn use_program(&mut self, program: ProgramHandle) -> Result<(), DeviceError>;

    /// Location of a vertex input, or `None` if the program has no such input.
    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    /// Location of a uniform, or `None` if the program has no such uniform.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Creates a buffer initialized with `data` for write-once, draw-many use.
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8])
        -> Result<BufferHandle, DeviceError>;

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    ) -> Result<(), DeviceError>;

    fn enable_vertex_attribute(&mut self, location: u32);

    /// Sources attribute `location` from the currently bound array buffer,
    /// `components` tightly packed `f32`s per vertex.
    fn vertex_attribute_pointer(&mut self, location: u32, components: u32)
        -> Result<(), DeviceError>;

    /// Uploads a column-major 4x4 matrix to a uniform of the current program.
    fn uniform_matrix4(
        &mut self,
        location: UniformLocation,
        matrix: &[f32; 16],
    ) -> Result<(), DeviceError>;

    fn set_capability(&mut self, capability: Capability, enabled: bool);

    fn front_face(&mut self, winding: Winding);

    fn depth_func(&mut self, func: CompareFunction);

    fn viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    fn clear_color(&mut self, rgba: [f32; 4]);

    fn clear_depth(&mut self, depth: f32);

    fn clear(&mut self, mask: ClearMask);

    /// Draws `count` vertices starting at `first` from the enabled attributes.
    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) -> Result<(), DeviceError>;

    /// Draws `count` indices starting at index `first` of the bound index buffer.
    fn draw_elements(&mut self, mode: DrawMode, count: u32, first: u32)
        -> Result<(), DeviceError>;

    /// Submits everything recorded since the previous flush.
    fn flush(&mut self) -> Result<(), DeviceError>;

    /// Drops everything recorded since the previous flush without submitting it.
    fn discard_frame(&mut self);

    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn delete_program(&mut self, program: ProgramHandle);

    fn delete_shader(&mut self, shader: ShaderHandle);
}
