//! GL-style context state shared by the bundled [`GpuDevice`] backends.
//!
//! Tracks the bind points, the attribute table, the current program and its
//! uniform values, and the fixed-function toggles, and raises the same
//! [`DeviceError`]s a GL context would for misuse.
//!
//! [`GpuDevice`]: crate::gfx::device::GpuDevice

use std::collections::{BTreeMap, HashMap};

use crate::gfx::device::{
    BufferHandle, BufferTarget, CompareFunction, DeviceError, ProgramHandle, UniformLocation,
    Winding,
};

/// One slot of the vertex attribute table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeSlot {
    pub buffer: Option<BufferHandle>,
    pub components: u32,
    pub enabled: bool,
}

/// An enabled, fully described attribute as seen by a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    pub location: u32,
    pub buffer: BufferHandle,
    pub components: u32,
}

/// Fixed-function state that shapes a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub cull_face: bool,
    pub front_face: Winding,
    pub depth_test: bool,
    pub depth_func: CompareFunction,
}

#[derive(Debug, Clone)]
pub struct ContextState {
    pub array_buffer: Option<BufferHandle>,
    pub element_buffer: Option<BufferHandle>,
    pub attributes: BTreeMap<u32, AttributeSlot>,
    pub program: Option<ProgramHandle>,
    pub uniforms: HashMap<ProgramHandle, BTreeMap<u32, [f32; 16]>>,
    pub raster: RasterState,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub viewport: [u32; 4],
}

impl ContextState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            array_buffer: None,
            element_buffer: None,
            attributes: BTreeMap::new(),
            program: None,
            uniforms: HashMap::new(),
            raster: RasterState {
                cull_face: false,
                front_face: Winding::CounterClockwise,
                depth_test: false,
                depth_func: CompareFunction::Less,
            },
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_depth: 1.0,
            viewport: [0, 0, width, height],
        }
    }

    pub fn bind(&mut self, target: BufferTarget, buffer: Option<BufferHandle>) {
        match target {
            BufferTarget::Array => self.array_buffer = buffer,
            BufferTarget::ElementArray => self.element_buffer = buffer,
        }
    }

    pub fn enable_attribute(&mut self, location: u32) {
        self.attributes.entry(location).or_default().enabled = true;
    }

    /// Points `location` at the currently bound array buffer.
    pub fn describe_attribute(&mut self, location: u32, components: u32) -> Result<(), DeviceError> {
        let buffer = self
            .array_buffer
            .ok_or(DeviceError::NoBoundVertexBuffer { location })?;
        let slot = self.attributes.entry(location).or_default();
        slot.buffer = Some(buffer);
        slot.components = components;
        Ok(())
    }

    /// The enabled attributes in location order.
    pub fn enabled_attributes(&self) -> Result<Vec<AttributeBinding>, DeviceError> {
        self.attributes
            .iter()
            .filter(|(_, slot)| slot.enabled)
            .map(|(&location, slot)| match slot.buffer {
                Some(buffer) => Ok(AttributeBinding {
                    location,
                    buffer,
                    components: slot.components,
                }),
                None => Err(DeviceError::UndescribedAttribute { location }),
            })
            .collect()
    }

    pub fn current_program(&self) -> Result<ProgramHandle, DeviceError> {
        self.program.ok_or(DeviceError::NoActiveProgram)
    }

    pub fn set_uniform(&mut self, location: UniformLocation, matrix: &[f32; 16]) -> Result<(), DeviceError> {
        let program = self.current_program()?;
        self.uniforms
            .entry(program)
            .or_default()
            .insert(location.id(), *matrix);
        Ok(())
    }

    /// Uniform values of the current program, in binding order.
    pub fn current_uniforms(&self) -> Vec<(u32, [f32; 16])> {
        self.program
            .and_then(|p| self.uniforms.get(&p))
            .map(|values| values.iter().map(|(&b, m)| (b, *m)).collect())
            .unwrap_or_default()
    }

    /// Checks that every enabled attribute holds `first + count` vertices.
    ///
    /// `buffer_len` reports a buffer's size in bytes.
    pub fn check_vertex_range(
        &self,
        attributes: &[AttributeBinding],
        first: u32,
        count: u32,
        buffer_len: impl Fn(BufferHandle) -> Option<usize>,
    ) -> Result<(), DeviceError> {
        let vertices = first as usize + count as usize;
        for attr in attributes {
            let available = buffer_len(attr.buffer).ok_or(DeviceError::InvalidHandle {
                kind: "buffer",
                id: attr.buffer.id(),
            })? / (attr.components as usize * std::mem::size_of::<f32>()).max(1);
            if vertices > available {
                return Err(DeviceError::OutOfRange {
                    required: vertices,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Unbinds a deleted buffer from every bind point and attribute slot.
    pub fn forget_buffer(&mut self, buffer: BufferHandle) {
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        if self.element_buffer == Some(buffer) {
            self.element_buffer = None;
        }
        for slot in self.attributes.values_mut() {
            if slot.buffer == Some(buffer) {
                slot.buffer = None;
            }
        }
    }

    pub fn forget_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
        self.uniforms.remove(&program);
    }
}
