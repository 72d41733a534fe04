//! # Recording Backend
//!
//! A headless [`GpuDevice`] that validates every call against GL-style
//! context rules and records it in a command log instead of touching a GPU.
//! Draw calls capture a snapshot of the state they would render with
//! (program, attribute bindings, uniform values, raster state), which makes
//! the log useful both for tests and for inspecting what a frame submits.

use std::collections::HashMap;

use log::debug;

use super::state::{AttributeBinding, ContextState, RasterState};
use crate::gfx::device::{
    BufferHandle, BufferTarget, Capability, ClearMask, CompareFunction, DeviceError, DrawMode,
    GpuDevice, ProgramHandle, ShaderHandle, ShaderKind, UniformLocation, Winding,
};
use crate::gfx::shader_interface::{reflect, ShaderInterface};

/// Everything a draw call would read
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mode: DrawMode,
    pub program: ProgramHandle,
    pub attributes: Vec<AttributeBinding>,
    /// `(binding, matrix)` pairs of the program's uniforms at draw time
    pub uniforms: Vec<(u32, [f32; 16])>,
    pub raster: RasterState,
    /// Index buffer for indexed draws
    pub index_buffer: Option<BufferHandle>,
    pub first: u32,
    pub count: u32,
}

impl DrawCall {
    pub fn uniform(&self, binding: u32) -> Option<&[f32; 16]> {
        self.uniforms
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, m)| m)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CompileShader { kind: ShaderKind, shader: ShaderHandle },
    LinkProgram { program: ProgramHandle },
    UseProgram(ProgramHandle),
    CreateBuffer { target: BufferTarget, buffer: BufferHandle, bytes: usize },
    BindBuffer { target: BufferTarget, buffer: Option<BufferHandle> },
    EnableAttribute(u32),
    AttributePointer { location: u32, components: u32 },
    UniformMatrix { location: UniformLocation, matrix: [f32; 16] },
    SetCapability { capability: Capability, enabled: bool },
    FrontFace(Winding),
    DepthFunc(CompareFunction),
    Viewport([u32; 4]),
    ClearColor([f32; 4]),
    ClearDepth(f32),
    Clear(ClearMask),
    Draw(DrawCall),
    Flush,
    DiscardFrame,
    DeleteBuffer(BufferHandle),
    DeleteProgram(ProgramHandle),
    DeleteShader(ShaderHandle),
}

struct ShaderRecord {
    kind: ShaderKind,
    interface: ShaderInterface,
}

struct ProgramRecord {
    vertex: ShaderInterface,
    fragment: ShaderInterface,
}

struct BufferRecord {
    target: BufferTarget,
    data: Vec<u8>,
}

/// Headless device that logs commands
pub struct RecordingDevice {
    state: ContextState,
    shaders: HashMap<ShaderHandle, ShaderRecord>,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    buffers: HashMap<BufferHandle, BufferRecord>,
    commands: Vec<Command>,
    next_id: u32,
    frames_submitted: u64,
    frames_discarded: u64,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: ContextState::new(width, height),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            commands: Vec::new(),
            next_id: 1,
            frames_submitted: 0,
            frames_discarded: 0,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drains the log, keeping all GPU state.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer).map(|b| b.data.len())
    }

    fn snapshot(
        &self,
        mode: DrawMode,
        index_buffer: Option<BufferHandle>,
        first: u32,
        count: u32,
    ) -> Result<DrawCall, DeviceError> {
        let program = self.state.current_program()?;
        Ok(DrawCall {
            mode,
            program,
            attributes: self.state.enabled_attributes()?,
            uniforms: self.state.current_uniforms(),
            raster: self.state.raster,
            index_buffer,
            first,
            count,
        })
    }
}

impl GpuDevice for RecordingDevice {
    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderHandle, String> {
        let interface = reflect(kind, source)?;
        let shader = ShaderHandle::new(self.next_handle());
        debug!(
            "compiled {} shader {:?}: {} inputs, {} uniforms",
            kind,
            shader,
            interface.inputs.len(),
            interface.uniforms.len()
        );
        self.shaders.insert(shader, ShaderRecord { kind, interface });
        self.commands.push(Command::CompileShader { kind, shader });
        Ok(shader)
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        let stage = |handle: ShaderHandle, expected: ShaderKind| match self.shaders.get(&handle) {
            Some(record) if record.kind == expected => Ok(record.interface.clone()),
            Some(record) => Err(format!(
                "error: shader {} is a {} shader, expected {}",
                handle.id(),
                record.kind,
                expected
            )),
            None => Err(format!("error: shader {} does not exist", handle.id())),
        };
        let vertex = stage(vertex, ShaderKind::Vertex)?;
        let fragment = stage(fragment, ShaderKind::Fragment)?;

        let program = ProgramHandle::new(self.next_handle());
        self.programs
            .insert(program, ProgramRecord { vertex, fragment });
        self.commands.push(Command::LinkProgram { program });
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), DeviceError> {
        if !self.programs.contains_key(&program) {
            return Err(DeviceError::InvalidHandle {
                kind: "program",
                id: program.id(),
            });
        }
        self.state.program = Some(program);
        self.commands.push(Command::UseProgram(program));
        Ok(())
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs.get(&program)?.vertex.input(name)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let record = self.programs.get(&program)?;
        record
            .vertex
            .uniform(name)
            .or_else(|| record.fragment.uniform(name))
            .map(UniformLocation::new)
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<BufferHandle, DeviceError> {
        let buffer = BufferHandle::new(self.next_handle());
        self.buffers.insert(
            buffer,
            BufferRecord {
                target,
                data: data.to_vec(),
            },
        );
        self.commands.push(Command::CreateBuffer {
            target,
            buffer,
            bytes: data.len(),
        });
        Ok(buffer)
    }

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    ) -> Result<(), DeviceError> {
        if let Some(handle) = buffer {
            match self.buffers.get(&handle) {
                Some(record) if record.target == target => {}
                _ => {
                    return Err(DeviceError::InvalidHandle {
                        kind: "buffer",
                        id: handle.id(),
                    })
                }
            }
        }
        self.state.bind(target, buffer);
        self.commands.push(Command::BindBuffer { target, buffer });
        Ok(())
    }

    fn enable_vertex_attribute(&mut self, location: u32) {
        self.state.enable_attribute(location);
        self.commands.push(Command::EnableAttribute(location));
    }

    fn vertex_attribute_pointer(
        &mut self,
        location: u32,
        components: u32,
    ) -> Result<(), DeviceError> {
        self.state.describe_attribute(location, components)?;
        self.commands.push(Command::AttributePointer {
            location,
            components,
        });
        Ok(())
    }

    fn uniform_matrix4(
        &mut self,
        location: UniformLocation,
        matrix: &[f32; 16],
    ) -> Result<(), DeviceError> {
        self.state.set_uniform(location, matrix)?;
        self.commands.push(Command::UniformMatrix {
            location,
            matrix: *matrix,
        });
        Ok(())
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::CullFace => self.state.raster.cull_face = enabled,
            Capability::DepthTest => self.state.raster.depth_test = enabled,
        }
        self.commands
            .push(Command::SetCapability { capability, enabled });
    }

    fn front_face(&mut self, winding: Winding) {
        self.state.raster.front_face = winding;
        self.commands.push(Command::FrontFace(winding));
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.state.raster.depth_func = func;
        self.commands.push(Command::DepthFunc(func));
    }

    fn viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.state.viewport = [x, y, width, height];
        self.commands.push(Command::Viewport(self.state.viewport));
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.state.clear_color = rgba;
        self.commands.push(Command::ClearColor(rgba));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.state.clear_depth = depth;
        self.commands.push(Command::ClearDepth(depth));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.commands.push(Command::Clear(mask));
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) -> Result<(), DeviceError> {
        let draw = self.snapshot(mode, None, first, count)?;
        self.state
            .check_vertex_range(&draw.attributes, first, count, |b| self.buffer_len(b))?;
        self.commands.push(Command::Draw(draw));
        Ok(())
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, first: u32) -> Result<(), DeviceError> {
        let index_buffer = self
            .state
            .element_buffer
            .ok_or(DeviceError::NoBoundIndexBuffer)?;
        let draw = self.snapshot(mode, Some(index_buffer), first, count)?;

        let data = self.buffer_data(index_buffer).unwrap_or_default();
        if data.len() % 2 != 0 {
            return Err(DeviceError::Backend(format!(
                "index buffer holds {} bytes, not u16 data",
                data.len()
            )));
        }
        let indices: Vec<u16> = data
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        let end = first as usize + count as usize;
        let window = indices.get(first as usize..end).ok_or(DeviceError::OutOfRange {
            required: end,
            available: indices.len(),
        })?;

        // Every referenced vertex must exist in every enabled attribute
        if let Some(&max) = window.iter().max() {
            self.state.check_vertex_range(&draw.attributes, 0, max as u32 + 1, |b| {
                self.buffer_len(b)
            })?;
        }

        self.commands.push(Command::Draw(draw));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        self.frames_submitted += 1;
        self.commands.push(Command::Flush);
        Ok(())
    }

    fn discard_frame(&mut self) {
        self.frames_discarded += 1;
        self.commands.push(Command::DiscardFrame);
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.state.forget_buffer(buffer);
            self.commands.push(Command::DeleteBuffer(buffer));
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            self.state.forget_program(program);
            self.commands.push(Command::DeleteProgram(program));
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader).is_some() {
            self.commands.push(Command::DeleteShader(shader));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::shaders::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

    fn linked(device: &mut RecordingDevice) -> ProgramHandle {
        let vs = device
            .compile_shader(ShaderKind::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap();
        let fs = device
            .compile_shader(ShaderKind::Fragment, DEFAULT_FRAGMENT_SHADER)
            .unwrap();
        device.link_program(vs, fs).unwrap()
    }

    #[test]
    fn test_link_rejects_swapped_stages() {
        let mut device = RecordingDevice::new(4, 4);
        let vs = device
            .compile_shader(ShaderKind::Vertex, DEFAULT_VERTEX_SHADER)
            .unwrap();
        let fs = device
            .compile_shader(ShaderKind::Fragment, DEFAULT_FRAGMENT_SHADER)
            .unwrap();
        let err = device.link_program(fs, vs).unwrap_err();
        assert!(err.contains("expected vertex"));
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn test_locations_resolve_from_source() {
        let mut device = RecordingDevice::new(4, 4);
        let program = linked(&mut device);
        assert_eq!(device.attribute_location(program, "position"), Some(0));
        assert_eq!(device.attribute_location(program, "color"), Some(1));
        assert_eq!(device.attribute_location(program, "normal"), None);
        assert_eq!(
            device.uniform_location(program, "mvp_matrix"),
            Some(UniformLocation::new(0))
        );
    }

    #[test]
    fn test_draw_snapshots_state() {
        let mut device = RecordingDevice::new(4, 4);
        let program = linked(&mut device);
        device.use_program(program).unwrap();

        let positions: Vec<f32> = vec![0.0; 9];
        let buffer = device
            .create_buffer(BufferTarget::Array, bytemuck::cast_slice(&positions))
            .unwrap();
        device.bind_buffer(BufferTarget::Array, Some(buffer)).unwrap();
        device.enable_vertex_attribute(0);
        device.vertex_attribute_pointer(0, 3).unwrap();

        let m = [2.0; 16];
        device.uniform_matrix4(UniformLocation::new(0), &m).unwrap();
        device.draw_arrays(DrawMode::Triangles, 0, 3).unwrap();

        let draw = device.draws().next().unwrap();
        assert_eq!(draw.program, program);
        assert_eq!(draw.uniform(0), Some(&m));
        assert_eq!(draw.attributes.len(), 1);

        // Four vertices are more than the buffer holds
        assert!(matches!(
            device.draw_arrays(DrawMode::Triangles, 0, 4),
            Err(DeviceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_draw_elements_checks_indices() {
        let mut device = RecordingDevice::new(4, 4);
        let program = linked(&mut device);
        device.use_program(program).unwrap();

        let positions: Vec<f32> = vec![0.0; 9];
        let vbo = device
            .create_buffer(BufferTarget::Array, bytemuck::cast_slice(&positions))
            .unwrap();
        device.bind_buffer(BufferTarget::Array, Some(vbo)).unwrap();
        device.enable_vertex_attribute(0);
        device.vertex_attribute_pointer(0, 3).unwrap();

        assert_eq!(
            device.draw_elements(DrawMode::Triangles, 3, 0),
            Err(DeviceError::NoBoundIndexBuffer)
        );

        let indices: Vec<u16> = vec![0, 1, 2, 0, 1, 3];
        let ibo = device
            .create_buffer(BufferTarget::ElementArray, bytemuck::cast_slice(&indices))
            .unwrap();
        device
            .bind_buffer(BufferTarget::ElementArray, Some(ibo))
            .unwrap();

        assert!(device.draw_elements(DrawMode::Triangles, 3, 0).is_ok());
        // Second triangle references vertex 3, which does not exist
        assert!(matches!(
            device.draw_elements(DrawMode::Triangles, 3, 3),
            Err(DeviceError::OutOfRange { .. })
        ));
        // Binding an index buffer to the vertex target is refused
        assert!(device.bind_buffer(BufferTarget::Array, Some(ibo)).is_err());
    }

    #[test]
    fn test_flush_counts_frames() {
        let mut device = RecordingDevice::new(4, 4);
        device.clear(ClearMask::COLOR_DEPTH);
        device.flush().unwrap();
        device.flush().unwrap();
        assert_eq!(device.frames_submitted(), 2);
        assert_eq!(device.take_commands().len(), 3);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_odd_length_index_buffer_is_rejected() {
        let mut device = RecordingDevice::new(4, 4);
        let program = linked(&mut device);
        device.use_program(program).unwrap();
        let ibo = device
            .create_buffer(BufferTarget::ElementArray, &[0, 0, 1])
            .unwrap();
        device.bind_buffer(BufferTarget::ElementArray, Some(ibo)).unwrap();
        assert!(matches!(
            device.draw_elements(DrawMode::Triangles, 1, 0),
            Err(DeviceError::Backend(_))
        ));
    }

    #[test]
    fn test_discard_frame_is_logged() {
        let mut device = RecordingDevice::new(4, 4);
        device.clear(ClearMask::COLOR_DEPTH);
        device.discard_frame();
        assert_eq!(device.frames_submitted(), 0);
        assert_eq!(device.frames_discarded(), 1);
        assert_eq!(device.commands().last(), Some(&Command::DiscardFrame));
    }
}
