//! # wgpu Backend
//!
//! [`WgpuDevice`] runs the GL-style [`GpuDevice`] contract on top of wgpu,
//! rendering into an offscreen color and depth target.
//!
//! Commands between two [`flush`](GpuDevice::flush) calls are recorded and
//! encoded together at flush time:
//!
//! - every `clear` starts a new render pass that loads the cleared planes
//! - every draw snapshots its pipeline state, vertex buffers and uniform
//!   values, the latter going into one slot of a dynamic uniform buffer
//! - pipelines are created (and cached) when the draw is issued, so a
//!   state/layout mismatch fails the draw call that caused it
//!
//! Shader compilation and program linking run inside validation error
//! scopes, so WGSL diagnostics come back as compile and link errors.

use std::collections::HashMap;

use log::{debug, error, info};
use wgpu::util::DeviceExt;

use super::pipelines::{PipelineCache, PipelineKey, ProgramStages};
use super::state::ContextState;
use crate::gfx::device::{
    BufferHandle, BufferTarget, Capability, ClearMask, CompareFunction, DeviceError, DrawMode,
    GpuDevice, ProgramHandle, ShaderHandle, ShaderKind, UniformLocation, Winding,
};
use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::shader_interface::{reflect, ShaderInterface};
use crate::math::Matrix4;
use crate::wgpu_utils::{dynamic_uniform_entry, DynamicUniformBuffer};

/// Size of one `mat4x4<f32>` uniform
const MATRIX_BYTES: u64 = 64;

struct CompiledShader {
    kind: ShaderKind,
    module: wgpu::ShaderModule,
    interface: ShaderInterface,
}

struct LinkedProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    vertex_interface: ShaderInterface,
    fragment_interface: ShaderInterface,
    /// Uniform bindings of group 0, ascending
    bindings: Vec<u32>,
    bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
}

struct GpuBuffer {
    target: BufferTarget,
    buffer: wgpu::Buffer,
    len: usize,
}

/// A draw with everything it needs captured at issue time
struct DrawOp {
    pipeline: wgpu::RenderPipeline,
    program: ProgramHandle,
    vertex_buffers: Vec<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    uniform_offsets: Vec<u32>,
    viewport: [f32; 4],
    first: u32,
    count: u32,
}

enum FrameOp {
    Clear {
        color: Option<wgpu::Color>,
        depth: Option<f32>,
    },
    Draw(DrawOp),
}

/// Draws sharing one render pass
struct PassSegment {
    color_load: wgpu::LoadOp<wgpu::Color>,
    depth_load: wgpu::LoadOp<f32>,
    draws: Vec<DrawOp>,
}

/// Offscreen [`GpuDevice`] backed by a wgpu device and queue
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: ContextState,
    color_target: TextureResource,
    depth_target: TextureResource,
    shaders: HashMap<ShaderHandle, CompiledShader>,
    programs: HashMap<ProgramHandle, LinkedProgram>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    pipelines: PipelineCache,
    uniforms: DynamicUniformBuffer,
    frame_ops: Vec<FrameOp>,
    next_id: u32,
    frames_submitted: u64,
}

impl WgpuDevice {
    /// Wraps an existing device and queue with a `width` x `height` target.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| error!("wgpu: {e}")));

        let color_target =
            TextureResource::create_color_target(&device, width, height, "Color Target");
        let depth_target =
            TextureResource::create_depth_texture(&device, width, height, "Depth Target");
        let alignment = device.limits().min_uniform_buffer_offset_alignment;

        Self {
            state: ContextState::new(width, height),
            color_target,
            depth_target,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            pipelines: PipelineCache::new(TextureResource::COLOR_FORMAT),
            uniforms: DynamicUniformBuffer::new("Draw Uniforms", alignment, MATRIX_BYTES),
            frame_ops: Vec::new(),
            next_id: 1,
            frames_submitted: 0,
            device,
            queue,
        }
    }

    /// Requests an adapter and device with no surface attached.
    pub async fn headless(width: u32, height: u32) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| DeviceError::Backend(format!("no suitable adapter: {e}")))?;
        info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Headless Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| DeviceError::Backend(format!("device request failed: {e}")))?;

        Ok(Self::new(device, queue, width, height))
    }

    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color_target.texture
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn cached_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Clears and draws recorded since the last flush
    pub fn pending_ops(&self) -> usize {
        self.frame_ops.len()
    }

    /// Uniform slots staged since the last flush
    pub fn pending_uniform_slots(&self) -> usize {
        self.uniforms.len()
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Runs `f` inside a validation scope, returning the first error raised.
    fn validated<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer).map(|b| b.len)
    }

    /// Snapshots the current state into a draw, creating its pipeline.
    fn prepare_draw(
        &mut self,
        mode: DrawMode,
        index_buffer: Option<wgpu::Buffer>,
        first: u32,
        count: u32,
    ) -> Result<DrawOp, DeviceError> {
        let program_handle = self.state.current_program()?;
        let attributes = self.state.enabled_attributes()?;
        let program = self
            .programs
            .get(&program_handle)
            .ok_or(DeviceError::NoActiveProgram)?;

        let vertex_buffers = attributes
            .iter()
            .map(|attr| {
                self.buffers
                    .get(&attr.buffer)
                    .map(|b| b.buffer.clone())
                    .ok_or(DeviceError::InvalidHandle {
                        kind: "buffer",
                        id: attr.buffer.id(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let key = PipelineKey {
            program: program_handle,
            raster: self.state.raster,
            mode,
            attributes: attributes
                .iter()
                .map(|a| (a.location, a.components))
                .collect(),
        };
        let pipeline = self
            .pipelines
            .get_or_create(
                &self.device,
                &key,
                ProgramStages {
                    vertex: &program.vertex,
                    fragment: &program.fragment,
                    layout: &program.layout,
                },
            )
            .map_err(DeviceError::Backend)?;

        // Unset uniforms read as identity
        let values: HashMap<u32, [f32; 16]> = self.state.current_uniforms().into_iter().collect();
        let identity = Matrix4::IDENTITY.to_cols_array();
        let uniform_offsets = program
            .bindings
            .iter()
            .map(|binding| {
                let matrix = values.get(binding).unwrap_or(&identity);
                self.uniforms.push(bytemuck::cast_slice(matrix))
            })
            .collect();

        Ok(DrawOp {
            pipeline,
            program: program_handle,
            vertex_buffers,
            index_buffer,
            uniform_offsets,
            viewport: viewport_rect(self.state.viewport, self.color_target.size()),
            first,
            count,
        })
    }

    /// Folds the recorded operations into render passes.
    fn segments(ops: Vec<FrameOp>) -> Vec<PassSegment> {
        let mut segments: Vec<PassSegment> = Vec::new();

        for op in ops {
            match op {
                FrameOp::Clear { color, depth } => match segments.last_mut() {
                    // Consecutive clears merge into one pass
                    Some(last) if last.draws.is_empty() => {
                        if let Some(color) = color {
                            last.color_load = wgpu::LoadOp::Clear(color);
                        }
                        if let Some(depth) = depth {
                            last.depth_load = wgpu::LoadOp::Clear(depth);
                        }
                    }
                    _ => segments.push(PassSegment {
                        color_load: color.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        depth_load: depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        draws: Vec::new(),
                    }),
                },
                FrameOp::Draw(draw) => {
                    if segments.is_empty() {
                        segments.push(PassSegment {
                            color_load: wgpu::LoadOp::Load,
                            depth_load: wgpu::LoadOp::Load,
                            draws: Vec::new(),
                        });
                    }
                    if let Some(last) = segments.last_mut() {
                        last.draws.push(draw);
                    }
                }
            }
        }

        segments
    }

    fn uniform_bind_groups(
        &self,
        segments: &[PassSegment],
    ) -> HashMap<ProgramHandle, wgpu::BindGroup> {
        let mut groups = HashMap::new();
        let Some(buffer) = self.uniforms.buffer() else {
            return groups;
        };

        for draw in segments.iter().flat_map(|s| &s.draws) {
            if groups.contains_key(&draw.program) {
                continue;
            }
            let Some(program) = self.programs.get(&draw.program) else {
                continue;
            };
            let entries: Vec<wgpu::BindGroupEntry> = program
                .bindings
                .iter()
                .map(|&binding| wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(MATRIX_BYTES),
                    }),
                })
                .collect();
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Uniform Bind Group"),
                layout: &program.bind_group_layout,
                entries: &entries,
            });
            groups.insert(draw.program, group);
        }

        groups
    }

    fn encode(&self, segments: &[PassSegment], encoder: &mut wgpu::CommandEncoder) {
        let bind_groups = self.uniform_bind_groups(segments);

        for segment in segments {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: segment.color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_target.view,
                    depth_ops: Some(wgpu::Operations {
                        load: segment.depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &segment.draws {
                let [x, y, w, h] = draw.viewport;
                if w <= 0.0 || h <= 0.0 {
                    continue;
                }
                pass.set_viewport(x, y, w, h, 0.0, 1.0);
                pass.set_pipeline(&draw.pipeline);
                if let Some(group) = bind_groups.get(&draw.program) {
                    pass.set_bind_group(0, group, &draw.uniform_offsets);
                }
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }

                let range = draw.first..draw.first + draw.count;
                match &draw.index_buffer {
                    Some(indices) => {
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                        pass.draw_indexed(range, 0, 0..1);
                    }
                    None => pass.draw(range, 0..1),
                }
            }
        }
    }
}

/// Converts a bottom-left GL viewport into a top-left wgpu one clipped to
/// the target.
pub(crate) fn viewport_rect(viewport: [u32; 4], target: (u32, u32)) -> [f32; 4] {
    let [x, y, w, h] = viewport;
    let (tw, th) = target;
    let x = x.min(tw);
    let y = y.min(th);
    let w = w.min(tw - x);
    let h = h.min(th - y);
    [x as f32, (th - y - h) as f32, w as f32, h as f32]
}

impl GpuDevice for WgpuDevice {
    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderHandle, String> {
        let interface = reflect(kind, source)?;
        let label = format!("{kind} shader");
        let module = self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        let shader = ShaderHandle::new(self.next_handle());
        debug!("compiled {} as {:?}", label, shader);
        self.shaders.insert(
            shader,
            CompiledShader {
                kind,
                module,
                interface,
            },
        );
        Ok(shader)
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        let stage = |handle: ShaderHandle, expected: ShaderKind| match self.shaders.get(&handle) {
            Some(shader) if shader.kind == expected => Ok(shader),
            Some(shader) => Err(format!(
                "error: shader {} is a {} shader, expected {}",
                handle.id(),
                shader.kind,
                expected
            )),
            None => Err(format!("error: shader {} does not exist", handle.id())),
        };
        let vs = stage(vertex, ShaderKind::Vertex)?;
        let fs = stage(fragment, ShaderKind::Fragment)?;

        let mut bindings: Vec<u32> = vs
            .interface
            .uniforms
            .iter()
            .chain(&fs.interface.uniforms)
            .map(|(_, binding)| *binding)
            .collect();
        bindings.sort_unstable();
        bindings.dedup();

        let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .map(|&binding| dynamic_uniform_entry(binding, MATRIX_BYTES))
            .collect();

        let (bind_group_layout, layout) = self.validated(|device| {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Program Uniform Layout"),
                    entries: &entries,
                });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Program Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            (bind_group_layout, layout)
        })?;

        let linked = LinkedProgram {
            vertex: vs.module.clone(),
            fragment: fs.module.clone(),
            vertex_interface: vs.interface.clone(),
            fragment_interface: fs.interface.clone(),
            bindings,
            bind_group_layout,
            layout,
        };
        let program = ProgramHandle::new(self.next_handle());
        self.programs.insert(program, linked);
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
        Ok(())
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs.get(&program)?.vertex_interface.input(name)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let program = self.programs.get(&program)?;
        program
            .vertex_interface
            .uniform(name)
            .or_else(|| program.fragment_interface.uniform(name))
            .map(UniformLocation::new)
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        data: &[u8],
    ) -> Result<BufferHandle, DeviceError> {
        let usage = match target {
            BufferTarget::Array => wgpu::BufferUsages::VERTEX,
            BufferTarget::ElementArray => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match target {
                    BufferTarget::Array => "Vertex Buffer",
                    BufferTarget::ElementArray => "Index Buffer",
                }),
                contents: data,
                usage,
            });

        let handle = BufferHandle::new(self.next_handle());
        self.buffers.insert(
            handle,
            GpuBuffer {
                target,
                buffer,
                len: data.len(),
            },
        );
        Ok(handle)
    }

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    ) -> Result<(), DeviceError> {
        if let Some(handle) = buffer {
            match self.buffers.get(&handle) {
                Some(b) if b.target == target => {}
                _ => {
                    return Err(DeviceError::InvalidHandle {
                        kind: "buffer",
                        id: handle.id(),
                    })
                }
            }
        }
        self.state.bind(target, buffer);
        Ok(())
    }

    fn enable_vertex_attribute(&mut self, location: u32) {
        self.state.enable_attribute(location);
    }

    fn vertex_attribute_pointer(
        &mut self,
        location: u32,
        components: u32,
    ) -> Result<(), DeviceError> {
        self.state.describe_attribute(location, components)
    }

    fn uniform_matrix4(
        &mut self,
        location: UniformLocation,
        matrix: &[f32; 16],
    ) -> Result<(), DeviceError> {
        self.state.set_uniform(location, matrix)
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::CullFace => self.state.raster.cull_face = enabled,
            Capability::DepthTest => self.state.raster.depth_test = enabled,
        }
    }

    fn front_face(&mut self, winding: Winding) {
        self.state.raster.front_face = winding;
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.state.raster.depth_func = func;
    }

    fn viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.state.viewport = [x, y, width, height];
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.state.clear_color = rgba;
    }

    fn clear_depth(&mut self, depth: f32) {
        self.state.clear_depth = depth;
    }

    fn clear(&mut self, mask: ClearMask) {
        let [r, g, b, a] = self.state.clear_color.map(f64::from);
        self.frame_ops.push(FrameOp::Clear {
            color: mask.color.then_some(wgpu::Color { r, g, b, a }),
            depth: mask.depth.then_some(self.state.clear_depth.clamp(0.0, 1.0)),
        });
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) -> Result<(), DeviceError> {
        let attributes = self.state.enabled_attributes()?;
        self.state
            .check_vertex_range(&attributes, first, count, |b| self.buffer_len(b))?;

        let draw = self.prepare_draw(mode, None, first, count)?;
        self.frame_ops.push(FrameOp::Draw(draw));
        Ok(())
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, first: u32) -> Result<(), DeviceError> {
        let handle = self
            .state
            .element_buffer
            .ok_or(DeviceError::NoBoundIndexBuffer)?;
        let index_buffer = self
            .buffers
            .get(&handle)
            .ok_or(DeviceError::InvalidHandle {
                kind: "buffer",
                id: handle.id(),
            })?;

        let available = index_buffer.len / std::mem::size_of::<u16>();
        let required = first as usize + count as usize;
        if required > available {
            return Err(DeviceError::OutOfRange {
                required,
                available,
            });
        }

        let indices = index_buffer.buffer.clone();
        let draw = self.prepare_draw(mode, Some(indices), first, count)?;
        self.frame_ops.push(FrameOp::Draw(draw));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        let ops = std::mem::take(&mut self.frame_ops);
        let segments = Self::segments(ops);

        self.uniforms.upload(&self.device, &self.queue);
        self.uniforms.clear();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        let commands = self
            .validated(|_| {
                self.encode(&segments, &mut encoder);
                encoder.finish()
            })
            .map_err(DeviceError::Backend)?;

        self.queue.submit(std::iter::once(commands));
        self.frames_submitted += 1;
        debug!(
            "frame {} submitted: {} passes, {} draws",
            self.frames_submitted,
            segments.len(),
            segments.iter().map(|s| s.draws.len()).sum::<usize>()
        );
        Ok(())
    }

    fn discard_frame(&mut self) {
        let dropped = self.frame_ops.len();
        self.frame_ops.clear();
        self.uniforms.clear();
        debug!("discarded {} pending operations", dropped);
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        // Pending draws keep their own reference until the next flush
        if self.buffers.remove(&buffer).is_some() {
            self.state.forget_buffer(buffer);
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            self.state.forget_program(program);
            self.pipelines.forget_program(program);
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_flips_origin() {
        assert_eq!(viewport_rect([0, 0, 640, 512], (640, 512)), [0.0, 0.0, 640.0, 512.0]);
        // Bottom-left quadrant in GL is the bottom of the wgpu target
        assert_eq!(viewport_rect([0, 0, 320, 256], (640, 512)), [0.0, 256.0, 320.0, 256.0]);
    }

    #[test]
    fn test_viewport_is_clipped() {
        assert_eq!(viewport_rect([600, 0, 100, 512], (640, 512)), [600.0, 0.0, 40.0, 512.0]);
        assert_eq!(viewport_rect([700, 0, 10, 10], (640, 512)), [640.0, 502.0, 0.0, 10.0]);
    }

    #[test]
    fn test_discard_frame_drops_pending_work() {
        let Ok(mut device) = pollster::block_on(WgpuDevice::headless(16, 16)) else {
            eprintln!("no wgpu adapter available, skipping");
            return;
        };
        device.clear(ClearMask::COLOR_DEPTH);
        device.clear(ClearMask::COLOR);
        assert_eq!(device.pending_ops(), 2);

        device.discard_frame();
        assert_eq!(device.pending_ops(), 0);
        assert_eq!(device.pending_uniform_slots(), 0);

        device.flush().unwrap();
        assert_eq!(device.frames_submitted(), 1);
    }

    #[test]
    fn test_consecutive_clears_share_a_pass() {
        let ops = vec![
            FrameOp::Clear {
                color: Some(wgpu::Color::BLACK),
                depth: None,
            },
            FrameOp::Clear {
                color: None,
                depth: Some(1.0),
            },
        ];
        let segments = WgpuDevice::segments(ops);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].color_load, wgpu::LoadOp::Clear(wgpu::Color::BLACK));
        assert_eq!(segments[0].depth_load, wgpu::LoadOp::Clear(1.0));
    }
}
