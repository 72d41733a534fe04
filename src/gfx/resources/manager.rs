//! # Resource Manager
//!
//! Owns every shader, program and buffer created on a [`GpuDevice`] and turns
//! CPU-side [`MeshData`] into GPU-resident meshes.
//!
//! Attribute and uniform locations are looked up once per program and cached
//! in the [`ShaderProgram`]; a name the program does not expose resolves to
//! `None` and is logged, not treated as an error.
//!
//! Vertex attributes are always bound with the GL sequence
//! bind, enable, describe, one attribute at a time
//! (see [`ResourceManager::bind_vertex_attribute`]).

use std::collections::HashMap;

use log::{debug, error, info, warn};

use crate::error::{GfxError, Result};
use crate::gfx::device::{
    BufferHandle, BufferTarget, DrawMode, GpuDevice, ProgramHandle, ShaderHandle, ShaderKind,
    UniformLocation,
};
use crate::gfx::geometry::MeshData;
use crate::math::Matrix4;

use super::ShaderLibrary;

/// Largest vertex count 16-bit indices can address
const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// A linked program and its resolved locations
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    attributes: HashMap<String, Option<u32>>,
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Previously resolved attribute location
    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied().flatten()
    }

    /// Previously resolved uniform location
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied().flatten()
    }
}

/// Index of an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

/// Buffers backing one uploaded mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuMesh {
    pub positions: BufferHandle,
    pub colors: BufferHandle,
    pub indices: Option<BufferHandle>,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl GpuMesh {
    /// Vertices one draw of this mesh submits
    pub fn element_count(&self) -> u32 {
        if self.indices.is_some() {
            self.index_count
        } else {
            self.vertex_count
        }
    }
}

/// Where a mesh's attributes go in a program; `None` skips the attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshAttributes {
    pub position: Option<u32>,
    pub color: Option<u32>,
}

pub struct ResourceManager<D: GpuDevice> {
    device: D,
    shaders: Vec<ShaderHandle>,
    programs: Vec<ProgramHandle>,
    buffers: Vec<BufferHandle>,
    meshes: Vec<Option<GpuMesh>>,
    active_program: Option<ProgramHandle>,
}

impl<D: GpuDevice> ResourceManager<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            shaders: Vec::new(),
            programs: Vec::new(),
            buffers: Vec::new(),
            meshes: Vec::new(),
            active_program: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Compiles one shader stage, surfacing the compiler's diagnostic on failure.
    pub fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> Result<ShaderHandle> {
        match self.device.compile_shader(kind, source) {
            Ok(shader) => {
                self.shaders.push(shader);
                debug!("compiled {} shader {}", kind, shader.id());
                Ok(shader)
            }
            Err(log) => {
                error!("{} shader failed to compile: {}", kind, log);
                Err(GfxError::ShaderCompile { kind, log })
            }
        }
    }

    /// Links two compiled stages and makes the program current.
    pub fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ShaderProgram> {
        let handle = self.device.link_program(vertex, fragment).map_err(|log| {
            error!("program failed to link: {}", log);
            GfxError::ProgramLink { log }
        })?;
        self.programs.push(handle);

        self.device.use_program(handle)?;
        self.active_program = Some(handle);
        info!("linked program {}", handle.id());

        Ok(ShaderProgram {
            handle,
            vertex,
            fragment,
            attributes: HashMap::new(),
            uniforms: HashMap::new(),
        })
    }

    /// Deletes a program together with its two stages.
    pub fn release_program(&mut self, program: ShaderProgram) {
        if self.active_program == Some(program.handle) {
            self.active_program = None;
        }
        self.device.delete_program(program.handle);
        self.programs.retain(|&p| p != program.handle);
        for shader in [program.vertex, program.fragment] {
            self.device.delete_shader(shader);
            self.shaders.retain(|&s| s != shader);
        }
        debug!("released program {}", program.handle.id());
    }

    /// Compiles and links the sources registered under `vertex` and `fragment`.
    ///
    /// A stage that fails to compile leaves no program behind.
    pub fn build_program(
        &mut self,
        library: &ShaderLibrary,
        vertex: &str,
        fragment: &str,
    ) -> Result<ShaderProgram> {
        let vs = self.compile_shader(ShaderKind::Vertex, library.get(vertex)?)?;
        let fs = self.compile_shader(ShaderKind::Fragment, library.get(fragment)?)?;
        self.link_program(vs, fs)
    }

    /// Looks up an attribute location, once per program and name.
    pub fn resolve_attribute(&self, program: &mut ShaderProgram, name: &str) -> Option<u32> {
        if let Some(&location) = program.attributes.get(name) {
            return location;
        }
        let location = self.device.attribute_location(program.handle, name);
        if location.is_none() {
            warn!("attribute '{}' not found in program {}", name, program.handle.id());
        }
        program.attributes.insert(name.to_string(), location);
        location
    }

    /// Looks up a uniform location, once per program and name.
    pub fn resolve_uniform(
        &self,
        program: &mut ShaderProgram,
        name: &str,
    ) -> Option<UniformLocation> {
        if let Some(&location) = program.uniforms.get(name) {
            return location;
        }
        let location = self.device.uniform_location(program.handle, name);
        if location.is_none() {
            warn!("uniform '{}' not found in program {}", name, program.handle.id());
        }
        program.uniforms.insert(name.to_string(), location);
        location
    }

    pub fn use_program(&mut self, program: &ShaderProgram) -> Result<()> {
        if self.active_program != Some(program.handle) {
            self.device.use_program(program.handle)?;
            self.active_program = Some(program.handle);
        }
        Ok(())
    }

    /// Uploads `data` as a static vertex buffer.
    pub fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle> {
        let buffer = self
            .device
            .create_buffer(BufferTarget::Array, bytemuck::cast_slice(data))?;
        self.buffers.push(buffer);
        debug!("vertex buffer {}: {} floats", buffer.id(), data.len());
        Ok(buffer)
    }

    /// Uploads `data` as a static 16-bit index buffer.
    pub fn create_index_buffer(&mut self, data: &[u16]) -> Result<BufferHandle> {
        let buffer = self
            .device
            .create_buffer(BufferTarget::ElementArray, bytemuck::cast_slice(data))?;
        self.buffers.push(buffer);
        debug!("index buffer {}: {} indices", buffer.id(), data.len());
        Ok(buffer)
    }

    /// Binds `buffer` as the source of attribute `location`.
    ///
    /// Issues bind, enable and describe back to back, since describing reads
    /// whichever buffer is bound at that moment.
    pub fn bind_vertex_attribute(
        &mut self,
        buffer: BufferHandle,
        location: u32,
        components: u32,
    ) -> Result<()> {
        self.device.bind_buffer(BufferTarget::Array, Some(buffer))?;
        self.device.enable_vertex_attribute(location);
        self.device.vertex_attribute_pointer(location, components)?;
        Ok(())
    }

    /// Uploads `matrix` to `location` of `program`, making it current first.
    pub fn set_uniform_matrix(
        &mut self,
        program: &ShaderProgram,
        location: UniformLocation,
        matrix: &Matrix4,
    ) -> Result<()> {
        self.use_program(program)?;
        self.device.uniform_matrix4(location, matrix.as_array())?;
        Ok(())
    }

    /// Validates `mesh` and uploads its positions, colors and indices.
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshId> {
        mesh.validate()?;

        let indices = if mesh.is_indexed() {
            if mesh.vertex_count() > MAX_INDEXED_VERTICES {
                return Err(GfxError::IndexOverflow {
                    vertex_count: mesh.vertex_count(),
                });
            }
            // validate() guarantees every index is below the vertex count
            let narrowed: Vec<u16> = mesh.indices.iter().map(|&i| i as u16).collect();
            Some(self.create_index_buffer(&narrowed)?)
        } else {
            None
        };

        let gpu_mesh = GpuMesh {
            positions: self.create_vertex_buffer(&mesh.flat_positions())?,
            colors: self.create_vertex_buffer(&mesh.flat_colors())?,
            indices,
            vertex_count: mesh.vertex_count() as u32,
            index_count: mesh.indices.len() as u32,
        };

        let id = MeshId(self.meshes.len());
        info!(
            "uploaded mesh {}: {} vertices, {} triangles",
            id.0,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        self.meshes.push(Some(gpu_mesh));
        Ok(id)
    }

    pub fn mesh(&self, id: MeshId) -> Result<&GpuMesh> {
        self.meshes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(GfxError::UnknownMesh(id.0))
    }

    /// Binds a mesh's attributes and index buffer for the next draw.
    pub fn bind_mesh(&mut self, id: MeshId, attributes: MeshAttributes) -> Result<()> {
        let mesh = self.mesh(id)?.clone();
        if let Some(location) = attributes.position {
            self.bind_vertex_attribute(mesh.positions, location, 3)?;
        }
        if let Some(location) = attributes.color {
            self.bind_vertex_attribute(mesh.colors, location, 4)?;
        }
        self.device
            .bind_buffer(BufferTarget::ElementArray, mesh.indices)?;
        Ok(())
    }

    /// Draws a bound mesh as triangles and returns the vertices submitted.
    pub fn draw_mesh(&mut self, id: MeshId) -> Result<u32> {
        let mesh = self.mesh(id)?;
        let count = mesh.element_count();
        if mesh.indices.is_some() {
            self.device.draw_elements(DrawMode::Triangles, count, 0)?;
        } else {
            self.device.draw_arrays(DrawMode::Triangles, 0, count)?;
        }
        Ok(count)
    }

    /// Deletes the buffers of one mesh.
    pub fn release_mesh(&mut self, id: MeshId) -> Result<()> {
        let mesh = self
            .meshes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(GfxError::UnknownMesh(id.0))?;

        let released: Vec<BufferHandle> = [Some(mesh.positions), Some(mesh.colors), mesh.indices]
            .into_iter()
            .flatten()
            .collect();
        for buffer in &released {
            self.device.delete_buffer(*buffer);
        }
        self.buffers.retain(|b| !released.contains(b));
        debug!("released mesh {}", id.0);
        Ok(())
    }

    /// Deletes every owned resource and returns the device.
    pub fn teardown(mut self) -> D {
        for buffer in self.buffers.drain(..) {
            self.device.delete_buffer(buffer);
        }
        for program in self.programs.drain(..) {
            self.device.delete_program(program);
        }
        for shader in self.shaders.drain(..) {
            self.device.delete_shader(shader);
        }
        self.meshes.clear();
        info!("resources released");
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::{Command, RecordingDevice};
    use crate::gfx::geometry::{generate_torus, generate_triangle, TorusParams};
    use rand::{rngs::StdRng, SeedableRng};

    fn manager() -> ResourceManager<RecordingDevice> {
        ResourceManager::new(RecordingDevice::new(64, 64))
    }

    #[test]
    fn test_failed_compile_yields_no_program() {
        let mut library = ShaderLibrary::with_defaults();
        library.insert("broken", "@vertex fn vs_main( -> @builtin(position) vec4<f32> {}");

        let mut resources = manager();
        let err = resources.build_program(&library, "broken", "fs").unwrap_err();
        match err {
            GfxError::ShaderCompile { kind, log } => {
                assert_eq!(kind, ShaderKind::Vertex);
                assert!(log.starts_with("line 1"));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(resources.device().live_programs(), 0);
    }

    #[test]
    fn test_missing_source_is_reported() {
        let mut resources = manager();
        let err = resources
            .build_program(&ShaderLibrary::new(), "vs", "fs")
            .unwrap_err();
        assert!(matches!(err, GfxError::MissingShaderSource { .. }));
    }

    #[test]
    fn test_link_makes_program_current() {
        let mut resources = manager();
        let program = resources
            .build_program(&ShaderLibrary::with_defaults(), "vs", "fs")
            .unwrap();
        assert_eq!(
            resources.device().state().program,
            Some(program.handle())
        );
    }

    #[test]
    fn test_link_failure_leaves_no_program() {
        let library = ShaderLibrary::with_defaults();
        let mut resources = manager();
        let vs = resources
            .compile_shader(ShaderKind::Vertex, library.get("vs").unwrap())
            .unwrap();
        let fs = resources
            .compile_shader(ShaderKind::Fragment, library.get("fs").unwrap())
            .unwrap();

        match resources.link_program(fs, vs) {
            Err(GfxError::ProgramLink { log }) => {
                assert!(log.contains("expected vertex"), "unexpected log: {log}");
            }
            Err(other) => panic!("expected link error, got {other:?}"),
            Ok(_) => panic!("swapped stages linked"),
        }
        assert_eq!(resources.device().live_programs(), 0);
        assert_eq!(resources.device().state().program, None);
        assert!(!resources
            .device()
            .commands()
            .iter()
            .any(|c| matches!(c, Command::UseProgram(_))));

        // The compiled stages are still usable
        assert!(resources.link_program(vs, fs).is_ok());
    }

    #[test]
    fn test_release_program_deletes_stages() {
        let mut resources = manager();
        let program = resources
            .build_program(&ShaderLibrary::with_defaults(), "vs", "fs")
            .unwrap();
        assert_eq!(resources.device().live_shaders(), 2);

        resources.release_program(program);
        assert_eq!(resources.device().live_programs(), 0);
        assert_eq!(resources.device().live_shaders(), 0);
        assert_eq!(resources.device().state().program, None);

        // A rebuilt program is made current again
        let program = resources
            .build_program(&ShaderLibrary::with_defaults(), "vs", "fs")
            .unwrap();
        assert_eq!(resources.device().state().program, Some(program.handle()));
        let device = resources.teardown();
        assert_eq!(device.live_shaders(), 0);
    }

    #[test]
    fn test_locations_are_resolved_once() {
        let mut resources = manager();
        let mut program = resources
            .build_program(&ShaderLibrary::with_defaults(), "vs", "fs")
            .unwrap();

        assert_eq!(resources.resolve_attribute(&mut program, "position"), Some(0));
        assert_eq!(resources.resolve_attribute(&mut program, "color"), Some(1));
        assert_eq!(resources.resolve_attribute(&mut program, "normal"), None);
        assert!(resources.resolve_uniform(&mut program, "mvp_matrix").is_some());

        // Cached lookups survive the program going away on the device
        resources.device_mut().delete_program(program.handle());
        assert_eq!(resources.resolve_attribute(&mut program, "color"), Some(1));
        assert_eq!(program.attribute("normal"), None);
    }

    #[test]
    fn test_bind_vertex_attribute_order() {
        let mut resources = manager();
        let a = resources.create_vertex_buffer(&[0.0; 9]).unwrap();
        let b = resources.create_vertex_buffer(&[0.0; 12]).unwrap();
        resources.device_mut().take_commands();

        resources.bind_vertex_attribute(a, 0, 3).unwrap();
        resources.bind_vertex_attribute(b, 1, 4).unwrap();

        assert_eq!(
            resources.device().commands(),
            &[
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: Some(a)
                },
                Command::EnableAttribute(0),
                Command::AttributePointer {
                    location: 0,
                    components: 3
                },
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: Some(b)
                },
                Command::EnableAttribute(1),
                Command::AttributePointer {
                    location: 1,
                    components: 4
                },
            ]
        );
        let slots = resources.device().state().enabled_attributes().unwrap();
        assert_eq!(slots[0].buffer, a);
        assert_eq!(slots[1].buffer, b);
    }

    #[test]
    fn test_upload_triangle_and_torus() {
        let mut resources = manager();
        let triangle = resources.upload_mesh(&generate_triangle()).unwrap();
        let mesh = resources.mesh(triangle).unwrap();
        assert_eq!(mesh.indices, None);
        assert_eq!(mesh.element_count(), 3);

        let mut rng = StdRng::seed_from_u64(3);
        let torus = resources
            .upload_mesh(&generate_torus(TorusParams::new(4, 6, 0.5, 1.5), &mut rng))
            .unwrap();
        let mesh = resources.mesh(torus).unwrap();
        assert!(mesh.indices.is_some());
        assert_eq!(mesh.vertex_count, 5 * 7);
        assert_eq!(mesh.element_count(), 6 * 4 * 6);
        assert_eq!(resources.device().live_buffers(), 5);

        // 16-bit index data round-trips through the device
        let data = resources
            .device()
            .buffer_data(mesh.indices.unwrap())
            .unwrap();
        let indices: Vec<u16> = data
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(&indices[..6], &[0, 7, 1, 7, 8, 1]);
    }

    #[test]
    fn test_index_overflow() {
        let vertex_count = MAX_INDEXED_VERTICES + 1;
        let mesh = MeshData {
            positions: vec![[0.0; 3]; vertex_count],
            colors: vec![[1.0; 4]; vertex_count],
            indices: vec![0, 1, (vertex_count - 1) as u32],
        };
        let mut resources = manager();
        assert!(matches!(
            resources.upload_mesh(&mesh),
            Err(GfxError::IndexOverflow { vertex_count: n }) if n == vertex_count
        ));
        assert_eq!(resources.device().live_buffers(), 0);
    }

    #[test]
    fn test_draw_mesh_indexed_and_plain() {
        let mut resources = manager();
        let mut program = resources
            .build_program(&ShaderLibrary::with_defaults(), "vs", "fs")
            .unwrap();
        let attributes = MeshAttributes {
            position: resources.resolve_attribute(&mut program, "position"),
            color: resources.resolve_attribute(&mut program, "color"),
        };

        let mut rng = StdRng::seed_from_u64(1);
        let torus = resources
            .upload_mesh(&generate_torus(TorusParams::new(2, 2, 0.5, 1.0), &mut rng))
            .unwrap();
        let triangle = resources.upload_mesh(&generate_triangle()).unwrap();

        resources.bind_mesh(torus, attributes).unwrap();
        assert_eq!(resources.draw_mesh(torus).unwrap(), 24);
        resources.bind_mesh(triangle, attributes).unwrap();
        assert_eq!(resources.draw_mesh(triangle).unwrap(), 3);

        let draws: Vec<_> = resources.device().draws().collect();
        assert_eq!(draws.len(), 2);
        assert!(draws[0].index_buffer.is_some());
        assert_eq!(draws[1].index_buffer, None);
    }

    #[test]
    fn test_release_and_teardown() {
        let mut resources = manager();
        resources
            .build_program(&ShaderLibrary::with_defaults(), "vs", "fs")
            .unwrap();
        let first = resources.upload_mesh(&generate_triangle()).unwrap();
        resources.upload_mesh(&generate_triangle()).unwrap();
        assert_eq!(resources.device().live_buffers(), 4);

        resources.release_mesh(first).unwrap();
        assert_eq!(resources.device().live_buffers(), 2);
        assert!(matches!(
            resources.release_mesh(first),
            Err(GfxError::UnknownMesh(0))
        ));

        let device = resources.teardown();
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_shaders(), 0);
    }
}
