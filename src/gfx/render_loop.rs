//! # Render Loop
//!
//! Two phases. [`RenderLoop::setup`] runs once: it configures static state,
//! builds the shader program, uploads the scene's meshes and computes the
//! camera's view-projection matrix. [`RenderLoop::frame`] then runs once per
//! display refresh:
//!
//! 1. request the next frame from the host's [`FrameScheduler`]
//! 2. apply the culling, winding and depth-test toggles
//! 3. clear color and depth
//! 4. advance the frame counter
//! 5. per object: update its model matrix, upload `view_projection * model`,
//!    bind its mesh and draw
//! 6. flush
//!
//! The next frame is requested before any work, so a frame that fails still
//! keeps the cycle alive; the host ends the loop by not honoring requests.
//! A failed frame is discarded on the device, so none of its work is submitted.

use log::{debug, info, warn};

use super::device::{Capability, ClearMask, GpuDevice, UniformLocation, Winding};
use super::resources::{MeshAttributes, MeshId, ResourceManager, ShaderLibrary, ShaderProgram};
use super::scene::{SceneDescription, SceneObject};
use super::transform::TransformPipeline;
use crate::config::RenderConfig;
use crate::error::Result;

/// The host's "call me again on the next refresh" primitive
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// A scheduler for hosts that pump frames themselves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualScheduler {
    pending: u32,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one outstanding request.
    pub fn take_request(&mut self) -> bool {
        if self.pending > 0 {
            self.pending -= 1;
            true
        } else {
            false
        }
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) {
        self.pending += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    Culling,
    ClockwiseWinding,
    DepthTest,
}

/// External switches sampled once per frame
///
/// `None` means the host has no such switch; the loop then uses the value
/// from [`RenderConfig`], which is off unless configured otherwise.
pub trait ToggleSource {
    fn toggle(&self, toggle: Toggle) -> Option<bool>;
}

/// No switches at all
impl ToggleSource for () {
    fn toggle(&self, _toggle: Toggle) -> Option<bool> {
        None
    }
}

/// Fixed switch positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticToggles {
    pub culling: Option<bool>,
    pub clockwise_winding: Option<bool>,
    pub depth_test: Option<bool>,
}

impl ToggleSource for StaticToggles {
    fn toggle(&self, toggle: Toggle) -> Option<bool> {
        match toggle {
            Toggle::Culling => self.culling,
            Toggle::ClockwiseWinding => self.clockwise_winding,
            Toggle::DepthTest => self.depth_test,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameState {
    pub frame_count: u64,
}

/// What one frame submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub draw_calls: u32,
    pub vertices: u32,
}

pub struct RenderLoop<D: GpuDevice> {
    resources: ResourceManager<D>,
    program: ShaderProgram,
    attributes: MeshAttributes,
    mvp_location: Option<UniformLocation>,
    transforms: TransformPipeline,
    objects: Vec<SceneObject>,
    meshes: Vec<MeshId>,
    config: RenderConfig,
    state: FrameState,
}

impl<D: GpuDevice> RenderLoop<D> {
    /// Builds everything the frames need.
    ///
    /// Fails if the scene references a missing mesh, a shader source is
    /// missing or does not compile or link, or a mesh cannot be uploaded.
    pub fn setup(
        device: D,
        library: &ShaderLibrary,
        config: &RenderConfig,
        scene: SceneDescription,
    ) -> Result<Self> {
        scene.validate()?;
        let mut resources = ResourceManager::new(device);

        {
            let device = resources.device_mut();
            device.viewport(0, 0, config.width, config.height);
            device.clear_color(config.clear_color);
            device.clear_depth(config.clear_depth);
            device.depth_func(config.depth_func);
        }
        apply_toggles(resources.device_mut(), config, &());

        let mut program =
            resources.build_program(library, &config.vertex_shader, &config.fragment_shader)?;
        let attributes = MeshAttributes {
            position: resources.resolve_attribute(&mut program, &config.position_attribute),
            color: resources.resolve_attribute(&mut program, &config.color_attribute),
        };
        let mvp_location = resources.resolve_uniform(&mut program, &config.mvp_uniform);
        if mvp_location.is_none() {
            warn!("objects will be drawn without a transform");
        }

        let meshes = scene
            .meshes
            .iter()
            .map(|mesh| resources.upload_mesh(mesh))
            .collect::<Result<Vec<_>>>()?;

        let camera = scene.camera.with_aspect(config.aspect());
        let transforms = TransformPipeline::new(&camera);
        info!(
            "render loop ready: {} objects, {} meshes, camera at {:?}",
            scene.objects.len(),
            meshes.len(),
            camera.eye
        );

        Ok(Self {
            resources,
            program,
            attributes,
            mvp_location,
            transforms,
            objects: scene.objects,
            meshes,
            config: config.clone(),
            state: FrameState::default(),
        })
    }

    /// Renders one frame.
    ///
    /// On failure nothing of the frame is submitted; the device drops what
    /// was recorded so far.
    pub fn frame(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        toggles: &dyn ToggleSource,
    ) -> Result<FrameStats> {
        scheduler.request_frame();

        self.state.frame_count += 1;
        let frame = self.state.frame_count;
        match self.draw_frame(frame, toggles) {
            Ok(stats) => {
                debug!(
                    "frame {}: {} draws, {} vertices",
                    frame, stats.draw_calls, stats.vertices
                );
                Ok(stats)
            }
            Err(err) => {
                warn!("frame {} failed: {}", frame, err);
                self.resources.device_mut().discard_frame();
                Err(err)
            }
        }
    }

    fn draw_frame(&mut self, frame: u64, toggles: &dyn ToggleSource) -> Result<FrameStats> {
        apply_toggles(self.resources.device_mut(), &self.config, toggles);
        self.resources.device_mut().clear(ClearMask::COLOR_DEPTH);

        let mut stats = FrameStats {
            frame,
            ..Default::default()
        };

        for object in &mut self.objects {
            object.update(frame);
            let mesh = self.meshes[object.mesh];

            self.resources.use_program(&self.program)?;
            if let Some(location) = self.mvp_location {
                let mvp = self.transforms.compose(&object.model);
                self.resources
                    .set_uniform_matrix(&self.program, location, mvp)?;
            }
            self.resources.bind_mesh(mesh, self.attributes)?;
            stats.vertices += self.resources.draw_mesh(mesh)?;
            stats.draw_calls += 1;
        }

        self.resources.device_mut().flush()?;
        Ok(stats)
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn transforms(&self) -> &TransformPipeline {
        &self.transforms
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn resources(&self) -> &ResourceManager<D> {
        &self.resources
    }

    pub fn device(&self) -> &D {
        self.resources.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.resources.device_mut()
    }

    /// Releases every GPU resource and returns the device.
    pub fn teardown(self) -> D {
        self.resources.teardown()
    }
}

fn apply_toggles<D: GpuDevice>(device: &mut D, config: &RenderConfig, toggles: &dyn ToggleSource) {
    let culling = toggles.toggle(Toggle::Culling).unwrap_or(config.culling);
    let clockwise = toggles
        .toggle(Toggle::ClockwiseWinding)
        .unwrap_or(config.clockwise_winding);
    let depth_test = toggles.toggle(Toggle::DepthTest).unwrap_or(config.depth_test);

    device.set_capability(Capability::CullFace, culling);
    device.front_face(Winding::from_clockwise(clockwise));
    device.set_capability(Capability::DepthTest, depth_test);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GfxError;
    use crate::gfx::backend::{Command, RecordingDevice, WgpuDevice};
    use crate::gfx::device::{BufferTarget, DeviceError, ShaderKind};
    use crate::gfx::geometry::TorusParams;
    use crate::math::{Matrix4, Vector3};
    use rand::{rngs::StdRng, SeedableRng};

    fn triangles(config: &RenderConfig) -> RenderLoop<RecordingDevice> {
        RenderLoop::setup(
            RecordingDevice::new(config.width, config.height),
            &ShaderLibrary::with_defaults(),
            config,
            SceneDescription::triangles(),
        )
        .unwrap()
    }

    #[test]
    fn test_frame_draws_every_object() {
        let mut render_loop = triangles(&RenderConfig::default());
        let mut scheduler = ManualScheduler::new();

        let stats = render_loop.frame(&mut scheduler, &()).unwrap();
        assert_eq!(
            stats,
            FrameStats {
                frame: 1,
                draw_calls: 3,
                vertices: 9
            }
        );
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(render_loop.device().frames_submitted(), 1);
        assert_eq!(render_loop.device().draws().count(), 3);
    }

    #[test]
    fn test_uploaded_mvp_is_view_projection_times_model() {
        let mut render_loop = triangles(&RenderConfig::default());
        render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();

        let vp = *render_loop.transforms().view_projection();
        let binding = render_loop
            .program()
            .uniform("mvp_matrix")
            .unwrap()
            .id();
        for (draw, object) in render_loop.device().draws().zip(render_loop.objects()) {
            let uploaded = Matrix4::from_cols_array(*draw.uniform(binding).unwrap());
            assert!(uploaded.approx_eq(&(vp * object.model), 1e-6));
        }
    }

    #[test]
    fn test_static_triangle_is_visible() {
        let config = RenderConfig::default().with_viewport(100, 100);
        let mut scene = SceneDescription::triangles();
        scene.objects.truncate(1);
        scene.objects[0].animation = crate::gfx::scene::Animation::Static;

        let mut render_loop = RenderLoop::setup(
            RecordingDevice::new(100, 100),
            &ShaderLibrary::with_defaults(),
            &config,
            scene,
        )
        .unwrap();
        render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();

        let draw = render_loop.device().draws().next().unwrap();
        let mvp = Matrix4::from_cols_array(*draw.uniform(0).unwrap());
        for p in [
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ] {
            let [x, y, z, w] = mvp.transform_point(p);
            for c in [x / w, y / w, z / w] {
                assert!((-1.0..=1.0).contains(&c), "{p:?} projects outside clip space");
            }
        }
    }

    #[test]
    fn test_frame_command_order() {
        let mut render_loop = triangles(&RenderConfig::default());
        render_loop.device_mut().take_commands();
        render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();

        let commands = render_loop.device().commands();
        let clear = commands
            .iter()
            .position(|c| matches!(c, Command::Clear(_)))
            .unwrap();
        let first_draw = commands
            .iter()
            .position(|c| matches!(c, Command::Draw(_)))
            .unwrap();
        let first_upload = commands
            .iter()
            .position(|c| matches!(c, Command::UniformMatrix { .. }))
            .unwrap();

        assert!(matches!(commands[0], Command::SetCapability { .. }));
        assert!(clear < first_upload && first_upload < first_draw);
        assert_eq!(commands.last(), Some(&Command::Flush));
        // Non-indexed triangles unbind any index buffer
        assert!(commands.contains(&Command::BindBuffer {
            target: BufferTarget::ElementArray,
            buffer: None
        }));
    }

    #[test]
    fn test_frame_counter_advances() {
        let mut render_loop = triangles(&RenderConfig::default());
        let mut scheduler = ManualScheduler::new();
        for _ in 0..3 {
            render_loop.frame(&mut scheduler, &()).unwrap();
        }
        assert_eq!(render_loop.frame_state().frame_count, 3);
        assert_eq!(scheduler.pending(), 3);
        assert!(scheduler.take_request());
        assert_eq!(scheduler.pending(), 2);
    }

    #[test]
    fn test_toggles_override_config() {
        let config = RenderConfig::default().with_depth_test(true);
        let mut render_loop = triangles(&config);

        render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();
        let raster = render_loop.device().draws().last().unwrap().raster;
        assert!(raster.depth_test);
        assert!(!raster.cull_face);
        assert_eq!(raster.front_face, Winding::CounterClockwise);

        let toggles = StaticToggles {
            culling: Some(true),
            clockwise_winding: Some(true),
            depth_test: Some(false),
        };
        render_loop.frame(&mut ManualScheduler::new(), &toggles).unwrap();
        let raster = render_loop.device().draws().last().unwrap().raster;
        assert!(!raster.depth_test);
        assert!(raster.cull_face);
        assert_eq!(raster.front_face, Winding::Clockwise);
    }

    #[test]
    fn test_torus_scene_draws_indexed() {
        let mut rng = StdRng::seed_from_u64(5);
        let params = TorusParams::new(6, 10, 0.5, 1.5);
        let mut render_loop = RenderLoop::setup(
            RecordingDevice::new(64, 64),
            &ShaderLibrary::with_defaults(),
            &RenderConfig::default().with_depth_test(true),
            SceneDescription::torus(params, &mut rng),
        )
        .unwrap();

        let stats = render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices, 6 * 6 * 10);
        assert!(render_loop.device().draws().all(|d| d.index_buffer.is_some()));
    }

    #[test]
    fn test_broken_shader_fails_setup() {
        let mut library = ShaderLibrary::with_defaults();
        library.insert("fs", "fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }");

        let result = RenderLoop::setup(
            RecordingDevice::new(64, 64),
            &library,
            &RenderConfig::default(),
            SceneDescription::triangles(),
        );
        match result {
            Err(GfxError::ShaderCompile { kind, log }) => {
                assert_eq!(kind, ShaderKind::Fragment);
                assert!(log.contains("@fragment"));
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("setup succeeded with a broken shader"),
        }
    }

    #[test]
    fn test_failed_frame_still_reschedules() {
        let mut render_loop = triangles(&RenderConfig::default());
        let program = render_loop.program().handle();
        render_loop.device_mut().delete_program(program);

        let mut scheduler = ManualScheduler::new();
        let err = render_loop.frame(&mut scheduler, &()).unwrap_err();
        assert!(matches!(err, GfxError::Device(DeviceError::NoActiveProgram)));
        assert_eq!(scheduler.pending(), 1);

        // Nothing of the failed frame reaches the GPU
        let device = render_loop.device();
        assert_eq!(device.frames_submitted(), 0);
        assert_eq!(device.frames_discarded(), 1);
        assert_eq!(device.commands().last(), Some(&Command::DiscardFrame));
    }

    #[test]
    fn test_repeated_failures_do_not_accumulate_on_wgpu() {
        let Ok(device) = pollster::block_on(WgpuDevice::headless(64, 64)) else {
            eprintln!("no wgpu adapter available, skipping");
            return;
        };
        let config = RenderConfig::default().with_viewport(64, 64);
        let mut render_loop = RenderLoop::setup(
            device,
            &ShaderLibrary::with_defaults(),
            &config,
            SceneDescription::triangles(),
        )
        .unwrap();
        let program = render_loop.program().handle();
        render_loop.device_mut().delete_program(program);

        let mut scheduler = ManualScheduler::new();
        for _ in 0..50 {
            assert!(render_loop.frame(&mut scheduler, &()).is_err());
        }
        assert_eq!(scheduler.pending(), 50);
        assert_eq!(render_loop.device().pending_ops(), 0);
        assert_eq!(render_loop.device().pending_uniform_slots(), 0);
        assert_eq!(render_loop.device().frames_submitted(), 0);
    }

    #[test]
    fn test_teardown_releases_scene() {
        let mut render_loop = triangles(&RenderConfig::default());
        render_loop.frame(&mut ManualScheduler::new(), &()).unwrap();
        let device = render_loop.teardown();
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_programs(), 0);
    }
}
