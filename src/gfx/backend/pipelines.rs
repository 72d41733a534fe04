//! Render pipeline caching for the wgpu backend
//!
//! GL folds culling, winding, depth testing and the attribute layout into
//! mutable context state; wgpu bakes them into immutable pipelines. The cache
//! creates one pipeline per distinct combination on first use and reuses it
//! for every later draw with the same state.

use std::collections::HashMap;

use wgpu::*;

use super::state::RasterState;
use crate::gfx::device::{self, DrawMode, ProgramHandle, Winding};
use crate::gfx::resources::texture_resource::TextureResource;
use crate::wgpu_utils::float_format;

/// Everything that selects a distinct pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramHandle,
    pub raster: RasterState,
    pub mode: DrawMode,
    /// `(location, components)` for each vertex buffer slot, in slot order
    pub attributes: Vec<(u32, u32)>,
}

/// The compiled pieces of a linked program a pipeline is built from
pub struct ProgramStages<'a> {
    pub vertex: &'a ShaderModule,
    pub fragment: &'a ShaderModule,
    pub layout: &'a PipelineLayout,
}

pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, RenderPipeline>,
    color_format: TextureFormat,
}

impl PipelineCache {
    pub fn new(color_format: TextureFormat) -> Self {
        Self {
            pipelines: HashMap::new(),
            color_format,
        }
    }

    /// Returns the cached pipeline for `key`, creating it if needed.
    ///
    /// Creation runs inside a validation error scope, so an incompatible
    /// attribute layout comes back as the validator's message.
    pub fn get_or_create(
        &mut self,
        device: &Device,
        key: &PipelineKey,
        stages: ProgramStages<'_>,
    ) -> Result<RenderPipeline, String> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return Ok(pipeline.clone());
        }

        let attributes = key
            .attributes
            .iter()
            .map(|&(location, components)| {
                float_format(components)
                    .map(|format| {
                        [VertexAttribute {
                            format,
                            offset: 0,
                            shader_location: location,
                        }]
                    })
                    .ok_or_else(|| {
                        format!("attribute {location}: {components} components are not supported")
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let buffers: Vec<VertexBufferLayout> = attributes
            .iter()
            .zip(&key.attributes)
            .map(|(attribute, &(_, components))| VertexBufferLayout {
                array_stride: u64::from(components) * std::mem::size_of::<f32>() as u64,
                step_mode: VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let label = format!("program {} pipeline", key.program.id());
        let targets = [Some(ColorTargetState {
            format: self.color_format,
            blend: Some(BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
        })];

        device.push_error_scope(ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(stages.layout),
            vertex: VertexState {
                module: stages.vertex,
                entry_point: None,
                buffers: &buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: stages.fragment,
                entry_point: None,
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: primitive_state(key.mode, &key.raster),
            depth_stencil: Some(depth_stencil_state(&key.raster)),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(error.to_string());
        }

        log::debug!(
            "created {} ({:?}, {} attributes)",
            label,
            key.mode,
            key.attributes.len()
        );
        self.pipelines.insert(key.clone(), pipeline.clone());
        Ok(pipeline)
    }

    /// Drops every pipeline built for `program`.
    pub fn forget_program(&mut self, program: ProgramHandle) {
        self.pipelines.retain(|key, _| key.program != program);
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

pub fn topology(mode: DrawMode) -> PrimitiveTopology {
    match mode {
        DrawMode::Triangles => PrimitiveTopology::TriangleList,
        DrawMode::TriangleStrip => PrimitiveTopology::TriangleStrip,
        DrawMode::Lines => PrimitiveTopology::LineList,
        DrawMode::LineStrip => PrimitiveTopology::LineStrip,
        DrawMode::Points => PrimitiveTopology::PointList,
    }
}

pub fn compare_function(func: device::CompareFunction) -> CompareFunction {
    match func {
        device::CompareFunction::Never => CompareFunction::Never,
        device::CompareFunction::Less => CompareFunction::Less,
        device::CompareFunction::Equal => CompareFunction::Equal,
        device::CompareFunction::LessEqual => CompareFunction::LessEqual,
        device::CompareFunction::Greater => CompareFunction::Greater,
        device::CompareFunction::NotEqual => CompareFunction::NotEqual,
        device::CompareFunction::GreaterEqual => CompareFunction::GreaterEqual,
        device::CompareFunction::Always => CompareFunction::Always,
    }
}

pub fn primitive_state(mode: DrawMode, raster: &RasterState) -> PrimitiveState {
    let topology = topology(mode);
    PrimitiveState {
        topology,
        strip_index_format: topology.is_strip().then_some(IndexFormat::Uint16),
        front_face: match raster.front_face {
            Winding::CounterClockwise => FrontFace::Ccw,
            Winding::Clockwise => FrontFace::Cw,
        },
        cull_mode: raster.cull_face.then_some(Face::Back),
        polygon_mode: PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

/// A disabled depth test still needs a depth attachment, so it passes
/// everything and writes nothing.
pub fn depth_stencil_state(raster: &RasterState) -> DepthStencilState {
    let (depth_write_enabled, depth_compare) = if raster.depth_test {
        (true, compare_function(raster.depth_func))
    } else {
        (false, CompareFunction::Always)
    };

    DepthStencilState {
        format: TextureResource::DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare,
        stencil: StencilState::default(),
        bias: DepthBiasState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster() -> RasterState {
        RasterState {
            cull_face: false,
            front_face: Winding::CounterClockwise,
            depth_test: false,
            depth_func: device::CompareFunction::LessEqual,
        }
    }

    #[test]
    fn test_culling_and_winding() {
        let off = primitive_state(DrawMode::Triangles, &raster());
        assert_eq!(off.cull_mode, None);
        assert_eq!(off.front_face, FrontFace::Ccw);
        assert_eq!(off.strip_index_format, None);

        let on = primitive_state(
            DrawMode::TriangleStrip,
            &RasterState {
                cull_face: true,
                front_face: Winding::Clockwise,
                ..raster()
            },
        );
        assert_eq!(on.cull_mode, Some(Face::Back));
        assert_eq!(on.front_face, FrontFace::Cw);
        assert_eq!(on.strip_index_format, Some(IndexFormat::Uint16));
    }

    #[test]
    fn test_depth_test_toggle() {
        let off = depth_stencil_state(&raster());
        assert!(!off.depth_write_enabled);
        assert_eq!(off.depth_compare, CompareFunction::Always);

        let on = depth_stencil_state(&RasterState {
            depth_test: true,
            ..raster()
        });
        assert!(on.depth_write_enabled);
        assert_eq!(on.depth_compare, CompareFunction::LessEqual);
    }

    #[test]
    fn test_keys_distinguish_state() {
        let a = PipelineKey {
            program: ProgramHandle::new(1),
            raster: raster(),
            mode: DrawMode::Triangles,
            attributes: vec![(0, 3), (1, 4)],
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.raster.cull_face = true;
        assert_ne!(a, b);
    }
}
