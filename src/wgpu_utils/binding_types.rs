//! WGPU binding type utilities

/// A uniform buffer addressed with a per-draw dynamic offset.
pub fn dynamic_uniform(min_binding_size: u64) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: true,
        min_binding_size: wgpu::BufferSize::new(min_binding_size),
    }
}

/// Layout entry for a dynamic uniform visible to both stages.
pub fn dynamic_uniform_entry(binding: u32, min_binding_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: dynamic_uniform(min_binding_size),
        count: None,
    }
}

/// Vertex format for `components` tightly packed `f32`s.
pub fn float_format(components: u32) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}
