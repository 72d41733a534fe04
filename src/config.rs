//! Render configuration
//!
//! Everything the render loop needs to know about its host up front: the
//! viewport, clear values, the initial fixed-function state, and the names
//! under which shaders, attributes and the MVP uniform are found.

use crate::gfx::device::CompareFunction;
use crate::gfx::resources::shader_library::{DEFAULT_FRAGMENT_KEY, DEFAULT_VERTEX_KEY};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub culling: bool,
    pub clockwise_winding: bool,
    pub depth_test: bool,
    pub depth_func: CompareFunction,
    /// Shader library key of the vertex shader
    pub vertex_shader: String,
    /// Shader library key of the fragment shader
    pub fragment_shader: String,
    pub position_attribute: String,
    pub color_attribute: String,
    pub mvp_uniform: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 512,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            culling: false,
            clockwise_winding: false,
            depth_test: false,
            depth_func: CompareFunction::LessEqual,
            vertex_shader: DEFAULT_VERTEX_KEY.to_string(),
            fragment_shader: DEFAULT_FRAGMENT_KEY.to_string(),
            position_attribute: "position".to_string(),
            color_attribute: "color".to_string(),
            mvp_uniform: "mvp_matrix".to_string(),
        }
    }
}

impl RenderConfig {
    /// Viewport width / height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = depth;
        self
    }

    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.culling = enabled;
        self
    }

    pub fn with_clockwise_winding(mut self, enabled: bool) -> Self {
        self.clockwise_winding = enabled;
        self
    }

    pub fn with_depth_test(mut self, enabled: bool) -> Self {
        self.depth_test = enabled;
        self
    }

    pub fn with_depth_func(mut self, func: CompareFunction) -> Self {
        self.depth_func = func;
        self
    }

    /// Sets the shader library keys of the two stages
    pub fn with_shaders(mut self, vertex: &str, fragment: &str) -> Self {
        self.vertex_shader = vertex.to_owned();
        self.fragment_shader = fragment.to_owned();
        self
    }

    pub fn with_attribute_names(mut self, position: &str, color: &str) -> Self {
        self.position_attribute = position.to_owned();
        self.color_attribute = color.to_owned();
        self
    }

    pub fn with_mvp_uniform(mut self, name: &str) -> Self {
        self.mvp_uniform = name.to_owned();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!((config.width, config.height), (640, 512));
        assert!((config.aspect() - 1.25).abs() < 1e-6);
        assert!(!config.culling && !config.depth_test);
        assert!(!config.clockwise_winding);
        assert_eq!(config.vertex_shader, "vs");
    }

    #[test]
    fn test_builder() {
        let config = RenderConfig::default()
            .with_viewport(300, 300)
            .with_clockwise_winding(true)
            .with_depth_test(true)
            .with_shaders("torus.vs", "torus.fs");
        assert_eq!(config.aspect(), 1.0);
        assert!(config.clockwise_winding);
        assert!(config.depth_test);
        assert_eq!(config.fragment_shader, "torus.fs");
    }

    #[test]
    fn test_zero_height_aspect_is_finite() {
        let config = RenderConfig::default().with_viewport(10, 0);
        assert!(config.aspect().is_finite());
    }
}
