//! Bundled WGSL sources for the default vertex-color program.

/// Inputs `position` (location 0) and `color` (location 1), uniform `mvp_matrix`
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("shaders/basic.vert.wgsl");
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("shaders/basic.frag.wgsl");
