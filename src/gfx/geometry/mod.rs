//! # Procedural Geometry Generation
//!
//! CPU-side mesh data produced procedurally, ready to be uploaded by the
//! [`ResourceManager`](crate::gfx::resources::ResourceManager).
//!
//! ## Supported Primitives
//!
//! - **Triangle**: the single colored triangle of the first tutorial scenes
//! - **Quad**: two triangles sharing an edge, drawn through an index buffer
//! - **Torus**: rows x columns grid wrapped around two radii, hue-banded by column
//!
//! ## Usage
//!
//! ```rust
//! use glint::gfx::geometry::{generate_torus, generate_triangle, TorusParams};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let triangle = generate_triangle();
//! assert_eq!(triangle.vertex_count(), 3);
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let torus = generate_torus(TorusParams::new(32, 32, 1.0, 2.0), &mut rng);
//! assert_eq!(torus.vertex_count(), 33 * 33);
//! ```

pub mod primitives;

pub use primitives::*;

use crate::error::{GfxError, Result};

/// Geometry data ready for GPU upload
///
/// Positions and colors are parallel arrays. An empty index list means the
/// mesh is drawn as a plain triangle list in vertex order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions (x, y, z)
    pub positions: Vec<[f32; 3]>,
    /// Vertex colors (r, g, b, a), each in [0, 1]
    pub colors: Vec<[f32; 4]>,
    /// Triangle indices, three per triangle
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of vertices in this mesh
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles in this mesh
    pub fn triangle_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len() / 3
        } else {
            self.positions.len() / 3
        }
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Checks the structural invariants required before upload.
    ///
    /// Colors must parallel positions, the index list must be a whole number
    /// of triangles, and every index must name an existing vertex.
    pub fn validate(&self) -> Result<()> {
        if self.colors.len() != self.positions.len() {
            return Err(GfxError::InvalidMesh(format!(
                "{} colors for {} positions",
                self.colors.len(),
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(GfxError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(GfxError::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad,
                self.positions.len()
            )));
        }
        Ok(())
    }

    /// Positions flattened to `x, y, z, x, y, z, ...` for a vertex buffer
    pub fn flat_positions(&self) -> Vec<f32> {
        self.positions.iter().flatten().copied().collect()
    }

    /// Colors flattened to `r, g, b, a, ...` for a vertex buffer
    pub fn flat_colors(&self) -> Vec<f32> {
        self.colors.iter().flatten().copied().collect()
    }
}
