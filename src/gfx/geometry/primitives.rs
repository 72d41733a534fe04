//! # Primitive Shape Generation
//!
//! Triangle, quad and torus generators. Every vertex carries a position and
//! an RGBA color.

use std::f32::consts::PI;

use rand::Rng;

use super::MeshData;
use crate::gfx::color::hsva;

/// Parameters of [`generate_torus`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorusParams {
    /// Segments around the tube (theta)
    pub rows: u32,
    /// Segments around the ring (phi)
    pub columns: u32,
    /// Tube radius
    pub inner_radius: f32,
    /// Distance from the torus center to the tube center
    pub outer_radius: f32,
}

impl TorusParams {
    pub fn new(rows: u32, columns: u32, inner_radius: f32, outer_radius: f32) -> Self {
        Self {
            rows,
            columns,
            inner_radius,
            outer_radius,
        }
    }
}

impl Default for TorusParams {
    fn default() -> Self {
        Self::new(32, 32, 1.0, 2.0)
    }
}

/// The red/green/blue triangle with vertices `(0,1,0)`, `(1,0,0)` and `(-1,0,0)`
///
/// Not indexed; draw it as three vertices in order.
pub fn generate_triangle() -> MeshData {
    MeshData {
        positions: vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]],
        colors: vec![
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
        ],
        indices: Vec::new(),
    }
}

/// A diamond-shaped quad of four vertices drawn through six indices
pub fn generate_quad() -> MeshData {
    MeshData {
        positions: vec![
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
        ],
        colors: vec![
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0],
        ],
        indices: vec![0, 1, 2, 1, 2, 3],
    }
}

/// Triangle indices for a `(rows + 1) x (columns + 1)` vertex grid
///
/// Each cell `(i, j)` with `base = (columns + 1) * i + j` yields the
/// triangles `(base, base + columns + 1, base + 1)` and
/// `(base + columns + 1, base + columns + 2, base + 1)`.
pub fn grid_indices(rows: u32, columns: u32) -> Vec<u32> {
    let stride = columns + 1;
    let mut indices = Vec::with_capacity((rows * columns * 6) as usize);

    for i in 0..rows {
        for j in 0..columns {
            let base = stride * i + j;

            // First triangle
            indices.push(base);
            indices.push(base + stride);
            indices.push(base + 1);

            // Second triangle
            indices.push(base + stride);
            indices.push(base + stride + 1);
            indices.push(base + 1);
        }
    }

    indices
}

/// Generate a torus with randomized vertex jitter and alpha
///
/// Vertices are emitted for `i` in `0..=rows` and `j` in `0..=columns`; the
/// last row and column duplicate the first so the seam closes without
/// wraparound indexing. With `theta = 2*PI*i/rows` and `phi = 2*PI*j/columns`:
///
/// ```text
/// x = (r*cos(theta) + R)*cos(phi)
/// y =  r*sin(theta)
/// z = (r*cos(theta) + R)*sin(phi)
/// ```
///
/// Each coordinate then gets an independent offset drawn uniformly from
/// `[-1, 1)`. The vertex hue is `360 / columns * j` at full saturation and
/// value, and its alpha is the absolute value of another `[-1, 1)` sample.
///
/// Row and column counts below 1 are raised to 1.
pub fn generate_torus<R: Rng>(params: TorusParams, rng: &mut R) -> MeshData {
    let rows = params.rows.max(1);
    let columns = params.columns.max(1);
    let r = params.inner_radius;
    let ring = params.outer_radius;

    let vertex_count = ((rows + 1) * (columns + 1)) as usize;
    let mut mesh = MeshData {
        positions: Vec::with_capacity(vertex_count),
        colors: Vec::with_capacity(vertex_count),
        indices: Vec::new(),
    };

    for i in 0..=rows {
        let theta = PI * 2.0 / rows as f32 * i as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for j in 0..=columns {
            let phi = PI * 2.0 / columns as f32 * j as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            let tube = r * cos_theta + ring;
            let x = tube * cos_phi + rng.random_range(-1.0..1.0);
            let y = r * sin_theta + rng.random_range(-1.0..1.0);
            let z = tube * sin_phi + rng.random_range(-1.0..1.0);
            mesh.positions.push([x, y, z]);

            let hue = 360.0 / columns as f32 * j as f32;
            let alpha = rng.random_range(-1.0f32..1.0).abs();
            // Saturation and value are 1 and alpha <= 1, so hsva always converts
            let color = hsva(hue, 1.0, 1.0, alpha).unwrap_or([1.0, 1.0, 1.0, alpha]);
            mesh.colors.push(color);
        }
    }

    mesh.indices = grid_indices(rows, columns);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_triangle_generation() {
        let tri = generate_triangle();
        assert_eq!(tri.vertex_count(), 3);
        assert_eq!(tri.triangle_count(), 1);
        assert!(!tri.is_indexed());
    }

    #[test]
    fn test_quad_generation() {
        let quad = generate_quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.indices.len(), 6);
        assert_eq!(quad.triangle_count(), 2);
    }

    #[test]
    fn test_torus_counts() {
        let mut rng = StdRng::seed_from_u64(1);
        for (rows, columns) in [(2, 2), (3, 5), (32, 32), (16, 48)] {
            let torus = generate_torus(TorusParams::new(rows, columns, 1.0, 2.0), &mut rng);
            let expected_vertices = ((rows + 1) * (columns + 1)) as usize;

            assert_eq!(torus.vertex_count(), expected_vertices);
            assert_eq!(torus.colors.len(), expected_vertices);
            assert_eq!(torus.indices.len(), (6 * rows * columns) as usize);
            assert_eq!(torus.triangle_count(), (2 * rows * columns) as usize);
            assert!(torus
                .indices
                .iter()
                .all(|&i| (i as usize) < expected_vertices));
            assert!(torus.validate().is_ok());
        }
    }

    #[test]
    fn test_torus_first_cell() {
        let mut rng = StdRng::seed_from_u64(2);
        let torus = generate_torus(TorusParams::new(2, 2, 1.0, 2.0), &mut rng);
        assert_eq!(&torus.indices[..6], &[0, 3, 1, 3, 4, 1]);
        assert_eq!(grid_indices(2, 2), torus.indices);
    }

    #[test]
    fn test_torus_jitter_stays_within_one_unit() {
        let params = TorusParams::new(8, 12, 0.5, 1.5);
        let mut rng = StdRng::seed_from_u64(3);
        let torus = generate_torus(params, &mut rng);

        for (idx, p) in torus.positions.iter().enumerate() {
            let i = idx as u32 / (params.columns + 1);
            let j = idx as u32 % (params.columns + 1);
            let theta = PI * 2.0 / params.rows as f32 * i as f32;
            let phi = PI * 2.0 / params.columns as f32 * j as f32;
            let tube = params.inner_radius * theta.cos() + params.outer_radius;
            let ideal = [
                tube * phi.cos(),
                params.inner_radius * theta.sin(),
                tube * phi.sin(),
            ];
            for axis in 0..3 {
                let offset = p[axis] - ideal[axis];
                assert!((-1.0 - 1e-5..1.0 + 1e-5).contains(&offset));
            }
        }
    }

    #[test]
    fn test_torus_colors_follow_columns() {
        let mut rng = StdRng::seed_from_u64(4);
        let columns = 6;
        let torus = generate_torus(TorusParams::new(3, columns, 1.0, 2.0), &mut rng);

        for (idx, c) in torus.colors.iter().enumerate() {
            let j = idx as u32 % (columns + 1);
            let expected = hsva(60.0 * j as f32, 1.0, 1.0, c[3]).unwrap();
            assert!((c[0] - expected[0]).abs() < 1e-5);
            assert!((c[1] - expected[1]).abs() < 1e-5);
            assert!((c[2] - expected[2]).abs() < 1e-5);
            assert!((0.0..=1.0).contains(&c[3]));
        }
    }

    #[test]
    fn test_torus_is_reproducible_with_seeded_rng() {
        let params = TorusParams::default();
        let a = generate_torus(params, &mut StdRng::seed_from_u64(9));
        let b = generate_torus(params, &mut StdRng::seed_from_u64(9));
        let c = generate_torus(params, &mut StdRng::seed_from_u64(10));
        assert_eq!(a, b);
        assert_ne!(a.positions, c.positions);
        assert_eq!(a.indices, c.indices);
    }
}
