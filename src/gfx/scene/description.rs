use rand::Rng;

use super::{Animation, SceneObject};
use crate::error::{GfxError, Result};
use crate::gfx::camera::Camera;
use crate::gfx::geometry::{generate_torus, generate_triangle, MeshData, TorusParams};
use crate::math::Vector3;

/// Camera, meshes and objects for one render loop
#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    pub camera: Camera,
    pub meshes: Vec<MeshData>,
    pub objects: Vec<SceneObject>,
}

impl SceneDescription {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            meshes: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Adds a mesh and returns its index.
    pub fn add_mesh(&mut self, mesh: MeshData) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_object(&mut self, mesh: usize, animation: Animation) -> &mut Self {
        self.objects.push(SceneObject::new(mesh, animation));
        self
    }

    /// Checks that every object references an existing mesh.
    pub fn validate(&self) -> Result<()> {
        match self.objects.iter().find(|o| o.mesh >= self.meshes.len()) {
            Some(object) => Err(GfxError::UnknownMesh(object.mesh)),
            None => Ok(()),
        }
    }

    /// Three copies of the colored triangle: one circling above the origin,
    /// one spinning about Y to the lower right, one pulsing to the lower left.
    pub fn triangles() -> Self {
        let camera = Camera::new(Vector3::new(0.0, 1.0, 3.0), Vector3::ZERO, Vector3::UNIT_Y)
            .with_perspective(90.0, 0.1, 100.0);
        let mut scene = Self::new(camera);
        let triangle = scene.add_mesh(generate_triangle());

        scene
            .add_object(
                triangle,
                Animation::Orbit {
                    center: Vector3::new(0.0, 1.0, 0.0),
                    radius: 1.0,
                },
            )
            .add_object(
                triangle,
                Animation::Spin {
                    offset: Vector3::new(1.0, -1.0, 0.0),
                    axis: Vector3::UNIT_Y,
                },
            )
            .add_object(
                triangle,
                Animation::Pulse {
                    offset: Vector3::new(-1.0, -1.0, 0.0),
                },
            );
        scene
    }

    /// A single torus tumbling about the (0, 1, 1) axis, seen from 20 units away.
    pub fn torus<R: Rng>(params: TorusParams, rng: &mut R) -> Self {
        let camera = Camera::new(Vector3::new(0.0, 0.0, 20.0), Vector3::ZERO, Vector3::UNIT_Y)
            .with_perspective(45.0, 0.1, 100.0);
        let mut scene = Self::new(camera);
        let torus = scene.add_mesh(generate_torus(params, rng));
        scene.add_object(
            torus,
            Animation::Spin {
                offset: Vector3::ZERO,
                axis: Vector3::new(0.0, 1.0, 1.0),
            },
        );
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_triangles_share_one_mesh() {
        let scene = SceneDescription::triangles();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.objects.len(), 3);
        assert!(scene.objects.iter().all(|o| o.mesh == 0));
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_torus_preset() {
        let mut rng = StdRng::seed_from_u64(11);
        let scene = SceneDescription::torus(TorusParams::new(8, 16, 0.5, 2.0), &mut rng);
        assert_eq!(scene.meshes[0].vertex_count(), 9 * 17);
        assert_eq!(scene.camera.fovy_degrees, 45.0);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_dangling_mesh_reference() {
        let mut scene = SceneDescription::default();
        scene.add_object(2, Animation::Static);
        assert!(matches!(scene.validate(), Err(GfxError::UnknownMesh(2))));
    }
}
