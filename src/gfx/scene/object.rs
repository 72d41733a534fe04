use crate::gfx::transform::frame_angle;
use crate::math::{Matrix4, Vector3};

/// How an object's model matrix follows the frame counter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Animation {
    /// Model matrix stays identity
    #[default]
    Static,
    /// Circles `center` in the XY plane
    Orbit { center: Vector3, radius: f32 },
    /// Sits at `offset` and rotates about `axis`
    Spin { offset: Vector3, axis: Vector3 },
    /// Sits at `offset` and scales X and Y by `sin(angle) + 1`, flattening Z
    Pulse { offset: Vector3 },
}

impl Animation {
    /// Writes the model matrix for `angle` radians into `dst`.
    pub fn model_matrix(&self, angle: f32, dst: &mut Matrix4) {
        *dst = Matrix4::IDENTITY;
        match *self {
            Animation::Static => {}
            Animation::Orbit { center, radius } => {
                let offset = Vector3::new(angle.cos(), angle.sin(), 0.0) * radius;
                dst.translate(center + offset);
            }
            Animation::Spin { offset, axis } => {
                dst.translate(offset).rotate(angle, axis);
            }
            Animation::Pulse { offset } => {
                let s = angle.sin() + 1.0;
                dst.translate(offset).scale(Vector3::new(s, s, 0.0));
            }
        }
    }
}

/// One drawable instance of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Index into the scene's mesh list
    pub mesh: usize,
    pub animation: Animation,
    pub model: Matrix4,
}

impl SceneObject {
    pub fn new(mesh: usize, animation: Animation) -> Self {
        Self {
            mesh,
            animation,
            model: Matrix4::IDENTITY,
        }
    }

    /// Recomputes the model matrix for `frame`.
    pub fn update(&mut self, frame: u64) {
        self.animation.model_matrix(frame_angle(frame), &mut self.model);
    }
}
