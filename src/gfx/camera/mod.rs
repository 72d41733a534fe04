//! Look-at perspective camera
//!
//! The camera is static for a scene: its view-projection matrix is computed
//! once at setup and reused by every frame.

use crate::math::{mat4, Matrix4, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vector3,
    pub center: Vector3,
    pub up: Vector3,
    /// Vertical field of view in degrees
    pub fovy_degrees: f32,
    /// Viewport width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vector3::new(0.0, 1.0, 3.0),
            center: Vector3::ZERO,
            up: Vector3::UNIT_Y,
            fovy_degrees: 90.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new(eye: Vector3, center: Vector3, up: Vector3) -> Self {
        Self {
            eye,
            center,
            up,
            ..Default::default()
        }
    }

    pub fn with_perspective(mut self, fovy_degrees: f32, near: f32, far: f32) -> Self {
        self.fovy_degrees = fovy_degrees;
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn view_matrix(&self, dst: &mut Matrix4) {
        mat4::look_at(self.eye, self.center, self.up, dst);
    }

    pub fn projection_matrix(&self, dst: &mut Matrix4) {
        mat4::perspective(self.fovy_degrees, self.aspect, self.near, self.far, dst);
    }

    /// `projection * view`, written into `dst`.
    pub fn build_view_projection_matrix(&self, dst: &mut Matrix4) {
        let mut view = Matrix4::IDENTITY;
        let mut projection = Matrix4::IDENTITY;
        self.view_matrix(&mut view);
        self.projection_matrix(&mut projection);
        mat4::multiply(&projection, &view, dst);
    }
}
