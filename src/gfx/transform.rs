//! Model-view-projection composition
//!
//! One view-projection matrix is shared by every object. Each object's MVP
//! is recomputed from its model matrix right before its draw call, into a
//! scratch slot the pipeline owns, so per-frame composition allocates nothing.

use std::f32::consts::PI;

use super::camera::Camera;
use crate::math::{mat4, Matrix4};

/// Rotation angle in radians for a frame: one degree per frame, wrapping
/// every 360 frames.
pub fn frame_angle(frame: u64) -> f32 {
    (frame % 360) as f32 * PI / 180.0
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    view_projection: Matrix4,
    mvp: Matrix4,
}

impl TransformPipeline {
    pub fn new(camera: &Camera) -> Self {
        let mut pipeline = Self {
            view_projection: Matrix4::IDENTITY,
            mvp: Matrix4::IDENTITY,
        };
        pipeline.set_camera(camera);
        pipeline
    }

    /// Recomputes the shared view-projection matrix.
    pub fn set_camera(&mut self, camera: &Camera) {
        camera.build_view_projection_matrix(&mut self.view_projection);
    }

    pub fn view_projection(&self) -> &Matrix4 {
        &self.view_projection
    }

    /// `view_projection * model`
    pub fn compose(&mut self, model: &Matrix4) -> &Matrix4 {
        mat4::multiply(&self.view_projection, model, &mut self.mvp);
        &self.mvp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    fn in_clip_cube(clip: [f32; 4]) -> bool {
        let [x, y, z, w] = clip;
        w > 0.0 && [x / w, y / w, z / w].iter().all(|c| (-1.0..=1.0).contains(c))
    }

    #[test]
    fn test_triangle_lands_inside_clip_cube() {
        let camera = Camera::new(Vector3::new(0.0, 1.0, 3.0), Vector3::ZERO, Vector3::UNIT_Y)
            .with_perspective(90.0, 0.1, 100.0)
            .with_aspect(1.0);
        let mut pipeline = TransformPipeline::new(&camera);
        let mvp = *pipeline.compose(&Matrix4::IDENTITY);

        for p in [
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ] {
            assert!(in_clip_cube(mvp.transform_point(p)), "{p:?} is clipped");
        }
    }

    #[test]
    fn test_compose_with_identity_is_view_projection() {
        let mut pipeline = TransformPipeline::new(&Camera::default());
        let vp = *pipeline.view_projection();
        assert!(pipeline.compose(&Matrix4::IDENTITY).approx_eq(&vp, 1e-6));

        let mut model = Matrix4::IDENTITY;
        model.translate(Vector3::new(0.0, 0.0, -200.0));
        // Behind the far plane
        assert!(!in_clip_cube(
            pipeline.compose(&model).transform_point(Vector3::ZERO)
        ));
    }

    #[test]
    fn test_frame_angle_wraps() {
        assert_eq!(frame_angle(0), 0.0);
        assert!((frame_angle(90) - PI / 2.0).abs() < 1e-6);
        assert_eq!(frame_angle(360), 0.0);
        assert_eq!(frame_angle(361), frame_angle(1));
    }
}
