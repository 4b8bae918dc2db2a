/// Camera and projection setup
/// Projections map the near plane to NDC z = +1 and the far plane to -1, so
/// larger depth means nearer. Perspective clip space keeps w = view-space z
/// (negative in front of the eye)
use glam::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view (radians)
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Camera {
    pub fn perspective(position: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            },
        }
    }

    /// Orthographic camera whose view volume is `size` units tall.
    pub fn orthographic(position: Vec3, target: Vec3, size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let half_h = size / 2.0;
        let half_w = half_h * aspect;
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::Orthographic {
                left: -half_w,
                right: half_w,
                bottom: -half_h,
                top: half_h,
                near,
                far,
            },
        }
    }

    #[inline]
    pub fn is_perspective(&self) -> bool {
        matches!(self.projection, Projection::Perspective { .. })
    }

    /// Get view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => {
                let t = (fov_y / 2.0).tan();
                Mat4::from_cols(
                    Vec4::new(-1.0 / (aspect * t), 0.0, 0.0, 0.0),
                    Vec4::new(0.0, -1.0 / t, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, (near + far) / (near - far), 1.0),
                    Vec4::new(0.0, 0.0, 2.0 * near * far / (near - far), 0.0),
                )
            }
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::from_cols(
                Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
                Vec4::new(0.0, 2.0 / (top - bottom), 0.0, 0.0),
                Vec4::new(0.0, 0.0, 2.0 / (far - near), 0.0),
                Vec4::new(
                    -(right + left) / (right - left),
                    -(top + bottom) / (top - bottom),
                    (near + far) / (far - near),
                    1.0,
                ),
            ),
        }
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get forward direction vector
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Update aspect ratio (call when the output size changes)
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        match &mut self.projection {
            Projection::Perspective { aspect, .. } => *aspect = aspect_ratio,
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                ..
            } => {
                let half_w = (*top - *bottom) / 2.0 * aspect_ratio;
                let cx = (*left + *right) / 2.0;
                *left = cx - half_w;
                *right = cx + half_w;
            }
        }
    }
}
