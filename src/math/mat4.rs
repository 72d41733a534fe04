//! # 4x4 Transform Matrices
//!
//! Column-major matrices in the layout GPU uniforms expect: element
//! `m[col * 4 + row]`. All transforms compose on the right, so
//! `translate(src, v, dst)` yields `dst = src * T(v)`.
//!
//! ```
//! use glint::math::{mat4, Matrix4, Vector3};
//!
//! let mut view = Matrix4::default();
//! let mut proj = Matrix4::default();
//! let mut view_proj = Matrix4::default();
//!
//! mat4::look_at(Vector3::new(0.0, 1.0, 3.0), Vector3::ZERO, Vector3::UNIT_Y, &mut view);
//! mat4::perspective(90.0, 1.0, 0.1, 100.0, &mut proj);
//! mat4::multiply(&proj, &view, &mut view_proj);
//! ```

use std::ops::{Index, IndexMut, Mul};

use super::Vector3;

#[rustfmt::skip]
const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// A column-major 4x4 transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    m: [f32; 16],
}

impl Matrix4 {
    pub const IDENTITY: Self = Self { m: IDENTITY };

    /// Builds a matrix from 16 column-major elements.
    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Right-handed view matrix. See [`look_at`].
    pub fn look_at(eye: Vector3, center: Vector3, up: Vector3) -> Self {
        let mut dst = Self::IDENTITY;
        look_at(eye, center, up, &mut dst);
        dst
    }

    /// Perspective projection with a vertical field of view in degrees. See [`perspective`].
    pub fn perspective(fovy_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut dst = Self::IDENTITY;
        perspective(fovy_degrees, aspect, near, far, &mut dst);
        dst
    }

    pub fn as_array(&self) -> &[f32; 16] {
        &self.m
    }

    pub fn to_cols_array(self) -> [f32; 16] {
        self.m
    }

    /// `self * T(v)`, in place.
    pub fn translate(&mut self, v: Vector3) -> &mut Self {
        let src = *self;
        translate(&src, v, self);
        self
    }

    /// `self * R(axis, angle)`, in place.
    pub fn rotate(&mut self, angle: f32, axis: Vector3) -> &mut Self {
        let src = *self;
        rotate(&src, angle, axis, self);
        self
    }

    /// `self * S(v)`, in place.
    pub fn scale(&mut self, v: Vector3) -> &mut Self {
        let src = *self;
        scale(&src, v, self);
        self
    }

    pub fn transposed(&self) -> Self {
        let mut dst = Self::IDENTITY;
        transpose(self, &mut dst);
        dst
    }

    /// Returns `None` when the matrix is singular.
    pub fn inverted(&self) -> Option<Self> {
        let mut dst = Self::IDENTITY;
        inverse(self, &mut dst).then_some(dst)
    }

    /// Transforms `p` as a point (w = 1) and returns homogeneous clip coordinates.
    pub fn transform_point(&self, p: Vector3) -> [f32; 4] {
        let m = &self.m;
        [
            m[0] * p.x + m[4] * p.y + m[8] * p.z + m[12],
            m[1] * p.x + m[5] * p.y + m[9] * p.z + m[13],
            m[2] * p.x + m[6] * p.y + m[10] * p.z + m[14],
            m[3] * p.x + m[7] * p.y + m[11] * p.z + m[15],
        ]
    }

    /// Element-wise comparison within `epsilon`.
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: Matrix4) -> Matrix4 {
        let mut dst = Matrix4::IDENTITY;
        multiply(&self, &rhs, &mut dst);
        dst
    }
}

impl Index<usize> for Matrix4 {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.m[index]
    }
}

impl IndexMut<usize> for Matrix4 {
    fn index_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.m[index]
    }
}

impl From<[f32; 16]> for Matrix4 {
    fn from(m: [f32; 16]) -> Self {
        Self { m }
    }
}

impl From<Matrix4> for [f32; 16] {
    fn from(m: Matrix4) -> Self {
        m.m
    }
}

impl From<cgmath::Matrix4<f32>> for Matrix4 {
    fn from(matrix: cgmath::Matrix4<f32>) -> Self {
        // cgmath is column-major as well
        let m: &[f32; 16] = matrix.as_ref();
        Self { m: *m }
    }
}

impl From<Matrix4> for cgmath::Matrix4<f32> {
    fn from(matrix: Matrix4) -> Self {
        let m = matrix.m;
        cgmath::Matrix4::new(
            m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12], m[13],
            m[14], m[15],
        )
    }
}

/// Sets `dst` to the identity matrix.
pub fn identity(dst: &mut Matrix4) {
    dst.m = IDENTITY;
}

/// `dst = a * b`.
pub fn multiply(a: &Matrix4, b: &Matrix4, dst: &mut Matrix4) {
    let (a, b) = (&a.m, &b.m);
    let mut out = [0.0f32; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = a[row] * b[col * 4]
                + a[4 + row] * b[col * 4 + 1]
                + a[8 + row] * b[col * 4 + 2]
                + a[12 + row] * b[col * 4 + 3];
        }
    }
    dst.m = out;
}

/// `dst = src * T(v)`.
pub fn translate(src: &Matrix4, v: Vector3, dst: &mut Matrix4) {
    let s = &src.m;
    let mut out = *s;
    for row in 0..4 {
        out[12 + row] = s[row] * v.x + s[4 + row] * v.y + s[8 + row] * v.z + s[12 + row];
    }
    dst.m = out;
}

/// `dst = src * S(v)`.
///
/// A zero factor collapses that axis; it is not treated as an error.
pub fn scale(src: &Matrix4, v: Vector3, dst: &mut Matrix4) {
    let s = &src.m;
    let mut out = *s;
    for row in 0..4 {
        out[row] = s[row] * v.x;
        out[4 + row] = s[4 + row] * v.y;
        out[8 + row] = s[8 + row] * v.z;
    }
    dst.m = out;
}

/// `dst = src * R(axis, angle)`, angle in radians.
///
/// The axis is normalized here. A zero axis is a caller error; it degrades
/// to a uniform scale by `cos(angle)`.
pub fn rotate(src: &Matrix4, angle: f32, axis: Vector3, dst: &mut Matrix4) {
    let Vector3 { x, y, z } = axis.normalize();
    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;

    // Upper 3x3 of the rotation, column-major
    #[rustfmt::skip]
    let r = [
        x * x * t + c,     y * x * t + z * s, z * x * t - y * s,
        x * y * t - z * s, y * y * t + c,     z * y * t + x * s,
        x * z * t + y * s, y * z * t - x * s, z * z * t + c,
    ];

    let sm = &src.m;
    let mut out = *sm;
    for col in 0..3 {
        for row in 0..4 {
            out[col * 4 + row] =
                sm[row] * r[col * 3] + sm[4 + row] * r[col * 3 + 1] + sm[8 + row] * r[col * 3 + 2];
        }
    }
    dst.m = out;
}

/// Right-handed view matrix looking from `eye` towards `center`.
///
/// If `up` is parallel to `center - eye` the side vector vanishes and the
/// result is degenerate. That input is not validated.
pub fn look_at(eye: Vector3, center: Vector3, up: Vector3, dst: &mut Matrix4) {
    let z = (eye - center).normalize();
    let x = up.cross(z).normalize();
    let y = z.cross(x);

    #[rustfmt::skip]
    let out = [
        x.x, y.x, z.x, 0.0,
        x.y, y.y, z.y, 0.0,
        x.z, y.z, z.z, 0.0,
        -x.dot(eye), -y.dot(eye), -z.dot(eye), 1.0,
    ];
    dst.m = out;
}

/// Perspective projection mapping the view frustum to the `[-1, 1]` clip cube.
///
/// `fovy_degrees` is the vertical field of view. `aspect` is width / height.
/// `0 < near < far` is the caller's responsibility.
pub fn perspective(fovy_degrees: f32, aspect: f32, near: f32, far: f32, dst: &mut Matrix4) {
    let f = 1.0 / (fovy_degrees.to_radians() * 0.5).tan();
    let depth = near - far;

    #[rustfmt::skip]
    let out = [
        f / aspect, 0.0, 0.0,                       0.0,
        0.0,        f,   0.0,                       0.0,
        0.0,        0.0, (far + near) / depth,      -1.0,
        0.0,        0.0, 2.0 * far * near / depth,  0.0,
    ];
    dst.m = out;
}

/// Orthographic projection onto the `[-1, 1]` clip cube.
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32, dst: &mut Matrix4) {
    let w = right - left;
    let h = top - bottom;
    let d = far - near;

    #[rustfmt::skip]
    let out = [
        2.0 / w,               0.0,                   0.0,                 0.0,
        0.0,                   2.0 / h,               0.0,                 0.0,
        0.0,                   0.0,                   -2.0 / d,            0.0,
        -(right + left) / w,   -(top + bottom) / h,   -(far + near) / d,   1.0,
    ];
    dst.m = out;
}

pub fn transpose(src: &Matrix4, dst: &mut Matrix4) {
    let s = &src.m;
    let mut out = [0.0f32; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[row * 4 + col] = s[col * 4 + row];
        }
    }
    dst.m = out;
}

/// Writes the inverse of `src` into `dst`.
///
/// Returns `false` and leaves `dst` untouched when `src` is singular.
pub fn inverse(src: &Matrix4, dst: &mut Matrix4) -> bool {
    let [a, b, c, d, e, f, g, h, i, j, k, l, m, n, o, p] = src.m;

    let q = a * f - b * e;
    let r = a * g - c * e;
    let s = a * h - d * e;
    let t = b * g - c * f;
    let u = b * h - d * f;
    let v = c * h - d * g;
    let w = i * n - j * m;
    let x = i * o - k * m;
    let y = i * p - l * m;
    let z = j * o - k * n;
    let aa = j * p - l * n;
    let bb = k * p - l * o;

    let det = q * bb - r * aa + s * z + t * y - u * x + v * w;
    if det == 0.0 {
        return false;
    }
    let inv = 1.0 / det;

    dst.m = [
        (f * bb - g * aa + h * z) * inv,
        (-b * bb + c * aa - d * z) * inv,
        (n * v - o * u + p * t) * inv,
        (-j * v + k * u - l * t) * inv,
        (-e * bb + g * y - h * x) * inv,
        (a * bb - c * y + d * x) * inv,
        (-m * v + o * s - p * r) * inv,
        (i * v - k * s + l * r) * inv,
        (e * aa - f * y + h * w) * inv,
        (-a * aa + b * y - d * w) * inv,
        (m * u - n * s + p * q) * inv,
        (-i * u + j * s - l * q) * inv,
        (-e * z + f * x - g * w) * inv,
        (a * z - b * x + c * w) * inv,
        (-m * t + n * r - o * q) * inv,
        (i * t - j * r + k * q) * inv,
    ];
    true
}
