// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::ops::Mul;

use bytemuck::{Pod, Zeroable};
use peniko::kurbo;

/// Affine transformation matrix.
///
/// Column-major 2×3 layout: `matrix` holds the columns `(a, b)` and `(c, d)`,
/// `translation` holds `(e, f)`.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// 2x2 matrix.
    pub matrix: [f32; 4],
    /// Translation.
    pub translation: [f32; 2],
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        matrix: [1.0, 0.0, 0.0, 1.0],
        translation: [0.0; 2],
    };

    /// Creates a transform representing a translation.
    pub const fn translation(x: f32, y: f32) -> Self {
        Self {
            matrix: [1.0, 0.0, 0.0, 1.0],
            translation: [x, y],
        }
    }

    /// Creates a transform representing a non-uniform scale.
    pub const fn scale(x: f32, y: f32) -> Self {
        Self {
            matrix: [x, 0.0, 0.0, y],
            translation: [0.0; 2],
        }
    }

    /// Creates a transform representing a rotation by `angle` radians.
    pub fn rotation(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            matrix: [c, s, -s, c],
            translation: [0.0; 2],
        }
    }

    /// Creates a transform from a kurbo affine matrix.
    pub fn from_kurbo(transform: &kurbo::Affine) -> Self {
        let c = transform.as_coeffs().map(|x| x as f32);
        Self {
            matrix: [c[0], c[1], c[2], c[3]],
            translation: [c[4], c[5]],
        }
    }

    /// Converts the transform to a kurbo affine matrix.
    pub fn to_kurbo(&self) -> kurbo::Affine {
        kurbo::Affine::new(
            [
                self.matrix[0],
                self.matrix[1],
                self.matrix[2],
                self.matrix[3],
                self.translation[0],
                self.translation[1],
            ]
            .map(|x| x as f64),
        )
    }

    /// Constructs a transform from the flat `[a, b, c, d, e, f]` form.
    pub const fn from_coeffs(m: [f32; 6]) -> Self {
        Self {
            matrix: [m[0], m[1], m[2], m[3]],
            translation: [m[4], m[5]],
        }
    }

    /// Applies the full transform to a point.
    pub fn apply(&self, p: [f32; 2]) -> [f32; 2] {
        [
            self.matrix[0] * p[0] + self.matrix[2] * p[1] + self.translation[0],
            self.matrix[1] * p[0] + self.matrix[3] * p[1] + self.translation[1],
        ]
    }

    /// Applies only the linear part of the transform to a vector.
    pub fn apply_vec(&self, v: [f32; 2]) -> [f32; 2] {
        [
            self.matrix[0] * v[0] + self.matrix[2] * v[1],
            self.matrix[1] * v[0] + self.matrix[3] * v[1],
        ]
    }

    /// Returns the inverse transform, or identity if the matrix is singular.
    pub fn inverse(&self) -> Self {
        let m = &self.matrix;
        let det = m[0] as f64 * m[3] as f64 - m[2] as f64 * m[1] as f64;
        if det.abs() < 1e-12 {
            return Self::IDENTITY;
        }
        let inv_det = 1.0 / det;
        let a = (m[3] as f64 * inv_det) as f32;
        let b = (-m[1] as f64 * inv_det) as f32;
        let c = (-m[2] as f64 * inv_det) as f32;
        let d = (m[0] as f64 * inv_det) as f32;
        let e = -(self.translation[0] * a + self.translation[1] * c);
        let f = -(self.translation[0] * b + self.translation[1] * d);
        Self {
            matrix: [a, b, c, d],
            translation: [e, f],
        }
    }

    /// Mean of the column norms; drives tessellation level of detail and
    /// stroker widths.
    pub fn average_scale(&self) -> f32 {
        let m = &self.matrix;
        let sx = (m[0] * m[0] + m[2] * m[2]).sqrt();
        let sy = (m[1] * m[1] + m[3] * m[3]).sqrt();
        (sx + sy) * 0.5
    }

    /// Expands to the 3×3 column-major matrix consumed by paint shaders,
    /// with an implicit `(0, 0, 1)` third column.
    pub fn to_mat3(&self) -> [f32; 9] {
        [
            self.matrix[0],
            self.matrix[1],
            0.0,
            self.matrix[2],
            self.matrix[3],
            0.0,
            self.translation[0],
            self.translation[1],
            1.0,
        ]
    }
}

impl Mul for Transform {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            matrix: [
                self.matrix[0] * other.matrix[0] + self.matrix[2] * other.matrix[1],
                self.matrix[1] * other.matrix[0] + self.matrix[3] * other.matrix[1],
                self.matrix[0] * other.matrix[2] + self.matrix[2] * other.matrix[3],
                self.matrix[1] * other.matrix[2] + self.matrix[3] * other.matrix[3],
            ],
            translation: [
                self.matrix[0] * other.translation[0]
                    + self.matrix[2] * other.translation[1]
                    + self.translation[0],
                self.matrix[1] * other.translation[0]
                    + self.matrix[3] * other.translation[1]
                    + self.translation[1],
            ],
        }
    }
}

/// Transforms a flat `[x, y, x, y, ..]` position array into `dst`.
///
/// `dst` is cleared first; its capacity is reused across calls.
pub fn transform_positions(transform: &Transform, src: &[f32], dst: &mut Vec<f32>) {
    debug_assert!(src.len() % 2 == 0);
    dst.clear();
    dst.reserve(src.len());
    for p in src.chunks_exact(2) {
        let q = transform.apply([p[0], p[1]]);
        dst.push(q[0]);
        dst.push(q[1]);
    }
}
