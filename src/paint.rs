// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame gradient and image-pattern registries.
//!
//! Linear, box and radial gradients share one record: the shader evaluates a
//! rounded-box signed distance in paint space, so each constructor encodes
//! its semantic extents into `params = (extent_x, extent_y, radius, feather)`
//! and bakes the paint→local inverse matrix, pre-multiplied by the state
//! transform at creation time.

use peniko::Color;

use crate::handle::{GradientHandle, ImageHandle, ImagePatternHandle};
use crate::math::Transform;

/// Offset pushing a linear gradient's box far off-axis so only the axial
/// falloff remains visible.
const LINEAR_GRADIENT_EXTENT: f32 = 1e5;

#[derive(Copy, Clone, Debug)]
pub(crate) struct Gradient {
    /// Paint-space inverse matrix in 3×3 column-major form.
    pub matrix: [f32; 9],
    /// `(extent_x, extent_y, radius, feather)`.
    pub params: [f32; 4],
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct ImagePattern {
    /// Paint-space inverse matrix scaled by `1/(w, h)`, 3×3 column-major.
    pub matrix: [f32; 9],
    pub image: ImageHandle,
}

pub(crate) struct PaintRegistry {
    pub gradients: Vec<Gradient>,
    pub image_patterns: Vec<ImagePattern>,
    max_gradients: u16,
    max_image_patterns: u16,
}

impl PaintRegistry {
    pub fn new(max_gradients: u16, max_image_patterns: u16) -> Self {
        Self {
            gradients: Vec::with_capacity(max_gradients as usize),
            image_patterns: Vec::with_capacity(max_image_patterns as usize),
            max_gradients,
            max_image_patterns,
        }
    }

    pub fn reset(&mut self) {
        self.gradients.clear();
        self.image_patterns.clear();
    }

    pub fn next_gradient_id(&self) -> u16 {
        self.gradients.len() as u16
    }

    pub fn next_image_pattern_id(&self) -> u16 {
        self.image_patterns.len() as u16
    }

    pub fn gradient(&self, handle: GradientHandle) -> Option<&Gradient> {
        if !handle.is_valid() || handle.is_local() {
            return None;
        }
        self.gradients.get(handle.id as usize)
    }

    pub fn image_pattern(&self, handle: ImagePatternHandle) -> Option<&ImagePattern> {
        if !handle.is_valid() || handle.is_local() {
            return None;
        }
        self.image_patterns.get(handle.id as usize)
    }

    /// Linear gradient from `(sx, sy)` to `(ex, ey)`, encoded as a
    /// degenerate box of length `d` pushed a large distance off-axis.
    pub fn create_linear_gradient(
        &mut self,
        state_transform: &Transform,
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if self.gradients.len() >= self.max_gradients as usize {
            return GradientHandle::INVALID;
        }

        let mut dx = ex - sx;
        let mut dy = ey - sy;
        let d = (dx * dx + dy * dy).sqrt();
        if d > 1e-4 {
            dx /= d;
            dy /= d;
        } else {
            dx = 0.0;
            dy = 1.0;
        }

        let large = LINEAR_GRADIENT_EXTENT;
        let gradient_transform = Transform::from_coeffs([
            dy,
            -dx,
            dx,
            dy,
            sx - dx * large,
            sy - dy * large,
        ]);
        let matrix = (*state_transform * gradient_transform).inverse().to_mat3();

        let handle = GradientHandle::global(self.gradients.len() as u16);
        self.gradients.push(Gradient {
            matrix,
            params: [large, large + d * 0.5, 0.0, d.max(1.0)],
            inner_color: inner_color.components,
            outer_color: outer_color.components,
        });
        handle
    }

    /// Box gradient over `(x, y, w, h)` with corner radius `r` and feather `f`.
    pub fn create_box_gradient(
        &mut self,
        state_transform: &Transform,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        r: f32,
        f: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if self.gradients.len() >= self.max_gradients as usize {
            return GradientHandle::INVALID;
        }

        let gradient_transform = Transform::translation(x + w * 0.5, y + h * 0.5);
        let matrix = (*state_transform * gradient_transform).inverse().to_mat3();

        let handle = GradientHandle::global(self.gradients.len() as u16);
        self.gradients.push(Gradient {
            matrix,
            params: [w * 0.5, h * 0.5, r, f.max(1.0)],
            inner_color: inner_color.components,
            outer_color: outer_color.components,
        });
        handle
    }

    /// Radial gradient centered at `(cx, cy)`, fading from `inner_radius`
    /// to `outer_radius`.
    pub fn create_radial_gradient(
        &mut self,
        state_transform: &Transform,
        cx: f32,
        cy: f32,
        inner_radius: f32,
        outer_radius: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if self.gradients.len() >= self.max_gradients as usize {
            return GradientHandle::INVALID;
        }

        let gradient_transform = Transform::translation(cx, cy);
        let matrix = (*state_transform * gradient_transform).inverse().to_mat3();

        let r = (inner_radius + outer_radius) * 0.5;
        let f = outer_radius - inner_radius;

        let handle = GradientHandle::global(self.gradients.len() as u16);
        self.gradients.push(Gradient {
            matrix,
            params: [r, r, r, f.max(1.0)],
            inner_color: inner_color.components,
            outer_color: outer_color.components,
        });
        handle
    }

    /// Image pattern centered at `(cx, cy)` with extent `(w, h)`, rotated by
    /// `angle` radians.
    pub fn create_image_pattern(
        &mut self,
        state_transform: &Transform,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        angle: f32,
        image: ImageHandle,
    ) -> ImagePatternHandle {
        if !image.is_valid() {
            return ImagePatternHandle::INVALID;
        }
        if self.image_patterns.len() >= self.max_image_patterns as usize {
            return ImagePatternHandle::INVALID;
        }

        let (sn, cs) = angle.sin_cos();
        let pattern_transform = Transform::from_coeffs([cs, sn, -sn, cs, cx, cy]);
        let inverse = (*state_transform * pattern_transform).inverse();
        // Fold the image extent into the matrix so the shader lands directly
        // in UV space.
        let matrix = [
            inverse.matrix[0] / w,
            inverse.matrix[1] / h,
            0.0,
            inverse.matrix[2] / w,
            inverse.matrix[3] / h,
            0.0,
            inverse.translation[0] / w,
            inverse.translation[1] / h,
            1.0,
        ];

        let handle = ImagePatternHandle::global(self.image_patterns.len() as u16);
        self.image_patterns.push(ImagePattern { matrix, image });
        handle
    }
}
