// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path construction and curve flattening.
//!
//! A [`Path`] records sub-paths as flat polylines in canvas space. Curves
//! and shape primitives are flattened through kurbo at a tolerance scaled by
//! the average transform scale captured at `reset`, so higher zoom levels
//! produce more segments.

use peniko::kurbo::{
    self, Arc, Circle, Ellipse, PathEl, Point, Rect, RoundedRect, RoundedRectRadii, Shape, Vec2,
};

use crate::flags::Winding;

const DIST_EPSILON: f32 = 1e-4;

/// A contiguous vertex range inside a [`Path`].
#[derive(Copy, Clone, Debug)]
pub struct SubPath {
    pub first_vertex: u32,
    pub num_vertices: u32,
    pub closed: bool,
}

/// Flattened sub-path recorder.
pub struct Path {
    vertices: Vec<f32>,
    sub_paths: Vec<SubPath>,
    tolerance: f64,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            sub_paths: Vec::new(),
            tolerance: 0.25,
        }
    }

    /// Clears all recorded geometry and adjusts the flattening tolerance for
    /// the given transform scale.
    pub fn reset(&mut self, avg_scale: f32, tess_tolerance: f32) {
        self.vertices.clear();
        self.sub_paths.clear();
        self.tolerance = (tess_tolerance / avg_scale.max(1e-3)) as f64;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.start_sub_path();
        self.push_point(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        if self.sub_paths.is_empty() {
            self.start_sub_path();
        }
        self.push_point(x, y);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        let Some(p0) = self.last_point() else {
            self.move_to(x, y);
            return;
        };
        self.flatten_from(
            p0,
            PathEl::CurveTo(
                Point::new(c1x as f64, c1y as f64),
                Point::new(c2x as f64, c2y as f64),
                Point::new(x as f64, y as f64),
            ),
        );
    }

    pub fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let Some(p0) = self.last_point() else {
            self.move_to(x, y);
            return;
        };
        self.flatten_from(
            p0,
            PathEl::QuadTo(Point::new(cx as f64, cy as f64), Point::new(x as f64, y as f64)),
        );
    }

    /// Appends a circular arc around `(cx, cy)` from angle `a0` to `a1`.
    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        let sweep = sweep_angle(a0, a1, dir);
        let arc = Arc::new(
            Point::new(cx as f64, cy as f64),
            Vec2::new(r as f64, r as f64),
            a0 as f64,
            sweep,
            0.0,
        );
        let start = [
            cx + r * a0.cos(),
            cy + r * a0.sin(),
        ];
        if self.last_point().is_some() {
            self.push_point(start[0], start[1]);
        } else {
            self.move_to(start[0], start[1]);
        }
        let tol = self.tolerance;
        let mut pts = Vec::new();
        kurbo::flatten(arc.path_elements(tol), tol, |el| match el {
            PathEl::LineTo(p) => pts.push(p),
            _ => {}
        });
        for p in pts {
            self.push_point(p.x as f32, p.y as f32);
        }
    }

    /// Appends an arc of radius `r` tangent to the segments
    /// `(current, (x1, y1))` and `((x1, y1), (x2, y2))`.
    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, r: f32) {
        let Some(p0) = self.last_point() else {
            return;
        };
        // Degenerate cases collapse to a line.
        let d0 = dist(p0, [x1, y1]);
        let d1 = dist([x1, y1], [x2, y2]);
        if d0 < DIST_EPSILON || d1 < DIST_EPSILON || r < DIST_EPSILON {
            self.line_to(x1, y1);
            return;
        }
        let n0 = [(p0[0] - x1) / d0, (p0[1] - y1) / d0];
        let n1 = [(x2 - x1) / d1, (y2 - y1) / d1];
        let a = (n0[0] * n1[0] + n0[1] * n1[1]).clamp(-1.0, 1.0).acos();
        if a.abs() < DIST_EPSILON || (std::f32::consts::PI - a).abs() < DIST_EPSILON {
            self.line_to(x1, y1);
            return;
        }
        let d = r / (a * 0.5).tan();
        if d > 10000.0 {
            self.line_to(x1, y1);
            return;
        }
        // Arc center sits along the bisector, offset r from both segments.
        let cross = n1[0] * n0[1] - n1[1] * n0[0];
        let (cx, cy, a0, a1, dir);
        if cross > 0.0 {
            cx = x1 + n0[0] * d + n0[1] * r;
            cy = y1 + n0[1] * d - n0[0] * r;
            a0 = n0[0].atan2(-n0[1]);
            a1 = (-n1[0]).atan2(n1[1]);
            dir = Winding::Clockwise;
        } else {
            cx = x1 + n0[0] * d - n0[1] * r;
            cy = y1 + n0[1] * d + n0[0] * r;
            a0 = (-n0[0]).atan2(n0[1]);
            a1 = n1[0].atan2(-n1[1]);
            dir = Winding::CounterClockwise;
        }
        self.arc(cx, cy, r, a0, a1, dir);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.push_point(x, y + h);
        self.push_point(x + w, y + h);
        self.push_point(x + w, y);
        self.close();
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        self.rounded_rect_varying(x, y, w, h, r, r, r, r);
    }

    pub fn rounded_rect_varying(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        top_left: f32,
        top_right: f32,
        bottom_right: f32,
        bottom_left: f32,
    ) {
        if top_left < 0.1 && top_right < 0.1 && bottom_right < 0.1 && bottom_left < 0.1 {
            self.rect(x, y, w, h);
            return;
        }
        let shape = RoundedRect::from_rect(
            Rect::new(x as f64, y as f64, (x + w) as f64, (y + h) as f64),
            RoundedRectRadii::new(
                top_left as f64,
                top_right as f64,
                bottom_right as f64,
                bottom_left as f64,
            ),
        );
        self.append_shape(&shape);
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) {
        let shape = Circle::new(Point::new(cx as f64, cy as f64), radius as f64);
        self.append_shape(&shape);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        let shape = Ellipse::new(
            Point::new(cx as f64, cy as f64),
            Vec2::new(rx as f64, ry as f64),
            0.0,
        );
        self.append_shape(&shape);
    }

    /// Appends a pre-flattened point list to the current sub-path.
    pub fn polyline(&mut self, coords: &[f32]) {
        debug_assert!(coords.len() % 2 == 0, "polyline takes x,y pairs");
        if self.sub_paths.is_empty() {
            self.start_sub_path();
        }
        for p in coords.chunks_exact(2) {
            self.push_point(p[0], p[1]);
        }
    }

    pub fn close(&mut self) {
        if let Some(sp) = self.sub_paths.last_mut() {
            sp.closed = true;
        }
    }

    pub fn sub_paths(&self) -> &[SubPath] {
        &self.sub_paths
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> u32 {
        (self.vertices.len() / 2) as u32
    }

    fn start_sub_path(&mut self) {
        // Drop a trailing empty sub-path rather than stacking them.
        if let Some(sp) = self.sub_paths.last() {
            if sp.num_vertices == 0 {
                self.sub_paths.pop();
            }
        }
        self.sub_paths.push(SubPath {
            first_vertex: (self.vertices.len() / 2) as u32,
            num_vertices: 0,
            closed: false,
        });
    }

    fn push_point(&mut self, x: f32, y: f32) {
        let sp = self
            .sub_paths
            .last_mut()
            .expect("push_point requires an open sub-path");
        if sp.num_vertices > 0 {
            let n = self.vertices.len();
            let last = [self.vertices[n - 2], self.vertices[n - 1]];
            if dist(last, [x, y]) < DIST_EPSILON {
                return;
            }
        }
        self.vertices.push(x);
        self.vertices.push(y);
        sp.num_vertices += 1;
    }

    fn last_point(&self) -> Option<[f32; 2]> {
        let sp = self.sub_paths.last()?;
        if sp.num_vertices == 0 {
            return None;
        }
        let n = self.vertices.len();
        Some([self.vertices[n - 2], self.vertices[n - 1]])
    }

    fn flatten_from(&mut self, p0: [f32; 2], el: PathEl) {
        let tol = self.tolerance;
        let start = PathEl::MoveTo(Point::new(p0[0] as f64, p0[1] as f64));
        let mut pts = Vec::new();
        kurbo::flatten([start, el], tol, |out| {
            if let PathEl::LineTo(p) = out {
                pts.push(p);
            }
        });
        for p in pts {
            self.push_point(p.x as f32, p.y as f32);
        }
    }

    /// Flattens a closed kurbo shape into a fresh sub-path.
    fn append_shape(&mut self, shape: &impl Shape) {
        let tol = self.tolerance;
        self.start_sub_path();
        let mut pts = Vec::new();
        kurbo::flatten(shape.path_elements(tol), tol, |el| match el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => pts.push(p),
            _ => {}
        });
        for p in pts {
            self.push_point(p.x as f32, p.y as f32);
        }
        // Closed shapes repeat their start point; the close flag carries that.
        if let Some(sp) = self.sub_paths.last_mut() {
            if sp.num_vertices > 1 {
                let first = sp.first_vertex as usize * 2;
                let last = self.vertices.len() - 2;
                if dist(
                    [self.vertices[first], self.vertices[first + 1]],
                    [self.vertices[last], self.vertices[last + 1]],
                ) < DIST_EPSILON
                {
                    self.vertices.truncate(last);
                    sp.num_vertices -= 1;
                }
            }
        }
        self.close();
    }
}

fn dist(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

fn sweep_angle(a0: f32, a1: f32, dir: Winding) -> f64 {
    use std::f32::consts::TAU;
    let mut da = a1 - a0;
    match dir {
        Winding::CounterClockwise => {
            // Positive sweep.
            if da < 0.0 {
                da += TAU * (1.0 + (-da / TAU).floor());
            }
            if da > TAU {
                da %= TAU;
            }
        }
        Winding::Clockwise => {
            if da > 0.0 {
                da -= TAU * (1.0 + (da / TAU).floor());
            }
            if da < -TAU {
                da %= TAU;
            }
        }
    }
    da as f64
}
