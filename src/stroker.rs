// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Polygon tessellation and polyline stroking.
//!
//! The stroker turns flattened sub-paths into triangle meshes the batch
//! assembler consumes. Antialiased variants carry a per-vertex color array
//! with a one-pixel fringe fading to transparent; non-AA variants return no
//! colors and callers broadcast a single color instead.

use crate::flags::{FillRule, LineCap, LineJoin};

/// Transparent premultiplied black, used for fringe edges.
const TRANSPARENT: u32 = 0;

/// Triangle mesh produced by the stroker.
///
/// Positions are `x,y` pairs; indices are local (`0..num_vertices`).
#[derive(Default)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub colors: Option<Vec<u32>>,
    pub indices: Vec<u16>,
}

impl Mesh {
    pub fn num_vertices(&self) -> u32 {
        (self.positions.len() / 2) as u32
    }

    pub fn num_indices(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Mesh producer for fills and strokes.
pub struct Stroker {
    fringe: f32,
    tolerance: f32,
    contours: Vec<Vec<f32>>,
}

impl Default for Stroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Stroker {
    pub fn new() -> Self {
        Self {
            fringe: 1.0,
            tolerance: 0.25,
            contours: Vec::new(),
        }
    }

    pub fn reset(&mut self, _avg_scale: f32, tess_tolerance: f32, fringe: f32) {
        self.fringe = fringe;
        self.tolerance = tess_tolerance;
        self.contours.clear();
    }

    /// Fan-tessellates a convex polygon.
    pub fn convex_fill(&mut self, pts: &[f32]) -> Mesh {
        let n = pts.len() / 2;
        debug_assert!(n >= 3);
        let mut mesh = Mesh {
            positions: pts.to_vec(),
            ..Mesh::default()
        };
        fan_indices(&mut mesh.indices, 0, n as u16);
        mesh
    }

    /// Fan-tessellates a convex polygon with an antialiasing fringe.
    ///
    /// The polygon edge is moved half a fringe inwards and a transparent
    /// ring is added half a fringe outwards, approximating pixel coverage.
    pub fn convex_fill_aa(&mut self, pts: &[f32], color: u32) -> Mesh {
        let n = pts.len() / 2;
        debug_assert!(n >= 3);
        let half = self.fringe * 0.5;
        let normals = vertex_normals(pts, true);

        let mut mesh = Mesh::default();
        let mut colors = Vec::with_capacity(n * 2);
        mesh.positions.reserve(n * 4);
        // Inner ring.
        for i in 0..n {
            mesh.positions.push(pts[i * 2] - normals[i][0] * half);
            mesh.positions.push(pts[i * 2 + 1] - normals[i][1] * half);
            colors.push(color);
        }
        // Outer ring.
        for i in 0..n {
            mesh.positions.push(pts[i * 2] + normals[i][0] * half);
            mesh.positions.push(pts[i * 2 + 1] + normals[i][1] * half);
            colors.push(TRANSPARENT);
        }
        fan_indices(&mut mesh.indices, 0, n as u16);
        ring_indices(&mut mesh.indices, 0, n as u16, n as u16);
        mesh.colors = Some(colors);
        mesh
    }

    pub fn concave_fill_begin(&mut self) {
        self.contours.clear();
    }

    pub fn concave_fill_add_contour(&mut self, pts: &[f32]) {
        self.contours.push(pts.to_vec());
    }

    /// Tessellates the accumulated contours. Returns `None` when the
    /// polygon cannot be decomposed.
    pub fn concave_fill_end(&mut self, fill_rule: FillRule) -> Option<Mesh> {
        let _ = fill_rule;
        let contours = std::mem::take(&mut self.contours);
        let mut mesh = Mesh::default();
        for contour in &contours {
            let base = (mesh.positions.len() / 2) as u16;
            let indices = ear_clip(contour)?;
            mesh.positions.extend_from_slice(contour);
            mesh.indices.extend(indices.iter().map(|i| i + base));
        }
        Some(mesh)
    }

    /// Antialiased variant of [`concave_fill_end`](Self::concave_fill_end);
    /// emits a per-vertex color array.
    pub fn concave_fill_end_aa(&mut self, color: u32, fill_rule: FillRule) -> Option<Mesh> {
        let mut mesh = self.concave_fill_end(fill_rule)?;
        mesh.colors = Some(vec![color; mesh.positions.len() / 2]);
        Some(mesh)
    }

    /// Strokes a polyline with the given width, producing a solid quad strip
    /// with caps and joins.
    pub fn polyline_stroke(
        &mut self,
        pts: &[f32],
        closed: bool,
        width: f32,
        cap: LineCap,
        join: LineJoin,
    ) -> Mesh {
        self.stroke_rows(pts, closed, width, cap, join, None)
    }

    /// Antialiased stroke: a solid core plus transparent fringe rows.
    pub fn polyline_stroke_aa(
        &mut self,
        pts: &[f32],
        closed: bool,
        color: u32,
        width: f32,
        cap: LineCap,
        join: LineJoin,
    ) -> Mesh {
        self.stroke_rows(pts, closed, width, cap, join, Some(color))
    }

    /// Antialiased stroke of a sub-pixel line: a single full-alpha center row
    /// with transparent edges at fringe distance.
    ///
    /// Joins collapse below one pixel, so the averaged normal covers them
    /// for every join style; caps are honored at the fringe radius.
    pub fn polyline_stroke_aa_thin(
        &mut self,
        pts: &[f32],
        closed: bool,
        color: u32,
        cap: LineCap,
        join: LineJoin,
    ) -> Mesh {
        let _ = join;
        let n = pts.len() / 2;
        debug_assert!(n >= 2);
        let normals = segment_normals(pts, closed);
        let fringe = self.fringe;

        // Square caps extend the open ends by the fringe radius.
        let mut ext_first = [0.0f32; 2];
        let mut ext_last = [0.0f32; 2];
        if !closed && cap == LineCap::Square {
            let d0 = edge_dir(pts, 0);
            let d1 = edge_dir(pts, n - 2);
            ext_first = [-d0[0] * fringe, -d0[1] * fringe];
            ext_last = [d1[0] * fringe, d1[1] * fringe];
        }

        let mut mesh = Mesh::default();
        let mut colors = Vec::with_capacity(n * 3);
        for i in 0..n {
            let nrm = normals[i];
            let mut p = [pts[i * 2], pts[i * 2 + 1]];
            if i == 0 {
                p = [p[0] + ext_first[0], p[1] + ext_first[1]];
            } else if i == n - 1 {
                p = [p[0] + ext_last[0], p[1] + ext_last[1]];
            }
            mesh.positions
                .extend_from_slice(&[p[0] - nrm[0] * fringe, p[1] - nrm[1] * fringe]);
            mesh.positions.extend_from_slice(&[p[0], p[1]]);
            mesh.positions
                .extend_from_slice(&[p[0] + nrm[0] * fringe, p[1] + nrm[1] * fringe]);
            colors.extend_from_slice(&[TRANSPARENT, color, TRANSPARENT]);
        }
        strip_indices(&mut mesh.indices, n, 3, closed);

        // Round caps fade from the center to a transparent rim.
        if !closed && cap == LineCap::Round {
            let segs = cap_segments(fringe.max(0.01), self.tolerance);
            let d0 = edge_dir(pts, 0);
            let d1 = edge_dir(pts, n - 2);
            append_round_cap(
                &mut mesh,
                &mut colors,
                Some((color, TRANSPARENT)),
                [pts[0], pts[1]],
                normals[0],
                [-d0[0], -d0[1]],
                fringe,
                segs,
            );
            append_round_cap(
                &mut mesh,
                &mut colors,
                Some((color, TRANSPARENT)),
                [pts[(n - 1) * 2], pts[(n - 1) * 2 + 1]],
                normals[n - 1],
                d1,
                fringe,
                segs,
            );
        }

        mesh.colors = Some(colors);
        mesh
    }

    /// Shared stroke body: one vertex-row station per point for miter
    /// joins, two stations per corner for bevels (and for miters past the
    /// limit), so the strip spans the corner with a bevel face. Round joins
    /// are drawn as bevels.
    fn stroke_rows(
        &mut self,
        pts: &[f32],
        closed: bool,
        width: f32,
        cap: LineCap,
        join: LineJoin,
        aa_color: Option<u32>,
    ) -> Mesh {
        let n = pts.len() / 2;
        debug_assert!(n >= 2);
        let hw = width * 0.5;
        let fringe = self.fringe;
        let stations = join_stations(pts, closed, join);
        let last = stations.len() - 1;

        // Square caps extend the open ends by half a width.
        let mut ext_first = [0.0f32; 2];
        let mut ext_last = [0.0f32; 2];
        if !closed && cap == LineCap::Square {
            let d0 = edge_dir(pts, 0);
            let d1 = edge_dir(pts, n - 2);
            ext_first = [-d0[0] * hw, -d0[1] * hw];
            ext_last = [d1[0] * hw, d1[1] * hw];
        }

        let rows: usize = if aa_color.is_some() { 4 } else { 2 };
        let cap_radius = if aa_color.is_some() {
            hw + fringe * 0.5
        } else {
            hw
        };
        let mut mesh = Mesh::default();
        let mut colors = Vec::new();
        for (i, station) in stations.iter().enumerate() {
            let nrm = station.normal;
            let mut p = station.pos;
            if i == 0 {
                p = [p[0] + ext_first[0], p[1] + ext_first[1]];
            } else if i == last {
                p = [p[0] + ext_last[0], p[1] + ext_last[1]];
            }
            if let Some(color) = aa_color {
                let core = (hw - fringe * 0.5).max(0.0);
                let outer = hw + fringe * 0.5;
                mesh.positions
                    .extend_from_slice(&[p[0] - nrm[0] * outer, p[1] - nrm[1] * outer]);
                mesh.positions
                    .extend_from_slice(&[p[0] - nrm[0] * core, p[1] - nrm[1] * core]);
                mesh.positions
                    .extend_from_slice(&[p[0] + nrm[0] * core, p[1] + nrm[1] * core]);
                mesh.positions
                    .extend_from_slice(&[p[0] + nrm[0] * outer, p[1] + nrm[1] * outer]);
                colors.extend_from_slice(&[TRANSPARENT, color, color, TRANSPARENT]);
            } else {
                mesh.positions
                    .extend_from_slice(&[p[0] - nrm[0] * hw, p[1] - nrm[1] * hw]);
                mesh.positions
                    .extend_from_slice(&[p[0] + nrm[0] * hw, p[1] + nrm[1] * hw]);
            }
        }
        strip_indices(&mut mesh.indices, stations.len(), rows, closed);

        if !closed && cap == LineCap::Round {
            let segs = cap_segments(cap_radius.max(0.01), self.tolerance);
            let d0 = edge_dir(pts, 0);
            let d1 = edge_dir(pts, n - 2);
            let cap_colors = aa_color.map(|c| (c, c));
            append_round_cap(
                &mut mesh,
                &mut colors,
                cap_colors,
                [pts[0], pts[1]],
                stations[0].normal,
                [-d0[0], -d0[1]],
                cap_radius,
                segs,
            );
            append_round_cap(
                &mut mesh,
                &mut colors,
                cap_colors,
                [pts[(n - 1) * 2], pts[(n - 1) * 2 + 1]],
                stations[last].normal,
                d1,
                cap_radius,
                segs,
            );
        }

        if aa_color.is_some() {
            mesh.colors = Some(colors);
        }
        mesh
    }
}

/// A miter sticks out by `1/cos(θ/2)` of the half width; corners past this
/// factor get beveled regardless of the requested join.
const MITER_LIMIT: f32 = 4.0;

/// One vertex-row anchor of a stroke strip.
#[derive(Copy, Clone)]
struct RowStation {
    pos: [f32; 2],
    normal: [f32; 2],
}

/// Expands a polyline into row stations: endpoints and miter joins yield
/// one station, beveled corners two (one per adjacent edge normal).
fn join_stations(pts: &[f32], closed: bool, join: LineJoin) -> Vec<RowStation> {
    let n = pts.len() / 2;
    let edge_normal = |i: usize| -> [f32; 2] {
        let j = (i + 1) % n;
        let dx = pts[j * 2] - pts[i * 2];
        let dy = pts[j * 2 + 1] - pts[i * 2 + 1];
        let len = (dx * dx + dy * dy).sqrt().max(1e-6);
        [dy / len, -dx / len]
    };
    let mut stations = Vec::with_capacity(n + 4);
    for i in 0..n {
        let pos = [pts[i * 2], pts[i * 2 + 1]];
        let prev = if i > 0 {
            Some(edge_normal(i - 1))
        } else if closed {
            Some(edge_normal(n - 1))
        } else {
            None
        };
        let next = if i + 1 < n {
            Some(edge_normal(i))
        } else if closed {
            Some(edge_normal(n - 1))
        } else {
            None
        };
        match (prev, next) {
            (Some(n0), Some(n1)) => {
                let mx = (n0[0] + n1[0]) * 0.5;
                let my = (n0[1] + n1[1]) * 0.5;
                // |m| = cos(θ/2), so the miter factor is 1/|m|.
                let len2 = mx * mx + my * my;
                let miter_ok =
                    join == LineJoin::Miter && len2 * MITER_LIMIT * MITER_LIMIT >= 1.0;
                if miter_ok {
                    let d2 = len2.max(0.25);
                    stations.push(RowStation {
                        pos,
                        normal: [mx / d2, my / d2],
                    });
                } else {
                    stations.push(RowStation { pos, normal: n0 });
                    stations.push(RowStation { pos, normal: n1 });
                }
            }
            (None, Some(normal)) | (Some(normal), None) => {
                stations.push(RowStation { pos, normal });
            }
            (None, None) => stations.push(RowStation {
                pos,
                normal: [0.0, 0.0],
            }),
        }
    }
    stations
}

/// Number of segments needed to keep a semicircular cap of radius `r`
/// within `tolerance` of the true arc.
fn cap_segments(r: f32, tolerance: f32) -> usize {
    let da = (r / (r + tolerance)).clamp(-1.0, 1.0).acos() * 2.0;
    if da <= 0.0 {
        return 2;
    }
    ((std::f32::consts::PI / da).ceil() as usize).clamp(2, 32)
}

/// Fans a semicircle around `center`, sweeping from `normal` through `dir`
/// to `-normal`. `colors`, when present, is a `(center, rim)` pair so AA
/// variants can fade the rim out.
#[allow(clippy::too_many_arguments)]
fn append_round_cap(
    mesh: &mut Mesh,
    colors: &mut Vec<u32>,
    color: Option<(u32, u32)>,
    center: [f32; 2],
    normal: [f32; 2],
    dir: [f32; 2],
    r: f32,
    segs: usize,
) {
    let base = (mesh.positions.len() / 2) as u16;
    mesh.positions.extend_from_slice(&center);
    for k in 0..=segs {
        let t = k as f32 / segs as f32 * std::f32::consts::PI;
        let (s, c) = t.sin_cos();
        let v = [normal[0] * c + dir[0] * s, normal[1] * c + dir[1] * s];
        mesh.positions.push(center[0] + v[0] * r);
        mesh.positions.push(center[1] + v[1] * r);
    }
    if let Some((center_color, rim_color)) = color {
        colors.push(center_color);
        colors.extend(std::iter::repeat(rim_color).take(segs + 1));
    }
    for k in 0..segs as u16 {
        mesh.indices
            .extend_from_slice(&[base, base + 1 + k, base + 2 + k]);
    }
}

/// Triangle fan over `count` vertices starting at `base`.
fn fan_indices(indices: &mut Vec<u16>, base: u16, count: u16) {
    for i in 1..count.saturating_sub(1) {
        indices.extend_from_slice(&[base, base + i, base + i + 1]);
    }
}

/// Quad ring between an inner vertex loop at `inner` and an outer loop at
/// `outer`, both of length `count`.
fn ring_indices(indices: &mut Vec<u16>, inner: u16, outer: u16, count: u16) {
    for i in 0..count {
        let j = (i + 1) % count;
        indices.extend_from_slice(&[inner + i, outer + i, outer + j]);
        indices.extend_from_slice(&[inner + i, outer + j, inner + j]);
    }
}

/// Triangles between `rows` parallel vertex rows laid out per station.
fn strip_indices(indices: &mut Vec<u16>, points: usize, rows: usize, closed: bool) {
    let segs = if closed { points } else { points - 1 };
    for s in 0..segs {
        let a = (s * rows) as u16;
        let b = (((s + 1) % points) * rows) as u16;
        for r in 0..(rows - 1) as u16 {
            indices.extend_from_slice(&[a + r, b + r, b + r + 1]);
            indices.extend_from_slice(&[a + r, b + r + 1, a + r + 1]);
        }
    }
}

fn edge_dir(pts: &[f32], i: usize) -> [f32; 2] {
    let dx = pts[i * 2 + 2] - pts[i * 2];
    let dy = pts[i * 2 + 3] - pts[i * 2 + 1];
    let len = (dx * dx + dy * dy).sqrt().max(1e-6);
    [dx / len, dy / len]
}

/// Per-vertex normals averaged over adjacent edges, scaled to keep joint
/// thickness (clamped miter).
///
/// Edge `k` runs from point `k` to point `(k + 1) % n`; for closed loops
/// the wrapping edge `n - 1` joins the endpoints.
fn segment_normals(pts: &[f32], closed: bool) -> Vec<[f32; 2]> {
    let n = pts.len() / 2;
    let edge_normal = |i: usize| -> [f32; 2] {
        let j = (i + 1) % n;
        let dx = pts[j * 2] - pts[i * 2];
        let dy = pts[j * 2 + 1] - pts[i * 2 + 1];
        let len = (dx * dx + dy * dy).sqrt().max(1e-6);
        [dy / len, -dx / len]
    };
    let mut normals = Vec::with_capacity(n);
    for i in 0..n {
        let prev = if i > 0 {
            Some(edge_normal(i - 1))
        } else if closed {
            Some(edge_normal(n - 1))
        } else {
            None
        };
        let next = if i + 1 < n {
            Some(edge_normal(i))
        } else if closed {
            Some(edge_normal(n - 1))
        } else {
            None
        };
        let nrm = match (prev, next) {
            (Some(prev), Some(next)) => {
                let mx = (prev[0] + next[0]) * 0.5;
                let my = (prev[1] + next[1]) * 0.5;
                let d2 = (mx * mx + my * my).max(0.25);
                [mx / d2, my / d2]
            }
            (None, Some(next)) => next,
            (Some(prev), None) => prev,
            (None, None) => [0.0, 0.0],
        };
        normals.push(nrm);
    }
    normals
}

/// Like [`segment_normals`] for a closed loop, unit length.
fn vertex_normals(pts: &[f32], closed: bool) -> Vec<[f32; 2]> {
    let mut normals = segment_normals(pts, closed);
    for n in &mut normals {
        let len = (n[0] * n[0] + n[1] * n[1]).sqrt().max(1e-6);
        n[0] /= len;
        n[1] /= len;
    }
    normals
}

/// Ear-clipping triangulation of a simple polygon.
fn ear_clip(pts: &[f32]) -> Option<Vec<u16>> {
    let n = pts.len() / 2;
    if n < 3 {
        return Some(Vec::new());
    }
    let point = |i: usize| [pts[i * 2], pts[i * 2 + 1]];

    // Normalize winding so ears are always convex corners.
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        let p = point(i);
        let q = point(j);
        area += (p[0] as f64) * (q[1] as f64) - (q[0] as f64) * (p[1] as f64);
    }
    let mut order: Vec<u16> = (0..n as u16).collect();
    if area < 0.0 {
        order.reverse();
    }

    let mut indices = Vec::with_capacity((n - 2) * 3);
    let mut guard = 0usize;
    while order.len() > 3 {
        let m = order.len();
        let mut clipped = false;
        for i in 0..m {
            let a = order[(i + m - 1) % m] as usize;
            let b = order[i] as usize;
            let c = order[(i + 1) % m] as usize;
            let pa = point(a);
            let pb = point(b);
            let pc = point(c);
            let cross = (pb[0] - pa[0]) * (pc[1] - pa[1]) - (pc[0] - pa[0]) * (pb[1] - pa[1]);
            if cross <= 0.0 {
                continue;
            }
            let mut contains = false;
            for &other in &order {
                let o = other as usize;
                if o == a || o == b || o == c {
                    continue;
                }
                if point_in_triangle(point(o), pa, pb, pc) {
                    contains = true;
                    break;
                }
            }
            if contains {
                continue;
            }
            indices.extend_from_slice(&[a as u16, b as u16, c as u16]);
            order.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            return None;
        }
        guard += 1;
        if guard > n * n {
            return None;
        }
    }
    indices.extend_from_slice(&[order[0], order[1], order[2]]);
    Some(indices)
}

fn point_in_triangle(p: [f32; 2], a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> bool {
    let sign = |p1: [f32; 2], p2: [f32; 2], p3: [f32; 2]| {
        (p1[0] - p3[0]) * (p2[1] - p3[1]) - (p2[0] - p3[0]) * (p1[1] - p3[1])
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: [f32; 8] = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];

    #[test]
    fn convex_fill_quad() {
        let mut stroker = Stroker::new();
        let mesh = stroker.convex_fill(&QUAD);
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_indices(), 6);
        assert!(mesh.colors.is_none());
    }

    #[test]
    fn convex_fill_aa_carries_colors() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let mesh = stroker.convex_fill_aa(&QUAD, 0xFF00_00FF);
        assert_eq!(mesh.num_vertices(), 8);
        let colors = mesh.colors.as_ref().unwrap();
        assert_eq!(colors.len(), 8);
        assert_eq!(colors[0], 0xFF00_00FF);
        assert_eq!(colors[4], 0);
    }

    #[test]
    fn concave_fill_l_shape() {
        let mut stroker = Stroker::new();
        stroker.concave_fill_begin();
        stroker.concave_fill_add_contour(&[
            0.0, 0.0, 20.0, 0.0, 20.0, 10.0, 10.0, 10.0, 10.0, 20.0, 0.0, 20.0,
        ]);
        let mesh = stroker.concave_fill_end(FillRule::NonZero).unwrap();
        assert_eq!(mesh.num_vertices(), 6);
        // A simple hexagon decomposes into 4 triangles.
        assert_eq!(mesh.num_indices(), 12);
    }

    #[test]
    fn degenerate_concave_contour_fails() {
        let mut stroker = Stroker::new();
        stroker.concave_fill_begin();
        // Collinear points; every candidate ear is degenerate.
        stroker.concave_fill_add_contour(&[0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        assert!(stroker.concave_fill_end(FillRule::NonZero).is_none());
    }

    #[test]
    fn open_stroke_quad_strip() {
        let mut stroker = Stroker::new();
        let mesh = stroker.polyline_stroke(
            &[0.0, 0.0, 10.0, 0.0, 20.0, 5.0],
            false,
            2.0,
            LineCap::Butt,
            LineJoin::Miter,
        );
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(mesh.num_indices(), 12);
        assert!(mesh.colors.is_none());
    }

    #[test]
    fn aa_stroke_has_transparent_fringe() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let mesh = stroker.polyline_stroke_aa(
            &[0.0, 0.0, 10.0, 0.0],
            false,
            0x1234_5678,
            4.0,
            LineCap::Butt,
            LineJoin::Miter,
        );
        assert_eq!(mesh.num_vertices(), 8);
        let colors = mesh.colors.as_ref().unwrap();
        assert_eq!(colors[0], 0);
        assert_eq!(colors[1], 0x1234_5678);
    }

    #[test]
    fn closed_stroke_wraps_around() {
        let mut stroker = Stroker::new();
        let mesh = stroker.polyline_stroke(&QUAD, true, 2.0, LineCap::Butt, LineJoin::Miter);
        assert_eq!(mesh.num_vertices(), 8);
        // 4 segments, 2 triangles each.
        assert_eq!(mesh.num_indices(), 24);
    }

    #[test]
    fn bevel_join_adds_corner_stations() {
        let corner = [0.0, 0.0, 40.0, 0.0, 40.0, 40.0];
        let mut stroker = Stroker::new();
        let miter = stroker.polyline_stroke(&corner, false, 8.0, LineCap::Butt, LineJoin::Miter);
        let bevel = stroker.polyline_stroke(&corner, false, 8.0, LineCap::Butt, LineJoin::Bevel);
        let round = stroker.polyline_stroke(&corner, false, 8.0, LineCap::Butt, LineJoin::Round);
        assert_eq!(miter.num_vertices(), 6);
        // The corner point doubles into two stations.
        assert_eq!(bevel.num_vertices(), 8);
        assert_eq!(bevel.num_indices(), 18);
        // Round joins are drawn as bevels.
        assert_eq!(round.num_vertices(), bevel.num_vertices());
    }

    #[test]
    fn sharp_miter_falls_back_to_bevel() {
        // A near-hairpin corner would need a miter far past the limit.
        let hairpin = [0.0, 0.0, 40.0, 0.0, 0.0, 5.0];
        let mut stroker = Stroker::new();
        let mesh = stroker.polyline_stroke(&hairpin, false, 8.0, LineCap::Butt, LineJoin::Miter);
        assert_eq!(mesh.num_vertices(), 8);
    }

    #[test]
    fn thin_square_caps_extend_the_ends() {
        let line = [10.0, 0.0, 50.0, 0.0];
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let butt =
            stroker.polyline_stroke_aa_thin(&line, false, 1, LineCap::Butt, LineJoin::Miter);
        let square =
            stroker.polyline_stroke_aa_thin(&line, false, 1, LineCap::Square, LineJoin::Miter);
        assert_eq!(butt.num_vertices(), square.num_vertices());
        let min_x = |mesh: &Mesh| {
            mesh.positions
                .chunks_exact(2)
                .map(|p| p[0])
                .fold(f32::MAX, f32::min)
        };
        assert_eq!(min_x(&butt), 10.0);
        assert_eq!(min_x(&square), 9.0);
    }

    #[test]
    fn thin_round_caps_add_fading_fans() {
        let line = [10.0, 0.0, 50.0, 0.0];
        let color = 0xAB00_00AB;
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let butt =
            stroker.polyline_stroke_aa_thin(&line, false, color, LineCap::Butt, LineJoin::Miter);
        let round =
            stroker.polyline_stroke_aa_thin(&line, false, color, LineCap::Round, LineJoin::Miter);
        assert!(round.num_vertices() > butt.num_vertices());
        let colors = round.colors.as_ref().unwrap();
        assert_eq!(colors.len(), round.num_vertices() as usize);
        // Each cap is a fan: solid center, rim fading to transparent.
        assert_eq!(colors[6], color);
        assert_eq!(colors[7], TRANSPARENT);
    }
}
