// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing context.
//!
//! A [`Context`] owns all per-frame state: the path and stroker
//! collaborators, the state stack, the paint registries, the batch
//! assembler, long-lived images and command lists. A frame is the strict
//! sequence `begin → drawing calls → end → frame`; `end` produces the
//! [`Recording`] an external engine executes.

use peniko::color::palette;
use peniko::Color;

use crate::batch::{Batcher, ClipState, DrawCommandType, UvSource, INVALID_CLIP_CMD};
use crate::command_list::CommandList;
use crate::flags::{
    ClipRule, FillFlags, PathType, StrokeFlags, TextAlign, TextAlignHor, TransformOrder,
};
use crate::font::{FontSystem, NullFontSystem, TextConfig, TextQuad, TEXT_FLAGS_BUILD_BITMAPS};
use crate::handle::{
    CommandListHandle, FontHandle, GradientHandle, HandleAlloc, ImageHandle, ImagePatternHandle,
};
use crate::math::{self, Transform};
use crate::paint::PaintRegistry;
use crate::path::Path;
use crate::recording::{Command, Recording};
use crate::shape_cache::CacheStack;
use crate::state::State;
use crate::stroker::{Mesh, Stroker};
use crate::{Error, Winding};

/// Image filtering / addressing flags.
pub mod image_flags {
    /// Nearest-neighbor minification/magnification.
    pub const FILTER_NEAREST: u32 = 1 << 0;
    /// Bilinear filtering; the default for the font atlas.
    pub const FILTER_BILINEAR: u32 = 0;
    pub const CLAMP_U: u32 = 1 << 1;
    pub const CLAMP_V: u32 = 1 << 2;
}

/// Context creation options.
#[derive(Copy, Clone, Debug)]
pub struct ContextConfig {
    pub max_gradients: u16,
    pub max_image_patterns: u16,
    pub max_fonts: u16,
    pub max_state_stack_size: u32,
    pub max_images: u16,
    pub max_command_lists: u16,
    /// Capacity of one vertex buffer; at most 65536 since indices are u16.
    pub max_vb_vertices: u32,
    pub font_atlas_image_flags: u32,
    pub max_command_list_depth: u32,
    /// Bracket command-list playback with push/pop state and a clip reset.
    pub preserve_command_list_state: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_gradients: 64,
            max_image_patterns: 64,
            max_fonts: 8,
            max_state_stack_size: 32,
            max_images: 16,
            max_command_lists: 256,
            max_vb_vertices: 65536,
            font_atlas_image_flags: image_flags::FILTER_BILINEAR,
            max_command_list_depth: 16,
            preserve_command_list_state: true,
        }
    }
}

/// Frame and memory counters.
#[derive(Copy, Clone, Debug, Default)]
pub struct Stats {
    /// Draw commands submitted by the last `end`.
    pub draw_commands: u32,
    /// Clip commands recorded by the last `end`.
    pub clip_commands: u32,
    /// Vertex buffers used by the last `end`.
    pub vertex_buffers: u32,
    pub cmd_list_memory_used: u32,
    pub cmd_list_memory_total: u32,
}

#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Image {
    pub width: u16,
    pub height: u16,
    pub flags: u32,
}

/// The renderer context. See the crate docs for the drawing model.
pub struct Context {
    pub(crate) config: ContextConfig,
    stats: Stats,

    pub(crate) view_id: u16,
    pub(crate) canvas_width: u16,
    pub(crate) canvas_height: u16,
    pub(crate) device_pixel_ratio: f32,
    tess_tolerance: f32,
    fringe_width: f32,

    path: Path,
    stroker: Stroker,
    path_transformed: bool,
    pub(crate) transformed_vertices: Vec<f32>,
    text_vertices: Vec<f32>,

    pub(crate) batcher: Batcher,
    state_stack: Vec<State>,
    pub(crate) paints: PaintRegistry,

    font_system: Box<dyn FontSystem>,
    font_atlas_image: ImageHandle,

    pub(crate) images: Vec<Image>,
    image_alloc: HandleAlloc,

    pub(crate) cmd_lists: Vec<Option<CommandList>>,
    cmd_list_alloc: HandleAlloc,
    pub(crate) submit_depth: u32,
    pub(crate) cache_stack: CacheStack,

    /// Image create/update commands accumulated outside frames; drained
    /// ahead of the frame's own commands at `end`.
    resources: Recording,
}

static_assertions::assert_impl_all!(Context: Send);

impl Context {
    /// Creates a context without text support (the [`NullFontSystem`]).
    pub fn new(config: ContextConfig) -> Result<Self, Error> {
        Self::with_font_system(config, Box::new(NullFontSystem))
    }

    pub fn with_font_system(
        config: ContextConfig,
        font_system: Box<dyn FontSystem>,
    ) -> Result<Self, Error> {
        if config.max_vb_vertices > 65536 {
            return Err(Error::VertexBufferTooLarge(config.max_vb_vertices));
        }
        if config.max_vb_vertices < 3 {
            return Err(Error::InvalidConfig("max_vb_vertices"));
        }
        if config.max_state_stack_size == 0 {
            return Err(Error::InvalidConfig("max_state_stack_size"));
        }
        if config.max_images == 0 {
            return Err(Error::InvalidConfig("max_images"));
        }

        let mut ctx = Self {
            config,
            stats: Stats::default(),
            view_id: 0,
            canvas_width: 0,
            canvas_height: 0,
            device_pixel_ratio: 1.0,
            tess_tolerance: 0.25,
            fringe_width: 1.0,
            path: Path::new(),
            stroker: Stroker::new(),
            path_transformed: false,
            transformed_vertices: Vec::new(),
            text_vertices: Vec::new(),
            batcher: Batcher::new(config.max_vb_vertices),
            state_stack: vec![State::new()],
            paints: PaintRegistry::new(config.max_gradients, config.max_image_patterns),
            font_system,
            font_atlas_image: ImageHandle::INVALID,
            images: Vec::new(),
            image_alloc: HandleAlloc::new(config.max_images),
            cmd_lists: Vec::new(),
            cmd_list_alloc: HandleAlloc::new(config.max_command_lists),
            submit_depth: 0,
            cache_stack: CacheStack::default(),
            resources: Recording::new(),
        };

        let (atlas_w, atlas_h) = ctx.font_system.atlas_size();
        ctx.font_atlas_image =
            ctx.create_image(atlas_w, atlas_h, config.font_atlas_image_flags, None);

        Ok(ctx)
    }

    // ------------------------------------------------------------------
    // Frame lifecycle
    // ------------------------------------------------------------------

    pub fn begin(
        &mut self,
        view: u16,
        canvas_width: u16,
        canvas_height: u16,
        device_pixel_ratio: f32,
    ) {
        self.view_id = view;
        self.canvas_width = canvas_width;
        self.canvas_height = canvas_height;
        self.device_pixel_ratio = device_pixel_ratio;
        self.tess_tolerance = 0.25 / device_pixel_ratio;
        self.fringe_width = 1.0 / device_pixel_ratio;
        self.submit_depth = 0;
        self.cache_stack.clear();

        debug_assert_eq!(
            self.state_stack.len(),
            1,
            "state stack wasn't balanced in the previous frame"
        );
        self.state_stack.truncate(1);
        self.reset_scissor();
        self.transform_identity();

        self.batcher.white_uv = self.font_system.white_pixel_uv();
        self.batcher.begin_frame();
        self.paints.reset();
    }

    /// Retires the frame's CPU vertex buffers; call after the engine has
    /// consumed the `end` recording of every view rendered this frame.
    pub fn frame(&mut self) {
        self.batcher.vertex_buffers.clear();
        self.batcher.first_vertex_buffer = 0;
        self.batcher.next_index_buffer_id = 0;
        self.font_system.end_frame();
    }

    pub fn stats(&self) -> Stats {
        let mut stats = self.stats;
        stats.cmd_list_memory_used = 0;
        stats.cmd_list_memory_total = 0;
        for cl in self.cmd_lists.iter().flatten() {
            stats.cmd_list_memory_used += cl.memory_used();
            stats.cmd_list_memory_total += cl.memory_reserved();
        }
        stats
    }

    pub(crate) fn set_frame_stats(&mut self, draw: u32, clip: u32, buffers: u32) {
        self.stats.draw_commands = draw;
        self.stats.clip_commands = clip;
        self.stats.vertex_buffers = buffers;
    }

    // ------------------------------------------------------------------
    // State stack
    // ------------------------------------------------------------------

    pub(crate) fn state(&self) -> &State {
        self.state_stack.last().expect("state stack is never empty")
    }

    fn state_mut(&mut self) -> &mut State {
        self.state_stack
            .last_mut()
            .expect("state stack is never empty")
    }

    pub fn push_state(&mut self) {
        if self.state_stack.len() >= self.config.max_state_stack_size as usize {
            debug_assert!(false, "state stack overflow");
            return;
        }
        let top = *self.state();
        self.state_stack.push(top);
    }

    pub fn pop_state(&mut self) {
        if self.state_stack.len() <= 1 {
            debug_assert!(false, "state stack underflow");
            return;
        }
        self.state_stack.pop();

        // If the restored scissor differs from the last draw command's, the
        // next mesh has to start a fresh batch.
        if let Some(last) = self.batcher.draw_commands.last() {
            let scissor = self.state().scissor_as_u16();
            if last.scissor != scissor {
                self.batcher.force_new_draw_command = true;
                self.batcher.force_new_clip_command = true;
            }
        }
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state_mut().global_alpha = alpha;
    }

    /// Current transform as `[a, b, c, d, e, f]`.
    pub fn transform(&self) -> [f32; 6] {
        let t = &self.state().transform;
        [
            t.matrix[0],
            t.matrix[1],
            t.matrix[2],
            t.matrix[3],
            t.translation[0],
            t.translation[1],
        ]
    }

    /// Current scissor as `(x, y, w, h)` in canvas space.
    pub fn scissor(&self) -> [f32; 4] {
        self.state().scissor
    }

    pub fn reset_scissor(&mut self) {
        let w = self.canvas_width as f32;
        let h = self.canvas_height as f32;
        let state = self.state_mut();
        state.scissor = [0.0, 0.0, w, h];
        self.batcher.force_new_draw_command = true;
        self.batcher.force_new_clip_command = true;
    }

    /// Sets the scissor to `(x, y, w, h)` transformed by the current matrix
    /// and clipped to the canvas.
    pub fn set_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let canvas_w = self.canvas_width as f32;
        let canvas_h = self.canvas_height as f32;
        let state = self.state_mut();
        let pos = state.transform.apply([x, y]);
        let size = state.transform.apply_vec([w, h]);

        let min_x = pos[0].clamp(0.0, canvas_w);
        let min_y = pos[1].clamp(0.0, canvas_h);
        let max_x = (pos[0] + size[0]).clamp(0.0, canvas_w);
        let max_y = (pos[1] + size[1]).clamp(0.0, canvas_h);

        state.scissor = [min_x, min_y, max_x - min_x, max_y - min_y];
        self.batcher.force_new_draw_command = true;
        self.batcher.force_new_clip_command = true;
    }

    /// Intersects the current scissor with the transformed rect. Returns
    /// `false` if the result is empty (less than a pixel in either axis).
    pub fn intersect_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) -> bool {
        let state = self.state_mut();
        let pos = state.transform.apply([x, y]);
        let size = state.transform.apply_vec([w, h]);
        let rect = state.scissor;

        let min_x = pos[0].max(rect[0]);
        let min_y = pos[1].max(rect[1]);
        let max_x = (pos[0] + size[0]).min(rect[0] + rect[2]);
        let max_y = (pos[1] + size[1]).min(rect[1] + rect[3]);

        let new_w = (max_x - min_x).max(0.0);
        let new_h = (max_y - min_y).max(0.0);
        state.scissor = [min_x, min_y, new_w, new_h];

        self.batcher.force_new_draw_command = true;
        self.batcher.force_new_clip_command = true;

        new_w >= 1.0 && new_h >= 1.0
    }

    pub fn transform_identity(&mut self) {
        let state = self.state_mut();
        state.transform = Transform::IDENTITY;
        state.update_scales();
    }

    pub fn transform_scale(&mut self, x: f32, y: f32) {
        let state = self.state_mut();
        state.transform = state.transform * Transform::scale(x, y);
        state.update_scales();
    }

    pub fn transform_translate(&mut self, x: f32, y: f32) {
        let state = self.state_mut();
        state.transform = state.transform * Transform::translation(x, y);
        state.update_scales();
    }

    pub fn transform_rotate(&mut self, angle: f32) {
        let state = self.state_mut();
        state.transform = state.transform * Transform::rotation(angle);
        state.update_scales();
    }

    pub fn transform_mult(&mut self, matrix: [f32; 6], order: TransformOrder) {
        let m = Transform::from_coeffs(matrix);
        let state = self.state_mut();
        state.transform = match order {
            TransformOrder::Post => state.transform * m,
            TransformOrder::Pre => m * state.transform,
        };
        state.update_scales();
    }

    /// Maps the `(x, y, w, h)` box onto the full canvas.
    pub fn set_view_box(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let scale_x = self.canvas_width as f32 / w;
        let scale_y = self.canvas_height as f32 / h;
        let state = self.state_mut();
        state.transform =
            state.transform * Transform::scale(scale_x, scale_y) * Transform::translation(-x, -y);
        state.update_scales();
    }

    // ------------------------------------------------------------------
    // Path construction
    // ------------------------------------------------------------------

    pub fn begin_path(&mut self) {
        let avg_scale = self.state().avg_scale;
        self.path.reset(avg_scale, self.tess_tolerance);
        self.stroker
            .reset(avg_scale, self.tess_tolerance, self.fringe_width);
        self.path_transformed = false;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.move_to(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.line_to(x, y);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    pub fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.quadratic_to(cx, cy, x, y);
    }

    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.arc(cx, cy, r, a0, a1, dir);
    }

    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, r: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.arc_to(x1, y1, x2, y2, r);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.rect(x, y, w, h);
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.rounded_rect(x, y, w, h, r);
    }

    #[allow(clippy::too_many_arguments)]
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
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path
            .rounded_rect_varying(x, y, w, h, top_left, top_right, bottom_right, bottom_left);
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.circle(cx, cy, radius);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.ellipse(cx, cy, rx, ry);
    }

    pub fn polyline(&mut self, coords: &[f32]) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.polyline(coords);
    }

    pub fn close_path(&mut self) {
        debug_assert!(!self.path_transformed, "begin_path before adding geometry");
        self.path.close();
    }

    /// Transforms the current path by the state matrix, once per
    /// `begin_path` cycle; fills and strokes sharing a path reuse it.
    fn ensure_path_transformed(&mut self) {
        if self.path_transformed {
            return;
        }
        let transform = self.state().transform;
        math::transform_positions(&transform, self.path.vertices(), &mut self.transformed_vertices);
        self.path_transformed = true;
    }

    // ------------------------------------------------------------------
    // Fills
    // ------------------------------------------------------------------

    pub fn fill_path(&mut self, color: Color, flags: FillFlags) {
        let record_clip = self.batcher.record_clip_commands;
        let has_cache = self.cache_stack.is_recording();
        let state = *self.state();

        let global_alpha = if has_cache { 1.0 } else { state.global_alpha };
        let color = if record_clip {
            palette::css::BLACK
        } else {
            apply_alpha(color, global_alpha)
        };
        if !has_cache && quantized_alpha(color) == 0 {
            return;
        }

        let aa = !record_clip && flags.antialias();
        let packed = pack_color(color);
        self.fill_path_inner(&state, flags, aa, packed, FillPaint::Color);
    }

    pub fn fill_path_gradient(&mut self, gradient: GradientHandle, flags: FillFlags) {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "only color fills are valid inside begin_clip/end_clip"
        );
        if self.batcher.record_clip_commands {
            return;
        }
        if !gradient.is_valid() || gradient.is_local() {
            debug_assert!(false, "invalid gradient handle");
            log::error!("fill_path_gradient: invalid gradient handle");
            return;
        }
        let state = *self.state();
        let packed = pack_color(palette::css::BLACK);
        self.fill_path_inner(&state, flags, flags.antialias(), packed, FillPaint::Gradient(gradient));
    }

    pub fn fill_path_image_pattern(
        &mut self,
        pattern: ImagePatternHandle,
        color: Color,
        flags: FillFlags,
    ) {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "only color fills are valid inside begin_clip/end_clip"
        );
        if self.batcher.record_clip_commands {
            return;
        }
        if !pattern.is_valid() || pattern.is_local() {
            debug_assert!(false, "invalid image pattern handle");
            log::error!("fill_path_image_pattern: invalid pattern handle");
            return;
        }
        let has_cache = self.cache_stack.is_recording();
        let state = *self.state();
        let global_alpha = if has_cache { 1.0 } else { state.global_alpha };
        let color = apply_alpha(color, global_alpha);
        if !has_cache && quantized_alpha(color) == 0 {
            return;
        }
        let packed = pack_color(color);
        self.fill_path_inner(
            &state,
            flags,
            flags.antialias(),
            packed,
            FillPaint::ImagePattern(pattern),
        );
    }

    fn fill_path_inner(
        &mut self,
        state: &State,
        flags: FillFlags,
        aa: bool,
        packed_color: u32,
        paint: FillPaint,
    ) {
        let record_clip = self.batcher.record_clip_commands;
        let has_cache = self.cache_stack.is_recording();
        self.ensure_path_transformed();
        let scissor = state.scissor_as_u16();

        if has_cache {
            self.cache_stack.begin_command(&state.transform);
        }

        match flags.path_type() {
            PathType::Convex => {
                let num_sub_paths = self.path.sub_paths().len();
                for i in 0..num_sub_paths {
                    let sp = self.path.sub_paths()[i];
                    if sp.num_vertices < 3 {
                        continue;
                    }
                    let range = (sp.first_vertex as usize * 2)
                        ..((sp.first_vertex + sp.num_vertices) as usize * 2);
                    let mesh = if aa {
                        self.stroker
                            .convex_fill_aa(&self.transformed_vertices[range], packed_color)
                    } else {
                        self.stroker.convex_fill(&self.transformed_vertices[range])
                    };
                    self.submit_fill_mesh(&mesh, packed_color, paint, scissor, record_clip, has_cache);
                }
            }
            PathType::Concave => {
                self.stroker.concave_fill_begin();
                let num_sub_paths = self.path.sub_paths().len();
                for i in 0..num_sub_paths {
                    let sp = self.path.sub_paths()[i];
                    if sp.num_vertices < 3 {
                        if has_cache {
                            self.cache_stack.end_command();
                        }
                        return;
                    }
                    let range = (sp.first_vertex as usize * 2)
                        ..((sp.first_vertex + sp.num_vertices) as usize * 2);
                    self.stroker
                        .concave_fill_add_contour(&self.transformed_vertices[range]);
                }
                let mesh = if aa {
                    self.stroker
                        .concave_fill_end_aa(packed_color, flags.fill_rule())
                } else {
                    self.stroker.concave_fill_end(flags.fill_rule())
                };
                match mesh {
                    Some(mesh) => {
                        self.submit_fill_mesh(
                            &mesh,
                            packed_color,
                            paint,
                            scissor,
                            record_clip,
                            has_cache,
                        );
                    }
                    None => log::warn!("failed to triangulate concave polygon"),
                }
            }
        }

        if has_cache {
            self.cache_stack.end_command();
        }
    }

    fn submit_fill_mesh(
        &mut self,
        mesh: &Mesh,
        packed_color: u32,
        paint: FillPaint,
        scissor: [u16; 4],
        record_clip: bool,
        has_cache: bool,
    ) {
        let broadcast = [packed_color];
        let colors: &[u32] = match &mesh.colors {
            Some(colors) => colors,
            None => &broadcast,
        };
        if has_cache {
            self.cache_stack
                .add_mesh(&mesh.positions, colors, &mesh.indices);
        }
        if record_clip {
            self.batcher.emit_clip(scissor, &mesh.positions, &mesh.indices);
            return;
        }
        match paint {
            FillPaint::Color => self.batcher.emit_draw(
                DrawCommandType::Textured,
                self.font_atlas_image.id,
                scissor,
                &mesh.positions,
                UvSource::White,
                colors,
                &mesh.indices,
            ),
            FillPaint::Gradient(handle) => self.batcher.emit_draw(
                DrawCommandType::ColorGradient,
                handle.id,
                scissor,
                &mesh.positions,
                UvSource::White,
                colors,
                &mesh.indices,
            ),
            FillPaint::ImagePattern(handle) => self.batcher.emit_draw(
                DrawCommandType::ImagePattern,
                handle.id,
                scissor,
                &mesh.positions,
                UvSource::White,
                colors,
                &mesh.indices,
            ),
        }
    }

    // ------------------------------------------------------------------
    // Strokes
    // ------------------------------------------------------------------

    pub fn stroke_path(&mut self, color: Color, width: f32, flags: StrokeFlags) {
        let record_clip = self.batcher.record_clip_commands;
        let has_cache = self.cache_stack.is_recording();
        let state = *self.state();
        let global_alpha = if has_cache { 1.0 } else { state.global_alpha };
        let fringe = self.fringe_width;

        let scaled_width = if flags.is_fixed_width() {
            width
        } else {
            (width * state.avg_scale).clamp(0.0, 200.0)
        };
        let is_thin = scaled_width <= fringe;

        // Sub-pixel strokes keep their width at the fringe and fade out
        // with the square of the coverage ratio instead.
        let alpha_scale = if !is_thin {
            global_alpha
        } else {
            global_alpha * (scaled_width / fringe).clamp(0.0, 1.0).powi(2)
        };
        let color = if record_clip {
            palette::css::BLACK
        } else {
            apply_alpha(color, alpha_scale)
        };
        if !has_cache && quantized_alpha(color) == 0 {
            return;
        }

        let aa = !record_clip && flags.antialias();
        let stroke_width = if is_thin { fringe } else { scaled_width };
        let packed = pack_color(color);
        self.stroke_path_inner(&state, flags, aa, is_thin, stroke_width, packed, FillPaint::Color);
    }

    pub fn stroke_path_gradient(&mut self, gradient: GradientHandle, width: f32, flags: StrokeFlags) {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "only color strokes are valid inside begin_clip/end_clip"
        );
        if self.batcher.record_clip_commands {
            return;
        }
        if !gradient.is_valid() || gradient.is_local() {
            debug_assert!(false, "invalid gradient handle");
            log::error!("stroke_path_gradient: invalid gradient handle");
            return;
        }
        let state = *self.state();
        let fringe = self.fringe_width;
        let scaled_width = if flags.is_fixed_width() {
            width
        } else {
            (width * state.avg_scale).clamp(0.0, 200.0)
        };
        let is_thin = scaled_width <= fringe;
        let stroke_width = if is_thin { fringe } else { scaled_width };
        let packed = pack_color(palette::css::BLACK);
        self.stroke_path_inner(
            &state,
            flags,
            flags.antialias(),
            is_thin,
            stroke_width,
            packed,
            FillPaint::Gradient(gradient),
        );
    }

    pub fn stroke_path_image_pattern(
        &mut self,
        pattern: ImagePatternHandle,
        color: Color,
        width: f32,
        flags: StrokeFlags,
    ) {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "only color strokes are valid inside begin_clip/end_clip"
        );
        if self.batcher.record_clip_commands {
            return;
        }
        if !pattern.is_valid() || pattern.is_local() {
            debug_assert!(false, "invalid image pattern handle");
            log::error!("stroke_path_image_pattern: invalid pattern handle");
            return;
        }
        let has_cache = self.cache_stack.is_recording();
        let state = *self.state();
        let global_alpha = if has_cache { 1.0 } else { state.global_alpha };
        let fringe = self.fringe_width;

        let scaled_width = if flags.is_fixed_width() {
            width
        } else {
            (width * state.avg_scale).clamp(0.0, 200.0)
        };
        let is_thin = scaled_width <= fringe;

        // NOTE: the thin/thick alpha modulation is intentionally inverted
        // relative to `stroke_path`; this mirrors long-standing behavior
        // that callers may depend on.
        let alpha_scale = if is_thin {
            global_alpha
        } else {
            global_alpha * (scaled_width / fringe).clamp(0.0, 1.0).powi(2)
        };
        let color = apply_alpha(color, alpha_scale);
        if !has_cache && quantized_alpha(color) == 0 {
            return;
        }

        let stroke_width = if is_thin { fringe } else { scaled_width };
        let packed = pack_color(color);
        self.stroke_path_inner(
            &state,
            flags,
            flags.antialias(),
            is_thin,
            stroke_width,
            packed,
            FillPaint::ImagePattern(pattern),
        );
    }

    fn stroke_path_inner(
        &mut self,
        state: &State,
        flags: StrokeFlags,
        aa: bool,
        is_thin: bool,
        stroke_width: f32,
        packed_color: u32,
        paint: FillPaint,
    ) {
        let record_clip = self.batcher.record_clip_commands;
        let has_cache = self.cache_stack.is_recording();
        self.ensure_path_transformed();
        let scissor = state.scissor_as_u16();
        let cap = flags.line_cap();
        let join = flags.line_join();

        if has_cache {
            self.cache_stack.begin_command(&state.transform);
        }

        let num_sub_paths = self.path.sub_paths().len();
        for i in 0..num_sub_paths {
            let sp = self.path.sub_paths()[i];
            if sp.num_vertices < 2 {
                continue;
            }
            let range =
                (sp.first_vertex as usize * 2)..((sp.first_vertex + sp.num_vertices) as usize * 2);
            let mesh = if aa {
                if is_thin {
                    self.stroker.polyline_stroke_aa_thin(
                        &self.transformed_vertices[range],
                        sp.closed,
                        packed_color,
                        cap,
                        join,
                    )
                } else {
                    self.stroker.polyline_stroke_aa(
                        &self.transformed_vertices[range],
                        sp.closed,
                        packed_color,
                        stroke_width,
                        cap,
                        join,
                    )
                }
            } else {
                self.stroker.polyline_stroke(
                    &self.transformed_vertices[range],
                    sp.closed,
                    stroke_width,
                    cap,
                    join,
                )
            };
            self.submit_fill_mesh(&mesh, packed_color, paint, scissor, record_clip, has_cache);
        }

        if has_cache {
            self.cache_stack.end_command();
        }
    }

    // ------------------------------------------------------------------
    // Clip recording
    // ------------------------------------------------------------------

    pub fn begin_clip(&mut self, rule: ClipRule) {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "begin_clip inside an open begin_clip/end_clip block"
        );
        let next_clip_cmd = self.batcher.clip_commands.len() as u32;
        self.batcher.clip_state = ClipState {
            rule,
            first_cmd_id: next_clip_cmd,
            num_cmds: 0,
        };
        self.batcher.record_clip_commands = true;
        self.batcher.force_new_clip_command = true;
    }

    pub fn end_clip(&mut self) {
        debug_assert!(
            self.batcher.record_clip_commands,
            "end_clip without begin_clip"
        );
        let next_clip_cmd = self.batcher.clip_commands.len() as u32;
        let clip = &mut self.batcher.clip_state;
        clip.num_cmds = next_clip_cmd - clip.first_cmd_id;
        self.batcher.record_clip_commands = false;
        self.batcher.force_new_draw_command = true;
    }

    pub fn reset_clip(&mut self) {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "reset_clip inside a begin_clip/end_clip block"
        );
        let clip = &mut self.batcher.clip_state;
        if clip.first_cmd_id != INVALID_CLIP_CMD {
            clip.first_cmd_id = INVALID_CLIP_CMD;
            clip.num_cmds = 0;
            self.batcher.force_new_draw_command = true;
        }
    }

    // ------------------------------------------------------------------
    // Paints
    // ------------------------------------------------------------------

    pub fn create_linear_gradient(
        &mut self,
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        let transform = self.state().transform;
        self.paints
            .create_linear_gradient(&transform, sx, sy, ex, ey, inner_color, outer_color)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_box_gradient(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        feather: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        let transform = self.state().transform;
        self.paints
            .create_box_gradient(&transform, x, y, w, h, radius, feather, inner_color, outer_color)
    }

    pub fn create_radial_gradient(
        &mut self,
        cx: f32,
        cy: f32,
        inner_radius: f32,
        outer_radius: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        let transform = self.state().transform;
        self.paints.create_radial_gradient(
            &transform,
            cx,
            cy,
            inner_radius,
            outer_radius,
            inner_color,
            outer_color,
        )
    }

    pub fn create_image_pattern(
        &mut self,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        angle: f32,
        image: ImageHandle,
    ) -> ImagePatternHandle {
        let transform = self.state().transform;
        self.paints
            .create_image_pattern(&transform, cx, cy, w, h, angle, image)
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    pub fn create_image(
        &mut self,
        width: u16,
        height: u16,
        flags: u32,
        data: Option<&[u8]>,
    ) -> ImageHandle {
        if width == 0 || height == 0 {
            debug_assert!(false, "zero-sized image");
            return ImageHandle::INVALID;
        }
        let Some(id) = self.image_alloc.alloc() else {
            return ImageHandle::INVALID;
        };
        if self.images.len() <= id as usize {
            self.images.resize_with(id as usize + 1, Image::default);
        }
        self.images[id as usize] = Image {
            width,
            height,
            flags,
        };
        let handle = ImageHandle::new(id);
        self.resources.push(Command::CreateImage {
            image: handle,
            width,
            height,
            flags,
        });
        if let Some(data) = data {
            debug_assert_eq!(data.len(), width as usize * height as usize * 4);
            self.resources.push(Command::UpdateImage {
                image: handle,
                rect: [0, 0, width, height],
                data: data.to_vec(),
            });
        }
        handle
    }

    pub fn update_image(&mut self, image: ImageHandle, x: u16, y: u16, w: u16, h: u16, data: &[u8]) -> bool {
        if !self.is_image_valid(image) {
            return false;
        }
        debug_assert_eq!(data.len(), w as usize * h as usize * 4);
        self.resources.push(Command::UpdateImage {
            image,
            rect: [x, y, w, h],
            data: data.to_vec(),
        });
        true
    }

    pub fn destroy_image(&mut self, image: ImageHandle) -> bool {
        if !self.is_image_valid(image) {
            return false;
        }
        self.resources.push(Command::DestroyImage { image });
        self.images[image.id as usize] = Image::default();
        self.image_alloc.free(image.id);
        true
    }

    pub fn image_size(&self, image: ImageHandle) -> Option<(u16, u16)> {
        if !self.is_image_valid(image) {
            return None;
        }
        let img = &self.images[image.id as usize];
        Some((img.width, img.height))
    }

    pub fn is_image_valid(&self, image: ImageHandle) -> bool {
        image.is_valid() && self.image_alloc.is_valid(image.id)
    }

    pub fn font_atlas_image(&self) -> ImageHandle {
        self.font_atlas_image
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    pub fn create_font(&mut self, name: &str, data: Vec<u8>) -> FontHandle {
        self.font_system.add_font(name, data)
    }

    pub fn find_font(&self, name: &str) -> FontHandle {
        self.font_system.find_font(name)
    }

    pub fn set_fallback_font(&mut self, base: FontHandle, fallback: FontHandle) -> bool {
        debug_assert!(base.is_valid() && fallback.is_valid(), "invalid font handle");
        self.font_system.add_fallback_font(base, fallback)
    }

    pub fn text(&mut self, cfg: &TextConfig, x: f32, y: f32, text: &str) {
        let state = *self.state();
        let scale = state.font_scale * self.device_pixel_ratio;

        let color = apply_alpha(cfg.color, state.global_alpha);
        if quantized_alpha(color) == 0 {
            return;
        }

        let scaled_cfg = TextConfig {
            size: cfg.size * scale,
            color,
            blur: cfg.blur * scale,
            spacing: cfg.spacing * scale,
            ..*cfg
        };

        let Some(mesh) = self
            .font_system
            .text(&scaled_cfg, text, TEXT_FLAGS_BUILD_BITMAPS)
        else {
            return;
        };

        self.push_state();
        self.transform_translate(x + mesh.alignment[0] / scale, y + mesh.alignment[1] / scale);
        let atlas = self.font_atlas_image;
        self.render_text_quads(&mesh.quads, color, atlas);
        self.pop_state();
    }

    pub fn text_box(
        &mut self,
        cfg: &TextConfig,
        x: f32,
        y: f32,
        break_width: f32,
        text: &str,
        break_flags: u32,
    ) {
        let line_height = self.font_system.line_height(cfg);
        let halign = cfg.alignment.horizontal();
        let row_cfg = TextConfig {
            alignment: TextAlign::new(TextAlignHor::Left, cfg.alignment.vertical()),
            ..*cfg
        };

        let mut rest = text;
        let mut y = y;
        loop {
            let rows =
                self.font_system
                    .break_lines(&row_cfg, rest, break_width, 4, break_flags);
            if rows.is_empty() {
                break;
            }
            for row in &rows {
                let line = &rest[row.start..row.end];
                let dx = match halign {
                    TextAlignHor::Left => 0.0,
                    TextAlignHor::Center => (break_width - row.width) * 0.5,
                    TextAlignHor::Right => break_width - row.width,
                };
                self.text(&row_cfg, x + dx, y, line);
                y += line_height;
            }
            let next = rows.last().map(|r| r.next).unwrap_or(rest.len());
            if next >= rest.len() {
                break;
            }
            rest = &rest[next..];
        }
    }

    /// Returns the advance width; fills `bounds` with `(min_x, min_y,
    /// max_x, max_y)` when provided.
    pub fn measure_text(
        &mut self,
        cfg: &TextConfig,
        x: f32,
        y: f32,
        text: &str,
        bounds: Option<&mut [f32; 4]>,
    ) -> f32 {
        match self.font_system.text(cfg, text, 0) {
            None => {
                if let Some(bounds) = bounds {
                    *bounds = [0.0; 4];
                }
                0.0
            }
            Some(mesh) => {
                if let Some(bounds) = bounds {
                    let (min_y, max_y) = self.font_system.line_bounds(cfg, 0.0);
                    bounds[0] = x + mesh.bounds[0];
                    bounds[1] = y + min_y;
                    bounds[2] = x + mesh.bounds[2];
                    bounds[3] = y + max_y;
                }
                mesh.width
            }
        }
    }

    pub fn text_line_height(&mut self, cfg: &TextConfig) -> f32 {
        self.font_system.line_height(cfg)
    }

    pub fn text_break_lines(
        &mut self,
        cfg: &TextConfig,
        text: &str,
        break_width: f32,
        max_rows: usize,
        flags: u32,
    ) -> Vec<crate::font::TextRow> {
        self.font_system
            .break_lines(cfg, text, break_width, max_rows, flags)
    }

    /// Batches pre-shaped glyph quads. Quad positions are in font-scaled
    /// space; the draw transform has the font scale divided back out so the
    /// atlas bitmaps map 1:1 to pixels.
    fn render_text_quads(&mut self, quads: &[TextQuad], color: Color, image: ImageHandle) {
        if quads.is_empty() {
            return;
        }
        let state = *self.state();
        let scale = state.font_scale * self.device_pixel_ratio;
        let inv_scale = 1.0 / scale;

        let transform = Transform {
            matrix: state.transform.matrix.map(|m| m * inv_scale),
            translation: state.transform.translation,
        };

        self.text_vertices.clear();
        self.text_vertices.reserve(quads.len() * 8);
        let mut uvs = Vec::with_capacity(quads.len() * 8);
        let mut indices: Vec<u16> = Vec::with_capacity(quads.len() * 6);
        for (i, q) in quads.iter().enumerate() {
            let corners = [
                [q.pos[0], q.pos[1]],
                [q.pos[2], q.pos[1]],
                [q.pos[2], q.pos[3]],
                [q.pos[0], q.pos[3]],
            ];
            for c in corners {
                let p = transform.apply(c);
                self.text_vertices.push(p[0]);
                self.text_vertices.push(p[1]);
            }
            uvs.extend_from_slice(&[
                q.uv[0], q.uv[1], q.uv[2], q.uv[1], q.uv[2], q.uv[3], q.uv[0], q.uv[3],
            ]);
            let base = (i * 4) as u16;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let packed = pack_color(color);
        let scissor = state.scissor_as_u16();
        self.batcher.emit_draw(
            DrawCommandType::Textured,
            image.id,
            scissor,
            &self.text_vertices,
            UvSource::Slice(&uvs),
            &[packed],
            &indices,
        );
    }

    // ------------------------------------------------------------------
    // Raw triangle lists
    // ------------------------------------------------------------------

    /// Submits a caller-built triangle list, transformed by the current
    /// matrix. With no `image` the font atlas (and its white pixel, when
    /// `uvs` is `None`) is used.
    pub fn indexed_tri_list(
        &mut self,
        positions: &[f32],
        uvs: Option<&[f32]>,
        colors: &[Color],
        indices: &[u16],
        image: ImageHandle,
    ) {
        let image = if image.is_valid() {
            image
        } else {
            self.font_atlas_image
        };
        let state = *self.state();
        let transform = state.transform;
        math::transform_positions(&transform, positions, &mut self.text_vertices);

        let packed: Vec<u32> = colors.iter().map(|c| pack_color(*c)).collect();
        let scissor = state.scissor_as_u16();
        let uv_source = match uvs {
            Some(uvs) => UvSource::Slice(uvs),
            None => UvSource::White,
        };
        self.batcher.emit_draw(
            DrawCommandType::Textured,
            image.id,
            scissor,
            &self.text_vertices,
            uv_source,
            &packed,
            indices,
        );
    }

    // ------------------------------------------------------------------
    // Command lists
    // ------------------------------------------------------------------

    pub fn create_command_list(&mut self, flags: crate::flags::CommandListFlags) -> CommandListHandle {
        let Some(id) = self.cmd_list_alloc.alloc() else {
            return CommandListHandle::INVALID;
        };
        if self.cmd_lists.len() <= id as usize {
            self.cmd_lists.resize_with(id as usize + 1, || None);
        }
        self.cmd_lists[id as usize] = Some(CommandList::new(flags));
        CommandListHandle::new(id)
    }

    pub fn destroy_command_list(&mut self, handle: CommandListHandle) {
        if !self.is_command_list_valid(handle) {
            debug_assert!(false, "invalid command list handle");
            return;
        }
        self.cmd_lists[handle.id as usize] = None;
        self.cmd_list_alloc.free(handle.id);
    }

    /// Clears a list's bytecode, string heap, local paint counters and
    /// shape cache without releasing the handle.
    pub fn reset_command_list(&mut self, handle: CommandListHandle) {
        if !self.is_command_list_valid(handle) {
            debug_assert!(false, "invalid command list handle");
            return;
        }
        if let Some(cl) = self.cmd_lists[handle.id as usize].as_mut() {
            cl.reset();
        }
    }

    pub fn is_command_list_valid(&self, handle: CommandListHandle) -> bool {
        handle.is_valid()
            && self.cmd_list_alloc.is_valid(handle.id)
            && self
                .cmd_lists
                .get(handle.id as usize)
                .map(|slot| slot.is_some())
                .unwrap_or(false)
    }

    pub(crate) fn drain_resources(&mut self) -> Recording {
        std::mem::take(&mut self.resources)
    }

    pub(crate) fn flush_font_atlas(&mut self) -> Option<crate::font::AtlasUpdate> {
        self.font_system.flush_atlas()
    }
}

/// Paint dispatch for fill/stroke submission.
#[derive(Copy, Clone)]
pub(crate) enum FillPaint {
    Color,
    Gradient(GradientHandle),
    ImagePattern(ImagePatternHandle),
}

/// Packs a color as premultiplied RGBA8 with alpha in the low byte.
pub(crate) fn pack_color(color: Color) -> u32 {
    color.premultiply().to_rgba8().to_u32()
}

pub(crate) fn apply_alpha(color: Color, alpha: f32) -> Color {
    if alpha >= 1.0 {
        color
    } else {
        color.multiply_alpha(alpha.max(0.0))
    }
}

/// Alpha quantized to 8 bits the way it lands in the vertex stream.
pub(crate) fn quantized_alpha(color: Color) -> u8 {
    (color.components[3].clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        let mut config = ContextConfig {
            max_vb_vertices: 1 << 17,
            ..ContextConfig::default()
        };
        assert!(matches!(
            Context::new(config),
            Err(Error::VertexBufferTooLarge(_))
        ));
        config.max_vb_vertices = 0;
        assert!(matches!(Context::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn pack_color_premultiplies_with_alpha_low() {
        let half_black = Color::from_rgba8(0, 0, 0, 0x80);
        assert_eq!(pack_color(half_black), 0x0000_0080);
        let opaque_white = Color::from_rgba8(255, 255, 255, 255);
        assert_eq!(pack_color(opaque_white), 0xFFFF_FFFF);
    }

    #[test]
    fn push_pop_restores_state() {
        let mut ctx = Context::new(ContextConfig::default()).unwrap();
        ctx.begin(0, 100, 100, 1.0);
        let before_transform = ctx.transform();
        let before_scissor = ctx.scissor();
        ctx.push_state();
        ctx.transform_rotate(1.0);
        ctx.transform_translate(5.0, 6.0);
        ctx.set_scissor(10.0, 10.0, 20.0, 20.0);
        ctx.pop_state();
        assert_eq!(ctx.transform(), before_transform);
        assert_eq!(ctx.scissor(), before_scissor);
    }

    #[test]
    fn intersect_scissor_reports_empty() {
        let mut ctx = Context::new(ContextConfig::default()).unwrap();
        ctx.begin(0, 100, 100, 1.0);
        assert!(ctx.intersect_scissor(0.0, 0.0, 50.0, 50.0));
        assert!(!ctx.intersect_scissor(60.0, 60.0, 10.0, 10.0));
        let scissor = ctx.scissor();
        assert_eq!(scissor[2], 0.0);
    }

    #[test]
    fn reset_then_intersect_full_canvas_is_reset() {
        let mut ctx = Context::new(ContextConfig::default()).unwrap();
        ctx.begin(0, 100, 100, 1.0);
        ctx.reset_scissor();
        let reset_scissor = ctx.scissor();
        assert!(ctx.intersect_scissor(0.0, 0.0, 100.0, 100.0));
        assert_eq!(ctx.scissor(), reset_scissor);
    }

    #[test]
    fn gradient_ids_restart_each_frame() {
        let red = peniko::color::palette::css::RED;
        let blue = peniko::color::palette::css::BLUE;
        let mut ctx = Context::new(ContextConfig::default()).unwrap();
        ctx.begin(0, 100, 100, 1.0);
        let g0 = ctx.create_linear_gradient(0.0, 0.0, 10.0, 0.0, red, blue);
        assert_eq!(g0.id, 0);
        let _ = ctx.end();
        ctx.frame();
        ctx.begin(0, 100, 100, 1.0);
        let g1 = ctx.create_linear_gradient(0.0, 0.0, 10.0, 0.0, red, blue);
        assert_eq!(g1.id, 0);
    }
}
