// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-list playback.
//!
//! The interpreter walks a list's word stream sequentially and drives the
//! context's immediate-mode API. Paint handles flagged local are offset by
//! the frame's next-gradient/pattern ids captured when the submission
//! starts. With `AllowCommandCulling`, an empty scissor turns on a skip
//! mode that drops stroker commands until a scissor-restoring command
//! clears it. Nested submissions are bounded by the configured recursion
//! depth; exceeding it aborts that submission silently.

use peniko::Color;

use crate::command_list::{
    decode_color, decode_paint_handle, CmdTag, CommandList, TEXT_CONFIG_WORDS,
};
use crate::context::{pack_color, FillPaint};
use crate::flags::{ClipRule, FillFlags, StrokeFlags, TextAlign, TransformOrder, Winding};
use crate::font::TextConfig;
use crate::handle::{
    CommandListHandle, FontHandle, GradientHandle, ImageHandle, ImagePatternHandle,
    HANDLE_FLAG_LOCAL,
};
use crate::math;
use crate::shape_cache::{CachedMesh, ShapeCache};
use crate::Context;

/// Cursor over a command list's word stream.
struct WordReader<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> WordReader<'a> {
    fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 0 }
    }

    /// Returns the next `(tag, payload)` pair, or `None` at end of stream.
    fn next_command(&mut self) -> Option<(CmdTag, &'a [u32])> {
        if self.pos + 2 > self.words.len() {
            return None;
        }
        let tag = CmdTag(self.words[self.pos]);
        let len = self.words[self.pos + 1] as usize;
        let start = self.pos + 2;
        if start + len > self.words.len() {
            debug_assert!(false, "truncated command payload");
            return None;
        }
        self.pos = start + len;
        Some((tag, &self.words[start..start + len]))
    }
}

fn payload_f32(payload: &[u32], i: usize) -> f32 {
    f32::from_bits(payload[i])
}

fn payload_floats(payload: &[u32]) -> &[f32] {
    bytemuck::cast_slice(payload)
}

fn decode_text_config(payload: &[u32]) -> TextConfig {
    TextConfig {
        font: FontHandle::new(payload[0] as u16),
        size: payload_f32(payload, 1),
        alignment: TextAlign(payload[2]),
        color: decode_color(payload[3]),
        blur: payload_f32(payload, 4),
        spacing: payload_f32(payload, 5),
    }
}

fn remap_gradient(word: u32, first_gradient_id: u16) -> GradientHandle {
    let (id, flags) = decode_paint_handle(word);
    if flags & HANDLE_FLAG_LOCAL != 0 {
        GradientHandle {
            id: id + first_gradient_id,
            flags: 0,
        }
    } else {
        GradientHandle { id, flags: 0 }
    }
}

fn remap_pattern(word: u32, first_pattern_id: u16) -> ImagePatternHandle {
    let (id, flags) = decode_paint_handle(word);
    if flags & HANDLE_FLAG_LOCAL != 0 {
        ImagePatternHandle {
            id: id + first_pattern_id,
            flags: 0,
        }
    } else {
        ImagePatternHandle { id, flags: 0 }
    }
}

impl Context {
    /// Plays a recorded command list against the context.
    pub fn submit_command_list(&mut self, handle: CommandListHandle) {
        if !self.is_command_list_valid(handle) {
            debug_assert!(false, "invalid command list handle");
            return;
        }
        if self.submit_depth >= self.config.max_command_list_depth {
            log::warn!("submit_command_list recursion depth limit reached");
            return;
        }
        self.submit_depth += 1;

        // The list is taken out of its slot for the duration of playback;
        // a recursive submit of the same list sees a dead handle and is
        // dropped, which the depth limit would eventually enforce anyway.
        let mut cl = self.cmd_lists[handle.id as usize]
            .take()
            .expect("validated above");

        let mut cache = if cl.flags.cacheable() {
            Some(cl.cache.take().unwrap_or_default())
        } else {
            None
        };

        if let Some(cache_ref) = cache.as_mut() {
            let state_scale = self.state().avg_scale;
            if cache_ref.is_valid_for(state_scale) {
                self.play_cached(&cl, cache_ref);
                cl.cache = cache;
                self.cmd_lists[handle.id as usize] = Some(cl);
                self.submit_depth -= 1;
                return;
            }
            cache_ref.reset();
            cache_ref.avg_scale = state_scale;
        }

        // Never cull while building the cache; the cached stream must hold
        // every stroker command's meshes.
        let cull = cache.is_none() && cl.flags.allow_culling();

        let first_gradient_id = self.paints.next_gradient_id();
        let first_pattern_id = self.paints.next_image_pattern_id();
        debug_assert!(
            first_gradient_id as u32 + cl.num_gradients as u32 <= self.config.max_gradients as u32,
            "not enough free gradients for command list"
        );
        debug_assert!(
            first_pattern_id as u32 + cl.num_image_patterns as u32
                <= self.config.max_image_patterns as u32,
            "not enough free image patterns for command list"
        );

        self.cache_stack.push(cache.take());
        if self.config.preserve_command_list_state {
            self.push_state();
        }

        let mut skip_cmds = false;
        let mut reader = WordReader::new(cl.words());
        while let Some((tag, payload)) = reader.next_command() {
            if skip_cmds && tag.is_stroker_command() {
                continue;
            }
            match tag {
                CmdTag::BEGIN_PATH => self.begin_path(),
                CmdTag::CLOSE_PATH => self.close_path(),
                CmdTag::MOVE_TO => self.move_to(payload_f32(payload, 0), payload_f32(payload, 1)),
                CmdTag::LINE_TO => self.line_to(payload_f32(payload, 0), payload_f32(payload, 1)),
                CmdTag::CUBIC_TO => self.cubic_to(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                    payload_f32(payload, 4),
                    payload_f32(payload, 5),
                ),
                CmdTag::QUADRATIC_TO => self.quadratic_to(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                ),
                CmdTag::ARC => self.arc(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                    payload_f32(payload, 4),
                    Winding::from_bits(payload[5]),
                ),
                CmdTag::ARC_TO => self.arc_to(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                    payload_f32(payload, 4),
                ),
                CmdTag::RECT => self.rect(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                ),
                CmdTag::ROUNDED_RECT => self.rounded_rect(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                    payload_f32(payload, 4),
                ),
                CmdTag::ROUNDED_RECT_VARYING => {
                    let p = payload_floats(payload);
                    self.rounded_rect_varying(p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]);
                }
                CmdTag::CIRCLE => self.circle(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                ),
                CmdTag::ELLIPSE => self.ellipse(
                    payload_f32(payload, 0),
                    payload_f32(payload, 1),
                    payload_f32(payload, 2),
                    payload_f32(payload, 3),
                ),
                CmdTag::POLYLINE => {
                    let num_points = payload[0] as usize;
                    let coords = payload_floats(&payload[1..1 + num_points * 2]);
                    self.polyline(coords);
                }
                CmdTag::FILL_PATH_COLOR => {
                    let flags = FillFlags(payload[0]);
                    let color = decode_color(payload[1]);
                    self.fill_path(color, flags);
                }
                CmdTag::FILL_PATH_GRADIENT => {
                    let flags = FillFlags(payload[0]);
                    let gradient = remap_gradient(payload[1], first_gradient_id);
                    self.fill_path_gradient(gradient, flags);
                }
                CmdTag::FILL_PATH_IMAGE_PATTERN => {
                    let flags = FillFlags(payload[0]);
                    let color = decode_color(payload[1]);
                    let pattern = remap_pattern(payload[2], first_pattern_id);
                    self.fill_path_image_pattern(pattern, color, flags);
                }
                CmdTag::STROKE_PATH_COLOR => {
                    let width = payload_f32(payload, 0);
                    let flags = StrokeFlags(payload[1]);
                    let color = decode_color(payload[2]);
                    self.stroke_path(color, width, flags);
                }
                CmdTag::STROKE_PATH_GRADIENT => {
                    let width = payload_f32(payload, 0);
                    let flags = StrokeFlags(payload[1]);
                    let gradient = remap_gradient(payload[2], first_gradient_id);
                    self.stroke_path_gradient(gradient, width, flags);
                }
                CmdTag::STROKE_PATH_IMAGE_PATTERN => {
                    let width = payload_f32(payload, 0);
                    let flags = StrokeFlags(payload[1]);
                    let color = decode_color(payload[2]);
                    let pattern = remap_pattern(payload[3], first_pattern_id);
                    self.stroke_path_image_pattern(pattern, color, width, flags);
                }
                CmdTag::INDEXED_TRI_LIST => self.play_indexed_tri_list(payload),
                CmdTag::CREATE_LINEAR_GRADIENT => {
                    let p = payload_floats(&payload[..4]);
                    self.create_linear_gradient(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        decode_color(payload[4]),
                        decode_color(payload[5]),
                    );
                }
                CmdTag::CREATE_BOX_GRADIENT => {
                    let p = payload_floats(&payload[..6]);
                    self.create_box_gradient(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        p[4],
                        p[5],
                        decode_color(payload[6]),
                        decode_color(payload[7]),
                    );
                }
                CmdTag::CREATE_RADIAL_GRADIENT => {
                    let p = payload_floats(&payload[..4]);
                    self.create_radial_gradient(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        decode_color(payload[4]),
                        decode_color(payload[5]),
                    );
                }
                CmdTag::CREATE_IMAGE_PATTERN => {
                    let p = payload_floats(&payload[..5]);
                    self.create_image_pattern(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        p[4],
                        ImageHandle::new(payload[5] as u16),
                    );
                }
                CmdTag::TEXT => {
                    let cfg = decode_text_config(payload);
                    let x = payload_f32(payload, TEXT_CONFIG_WORDS);
                    let y = payload_f32(payload, TEXT_CONFIG_WORDS + 1);
                    let offset = payload[TEXT_CONFIG_WORDS + 2] as usize;
                    let len = payload[TEXT_CONFIG_WORDS + 3] as usize;
                    if let Some(text) = list_string(&cl, offset, len) {
                        self.text(&cfg, x, y, text);
                    }
                }
                CmdTag::TEXT_BOX => {
                    let cfg = decode_text_config(payload);
                    let x = payload_f32(payload, TEXT_CONFIG_WORDS);
                    let y = payload_f32(payload, TEXT_CONFIG_WORDS + 1);
                    let break_width = payload_f32(payload, TEXT_CONFIG_WORDS + 2);
                    let offset = payload[TEXT_CONFIG_WORDS + 3] as usize;
                    let len = payload[TEXT_CONFIG_WORDS + 4] as usize;
                    let break_flags = payload[TEXT_CONFIG_WORDS + 5];
                    if let Some(text) = list_string(&cl, offset, len) {
                        self.text_box(&cfg, x, y, break_width, text, break_flags);
                    }
                }
                CmdTag::RESET_SCISSOR => {
                    self.reset_scissor();
                    skip_cmds = false;
                }
                CmdTag::SET_SCISSOR => {
                    let p = payload_floats(payload);
                    self.set_scissor(p[0], p[1], p[2], p[3]);
                    if cull {
                        let scissor = self.state().scissor;
                        skip_cmds = scissor[2] < 1.0 || scissor[3] < 1.0;
                    }
                }
                CmdTag::INTERSECT_SCISSOR => {
                    let p = payload_floats(payload);
                    let zero_rect = !self.intersect_scissor(p[0], p[1], p[2], p[3]);
                    if cull {
                        skip_cmds = zero_rect;
                    }
                }
                CmdTag::PUSH_STATE => self.push_state(),
                CmdTag::POP_STATE => {
                    self.pop_state();
                    if cull {
                        let scissor = self.state().scissor;
                        skip_cmds = scissor[2] < 1.0 || scissor[3] < 1.0;
                    }
                }
                CmdTag::TRANSFORM_IDENTITY => self.transform_identity(),
                CmdTag::TRANSFORM_SCALE => {
                    self.transform_scale(payload_f32(payload, 0), payload_f32(payload, 1));
                }
                CmdTag::TRANSFORM_TRANSLATE => {
                    self.transform_translate(payload_f32(payload, 0), payload_f32(payload, 1));
                }
                CmdTag::TRANSFORM_ROTATE => self.transform_rotate(payload_f32(payload, 0)),
                CmdTag::TRANSFORM_MULT => {
                    let p = payload_floats(&payload[..6]);
                    let order = TransformOrder::from_bits(payload[6]);
                    self.transform_mult([p[0], p[1], p[2], p[3], p[4], p[5]], order);
                }
                CmdTag::SET_VIEW_BOX => {
                    let p = payload_floats(payload);
                    self.set_view_box(p[0], p[1], p[2], p[3]);
                }
                CmdTag::BEGIN_CLIP => self.begin_clip(ClipRule::from_bits(payload[0])),
                CmdTag::END_CLIP => self.end_clip(),
                CmdTag::RESET_CLIP => self.reset_clip(),
                CmdTag::SUBMIT_COMMAND_LIST => {
                    let child = CommandListHandle::new(payload[0] as u16);
                    if self.is_command_list_valid(child) {
                        self.submit_command_list(child);
                    }
                }
                _ => {
                    debug_assert!(false, "unknown command tag {}", tag.0);
                    log::error!("skipping unknown command tag {}", tag.0);
                }
            }
        }

        if self.config.preserve_command_list_state {
            self.pop_state();
            self.reset_clip();
        }

        cl.cache = self.cache_stack.pop();
        if let Some(cache) = cl.cache.as_mut() {
            cache.built = true;
        }
        self.cmd_lists[handle.id as usize] = Some(cl);
        self.submit_depth -= 1;
    }

    /// Replays a list from its shape cache: path commands are skipped and
    /// every stroker command consumes its pre-tessellated meshes, which only
    /// need re-transforming by the current state matrix. All other commands
    /// execute normally.
    fn play_cached(&mut self, cl: &CommandList, cache: &ShapeCache) {
        let cull = cl.flags.allow_culling();

        let first_gradient_id = self.paints.next_gradient_id();
        let first_pattern_id = self.paints.next_image_pattern_id();
        debug_assert!(
            first_gradient_id as u32 + cl.num_gradients as u32 <= self.config.max_gradients as u32,
            "not enough free gradients for command list"
        );
        debug_assert!(
            first_pattern_id as u32 + cl.num_image_patterns as u32
                <= self.config.max_image_patterns as u32,
            "not enough free image patterns for command list"
        );

        if self.config.preserve_command_list_state {
            self.push_state();
        }

        let mut next_cached_command = 0usize;
        let mut skip_cmds = false;
        let mut reader = WordReader::new(cl.words());
        while let Some((tag, payload)) = reader.next_command() {
            if tag.is_path_command() {
                continue;
            }
            if skip_cmds && tag.is_stroker_command() {
                next_cached_command += 1;
                continue;
            }
            match tag {
                CmdTag::FILL_PATH_COLOR => {
                    let color = decode_color(payload[1]);
                    self.submit_cached_meshes(cache, &mut next_cached_command, FillPaint::Color, color);
                }
                CmdTag::FILL_PATH_GRADIENT => {
                    let gradient = remap_gradient(payload[1], first_gradient_id);
                    self.submit_cached_meshes(
                        cache,
                        &mut next_cached_command,
                        FillPaint::Gradient(gradient),
                        peniko::color::palette::css::BLACK,
                    );
                }
                CmdTag::FILL_PATH_IMAGE_PATTERN => {
                    let color = decode_color(payload[1]);
                    let pattern = remap_pattern(payload[2], first_pattern_id);
                    self.submit_cached_meshes(
                        cache,
                        &mut next_cached_command,
                        FillPaint::ImagePattern(pattern),
                        color,
                    );
                }
                CmdTag::STROKE_PATH_COLOR => {
                    let color = decode_color(payload[2]);
                    self.submit_cached_meshes(cache, &mut next_cached_command, FillPaint::Color, color);
                }
                CmdTag::STROKE_PATH_GRADIENT => {
                    let gradient = remap_gradient(payload[2], first_gradient_id);
                    self.submit_cached_meshes(
                        cache,
                        &mut next_cached_command,
                        FillPaint::Gradient(gradient),
                        peniko::color::palette::css::BLACK,
                    );
                }
                CmdTag::STROKE_PATH_IMAGE_PATTERN => {
                    let color = decode_color(payload[2]);
                    let pattern = remap_pattern(payload[3], first_pattern_id);
                    self.submit_cached_meshes(
                        cache,
                        &mut next_cached_command,
                        FillPaint::ImagePattern(pattern),
                        color,
                    );
                }
                CmdTag::INDEXED_TRI_LIST => self.play_indexed_tri_list(payload),
                CmdTag::CREATE_LINEAR_GRADIENT => {
                    let p = payload_floats(&payload[..4]);
                    self.create_linear_gradient(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        decode_color(payload[4]),
                        decode_color(payload[5]),
                    );
                }
                CmdTag::CREATE_BOX_GRADIENT => {
                    let p = payload_floats(&payload[..6]);
                    self.create_box_gradient(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        p[4],
                        p[5],
                        decode_color(payload[6]),
                        decode_color(payload[7]),
                    );
                }
                CmdTag::CREATE_RADIAL_GRADIENT => {
                    let p = payload_floats(&payload[..4]);
                    self.create_radial_gradient(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        decode_color(payload[4]),
                        decode_color(payload[5]),
                    );
                }
                CmdTag::CREATE_IMAGE_PATTERN => {
                    let p = payload_floats(&payload[..5]);
                    self.create_image_pattern(
                        p[0],
                        p[1],
                        p[2],
                        p[3],
                        p[4],
                        ImageHandle::new(payload[5] as u16),
                    );
                }
                CmdTag::TEXT => {
                    let cfg = decode_text_config(payload);
                    let x = payload_f32(payload, TEXT_CONFIG_WORDS);
                    let y = payload_f32(payload, TEXT_CONFIG_WORDS + 1);
                    let offset = payload[TEXT_CONFIG_WORDS + 2] as usize;
                    let len = payload[TEXT_CONFIG_WORDS + 3] as usize;
                    if let Some(text) = list_string(cl, offset, len) {
                        self.text(&cfg, x, y, text);
                    }
                }
                CmdTag::TEXT_BOX => {
                    let cfg = decode_text_config(payload);
                    let x = payload_f32(payload, TEXT_CONFIG_WORDS);
                    let y = payload_f32(payload, TEXT_CONFIG_WORDS + 1);
                    let break_width = payload_f32(payload, TEXT_CONFIG_WORDS + 2);
                    let offset = payload[TEXT_CONFIG_WORDS + 3] as usize;
                    let len = payload[TEXT_CONFIG_WORDS + 4] as usize;
                    let break_flags = payload[TEXT_CONFIG_WORDS + 5];
                    if let Some(text) = list_string(cl, offset, len) {
                        self.text_box(&cfg, x, y, break_width, text, break_flags);
                    }
                }
                CmdTag::RESET_SCISSOR => {
                    self.reset_scissor();
                    skip_cmds = false;
                }
                CmdTag::SET_SCISSOR => {
                    let p = payload_floats(payload);
                    self.set_scissor(p[0], p[1], p[2], p[3]);
                    if cull {
                        skip_cmds = p[2] < 1.0 || p[3] < 1.0;
                    }
                }
                CmdTag::INTERSECT_SCISSOR => {
                    let p = payload_floats(payload);
                    let zero_rect = !self.intersect_scissor(p[0], p[1], p[2], p[3]);
                    if cull {
                        skip_cmds = zero_rect;
                    }
                }
                CmdTag::PUSH_STATE => self.push_state(),
                CmdTag::POP_STATE => {
                    self.pop_state();
                    if cull {
                        let scissor = self.state().scissor;
                        skip_cmds = scissor[2] < 1.0 || scissor[3] < 1.0;
                    }
                }
                CmdTag::TRANSFORM_IDENTITY => self.transform_identity(),
                CmdTag::TRANSFORM_SCALE => {
                    self.transform_scale(payload_f32(payload, 0), payload_f32(payload, 1));
                }
                CmdTag::TRANSFORM_TRANSLATE => {
                    self.transform_translate(payload_f32(payload, 0), payload_f32(payload, 1));
                }
                CmdTag::TRANSFORM_ROTATE => self.transform_rotate(payload_f32(payload, 0)),
                CmdTag::TRANSFORM_MULT => {
                    let p = payload_floats(&payload[..6]);
                    let order = TransformOrder::from_bits(payload[6]);
                    self.transform_mult([p[0], p[1], p[2], p[3], p[4], p[5]], order);
                }
                CmdTag::SET_VIEW_BOX => {
                    let p = payload_floats(payload);
                    self.set_view_box(p[0], p[1], p[2], p[3]);
                }
                CmdTag::BEGIN_CLIP => self.begin_clip(ClipRule::from_bits(payload[0])),
                CmdTag::END_CLIP => self.end_clip(),
                CmdTag::RESET_CLIP => self.reset_clip(),
                CmdTag::SUBMIT_COMMAND_LIST => {
                    let child = CommandListHandle::new(payload[0] as u16);
                    if self.is_command_list_valid(child) {
                        self.submit_command_list(child);
                    }
                }
                _ => {
                    debug_assert!(false, "unknown cached command tag {}", tag.0);
                    log::error!("skipping unknown cached command tag {}", tag.0);
                }
            }
        }

        if self.config.preserve_command_list_state {
            self.pop_state();
            self.reset_clip();
        }
    }

    /// Re-transforms and submits the mesh run of one cached stroker
    /// command. Cached colors (AA meshes) win over the broadcast color.
    fn submit_cached_meshes(
        &mut self,
        cache: &ShapeCache,
        next_cached_command: &mut usize,
        paint: FillPaint,
        color: Color,
    ) {
        let Some(cached) = cache.commands.get(*next_cached_command) else {
            debug_assert!(false, "cached command stream out of sync");
            log::error!("cached command stream out of sync; skipping");
            return;
        };
        *next_cached_command += 1;

        let record_clip = self.batcher.record_clip_commands;
        let state = *self.state();
        let transform = state.transform;
        let scissor = state.scissor_as_u16();
        let packed = pack_color(color);

        let first = cached.first_mesh as usize;
        let count = cached.num_meshes as usize;
        for mesh in &cache.meshes[first..first + count] {
            math::transform_positions(&transform, &mesh.positions, &mut self.transformed_vertices);
            if record_clip {
                self.batcher
                    .emit_clip(scissor, &self.transformed_vertices, &mesh.indices);
                continue;
            }
            self.submit_cached_mesh(mesh, packed, paint, scissor);
        }
    }

    fn submit_cached_mesh(
        &mut self,
        mesh: &CachedMesh,
        packed_color: u32,
        paint: FillPaint,
        scissor: [u16; 4],
    ) {
        use crate::batch::{DrawCommandType, UvSource};

        let broadcast = [packed_color];
        let colors: &[u32] = match &mesh.colors {
            Some(colors) => colors,
            None => &broadcast,
        };
        let (cmd_type, handle) = match paint {
            FillPaint::Color => (DrawCommandType::Textured, self.font_atlas_image().id),
            FillPaint::Gradient(h) => {
                debug_assert!(h.is_valid() && !h.is_local(), "invalid gradient handle");
                (DrawCommandType::ColorGradient, h.id)
            }
            FillPaint::ImagePattern(h) => {
                debug_assert!(h.is_valid() && !h.is_local(), "invalid pattern handle");
                (DrawCommandType::ImagePattern, h.id)
            }
        };
        self.batcher.emit_draw(
            cmd_type,
            handle,
            scissor,
            &self.transformed_vertices,
            UvSource::White,
            colors,
            &mesh.indices,
        );
    }

    /// Decodes and submits an `INDEXED_TRI_LIST` payload.
    fn play_indexed_tri_list(&mut self, payload: &[u32]) {
        let mut pos = 0usize;
        let num_vertices = payload[pos] as usize;
        pos += 1;
        let positions = payload_floats(&payload[pos..pos + num_vertices * 2]);
        pos += num_vertices * 2;
        let num_uvs = payload[pos] as usize;
        pos += 1;
        let uvs = payload_floats(&payload[pos..pos + num_uvs * 2]);
        pos += num_uvs * 2;
        let num_colors = payload[pos] as usize;
        pos += 1;
        let colors: Vec<Color> = payload[pos..pos + num_colors]
            .iter()
            .map(|w| decode_color(*w))
            .collect();
        pos += num_colors;
        let num_indices = payload[pos] as usize;
        pos += 1;
        let index_words = num_indices.div_ceil(2);
        let mut indices = Vec::with_capacity(num_indices);
        for (i, word) in payload[pos..pos + index_words].iter().enumerate() {
            indices.push(*word as u16);
            if i * 2 + 1 < num_indices {
                indices.push((*word >> 16) as u16);
            }
        }
        pos += index_words;
        let image = ImageHandle::new(payload[pos] as u16);

        self.indexed_tri_list(
            positions,
            if num_uvs > 0 { Some(uvs) } else { None },
            &colors,
            &indices,
            image,
        );
    }
}

fn list_string(cl: &CommandList, offset: usize, len: usize) -> Option<&str> {
    let bytes = cl.strings().get(offset..offset + len)?;
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s),
        Err(_) => {
            debug_assert!(false, "command list string heap corrupted");
            None
        }
    }
}
