// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-list bytecode.
//!
//! A command list records the full drawing API as a compact tagged stream of
//! `u32` words: each command is a two-word header (tag, payload word count)
//! followed by its payload, with floats stored as bits and strings hoisted
//! into a side heap. Playback (see `player`) walks the stream sequentially;
//! there are no pointers, so lists survive frames and can be replayed any
//! number of times.

use peniko::Color;

use crate::flags::CommandListFlags;
use crate::handle::{GradientHandle, ImagePatternHandle, HANDLE_FLAG_LOCAL};
use crate::shape_cache::ShapeCache;

/// Command tag.
///
/// The numbering groups commands into ranges: path construction commands
/// are skipped entirely on cached replay, and stroker commands are the ones
/// dropped by scissor culling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct CmdTag(pub u32);

impl CmdTag {
    pub const BEGIN_PATH: Self = Self(0);
    pub const MOVE_TO: Self = Self(1);
    pub const LINE_TO: Self = Self(2);
    pub const CUBIC_TO: Self = Self(3);
    pub const QUADRATIC_TO: Self = Self(4);
    pub const ARC_TO: Self = Self(5);
    pub const ARC: Self = Self(6);
    pub const RECT: Self = Self(7);
    pub const ROUNDED_RECT: Self = Self(8);
    pub const ROUNDED_RECT_VARYING: Self = Self(9);
    pub const CIRCLE: Self = Self(10);
    pub const ELLIPSE: Self = Self(11);
    pub const POLYLINE: Self = Self(12);
    pub const CLOSE_PATH: Self = Self(13);

    pub const FILL_PATH_COLOR: Self = Self(14);
    pub const FILL_PATH_GRADIENT: Self = Self(15);
    pub const FILL_PATH_IMAGE_PATTERN: Self = Self(16);
    pub const STROKE_PATH_COLOR: Self = Self(17);
    pub const STROKE_PATH_GRADIENT: Self = Self(18);
    pub const STROKE_PATH_IMAGE_PATTERN: Self = Self(19);

    pub const INDEXED_TRI_LIST: Self = Self(20);

    pub const BEGIN_CLIP: Self = Self(21);
    pub const END_CLIP: Self = Self(22);
    pub const RESET_CLIP: Self = Self(23);

    pub const CREATE_LINEAR_GRADIENT: Self = Self(24);
    pub const CREATE_BOX_GRADIENT: Self = Self(25);
    pub const CREATE_RADIAL_GRADIENT: Self = Self(26);
    pub const CREATE_IMAGE_PATTERN: Self = Self(27);

    pub const PUSH_STATE: Self = Self(28);
    pub const POP_STATE: Self = Self(29);
    pub const RESET_SCISSOR: Self = Self(30);
    pub const SET_SCISSOR: Self = Self(31);
    pub const INTERSECT_SCISSOR: Self = Self(32);

    pub const TRANSFORM_IDENTITY: Self = Self(33);
    pub const TRANSFORM_SCALE: Self = Self(34);
    pub const TRANSFORM_TRANSLATE: Self = Self(35);
    pub const TRANSFORM_ROTATE: Self = Self(36);
    pub const TRANSFORM_MULT: Self = Self(37);
    pub const SET_VIEW_BOX: Self = Self(38);

    pub const TEXT: Self = Self(39);
    pub const TEXT_BOX: Self = Self(40);

    pub const SUBMIT_COMMAND_LIST: Self = Self(41);

    pub fn is_path_command(self) -> bool {
        self.0 >= Self::BEGIN_PATH.0 && self.0 <= Self::CLOSE_PATH.0
    }

    pub fn is_stroker_command(self) -> bool {
        self.0 >= Self::FILL_PATH_COLOR.0 && self.0 <= Self::STROKE_PATH_IMAGE_PATTERN.0
    }
}

/// A recorded, replayable command stream.
pub(crate) struct CommandList {
    words: Vec<u32>,
    strings: Vec<u8>,
    pub flags: CommandListFlags,
    pub num_gradients: u16,
    pub num_image_patterns: u16,
    pub cache: Option<ShapeCache>,
}

impl CommandList {
    pub fn new(flags: CommandListFlags) -> Self {
        Self {
            words: Vec::new(),
            strings: Vec::new(),
            flags,
            num_gradients: 0,
            num_image_patterns: 0,
            cache: None,
        }
    }

    pub fn reset(&mut self) {
        self.words.clear();
        self.strings.clear();
        self.num_gradients = 0;
        self.num_image_patterns = 0;
        if let Some(cache) = self.cache.as_mut() {
            cache.reset();
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn strings(&self) -> &[u8] {
        &self.strings
    }

    pub fn memory_used(&self) -> u32 {
        (self.words.len() * 4 + self.strings.len()) as u32
    }

    pub fn memory_reserved(&self) -> u32 {
        (self.words.capacity() * 4 + self.strings.capacity()) as u32
    }

    fn push_command(&mut self, tag: CmdTag, payload: &[u32]) {
        self.words.reserve(2 + payload.len());
        self.words.push(tag.0);
        self.words.push(payload.len() as u32);
        self.words.extend_from_slice(payload);
    }

    fn store_string(&mut self, s: &str) -> (u32, u32) {
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        (offset, s.len() as u32)
    }
}

/// Packs a color into the bytecode as straight (non-premultiplied) RGBA8
/// with the red component in the high byte.
pub(crate) fn encode_color(color: Color) -> u32 {
    color.to_rgba8().to_u32()
}

pub(crate) fn decode_color(word: u32) -> Color {
    Color::from_rgba8(
        (word >> 24) as u8,
        (word >> 16) as u8,
        (word >> 8) as u8,
        word as u8,
    )
}

pub(crate) fn encode_paint_handle(id: u16, flags: u16) -> u32 {
    (id as u32) | ((flags as u32) << 16)
}

pub(crate) fn decode_paint_handle(word: u32) -> (u16, u16) {
    (word as u16, (word >> 16) as u16)
}

fn f(value: f32) -> u32 {
    value.to_bits()
}

/// Records drawing calls into a command list.
///
/// Obtained from [`Context::record`](crate::Context::record); the methods
/// mirror the immediate-mode API one to one. Gradients and image patterns
/// created through the recorder return *local* handles that are remapped to
/// frame-global ids each time the list is submitted.
pub struct CommandListRecorder<'a> {
    ctx: &'a mut crate::Context,
    handle: crate::CommandListHandle,
}

impl crate::Context {
    /// Starts (or continues) recording into `handle`. Returns `None` for a
    /// dead handle.
    pub fn record(&mut self, handle: crate::CommandListHandle) -> Option<CommandListRecorder<'_>> {
        if !self.is_command_list_valid(handle) {
            debug_assert!(false, "invalid command list handle");
            return None;
        }
        Some(CommandListRecorder { ctx: self, handle })
    }
}

impl CommandListRecorder<'_> {
    fn list(&mut self) -> &mut CommandList {
        self.ctx.cmd_lists[self.handle.id as usize]
            .as_mut()
            .expect("recorder outlived its command list")
    }

    pub fn begin_path(&mut self) {
        self.list().push_command(CmdTag::BEGIN_PATH, &[]);
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.list().push_command(CmdTag::MOVE_TO, &[f(x), f(y)]);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.list().push_command(CmdTag::LINE_TO, &[f(x), f(y)]);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.list().push_command(
            CmdTag::CUBIC_TO,
            &[f(c1x), f(c1y), f(c2x), f(c2y), f(x), f(y)],
        );
    }

    pub fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.list()
            .push_command(CmdTag::QUADRATIC_TO, &[f(cx), f(cy), f(x), f(y)]);
    }

    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: crate::Winding) {
        self.list().push_command(
            CmdTag::ARC,
            &[f(cx), f(cy), f(r), f(a0), f(a1), dir as u32],
        );
    }

    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, r: f32) {
        self.list()
            .push_command(CmdTag::ARC_TO, &[f(x1), f(y1), f(x2), f(y2), f(r)]);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.list()
            .push_command(CmdTag::RECT, &[f(x), f(y), f(w), f(h)]);
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        self.list()
            .push_command(CmdTag::ROUNDED_RECT, &[f(x), f(y), f(w), f(h), f(r)]);
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
        self.list().push_command(
            CmdTag::ROUNDED_RECT_VARYING,
            &[
                f(x),
                f(y),
                f(w),
                f(h),
                f(top_left),
                f(top_right),
                f(bottom_right),
                f(bottom_left),
            ],
        );
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) {
        self.list()
            .push_command(CmdTag::CIRCLE, &[f(cx), f(cy), f(radius)]);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        self.list()
            .push_command(CmdTag::ELLIPSE, &[f(cx), f(cy), f(rx), f(ry)]);
    }

    pub fn polyline(&mut self, coords: &[f32]) {
        debug_assert!(coords.len() % 2 == 0, "polyline takes x,y pairs");
        let mut payload = Vec::with_capacity(1 + coords.len());
        payload.push((coords.len() / 2) as u32);
        payload.extend(coords.iter().map(|c| f(*c)));
        self.list().push_command(CmdTag::POLYLINE, &payload);
    }

    pub fn close_path(&mut self) {
        self.list().push_command(CmdTag::CLOSE_PATH, &[]);
    }

    pub fn fill_path(&mut self, color: Color, flags: crate::FillFlags) {
        self.list()
            .push_command(CmdTag::FILL_PATH_COLOR, &[flags.0, encode_color(color)]);
    }

    pub fn fill_path_gradient(&mut self, gradient: GradientHandle, flags: crate::FillFlags) {
        self.list().push_command(
            CmdTag::FILL_PATH_GRADIENT,
            &[flags.0, encode_paint_handle(gradient.id, gradient.flags)],
        );
    }

    pub fn fill_path_image_pattern(
        &mut self,
        pattern: ImagePatternHandle,
        color: Color,
        flags: crate::FillFlags,
    ) {
        self.list().push_command(
            CmdTag::FILL_PATH_IMAGE_PATTERN,
            &[
                flags.0,
                encode_color(color),
                encode_paint_handle(pattern.id, pattern.flags),
            ],
        );
    }

    pub fn stroke_path(&mut self, color: Color, width: f32, flags: crate::StrokeFlags) {
        self.list().push_command(
            CmdTag::STROKE_PATH_COLOR,
            &[f(width), flags.0, encode_color(color)],
        );
    }

    pub fn stroke_path_gradient(
        &mut self,
        gradient: GradientHandle,
        width: f32,
        flags: crate::StrokeFlags,
    ) {
        self.list().push_command(
            CmdTag::STROKE_PATH_GRADIENT,
            &[
                f(width),
                flags.0,
                encode_paint_handle(gradient.id, gradient.flags),
            ],
        );
    }

    pub fn stroke_path_image_pattern(
        &mut self,
        pattern: ImagePatternHandle,
        color: Color,
        width: f32,
        flags: crate::StrokeFlags,
    ) {
        self.list().push_command(
            CmdTag::STROKE_PATH_IMAGE_PATTERN,
            &[
                f(width),
                flags.0,
                encode_color(color),
                encode_paint_handle(pattern.id, pattern.flags),
            ],
        );
    }

    pub fn indexed_tri_list(
        &mut self,
        positions: &[f32],
        uvs: Option<&[f32]>,
        colors: &[Color],
        indices: &[u16],
        image: crate::ImageHandle,
    ) {
        debug_assert!(positions.len() % 2 == 0);
        let num_vertices = (positions.len() / 2) as u32;
        let uvs = uvs.unwrap_or(&[]);
        let mut payload = Vec::with_capacity(
            4 + positions.len() + uvs.len() + colors.len() + indices.len().div_ceil(2) + 1,
        );
        payload.push(num_vertices);
        payload.extend(positions.iter().map(|c| f(*c)));
        payload.push((uvs.len() / 2) as u32);
        payload.extend(uvs.iter().map(|c| f(*c)));
        payload.push(colors.len() as u32);
        payload.extend(colors.iter().map(|c| encode_color(*c)));
        payload.push(indices.len() as u32);
        payload.extend(indices.chunks(2).map(|pair| {
            (pair[0] as u32) | ((pair.get(1).copied().unwrap_or(0) as u32) << 16)
        }));
        payload.push(image.id as u32);
        self.list().push_command(CmdTag::INDEXED_TRI_LIST, &payload);
    }

    pub fn begin_clip(&mut self, rule: crate::ClipRule) {
        self.list().push_command(CmdTag::BEGIN_CLIP, &[rule as u32]);
    }

    pub fn end_clip(&mut self) {
        self.list().push_command(CmdTag::END_CLIP, &[]);
    }

    pub fn reset_clip(&mut self) {
        self.list().push_command(CmdTag::RESET_CLIP, &[]);
    }

    /// Records a linear gradient and returns its list-local handle.
    pub fn create_linear_gradient(
        &mut self,
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        let cl = self.list();
        cl.push_command(
            CmdTag::CREATE_LINEAR_GRADIENT,
            &[
                f(sx),
                f(sy),
                f(ex),
                f(ey),
                encode_color(inner_color),
                encode_color(outer_color),
            ],
        );
        let id = cl.num_gradients;
        cl.num_gradients += 1;
        GradientHandle::local(id)
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
        let cl = self.list();
        cl.push_command(
            CmdTag::CREATE_BOX_GRADIENT,
            &[
                f(x),
                f(y),
                f(w),
                f(h),
                f(radius),
                f(feather),
                encode_color(inner_color),
                encode_color(outer_color),
            ],
        );
        let id = cl.num_gradients;
        cl.num_gradients += 1;
        GradientHandle::local(id)
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
        let cl = self.list();
        cl.push_command(
            CmdTag::CREATE_RADIAL_GRADIENT,
            &[
                f(cx),
                f(cy),
                f(inner_radius),
                f(outer_radius),
                encode_color(inner_color),
                encode_color(outer_color),
            ],
        );
        let id = cl.num_gradients;
        cl.num_gradients += 1;
        GradientHandle::local(id)
    }

    pub fn create_image_pattern(
        &mut self,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        angle: f32,
        image: crate::ImageHandle,
    ) -> ImagePatternHandle {
        let cl = self.list();
        cl.push_command(
            CmdTag::CREATE_IMAGE_PATTERN,
            &[f(cx), f(cy), f(w), f(h), f(angle), image.id as u32],
        );
        let id = cl.num_image_patterns;
        cl.num_image_patterns += 1;
        ImagePatternHandle {
            id,
            flags: HANDLE_FLAG_LOCAL,
        }
    }

    pub fn push_state(&mut self) {
        self.list().push_command(CmdTag::PUSH_STATE, &[]);
    }

    pub fn pop_state(&mut self) {
        self.list().push_command(CmdTag::POP_STATE, &[]);
    }

    pub fn reset_scissor(&mut self) {
        self.list().push_command(CmdTag::RESET_SCISSOR, &[]);
    }

    pub fn set_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.list()
            .push_command(CmdTag::SET_SCISSOR, &[f(x), f(y), f(w), f(h)]);
    }

    pub fn intersect_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.list()
            .push_command(CmdTag::INTERSECT_SCISSOR, &[f(x), f(y), f(w), f(h)]);
    }

    pub fn transform_identity(&mut self) {
        self.list().push_command(CmdTag::TRANSFORM_IDENTITY, &[]);
    }

    pub fn transform_scale(&mut self, x: f32, y: f32) {
        self.list()
            .push_command(CmdTag::TRANSFORM_SCALE, &[f(x), f(y)]);
    }

    pub fn transform_translate(&mut self, x: f32, y: f32) {
        self.list()
            .push_command(CmdTag::TRANSFORM_TRANSLATE, &[f(x), f(y)]);
    }

    pub fn transform_rotate(&mut self, angle: f32) {
        self.list()
            .push_command(CmdTag::TRANSFORM_ROTATE, &[f(angle)]);
    }

    pub fn transform_mult(&mut self, matrix: [f32; 6], order: crate::TransformOrder) {
        self.list().push_command(
            CmdTag::TRANSFORM_MULT,
            &[
                f(matrix[0]),
                f(matrix[1]),
                f(matrix[2]),
                f(matrix[3]),
                f(matrix[4]),
                f(matrix[5]),
                order as u32,
            ],
        );
    }

    pub fn set_view_box(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.list()
            .push_command(CmdTag::SET_VIEW_BOX, &[f(x), f(y), f(w), f(h)]);
    }

    pub fn text(&mut self, cfg: &crate::font::TextConfig, x: f32, y: f32, text: &str) {
        let cl = self.list();
        let (offset, len) = cl.store_string(text);
        let mut payload = encode_text_config(cfg);
        payload.extend_from_slice(&[f(x), f(y), offset, len]);
        cl.push_command(CmdTag::TEXT, &payload);
    }

    pub fn text_box(
        &mut self,
        cfg: &crate::font::TextConfig,
        x: f32,
        y: f32,
        break_width: f32,
        text: &str,
        break_flags: u32,
    ) {
        let cl = self.list();
        let (offset, len) = cl.store_string(text);
        let mut payload = encode_text_config(cfg);
        payload.extend_from_slice(&[f(x), f(y), f(break_width), offset, len, break_flags]);
        cl.push_command(CmdTag::TEXT_BOX, &payload);
    }

    /// Records a nested submission of another list.
    pub fn submit_command_list(&mut self, child: crate::CommandListHandle) {
        self.list()
            .push_command(CmdTag::SUBMIT_COMMAND_LIST, &[child.id as u32]);
    }
}

pub(crate) fn encode_text_config(cfg: &crate::font::TextConfig) -> Vec<u32> {
    vec![
        cfg.font.id as u32,
        f(cfg.size),
        cfg.alignment.0,
        encode_color(cfg.color),
        f(cfg.blur),
        f(cfg.spacing),
    ]
}

pub(crate) const TEXT_CONFIG_WORDS: usize = 6;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::CommandListFlags;

    #[test]
    fn color_bytecode_roundtrip() {
        let color = Color::from_rgba8(0x12, 0x34, 0x56, 0x78);
        let decoded = decode_color(encode_color(color));
        assert_eq!(encode_color(decoded), 0x1234_5678);
    }

    #[test]
    fn paint_handle_roundtrip() {
        let word = encode_paint_handle(7, HANDLE_FLAG_LOCAL);
        assert_eq!(decode_paint_handle(word), (7, HANDLE_FLAG_LOCAL));
    }

    #[test]
    fn commands_are_word_aligned_pairs() {
        let mut cl = CommandList::new(CommandListFlags::NONE);
        cl.push_command(CmdTag::MOVE_TO, &[f(1.0), f(2.0)]);
        cl.push_command(CmdTag::CLOSE_PATH, &[]);
        let words = cl.words();
        assert_eq!(words[0], CmdTag::MOVE_TO.0);
        assert_eq!(words[1], 2);
        assert_eq!(f32::from_bits(words[2]), 1.0);
        assert_eq!(words[4], CmdTag::CLOSE_PATH.0);
        assert_eq!(words[5], 0);
    }

    #[test]
    fn tag_ranges() {
        assert!(CmdTag::BEGIN_PATH.is_path_command());
        assert!(CmdTag::CLOSE_PATH.is_path_command());
        assert!(!CmdTag::FILL_PATH_COLOR.is_path_command());
        assert!(CmdTag::FILL_PATH_COLOR.is_stroker_command());
        assert!(CmdTag::STROKE_PATH_IMAGE_PATTERN.is_stroker_command());
        assert!(!CmdTag::INDEXED_TRI_LIST.is_stroker_command());
    }
}
