// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for the integration suites: recording introspection and
//! a deterministic stub font system.

#![allow(dead_code)]

use vellum::font::{AtlasUpdate, FontSystem, TextConfig, TextMesh, TextQuad, TextRow};
use vellum::{Command, FontHandle, Program, Recording, StencilMode, Uniforms};

/// Comparable snapshot of a draw submission.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawInfo {
    pub program: Program,
    pub vertex_buffer: u32,
    pub first_vertex: u32,
    pub num_vertices: u32,
    pub first_index: u32,
    pub num_indices: u32,
    pub stencil: StencilMode,
    pub write_color: bool,
    pub uniforms: Uniforms,
}

pub fn draw_commands(recording: &Recording) -> Vec<DrawInfo> {
    recording
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::Draw {
                program,
                vertex_buffer,
                first_vertex,
                num_vertices,
                first_index,
                num_indices,
                stencil,
                write_color,
                uniforms,
                ..
            } => Some(DrawInfo {
                program: *program,
                vertex_buffer: *vertex_buffer,
                first_vertex: *first_vertex,
                num_vertices: *num_vertices,
                first_index: *first_index,
                num_indices: *num_indices,
                stencil: *stencil,
                write_color: *write_color,
                uniforms: uniforms.clone(),
            }),
            _ => None,
        })
        .collect()
}

pub fn position_stream(recording: &Recording) -> Vec<f32> {
    recording
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::UpdatePositionStream { data, .. } => Some(data.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

pub fn uv_stream(recording: &Recording) -> Vec<f32> {
    recording
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::UpdateUvStream { data, .. } => Some(data.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

pub fn color_stream(recording: &Recording) -> Vec<u32> {
    recording
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::UpdateColorStream { data, .. } => Some(data.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

pub fn index_stream(recording: &Recording) -> Vec<u16> {
    recording
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::UpdateIndexBuffer { data, .. } => Some(data.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

pub fn scissor_commands(recording: &Recording) -> Vec<[u16; 4]> {
    recording
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::SetScissor { rect } => Some(*rect),
            _ => None,
        })
        .collect()
}

/// Everything pixel-determining about a frame, for equality comparisons.
#[derive(Debug, PartialEq)]
pub struct FrameSnapshot {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub colors: Vec<u32>,
    pub indices: Vec<u16>,
    pub draws: Vec<DrawInfo>,
}

pub fn snapshot(recording: &Recording) -> FrameSnapshot {
    FrameSnapshot {
        positions: position_stream(recording),
        uvs: uv_stream(recording),
        colors: color_stream(recording),
        indices: index_stream(recording),
        draws: draw_commands(recording),
    }
}

/// Monospace stub: every char is a 10×12 quad, no kerning, no bitmaps.
pub struct StubFontSystem {
    atlas_dirty: bool,
}

impl StubFontSystem {
    pub const ADVANCE: f32 = 10.0;
    pub const LINE_HEIGHT: f32 = 12.0;

    pub fn new() -> Self {
        Self { atlas_dirty: true }
    }
}

impl FontSystem for StubFontSystem {
    fn add_font(&mut self, _name: &str, _data: Vec<u8>) -> FontHandle {
        FontHandle::new(0)
    }

    fn find_font(&self, _name: &str) -> FontHandle {
        FontHandle::new(0)
    }

    fn add_fallback_font(&mut self, _base: FontHandle, _fallback: FontHandle) -> bool {
        true
    }

    fn text(&mut self, _cfg: &TextConfig, text: &str, _flags: u32) -> Option<TextMesh> {
        if text.is_empty() {
            return None;
        }
        let quads: Vec<TextQuad> = text
            .chars()
            .enumerate()
            .map(|(i, _)| TextQuad {
                pos: [
                    i as f32 * Self::ADVANCE,
                    0.0,
                    (i + 1) as f32 * Self::ADVANCE,
                    Self::LINE_HEIGHT,
                ],
                uv: [0.1, 0.1, 0.2, 0.2],
            })
            .collect();
        let width = quads.len() as f32 * Self::ADVANCE;
        Some(TextMesh {
            bounds: [0.0, 0.0, width, Self::LINE_HEIGHT],
            alignment: [0.0, 0.0],
            width,
            quads,
        })
    }

    fn break_lines(
        &mut self,
        _cfg: &TextConfig,
        text: &str,
        break_width: f32,
        max_rows: usize,
        _flags: u32,
    ) -> Vec<TextRow> {
        if text.is_empty() {
            return Vec::new();
        }
        let per_row = ((break_width / Self::ADVANCE) as usize).max(1);
        let mut rows = Vec::new();
        let mut offset = 0;
        while offset < text.len() && rows.len() < max_rows {
            let end = (offset + per_row).min(text.len());
            rows.push(TextRow {
                start: offset,
                end,
                next: end,
                width: (end - offset) as f32 * Self::ADVANCE,
                min_x: 0.0,
                max_x: (end - offset) as f32 * Self::ADVANCE,
            });
            offset = end;
        }
        rows
    }

    fn line_height(&mut self, _cfg: &TextConfig) -> f32 {
        Self::LINE_HEIGHT
    }

    fn line_bounds(&mut self, _cfg: &TextConfig, y: f32) -> (f32, f32) {
        (y, y + Self::LINE_HEIGHT)
    }

    fn atlas_size(&self) -> (u16, u16) {
        (64, 64)
    }

    fn white_pixel_uv(&self) -> [f32; 2] {
        [0.5 / 64.0, 0.5 / 64.0]
    }

    fn flush_atlas(&mut self) -> Option<AtlasUpdate> {
        if self.atlas_dirty {
            self.atlas_dirty = false;
            Some(AtlasUpdate {
                rect: [0, 0, 64, 64],
                data: vec![0xFF; 64 * 64 * 4],
            })
        } else {
            None
        }
    }
}
