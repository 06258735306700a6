// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The draw-batch assembler.
//!
//! Tessellated meshes are appended into per-frame vertex streams and a
//! shared index buffer. Successive meshes merge into the previous draw
//! command when the batch type, paint handle, scissor rect, clip state and
//! vertex buffer all match; anything else (or a buffer overflow, or an
//! explicit force) starts a fresh command. Clip meshes go to a separate
//! command stream with looser merge rules since clip passes carry neither a
//! paint handle nor a clip state of their own.

use std::sync::Arc;

use crate::flags::ClipRule;
use crate::handle::INVALID_ID;
use crate::pool::StreamPool;

/// Sentinel for "no clip region".
pub(crate) const INVALID_CLIP_CMD: u32 = u32::MAX;

/// Reference into the clip command stream carried by draw commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClipState {
    pub first_cmd_id: u32,
    pub num_cmds: u32,
    pub rule: ClipRule,
}

impl Default for ClipState {
    fn default() -> Self {
        Self {
            first_cmd_id: INVALID_CLIP_CMD,
            num_cmds: 0,
            rule: ClipRule::In,
        }
    }
}

/// Which shader program a batch is drawn with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawCommandType {
    /// Textured mesh: solid fills (white atlas pixel), text, tri-lists.
    Textured,
    ColorGradient,
    ImagePattern,
    /// Stencil-only pass.
    Clip,
}

/// A contiguous vertex/index range sharing all draw state.
#[derive(Copy, Clone, Debug)]
pub struct DrawCommand {
    pub cmd_type: DrawCommandType,
    pub clip: ClipState,
    pub vertex_buffer_id: u32,
    pub first_vertex: u32,
    pub first_index: u32,
    pub num_vertices: u32,
    pub num_indices: u32,
    pub scissor: [u16; 4],
    /// Image, gradient or pattern id depending on `cmd_type`;
    /// `INVALID_ID` for clip commands.
    pub handle: u16,
}

/// CPU-side streams of one vertex buffer.
pub(crate) struct VertexBufferSet {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub colors: Vec<u32>,
    pub count: u32,
}

/// Where a mesh's UVs come from.
pub(crate) enum UvSource<'a> {
    /// Broadcast the atlas white pixel.
    White,
    Slice(&'a [f32]),
}

pub(crate) struct Batcher {
    pub vertex_buffers: Vec<VertexBufferSet>,
    pub first_vertex_buffer: usize,
    pub indices: Vec<u16>,
    pub index_buffer_id: u32,
    pub draw_commands: Vec<DrawCommand>,
    pub clip_commands: Vec<DrawCommand>,
    pub clip_state: ClipState,
    pub record_clip_commands: bool,
    pub force_new_draw_command: bool,
    pub force_new_clip_command: bool,
    pub white_uv: [f32; 2],
    max_vb_vertices: u32,
    pos_pool: Arc<StreamPool<f32>>,
    uv_pool: Arc<StreamPool<f32>>,
    color_pool: Arc<StreamPool<u32>>,
    index_pool: Arc<StreamPool<u16>>,
    pub(crate) next_index_buffer_id: u32,
}

impl Batcher {
    pub fn new(max_vb_vertices: u32) -> Self {
        Self {
            vertex_buffers: Vec::new(),
            first_vertex_buffer: 0,
            indices: Vec::new(),
            index_buffer_id: 0,
            draw_commands: Vec::new(),
            clip_commands: Vec::new(),
            clip_state: ClipState::default(),
            record_clip_commands: false,
            force_new_draw_command: true,
            force_new_clip_command: true,
            white_uv: [0.0; 2],
            max_vb_vertices,
            pos_pool: StreamPool::new(),
            uv_pool: StreamPool::new(),
            color_pool: StreamPool::new(),
            index_pool: StreamPool::new(),
            next_index_buffer_id: 0,
        }
    }

    pub fn begin_frame(&mut self) {
        self.first_vertex_buffer = self.vertex_buffers.len();
        self.alloc_vertex_buffer();

        // Buffer slots cycle per frame so the engine can reuse its GPU
        // buffers by id; `frame` rewinds the counter.
        self.indices = self.index_pool.acquire(64);
        self.index_buffer_id = self.next_index_buffer_id;
        self.next_index_buffer_id += 1;

        self.draw_commands.clear();
        self.clip_commands.clear();
        self.clip_state = ClipState::default();
        self.record_clip_commands = false;
        self.force_new_draw_command = true;
        self.force_new_clip_command = true;
    }

    /// Hands the frame's streams back to their pools without submitting.
    pub fn discard_frame(&mut self) {
        for vb in self.vertex_buffers.drain(self.first_vertex_buffer..) {
            drop(crate::pool::PooledStream::new(vb.positions, self.pos_pool.clone()));
            drop(crate::pool::PooledStream::new(vb.uvs, self.uv_pool.clone()));
            drop(crate::pool::PooledStream::new(vb.colors, self.color_pool.clone()));
        }
        drop(crate::pool::PooledStream::new(
            std::mem::take(&mut self.indices),
            self.index_pool.clone(),
        ));
    }

    pub fn pools(
        &self,
    ) -> (
        Arc<StreamPool<f32>>,
        Arc<StreamPool<f32>>,
        Arc<StreamPool<u32>>,
        Arc<StreamPool<u16>>,
    ) {
        (
            self.pos_pool.clone(),
            self.uv_pool.clone(),
            self.color_pool.clone(),
            self.index_pool.clone(),
        )
    }

    fn alloc_vertex_buffer(&mut self) {
        let cap = self.max_vb_vertices as usize;
        self.vertex_buffers.push(VertexBufferSet {
            positions: self.pos_pool.acquire(cap * 2),
            uvs: self.uv_pool.acquire(cap * 2),
            colors: self.color_pool.acquire(cap),
            count: 0,
        });
    }

    /// Reserves `num_vertices` in the active vertex buffer, rotating to a
    /// fresh buffer (and forcing new commands) on overflow.
    fn alloc_vertices(&mut self, num_vertices: u32) -> (u32, u32) {
        debug_assert!(
            num_vertices < self.max_vb_vertices,
            "a single mesh cannot exceed the vertex buffer capacity"
        );
        let need_new = {
            let vb = self.vertex_buffers.last().expect("no active vertex buffer");
            vb.count + num_vertices > self.max_vb_vertices
        };
        if need_new {
            self.alloc_vertex_buffer();
            self.force_new_draw_command = true;
            self.force_new_clip_command = true;
        }
        let id = (self.vertex_buffers.len() - 1) as u32;
        let vb = self.vertex_buffers.last_mut().unwrap();
        let first = vb.count;
        vb.count += num_vertices;
        (id, first)
    }

    /// Reserves `num_indices` in the index buffer, growing it by at least
    /// half its capacity.
    fn alloc_indices(&mut self, num_indices: u32) -> u32 {
        let needed = self.indices.len() + num_indices as usize;
        if needed > self.indices.capacity() {
            let grown = (self.indices.capacity() * 3) / 2;
            let target = grown.max(needed).max(32);
            self.indices.reserve_exact(target - self.indices.len());
        }
        self.indices.len() as u32
    }

    /// The heart of the batcher: returns the index of the draw command the
    /// caller should append into, merging with the previous command when
    /// every piece of draw state matches.
    pub fn alloc_draw_command(
        &mut self,
        num_vertices: u32,
        num_indices: u32,
        cmd_type: DrawCommandType,
        handle: u16,
        scissor: [u16; 4],
    ) -> usize {
        let (vertex_buffer_id, first_vertex) = self.alloc_vertices(num_vertices);
        let first_index = self.alloc_indices(num_indices);

        if !self.force_new_draw_command {
            if let Some(prev) = self.draw_commands.last() {
                debug_assert_eq!(
                    prev.vertex_buffer_id, vertex_buffer_id,
                    "cannot merge draw commands with different vertex buffers"
                );
                debug_assert_eq!(prev.scissor, scissor, "stale scissor in merge window");
                if prev.cmd_type == cmd_type
                    && prev.handle == handle
                    && prev.clip == self.clip_state
                {
                    return self.draw_commands.len() - 1;
                }
            }
        }

        self.draw_commands.push(DrawCommand {
            cmd_type,
            clip: self.clip_state,
            vertex_buffer_id,
            first_vertex,
            first_index,
            num_vertices: 0,
            num_indices: 0,
            scissor,
            handle,
        });
        self.force_new_draw_command = false;
        self.draw_commands.len() - 1
    }

    /// Clip-stream analogue of [`alloc_draw_command`](Self::alloc_draw_command).
    /// Consecutive clip meshes always merge unless forced apart.
    pub fn alloc_clip_command(
        &mut self,
        num_vertices: u32,
        num_indices: u32,
        scissor: [u16; 4],
    ) -> usize {
        let (vertex_buffer_id, first_vertex) = self.alloc_vertices(num_vertices);
        let first_index = self.alloc_indices(num_indices);

        if !self.force_new_clip_command {
            if let Some(prev) = self.clip_commands.last() {
                debug_assert_eq!(prev.vertex_buffer_id, vertex_buffer_id);
                debug_assert_eq!(prev.scissor, scissor);
                debug_assert_eq!(prev.cmd_type, DrawCommandType::Clip);
                return self.clip_commands.len() - 1;
            }
        }

        self.clip_commands.push(DrawCommand {
            cmd_type: DrawCommandType::Clip,
            clip: ClipState::default(),
            vertex_buffer_id,
            first_vertex,
            first_index,
            num_vertices: 0,
            num_indices: 0,
            scissor,
            handle: INVALID_ID,
        });
        self.force_new_clip_command = false;
        self.clip_commands.len() - 1
    }

    /// Appends a mesh into a draw batch. `colors` of length 1 broadcast;
    /// otherwise the length must equal the vertex count.
    pub fn emit_draw(
        &mut self,
        cmd_type: DrawCommandType,
        handle: u16,
        scissor: [u16; 4],
        positions: &[f32],
        uvs: UvSource<'_>,
        colors: &[u32],
        indices: &[u16],
    ) {
        let num_vertices = (positions.len() / 2) as u32;
        let num_indices = indices.len() as u32;
        let cmd_idx = self.alloc_draw_command(num_vertices, num_indices, cmd_type, handle, scissor);
        let cmd = self.draw_commands[cmd_idx];

        let vb = &mut self.vertex_buffers[cmd.vertex_buffer_id as usize];
        vb.positions.extend_from_slice(positions);
        match uvs {
            UvSource::White => {
                let white = self.white_uv;
                for _ in 0..num_vertices {
                    vb.uvs.extend_from_slice(&white);
                }
            }
            UvSource::Slice(src) => {
                debug_assert_eq!(src.len(), positions.len());
                vb.uvs.extend_from_slice(src);
            }
        }
        if colors.len() == num_vertices as usize {
            vb.colors.extend_from_slice(colors);
        } else {
            debug_assert_eq!(colors.len(), 1, "invalid color array size");
            vb.colors
                .extend(std::iter::repeat(colors.first().copied().unwrap_or(0)).take(num_vertices as usize));
        }

        let base = cmd.num_vertices as u16;
        self.indices.extend(indices.iter().map(|i| i + base));

        let cmd = &mut self.draw_commands[cmd_idx];
        cmd.num_vertices += num_vertices;
        cmd.num_indices += num_indices;
    }

    /// Appends a mesh into the clip stream. Clip passes bind only positions,
    /// but the parallel streams stay dense for upload.
    pub fn emit_clip(&mut self, scissor: [u16; 4], positions: &[f32], indices: &[u16]) {
        let num_vertices = (positions.len() / 2) as u32;
        let num_indices = indices.len() as u32;
        let cmd_idx = self.alloc_clip_command(num_vertices, num_indices, scissor);
        let cmd = self.clip_commands[cmd_idx];

        let vb = &mut self.vertex_buffers[cmd.vertex_buffer_id as usize];
        vb.positions.extend_from_slice(positions);
        let white = self.white_uv;
        for _ in 0..num_vertices {
            vb.uvs.extend_from_slice(&white);
        }
        vb.colors
            .extend(std::iter::repeat(0u32).take(num_vertices as usize));

        let base = cmd.num_vertices as u16;
        self.indices.extend(indices.iter().map(|i| i + base));

        let cmd = &mut self.clip_commands[cmd_idx];
        cmd.num_vertices += num_vertices;
        cmd.num_indices += num_indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCISSOR: [u16; 4] = [0, 0, 100, 100];

    fn quad_positions() -> Vec<f32> {
        vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]
    }

    const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

    #[test]
    fn adjacent_compatible_meshes_merge() {
        let mut batcher = Batcher::new(1024);
        batcher.begin_frame();
        for _ in 0..2 {
            batcher.emit_draw(
                DrawCommandType::Textured,
                0,
                SCISSOR,
                &quad_positions(),
                UvSource::White,
                &[0xFFFF_FFFF],
                &QUAD_INDICES,
            );
        }
        assert_eq!(batcher.draw_commands.len(), 1);
        let cmd = &batcher.draw_commands[0];
        assert_eq!(cmd.num_vertices, 8);
        assert_eq!(cmd.num_indices, 12);
        // Second quad's indices are rebased onto the batch range.
        assert_eq!(&batcher.indices[6..9], &[4, 5, 6]);
    }

    #[test]
    fn differing_handles_split_batches() {
        let mut batcher = Batcher::new(1024);
        batcher.begin_frame();
        for handle in [0u16, 1u16] {
            batcher.emit_draw(
                DrawCommandType::Textured,
                handle,
                SCISSOR,
                &quad_positions(),
                UvSource::White,
                &[0xFFFF_FFFF],
                &QUAD_INDICES,
            );
        }
        assert_eq!(batcher.draw_commands.len(), 2);
        assert_eq!(batcher.draw_commands[1].first_vertex, 4);
        assert_eq!(batcher.draw_commands[1].first_index, 6);
    }

    #[test]
    fn vertex_buffer_overflow_rotates_buffers() {
        let mut batcher = Batcher::new(6);
        batcher.begin_frame();
        for _ in 0..2 {
            batcher.emit_draw(
                DrawCommandType::Textured,
                0,
                SCISSOR,
                &quad_positions(),
                UvSource::White,
                &[0xFFFF_FFFF],
                &QUAD_INDICES,
            );
        }
        assert_eq!(batcher.vertex_buffers.len(), 2);
        assert_eq!(batcher.draw_commands.len(), 2);
        assert_eq!(batcher.draw_commands[0].vertex_buffer_id, 0);
        assert_eq!(batcher.draw_commands[1].vertex_buffer_id, 1);
        assert_eq!(batcher.draw_commands[1].first_vertex, 0);
    }

    #[test]
    fn clip_meshes_always_merge_in_stream() {
        let mut batcher = Batcher::new(1024);
        batcher.begin_frame();
        batcher.force_new_clip_command = true;
        batcher.emit_clip(SCISSOR, &quad_positions(), &QUAD_INDICES);
        batcher.emit_clip(SCISSOR, &quad_positions(), &QUAD_INDICES);
        assert_eq!(batcher.clip_commands.len(), 1);
        assert_eq!(batcher.clip_commands[0].num_vertices, 8);
    }

    #[test]
    fn force_flag_splits_otherwise_identical_batches() {
        let mut batcher = Batcher::new(1024);
        batcher.begin_frame();
        batcher.emit_draw(
            DrawCommandType::Textured,
            0,
            SCISSOR,
            &quad_positions(),
            UvSource::White,
            &[1],
            &QUAD_INDICES,
        );
        batcher.force_new_draw_command = true;
        batcher.emit_draw(
            DrawCommandType::Textured,
            0,
            SCISSOR,
            &quad_positions(),
            UvSource::White,
            &[1],
            &QUAD_INDICES,
        );
        assert_eq!(batcher.draw_commands.len(), 2);
    }

    #[test]
    fn per_vertex_colors_must_match_count() {
        let mut batcher = Batcher::new(1024);
        batcher.begin_frame();
        let colors = vec![1, 2, 3, 4];
        batcher.emit_draw(
            DrawCommandType::Textured,
            0,
            SCISSOR,
            &quad_positions(),
            UvSource::White,
            &colors,
            &QUAD_INDICES,
        );
        let vb = &batcher.vertex_buffers[0];
        assert_eq!(&vb.colors[..], &[1, 2, 3, 4]);
    }
}
