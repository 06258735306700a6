// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame submission.
//!
//! `end` turns the frame's batches into a backend [`Recording`]: stream and
//! index uploads first, then the ordered draw walk. Whenever a draw
//! command's clip run differs from the previous one, the referenced clip
//! commands are re-emitted as stencil write passes under a fresh monotonic
//! reference value, and the draw pass tests against it per the clip rule.
//! Scissor changes are de-duplicated against the previously emitted rect.

use crate::batch::{DrawCommand, DrawCommandType, INVALID_CLIP_CMD};
use crate::handle::{ImageHandle, INVALID_ID};
use crate::pool::PooledStream;
use crate::recording::{Command, Program, Recording, StencilMode, Uniforms};
use crate::Context;

/// Stencil-based clipping supports at most this many regions per frame;
/// beyond it, reference values wrap and results are undefined.
const MAX_CLIP_REGIONS: u32 = 254;

struct SubmitState {
    prev_scissor: [u16; 4],
    device_pixel_ratio: f32,
}

impl SubmitState {
    /// Emits a scissor change if `rect` differs from the current one.
    fn set_scissor(&mut self, recording: &mut Recording, rect: [u16; 4]) {
        if rect == self.prev_scissor {
            return;
        }
        self.prev_scissor = rect;
        let dpr = self.device_pixel_ratio;
        let scaled = rect.map(|v| (v as f32 * dpr) as u16);
        recording.push(Command::SetScissor { rect: scaled });
    }
}

impl Context {
    /// Finishes the frame and returns the backend command stream.
    ///
    /// The context stays usable for another `begin`; call
    /// [`frame`](Self::frame) once the engine has consumed the recordings
    /// of every view rendered this frame.
    pub fn end(&mut self) -> Recording {
        debug_assert!(
            !self.batcher.record_clip_commands,
            "end_clip missing before end"
        );

        // Image creates/updates issued since the last end go first so draw
        // passes can reference them.
        let mut recording = self.drain_resources();

        let num_draw_commands = self.batcher.draw_commands.len();
        if num_draw_commands == 0 {
            self.set_frame_stats(0, 0, 0);
            self.batcher.discard_frame();
            return recording;
        }

        if let Some(update) = self.font_system_flush() {
            recording.push(update);
        }

        let (pos_pool, uv_pool, color_pool, index_pool) = self.batcher.pools();

        // Upload every vertex buffer touched this frame; the engine owns the
        // CPU slabs until its uploads complete.
        let first_vb = self.batcher.first_vertex_buffer;
        let num_vbs = self.batcher.vertex_buffers.len() - first_vb;
        for (i, vb) in self.batcher.vertex_buffers[first_vb..].iter_mut().enumerate() {
            let buffer = (first_vb + i) as u32;
            debug_assert_eq!(vb.positions.len(), vb.count as usize * 2);
            debug_assert_eq!(vb.uvs.len(), vb.count as usize * 2);
            debug_assert_eq!(vb.colors.len(), vb.count as usize);
            recording.push(Command::UpdatePositionStream {
                buffer,
                data: PooledStream::new(std::mem::take(&mut vb.positions), pos_pool.clone()),
            });
            recording.push(Command::UpdateUvStream {
                buffer,
                data: PooledStream::new(std::mem::take(&mut vb.uvs), uv_pool.clone()),
            });
            recording.push(Command::UpdateColorStream {
                buffer,
                data: PooledStream::new(std::mem::take(&mut vb.colors), color_pool.clone()),
            });
        }

        let index_buffer = self.batcher.index_buffer_id;
        recording.push(Command::UpdateIndexBuffer {
            buffer: index_buffer,
            data: PooledStream::new(std::mem::take(&mut self.batcher.indices), index_pool),
        });

        let view = self.view_id;
        recording.push(Command::SetViewTransform {
            view,
            width: self.canvas_width as f32,
            height: self.canvas_height as f32,
        });

        let mut submit = SubmitState {
            prev_scissor: [0, 0, self.canvas_width, self.canvas_height],
            device_pixel_ratio: self.device_pixel_ratio,
        };

        let mut prev_clip_cmd_id = u32::MAX;
        let mut stencil = StencilMode::Disabled;
        let mut next_stencil_value: u32 = 1;

        for i in 0..num_draw_commands {
            let cmd = self.batcher.draw_commands[i];

            if cmd.clip.first_cmd_id != prev_clip_cmd_id {
                prev_clip_cmd_id = cmd.clip.first_cmd_id;
                if cmd.clip.num_cmds != 0 && cmd.clip.first_cmd_id != INVALID_CLIP_CMD {
                    debug_assert!(
                        next_stencil_value <= MAX_CLIP_REGIONS,
                        "stencil clip regions exhausted"
                    );
                    let reference = next_stencil_value as u8;
                    for clip_idx in 0..cmd.clip.num_cmds {
                        let id = (cmd.clip.first_cmd_id + clip_idx) as usize;
                        debug_assert!(id < self.batcher.clip_commands.len());
                        let clip_cmd = self.batcher.clip_commands[id];
                        debug_assert_eq!(clip_cmd.cmd_type, DrawCommandType::Clip);
                        debug_assert_eq!(clip_cmd.handle, INVALID_ID);

                        submit.set_scissor(&mut recording, clip_cmd.scissor);
                        recording.push(draw_pass(
                            view,
                            index_buffer,
                            &clip_cmd,
                            Program::Stencil,
                            Uniforms::None,
                            StencilMode::WriteReference(reference),
                            false,
                        ));
                    }
                    stencil = match cmd.clip.rule {
                        crate::ClipRule::In => StencilMode::TestEqual(reference),
                        crate::ClipRule::Out => StencilMode::TestNotEqual(reference),
                    };
                    next_stencil_value += 1;
                } else {
                    stencil = StencilMode::Disabled;
                }
            }

            submit.set_scissor(&mut recording, cmd.scissor);

            let pass = match cmd.cmd_type {
                DrawCommandType::Textured => {
                    debug_assert!(cmd.handle != INVALID_ID, "invalid image handle");
                    let image = ImageHandle::new(cmd.handle);
                    if !self.is_image_valid(image) {
                        log::error!("draw command references a dead image; skipping");
                        continue;
                    }
                    draw_pass(
                        view,
                        index_buffer,
                        &cmd,
                        Program::Textured,
                        Uniforms::Texture { image },
                        stencil,
                        true,
                    )
                }
                DrawCommandType::ColorGradient => {
                    let Some(gradient) = self
                        .paints
                        .gradient(crate::GradientHandle::global(cmd.handle))
                    else {
                        debug_assert!(false, "invalid gradient handle");
                        log::error!("draw command references a dead gradient; skipping");
                        continue;
                    };
                    draw_pass(
                        view,
                        index_buffer,
                        &cmd,
                        Program::ColorGradient,
                        Uniforms::Gradient {
                            matrix: gradient.matrix,
                            params: gradient.params,
                            inner_color: gradient.inner_color,
                            outer_color: gradient.outer_color,
                        },
                        stencil,
                        true,
                    )
                }
                DrawCommandType::ImagePattern => {
                    let Some(pattern) = self
                        .paints
                        .image_pattern(crate::ImagePatternHandle::global(cmd.handle))
                    else {
                        debug_assert!(false, "invalid image pattern handle");
                        log::error!("draw command references a dead pattern; skipping");
                        continue;
                    };
                    debug_assert!(self.is_image_valid(pattern.image), "pattern image died");
                    draw_pass(
                        view,
                        index_buffer,
                        &cmd,
                        Program::ImagePattern,
                        Uniforms::ImagePattern {
                            matrix: pattern.matrix,
                            image: pattern.image,
                        },
                        stencil,
                        true,
                    )
                }
                DrawCommandType::Clip => {
                    debug_assert!(false, "clip command in the draw stream");
                    continue;
                }
            };
            recording.push(pass);
        }

        self.set_frame_stats(
            num_draw_commands as u32,
            self.batcher.clip_commands.len() as u32,
            num_vbs as u32,
        );

        recording
    }

    fn font_system_flush(&mut self) -> Option<Command> {
        let update = self.flush_font_atlas()?;
        Some(Command::UpdateImage {
            image: self.font_atlas_image(),
            rect: update.rect,
            data: update.data,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_pass(
    view: u16,
    index_buffer: u32,
    cmd: &DrawCommand,
    program: Program,
    uniforms: Uniforms,
    stencil: StencilMode,
    write_color: bool,
) -> Command {
    Command::Draw {
        view,
        program,
        vertex_buffer: cmd.vertex_buffer_id,
        index_buffer,
        first_vertex: cmd.first_vertex,
        num_vertices: cmd.num_vertices,
        first_index: cmd.first_index,
        num_indices: cmd.num_indices,
        uniforms,
        stencil,
        write_color,
    }
}
