// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend command stream.
//!
//! A frame's [`end`](crate::Context::end) produces a [`Recording`]: the
//! ordered list of buffer uploads, render-state changes and draw submissions
//! for an external engine to execute against its graphics API. Stream
//! uploads reference CPU memory through [`PooledStream`]s, which return
//! their storage to the context's pools when the engine drops them, possibly
//! from another thread.

use crate::handle::ImageHandle;
use crate::pool::PooledStream;

/// List of [`Command`]s for an engine to execute in order.
#[derive(Debug, Default)]
pub struct Recording {
    pub commands: Vec<Command>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: Command) {
        self.commands.push(cmd);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn append(&mut self, mut other: Self) {
        self.commands.append(&mut other.commands);
    }

    /// Returns a [`Vec`] containing all the [`Command`]s in order.
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// Shader program selector for a draw submission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Program {
    Textured,
    ColorGradient,
    ImagePattern,
    /// Stencil-write pass used for clip shapes; writes no color.
    Stencil,
}

/// Fixed-function stencil configuration of a draw submission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StencilMode {
    Disabled,
    /// Replace stencil contents with `reference` wherever the mesh covers.
    WriteReference(u8),
    /// Pass fragments whose stencil value equals `reference`.
    TestEqual(u8),
    /// Pass fragments whose stencil value differs from `reference`.
    TestNotEqual(u8),
}

/// Uniform data bound for a draw submission.
#[derive(Clone, Debug, PartialEq)]
pub enum Uniforms {
    None,
    Texture {
        image: ImageHandle,
    },
    Gradient {
        /// Paint matrix, 3×3 column-major.
        matrix: [f32; 9],
        /// `(extent_x, extent_y, radius, feather)`.
        params: [f32; 4],
        inner_color: [f32; 4],
        outer_color: [f32; 4],
    },
    ImagePattern {
        matrix: [f32; 9],
        image: ImageHandle,
    },
}

/// Single command inside a [`Recording`] to get executed by an engine.
#[derive(Debug)]
pub enum Command {
    /// Upload a position stream (`f32` x,y pairs) into the dynamic vertex
    /// buffer set `buffer`.
    UpdatePositionStream {
        buffer: u32,
        data: PooledStream<f32>,
    },
    /// Upload a UV stream (`f32` pairs) into vertex buffer set `buffer`.
    UpdateUvStream {
        buffer: u32,
        data: PooledStream<f32>,
    },
    /// Upload a packed RGBA8 color stream into vertex buffer set `buffer`.
    UpdateColorStream {
        buffer: u32,
        data: PooledStream<u32>,
    },
    /// Upload 16-bit indices into the dynamic index buffer `buffer`.
    UpdateIndexBuffer {
        buffer: u32,
        data: PooledStream<u16>,
    },
    /// Create a texture for `image`. Issued once per image, before any use.
    CreateImage {
        image: ImageHandle,
        width: u16,
        height: u16,
        flags: u32,
    },
    /// Upload RGBA8 `data` into the `rect = (x, y, w, h)` region of `image`.
    UpdateImage {
        image: ImageHandle,
        rect: [u16; 4],
        data: Vec<u8>,
    },
    DestroyImage {
        image: ImageHandle,
    },
    /// Bind an orthographic projection `[0, width] × [height, 0]` for `view`.
    SetViewTransform {
        view: u16,
        width: f32,
        height: f32,
    },
    /// Set the fixed-function scissor rect in device pixels.
    SetScissor {
        rect: [u16; 4],
    },
    /// Submit an indexed draw. Blending is premultiplied-alpha over; color
    /// writes are disabled for stencil passes.
    Draw {
        view: u16,
        program: Program,
        vertex_buffer: u32,
        index_buffer: u32,
        first_vertex: u32,
        num_vertices: u32,
        first_index: u32,
        num_indices: u32,
        uniforms: Uniforms,
        stencil: StencilMode,
        write_color: bool,
    },
}

static_assertions::assert_impl_all!(Recording: Send);
