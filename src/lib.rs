// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vellum is a batched 2D vector graphics renderer.
//!
//! A [`Context`] translates a path-centric drawing API (moves, lines,
//! curves, shape primitives, fills, strokes, gradients, image patterns,
//! scissoring, stencil clipping, transforms and text) into the smallest
//! number of compatible draw batches over shared vertex/index buffers. A
//! frame ends in a [`Recording`]: a declarative command stream a low-level
//! graphics engine executes.
//!
//! Drawing calls can also be recorded into a replayable [command
//! list](Context::create_command_list), a compact bytecode with its own
//! paint handles. Cacheable lists additionally memoize their tessellated
//! meshes per zoom level, so replaying at an unchanged scale skips the
//! stroker entirely.
//!
//! ```
//! use vellum::{Context, ContextConfig, FillFlags};
//! use vellum::peniko::color::palette;
//!
//! let mut ctx = Context::new(ContextConfig::default())?;
//! ctx.begin(0, 640, 480, 1.0);
//! ctx.begin_path();
//! ctx.rounded_rect(10.0, 10.0, 200.0, 100.0, 8.0);
//! ctx.fill_path(palette::css::REBECCA_PURPLE, FillFlags::CONVEX_AA);
//! let recording = ctx.end();
//! // hand `recording` to the engine, then:
//! ctx.frame();
//! # Ok::<(), vellum::Error>(())
//! ```

#![warn(clippy::doc_markdown, clippy::semicolon_if_nothing_returned)]

mod batch;
mod command_list;
mod context;
mod handle;
mod math;
mod paint;
mod player;
mod pool;
mod recording;
mod render;
mod shape_cache;
mod state;

pub mod flags;
pub mod font;
pub mod path;
pub mod stroker;

/// Styling and color primitives.
pub use peniko;
/// 2D geometry, with a focus on curves.
pub use peniko::kurbo;

use thiserror::Error;

pub use batch::{ClipState, DrawCommand, DrawCommandType};
pub use command_list::CommandListRecorder;
pub use context::{image_flags, Context, ContextConfig, Stats};
pub use flags::{
    ClipRule, CommandListFlags, FillFlags, FillRule, LineCap, LineJoin, PathType, StrokeFlags,
    TextAlign, TextAlignHor, TextAlignVer, TransformOrder, Winding,
};
pub use handle::{
    CommandListHandle, FontHandle, GradientHandle, ImageHandle, ImagePatternHandle, INVALID_ID,
};
pub use math::Transform;
pub use pool::PooledStream;
pub use recording::{Command, Program, Recording, StencilMode, Uniforms};

/// Errors surfaced while constructing a context.
///
/// Runtime drawing failures never raise: they degrade to skipped geometry
/// (see the crate docs on failure semantics).
#[derive(Error, Debug)]
pub enum Error {
    /// Vertex buffers are indexed with `u16`, capping their capacity.
    #[error("vertex buffers cannot hold more than 65536 vertices, got {0}")]
    VertexBufferTooLarge(u32),
    #[error("configuration value `{0}` is out of range")]
    InvalidConfig(&'static str),
}
