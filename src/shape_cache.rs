// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-command-list shape cache.
//!
//! A cacheable command list remembers the meshes its stroker commands
//! produced, keyed by the average transform scale at build time. Mesh
//! positions are stored in the local frame of the recording-time transform
//! (by applying its inverse), so replay at the same scale only has to
//! re-transform positions by the current state matrix and push them through
//! the batch assembler; path construction and the stroker are skipped
//! entirely.

use crate::math::{self, Transform};

pub(crate) struct CachedMesh {
    pub positions: Vec<f32>,
    /// Present iff the source mesh carried per-vertex colors (AA meshes).
    pub colors: Option<Vec<u32>>,
    pub indices: Vec<u16>,
}

pub(crate) struct CachedCommand {
    pub first_mesh: u16,
    pub num_meshes: u16,
    /// Inverse of the state transform when the stroker command started.
    pub inverse_transform: Transform,
}

#[derive(Default)]
pub(crate) struct ShapeCache {
    pub meshes: Vec<CachedMesh>,
    pub commands: Vec<CachedCommand>,
    pub avg_scale: f32,
    pub built: bool,
}

impl ShapeCache {
    pub fn reset(&mut self) {
        self.meshes.clear();
        self.commands.clear();
        self.avg_scale = 0.0;
        self.built = false;
    }

    pub fn is_valid_for(&self, avg_scale: f32) -> bool {
        self.built && self.avg_scale == avg_scale
    }
}

/// Stack of caches bound during command-list playback.
///
/// Every submit pushes an entry (`None` for non-cacheable lists) so that
/// nested submissions record into their own cache, or none, rather than the
/// parent's.
#[derive(Default)]
pub(crate) struct CacheStack(Vec<Option<ShapeCache>>);

impl CacheStack {
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn push(&mut self, cache: Option<ShapeCache>) {
        self.0.push(cache);
    }

    pub fn pop(&mut self) -> Option<ShapeCache> {
        debug_assert!(!self.0.is_empty(), "cache stack underflow");
        self.0.pop().flatten()
    }

    /// Whether the innermost playback is building a cache.
    pub fn is_recording(&self) -> bool {
        matches!(self.0.last(), Some(Some(_)))
    }

    /// Starts a cached command, capturing the inverse of `transform`.
    pub fn begin_command(&mut self, transform: &Transform) {
        if let Some(Some(cache)) = self.0.last_mut() {
            cache.commands.push(CachedCommand {
                first_mesh: cache.meshes.len() as u16,
                num_meshes: 0,
                inverse_transform: transform.inverse(),
            });
        }
    }

    /// Commits the mesh range of the current cached command.
    pub fn end_command(&mut self) {
        if let Some(Some(cache)) = self.0.last_mut() {
            let num_meshes = cache.meshes.len() as u16;
            if let Some(cmd) = cache.commands.last_mut() {
                debug_assert_eq!(cmd.num_meshes, 0, "cached command ended twice");
                cmd.num_meshes = num_meshes - cmd.first_mesh;
            }
        }
    }

    /// Records one stroker output mesh, translated into the local frame of
    /// the current cached command. `colors` of length 1 are a broadcast and
    /// are not stored.
    pub fn add_mesh(&mut self, positions: &[f32], colors: &[u32], indices: &[u16]) {
        if let Some(Some(cache)) = self.0.last_mut() {
            let Some(cmd) = cache.commands.last() else {
                debug_assert!(false, "add_mesh outside a cached command");
                return;
            };
            let mut local = Vec::new();
            math::transform_positions(&cmd.inverse_transform, positions, &mut local);
            let num_vertices = positions.len() / 2;
            let colors = if colors.len() == num_vertices {
                Some(colors.to_vec())
            } else {
                debug_assert!(colors.len() <= 1, "invalid cached color array size");
                None
            };
            cache.meshes.push(CachedMesh {
                positions: local,
                colors,
                indices: indices.to_vec(),
            });
        }
    }
}
