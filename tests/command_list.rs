// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-list recording, playback, culling, recursion and shape caching.

mod common;

use common::{draw_commands, snapshot};
use vellum::peniko::color::palette;
use vellum::{
    CommandListFlags, Context, ContextConfig, FillFlags, Program, StrokeFlags, Uniforms,
};

fn context() -> Context {
    Context::new(ContextConfig::default()).unwrap()
}

#[test]
fn playback_matches_immediate_mode() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_path();
    rec.rect(10.0, 10.0, 20.0, 20.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let replayed = ctx.end();
    ctx.frame();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.rect(10.0, 10.0, 20.0, 20.0);
    ctx.fill_path(palette::css::RED, FillFlags::CONVEX);
    let immediate = ctx.end();

    assert_eq!(snapshot(&replayed), snapshot(&immediate));
}

#[test]
fn local_gradient_handles_are_remapped() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    let local = rec.create_radial_gradient(
        50.0,
        50.0,
        5.0,
        40.0,
        palette::css::LIME,
        palette::css::WHITE,
    );
    assert!(local.is_local());
    assert_eq!(local.id, 0);
    rec.begin_path();
    rec.rect(0.0, 0.0, 100.0, 100.0);
    rec.fill_path_gradient(local, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    // Occupy frame-global slot 0 so the list's gradient lands on slot 1.
    let frame_gradient = ctx.create_linear_gradient(
        0.0,
        0.0,
        10.0,
        0.0,
        palette::css::RED,
        palette::css::BLUE,
    );
    assert_eq!(frame_gradient.id, 0);
    ctx.submit_command_list(list);
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program, Program::ColorGradient);
    match &draws[0].uniforms {
        Uniforms::Gradient { inner_color, .. } => {
            assert_eq!(*inner_color, palette::css::LIME.components);
        }
        other => panic!("expected the list's gradient, got {other:?}"),
    }
}

#[test]
fn local_pattern_handles_are_remapped() {
    let mut ctx = context();
    let image = ctx.create_image(4, 4, 0, None);

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    let local = rec.create_image_pattern(0.0, 0.0, 4.0, 4.0, 0.0, image);
    assert!(local.is_local());
    rec.begin_path();
    rec.rect(0.0, 0.0, 50.0, 50.0);
    rec.fill_path_image_pattern(local, palette::css::WHITE, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program, Program::ImagePattern);
    match &draws[0].uniforms {
        Uniforms::ImagePattern { image: bound, .. } => assert_eq!(*bound, image),
        other => panic!("expected the list's pattern, got {other:?}"),
    }
}

#[test]
fn empty_scissor_culls_stroker_commands() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::ALLOW_COMMAND_CULLING);
    let mut rec = ctx.record(list).unwrap();
    rec.set_scissor(0.0, 0.0, 0.0, 0.0);
    rec.begin_path();
    rec.rect(0.0, 0.0, 50.0, 50.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();
    assert!(draw_commands(&recording).is_empty());
}

#[test]
fn reset_scissor_clears_the_cull_state() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::ALLOW_COMMAND_CULLING);
    let mut rec = ctx.record(list).unwrap();
    rec.set_scissor(0.0, 0.0, 0.0, 0.0);
    rec.begin_path();
    rec.rect(0.0, 0.0, 50.0, 50.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    rec.reset_scissor();
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();

    // Path construction still ran while culled, so the second fill sees
    // the rect.
    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].num_vertices, 4);
}

#[test]
fn culling_is_inert_without_the_flag() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.set_scissor(0.0, 0.0, 0.0, 0.0);
    rec.begin_path();
    rec.rect(0.0, 0.0, 50.0, 50.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();
    assert_eq!(draw_commands(&recording).len(), 1);
}

#[test]
fn recursion_stops_at_the_depth_limit() {
    let config = ContextConfig {
        max_command_list_depth: 4,
        ..ContextConfig::default()
    };
    let mut ctx = Context::new(config).unwrap();

    let lists: Vec<_> = (0..6)
        .map(|_| ctx.create_command_list(CommandListFlags::NONE))
        .collect();
    for (i, list) in lists.iter().enumerate() {
        let mut rec = ctx.record(*list).unwrap();
        rec.begin_path();
        rec.rect(0.0, 0.0, 10.0, 10.0);
        rec.fill_path(palette::css::RED, FillFlags::CONVEX);
        if let Some(child) = lists.get(i + 1) {
            rec.submit_command_list(*child);
        }
    }

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(lists[0]);
    let recording = ctx.end();

    // Lists 0..4 ran; the fifth submission hit the limit and was dropped.
    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].num_vertices, 16);
}

#[test]
fn playback_preserves_caller_state() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.transform_translate(40.0, 40.0);
    rec.set_scissor(10.0, 10.0, 20.0, 20.0);
    rec.begin_path();
    rec.rect(0.0, 0.0, 5.0, 5.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    let transform_before = ctx.transform();
    let scissor_before = ctx.scissor();
    ctx.submit_command_list(list);
    assert_eq!(ctx.transform(), transform_before);
    assert_eq!(ctx.scissor(), scissor_before);
    let _ = ctx.end();
}

#[test]
fn nested_lists_play_inline() {
    let mut ctx = context();

    let child = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(child).unwrap();
    rec.begin_path();
    rec.rect(50.0, 50.0, 10.0, 10.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    let parent = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(parent).unwrap();
    rec.begin_path();
    rec.rect(0.0, 0.0, 10.0, 10.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    rec.submit_command_list(child);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(parent);
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].num_vertices, 8);
}

#[test]
fn shape_cache_replay_is_identical_at_same_scale() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::CACHEABLE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_path();
    rec.circle(50.0, 50.0, 10.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX_AA);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let first = ctx.end();
    ctx.frame();

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let second = ctx.end();

    assert_eq!(snapshot(&first), snapshot(&second));
}

#[test]
fn shape_cache_retransforms_under_translation() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::CACHEABLE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_path();
    rec.rect(0.0, 0.0, 10.0, 10.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let built = ctx.end();
    ctx.frame();

    // Translation keeps the average scale, so the cache is replayed with
    // re-transformed positions.
    ctx.begin(0, 100, 100, 1.0);
    ctx.transform_translate(30.0, 20.0);
    ctx.submit_command_list(list);
    let replayed = ctx.end();

    let base = common::position_stream(&built);
    let moved = common::position_stream(&replayed);
    assert_eq!(base.len(), moved.len());
    for (b, m) in base.chunks_exact(2).zip(moved.chunks_exact(2)) {
        assert!((b[0] + 30.0 - m[0]).abs() < 1e-3);
        assert!((b[1] + 20.0 - m[1]).abs() < 1e-3);
    }
}

#[test]
fn shape_cache_rebuilds_on_scale_change() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::CACHEABLE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_path();
    rec.circle(20.0, 20.0, 10.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.begin(0, 200, 200, 1.0);
    ctx.submit_command_list(list);
    let at_scale_1 = ctx.end();
    ctx.frame();

    ctx.begin(0, 200, 200, 1.0);
    ctx.transform_scale(4.0, 4.0);
    ctx.submit_command_list(list);
    let at_scale_4 = ctx.end();
    ctx.frame();

    ctx.begin(0, 200, 200, 1.0);
    ctx.transform_scale(4.0, 4.0);
    ctx.submit_command_list(list);
    let at_scale_4_again = ctx.end();

    // Scale change re-tessellates at a finer tolerance...
    let coarse = draw_commands(&at_scale_1)[0].num_vertices;
    let fine = draw_commands(&at_scale_4)[0].num_vertices;
    assert!(fine > coarse);
    // ...and the rebuilt cache replays identically afterwards.
    assert_eq!(snapshot(&at_scale_4), snapshot(&at_scale_4_again));
}

#[test]
fn reset_command_list_clears_recording() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_path();
    rec.rect(0.0, 0.0, 10.0, 10.0);
    rec.fill_path(palette::css::RED, FillFlags::CONVEX);
    drop(rec);

    ctx.reset_command_list(list);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();
    assert!(draw_commands(&recording).is_empty());
}

#[test]
fn destroyed_lists_are_invalid() {
    let mut ctx = context();
    let list = ctx.create_command_list(CommandListFlags::NONE);
    assert!(ctx.is_command_list_valid(list));
    ctx.destroy_command_list(list);
    assert!(!ctx.is_command_list_valid(list));
}

#[test]
fn recorded_strokes_replay_like_immediate_strokes() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_path();
    rec.move_to(10.0, 10.0);
    rec.line_to(90.0, 10.0);
    rec.line_to(90.0, 90.0);
    rec.stroke_path(palette::css::BLUE, 3.0, StrokeFlags::BUTT_MITER_AA);
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let replayed = ctx.end();
    ctx.frame();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.move_to(10.0, 10.0);
    ctx.line_to(90.0, 10.0);
    ctx.line_to(90.0, 90.0);
    ctx.stroke_path(palette::css::BLUE, 3.0, StrokeFlags::BUTT_MITER_AA);
    let immediate = ctx.end();

    assert_eq!(snapshot(&replayed), snapshot(&immediate));
}

#[test]
fn recorded_clips_replay_with_stencil() {
    let mut ctx = context();

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.begin_clip(vellum::ClipRule::In);
    rec.begin_path();
    rec.rect(0.0, 0.0, 50.0, 50.0);
    rec.fill_path(palette::css::WHITE, FillFlags::CONVEX);
    rec.end_clip();
    rec.begin_path();
    rec.rect(25.0, 25.0, 50.0, 50.0);
    rec.fill_path(palette::css::BLUE, FillFlags::CONVEX);
    rec.reset_clip();
    drop(rec);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].program, Program::Stencil);
    assert_eq!(draws[1].stencil, vellum::StencilMode::TestEqual(1));
}
