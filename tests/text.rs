// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text batching through the font-system contract.

mod common;

use common::{draw_commands, StubFontSystem};
use vellum::peniko::color::palette;
use vellum::font::TextConfig;
use vellum::{Command, CommandListFlags, Context, ContextConfig, Program, TextAlign, Uniforms};

fn text_context() -> Context {
    Context::with_font_system(ContextConfig::default(), Box::new(StubFontSystem::new())).unwrap()
}

fn config(ctx: &Context) -> TextConfig {
    TextConfig::new(
        ctx.find_font("stub"),
        16.0,
        TextAlign::default(),
        palette::css::WHITE,
    )
}

#[test]
fn text_batches_quads_against_the_atlas() {
    let mut ctx = text_context();
    ctx.begin(0, 200, 100, 1.0);
    let cfg = config(&ctx);
    ctx.text(&cfg, 10.0, 20.0, "hello");
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program, Program::Textured);
    assert_eq!(draws[0].num_vertices, 5 * 4);
    assert_eq!(draws[0].num_indices, 5 * 6);
    match &draws[0].uniforms {
        Uniforms::Texture { image } => assert_eq!(*image, ctx.font_atlas_image()),
        other => panic!("expected the atlas texture, got {other:?}"),
    }
}

#[test]
fn dirty_atlas_is_flushed_before_draws() {
    let mut ctx = text_context();
    ctx.begin(0, 200, 100, 1.0);
    let cfg = config(&ctx);
    ctx.text(&cfg, 10.0, 20.0, "x");
    let recording = ctx.end();

    let update_pos = recording.commands.iter().position(|c| {
        matches!(c, Command::UpdateImage { image, .. } if *image == ctx.font_atlas_image())
    });
    let draw_pos = recording
        .commands
        .iter()
        .position(|c| matches!(c, Command::Draw { .. }));
    assert!(update_pos.is_some());
    assert!(update_pos.unwrap() < draw_pos.unwrap());
}

#[test]
fn text_and_fills_share_a_batch() {
    let mut ctx = text_context();
    ctx.begin(0, 200, 100, 1.0);
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.fill_path(palette::css::RED, vellum::FillFlags::CONVEX);
    let cfg = config(&ctx);
    ctx.text(&cfg, 10.0, 20.0, "ab");
    let recording = ctx.end();

    // Solid fills sample the atlas white pixel, so a following text run
    // merges into the same textured batch.
    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].num_vertices, 4 + 2 * 4);
}

#[test]
fn transparent_text_is_dropped() {
    let mut ctx = text_context();
    ctx.begin(0, 200, 100, 1.0);
    let mut cfg = config(&ctx);
    cfg.color = vellum::peniko::Color::from_rgba8(255, 255, 255, 0);
    ctx.text(&cfg, 0.0, 0.0, "invisible");
    let recording = ctx.end();
    assert!(draw_commands(&recording).is_empty());
}

#[test]
fn text_box_breaks_rows() {
    let mut ctx = text_context();
    ctx.begin(0, 200, 100, 1.0);
    let cfg = config(&ctx);
    // 8 chars at advance 10 into a 40px box: 4 chars per row, 2 rows.
    ctx.text_box(&cfg, 0.0, 0.0, 40.0, "abcdefgh", 0);
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].num_vertices, 8 * 4);
}

#[test]
fn measure_text_reports_stub_metrics() {
    let mut ctx = text_context();
    ctx.begin(0, 200, 100, 1.0);
    let cfg = config(&ctx);
    let mut bounds = [0.0f32; 4];
    let width = ctx.measure_text(&cfg, 5.0, 7.0, "abcd", Some(&mut bounds));
    assert_eq!(width, 4.0 * StubFontSystem::ADVANCE);
    assert_eq!(bounds[0], 5.0);
    assert_eq!(bounds[1], 7.0);
    assert_eq!(bounds[3], 7.0 + StubFontSystem::LINE_HEIGHT);
    assert_eq!(ctx.text_line_height(&cfg), StubFontSystem::LINE_HEIGHT);
}

#[test]
fn recorded_text_replays_through_the_string_heap() {
    let mut ctx = text_context();
    let cfg = TextConfig::new(
        ctx.find_font("stub"),
        16.0,
        TextAlign::default(),
        palette::css::WHITE,
    );

    let list = ctx.create_command_list(CommandListFlags::NONE);
    let mut rec = ctx.record(list).unwrap();
    rec.text(&cfg, 10.0, 20.0, "abc");
    drop(rec);

    ctx.begin(0, 200, 100, 1.0);
    ctx.submit_command_list(list);
    let recording = ctx.end();

    let draws = draw_commands(&recording);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].num_vertices, 3 * 4);
}

#[test]
fn null_font_system_ignores_text() {
    let mut ctx = Context::new(ContextConfig::default()).unwrap();
    ctx.begin(0, 100, 100, 1.0);
    let cfg = TextConfig::new(
        vellum::FontHandle::INVALID,
        16.0,
        TextAlign::default(),
        palette::css::WHITE,
    );
    ctx.text(&cfg, 0.0, 0.0, "nothing");
    let recording = ctx.end();
    assert!(draw_commands(&recording).is_empty());
}
