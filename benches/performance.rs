// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for onair
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Timeline generation for growing rundowns
//! - Take throughput including continuity updates
//! - Ingest diffing of a reloaded show

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use onair::build;
use onair::rundown::{diff_segments, Part, Piece, PieceLifespan, Rundown, Segment};
use onair::studio::{LookaheadMode, Studio, StudioLayer};
use onair::timeline::TimelineObject;

fn studio() -> Studio {
    Studio::new("bench")
        .with_layer(StudioLayer::new("camera", LookaheadMode::WhenClear).with_amount(2))
        .with_layer(StudioLayer::new("graphics", LookaheadMode::Preload))
}

/// `segments` segments of four parts, each part with camera and graphics pieces
fn rundown(segments: usize) -> Rundown {
    let mut rundown = Rundown::new("bench", "Bench");
    for s in 0..segments {
        let mut segment = Segment::new(format!("s{}", s), s as f64);
        for p in 0..4 {
            let id = format!("s{}p{}", s, p);
            let mut part = Part::new(&id, p as f64)
                .with_piece(
                    Piece::new(format!("{}_cam", id), "camera")
                        .with_pre_roll(40)
                        .with_object(TimelineObject::new(format!("{}_cam_obj", id), "camera")),
                )
                .with_piece(
                    Piece::new(format!("{}_gfx", id), "graphics")
                        .with_start(500)
                        .with_duration(4_000)
                        .with_object(TimelineObject::new(format!("{}_gfx_obj", id), "graphics")),
                );
            if p == 0 {
                part = part.with_piece(
                    Piece::new(format!("{}_bed", id), "audio")
                        .with_lifespan(PieceLifespan::SpanningUntilSegmentEnd),
                );
            }
            segment = segment.with_part(part);
        }
        rundown = rundown.with_segment(segment);
    }
    rundown
}

/// Active rundown taken `takes` times
fn on_air(segments: usize, takes: u64) -> Rundown {
    let mut rundown = rundown(segments);
    let _ = rundown.activate();
    for at in 1..=takes {
        let _ = rundown.take_next_at(at * 1_000);
    }
    rundown
}

/// Benchmark timeline generation (the per-take hot path)
fn bench_timeline_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_build");
    let studio = studio();

    for segments in [5, 50, 500].iter() {
        let rundown = on_air(*segments, 6);
        group.bench_with_input(BenchmarkId::from_parameter(segments), &rundown, |b, rundown| {
            b.iter(|| black_box(build(rundown, Some(&studio))))
        });
    }

    group.finish();
}

/// Benchmark take including cursor advance and continuity
fn bench_take(c: &mut Criterion) {
    let mut group = c.benchmark_group("take_next");

    for segments in [5, 50].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(segments), segments, |b, &segments| {
            b.iter_batched(
                || on_air(segments, 2),
                |mut rundown| {
                    black_box(rundown.take_next_at(100_000)).ok();
                    rundown
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark a full pass through a show
fn bench_full_show(c: &mut Criterion) {
    c.bench_function("full_show_20_segments", |b| {
        b.iter_batched(
            || {
                let mut rundown = rundown(20);
                let _ = rundown.activate();
                rundown
            },
            |mut rundown| {
                for at in 1..=80u64 {
                    let _ = rundown.take_next_at(at * 1_000);
                }
                black_box(rundown.history().len())
            },
            BatchSize::SmallInput,
        )
    });
}

/// Benchmark diffing a reloaded show against live segments
fn bench_ingest_diff(c: &mut Criterion) {
    let live = on_air(100, 10);
    let mut incoming = rundown(100).segments().to_vec();
    incoming.retain(|s| s.id() != "s50");

    c.bench_function("diff_segments_100", |b| {
        b.iter(|| black_box(diff_segments(live.segments(), &incoming)))
    });
}

criterion_group!(
    benches,
    bench_timeline_build,
    bench_take,
    bench_full_show,
    bench_ingest_diff,
);

criterion_main!(benches);
