//! Benchmarks for configuration resolution.
//!
//! Measures layered override application: builtin defaults overlaid with
//! topic-file, CLI, and request layers, re-validated after every override.
//!
//! Run with: `cargo bench --bench resolve_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use showrun::{ConfigTree, Override};

// ---------------------------------------------------------------------------
// Override datasets
// ---------------------------------------------------------------------------

/// Typical per-topic tweaks, the shape a topic file carries.
const TOPIC_LAYER: &[&str] = &[
    "script.persona=news_anchor",
    "script.target_minutes=10",
    "video.style=minimal_white",
];

/// Operator tweaks passed as repeated `--set` flags.
const CLI_LAYER: &[&str] = &[
    "search.max_results=5",
    "voice.settings.speed=1.25",
    "stages.video.timeout_seconds=300",
    "output.preset=slow",
];

/// Per-request body overrides on the REST boundary.
const REQUEST_LAYER: &[&str] = &[
    "quality_checks.min_visual_assets=5",
    "video.screenshot_seconds=6.5",
];

fn parse_layer(raw: &[&str]) -> Vec<Override> {
    raw.iter().map(|s| Override::parse(s).unwrap()).collect()
}

// ---------------------------------------------------------------------------
// Resolution benchmarks
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_resolve");
    let tree = ConfigTree::builtin();
    let topic = parse_layer(TOPIC_LAYER);
    let cli = parse_layer(CLI_LAYER);
    let request = parse_layer(REQUEST_LAYER);

    group.bench_function("defaults_only", |b| {
        b.iter(|| black_box(tree.resolve(&[], &[], &[]).unwrap()));
    });

    group.bench_function("one_layer", |b| {
        b.iter(|| black_box(tree.resolve(&[], black_box(&cli), &[]).unwrap()));
    });

    group.bench_function("three_layers", |b| {
        b.iter(|| {
            black_box(
                tree.resolve(black_box(&topic), black_box(&cli), black_box(&request)).unwrap(),
            )
        });
    });

    // Worst case for the error path: the first override already misses.
    group.bench_function("unknown_path_rejection", |b| {
        let bad = [Override::parse("video.stylo=minimal_white").unwrap()];
        b.iter(|| black_box(tree.resolve(&[], black_box(&bad), &[]).is_err()));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Override parsing benchmarks
// ---------------------------------------------------------------------------

fn bench_override_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("override_parse");

    group.bench_function("string_value", |b| {
        b.iter(|| black_box(Override::parse(black_box("video.style=minimal_white")).unwrap()));
    });

    group.bench_function("number_value", |b| {
        b.iter(|| black_box(Override::parse(black_box("script.target_minutes=10")).unwrap()));
    });

    group.bench_function("json_array_value", |b| {
        b.iter(|| {
            black_box(
                Override::parse(black_box("quality_checks.enabled=[\"script\",\"video\"]"))
                    .unwrap(),
            )
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Tree construction benchmarks
// ---------------------------------------------------------------------------

fn bench_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_tree");

    group.bench_function("builtin", |b| {
        b.iter(|| black_box(ConfigTree::builtin()));
    });

    // File overlay that extends the style table, the deep-merge slow path.
    let file = json!({
        "video": {
            "style": "bench_style",
            "styles": {
                "bench_style": {
                    "canvas": {"width": 1280, "height": 720},
                    "fps": 25,
                    "background": "#000000",
                    "accent": "#ff0055",
                    "font": "Inter"
                }
            }
        },
        "script": {"persona": "calm_explainer"}
    });

    group.bench_function("file_overlay", |b| {
        b.iter(|| black_box(ConfigTree::from_value(black_box(file.clone())).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_override_parse, bench_tree_construction);

criterion_main!(benches);
