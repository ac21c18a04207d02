//! Benchmarks for the wire codec and the pattern scanner.
//!
//! Covers the hot paths of a dispatch:
//! - Decoding an inbound push (nested messages, text, repeated fields)
//! - Re-encoding a decoded tree
//! - Running the scanner layers over a decoded message
//! - Rendering a packet template

extern crate wirescope;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use wirescope::{
    prelude::*,
    scanner::PatternScanner,
    synth::{PacketTemplate, Substitutions},
};

const GRAY_TIP: &str = r#"{
  "1": {"1": 111, "2": 222, "3": 528},
  "2": {"1": 732, "2": 20, "5": 1700000000},
  "25": {"1": {"28": {"2": "A 拍了拍 B 的肩膀", "3": [{"1": "uin_str1", "2": "111"}, {"1": "uin_str2", "2": "222"}]}}}
}"#;

const KEYWORD_ONLY: &str = r#"{
  "1": {"3": {"1": {"2": [
    {"1": {"1": "hello"}},
    {"1": {"1": "world"}},
    {"5": {"1": "111", "2": "拍了拍 你"}, "6": {"from_uin": 111, "to_uin": 222}}
  ]}}}
}"#;

fn sample(source: &str) -> Vec<u8> {
    wire::encode(&json::parse(source).unwrap()).unwrap()
}

/// Benchmark decoding a gray-tip push.
fn bench_decode_gray_tip(c: &mut Criterion) {
    let data = sample(GRAY_TIP);

    c.bench_function("decode_gray_tip", |b| {
        b.iter(|| {
            let tree = wire::decode(black_box(&data)).unwrap();
            black_box(tree)
        });
    });
}

/// Benchmark decoding with a tight depth bound, where nested payloads stay bytes.
fn bench_decode_shallow(c: &mut Criterion) {
    let data = sample(KEYWORD_ONLY);
    let config = DecodeConfig::new().with_max_depth(2);

    c.bench_function("decode_shallow", |b| {
        b.iter(|| {
            let tree = wire::decode_with(black_box(&data), &config).unwrap();
            black_box(tree)
        });
    });
}

/// Benchmark re-encoding a decoded tree.
fn bench_encode(c: &mut Criterion) {
    let tree = json::parse(GRAY_TIP).unwrap();

    c.bench_function("encode_gray_tip", |b| {
        b.iter(|| {
            let data = wire::encode(black_box(&tree)).unwrap();
            black_box(data)
        });
    });
}

/// Benchmark the fixed-path layer, which fires first.
fn bench_scan_gray_tip(c: &mut Criterion) {
    let tree = json::parse(GRAY_TIP).unwrap();
    let scanner = PatternScanner::default();

    c.bench_function("scan_gray_tip", |b| {
        b.iter(|| {
            let info = scanner.extract(black_box(&tree));
            black_box(info)
        });
    });
}

/// Benchmark the keyword layer, which walks every leaf.
fn bench_scan_keyword(c: &mut Criterion) {
    let tree = json::parse(KEYWORD_ONLY).unwrap();
    let scanner = PatternScanner::default();

    c.bench_function("scan_keyword", |b| {
        b.iter(|| {
            let info = scanner.extract(black_box(&tree));
            black_box(info)
        });
    });
}

/// Benchmark a scan that finds nothing.
fn bench_scan_miss(c: &mut Criterion) {
    let tree = json::parse(r#"{"1": {"1": "hello"}, "2": [1, 2, 3]}"#).unwrap();
    let scanner = PatternScanner::default();

    c.bench_function("scan_miss", |b| {
        b.iter(|| {
            let hit = scanner.detect(black_box(&tree));
            black_box(hit)
        });
    });
}

/// Benchmark template substitution and parsing.
fn bench_template_render(c: &mut Criterion) {
    let template = PacketTemplate::new(
        "bench",
        r#"{"1": {"1": ${uin}, "2": "${uid}"}, "2": {"5": ${msgtime}, "6": ${seq}}, "3": {"1": {"2": []}}}"#,
    );
    let substitutions = Substitutions::new()
        .int("uin", 10_001)
        .string("uid", "u_abc")
        .int("msgtime", 1_700_000_000)
        .int("seq", 42);

    c.bench_function("template_render", |b| {
        b.iter(|| {
            let tree = template.render(black_box(&substitutions)).unwrap();
            black_box(tree)
        });
    });
}

criterion_group!(
    benches,
    bench_decode_gray_tip,
    bench_decode_shallow,
    bench_encode,
    bench_scan_gray_tip,
    bench_scan_keyword,
    bench_scan_miss,
    bench_template_render,
);
criterion_main!(benches);
