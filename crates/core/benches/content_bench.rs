//! Benchmarks for content stream parsing and interpretation.
//!
//! Benchmark groups:
//! - `content_tokenize`: raw lexer throughput
//! - `content_parse`: operand/operator grouping, inline images included
//! - `content_run`: full dispatch through the graphics state machine

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use folio_core::interp::{Device, parse_content_stream, run_content_stream};
use folio_core::model::GraphicsState;
use folio_core::parser::lexer::Lexer;

/// Discards every call.
struct NullDevice;

impl Device for NullDevice {}

/// Builds a page-like stream of `n` drawing blocks mixing paths, text and
/// color changes.
fn generate_page(n: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(n * 120);
    for i in 0..n {
        let x = (i % 500) as f64 * 1.25;
        let y = (i % 700) as f64 * 0.5;
        let block = match i % 4 {
            0 => format!("q 1 0 0 1 {x} {y} cm 0 0 m 10 0 l 10 10 l h S Q\n"),
            1 => format!("0.{} g {x} {y} 20 5 re f\n", i % 10),
            2 => format!("BT /F1 12 Tf {x} {y} Td [(Hello) -250 (World)] TJ ET\n"),
            _ => format!("{x} {y} m {x} {y} 5 5 {y} {x} c 1 0 0 RG B*\n"),
        };
        data.extend_from_slice(block.as_bytes());
    }
    data
}

fn generate_inline_images(n: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(n * 64);
    for _ in 0..n {
        data.extend_from_slice(b"q 8 0 0 8 0 0 cm BI /W 4 /H 4 /BPC 8 /CS /G ID ");
        data.extend_from_slice(&[0x7f; 16]);
        data.extend_from_slice(b" EI Q\n");
    }
    data
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_tokenize");
    for size in [1_000, 10_000] {
        let data = generate_page(size);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Lexer::new(black_box(data), 0).count());
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_parse");
    for size in [1_000, 10_000] {
        let data = generate_page(size);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("page", size), &data, |b, data| {
            b.iter(|| parse_content_stream(black_box(data)).len());
        });
    }
    let images = generate_inline_images(1_000);
    group.bench_function("inline_images", |b| {
        b.iter(|| parse_content_stream(black_box(&images)).len());
    });
    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_run");
    for size in [1_000, 10_000] {
        let data = generate_page(size);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                let mut device = NullDevice;
                run_content_stream(black_box(data), GraphicsState::default(), &mut device)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_parse, bench_run);
criterion_main!(benches);
