//! Benchmarks for block matching and markdown handling.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic documents of a few hundred blocks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Creates a synthetic markdown document with the given number of sections.
fn create_test_markdown(sections: usize) -> String {
    let mut lines = Vec::new();
    for i in 0..sections {
        lines.push(format!("## Section {}", i + 1));
        lines.push(format!(
            "Paragraph {} describes the **quarterly** results for region {} in detail.",
            i, i
        ));
        lines.push(format!("- Item {} with a [link](https://example.com/{})", i, i));
        lines.push(format!("Closing remarks for section {} are *brief*.", i));
    }
    lines.join("\n")
}

/// Edits every fourth paragraph slightly and appends a block.
fn edit_markdown(markdown: &str) -> String {
    let mut lines: Vec<String> = markdown
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i % 4 == 1 {
                line.replace("results", "figures")
            } else {
                line.to_string()
            }
        })
        .collect();
    lines.push("A brand new final paragraph.".to_string());
    lines.join("\n")
}

/// Benchmark markdown parsing.
fn bench_markdown_parse(c: &mut Criterion) {
    let markdown = create_test_markdown(100);
    c.bench_function("markdown_parse_400_blocks", |b| {
        b.iter(|| sidedoc::markdown::parse(black_box(&markdown)));
    });
}

/// Benchmark matching at various sizes.
fn bench_match_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_blocks");

    for sections in [10, 50, 100].iter() {
        let original = create_test_markdown(*sections);
        let old = sidedoc::markdown::parse(&original);
        let new = sidedoc::markdown::parse(&edit_markdown(&original));

        group.bench_function(format!("{}_blocks", old.len()), |b| {
            b.iter(|| sidedoc::sync::match_blocks(black_box(&old), black_box(&new)));
        });
    }

    group.finish();
}

/// Benchmark the similarity score.
fn bench_similarity(c: &mut Criterion) {
    let a = "The quick brown fox jumps over the lazy dog again and again.";
    let b = "The quick brown cat jumps over the lazy dog once and again.";
    c.bench_function("similarity", |bench| {
        bench.iter(|| sidedoc::hash::similarity(black_box(a), black_box(b)));
    });
}

/// Benchmark inline emphasis parsing.
fn bench_parse_emphasis(c: &mut Criterion) {
    let text = "Plain **bold** and *italic* with ***both*** and a stray * star";
    c.bench_function("parse_emphasis", |b| {
        b.iter(|| sidedoc::markdown::inline::parse_emphasis(black_box(text)));
    });
}

criterion_group!(
    benches,
    bench_markdown_parse,
    bench_match_blocks,
    bench_similarity,
    bench_parse_emphasis,
);
criterion_main!(benches);
