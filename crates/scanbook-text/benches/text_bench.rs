// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for text structuring in the scanbook-text crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use scanbook_text::{Sanitizer, infer_structure, render};

/// About forty pages of noisy recognition output: headings, prose with
/// typical character merges, captions, and stray control characters.
fn synthetic_book() -> String {
    let mut text = String::from("ART HISTORY SURVEY\n\n");
    for chapter in 1..=40 {
        text.push_str(&format!("CHAPTER {chapter}\n"));
        for para in 0..12 {
            text.push_str(&format!(
                "Paragraph {para} discusses the rnodern\tperiod  and ''the'' cloister\u{7}.\n"
            ));
        }
        text.push_str(&format!("Figure {chapter}: A detail of the nave.\n\n"));
        text.push_str(&format!("{chapter}. NOTES\nTable {chapter}. Dates.\n"));
    }
    text
}

fn bench_sanitize(c: &mut Criterion) {
    let raw = synthetic_book();
    let sanitizer = Sanitizer::default();

    c.bench_function("sanitize (40 chapters)", |b| {
        b.iter(|| black_box(sanitizer.sanitize(black_box(&raw))));
    });
}

fn bench_structure_and_render(c: &mut Criterion) {
    let clean = Sanitizer::default().sanitize(&synthetic_book());

    c.bench_function("infer_structure + render (40 chapters)", |b| {
        b.iter(|| {
            let structure = infer_structure(black_box(&clean));
            black_box(render(&structure));
        });
    });
}

criterion_group!(benches, bench_sanitize, bench_structure_and_render);
criterion_main!(benches);
