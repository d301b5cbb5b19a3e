// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;

use consolink_buffer::{document::Document, token::raw_text, token_log::BoundedTokenLog};
use consolink_common::content_type::ContentCategory;

fn build_output(lines: usize) -> Vec<String> {
    (0..lines)
        .map(|n| {
            if n % 10 == 0 {
                format!("progress {n}%\r")
            } else {
                format!("at com.example.Service.call(Service.java:{n})\n")
            }
        })
        .collect()
}

fn bench_print_and_drain(bench: &mut Criterion) {
    let output = build_output(10_000);

    let mut group = bench.benchmark_group("print_and_drain");
    for capacity in [4 * 1024, 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &output,
            |b, output| {
                b.iter(|| {
                    let mut log = BoundedTokenLog::new(capacity);
                    let mut document = Document::with_cyclic_limit(Some(capacity));

                    for (n, chunk) in output.iter().enumerate() {
                        let category = if n % 7 == 0 {
                            ContentCategory::Error
                        } else {
                            ContentCategory::Normal
                        };
                        log.print(chunk, category, None);

                        if n % 64 == 0 {
                            let drained = log.drain();
                            let _ = document.append(&raw_text(&drained.tokens));
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_print_and_drain);
criterion_main!(benches);
