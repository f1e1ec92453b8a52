use std::collections::BTreeMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sage_core::context::{ContextBudget, build_context};
use sage_index::{Chunk, SearchResult};

fn results(count: usize, len: usize) -> Vec<SearchResult> {
    let base = "Routine maintenance windows are announced a week ahead. ";
    (0..count)
        .map(|i| {
            let content: String = base.repeat(len / base.len() + 1).chars().take(len).collect();
            #[allow(clippy::cast_precision_loss)]
            let similarity = 1.0 / (i as f32 + 1.0);
            SearchResult {
                chunk: Chunk {
                    id: format!("c{i}"),
                    char_range: (0, content.chars().count()),
                    content,
                    source: "/docs/ops.md".into(),
                    metadata: BTreeMap::new(),
                    chunk_index: i,
                },
                similarity,
            }
        })
        .collect()
}

fn context_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_context");
    let mut info = BTreeMap::new();
    info.insert("os".to_owned(), "linux".to_owned());
    info.insert("cpu_count".to_owned(), "8".to_owned());

    for count in [5, 20, 100] {
        let ranked = results(count, 400);
        group.bench_with_input(BenchmarkId::new("results", count), &ranked, |b, r| {
            b.iter(|| {
                black_box(build_context(
                    black_box(r),
                    Some(&info),
                    ContextBudget { max_chars: 8000 },
                ))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, context_assembly);
criterion_main!(benches);
