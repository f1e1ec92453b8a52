use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::collections::BTreeMap;
use std::hint::black_box;

use sage_index::{Chunk, SearchParams, TermModelConfig, VectorIndex};

const WORDS: &[&str] = &[
    "index", "query", "vector", "cosine", "memory", "chunk", "paragraph", "retrieval", "model",
    "answer", "context", "budget", "threshold", "similarity", "token", "corpus",
];

fn generate_corpus(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| {
            let content: Vec<&str> = (0..40).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
            let content = content.join(" ");
            Chunk {
                id: format!("chunk-{i}"),
                char_range: (0, content.len()),
                content,
                source: format!("doc{}.txt", i / 10),
                metadata: BTreeMap::new(),
                chunk_index: i % 10,
            }
        })
        .collect()
}

fn refit(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_add_refit");
    group.sample_size(20);

    for size in [100, 1_000] {
        let corpus = generate_corpus(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("chunks", size), &corpus, |b, corpus| {
            b.iter(|| {
                let index = VectorIndex::in_memory(TermModelConfig::default());
                index.add(black_box(corpus.clone())).unwrap();
            });
        });
    }

    group.finish();
}

fn search(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search");

    for size in [100, 1_000, 10_000] {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(generate_corpus(size)).unwrap();
        let params = SearchParams::default();
        group.bench_with_input(BenchmarkId::new("top5", size), &index, |b, index| {
            b.iter(|| index.search(black_box("cosine similarity threshold"), &params));
        });
    }

    group.finish();
}

criterion_group!(benches, refit, search);
criterion_main!(benches);
