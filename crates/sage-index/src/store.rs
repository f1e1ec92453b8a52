//! The chunk corpus and its fitted term model, behind one read/write lock.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;

use crate::document::Chunk;
use crate::error::IndexError;
use crate::persist::{self, LoadOutcome, SnapshotRef};
use crate::tfidf::{SparseMatrix, SparseVector, TermModel, TermModelConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub top_k: usize,
    /// Results below this similarity are dropped after `top_k` truncation.
    pub threshold: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub is_fitted: bool,
    /// `(rows, columns)` of the document-term matrix once fitted.
    pub vector_shape: Option<(usize, usize)>,
    pub path: Option<PathBuf>,
}

struct Fitted {
    model: TermModel,
    matrix: SparseMatrix,
}

#[derive(Default)]
struct IndexState {
    documents: Vec<Chunk>,
    fitted: Option<Fitted>,
}

impl IndexState {
    /// Vectorize `query` with the current model.
    fn vectorize(&self, query: &str) -> Result<(&Fitted, SparseVector), IndexError> {
        let fitted = self.fitted.as_ref().ok_or(IndexError::NotFitted)?;
        Ok((fitted, fitted.model.transform(query)))
    }
}

/// Sparse TF-IDF index over chunks.
///
/// `search` takes the read lock; `add`, `clear` and `save` take the write lock,
/// so readers never observe a corpus and model that disagree.
pub struct VectorIndex {
    path: Option<PathBuf>,
    config: TermModelConfig,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// An index that is never written to disk.
    #[must_use]
    pub fn in_memory(config: TermModelConfig) -> Self {
        Self {
            path: None,
            config,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Load the snapshot at `path`, or start empty.
    ///
    /// A missing file starts an empty index. An unreadable or invalid file is
    /// logged, renamed to `<name>.corrupt`, and also starts an empty index.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, config: TermModelConfig) -> Self {
        let path = path.into();
        let state = match persist::read(&path) {
            LoadOutcome::Missing => {
                tracing::info!(path = %path.display(), "no index snapshot, starting empty");
                IndexState::default()
            }
            LoadOutcome::Loaded(snapshot) => {
                let fitted = match (snapshot.is_fitted, snapshot.term_model, snapshot.matrix) {
                    (true, Some(model), Some(matrix)) => Some(Fitted { model, matrix }),
                    _ => None,
                };
                if let Some(f) = &fitted
                    && f.model.config() != config
                {
                    tracing::info!(
                        "snapshot term model config differs from configuration; applies from next add"
                    );
                }
                tracing::info!(
                    path = %path.display(),
                    documents = snapshot.documents.len(),
                    "index snapshot loaded"
                );
                IndexState {
                    documents: snapshot.documents,
                    fitted,
                }
            }
            LoadOutcome::Corrupt(reason) => {
                tracing::error!(path = %path.display(), %reason, "index snapshot is unreadable, starting empty");
                match persist::quarantine(&path) {
                    Ok(moved) => {
                        tracing::warn!(moved_to = %moved.display(), "corrupt snapshot preserved");
                    }
                    Err(e) => tracing::warn!("failed to move corrupt snapshot aside: {e:#}"),
                }
                IndexState::default()
            }
        };

        Self {
            path: Some(path),
            config,
            state: RwLock::new(state),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `chunks` and refit the term model over the whole corpus.
    ///
    /// The refit costs time linear in the corpus size on every call. When the
    /// index is backed by a file, the new state is persisted before it becomes
    /// visible; a failed write leaves the index as it was.
    ///
    /// # Errors
    ///
    /// `EmptyBatch` for an empty `chunks`, or the persistence error.
    pub fn add(&self, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyBatch);
        }
        let added = chunks.len();
        let mut state = self.state.write()?;

        let previous_len = state.documents.len();
        state.documents.extend(chunks);
        let (model, matrix) = {
            let texts: Vec<&str> = state.documents.iter().map(|c| c.content.as_str()).collect();
            TermModel::fit(&texts, self.config)
        };

        if let Some(path) = &self.path {
            let snapshot = SnapshotRef {
                documents: &state.documents,
                term_model: Some(&model),
                matrix: Some(&matrix),
                is_fitted: true,
            };
            if let Err(e) = persist::write(path, &snapshot) {
                state.documents.truncate(previous_len);
                tracing::error!(path = %path.display(), "failed to persist index: {e:#}");
                return Err(e);
            }
        }

        let shape = matrix.shape();
        state.fitted = Some(Fitted { model, matrix });
        tracing::info!(
            added,
            total = state.documents.len(),
            rows = shape.0,
            terms = shape.1,
            "index refit"
        );
        Ok(added)
    }

    /// Rank chunks against `query`.
    ///
    /// Sorts by similarity descending with ties in corpus order, keeps the first
    /// `top_k`, and only then drops those below `threshold`. Never fails: an
    /// unfitted or empty index, or a poisoned lock, yields no results.
    #[must_use]
    pub fn search(&self, query: &str, params: &SearchParams) -> Vec<SearchResult> {
        let state = match self.state.read() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("index lock poisoned, returning no results: {e}");
                return Vec::new();
            }
        };
        if state.documents.is_empty() {
            return Vec::new();
        }
        let (fitted, q) = match state.vectorize(query) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!("search skipped: {e}");
                return Vec::new();
            }
        };

        let scores: Vec<f32> = fitted.matrix.rows.iter().map(|row| row.cosine(&q)).collect();

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order.truncate(params.top_k);

        let results: Vec<SearchResult> = order
            .into_iter()
            .filter(|&i| scores[i] >= params.threshold)
            .filter_map(|i| {
                state.documents.get(i).map(|chunk| SearchResult {
                    chunk: chunk.clone(),
                    similarity: scores[i],
                })
            })
            .collect();

        tracing::debug!(
            candidates = scores.len(),
            returned = results.len(),
            top_k = params.top_k,
            threshold = params.threshold,
            "search complete"
        );
        results
    }

    /// Drop every chunk and the model, and delete the snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or the file cannot be removed.
    pub fn clear(&self) -> Result<(), IndexError> {
        let mut state = self.state.write()?;
        let removed = state.documents.len();
        *state = IndexState::default();
        if let Some(path) = &self.path {
            persist::remove(path)?;
        }
        tracing::info!(removed, "index cleared");
        Ok(())
    }

    /// Write the current state to the backing file. A no-op for in-memory indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or the write fails.
    pub fn save(&self) -> Result<(), IndexError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let state = self.state.write()?;
        let snapshot = SnapshotRef {
            documents: &state.documents,
            term_model: state.fitted.as_ref().map(|f| &f.model),
            matrix: state.fitted.as_ref().map(|f| &f.matrix),
            is_fitted: state.fitted.is_some(),
        };
        persist::write(path, &snapshot)
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let (document_count, vector_shape) = match self.state.read() {
            Ok(state) => (
                state.documents.len(),
                state.fitted.as_ref().map(|f| f.matrix.shape()),
            ),
            Err(e) => {
                tracing::error!("index lock poisoned: {e}");
                (0, None)
            }
        };
        IndexStats {
            document_count,
            is_fitted: vector_shape.is_some(),
            vector_shape,
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_owned(),
            content: content.to_owned(),
            source: format!("{id}.txt"),
            metadata: BTreeMap::new(),
            chunk_index: 0,
            char_range: (0, content.chars().count()),
        }
    }

    fn params(top_k: usize, threshold: f32) -> SearchParams {
        SearchParams { top_k, threshold }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("rust", "rust borrow checker enforces ownership rules"),
            chunk("python", "python uses reference counting and a garbage collector"),
            chunk("go", "go has a tracing garbage collector and goroutines"),
            chunk("cooking", "slow roasted tomatoes with garlic and basil"),
        ]
    }

    #[test]
    fn unfitted_search_is_empty() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        assert!(index.search("anything", &SearchParams::default()).is_empty());
        assert!(matches!(
            IndexState::default().vectorize("anything"),
            Err(IndexError::NotFitted)
        ));
    }

    #[test]
    fn empty_batch_rejected() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        assert!(matches!(index.add(Vec::new()), Err(IndexError::EmptyBatch)));
        assert!(!index.stats().is_fitted);
    }

    #[test]
    fn chinese_self_retrieval() {
        let content = "天津商务职业学院在第十五届全国职业院校技能大赛中获得优异成绩";
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(vec![chunk("award", content)]).unwrap();

        let results = index.search("天津商务职业学院获奖情况", &params(5, 0.01));
        assert!(
            results
                .iter()
                .any(|r| r.chunk.content == content && r.similarity > 0.0)
        );
    }

    #[test]
    fn best_match_ranks_first() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(corpus()).unwrap();

        let results = index.search("garbage collector in python", &params(5, 0.0));
        assert_eq!(results[0].chunk.id, "python");
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn ties_keep_corpus_order() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index
            .add(vec![
                chunk("a", "same words"),
                chunk("b", "same words"),
                chunk("c", "same words"),
            ])
            .unwrap();
        let ids: Vec<String> = index
            .search("same words", &params(3, 0.0))
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn threshold_applies_after_top_k() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(corpus()).unwrap();

        // Only "rust" matches; the other three slots hold zero-similarity rows.
        let all = index.search("borrow checker", &params(4, 0.0));
        assert_eq!(all.len(), 4);
        let filtered = index.search("borrow checker", &params(4, 0.01));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chunk.id, "rust");

        // A slot taken by a weak match is not refilled from further down.
        let top1 = index.search("garbage collector", &params(1, 0.99));
        assert!(top1.is_empty());
    }

    #[test]
    fn top_k_zero_returns_nothing() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(corpus()).unwrap();
        assert!(index.search("rust", &params(0, 0.0)).is_empty());
    }

    #[test]
    fn add_refits_whole_corpus() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(vec![chunk("first", "alpha beta")]).unwrap();
        let before = index.stats().vector_shape.unwrap();

        index.add(vec![chunk("second", "gamma delta")]).unwrap();
        let after = index.stats().vector_shape.unwrap();
        assert_eq!(before.0, 1);
        assert_eq!(after.0, 2);
        assert!(after.1 > before.1);

        let hits = index.search("gamma", &params(5, 0.01));
        assert_eq!(hits[0].chunk.id, "second");
    }

    #[test]
    fn clear_is_idempotent() {
        let index = VectorIndex::in_memory(TermModelConfig::default());
        index.add(corpus()).unwrap();
        index.clear().unwrap();
        index.clear().unwrap();

        let stats = index.stats();
        assert_eq!(stats.document_count, 0);
        assert!(!stats.is_fitted);
        assert_eq!(stats.vector_shape, None);
        assert!(index.search("rust", &SearchParams::default()).is_empty());
    }

    #[test]
    fn round_trip_preserves_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let original = VectorIndex::open(&path, TermModelConfig::default());
        original.add(corpus()).unwrap();
        original.save().unwrap();

        let reloaded = VectorIndex::open(&path, TermModelConfig::default());
        assert_eq!(reloaded.stats().document_count, 4);
        assert_eq!(reloaded.stats().vector_shape, original.stats().vector_shape);

        for q in ["garbage collector", "ownership", "tomatoes basil", "nothing"] {
            let a: Vec<(String, f32)> = original
                .search(q, &params(4, 0.0))
                .into_iter()
                .map(|r| (r.chunk.id, r.similarity))
                .collect();
            let b: Vec<(String, f32)> = reloaded
                .search(q, &params(4, 0.0))
                .into_iter()
                .map(|r| (r.chunk.id, r.similarity))
                .collect();
            assert_eq!(a, b, "query {q:?}");
        }
    }

    #[test]
    fn clear_deletes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = VectorIndex::open(&path, TermModelConfig::default());
        index.add(corpus()).unwrap();
        assert!(path.exists());

        index.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(
            VectorIndex::open(&path, TermModelConfig::default())
                .stats()
                .document_count,
            0
        );
    }

    #[test]
    fn corrupt_snapshot_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{not json").unwrap();

        let index = VectorIndex::open(&path, TermModelConfig::default());
        let stats = index.stats();
        assert_eq!(stats.document_count, 0);
        assert!(!stats.is_fitted);
        assert!(!path.exists());
        assert!(dir.path().join("index.json.corrupt").exists());
    }

    #[test]
    fn failed_persist_leaves_index_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // Parent path is a regular file, so creating the snapshot fails.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let index = VectorIndex::open(blocker.join("index.json"), TermModelConfig::default());

        assert!(index.add(corpus()).is_err());
        let stats = index.stats();
        assert_eq!(stats.document_count, 0);
        assert!(!stats.is_fitted);
    }

    #[test]
    fn stats_report_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = VectorIndex::open(&path, TermModelConfig::default());
        assert_eq!(index.stats().path.as_deref(), Some(path.as_path()));
        assert_eq!(
            VectorIndex::in_memory(TermModelConfig::default())
                .stats()
                .path,
            None
        );
    }

    #[test]
    fn concurrent_searches_during_adds() {
        let index = std::sync::Arc::new(VectorIndex::in_memory(TermModelConfig::default()));
        index.add(corpus()).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = std::sync::Arc::clone(&index);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let results = index.search("garbage collector", &params(10, 0.0));
                        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.similarity)));
                    }
                })
            })
            .collect();
        for i in 0..10 {
            index
                .add(vec![chunk(&format!("extra{i}"), "more garbage text")])
                .unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(index.stats().document_count, 14);
    }

    mod proptest_search {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn results_sorted_and_bounded(
                docs in proptest::collection::vec("[a-e ]{1,40}", 1..12),
                query in "[a-e ]{0,20}",
                top_k in 0usize..15,
                threshold in 0.0f32..1.0,
            ) {
                let index = VectorIndex::in_memory(TermModelConfig::default());
                let chunks: Vec<Chunk> = docs
                    .iter()
                    .enumerate()
                    .map(|(i, d)| chunk(&i.to_string(), d))
                    .collect();
                index.add(chunks).unwrap();

                let results = index.search(&query, &params(top_k, threshold));
                prop_assert!(results.len() <= top_k);
                for r in &results {
                    prop_assert!((0.0..=1.0).contains(&r.similarity));
                    prop_assert!(r.similarity >= threshold);
                }
                for w in results.windows(2) {
                    prop_assert!(w[0].similarity >= w[1].similarity);
                }
            }
        }
    }
}
