//! Sparse TF-IDF term model.
//!
//! Weights follow the common smoothed formulation: raw term counts scaled by
//! `ln((1 + n) / (1 + df)) + 1`, each row L2-normalized. Columns are the
//! selected vocabulary in lexical order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermModelConfig {
    /// Keep at most this many terms, ranked by corpus-wide count.
    pub max_features: usize,
    pub ngram_range: (usize, usize),
}

impl Default for TermModelConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_range: (1, 2),
        }
    }
}

/// Sorted `(column, weight)` pairs with unit L2 norm, or empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(Vec<(u32, f32)>);

impl SparseVector {
    fn normalized(mut entries: Vec<(u32, f32)>) -> Self {
        entries.sort_unstable_by_key(|&(col, _)| col);
        let norm = entries.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut entries {
                *w /= norm;
            }
        } else {
            entries.clear();
        }
        Self(entries)
    }

    #[must_use]
    pub fn entries(&self) -> &[(u32, f32)] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Cosine similarity of two unit vectors, clamped to `[0, 1]`.
    #[must_use]
    pub fn cosine(&self, other: &Self) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0f32;
        while i < self.0.len() && j < other.0.len() {
            let (a_col, a_w) = self.0[i];
            let (b_col, b_w) = other.0[j];
            match a_col.cmp(&b_col) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot.clamp(0.0, 1.0)
    }

    fn is_well_formed(&self, cols: usize) -> bool {
        self.0.windows(2).all(|w| w[0].0 < w[1].0)
            && self
                .0
                .iter()
                .all(|&(c, w)| (c as usize) < cols && w.is_finite() && w >= 0.0)
    }
}

/// Document-term matrix: one row per corpus chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    pub cols: usize,
    pub rows: Vec<SparseVector>,
}

impl SparseMatrix {
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermModel {
    config: TermModelConfig,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
    #[serde(skip)]
    columns: HashMap<String, u32>,
}

impl TermModel {
    /// Fit on `texts` and return the model with the matrix of those texts.
    ///
    /// Cost is linear in total corpus size; there is no incremental update.
    #[must_use]
    pub fn fit(texts: &[&str], config: TermModelConfig) -> (Self, SparseMatrix) {
        let docs: Vec<HashMap<String, u32>> = texts
            .iter()
            .map(|t| {
                let mut counts = HashMap::new();
                for term in tokenize::terms(t, config.ngram_range) {
                    *counts.entry(term).or_insert(0u32) += 1;
                }
                counts
            })
            .collect();

        let mut totals: HashMap<&str, (u64, u32)> = HashMap::new();
        for counts in &docs {
            for (term, &n) in counts {
                let entry = totals.entry(term.as_str()).or_insert((0, 0));
                entry.0 += u64::from(n);
                entry.1 += 1;
            }
        }

        let mut ranked: Vec<(&str, u64, u32)> =
            totals.into_iter().map(|(t, (tf, df))| (t, tf, df)).collect();
        if ranked.len() > config.max_features {
            ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            ranked.truncate(config.max_features);
        }
        ranked.sort_unstable_by(|a, b| a.0.cmp(b.0));

        #[allow(clippy::cast_precision_loss)]
        let n = texts.len() as f32;
        let vocabulary: Vec<String> = ranked.iter().map(|&(t, _, _)| t.to_owned()).collect();
        #[allow(clippy::cast_precision_loss)]
        let idf: Vec<f32> = ranked
            .iter()
            .map(|&(_, _, df)| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let model = Self::from_parts(config, vocabulary, idf);
        let rows = docs.iter().map(|counts| model.weigh(counts)).collect();
        let matrix = SparseMatrix {
            cols: model.vocabulary.len(),
            rows,
        };
        (model, matrix)
    }

    fn from_parts(config: TermModelConfig, vocabulary: Vec<String>, idf: Vec<f32>) -> Self {
        let mut model = Self {
            config,
            vocabulary,
            idf,
            columns: HashMap::new(),
        };
        model.rebuild_columns();
        model
    }

    fn rebuild_columns(&mut self) {
        self.columns = self
            .vocabulary
            .iter()
            .enumerate()
            .filter_map(|(i, t)| u32::try_from(i).ok().map(|c| (t.clone(), c)))
            .collect();
    }

    /// Restore lookup state after deserialization and check internal consistency.
    ///
    /// # Errors
    ///
    /// `Corrupt` when vocabulary and weights disagree.
    pub fn validate(&mut self) -> Result<(), IndexError> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(IndexError::Corrupt(format!(
                "vocabulary has {} terms but {} idf weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }
        if self.idf.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(IndexError::Corrupt("non-finite or negative idf weight".into()));
        }
        self.rebuild_columns();
        if self.columns.len() != self.vocabulary.len() {
            return Err(IndexError::Corrupt("duplicate vocabulary terms".into()));
        }
        Ok(())
    }

    fn weigh(&self, counts: &HashMap<String, u32>) -> SparseVector {
        #[allow(clippy::cast_precision_loss)]
        let entries = counts
            .iter()
            .filter_map(|(term, &n)| {
                let col = *self.columns.get(term)?;
                Some((col, n as f32 * self.idf[col as usize]))
            })
            .collect();
        SparseVector::normalized(entries)
    }

    /// Vectorize `text` against the fitted vocabulary. Unknown terms are ignored.
    #[must_use]
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts = HashMap::new();
        for term in tokenize::terms(text, self.config.ngram_range) {
            *counts.entry(term).or_insert(0u32) += 1;
        }
        self.weigh(&counts)
    }

    #[must_use]
    pub fn config(&self) -> TermModelConfig {
        self.config
    }

    #[must_use]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub(crate) fn matrix_fits(&self, matrix: &SparseMatrix) -> bool {
        matrix.cols == self.vocabulary.len()
            && matrix.rows.iter().all(|r| r.is_well_formed(matrix.cols))
    }
}
