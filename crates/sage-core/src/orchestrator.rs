//! Ingest and query pipelines over one shared index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sage_index::document::{Chunker, ChunkerConfig, LoaderRegistry};
use sage_index::{Chunk, IndexError, IndexStats, SearchParams, SearchResult, VectorIndex};
use sage_llm::{ChatParams, LlmError, LlmProvider, generate_answer};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::context::{ContextBudget, build_context};
use crate::sysinfo::{SystemInfo, SystemInfoSource, default_sources, select_source};

pub const EMPTY_ANSWER: &str =
    "Sorry, I could not answer this question. Check the API configuration or try again later.";
pub const CANCELLED_ANSWER: &str = "The query was cancelled before an answer was produced.";

/// Terminal state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Answered,
    /// The model call failed, was cancelled or returned nothing; `answer`
    /// explains what happened.
    Degraded,
}

/// Same shape whether the query succeeded or degraded.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub relevant_docs: Vec<SearchResult>,
    /// Length of the context sent to the model, in chars.
    pub context_length: usize,
    pub system_info_included: bool,
    pub state: QueryState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Chunked { chunks: usize },
    /// The file loaded but held no text.
    Empty,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
    /// Chunks that made it into the index.
    pub chunks_added: usize,
    /// Set when the final index update failed; no chunk from the batch was kept.
    pub index_error: Option<String>,
}

impl IngestReport {
    #[must_use]
    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
            .count()
    }

    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.index_error.is_none() && self.failed_files() == 0
    }
}

/// Runs ingestion (load, chunk, index) and questions (search, context, model).
///
/// Query failures never escape: every query returns a [`QueryResult`], marked
/// [`QueryState::Degraded`] when no model answer could be produced.
pub struct Orchestrator<P: LlmProvider> {
    index: Arc<VectorIndex>,
    provider: P,
    loaders: LoaderRegistry,
    chunker: Chunker,
    search: SearchParams,
    budget: ContextBudget,
    chat: ChatParams,
    system_info: Option<Arc<dyn SystemInfoSource>>,
}

impl<P: LlmProvider> Orchestrator<P> {
    /// Defaults for everything but the index and the provider. The system
    /// info source is probed here, once.
    #[must_use]
    pub fn new(index: Arc<VectorIndex>, provider: P) -> Self {
        Self {
            index,
            provider,
            loaders: LoaderRegistry::default(),
            chunker: Chunker::new(ChunkerConfig::default()),
            search: SearchParams::default(),
            budget: ContextBudget::default(),
            chat: ChatParams::default(),
            system_info: select_source(default_sources()),
        }
    }

    /// Open the configured index and wire every setting through.
    #[must_use]
    pub fn from_config(config: &Config, provider: P) -> Self {
        let index = Arc::new(VectorIndex::open(
            &config.index.path,
            config.index.term_model(),
        ));
        Self::new(index, provider)
            .with_loaders(LoaderRegistry::with_defaults(
                config.chunking.max_file_size,
                config.chunking.encoding_chain(),
            ))
            .with_chunker(config.chunking.chunker())
            .with_search_params(config.retrieval.search_params())
            .with_context_budget(config.retrieval.context_budget())
            .with_chat_params(config.llm.chat_params())
    }

    #[must_use]
    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    #[must_use]
    pub fn with_chunker(mut self, config: ChunkerConfig) -> Self {
        self.chunker = Chunker::new(config);
        self
    }

    #[must_use]
    pub fn with_search_params(mut self, params: SearchParams) -> Self {
        self.search = params;
        self
    }

    #[must_use]
    pub fn with_context_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_chat_params(mut self, params: ChatParams) -> Self {
        self.chat = params;
        self
    }

    #[must_use]
    pub fn with_system_info(mut self, source: Option<Arc<dyn SystemInfoSource>>) -> Self {
        self.system_info = source;
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Load, chunk and index `paths` as one batch.
    ///
    /// A file that fails to load is recorded in the report and skipped. All
    /// chunks from the batch go into a single index update, so the model is
    /// refit once per call.
    pub async fn ingest(&self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();
        let mut batch: Vec<Chunk> = Vec::new();

        for path in paths {
            let outcome = match self.load_and_chunk(path).await {
                Ok(chunks) if chunks.is_empty() => {
                    tracing::warn!(path = %path.display(), "no text extracted, skipping");
                    FileOutcome::Empty
                }
                Ok(chunks) => {
                    tracing::info!(path = %path.display(), chunks = chunks.len(), "document chunked");
                    let outcome = FileOutcome::Chunked {
                        chunks: chunks.len(),
                    };
                    batch.extend(chunks);
                    outcome
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to ingest: {e}");
                    FileOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.files.push(FileReport {
                path: path.clone(),
                outcome,
            });
        }

        if batch.is_empty() {
            tracing::info!(files = paths.len(), "nothing to index");
            return report;
        }

        let index = Arc::clone(&self.index);
        let added = tokio::task::spawn_blocking(move || index.add(batch))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))
            .and_then(|r| r);
        match added {
            Ok(n) => report.chunks_added = n,
            Err(e) => {
                tracing::error!("index update failed: {e}");
                report.index_error = Some(e.to_string());
            }
        }

        tracing::info!(
            files = paths.len(),
            failed = report.failed_files(),
            chunks = report.chunks_added,
            "ingest finished"
        );
        report
    }

    async fn load_and_chunk(&self, path: &Path) -> Result<Vec<Chunk>, sage_index::IngestError> {
        let document = self.loaders.load(path).await?;
        Ok(self.chunker.split(&document))
    }

    /// Answer `question` from the index. Never fails; see [`QueryState`].
    pub async fn query(&self, question: &str, include_system_info: bool) -> QueryResult {
        self.query_with_cancel(question, include_system_info, &CancellationToken::new())
            .await
    }

    /// Like [`Orchestrator::query`], abandoning the model call once `cancel` fires.
    pub async fn query_with_cancel(
        &self,
        question: &str,
        include_system_info: bool,
        cancel: &CancellationToken,
    ) -> QueryResult {
        tracing::info!(stage = "received", chars = question.chars().count(), "query received");

        let relevant_docs = match self.retrieve(question).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(stage = "degraded", "retrieval failed: {e}");
                return QueryResult {
                    question: question.to_owned(),
                    answer: format!("Sorry, an error occurred while processing the query: {e}"),
                    relevant_docs: Vec::new(),
                    context_length: 0,
                    system_info_included: false,
                    state: QueryState::Degraded,
                };
            }
        };
        tracing::info!(stage = "retrieved", results = relevant_docs.len(), "documents retrieved");
        for (rank, doc) in relevant_docs.iter().enumerate() {
            tracing::debug!(
                rank = rank + 1,
                similarity = doc.similarity,
                source = %doc.chunk.source,
                "retrieved chunk"
            );
        }

        let system_info = if include_system_info {
            self.collect_system_info().await
        } else {
            None
        };
        let context = build_context(&relevant_docs, system_info.as_ref(), self.budget);
        let context_length = context.char_len();
        tracing::info!(
            stage = "context_built",
            chars = context_length,
            chunks = context.chunks_included,
            system_info = context.system_info_included,
            "context built"
        );

        let answer = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LlmError::Cancelled),
            result = generate_answer(&self.provider, question, &context.text, None, &self.chat) => result,
        };

        let (answer, state) = match answer {
            Ok(text) if !text.trim().is_empty() => (text, QueryState::Answered),
            Ok(_) => {
                tracing::warn!(stage = "degraded", "model returned an empty answer");
                (EMPTY_ANSWER.to_owned(), QueryState::Degraded)
            }
            Err(LlmError::Cancelled) => {
                tracing::warn!(stage = "degraded", "query cancelled");
                (CANCELLED_ANSWER.to_owned(), QueryState::Degraded)
            }
            Err(e) => {
                tracing::warn!(stage = "degraded", provider = self.provider.name(), "answer generation failed: {e}");
                (
                    format!("Sorry, an error occurred while generating the answer: {e}"),
                    QueryState::Degraded,
                )
            }
        };
        if state == QueryState::Answered {
            tracing::info!(stage = "answered", chars = answer.chars().count(), "query answered");
        }

        QueryResult {
            question: question.to_owned(),
            answer,
            relevant_docs,
            context_length,
            system_info_included: context.system_info_included,
            state,
        }
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>, tokio::task::JoinError> {
        let index = Arc::clone(&self.index);
        let query = question.to_owned();
        let params = self.search;
        tokio::task::spawn_blocking(move || index.search(&query, &params)).await
    }

    async fn collect_system_info(&self) -> Option<SystemInfo> {
        let Some(source) = self.system_info.clone() else {
            tracing::warn!("system info requested but no source is available");
            return None;
        };
        let name = source.name().to_owned();
        match tokio::task::spawn_blocking(move || source.collect()).await {
            Ok(Ok(info)) => Some(info),
            Ok(Err(e)) => {
                tracing::warn!(source = %name, "failed to collect system info: {e}");
                None
            }
            Err(e) => {
                tracing::warn!(source = %name, "system info task failed: {e}");
                None
            }
        }
    }

    /// Empty the index and delete its snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the index error.
    pub async fn clear(&self) -> Result<(), IndexError> {
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || index.clear())
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))?
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }
}
