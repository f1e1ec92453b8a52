mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the result fails [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Names the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than zero");
        }
        if self.chunking.encoding_chain().is_empty() {
            bail!("chunking.encodings must name at least one known encoding");
        }
        let threshold = self.retrieval.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("retrieval.similarity_threshold must be within [0, 1], got {threshold}");
        }
        let (min, max) = self.index.ngram_range;
        if min == 0 || min > max {
            bail!("index.ngram_range must satisfy 1 <= min <= max, got [{min}, {max}]");
        }
        if self.index.max_features == 0 {
            bail!("index.max_features must be greater than zero");
        }
        if self.llm.max_retries == 0 {
            bail!("llm.max_retries must be at least 1");
        }
        let temperature = self.llm.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            bail!("llm.temperature must be within [0, 2], got {temperature}");
        }
        if self.queue.capacity == 0 {
            bail!("queue.capacity must be greater than zero");
        }
        Ok(())
    }
}
