use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_retrieval();
        if let Ok(v) = std::env::var("SAGE_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.api_key = Some(Secret::new(v));
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("SAGE_LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Ok(v) = std::env::var("SAGE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("SAGE_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("SAGE_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("SAGE_LLM_MAX_RETRIES")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_retries = n;
        }
        if let Ok(v) = std::env::var("SAGE_LLM_RETRY_DELAY")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.retry_delay_secs = secs;
        }
        if let Ok(v) = std::env::var("SAGE_LLM_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.request_timeout_secs = secs;
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Ok(v) = std::env::var("SAGE_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Ok(v) = std::env::var("SAGE_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_size = n;
        }
        if let Ok(v) = std::env::var("SAGE_TOP_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.top_k = n;
        }
        if let Ok(v) = std::env::var("SAGE_SIMILARITY_THRESHOLD") {
            if let Ok(t) = v.parse::<f32>() {
                self.retrieval.similarity_threshold = t;
            } else {
                tracing::warn!("ignoring invalid SAGE_SIMILARITY_THRESHOLD value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SAGE_MAX_CONTEXT_LENGTH")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.max_context_length = n;
        }
    }
}
