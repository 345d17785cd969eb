use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Extensions indexed when `SUPPORTED_EXTENSIONS` is not set.
pub const DEFAULT_SUPPORTED_EXTENSIONS: &str = ".py,.js,.ts,.jsx,.tsx,.java,.cpp,.c,.h,.cs,.php,.rb,.go,.rs,.swift,.kt,.scala,.lua,.vim,.md,.txt,.yaml,.yml,.json,.xml,.html,.css,.scss,.sass,.sql";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Where cloned repos live, one directory per repo id
    pub repos_dir: PathBuf,
    /// Where vector collections are persisted
    pub vector_dir: PathBuf,
    /// Maximum repo size in MB (checked after clone)
    pub max_repo_size_mb: u64,
    /// File extensions (lowercase, with leading dot) eligible for indexing
    pub supported_extensions: Vec<String>,
    /// Maximum concurrent clone operations
    pub max_concurrent_clones: usize,
    /// Clone timeout in seconds
    pub clone_timeout_secs: u64,
    /// Origin allowed by the CORS layer (the frontend dev server)
    pub cors_origin: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer synthesis
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (required for openai)
    pub api_key: Option<String>,
    /// Sampling temperature for answers
    pub temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            repos_dir: PathBuf::from("./repos"),
            vector_dir: PathBuf::from("./vectordb"),
            max_repo_size_mb: 100,
            supported_extensions: parse_extensions(DEFAULT_SUPPORTED_EXTENSIONS),
            max_concurrent_clones: 2,
            clone_timeout_secs: 300,
            cors_origin: "http://localhost:3000".to_string(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            api_key: None,
            temperature: 0.1,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SOURCE_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("SOURCE_CHAT_REPOS_DIR") {
            config.repos_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("VECTOR_PERSIST_DIR") {
            config.vector_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("MAX_REPO_SIZE_MB") {
            if let Ok(v) = val.parse() {
                config.max_repo_size_mb = v;
            }
        }
        if let Ok(val) = std::env::var("SUPPORTED_EXTENSIONS") {
            config.supported_extensions = parse_extensions(&val);
        }
        if let Ok(val) = std::env::var("SOURCE_CHAT_MAX_CONCURRENT_CLONES") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_clones = v;
            }
        }
        if let Ok(val) = std::env::var("SOURCE_CHAT_CLONE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.clone_timeout_secs = v;
            }
        }
        if let Ok(origin) = std::env::var("SOURCE_CHAT_CORS_ORIGIN") {
            config.cors_origin = origin;
        }

        // LLM config
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL").or_else(|_| std::env::var("OPENAI_MODEL")) {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            if !key.trim().is_empty() {
                config.llm.api_key = Some(key);
            }
        }

        config
    }

    /// Reject configurations the server cannot run with. Called once at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.llm.provider.as_str() {
            "openai" => {
                if self.llm.api_key.is_none() {
                    anyhow::bail!(
                        "LLM API key not found: set LLM_API_KEY or OPENAI_API_KEY for the openai provider"
                    );
                }
            }
            "ollama" => {}
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
        if self.llm.chat_model.trim().is_empty() {
            anyhow::bail!("LLM chat model is empty");
        }
        if self.llm.embedding_model.trim().is_empty() {
            anyhow::bail!("LLM embedding model is empty");
        }
        if self.supported_extensions.is_empty() {
            anyhow::bail!("SUPPORTED_EXTENSIONS yields no extensions");
        }
        if self.max_concurrent_clones == 0 {
            anyhow::bail!("SOURCE_CHAT_MAX_CONCURRENT_CLONES must be at least 1");
        }
        Ok(())
    }
}

/// Parse a comma-separated extension list into lowercase, dot-prefixed entries.
pub fn parse_extensions(raw: &str) -> Vec<String> {
    let mut exts: Vec<String> = raw
        .split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty() && e != ".")
        .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
        .collect();
    exts.sort();
    exts.dedup();
    exts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extensions_normalizes() {
        let exts = parse_extensions(" .PY, rs ,,.md,.py");
        assert_eq!(exts, vec![".md", ".py", ".rs"]);
    }

    #[test]
    fn test_default_extensions_include_common_languages() {
        let config = Config::default();
        for ext in [".py", ".rs", ".ts", ".md", ".sql"] {
            assert!(config.supported_extensions.iter().any(|e| e == ext), "{ext}");
        }
        assert_eq!(config.max_repo_size_mb, 100);
    }

    #[test]
    fn test_validate_requires_api_key_for_openai() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ollama_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = "ollama".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = "mystery".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }
}
