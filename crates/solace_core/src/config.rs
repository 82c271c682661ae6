//! Configuration loading.
//!
//! TOML file with serde defaults for every section, plus environment
//! overrides applied after load so deployments can tweak a single knob
//! without shipping a file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolaceConfig {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub insight: InsightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "gateway" for an OpenAI-compatible endpoint, "mock" for canned replies.
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gateway".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "solace.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Static bearer-token table. Identity lives outside the core pipeline, so
/// the server only needs a credential -> user id mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
    /// Development escape hatch: accept a raw user UUID as its own token.
    pub accept_user_id_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Minimum in-window signals before a weekly insight is generated.
    pub min_signals: usize,
    /// Fresh-row short-circuit window.
    pub cooldown_hours: i64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            min_signals: 3,
            cooldown_hours: 24,
        }
    }
}

impl SolaceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SolaceConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults if the file is missing or
    /// malformed. The fallback is logged, never fatal.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config ({:#})", e);
                Self::default()
            }
        }
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SOLACE_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("SOLACE_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("SOLACE_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("SOLACE_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("SOLACE_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("SOLACE_DB_PATH") {
            self.store.db_path = v;
        }
        if let Ok(v) = std::env::var("SOLACE_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("SOLACE_PORT") {
            if let Ok(n) = v.parse() {
                self.server.port = n;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolaceConfig::default();
        assert_eq!(config.llm.provider, "gateway");
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.insight.min_signals, 3);
        assert_eq!(config.insight.cooldown_hours, 24);
        assert!(config.auth.tokens.is_empty());
        assert!(!config.auth.accept_user_id_tokens);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            [llm]
            model = "gpt-4o"

            [server]
            port = 9000

            [[auth.tokens]]
            token = "secret-alpha"
            user_id = "7b9d6a14-93cf-4f52-b3d1-2e85cf6a1f40"
        "#;
        let config: SolaceConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.provider, "gateway");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.tokens.len(), 1);
        assert_eq!(config.auth.tokens[0].token, "secret-alpha");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SolaceConfig::load_or_default(Path::new("/nonexistent/solace.toml"));
        assert_eq!(config.llm.provider, "gateway");
        assert_eq!(config.store.db_path, "solace.db");
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SOLACE_MODEL", "gpt-4.1-mini");
        std::env::set_var("SOLACE_PORT", "9191");
        std::env::set_var("SOLACE_MAX_TOKENS", "not-a-number");

        let mut config = SolaceConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.server.port, 9191);
        // Unparseable numbers leave the existing value alone.
        assert_eq!(config.llm.max_tokens, 1024);

        std::env::remove_var("SOLACE_MODEL");
        std::env::remove_var("SOLACE_PORT");
        std::env::remove_var("SOLACE_MAX_TOKENS");
    }
}
