use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SUMMARY_CONCURRENCY: usize = 3;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api";
pub const DEFAULT_OLLAMA_MODEL: &str = "exaone3.5";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-6";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bind: Option<String>,
    pub posts_dir: Option<PathBuf>,
    pub youtube_api_key: Option<String>,
    pub youtube_api_base: Option<String>,
    pub default_provider: Option<String>,
    pub caption_langs: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub summary_concurrency: Option<usize>,
    pub ollama: OllamaConfig,
    pub gemini: ApiProviderConfig,
    pub openai: ApiProviderConfig,
    pub anthropic: ApiProviderConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub available: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiProviderConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl Config {
    /// Load config from ~/.config/tubepost/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn bind(&self) -> String {
        self.bind.clone().unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.posts_dir.clone().unwrap_or_else(|| PathBuf::from("posts"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Section summaries in flight at once for one post; never below 1
    pub fn summary_concurrency(&self) -> usize {
        self.summary_concurrency.unwrap_or(DEFAULT_SUMMARY_CONCURRENCY).max(1)
    }

    /// Caption languages in fallback order; each is tried manual first, then auto-generated
    pub fn caption_langs(&self) -> Vec<String> {
        match &self.caption_langs {
            Some(langs) if !langs.is_empty() => langs.clone(),
            _ => vec!["ko".to_string(), "en".to_string()],
        }
    }

    pub fn youtube_api_key(&self) -> Option<String> {
        from_config_or_env(&self.youtube_api_key, "YOUTUBE_API_KEY")
    }

    pub fn ollama_url(&self) -> String {
        from_config_or_env(&self.ollama.url, "OLLAMA_API_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    pub fn ollama_model(&self) -> String {
        self.ollama
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string())
    }

    /// Ollama is assumed reachable unless switched off in config or by OLLAMA_API_AVAILABLE=false
    pub fn ollama_available(&self) -> bool {
        match self.ollama.available {
            Some(available) => available,
            None => std::env::var("OLLAMA_API_AVAILABLE").map_or(true, |v| v != "false"),
        }
    }

    pub fn gemini_api_key(&self) -> Option<String> {
        from_config_or_env(&self.gemini.api_key, "GEMINI_API_KEY")
    }

    pub fn openai_api_key(&self) -> Option<String> {
        from_config_or_env(&self.openai.api_key, "OPENAI_API_KEY")
    }

    pub fn anthropic_api_key(&self) -> Option<String> {
        from_config_or_env(&self.anthropic.api_key, "ANTHROPIC_API_KEY")
    }
}

fn from_config_or_env(value: &Option<String>, var: &str) -> Option<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("tubepost")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
bind = "0.0.0.0:8080"
posts_dir = "/srv/posts"
default_provider = "gemini"
caption_langs = ["en"]
timeout_secs = 30
summary_concurrency = 8

[ollama]
url = "http://ollama:11434/api"
available = false

[gemini]
api_key = "g-key"
model = "gemini-pro"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind(), "0.0.0.0:8080");
        assert_eq!(config.posts_dir(), PathBuf::from("/srv/posts"));
        assert_eq!(config.default_provider.as_deref(), Some("gemini"));
        assert_eq!(config.caption_langs(), vec!["en".to_string()]);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.summary_concurrency(), 8);
        assert_eq!(config.ollama_url(), "http://ollama:11434/api");
        assert!(!config.ollama_available());
        assert_eq!(config.gemini_api_key().as_deref(), Some("g-key"));
        assert_eq!(config.gemini.model.as_deref(), Some("gemini-pro"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bind(), DEFAULT_BIND);
        assert_eq!(config.posts_dir(), PathBuf::from("posts"));
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.ollama_model(), DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.summary_concurrency(), DEFAULT_SUMMARY_CONCURRENCY);
    }

    #[test]
    fn test_zero_summary_concurrency_is_one() {
        let config: Config = toml::from_str("summary_concurrency = 0").unwrap();
        assert_eq!(config.summary_concurrency(), 1);
    }

    #[test]
    fn test_empty_caption_langs_uses_default_chain() {
        let config: Config = toml::from_str("caption_langs = []").unwrap();
        assert_eq!(config.caption_langs(), vec!["ko".to_string(), "en".to_string()]);
    }
}
