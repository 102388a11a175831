//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::error::DebateError;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
    #[serde(default)]
    pub personas: PersonasConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

/// Chat-completion endpoint access.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL.
    pub endpoint: String,
    /// API key; usually supplied via environment, not the file.
    #[serde(default)]
    pub api_key: String,
    /// Deployment (model) name used for every completion.
    pub deployment: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            deployment: "gpt-4o".to_string(),
        }
    }
}

/// Speech-synthesis endpoint access.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// Full synthesis URL; left empty, it is derived from `region`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub region: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            region: "eastus".to_string(),
        }
    }
}

/// Persona store access.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Connection string; `memory` selects the in-process store.
    pub connection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection: "memory".to_string(),
        }
    }
}

/// Persona to synthesis-voice mapping.
///
/// Map values may be concrete voice ids or the literal aliases `male` /
/// `female`, which resolve to the default fields. Personas missing from the
/// map get `default_male`.
#[derive(Debug, Clone, Deserialize)]
pub struct VoicesConfig {
    #[serde(default)]
    pub map: HashMap<String, String>,
    pub default_male: String,
    pub default_female: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            default_male: "en-US-GuyNeural".to_string(),
            default_female: "en-US-JennyNeural".to_string(),
        }
    }
}

/// Personas inserted on first run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonasConfig {
    #[serde(default)]
    pub seed: Vec<String>,
}

/// Headline prefill endpoint; optional.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://newsapi.org/v2/top-headlines?country=us".to_string(),
            api_key: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::Config(format!("Failed to read config: {}", e)))?;
        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay secrets from the environment onto the file-based config.
    ///
    /// Recognized variables: `OPENAI_API_KEY` (or `RAPBATTLE_LLM_API_KEY`),
    /// `RAPBATTLE_TTS_API_KEY`, `RAPBATTLE_NEWS_API_KEY`, and
    /// `RAPBATTLE_LLM_ENDPOINT`.
    pub fn apply_env(&mut self) {
        if let Ok(key) = env::var("RAPBATTLE_LLM_API_KEY").or_else(|_| env::var("OPENAI_API_KEY")) {
            if !key.is_empty() {
                self.llm.api_key = key;
            }
        }
        if let Ok(endpoint) = env::var("RAPBATTLE_LLM_ENDPOINT") {
            if !endpoint.is_empty() {
                self.llm.endpoint = endpoint;
            }
        }
        if let Ok(key) = env::var("RAPBATTLE_TTS_API_KEY") {
            if !key.is_empty() {
                self.tts.api_key = key;
            }
        }
        if let Ok(key) = env::var("RAPBATTLE_NEWS_API_KEY") {
            if !key.is_empty() {
                self.news.api_key = key;
            }
        }
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    let mut map = HashMap::new();
    map.insert("MC Circuit".to_string(), "en-US-GuyNeural".to_string());
    map.insert("Lady Cache".to_string(), "female".to_string());
    Config {
        llm: LlmConfig::default(),
        tts: TtsConfig::default(),
        store: StoreConfig::default(),
        voices: VoicesConfig {
            map,
            ..VoicesConfig::default()
        },
        personas: PersonasConfig {
            seed: vec![
                "MC Circuit".to_string(),
                "Lady Cache".to_string(),
                "Big Latency".to_string(),
                "Queen Quantum".to_string(),
            ],
        },
        news: NewsConfig::default(),
    }
}
