//! Typed application settings.
//!
//! Loaded from `config.yml` (path overridable via `RFP_CONFIG_PATH`); every
//! field has a serde default so a partial file is enough. Access tokens may
//! also come from the environment so the config file can stay secret-free.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::paths::AppPaths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub run: RunSettings,
    pub sheets: SheetsSettings,
    pub docs: DocsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub max_tokens: Option<i32>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
            max_tokens: None,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Corpus file, absolute or relative to the project root.
    pub corpus_path: String,
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            corpus_path: "corpus/passages.json".to_string(),
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Worker pool size for row processing.
    pub concurrency: usize,
    /// How many recent answers are injected into each prompt.
    pub history_window: usize,
    /// Header name of the column answers are written to.
    pub output_column: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            history_window: 3,
            output_column: "Answer".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub base_url: String,
    pub access_token: String,
    pub sheet_name: String,
    pub request_timeout_secs: u64,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com".to_string(),
            access_token: String::new(),
            sheet_name: "Sheet1".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsSettings {
    pub base_url: String,
    pub access_token: String,
    pub request_timeout_secs: u64,
}

impl Default for DocsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://docs.googleapis.com".to_string(),
            access_token: String::new(),
            request_timeout_secs: 60,
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> anyhow::Result<Self> {
        let path = config_path(paths);
        let mut settings = if path.exists() {
            Self::load_from(&path)?
        } else {
            Settings::default()
        };
        settings.apply_env_fallbacks();
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    fn apply_env_fallbacks(&mut self) {
        if self.llm.api_key.is_empty() {
            if let Ok(key) = env::var("OPENAI_API_KEY") {
                self.llm.api_key = key;
            }
        }
        if self.sheets.access_token.is_empty() {
            if let Ok(token) = env::var("GOOGLE_ACCESS_TOKEN") {
                self.sheets.access_token = token;
            }
        }
        if self.docs.access_token.is_empty() {
            if let Ok(token) = env::var("GOOGLE_ACCESS_TOKEN") {
                self.docs.access_token = token;
            }
        }
    }
}

fn config_path(paths: &AppPaths) -> std::path::PathBuf {
    if let Ok(path) = env::var("RFP_CONFIG_PATH") {
        return std::path::PathBuf::from(path);
    }

    let user_config = paths.user_data_dir.join("config.yml");
    if user_config.exists() {
        return user_config;
    }

    paths.project_root.join("config.yml")
}
