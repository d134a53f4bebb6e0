//! Settings file
//!
//! Optional TOML file whose sections overlay the built-in defaults. Every
//! field is optional. Credentials found here are only used when the
//! environment does not already provide them.
//!
//! ```toml
//! [fetch]
//! timeout_secs = 30
//!
//! [render]
//! browser_slots = 2
//!
//! [pipeline]
//! max_urls = 12
//! fallback = "always"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use quotehound_core::RecordFormat;
use quotehound_extract::ModerationConfig;
use quotehound_net::{FetchConfig, RenderConfig, SearchConfig};

use crate::{FallbackPolicy, PipelineConfig};

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "quotehound.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub render: RenderSettings,
    pub search: SearchSettings,
    pub moderation: ModerationSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_redirects: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    pub max_idle_rounds: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub browser_slots: Option<usize>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub chrome_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModerationSettings {
    /// Run the safety pass by default
    pub enabled: Option<bool>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub max_urls: Option<usize>,
    pub concurrency: Option<usize>,
    pub fallback: Option<FallbackPolicy>,
    pub context: Option<String>,
    pub format: Option<RecordFormat>,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded settings from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Load `path` when given, else [`DEFAULT_SETTINGS_FILE`] when it
    /// exists, else defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let mut config = FetchConfig::default();
        let s = &self.fetch;
        if let Some(ua) = &s.user_agent {
            config.user_agent = ua.clone();
        }
        if let Some(t) = s.timeout_secs {
            config.timeout_secs = t;
        }
        if let Some(r) = s.max_redirects {
            config.max_redirects = r;
        }
        config
    }

    pub fn render_config(&self) -> RenderConfig {
        let mut config = RenderConfig::default();
        let s = &self.render;
        if let Some(v) = s.max_idle_rounds {
            config.max_idle_rounds = v;
        }
        if let Some(v) = s.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = s.deadline_secs {
            config.deadline_secs = v;
        }
        if let Some(v) = s.browser_slots {
            config.browser_slots = v.max(1);
        }
        if let Some(w) = s.window_width {
            config.window_size.0 = w;
        }
        if let Some(h) = s.window_height {
            config.window_size.1 = h;
        }
        if s.chrome_path.is_some() {
            config.chrome_path = s.chrome_path.clone();
        }
        config
    }

    /// Search config; the environment key wins over the file's
    pub fn search_config(&self) -> SearchConfig {
        let mut config = SearchConfig::default();
        let s = &self.search;
        if config.api_key.is_none() {
            config.api_key = s.api_key.clone();
        }
        if let Some(v) = &s.endpoint {
            config.endpoint = v.clone();
        }
        if let Some(v) = &s.country {
            config.country = v.clone();
        }
        if let Some(v) = &s.language {
            config.language = v.clone();
        }
        if let Some(v) = s.timeout_secs {
            config.timeout_secs = v;
        }
        config
    }

    /// Moderation config; the environment key wins over the file's
    pub fn moderation_config(&self) -> ModerationConfig {
        let mut config = ModerationConfig::default();
        let s = &self.moderation;
        if config.api_key.is_none() {
            config.api_key = s.api_key.clone();
        }
        if s.base_url.is_some() {
            config.base_url = s.base_url.clone();
        }
        if let Some(v) = &s.model {
            config.model = v.clone();
        }
        if let Some(v) = s.concurrency {
            config.concurrency = v.max(1);
        }
        config
    }

    pub fn moderation_enabled(&self) -> bool {
        self.moderation.enabled.unwrap_or(false)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        let s = &self.pipeline;
        if let Some(v) = s.max_urls {
            config.max_urls = v;
        }
        if let Some(v) = s.concurrency {
            config.concurrency = v.max(1);
        }
        if let Some(v) = s.fallback {
            config.fallback = v;
        }
        if s.context.is_some() {
            config.context = s.context.clone();
        }
        config
    }

    pub fn record_format(&self) -> RecordFormat {
        self.pipeline.format.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.pipeline_config(), PipelineConfig::default());
        assert_eq!(settings.render_config().browser_slots, 1);
        assert_eq!(settings.fetch_config().timeout_secs, 20);
        assert!(!settings.moderation_enabled());
        assert_eq!(settings.moderation_config().model, "omni-moderation-latest");
    }

    #[test]
    fn test_sections_overlay_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [fetch]
            timeout_secs = 5

            [render]
            browser_slots = 0
            deadline_secs = 30
            window_width = 1280

            [search]
            endpoint = "http://127.0.0.1:8080/search"
            country = "gb"

            [moderation]
            enabled = true
            model = "text-moderation-stable"
            concurrency = 2

            [pipeline]
            max_urls = 12
            concurrency = 16
            fallback = "always"
            context = "One Piece"
            format = "jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(settings.fetch_config().timeout_secs, 5);

        let render = settings.render_config();
        assert_eq!(render.browser_slots, 1);
        assert_eq!(render.deadline_secs, 30);
        assert_eq!(render.window_size, (1280, 900));
        assert_eq!(render.max_idle_rounds, 3);

        let search = settings.search_config();
        assert_eq!(search.endpoint, "http://127.0.0.1:8080/search");
        assert_eq!(search.country, "gb");
        assert_eq!(search.language, "en");

        assert!(settings.moderation_enabled());
        let moderation = settings.moderation_config();
        assert_eq!(moderation.concurrency, 2);
        assert_eq!(moderation.model, "text-moderation-stable");

        let pipeline = settings.pipeline_config();
        assert_eq!(pipeline.max_urls, 12);
        assert_eq!(pipeline.concurrency, 16);
        assert_eq!(pipeline.fallback, FallbackPolicy::Always);
        assert_eq!(pipeline.context.as_deref(), Some("One Piece"));
        assert_eq!(settings.record_format(), RecordFormat::Jsonl);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Settings::from_toml_str("[pipeline]\nworkers = 4\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));

        assert!(Settings::from_toml_str("[pipeline]\nfallback = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/quotehound.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
