// SPDX-License-Identifier: MIT

//! Settings for the report pipeline
//!
//! Values come from built-in defaults, an optional YAML file, and finally
//! environment variables (after loading `.env`). Secrets are normally only
//! supplied through the environment.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adk::error::ReportError;

/// Env var naming a YAML settings file
pub const CONFIG_PATH_VAR: &str = "SUBMARKET_CONFIG";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub rentcast: RentCastSettings,
    pub arcgis: ArcGisSettings,
    pub llm: LlmSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
    pub log_level: LogLevel,
}

/// Listing and property-record provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RentCastSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Search radius around the subject property, in miles
    pub radius_miles: f64,
    /// Page size for listing searches
    pub page_limit: usize,
}

impl Default for RentCastSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.rentcast.io/v1".to_string(),
            api_key: None,
            radius_miles: 1.0,
            page_limit: 500,
        }
    }
}

/// Demographic enrichment provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArcGisSettings {
    pub portal_url: String,
    pub token_url: String,
    pub enrich_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

const ENRICH_URL: &str = "https://geoenrich.arcgis.com/arcgis/rest/services/World/\
                          geoenrichmentserver/GeoEnrichment/enrich";

impl Default for ArcGisSettings {
    fn default() -> Self {
        Self {
            portal_url: "https://www.arcgis.com".to_string(),
            token_url: "https://www.arcgis.com/sharing/rest/generateToken".to_string(),
            enrich_url: ENRICH_URL.to_string(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model for the drafting and finalizing stages
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub verbosity: Option<String>,
    /// Model behind the data analyzer tool
    pub analyst_model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: crate::adk::model::openai::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: "gpt-5".to_string(),
            reasoning_effort: Some("high".to_string()),
            verbosity: Some("high".to_string()),
            analyst_model: "o3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Retries after the first attempt of each LLM stage
    pub max_retries: u32,
    /// Turn cap for the drafting agent's tool-calling loop
    pub max_agent_iterations: u32,
    /// Wall-clock budget per report; 0 disables it
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_agent_iterations: 75,
            request_timeout_secs: 900,
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl PipelineSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Default log filter when `RUST_LOG` is unset
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl Settings {
    /// The YAML file `load` reads: the explicit path, else `SUBMARKET_CONFIG`
    pub fn source_file(path: Option<&Path>) -> Option<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from))
    }

    /// Load settings: `.env`, then the YAML file (explicit path or
    /// `SUBMARKET_CONFIG`), then environment overrides.
    ///
    /// Runs before the logger exists, so it reports through its result only.
    pub fn load(path: Option<&Path>) -> Result<Self, ReportError> {
        dotenv::dotenv().ok();

        let mut settings = match Self::source_file(path) {
            Some(file) => {
                let content = std::fs::read_to_string(&file).map_err(|e| {
                    ReportError::config(format!("cannot read {}: {}", file.display(), e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        settings.apply_overrides(|name| env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ReportError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.rentcast.page_limit == 0 {
            return Err(ReportError::config("rentcast.page_limit must be at least 1"));
        }
        let radius = self.rentcast.radius_miles;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ReportError::config(format!(
                "rentcast.radius_miles must be a positive number, got {}",
                radius
            )));
        }
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("RENTCAST_API_KEY") {
            self.rentcast.api_key = Some(v);
        }
        if let Some(v) = non_empty("ARCGIS_USERNAME") {
            self.arcgis.username = Some(v);
        }
        if let Some(v) = non_empty("ARCGIS_PASSWORD") {
            self.arcgis.password = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = non_empty("SUBMARKET_OUTPUT_DIR") {
            self.pipeline.output_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("SUBMARKET_MAX_RETRIES") {
            self.pipeline.max_retries = v.trim().parse().map_err(|_| {
                ReportError::config(format!("SUBMARKET_MAX_RETRIES '{}' is not a number", v))
            })?;
        }
        if let Some(v) = non_empty("SUBMARKET_LOG_LEVEL") {
            self.log_level = LogLevel(v);
        }
        Ok(())
    }
}

/// Unwrap a secret that a live client needs
pub fn require<'a>(value: &'a Option<String>, var: &str) -> Result<&'a str, ReportError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ReportError::config(format!("{} must be set", var)))
}
