// SPDX-License-Identifier: MIT

//! Typed error handling for submarket-rs
//!
//! `ReportError` is the single error type that crosses node, stage, and
//! pipeline boundaries. The sub-enums carry the categories the caller
//! actually branches on: boundary validation, upstream fetch failures,
//! exhausted LLM stages, and graph construction problems.

use thiserror::Error;

/// Top-level error type for submarket-rs
#[derive(Debug, Error)]
pub enum ReportError {
    /// Malformed request, caught before the graph is invoked
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Non-2xx or unusable response from an external data provider
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// An LLM stage failed every attempt in its retry budget
    #[error(transparent)]
    StageExhausted(#[from] StageExhaustedError),

    /// Structural problem in the declared task graph
    #[error("Graph configuration error: {0}")]
    GraphConfig(#[from] GraphConfigError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A node returned a key it never declared as an output
    #[error("Node '{node}' wrote undeclared state key '{key}'")]
    UndeclaredWrite { node: String, key: String },

    /// A node read a state key that no upstream node produced
    #[error("State key '{key}' is missing or has the wrong shape")]
    MissingState { key: String },

    /// The node task panicked or was cancelled by the runtime
    #[error("Node '{node}' task failed: {message}")]
    TaskFailed { node: String, message: String },

    /// The per-request wall-clock budget elapsed
    #[error("Report generation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Max iterations/turns reached
    #[error("Max {kind} reached: {limit}")]
    MaxIterations { kind: String, limit: u32 },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors outside of a provider fetch (e.g. model calls)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// URL construction errors
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Boundary validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(String),

    #[error(
        "address '{0}' must use the format: Street Address, City, ST ZIP (e.g. 5500 Grand Lake Dr, San Antonio, TX 78244)"
    )]
    MalformedAddress(String),

    #[error("unknown property type '{0}'")]
    UnknownPropertyType(String),
}

/// Errors from the listing, property-record, and demographic providers
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an unexpected payload: {message}")]
    Malformed { provider: String, message: String },
}

impl FetchError {
    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn transport(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            provider: provider.into(),
            source,
        }
    }

    /// Upstream HTTP status, when the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Malformed { .. } => None,
        }
    }
}

/// An LLM stage that failed on every attempt
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed after {attempts} attempts")]
pub struct StageExhaustedError {
    pub stage: String,
    pub attempts: u32,
    #[source]
    pub last_error: Box<ReportError>,
}

/// Errors raised while declaring or compiling the task graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphConfigError {
    /// Circular dependency detected; the path starts and ends on the same node
    #[error("Circular dependency detected: {0:?}")]
    Cycle(Vec<String>),

    #[error("Node '{0}' is already registered")]
    DuplicateNode(String),

    #[error("Node '{node}' depends on undeclared node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("Node '{0}' is not registered")]
    UnknownNode(String),

    /// Two nodes may run concurrently and both declare the same output key
    #[error("Nodes '{first}' and '{second}' both write '{key}' without an ordering between them")]
    ConflictingWrites {
        key: String,
        first: String,
        second: String,
    },

    #[error("Graph has no nodes")]
    Empty,
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Non-success response from the model API
    #[error("{provider} API error (HTTP {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl ReportError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a missing-state error
    pub fn missing_state(key: impl Into<String>) -> Self {
        Self::MissingState { key: key.into() }
    }

    /// Whether the error is a boundary rejection safe to show to the user verbatim
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_carries_status() {
        let err = FetchError::Status {
            provider: "RentCast".to_string(),
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("HTTP 404"));

        let err = FetchError::malformed("ArcGIS", "no token");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_stage_exhausted_preserves_cause() {
        use std::error::Error as _;

        let err = StageExhaustedError {
            stage: "final_report_generator".to_string(),
            attempts: 4,
            last_error: Box::new(ModelError::InvalidResponse("empty".to_string()).into()),
        };
        assert_eq!(
            err.to_string(),
            "Stage 'final_report_generator' failed after 4 attempts"
        );
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("empty"));
    }

    #[test]
    fn test_is_validation() {
        let err: ReportError = ValidationError::MissingField("Address".to_string()).into();
        assert!(err.is_validation());
        assert!(!ReportError::config("x").is_validation());
    }
}
