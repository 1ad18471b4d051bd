// SPDX-License-Identifier: MIT

//! Final report rendering
//!
//! `layout` turns the report markdown into styled lines, `PdfRenderer`
//! paginates them onto A4 pages, and `PdfConverter` is the graph node that
//! runs the renderer off the async workers.

pub mod layout;
mod pdf;

pub use pdf::PdfRenderer;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adk::error::ReportError;
use crate::submarket::graph::Node;
use crate::submarket::state::{keys, ReportState, StateUpdate};

/// Renders report markdown to a document and returns its path
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<PathBuf, ReportError>;
}

/// Writes the final report to disk and records where it went
pub struct PdfConverter {
    renderer: Arc<dyn Renderer>,
}

impl PdfConverter {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Node for PdfConverter {
    fn writes(&self) -> &[&'static str] {
        &[keys::OUTPUT_PATH]
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        let markdown = state.text(keys::FINAL_REPORT)?.to_string();
        let renderer = Arc::clone(&self.renderer);

        let path = tokio::task::spawn_blocking(move || renderer.render(&markdown))
            .await
            .map_err(|e| ReportError::TaskFailed {
                node: "pdf_converter".to_string(),
                message: e.to_string(),
            })??;

        let output_path = path.to_string_lossy().into_owned();
        Ok(StateUpdate::new().with(keys::OUTPUT_PATH, output_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRenderer {
        seen: Mutex<Vec<String>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, markdown: &str) -> Result<PathBuf, ReportError> {
            self.seen.lock().unwrap().push(markdown.to_string());
            Ok(PathBuf::from("/tmp/final_report_0000abcd.pdf"))
        }
    }

    #[tokio::test]
    async fn test_converter_writes_output_path() {
        let renderer = Arc::new(RecordingRenderer {
            seen: Mutex::new(Vec::new()),
        });
        let mut state = ReportState::empty();
        state.merge(StateUpdate::new().with(keys::FINAL_REPORT, "# Final"));

        let update = PdfConverter::new(renderer.clone())
            .run(&state)
            .await
            .unwrap();
        assert_eq!(
            update.get(keys::OUTPUT_PATH).unwrap(),
            "/tmp/final_report_0000abcd.pdf"
        );
        let seen = renderer.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["# Final".to_string()]);
    }

    #[tokio::test]
    async fn test_converter_renders_real_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ReportState::empty();
        let report = "# Final\n\nBody.";
        state.merge(StateUpdate::new().with(keys::FINAL_REPORT, report));

        let update = PdfConverter::new(Arc::new(PdfRenderer::new(dir.path())))
            .run(&state)
            .await
            .unwrap();
        let path = update
            .get(keys::OUTPUT_PATH)
            .and_then(|v| v.as_str())
            .unwrap();
        assert!(std::path::Path::new(path).exists());
    }

    #[tokio::test]
    async fn test_converter_requires_final_report() {
        let renderer = Arc::new(RecordingRenderer {
            seen: Mutex::new(Vec::new()),
        });
        let err = PdfConverter::new(renderer)
            .run(&ReportState::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingState { .. }));
    }
}
