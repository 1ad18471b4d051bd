//! Batch mode: one report per entry of a JSON or YAML file
//!
//! Entries run sequentially. A failed entry is logged and recorded, and the
//! batch moves on to the next one.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::adk::error::ReportError;
use crate::submarket::input::ReportRequest;
use crate::submarket::pipeline::ReportPipeline;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub address: String,
    pub property_type: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<(ReportRequest, PathBuf)>,
    /// Address and error message of each failed entry
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read batch entries. `.yaml`/`.yml` files are parsed as YAML, anything
/// else as JSON; if that fails the other format is tried.
pub fn load_batch(path: &Path) -> Result<Vec<BatchEntry>, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ReportError::config(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_batch(&content, is_yaml(path))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

fn parse_batch(content: &str, yaml_first: bool) -> Result<Vec<BatchEntry>, ReportError> {
    if yaml_first {
        serde_yaml::from_str(content)
            .or_else(|e| serde_json::from_str(content).map_err(|_| e.into()))
    } else {
        serde_json::from_str(content)
            .or_else(|e| serde_yaml::from_str(content).map_err(|_| e.into()))
    }
}

/// Run every entry through the pipeline, one at a time
pub async fn run_batch(pipeline: &ReportPipeline, entries: &[BatchEntry]) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (i, entry) in entries.iter().enumerate() {
        log::info!("Batch entry {}/{}: {}", i + 1, entries.len(), entry.address);

        let request = match ReportRequest::parse(&entry.address, &entry.property_type) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Skipping '{}': {}", entry.address, e);
                summary.failed.push((entry.address.clone(), e.to_string()));
                continue;
            }
        };

        match pipeline.generate(&request).await {
            Ok(report) => summary.succeeded.push((request, report.output_path)),
            Err(e) => {
                log::error!("Report for '{}' failed: {}", entry.address, e);
                summary.failed.push((entry.address.clone(), e.to_string()));
            }
        }
    }

    log::info!(
        "Batch finished: {} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_batch() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"address": "123 Main St, Austin, TX 78701", "property_type": "Condo"}}]"#
        )
        .unwrap();

        let entries = load_batch(file.path()).unwrap();
        assert_eq!(
            entries,
            vec![BatchEntry {
                address: "123 Main St, Austin, TX 78701".to_string(),
                property_type: "Condo".to_string(),
            }]
        );
    }

    #[test]
    fn test_load_yaml_batch() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "- address: 5500 Grand Lake Dr, San Antonio, TX 78244").unwrap();
        writeln!(file, "  property_type: Single Family").unwrap();
        writeln!(file, "- address: 1 Elm St, Dallas, TX 75201").unwrap();
        writeln!(file, "  property_type: Townhouse").unwrap();

        let entries = load_batch(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].property_type, "Townhouse");
    }

    #[test]
    fn test_extension_is_only_a_hint() {
        let yaml = "- address: 1 Elm St, Dallas, TX 75201\n  property_type: Condo\n";
        assert_eq!(parse_batch(yaml, false).unwrap().len(), 1);
        assert!(parse_batch("{not valid", true).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_batch(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }
}
