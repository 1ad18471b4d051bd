// SPDX-License-Identifier: MIT

//! Report graph wiring
//!
//! ```text
//! node                          depends on
//! subject_property_collector    -
//! sale_listings_collector       -
//! rental_listings_collector     -
//! demographic_stats_collector   -
//! subject_property_processor    subject_property_collector
//! sale_listings_processor       sale_listings_collector, subject_property_collector
//! rental_listings_processor     rental_listings_collector, subject_property_collector
//! demographic_stats_processor   demographic_stats_collector
//! draft_report_generator        all four processors
//! final_report_generator        draft_report_generator
//! pdf_converter                 final_report_generator
//! ```

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::adk::error::{GraphConfigError, ReportError};
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::{GenerationConfig, Model};
use crate::submarket::analysis::{Analyst, LlmAnalyst};
use crate::submarket::collectors::{
    ArcGisClient, DemographicStatsCollector, DemographicsSource, ListingKind, ListingsCollector,
    PropertySource, RentCastClient, SubjectPropertyCollector,
};
use crate::submarket::config::{require, Settings};
use crate::submarket::graph::{CompiledGraph, TaskGraph};
use crate::submarket::input::ReportRequest;
use crate::submarket::processors::{
    DemographicStatsProcessor, ListingsProcessor, SubjectPropertyProcessor,
};
use crate::submarket::render::{PdfConverter, PdfRenderer, Renderer};
use crate::submarket::stages::{
    DraftReportGenerator, FinalReportGenerator, RetryPolicy, RetryingNode,
};
use crate::submarket::state::{keys, ReportState};

/// Names of the nodes in the report graph
pub mod node_names {
    pub const SUBJECT_PROPERTY_COLLECTOR: &str = "subject_property_collector";
    pub const SALE_LISTINGS_COLLECTOR: &str = "sale_listings_collector";
    pub const RENTAL_LISTINGS_COLLECTOR: &str = "rental_listings_collector";
    pub const DEMOGRAPHIC_STATS_COLLECTOR: &str = "demographic_stats_collector";
    pub const SUBJECT_PROPERTY_PROCESSOR: &str = "subject_property_processor";
    pub const SALE_LISTINGS_PROCESSOR: &str = "sale_listings_processor";
    pub const RENTAL_LISTINGS_PROCESSOR: &str = "rental_listings_processor";
    pub const DEMOGRAPHIC_STATS_PROCESSOR: &str = "demographic_stats_processor";
    pub const DRAFT_REPORT_GENERATOR: &str = "draft_report_generator";
    pub const FINAL_REPORT_GENERATOR: &str = "final_report_generator";
    pub const PDF_CONVERTER: &str = "pdf_converter";
}

use node_names::*;

/// The external collaborators a report graph needs
#[derive(Clone)]
pub struct PipelineComponents {
    pub property_source: Arc<dyn PropertySource>,
    pub demographics_source: Arc<dyn DemographicsSource>,
    /// Model for drafting and finalizing
    pub model: Arc<dyn Model>,
    pub analyst: Arc<dyn Analyst>,
    pub renderer: Arc<dyn Renderer>,
}

impl PipelineComponents {
    /// Build the production clients from settings. Missing credentials are a
    /// configuration error.
    pub fn live(settings: &Settings) -> Result<Self, ReportError> {
        let rentcast = RentCastClient::new(
            &settings.rentcast.base_url,
            require(&settings.rentcast.api_key, "RENTCAST_API_KEY")?,
        )?;
        let arcgis = ArcGisClient::new(&settings.arcgis)?;

        let api_key = require(&settings.llm.api_key, "OPENAI_API_KEY")?;
        let model = OpenAIModel::new(api_key, settings.llm.model.clone())?
            .with_base_url(settings.llm.base_url.clone());
        let analyst_model = OpenAIModel::new(api_key, settings.llm.analyst_model.clone())?
            .with_base_url(settings.llm.base_url.clone());

        let analyst = LlmAnalyst::new(Arc::new(analyst_model))
            .with_generation_config(GenerationConfig {
                reasoning_effort: settings.llm.reasoning_effort.clone(),
                ..GenerationConfig::default()
            })
            .with_chart_dir(settings.pipeline.output_dir.join("charts"));

        Ok(Self {
            property_source: Arc::new(rentcast),
            demographics_source: Arc::new(arcgis),
            model: Arc::new(model),
            analyst: Arc::new(analyst),
            renderer: Arc::new(PdfRenderer::new(settings.pipeline.output_dir.clone())),
        })
    }
}

/// Declare and compile the report graph
pub fn build_report_graph(
    components: &PipelineComponents,
    settings: &Settings,
) -> Result<CompiledGraph, GraphConfigError> {
    let source = &components.property_source;
    let radius = settings.rentcast.radius_miles;
    let page_limit = settings.rentcast.page_limit;
    let policy = RetryPolicy::new(settings.pipeline.max_retries);

    let draft_config = GenerationConfig {
        reasoning_effort: settings.llm.reasoning_effort.clone(),
        ..GenerationConfig::default()
    };
    let final_config = GenerationConfig {
        verbosity: settings.llm.verbosity.clone(),
        ..draft_config.clone()
    };

    let draft = DraftReportGenerator::new(
        Arc::clone(&components.model),
        Arc::clone(&components.analyst),
        settings.pipeline.max_agent_iterations,
    )
    .with_generation_config(draft_config);
    let finalize = FinalReportGenerator::new(Arc::clone(&components.model))
        .with_generation_config(final_config);

    let mut graph = TaskGraph::new();
    graph.register(
        SUBJECT_PROPERTY_COLLECTOR,
        Arc::new(SubjectPropertyCollector::new(Arc::clone(source))),
        &[],
    )?;
    let sales = ListingsCollector::new(Arc::clone(source), ListingKind::Sale, radius, page_limit);
    graph.register(SALE_LISTINGS_COLLECTOR, Arc::new(sales), &[])?;
    let rentals =
        ListingsCollector::new(Arc::clone(source), ListingKind::Rental, radius, page_limit);
    graph.register(RENTAL_LISTINGS_COLLECTOR, Arc::new(rentals), &[])?;
    let demographics = DemographicStatsCollector::new(Arc::clone(&components.demographics_source));
    graph.register(DEMOGRAPHIC_STATS_COLLECTOR, Arc::new(demographics), &[])?;

    graph.register(
        SUBJECT_PROPERTY_PROCESSOR,
        Arc::new(SubjectPropertyProcessor),
        &[SUBJECT_PROPERTY_COLLECTOR],
    )?;
    // Listing processors read the subject record for the comp criteria
    graph.register(
        SALE_LISTINGS_PROCESSOR,
        Arc::new(ListingsProcessor::new(ListingKind::Sale)),
        &[SALE_LISTINGS_COLLECTOR, SUBJECT_PROPERTY_COLLECTOR],
    )?;
    graph.register(
        RENTAL_LISTINGS_PROCESSOR,
        Arc::new(ListingsProcessor::new(ListingKind::Rental)),
        &[RENTAL_LISTINGS_COLLECTOR, SUBJECT_PROPERTY_COLLECTOR],
    )?;
    graph.register(
        DEMOGRAPHIC_STATS_PROCESSOR,
        Arc::new(DemographicStatsProcessor),
        &[DEMOGRAPHIC_STATS_COLLECTOR],
    )?;

    let draft = RetryingNode::new(DRAFT_REPORT_GENERATOR, Arc::new(draft), policy);
    graph.register(
        DRAFT_REPORT_GENERATOR,
        Arc::new(draft),
        &[
            SUBJECT_PROPERTY_PROCESSOR,
            SALE_LISTINGS_PROCESSOR,
            RENTAL_LISTINGS_PROCESSOR,
            DEMOGRAPHIC_STATS_PROCESSOR,
        ],
    )?;
    let finalize = RetryingNode::new(FINAL_REPORT_GENERATOR, Arc::new(finalize), policy);
    graph.register(
        FINAL_REPORT_GENERATOR,
        Arc::new(finalize),
        &[DRAFT_REPORT_GENERATOR],
    )?;
    graph.register(
        PDF_CONVERTER,
        Arc::new(PdfConverter::new(Arc::clone(&components.renderer))),
        &[FINAL_REPORT_GENERATOR],
    )?;

    graph.build()
}

/// A finished report run
#[derive(Debug)]
pub struct GeneratedReport {
    pub output_path: PathBuf,
    pub generated_at: DateTime<Utc>,
    /// Full final state, including intermediate tables and both report texts
    pub state: ReportState,
}

/// A compiled report graph plus its per-request budget
pub struct ReportPipeline {
    graph: CompiledGraph,
    timeout: Option<Duration>,
}

impl ReportPipeline {
    pub fn new(components: &PipelineComponents, settings: &Settings) -> Result<Self, ReportError> {
        Ok(Self {
            graph: build_report_graph(components, settings)?,
            timeout: settings.pipeline.request_timeout(),
        })
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Run one validated request through the graph
    pub async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        log::info!(
            "Generating report for {} ({})",
            request.address,
            request.property_type
        );
        let state = self
            .graph
            .run_with_timeout(request.initial_state(), self.timeout)
            .await?;
        let output_path = PathBuf::from(state.text(keys::OUTPUT_PATH)?);
        let generated_at = Utc::now();

        log::info!(
            "Report for {} written to {} at {}",
            request.address,
            output_path.display(),
            generated_at.to_rfc3339()
        );
        Ok(GeneratedReport {
            output_path,
            generated_at,
            state,
        })
    }
}
