//! Integration tests for the report graph
//!
//! These tests drive the full pipeline end to end using mock components.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use submarket_rs::adk::error::{FetchError, ModelError, ReportError};
use submarket_rs::adk::model::{Content, GenerationConfig, Model, Part};
use submarket_rs::adk::tool::Tool;
use submarket_rs::submarket::analysis::{AnalysisResponse, AnalysisTables, Analyst, LlmAnalyst};
use submarket_rs::submarket::batch::{run_batch, BatchEntry};
use submarket_rs::submarket::collectors::{
    DemographicsSource, ListingKind, ListingQuery, PropertySource,
};
use submarket_rs::submarket::config::Settings;
use submarket_rs::submarket::input::ReportRequest;
use submarket_rs::submarket::pipeline::{node_names, PipelineComponents, ReportPipeline};
use submarket_rs::submarket::render::{PdfRenderer, Renderer};
use submarket_rs::submarket::state::{keys, Record};

const ADDRESS: &str = "123 Main St, Austin, TX 78701";

// ============================================================================
// Mock Components
// ============================================================================

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

/// Fixed listings served through limit/offset pages
struct FixtureSource {
    sales: Vec<Record>,
    rentals: Vec<Record>,
    queries: Mutex<Vec<(ListingKind, usize, usize)>>,
}

impl FixtureSource {
    fn new() -> Self {
        let listing = |bedrooms: u32, bathrooms: u32, sqft: u32, price: u32| {
            record(json!({
                "id": format!("{bedrooms}-{bathrooms}-{sqft}"),
                "addressLine1": format!("{sqft} Oak Ave"),
                "bedrooms": bedrooms,
                "bathrooms": bathrooms,
                "squareFootage": sqft,
                "yearBuilt": 1998,
                "hoa": {"fee": 25},
                "price": price,
                "daysOnMarket": 12
            }))
        };
        Self {
            sales: vec![
                listing(3, 2, 1550, 400_000),
                // size match only
                listing(5, 4, 1600, 650_000),
                listing(5, 4, 3000, 900_000),
                listing(1, 1, 700, 250_000),
                // rooms match only
                listing(2, 1, 2000, 500_000),
            ],
            rentals: vec![
                listing(3, 2, 1450, 2_100),
                listing(4, 3, 2600, 3_400),
                listing(3, 3, 1500, 2_300),
            ],
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PropertySource for FixtureSource {
    async fn property_record(&self, address: &str) -> Result<Record, FetchError> {
        assert_eq!(address, ADDRESS);
        Ok(record(json!({
            "id": "123-Main-St,-Austin,-TX-78701",
            "addressLine1": "123 Main St",
            "bedrooms": 3,
            "bathrooms": 2,
            "squareFootage": 1500,
            "yearBuilt": 2004,
            "hoa": {"fee": 50},
            "lastSalePrice": 385000,
            "owner": {"names": ["Jane Doe"], "type": "Individual"}
        })))
    }

    async fn listings_page(
        &self,
        kind: ListingKind,
        query: &ListingQuery,
    ) -> Result<Vec<Record>, FetchError> {
        self.queries
            .lock()
            .unwrap()
            .push((kind, query.offset, query.limit));
        let all = match kind {
            ListingKind::Sale => &self.sales,
            ListingKind::Rental => &self.rentals,
        };
        let page = all.iter().skip(query.offset).take(query.limit);
        Ok(page.cloned().collect())
    }
}

#[async_trait]
impl DemographicsSource for FixtureSource {
    async fn demographic_record(&self, _address: &str) -> Result<Record, FetchError> {
        Ok(record(json!({
            "ID": "0",
            "MEDHINC_CY": 78500,
            "TOTHH_CY": 4120,
            "sourceCountry": "US"
        })))
    }
}

/// Drafts with one analyzer call, then finalizes. The first `final_failures`
/// finalize calls fail.
struct RoutingModel {
    final_failures: usize,
    final_calls: AtomicUsize,
}

impl RoutingModel {
    fn new(final_failures: usize) -> Self {
        Self {
            final_failures,
            final_calls: AtomicUsize::new(0),
        }
    }

    fn text(text: &str) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::Text(text.to_string())],
        }
    }
}

#[async_trait]
impl Model for RoutingModel {
    async fn generate_content(
        &self,
        history: &[Content],
        _config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ReportError> {
        let prompt = history.last().map(|c| c.text()).unwrap_or_default();

        if tools.is_some() {
            if prompt.contains("Observation:") {
                return Ok(Self::text(
                    "Final Answer: # Draft\n\n## Sale Market\n- Median price 500000",
                ));
            }
            return Ok(Content {
                role: "model".to_string(),
                parts: vec![Part::FunctionCall {
                    name: "data_analyzer".to_string(),
                    args: json!({"query": "What is the median sale price?"}),
                }],
            });
        }

        let call = self.final_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.final_failures {
            return Err(ModelError::Api {
                provider: "OpenAI".to_string(),
                status: 500,
                message: "overloaded".to_string(),
            }
            .into());
        }
        assert!(prompt.contains("# Draft"));
        Ok(Self::text(
            "# Property Submarket Analysis Report\n\n\
             ## Executive Summary\n\n\
             The median sale price is **$500,000**.\n\n\
             | Metric | Value |\n|---|---|\n| Median | 500000 |\n",
        ))
    }
}

/// Answers from the sale stats table and remembers the table sizes it saw
struct StatsAnalyst {
    seen: Mutex<Vec<(usize, usize)>>,
}

#[async_trait]
impl Analyst for StatsAnalyst {
    async fn analyze(
        &self,
        _query: &str,
        tables: &AnalysisTables,
    ) -> Result<AnalysisResponse, ReportError> {
        let listings = tables.get(keys::SALE_LISTINGS).map_or(0, |t| t.len());
        let comps = tables.get(keys::SALE_COMPS).map_or(0, |t| t.len());
        self.seen.lock().unwrap().push((listings, comps));

        let median = tables
            .get(keys::SALE_LISTINGS_STATS)
            .and_then(|t| t.first())
            .and_then(|row| row.get("medianPrice"))
            .and_then(Value::as_f64);
        Ok(match median {
            Some(m) => AnalysisResponse::Number(m),
            None => AnalysisResponse::Error("no stats".to_string()),
        })
    }
}

/// Drafts one chart through a model-backed analyst and finalizes by echoing
/// the draft
struct ChartingModel;

impl ChartingModel {
    fn chart_path(prompt: &str) -> Option<&str> {
        let end = prompt.rfind(".png")? + ".png".len();
        let start = prompt[..end].rfind('"')? + 1;
        Some(&prompt[start..end])
    }
}

#[async_trait]
impl Model for ChartingModel {
    async fn generate_content(
        &self,
        history: &[Content],
        _config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ReportError> {
        let system = history.first().map(|c| c.text()).unwrap_or_default();
        let prompt = history.last().map(|c| c.text()).unwrap_or_default();

        if system.starts_with("You are a data analyst") {
            assert!(system.contains("## sale_listings (5 rows)"));
            let plan = json!({
                "type": "chart",
                "table": "sale_listings",
                "chart": "scatter",
                "x": "squareFootage",
                "y": "price"
            });
            return Ok(RoutingModel::text(&plan.to_string()));
        }
        if tools.is_some() {
            return Ok(match Self::chart_path(&prompt) {
                Some(path) => RoutingModel::text(&format!(
                    "Final Answer: # Draft\n\n## Sales\n![Price by size]({})\n",
                    path
                )),
                None => Content {
                    role: "model".to_string(),
                    parts: vec![Part::FunctionCall {
                        name: "data_analyzer".to_string(),
                        args: json!({"query": "Plot sale price against living area"}),
                    }],
                },
            });
        }
        let draft = prompt.split_once("Draft Report:\n").map_or("", |(_, d)| d);
        Ok(RoutingModel::text(&draft.replace("# Draft", "# Report")))
    }
}

struct Harness {
    source: Arc<FixtureSource>,
    model: Arc<RoutingModel>,
    analyst: Arc<StatsAnalyst>,
    output_dir: tempfile::TempDir,
}

impl Harness {
    fn new(final_failures: usize) -> Self {
        Self {
            source: Arc::new(FixtureSource::new()),
            model: Arc::new(RoutingModel::new(final_failures)),
            analyst: Arc::new(StatsAnalyst {
                seen: Mutex::new(Vec::new()),
            }),
            output_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn pipeline(&self, settings: &Settings) -> ReportPipeline {
        let components = PipelineComponents {
            property_source: self.source.clone(),
            demographics_source: self.source.clone(),
            model: self.model.clone(),
            analyst: self.analyst.clone(),
            renderer: Arc::new(PdfRenderer::new(self.output_dir.path())),
        };
        ReportPipeline::new(&components, settings).unwrap()
    }

    fn pdf_count(&self) -> usize {
        std::fs::read_dir(self.output_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn paged_settings() -> Settings {
    let mut settings = Settings::default();
    settings.rentcast.page_limit = 2;
    settings
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_report_end_to_end() {
    let harness = Harness::new(0);
    let pipeline = harness.pipeline(&paged_settings());
    let request = ReportRequest::parse(ADDRESS, "Single Family").unwrap();

    let report = pipeline.generate(&request).await.unwrap();
    let state = &report.state;

    // Every sale page was fetched, the last one short
    let sale_offsets: Vec<usize> = harness
        .source
        .queries
        .lock()
        .unwrap()
        .iter()
        .filter(|(kind, _, _)| *kind == ListingKind::Sale)
        .map(|(_, offset, _)| *offset)
        .collect();
    assert_eq!(sale_offsets, vec![0, 2, 4]);

    let sales = state.records(keys::SALE_LISTINGS).unwrap();
    let comps = state.records(keys::SALE_COMPS).unwrap();
    assert_eq!(sales.len(), 5);
    assert_eq!(comps.len(), 3);
    assert!(comps.iter().all(|comp| sales.contains(comp)));
    let comp_sizes: Vec<&Value> = comps.iter().map(|c| &c["squareFootage"]).collect();
    assert_eq!(comp_sizes, vec![&json!(1550), &json!(1600), &json!(2000)]);

    // Stats cover every listing, not just the comps
    let stats = state.records(keys::SALE_LISTINGS_STATS).unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0]["medianPrice"], json!(500000.0));
    assert_eq!(stats[0]["totalListings"], json!(5));
    assert_eq!(stats[0]["minPrice"], json!(250_000));

    let rentals = state.records(keys::RENTAL_LISTINGS).unwrap();
    assert_eq!(rentals.len(), 3);
    assert!(rentals[0].contains_key("rent") && !rentals[0].contains_key("price"));
    assert_eq!(rentals[0]["hoaFee"], json!(25));
    let rental_stats = state.first_record(keys::RENTAL_LISTINGS_STATS).unwrap();
    assert_eq!(rental_stats["medianRent"], json!(2300.0));

    let subject = state.records(keys::SUBJECT_PROPERTY).unwrap();
    assert_eq!(subject.len(), 1);
    assert_eq!(subject[0]["ownerType"], json!("Individual"));
    assert_eq!(subject[0]["hoaFee"], json!(50));

    let demographics = state.records(keys::DEMOGRAPHIC_STATS).unwrap();
    assert_eq!(demographics.len(), 1);
    assert_eq!(demographics[0].len(), 25);
    assert_eq!(demographics[0]["MEDHINC_CY"], json!(78500));
    assert_eq!(demographics[0]["POPGRW20CY"], Value::Null);

    // The analyzer saw the processed tables
    assert_eq!(harness.analyst.seen.lock().unwrap().as_slice(), [(5, 3)]);
    let draft = state.text(keys::DRAFT_REPORT).unwrap();
    assert!(draft.starts_with("# Draft"));
    assert!(state
        .text(keys::FINAL_REPORT)
        .unwrap()
        .starts_with("# Property Submarket Analysis Report"));

    assert!(report.output_path.exists());
    assert_eq!(
        state.text(keys::OUTPUT_PATH).unwrap(),
        report.output_path.to_string_lossy()
    );
    let bytes = std::fs::read(&report.output_path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_graph_has_single_sink() {
    let harness = Harness::new(0);
    let pipeline = harness.pipeline(&Settings::default());
    assert_eq!(
        pipeline.graph().terminal_nodes(),
        vec![node_names::PDF_CONVERTER]
    );
}

#[tokio::test]
async fn test_final_stage_retries_then_succeeds() {
    let harness = Harness::new(2);
    let pipeline = harness.pipeline(&Settings::default());
    let request = ReportRequest::parse(ADDRESS, "Condo").unwrap();

    let report = pipeline.generate(&request).await.unwrap();
    assert_eq!(harness.model.final_calls.load(Ordering::SeqCst), 3);
    assert!(report.output_path.exists());
}

#[tokio::test]
async fn test_exhausted_final_stage_skips_render() {
    let harness = Harness::new(usize::MAX);
    let mut settings = Settings::default();
    settings.pipeline.max_retries = 1;
    let pipeline = harness.pipeline(&settings);
    let request = ReportRequest::parse(ADDRESS, "Condo").unwrap();

    let err = pipeline.generate(&request).await.unwrap_err();
    match err {
        ReportError::StageExhausted(e) => {
            assert_eq!(e.stage, node_names::FINAL_REPORT_GENERATOR);
            assert_eq!(e.attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.model.final_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.pdf_count(), 0);
}

#[tokio::test]
async fn test_batch_continues_after_bad_entry() {
    let harness = Harness::new(0);
    let pipeline = harness.pipeline(&Settings::default());
    let entries = vec![
        BatchEntry {
            address: ADDRESS.to_string(),
            property_type: "Single Family".to_string(),
        },
        BatchEntry {
            address: "somewhere in Austin".to_string(),
            property_type: "Condo".to_string(),
        },
        BatchEntry {
            address: ADDRESS.to_string(),
            property_type: "Townhouse".to_string(),
        },
    ];

    let summary = run_batch(&pipeline, &entries).await;
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.succeeded.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "somewhere in Austin");
    assert!(!summary.all_succeeded());

    let paths: Vec<&PathBuf> = summary.succeeded.iter().map(|(_, p)| p).collect();
    assert_ne!(paths[0], paths[1]);
    assert_eq!(harness.pdf_count(), 2);
}

#[tokio::test]
async fn test_chart_request_reaches_pdf() {
    let output_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    let model = Arc::new(ChartingModel);
    let chart_dir = output_dir.path().join("charts");
    let analyst = LlmAnalyst::new(model.clone()).with_chart_dir(&chart_dir);
    let components = PipelineComponents {
        property_source: source.clone(),
        demographics_source: source,
        model,
        analyst: Arc::new(analyst),
        renderer: Arc::new(PdfRenderer::new(output_dir.path())),
    };
    let pipeline = ReportPipeline::new(&components, &Settings::default()).unwrap();
    let request = ReportRequest::parse(ADDRESS, "Single Family").unwrap();

    let report = pipeline.generate(&request).await.unwrap();

    let final_report = report.state.text(keys::FINAL_REPORT).unwrap();
    let path = ChartingModel::chart_path(final_report).unwrap();
    assert!(final_report.starts_with("# Report"));
    assert!(PathBuf::from(path).starts_with(&chart_dir));
    assert!(std::fs::read(path).unwrap().starts_with(b"\x89PNG"));

    // Same report with the chart missing: only the caption is drawn
    let caption_only = PdfRenderer::new(output_dir.path())
        .render(&final_report.replace(path, "charts/missing.png"))
        .unwrap();
    let embedded = std::fs::read(&report.output_path).unwrap().len();
    assert!(embedded > std::fs::read(caption_only).unwrap().len() + 1000);
}
