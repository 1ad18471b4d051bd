use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use submarket_rs::submarket::batch::{load_batch, run_batch};
use submarket_rs::submarket::config::Settings;
use submarket_rs::submarket::input::ReportRequest;
use submarket_rs::submarket::pipeline::{PipelineComponents, ReportPipeline};
use submarket_rs::submarket::server::{self, AppState};
use submarket_rs::submarket::telemetry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file (defaults to $SUBMARKET_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a report for one property
    Report {
        /// Street Address, City, ST ZIP
        #[arg(short, long)]
        address: String,

        #[arg(short, long, default_value = "Single Family")]
        property_type: String,
    },
    /// Generate a report for every entry of a JSON or YAML file
    Batch {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Serve the report API
    Serve {
        /// Overrides server.port from the settings
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<ReportPipeline> {
    let components = PipelineComponents::live(settings)?;
    Ok(ReportPipeline::new(&components, settings)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    telemetry::init(&settings.log_level.0);
    match Settings::source_file(args.config.as_deref()) {
        Some(file) => log::info!("Loaded settings from {}", file.display()),
        None => log::info!("Using default settings with environment overrides"),
    }

    match args.command {
        Commands::Report {
            address,
            property_type,
        } => {
            let request = ReportRequest::parse(&address, &property_type)?;
            let pipeline = build_pipeline(&settings)?;
            let report = pipeline.generate(&request).await?;
            println!("{}", report.output_path.display());
        }
        Commands::Batch { file } => {
            let entries = load_batch(&file)?;
            let pipeline = build_pipeline(&settings)?;
            let summary = run_batch(&pipeline, &entries).await;

            for (request, path) in &summary.succeeded {
                println!("ok      {} -> {}", request.address, path.display());
            }
            for (address, error) in &summary.failed {
                println!("failed  {}: {}", address, error);
            }
            if !summary.all_succeeded() {
                bail!(
                    "{} of {} batch entries failed",
                    summary.failed.len(),
                    summary.total()
                );
            }
        }
        Commands::Serve { port } => {
            let pipeline = Arc::new(build_pipeline(&settings)?);
            let host = settings
                .server
                .host
                .parse()
                .with_context(|| format!("invalid server host '{}'", settings.server.host))?;
            let addr = SocketAddr::new(host, port.unwrap_or(settings.server.port));

            server::serve(
                AppState::new(pipeline),
                settings.pipeline.output_dir.clone(),
                addr,
            )
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}
