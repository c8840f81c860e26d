use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use evnorm_convert::DiagnosticsRecorder;
use evnorm_core::RawRecord;
use evnorm_pipeline::PipelineConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "evnorm-cli")]
#[command(about = "Event normalizer command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a raw JSON record and print the result.
    Convert {
        file: PathBuf,
        /// Convert every event instead of only the first.
        #[arg(long)]
        all: bool,
        /// Date used to infer the year of year-less dates (YYYY-MM-DD).
        #[arg(long)]
        reference_date: Option<NaiveDate>,
    },
    /// Process the inbox once.
    Run,
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Convert {
            file,
            all,
            reference_date,
        } => {
            tracing::info!(file = %file.display(), all, "converting record");
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let record = RawRecord::from_json_str(&text).with_context(|| format!("parsing {}", file.display()))?;
            let mut engine = PipelineConfig::from_env().build_engine(Arc::new(DiagnosticsRecorder::new()))?;
            if let Some(date) = reference_date {
                engine = engine.with_reference_date(date);
            }
            let output = if all {
                serde_json::to_string_pretty(&engine.convert_all(&record)?)?
            } else {
                serde_json::to_string_pretty(&engine.convert_to_activity(&record)?)?
            };
            println!("{output}");
        }
        Commands::Run => {
            let summary = evnorm_pipeline::run_once_from_env().await?;
            println!(
                "run complete: run_id={} envelopes={} events={} failures={} alerts={} reports={}",
                summary.run_id,
                summary.envelopes,
                summary.events_converted,
                summary.conversion_failures,
                summary.alerts,
                summary.reports_dir
            );
        }
        Commands::Serve => evnorm_web::serve_from_env().await?,
    }

    Ok(())
}
