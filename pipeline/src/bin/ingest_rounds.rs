use std::path::PathBuf;
use std::process::ExitCode;

use api::StatsClient;
use clap::Parser;
use database::{RoundStore, SqliteRoundStore};
use pipeline::{CliOverrides, IngestRun, PipelineConfig, PipelineError};

#[derive(Parser, Debug)]
#[command(about = "Harvest finished round statistics into the local store")]
struct Params {
    /// YAML file with `api` and `database` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ingest this single round instead of reconciling
    #[arg(short, long)]
    round: Option<i64>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    overrides: CliOverrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ingestion failed [{}]: {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Params) -> Result<(), PipelineError> {
    let config = PipelineConfig::load(args.config.as_deref(), &args.overrides)?;
    let client = StatsClient::new(config.api.client_config())?;
    let store = SqliteRoundStore::connect(&config.database).await?;
    store.ensure_schema().await?;

    let mut ingest = IngestRun::new(&client, &store, config.api.run_options());

    if let Some(round_id) = args.round {
        let round = ingest.ingest_round(round_id).await?;
        println!(
            "{}: peak players {:?}, {} metrics",
            round.metadata,
            round.playercounts.as_ref().and_then(|counts| counts.peak()),
            round.stats.as_ref().map_or(0, |stats| stats.len())
        );
        return Ok(());
    }

    let report = ingest.run().await?;
    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => log::warn!("could not serialize run report: {e}"),
        }
    } else {
        println!("{}: {} rows upserted", store.table_name(database::Table::Metadata), report.metadata_upserted);
        println!("{}: {} rows upserted", store.table_name(database::Table::Rounds), report.rounds_upserted);
    }
    if let Some(remaining) = client.rate_limit_remaining() {
        log::info!("rate limit remaining: {remaining}");
    }
    Ok(())
}
