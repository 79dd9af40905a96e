//! Ingestion driver: upload local documents, register them with the knowledge base, and wait
//! for indexing to finish.
use anyhow::{Context, Result};
use clap::Parser;
use citydesk::{
    aws::AwsClient,
    config::AwsConfig,
    ingest::{IngestionDriver, IngestionSettings, PLACEHOLDER_ROLE_ARN, TokioClock},
    knowledge_base::BedrockIngestionAdmin,
    logging,
    storage::S3ObjectStore,
};
use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

#[derive(Parser)]
#[command(
    name = "city-desk-ingest",
    about = "Ingest NYC service documents into the City Desk knowledge base"
)]
struct Cli {
    /// Knowledge base ID.
    #[arg(long)]
    knowledge_base_id: String,
    /// S3 bucket name for documents.
    #[arg(long)]
    bucket_name: String,
    /// Local directory containing documents.
    #[arg(long)]
    documents_dir: PathBuf,
    /// Name for the data source.
    #[arg(long, default_value = "nyc-service-documents")]
    data_source_name: String,
    /// Role the knowledge base assumes to read the bucket.
    #[arg(long, default_value = PLACEHOLDER_ROLE_ARN)]
    role_arn: String,
    /// Minutes to wait for the ingestion job.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_minutes: u64,
    /// Seconds between job status checks.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: u64,
}

impl Cli {
    fn settings(&self) -> IngestionSettings {
        IngestionSettings {
            data_source_name: self.data_source_name.clone(),
            role_arn: self.role_arn.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.timeout_minutes.saturating_mul(60)),
            ..IngestionSettings::new(self.knowledge_base_id.clone(), self.bucket_name.clone())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init_tracing();
    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("Data ingestion failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!("Error during data ingestion: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let aws = AwsConfig::load().context("failed to load AWS configuration")?;
    let client = Arc::new(AwsClient::new(&aws).context("failed to build AWS client")?);

    let settings = cli.settings();
    let driver = IngestionDriver::new(
        Arc::new(S3ObjectStore::new(client.clone())),
        Arc::new(BedrockIngestionAdmin::new(client)),
        Arc::new(TokioClock::new()),
        settings,
    );

    let report = driver.run(&cli.documents_dir).await?;
    tracing::info!(
        uploaded = report.uploaded,
        skipped = report.skipped,
        data_source_id = report.data_source_id.as_deref(),
        job_id = report.job_id.as_deref(),
        outcome = ?report.outcome,
        "Ingestion run finished"
    );
    if report.outcome == citydesk::ingest::IngestionOutcome::Completed {
        tracing::info!("Data ingestion completed successfully");
    }
    Ok(report.outcome.is_success())
}
