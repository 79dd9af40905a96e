//! Upload, register, index, wait.

use super::clock::Clock;
use super::discover::{DOCUMENT_PREFIX, DocumentFile, discover_documents};
use crate::aws::AwsError;
use crate::knowledge_base::{DataSourceSpec, IngestionAdmin, IngestionJob, IngestionJobStatus};
use crate::storage::{ObjectStore, content_type_for};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Delay between job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Longest time to wait for a job to finish.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Role handed to the data source until a provisioned role is wired in.
pub const PLACEHOLDER_ROLE_ARN: &str = "arn:aws:iam::ACCOUNT_ID:role/city-desk-kb-role-dev";

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The local documents directory is absent.
    #[error("Documents directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
    /// Data-source registration was rejected.
    #[error("Failed to create data source: {0}")]
    DataSource(#[source] AwsError),
    /// The ingestion job could not be started.
    #[error("Failed to start ingestion job: {0}")]
    StartJob(#[source] AwsError),
}

/// Where and how to ingest.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Knowledge base receiving the data source.
    pub knowledge_base_id: String,
    /// Destination bucket for uploads.
    pub bucket: String,
    /// Name of the data source to create.
    pub data_source_name: String,
    /// Role the knowledge base assumes to read the bucket.
    pub role_arn: String,
    /// Delay between job status checks.
    pub poll_interval: Duration,
    /// Longest time to wait for the job.
    pub timeout: Duration,
}

impl IngestionSettings {
    /// Settings with the default data-source name, placeholder role, and timings.
    pub fn new(knowledge_base_id: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            bucket: bucket.into(),
            data_source_name: "nyc-service-documents".to_string(),
            role_arn: PLACEHOLDER_ROLE_ARN.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How an ingestion run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// Nothing was uploaded, so nothing was registered.
    NoDocuments,
    /// The job reached `COMPLETED`.
    Completed,
    /// The job reached `FAILED`.
    Failed,
    /// The job did not finish before the timeout.
    TimedOut,
}

impl IngestionOutcome {
    /// Whether the run should exit successfully.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::NoDocuments)
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    /// Documents uploaded.
    pub uploaded: usize,
    /// Documents that failed to read or upload.
    pub skipped: usize,
    /// Data source created for this run.
    pub data_source_id: Option<String>,
    /// Ingestion job started for this run.
    pub job_id: Option<String>,
    /// Terminal state.
    pub outcome: IngestionOutcome,
}

/// Drives a single ingestion run against injected storage, admin, and clock handles.
pub struct IngestionDriver {
    store: Arc<dyn ObjectStore>,
    admin: Arc<dyn IngestionAdmin>,
    clock: Arc<dyn Clock>,
    settings: IngestionSettings,
}

impl IngestionDriver {
    /// Assemble a driver.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        admin: Arc<dyn IngestionAdmin>,
        clock: Arc<dyn Clock>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            store,
            admin,
            clock,
            settings,
        }
    }

    /// Upload everything under `documents_dir`, then index it.
    pub async fn run(&self, documents_dir: &Path) -> Result<IngestionReport, IngestError> {
        if !documents_dir.exists() {
            return Err(IngestError::MissingDirectory(documents_dir.to_path_buf()));
        }

        let documents = discover_documents(documents_dir);
        tracing::debug!(found = documents.len(), dir = %documents_dir.display(), "Discovered documents");
        let uploaded = self.upload_documents(&documents).await;
        let skipped = documents.len() - uploaded;
        tracing::info!(uploaded, skipped, bucket = %self.settings.bucket, "Uploaded documents");

        if uploaded == 0 {
            tracing::warn!(
                "No documents were uploaded. Check file extensions and directory contents."
            );
            return Ok(IngestionReport {
                uploaded,
                skipped,
                data_source_id: None,
                job_id: None,
                outcome: IngestionOutcome::NoDocuments,
            });
        }

        let spec = DataSourceSpec {
            name: self.settings.data_source_name.clone(),
            description: format!("NYC service documents from {}", self.settings.bucket),
            bucket: self.settings.bucket.clone(),
            inclusion_prefix: DOCUMENT_PREFIX.to_string(),
            role_arn: self.settings.role_arn.clone(),
        };
        let data_source_id = self
            .admin
            .create_data_source(&self.settings.knowledge_base_id, &spec)
            .await
            .map_err(IngestError::DataSource)?;
        let job = self
            .admin
            .start_ingestion_job(&self.settings.knowledge_base_id, &data_source_id)
            .await
            .map_err(IngestError::StartJob)?;

        let outcome = self.wait_for_completion(&job).await;
        Ok(IngestionReport {
            uploaded,
            skipped,
            data_source_id: Some(data_source_id),
            job_id: Some(job.job_id),
            outcome,
        })
    }

    /// Upload each document independently; returns how many succeeded.
    pub async fn upload_documents(&self, documents: &[DocumentFile]) -> usize {
        let mut uploaded = 0;
        for document in documents {
            if self.upload_document(document).await {
                uploaded += 1;
            }
        }
        uploaded
    }

    async fn upload_document(&self, document: &DocumentFile) -> bool {
        let bucket = &self.settings.bucket;
        tracing::info!(
            path = %document.path.display(),
            "Uploading to s3://{bucket}/{}",
            document.key
        );
        let body = match tokio::fs::read(&document.path).await {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(path = %document.path.display(), error = %err, "Error reading document");
                return false;
            }
        };
        match self
            .store
            .put_object(bucket, &document.key, body, content_type_for(&document.path))
            .await
        {
            Ok(()) => {
                tracing::info!(key = %document.key, "Successfully uploaded");
                true
            }
            Err(err) => {
                tracing::error!(path = %document.path.display(), error = %err, "Error uploading document");
                false
            }
        }
    }

    /// Poll the job until it completes, fails, or the timeout elapses.
    ///
    /// Unrecognised statuses and status-check errors keep the loop going.
    pub async fn wait_for_completion(&self, job: &IngestionJob) -> IngestionOutcome {
        let IngestionSettings {
            knowledge_base_id,
            poll_interval,
            timeout,
            ..
        } = &self.settings;
        let started = self.clock.elapsed();

        while self.clock.elapsed().saturating_sub(started) < *timeout {
            match self
                .admin
                .get_ingestion_job_status(knowledge_base_id, job)
                .await
            {
                Ok(IngestionJobStatus::Completed) => {
                    tracing::info!(job_id = %job.job_id, "Ingestion job completed successfully");
                    return IngestionOutcome::Completed;
                }
                Ok(IngestionJobStatus::Failed) => {
                    tracing::error!(job_id = %job.job_id, "Ingestion job failed");
                    return IngestionOutcome::Failed;
                }
                Ok(status @ (IngestionJobStatus::Starting | IngestionJobStatus::InProgress)) => {
                    tracing::info!(job_id = %job.job_id, %status, "Ingestion job in progress, waiting");
                }
                Ok(status) => {
                    tracing::warn!(job_id = %job.job_id, %status, "Unknown ingestion job status");
                }
                Err(err) => {
                    tracing::error!(job_id = %job.job_id, error = %err, "Error checking ingestion job status");
                }
            }
            self.clock.sleep(*poll_interval).await;
        }

        tracing::error!(
            job_id = %job.job_id,
            timeout_secs = timeout.as_secs(),
            "Ingestion job timed out"
        );
        IngestionOutcome::TimedOut
    }
}
