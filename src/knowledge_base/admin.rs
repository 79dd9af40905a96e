//! Data-source registration and ingestion-job control (`bedrock-agent`).

use crate::aws::{AwsClient, AwsError, AwsService, signer::uri_encode};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Parameters for registering an S3 data source.
#[derive(Debug, Clone)]
pub struct DataSourceSpec {
    /// Data-source name shown in the console.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Bucket holding the documents.
    pub bucket: String,
    /// Key prefix restricting what gets ingested.
    pub inclusion_prefix: String,
    /// Role the service assumes to read the bucket.
    pub role_arn: String,
}

/// Handle to a started ingestion job.
///
/// Jobs are addressed through their data source, so both ids travel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionJob {
    /// Ingestion job identifier.
    pub job_id: String,
    /// Data source the job is ingesting.
    pub data_source_id: String,
}

/// Lifecycle state reported for an ingestion job.
///
/// Both `COMPLETE` (the spelling the admin API returns) and `COMPLETED` parse as
/// [`Completed`](Self::Completed). Unrecognised strings become [`Other`](Self::Other), which the
/// poll loop treats like `IN_PROGRESS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionJobStatus {
    /// Accepted, not yet running.
    Starting,
    /// Chunking and embedding documents.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Any status this crate does not model.
    Other(String),
}

impl From<&str> for IngestionJobStatus {
    fn from(value: &str) -> Self {
        match value {
            "STARTING" => Self::Starting,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETE" | "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for IngestionJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("STARTING"),
            Self::InProgress => f.write_str("IN_PROGRESS"),
            Self::Completed => f.write_str("COMPLETED"),
            Self::Failed => f.write_str("FAILED"),
            Self::Other(status) => f.write_str(status),
        }
    }
}

/// Control plane for knowledge-base ingestion.
#[async_trait]
pub trait IngestionAdmin: Send + Sync {
    /// Register a data source and return its identifier.
    async fn create_data_source(
        &self,
        knowledge_base_id: &str,
        spec: &DataSourceSpec,
    ) -> Result<String, AwsError>;

    /// Start ingesting a data source.
    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<IngestionJob, AwsError>;

    /// Fetch the current status of a job.
    async fn get_ingestion_job_status(
        &self,
        knowledge_base_id: &str,
        job: &IngestionJob,
    ) -> Result<IngestionJobStatus, AwsError>;
}

/// [`IngestionAdmin`] backed by the `bedrock-agent` REST API.
pub struct BedrockIngestionAdmin {
    client: Arc<AwsClient>,
}

impl BedrockIngestionAdmin {
    /// Wrap a shared AWS client.
    pub fn new(client: Arc<AwsClient>) -> Self {
        Self { client }
    }

    fn data_sources_path(knowledge_base_id: &str) -> String {
        format!("knowledgebases/{}/datasources/", uri_encode(knowledge_base_id))
    }

    fn jobs_path(knowledge_base_id: &str, data_source_id: &str) -> String {
        format!(
            "{}{}/ingestionjobs/",
            Self::data_sources_path(knowledge_base_id),
            uri_encode(data_source_id)
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDataSourceResponse {
    data_source: DataSourceBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceBody {
    data_source_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobResponse {
    ingestion_job: IngestionJobBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobBody {
    #[serde(default)]
    ingestion_job_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl IngestionAdmin for BedrockIngestionAdmin {
    async fn create_data_source(
        &self,
        knowledge_base_id: &str,
        spec: &DataSourceSpec,
    ) -> Result<String, AwsError> {
        let url = self.client.service_url(
            AwsService::BedrockAgent,
            &Self::data_sources_path(knowledge_base_id),
        );
        let body = json!({
            "clientToken": Uuid::new_v4().to_string(),
            "name": spec.name,
            "description": spec.description,
            "dataSourceConfiguration": {
                "type": "S3",
                "s3Configuration": {
                    "bucketArn": format!("arn:aws:s3:::{}", spec.bucket),
                    "inclusionPrefixes": [spec.inclusion_prefix],
                }
            },
            "roleArn": spec.role_arn,
        });

        let response: CreateDataSourceResponse = self
            .client
            .send_json(AwsService::BedrockAgent, Method::PUT, &url, Some(&body))
            .await
            .inspect_err(|err| tracing::error!(error = %err, "Error creating data source"))?;
        let data_source_id = response.data_source.data_source_id;
        tracing::info!(data_source_id = %data_source_id, name = %spec.name, "Created data source");
        Ok(data_source_id)
    }

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<IngestionJob, AwsError> {
        let url = self.client.service_url(
            AwsService::BedrockAgent,
            &Self::jobs_path(knowledge_base_id, data_source_id),
        );
        let body = json!({
            "clientToken": Uuid::new_v4().to_string(),
            "description": "Initial ingestion of NYC service documents",
        });

        let response: IngestionJobResponse = self
            .client
            .send_json(AwsService::BedrockAgent, Method::PUT, &url, Some(&body))
            .await
            .inspect_err(|err| tracing::error!(error = %err, "Error starting ingestion job"))?;
        let job_id = response
            .ingestion_job
            .ingestion_job_id
            .ok_or_else(|| AwsError::MalformedResponse {
                service: AwsService::BedrockAgent.name(),
                message: "missing ingestionJobId".to_string(),
            })?;
        tracing::info!(job_id = %job_id, "Started ingestion job");
        Ok(IngestionJob {
            job_id,
            data_source_id: data_source_id.to_string(),
        })
    }

    async fn get_ingestion_job_status(
        &self,
        knowledge_base_id: &str,
        job: &IngestionJob,
    ) -> Result<IngestionJobStatus, AwsError> {
        let url = self.client.service_url(
            AwsService::BedrockAgent,
            &format!(
                "{}{}",
                Self::jobs_path(knowledge_base_id, &job.data_source_id),
                uri_encode(&job.job_id)
            ),
        );
        let response: IngestionJobResponse = self
            .client
            .send_json(AwsService::BedrockAgent, Method::GET, &url, None)
            .await?;
        let status = response
            .ingestion_job
            .status
            .ok_or_else(|| AwsError::MalformedResponse {
                service: AwsService::BedrockAgent.name(),
                message: "missing ingestion job status".to_string(),
            })?;
        Ok(IngestionJobStatus::from(status.as_str()))
    }
}
