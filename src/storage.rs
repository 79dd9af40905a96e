//! Object storage for uploaded documents.

use crate::aws::{AwsClient, AwsError, AwsService};
use async_trait::async_trait;
use reqwest::Method;
use std::path::Path;
use std::sync::Arc;

/// Destination for document uploads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `bucket`/`key`, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AwsError>;
}

/// Amazon S3 implementation of [`ObjectStore`].
pub struct S3ObjectStore {
    client: Arc<AwsClient>,
}

impl S3ObjectStore {
    /// Wrap a shared AWS client.
    pub fn new(client: Arc<AwsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AwsError> {
        let url = self
            .client
            .endpoints()
            .s3_object_url(bucket, key, self.client.region());
        let size = body.len();
        self.client
            .send(AwsService::S3, Method::PUT, &url, body, Some(content_type))
            .await?;
        tracing::debug!(bucket, key, size, "Object stored");
        Ok(())
    }
}

/// MIME type for an uploaded document, keyed on its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
