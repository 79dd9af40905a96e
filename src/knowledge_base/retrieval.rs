//! Passage retrieval from a Bedrock knowledge base.

use crate::aws::{AwsClient, AwsError, AwsService, signer::uri_encode};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Provenance fields attached to a passage at ingestion time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassageMetadata {
    /// Original document URL.
    pub source_url: Option<String>,
    /// Document title.
    pub title: Option<String>,
    /// Section heading within the document.
    pub section: Option<String>,
}

/// A ranked passage returned by the knowledge base.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    /// Passage text; empty when the service returned none.
    pub text: String,
    /// Relevance score reported by the service.
    pub score: f64,
    /// Passage provenance.
    pub metadata: PassageMetadata,
}

/// Semantic search over an ingested index.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `result_count` passages relevant to `query`.
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        query: &str,
        result_count: u32,
    ) -> Result<Vec<RetrievalResult>, AwsError>;
}

/// [`Retriever`] backed by the `bedrock-agent-runtime` Retrieve API.
pub struct KnowledgeBaseRetriever {
    client: Arc<AwsClient>,
}

impl KnowledgeBaseRetriever {
    /// Wrap a shared AWS client.
    pub fn new(client: Arc<AwsClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    content: WireContent,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct WireContent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[async_trait]
impl Retriever for KnowledgeBaseRetriever {
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        query: &str,
        result_count: u32,
    ) -> Result<Vec<RetrievalResult>, AwsError> {
        let url = self.client.service_url(
            AwsService::BedrockAgentRuntime,
            &format!("knowledgebases/{}/retrieve", uri_encode(knowledge_base_id)),
        );
        let body = json!({
            "retrievalQuery": { "text": query },
            "retrievalConfiguration": {
                "vectorSearchConfiguration": { "numberOfResults": result_count }
            }
        });

        let response: RetrieveResponse = self
            .client
            .send_json(AwsService::BedrockAgentRuntime, Method::POST, &url, Some(&body))
            .await
            .inspect_err(|err| tracing::error!(error = %err, "Error retrieving documents"))?;

        let results: Vec<RetrievalResult> = response
            .retrieval_results
            .into_iter()
            .map(map_result)
            .collect();
        tracing::info!(
            knowledge_base_id,
            requested = result_count,
            retrieved = results.len(),
            "Retrieved documents"
        );
        Ok(results)
    }
}

fn map_result(result: WireResult) -> RetrievalResult {
    let WireResult {
        content,
        metadata,
        score,
    } = result;
    let metadata = metadata
        .or(content.metadata)
        .map(|map| PassageMetadata {
            source_url: string_field(&map, "source_url"),
            title: string_field(&map, "title"),
            section: string_field(&map, "section"),
        })
        .unwrap_or_default();

    RetrievalResult {
        text: content.text.unwrap_or_default(),
        score: score.unwrap_or(0.0),
        metadata,
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::test_config;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn retrieve_sends_query_and_maps_metadata() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/knowledgebases/KB123/retrieve")
                    .json_body(json!({
                        "retrievalQuery": { "text": "How do I get a parking permit?" },
                        "retrievalConfiguration": {
                            "vectorSearchConfiguration": { "numberOfResults": 3 }
                        }
                    }));
                then.status(200).json_body(json!({
                    "retrievalResults": [
                        {
                            "content": { "text": "Apply online through DOT." },
                            "metadata": {
                                "source_url": "https://nyc.gov/dot/permits",
                                "title": "Parking Permits",
                                "section": "Applying"
                            },
                            "score": 0.82
                        },
                        {
                            "content": {
                                "text": "Bring proof of residency.",
                                "metadata": { "title": "Residency" }
                            }
                        }
                    ]
                }));
            })
            .await;

        let client = Arc::new(AwsClient::new(&test_config(&server.base_url())).expect("client"));
        let results = KnowledgeBaseRetriever::new(client)
            .retrieve("KB123", "How do I get a parking permit?", 3)
            .await
            .expect("results");

        mock.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "Apply online through DOT.");
        assert!((results[0].score - 0.82).abs() < f64::EPSILON);
        assert_eq!(
            results[0].metadata.source_url.as_deref(),
            Some("https://nyc.gov/dot/permits")
        );
        assert_eq!(results[0].metadata.section.as_deref(), Some("Applying"));

        // falls back to content-level metadata; missing fields stay absent
        assert_eq!(results[1].metadata.title.as_deref(), Some("Residency"));
        assert!(results[1].metadata.source_url.is_none());
        assert_eq!(results[1].score, 0.0);
    }

    #[tokio::test]
    async fn empty_response_yields_no_results() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/knowledgebases/KB123/retrieve");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = Arc::new(AwsClient::new(&test_config(&server.base_url())).expect("client"));
        let results = KnowledgeBaseRetriever::new(client)
            .retrieve("KB123", "anything", 6)
            .await
            .expect("results");
        assert!(results.is_empty());
    }
}
