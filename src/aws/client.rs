//! Shared signed HTTP transport.

use super::endpoints::{AwsService, ServiceEndpoints};
use super::signer::{
    Credentials, SigningRequest, SigningTime, authorization_header, encode_path, hex_sha256,
    uri_encode,
};
use crate::config::AwsConfig;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while talking to AWS.
#[derive(Debug, Error)]
pub enum AwsError {
    /// Endpoint URL failed to parse.
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service responded with a non-success status code.
    #[error("Unexpected {service} response ({status}): {body}")]
    UnexpectedStatus {
        /// Endpoint prefix of the failing service.
        service: &'static str,
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body did not have the expected shape.
    #[error("Malformed {service} response: {message}")]
    MalformedResponse {
        /// Endpoint prefix of the failing service.
        service: &'static str,
        /// What was wrong with the payload.
        message: String,
    },
}

/// Signs and sends requests to AWS service endpoints.
pub struct AwsClient {
    http: Client,
    region: String,
    credentials: Credentials,
    endpoints: ServiceEndpoints,
}

impl AwsClient {
    /// Build a client from loaded AWS settings.
    pub fn new(config: &AwsConfig) -> Result<Self, AwsError> {
        let http = Client::builder().user_agent("city-desk/0.1").build()?;
        tracing::debug!(
            region = %config.region,
            has_session_token = config.credentials.session_token.is_some(),
            "Initialized AWS HTTP client"
        );
        Ok(Self {
            http,
            region: config.region.clone(),
            credentials: config.credentials.clone(),
            endpoints: config.endpoints.clone(),
        })
    }

    /// Region requests are signed for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Configured endpoint overrides.
    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Join a service base URL with an already-encoded path.
    pub fn service_url(&self, service: AwsService, path: &str) -> String {
        let base = self.endpoints.base_url(service, &self.region);
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    /// Send a JSON request (or an empty body) and decode the JSON response.
    pub async fn send_json<T>(
        &self,
        service: AwsService,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, AwsError>
    where
        T: DeserializeOwned,
    {
        let (payload, content_type) = match body {
            Some(value) => (
                serde_json::to_vec(value).map_err(|err| AwsError::MalformedResponse {
                    service: service.name(),
                    message: format!("failed to encode request: {err}"),
                })?,
                Some("application/json"),
            ),
            None => (Vec::new(), None),
        };
        let bytes = self
            .send(service, method, url, payload, content_type)
            .await?;
        serde_json::from_slice(&bytes).map_err(|err| AwsError::MalformedResponse {
            service: service.name(),
            message: err.to_string(),
        })
    }

    /// Sign and send a request, returning the raw response body on success.
    pub async fn send(
        &self,
        service: AwsService,
        method: Method,
        url: &str,
        payload: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Vec<u8>, AwsError> {
        let parsed = Url::parse(url).map_err(|err| AwsError::InvalidEndpoint(err.to_string()))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(AwsError::InvalidEndpoint(url.to_string())),
        };

        let time = SigningTime::now();
        let payload_hash = hex_sha256(&payload);
        let mut headers = vec![
            ("host".to_string(), host),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), time.amz_date.clone()),
        ];
        if let Some(content_type) = content_type {
            headers.push(("content-type".to_string(), content_type.to_string()));
        }
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let canonical_uri = if service.double_encodes_uri() {
            encode_path(parsed.path())
        } else {
            parsed.path().to_string()
        };
        let canonical_query = canonical_query(&parsed);
        let authorization = authorization_header(
            &self.credentials,
            &self.region,
            service.signing_name(),
            &time,
            &SigningRequest {
                method: method.as_str(),
                canonical_uri: &canonical_uri,
                canonical_query: &canonical_query,
                headers: &headers,
                payload_hash: &payload_hash,
            },
        );

        let mut request = self
            .http
            .request(method.clone(), parsed)
            .header("authorization", authorization);
        for (name, value) in headers.iter().filter(|(name, _)| name != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        if content_type == Some("application/json") {
            request = request.header("accept", "application/json");
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            let body = response.text().await.unwrap_or_default();
            let error = AwsError::UnexpectedStatus {
                service: service.name(),
                status,
                body,
            };
            tracing::error!(error = %error, method = %method, "AWS request failed");
            Err(error)
        }
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<String> = url
        .query_pairs()
        .map(|(key, value)| format!("{}={}", uri_encode(&key), uri_encode(&value)))
        .collect();
    pairs.sort();
    pairs.join("&")
}
