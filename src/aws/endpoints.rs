//! Base URL resolution for the AWS services this crate talks to.

use super::signer::encode_path;

/// AWS services addressed by the clients in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsService {
    /// Amazon S3 object storage.
    S3,
    /// Bedrock model invocation (`bedrock-runtime`).
    BedrockRuntime,
    /// Knowledge base retrieval (`bedrock-agent-runtime`).
    BedrockAgentRuntime,
    /// Knowledge base administration (`bedrock-agent`).
    BedrockAgent,
}

impl AwsService {
    /// Service name used in the SigV4 credential scope.
    pub fn signing_name(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::BedrockRuntime | Self::BedrockAgentRuntime | Self::BedrockAgent => "bedrock",
        }
    }

    /// Endpoint prefix, also used to label errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::BedrockRuntime => "bedrock-runtime",
            Self::BedrockAgentRuntime => "bedrock-agent-runtime",
            Self::BedrockAgent => "bedrock-agent",
        }
    }

    /// S3 signs the canonical URI as sent; every other service double-encodes it.
    pub(crate) fn double_encodes_uri(self) -> bool {
        !matches!(self, Self::S3)
    }
}

/// Optional base URL overrides, one per service.
#[derive(Debug, Clone, Default)]
pub struct ServiceEndpoints {
    /// Override for S3 (switches to path-style addressing).
    pub s3: Option<String>,
    /// Override for `bedrock-runtime`.
    pub bedrock_runtime: Option<String>,
    /// Override for `bedrock-agent-runtime`.
    pub bedrock_agent_runtime: Option<String>,
    /// Override for `bedrock-agent`.
    pub bedrock_agent: Option<String>,
}

impl ServiceEndpoints {
    /// Point every service at the same base URL.
    pub fn all(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            s3: Some(base_url.clone()),
            bedrock_runtime: Some(base_url.clone()),
            bedrock_agent_runtime: Some(base_url.clone()),
            bedrock_agent: Some(base_url),
        }
    }

    fn override_for(&self, service: AwsService) -> Option<&str> {
        match service {
            AwsService::S3 => self.s3.as_deref(),
            AwsService::BedrockRuntime => self.bedrock_runtime.as_deref(),
            AwsService::BedrockAgentRuntime => self.bedrock_agent_runtime.as_deref(),
            AwsService::BedrockAgent => self.bedrock_agent.as_deref(),
        }
    }

    /// Base URL (no trailing slash) for a regional service.
    pub fn base_url(&self, service: AwsService, region: &str) -> String {
        match self.override_for(service) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.{region}.amazonaws.com", service.name()),
        }
    }

    /// Full URL for an S3 object.
    ///
    /// Uses virtual-hosted style against AWS and path style against an override.
    pub fn s3_object_url(&self, bucket: &str, key: &str, region: &str) -> String {
        let key = encode_path(key);
        match self.override_for(AwsService::S3) {
            Some(url) => format!("{}/{bucket}/{key}", url.trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_hosts_are_derived_per_service() {
        let endpoints = ServiceEndpoints::default();
        assert_eq!(
            endpoints.base_url(AwsService::BedrockAgentRuntime, "us-east-1"),
            "https://bedrock-agent-runtime.us-east-1.amazonaws.com"
        );
        assert_eq!(
            endpoints.base_url(AwsService::BedrockRuntime, "eu-west-1"),
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
        assert_eq!(AwsService::BedrockAgent.signing_name(), "bedrock");
    }

    #[test]
    fn s3_urls_switch_to_path_style_under_override() {
        let default = ServiceEndpoints::default();
        assert_eq!(
            default.s3_object_url("docs", "documents/a b.md", "us-east-1"),
            "https://docs.s3.us-east-1.amazonaws.com/documents/a%20b.md"
        );

        let local = ServiceEndpoints::all("http://127.0.0.1:4566/");
        assert_eq!(
            local.s3_object_url("docs", "documents/guide.pdf", "us-east-1"),
            "http://127.0.0.1:4566/docs/documents/guide.pdf"
        );
    }
}
