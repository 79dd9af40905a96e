use crate::aws::{Credentials, ServiceEndpoints};
use std::env;
use thiserror::Error;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_SERVER_PORT: u16 = 8080;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the query service and access gate.
///
/// Built once at process entry and handed to the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret compared against the `x-api-key` header.
    pub api_key: String,
    /// Generation model identifier passed to Bedrock runtime.
    pub model_id: String,
    /// Knowledge base queried for passages.
    pub knowledge_base_id: String,
    /// HTTP port for the service binary.
    pub server_port: u16,
    /// AWS region, credentials, and endpoint overrides.
    pub aws: AwsConfig,
}

/// Settings shared by every AWS-backed client.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// Region used for endpoint resolution and request signing.
    pub region: String,
    /// Static credentials read from the standard AWS variables.
    pub credentials: Credentials,
    /// Optional base URL overrides (LocalStack, tests).
    pub endpoints: ServiceEndpoints,
}

impl Config {
    /// Read `.env` (when present) and then load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        tracing::debug!(
            model_id = %config.model_id,
            knowledge_base_id = %config.knowledge_base_id,
            region = %config.aws.region,
            server_port = config.server_port,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "API_KEY")?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("API_KEY".into()));
        }

        Ok(Self {
            api_key,
            model_id: required(&lookup, "BEDROCK_MODEL_ID")?,
            knowledge_base_id: required(&lookup, "KNOWLEDGE_BASE_ID")?,
            server_port: optional(&lookup, "SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_SERVER_PORT),
            aws: AwsConfig::from_lookup(&lookup)?,
        })
    }
}

impl AwsConfig {
    /// Read `.env` (when present) and load AWS settings from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load AWS settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = optional(&lookup, "AWS_REGION")
            .or_else(|| optional(&lookup, "AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = Credentials {
            access_key_id: required(&lookup, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: required(&lookup, "AWS_SECRET_ACCESS_KEY")?,
            session_token: optional(&lookup, "AWS_SESSION_TOKEN"),
        };

        let endpoints = ServiceEndpoints {
            s3: optional(&lookup, "S3_ENDPOINT_URL"),
            bedrock_runtime: optional(&lookup, "BEDROCK_RUNTIME_ENDPOINT_URL"),
            bedrock_agent_runtime: optional(&lookup, "BEDROCK_AGENT_RUNTIME_ENDPOINT_URL"),
            bedrock_agent: optional(&lookup, "BEDROCK_AGENT_ENDPOINT_URL"),
        };

        Ok(Self {
            region,
            credentials,
            endpoints,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}
