//! Signed HTTP access to AWS services.
//!
//! Requests are signed with AWS Signature Version 4 using pure-Rust `hmac` and `sha2`, and
//! dispatched through a shared `reqwest` client.

pub mod client;
pub mod endpoints;
pub mod signer;

pub use client::{AwsClient, AwsError};
pub use endpoints::{AwsService, ServiceEndpoints};
pub use signer::{Credentials, SigningRequest};

/// AWS settings pointing every service at a mock server.
#[cfg(test)]
pub(crate) fn test_config(base_url: &str) -> crate::config::AwsConfig {
    crate::config::AwsConfig {
        region: "us-east-1".into(),
        credentials: Credentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("session".into()),
        },
        endpoints: ServiceEndpoints::all(base_url),
    }
}
