//! API-key access gate emitting `execute-api:Invoke` policy documents.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Header carrying the caller's key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authorizer invocation payload.
#[derive(Debug, Clone, Default)]
pub struct AuthorizerRequest {
    /// String-valued request headers as delivered by the gateway.
    pub headers: HashMap<String, String>,
    /// Resource identifier of the invoked method.
    pub method_arn: String,
}

impl AuthorizerRequest {
    /// Read an authorizer event leniently.
    ///
    /// The resource comes from `methodArn`, else `routeArn`. A `headers` value that is not an
    /// object contributes no headers, and non-string header values are dropped.
    pub fn from_event(event: &Value) -> Self {
        let method_arn = ["methodArn", "routeArn"]
            .iter()
            .find_map(|key| event.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        let headers = event
            .get("headers")
            .and_then(Value::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(name, value)| {
                        value.as_str().map(|value| (name.clone(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            headers,
            method_arn,
        }
    }

    /// Look up a header, preferring an exact name match over an ASCII case-insensitive one.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Policy statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Let the request through.
    Allow,
    /// Reject the request.
    Deny,
}

/// Authorizer response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse {
    /// Principal the decision applies to.
    pub principal_id: String,
    /// IAM policy granting or denying the invocation.
    pub policy_document: PolicyDocument,
}

/// IAM policy document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version.
    pub version: String,
    /// Policy statements; always exactly one.
    pub statement: Vec<PolicyStatement>,
}

/// Single policy statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Always `execute-api:Invoke`.
    pub action: String,
    /// Allow or deny.
    pub effect: Effect,
    /// Resource the decision covers.
    pub resource: String,
}

impl PolicyResponse {
    /// Build the single-statement policy for `effect` on `resource`.
    pub fn new(effect: Effect, resource: impl Into<String>) -> Self {
        Self {
            principal_id: "user".to_string(),
            policy_document: PolicyDocument {
                version: "2012-10-17".to_string(),
                statement: vec![PolicyStatement {
                    action: "execute-api:Invoke".to_string(),
                    effect,
                    resource: resource.into(),
                }],
            },
        }
    }

    /// Effect of the sole statement.
    pub fn effect(&self) -> Effect {
        self.policy_document
            .statement
            .first()
            .map(|statement| statement.effect)
            .unwrap_or(Effect::Deny)
    }
}

/// Compares the request's API key against one shared secret.
#[derive(Clone)]
pub struct AccessGate {
    secret: String,
}

impl AccessGate {
    /// Gate requests on `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Allow only when the `x-api-key` header equals the secret exactly.
    pub fn authorize(&self, request: &AuthorizerRequest) -> PolicyResponse {
        let effect = match request.header(API_KEY_HEADER) {
            Some(key) if !key.is_empty() && key == self.secret => {
                tracing::info!("API key validation successful");
                Effect::Allow
            }
            Some(key) => {
                tracing::warn!(key_length = key.len(), "API key validation failed");
                Effect::Deny
            }
            None => {
                tracing::warn!("API key header missing");
                Effect::Deny
            }
        };
        PolicyResponse::new(effect, request.method_arn.clone())
    }
}
