//! HTTP surface for City Desk.
//!
//! - `POST /query` – Answer `{ "q": string, "top_k"?: int }` from the knowledge base. Responds
//!   with `{ answer, citations, retrieval_time_ms, query }`, `400 { error }` for a missing
//!   question or unreadable body, and `500 { error, message }` when a backing service fails.
//! - `POST /authorize` – Evaluate an authorizer event (`headers`, `methodArn`) against the
//!   configured API key and return an `execute-api:Invoke` policy document.
//!
//! The two routes share nothing but the process; the gate is not applied to `/query` here.

use crate::auth::{AccessGate, AuthorizerRequest, Effect, PolicyResponse};
use crate::query::{DEFAULT_TOP_K, QueryApi, QueryError, QueryResponse};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

struct AppState<Q> {
    query: Arc<Q>,
    gate: Arc<AccessGate>,
}

impl<Q> Clone for AppState<Q> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            gate: self.gate.clone(),
        }
    }
}

/// Build the HTTP router exposing the query handler and the access gate.
pub fn create_router<Q>(query: Arc<Q>, gate: AccessGate) -> Router
where
    Q: QueryApi + 'static,
{
    Router::new()
        .route("/query", post(answer_query::<Q>))
        .route("/authorize", post(authorize::<Q>))
        .with_state(AppState {
            query,
            gate: Arc::new(gate),
        })
}

/// Request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    /// Question text.
    #[serde(default)]
    q: Option<String>,
    /// Number of passages to retrieve (defaults to 6).
    #[serde(default)]
    top_k: Option<u32>,
}

async fn answer_query<Q>(
    State(state): State<AppState<Q>>,
    body: Bytes,
) -> Result<Json<QueryResponse>, AppError>
where
    Q: QueryApi,
{
    let request: QueryRequest = if body.iter().all(u8::is_ascii_whitespace) {
        QueryRequest {
            q: None,
            top_k: None,
        }
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::BadRequest(format!("Invalid request body: {err}")))?
    };

    let question = request.q.unwrap_or_default();
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    let response = state.query.answer(&question, top_k).await?;
    Ok(Json(response))
}

async fn authorize<Q>(State(state): State<AppState<Q>>, body: Bytes) -> Json<PolicyResponse>
where
    Q: QueryApi,
{
    match serde_json::from_slice::<Value>(&body) {
        Ok(event) => Json(state.gate.authorize(&AuthorizerRequest::from_event(&event))),
        Err(err) => {
            tracing::error!(error = %err, "Error in authorizer");
            Json(PolicyResponse::new(Effect::Deny, String::new()))
        }
    }
}

enum AppError {
    BadRequest(String),
    Query(QueryError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Query(err @ QueryError::MissingQuery) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            Self::Query(err) => {
                tracing::error!(error = %err, "Error processing query");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error",
                        "message": err.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        Self::Query(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::auth::AccessGate;
    use crate::aws::AwsError;
    use crate::query::{Citation, QueryApi, QueryError, QueryResponse};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use reqwest::StatusCode as UpstreamStatus;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum Behavior {
        Answer,
        FailRetrieval,
    }

    struct StubQueryService {
        calls: Mutex<Vec<(String, u32)>>,
        behavior: Behavior,
    }

    impl StubQueryService {
        fn new(behavior: Behavior) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                behavior,
            }
        }

        async fn recorded_calls(&self) -> Vec<(String, u32)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl QueryApi for StubQueryService {
        async fn answer(&self, question: &str, top_k: u32) -> Result<QueryResponse, QueryError> {
            if question.is_empty() {
                return Err(QueryError::MissingQuery);
            }
            self.calls.lock().await.push((question.to_string(), top_k));
            match self.behavior {
                Behavior::Answer => Ok(QueryResponse {
                    answer: "Call 311.".into(),
                    citations: vec![Citation {
                        text: "Call 311 for noise complaints.".into(),
                        source_url: String::new(),
                        title: "Noise".into(),
                        section: String::new(),
                        relevance_score: 0.61,
                    }],
                    retrieval_time_ms: 12,
                    query: Some(question.to_string()),
                }),
                Behavior::FailRetrieval => Err(QueryError::Retrieval(AwsError::UnexpectedStatus {
                    service: "bedrock-agent-runtime",
                    status: UpstreamStatus::TOO_MANY_REQUESTS,
                    body: "ThrottlingException".into(),
                })),
            }
        }
    }

    fn router_with(behavior: Behavior) -> (Router, Arc<StubQueryService>) {
        let service = Arc::new(StubQueryService::new(behavior));
        (create_router(service.clone(), AccessGate::new("abc123")), service)
    }

    async fn post(app: Router, path: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn query_route_returns_answer_and_citations() {
        let (app, service) = router_with(Behavior::Answer);
        let (status, json) = post(app, "/query", r#"{"q": "Who handles noise?", "top_k": 3}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], "Call 311.");
        assert_eq!(json["query"], "Who handles noise?");
        assert_eq!(json["retrieval_time_ms"], 12);
        assert_eq!(json["citations"][0]["source_url"], "");
        assert_eq!(json["citations"][0]["title"], "Noise");
        assert_eq!(
            service.recorded_calls().await,
            vec![("Who handles noise?".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn top_k_defaults_to_six() {
        let (app, service) = router_with(Behavior::Answer);
        let (status, _) = post(app, "/query", r#"{"q": "Parking rules?"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            service.recorded_calls().await,
            vec![("Parking rules?".to_string(), 6)]
        );
    }

    #[tokio::test]
    async fn empty_question_is_bad_request() {
        let (app, service) = router_with(Behavior::Answer);
        let (status, json) = post(app, "/query", r#"{"q": "", "top_k": 6}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "error": "Missing required parameter: q (query)" }));
        assert!(service.recorded_calls().await.is_empty());

        let (app, _) = router_with(Behavior::Answer);
        let (status, _) = post(app, "/query", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (app, _) = router_with(Behavior::Answer);
        let (status, json) = post(app, "/query", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            json["error"]
                .as_str()
                .is_some_and(|message| message.starts_with("Invalid request body"))
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_internal_error_with_message() {
        let (app, _) = router_with(Behavior::FailRetrieval);
        let (status, json) = post(app, "/query", r#"{"q": "Trash schedule?"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        assert!(
            json["message"]
                .as_str()
                .is_some_and(|message| message.contains("ThrottlingException"))
        );
    }

    #[tokio::test]
    async fn authorize_route_returns_policy() {
        let arn = "arn:aws:execute-api:us-east-1:123456789012:api/dev/POST/query";
        let (app, _) = router_with(Behavior::Answer);
        let event = json!({ "headers": { "x-api-key": "wrong" }, "methodArn": arn });
        let (status, json) = post(app, "/authorize", &event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["principalId"], "user");
        assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Deny");
        assert_eq!(json["policyDocument"]["Statement"][0]["Resource"], arn);

        let (app, _) = router_with(Behavior::Answer);
        let event = json!({ "headers": { "x-api-key": "abc123" }, "methodArn": arn });
        let (_, json) = post(app, "/authorize", &event.to_string()).await;
        assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Allow");
    }

    #[tokio::test]
    async fn malformed_authorizer_event_is_denied() {
        let (app, _) = router_with(Behavior::Answer);
        let (status, json) = post(app, "/authorize", "[]").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Deny");
    }

    #[tokio::test]
    async fn deny_keeps_the_requested_resource() {
        let arn = "arn:aws:execute-api:us-east-1:123456789012:api/dev/POST/query";
        for event in [
            json!({ "headers": null, "methodArn": arn }),
            json!({ "headers": { "x-api-key": null }, "methodArn": arn }),
            json!({ "headers": { "x-api-key": ["abc123"] }, "methodArn": arn }),
        ] {
            let (app, _) = router_with(Behavior::Answer);
            let (status, json) = post(app, "/authorize", &event.to_string()).await;
            assert_eq!(status, StatusCode::OK);
            let statement = &json["policyDocument"]["Statement"][0];
            assert_eq!(statement["Effect"], "Deny", "event: {event}");
            assert_eq!(statement["Resource"], arn, "event: {event}");
        }
    }
}
