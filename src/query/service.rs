//! Retrieval-then-generation pipeline behind the query endpoint.

use super::citations::Citation;
use super::prompt::{build_prompt, strip_answer_prefix};
use crate::aws::{AwsClient, AwsError};
use crate::config::Config;
use crate::knowledge_base::{
    BedrockTextGenerator, GenerationParams, KnowledgeBaseRetriever, Retriever, TextGenerator,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Passages requested when the caller does not say.
pub const DEFAULT_TOP_K: u32 = 6;

/// Answer returned when retrieval finds nothing.
pub const NO_RESULTS_ANSWER: &str = "I cannot find specific information to answer your question. Please try rephrasing or contact NYC 311 for assistance.";

/// Answer returned when every retrieved passage is empty.
pub const NO_CONTEXT_ANSWER: &str = "I cannot find specific information to answer your question.";

/// Errors raised while answering a question.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The question was empty.
    #[error("Missing required parameter: q (query)")]
    MissingQuery,
    /// The knowledge base could not be searched.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] AwsError),
    /// The model could not produce an answer.
    #[error("Generation failed: {0}")]
    Generation(#[source] AwsError),
}

/// Answer payload returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Generated (or canned) answer.
    pub answer: String,
    /// One citation per passage used as context.
    pub citations: Vec<Citation>,
    /// Wall-clock time spent answering, in milliseconds.
    pub retrieval_time_ms: u64,
    /// Echo of the question; omitted on the no-results path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Question answering as seen by the HTTP surface.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Answer `question` using up to `top_k` retrieved passages.
    async fn answer(&self, question: &str, top_k: u32) -> Result<QueryResponse, QueryError>;
}

/// Retrieves passages, then asks the model to answer from them.
pub struct QueryService {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    knowledge_base_id: String,
    model_id: String,
    params: GenerationParams,
}

impl QueryService {
    /// Assemble a service from explicit clients.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn TextGenerator>,
        knowledge_base_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            generator,
            knowledge_base_id: knowledge_base_id.into(),
            model_id: model_id.into(),
            params: GenerationParams::default(),
        }
    }

    /// Build the Bedrock-backed service described by `config`.
    pub fn from_config(config: &Config, client: Arc<AwsClient>) -> Self {
        Self::new(
            Arc::new(KnowledgeBaseRetriever::new(client.clone())),
            Arc::new(BedrockTextGenerator::new(client)),
            config.knowledge_base_id.clone(),
            config.model_id.clone(),
        )
    }

    async fn generate_answer(
        &self,
        question: &str,
        passages: &[&str],
    ) -> Result<String, QueryError> {
        let prompt = build_prompt(question, passages);
        let raw = self
            .generator
            .generate(&self.model_id, &prompt, &self.params)
            .await
            .map_err(QueryError::Generation)?;
        Ok(strip_answer_prefix(&raw))
    }
}

#[async_trait]
impl QueryApi for QueryService {
    async fn answer(&self, question: &str, top_k: u32) -> Result<QueryResponse, QueryError> {
        if question.is_empty() {
            return Err(QueryError::MissingQuery);
        }

        let preview: String = question.chars().take(100).collect();
        tracing::info!(top_k, "Processing query: {preview}...");
        let start = Instant::now();

        let results = self
            .retriever
            .retrieve(&self.knowledge_base_id, question, top_k)
            .await
            .map_err(QueryError::Retrieval)?;

        if results.is_empty() {
            return Ok(QueryResponse {
                answer: NO_RESULTS_ANSWER.to_string(),
                citations: Vec::new(),
                retrieval_time_ms: elapsed_ms(start),
                query: None,
            });
        }

        let with_text: Vec<_> = results
            .iter()
            .filter(|result| !result.text.is_empty())
            .collect();
        let (answer, citations) = if with_text.is_empty() {
            (NO_CONTEXT_ANSWER.to_string(), Vec::new())
        } else {
            let passages: Vec<&str> = with_text.iter().map(|result| result.text.as_str()).collect();
            let answer = self.generate_answer(question, &passages).await?;
            let citations: Vec<Citation> = with_text.into_iter().map(Citation::from).collect();
            (answer, citations)
        };

        let total_ms = elapsed_ms(start);
        tracing::info!(
            query_length = question.len(),
            retrieval_time_ms = total_ms,
            citations_count = citations.len(),
            answer_length = answer.len(),
            "Query processed in {total_ms}ms"
        );

        Ok(QueryResponse {
            answer,
            citations,
            retrieval_time_ms: total_ms,
            query: Some(question.to_string()),
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::{PassageMetadata, RetrievalResult};
    use reqwest::StatusCode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubRetriever {
        results: Vec<RetrievalResult>,
        fail: bool,
        calls: Mutex<Vec<(String, String, u32)>>,
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(
            &self,
            knowledge_base_id: &str,
            query: &str,
            result_count: u32,
        ) -> Result<Vec<RetrievalResult>, AwsError> {
            self.calls.lock().unwrap().push((
                knowledge_base_id.to_string(),
                query.to_string(),
                result_count,
            ));
            if self.fail {
                return Err(AwsError::UnexpectedStatus {
                    service: "bedrock-agent-runtime",
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "boom".into(),
                });
            }
            Ok(self.results.clone())
        }
    }

    struct StubGenerator {
        output: String,
        prompts: Mutex<Vec<(String, String, GenerationParams)>>,
    }

    impl StubGenerator {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(
            &self,
            model_id: &str,
            prompt: &str,
            params: &GenerationParams,
        ) -> Result<String, AwsError> {
            self.prompts.lock().unwrap().push((
                model_id.to_string(),
                prompt.to_string(),
                params.clone(),
            ));
            Ok(self.output.clone())
        }
    }

    fn passage(text: &str, source_url: Option<&str>, score: f64) -> RetrievalResult {
        RetrievalResult {
            text: text.to_string(),
            score,
            metadata: PassageMetadata {
                source_url: source_url.map(str::to_string),
                title: Some("NYC Services".into()),
                section: None,
            },
        }
    }

    fn service(
        retriever: Arc<StubRetriever>,
        generator: Arc<StubGenerator>,
    ) -> QueryService {
        QueryService::new(retriever, generator, "KB1", "amazon.titan-text-express-v1")
    }

    #[tokio::test]
    async fn empty_question_makes_no_calls() {
        let retriever = Arc::new(StubRetriever::default());
        let generator = Arc::new(StubGenerator::new("unused"));
        let service = service(retriever.clone(), generator.clone());

        let err = service.answer("", DEFAULT_TOP_K).await.expect_err("empty");
        assert!(matches!(err, QueryError::MissingQuery));
        assert!(retriever.calls.lock().unwrap().is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_question_is_still_searched() {
        let retriever = Arc::new(StubRetriever::default());
        let generator = Arc::new(StubGenerator::new("unused"));
        let service = service(retriever.clone(), generator.clone());

        let response = service.answer("   ", DEFAULT_TOP_K).await.expect("response");

        assert_eq!(response.answer, NO_RESULTS_ANSWER);
        assert_eq!(
            *retriever.calls.lock().unwrap(),
            vec![("KB1".to_string(), "   ".to_string(), DEFAULT_TOP_K)]
        );
    }

    #[tokio::test]
    async fn no_results_returns_canned_answer_without_generation() {
        let retriever = Arc::new(StubRetriever::default());
        let generator = Arc::new(StubGenerator::new("unused"));
        let service = service(retriever.clone(), generator.clone());

        let response = service.answer("Where is my bus?", 4).await.expect("response");

        assert_eq!(response.answer, NO_RESULTS_ANSWER);
        assert!(response.citations.is_empty());
        assert!(response.query.is_none());
        assert_eq!(generator.calls(), 0);
        assert_eq!(
            *retriever.calls.lock().unwrap(),
            vec![("KB1".to_string(), "Where is my bus?".to_string(), 4)]
        );
    }

    #[tokio::test]
    async fn results_are_folded_into_prompt_and_cited() {
        let retriever = Arc::new(StubRetriever {
            results: vec![
                passage("Apply online.", Some("https://nyc.gov/a"), 0.9),
                passage("", Some("https://nyc.gov/empty"), 0.8),
                passage("Bring ID.", None, 0.7),
            ],
            ..StubRetriever::default()
        });
        let generator = Arc::new(StubGenerator::new("  Answer: Apply online and bring ID. "));
        let service = service(retriever, generator.clone());

        let response = service
            .answer("How do I get a permit?", DEFAULT_TOP_K)
            .await
            .expect("response");

        assert_eq!(response.answer, "Apply online and bring ID.");
        assert_eq!(response.query.as_deref(), Some("How do I get a permit?"));
        assert_eq!(response.citations.len(), 2);
        assert_eq!(response.citations[0].source_url, "https://nyc.gov/a");
        assert_eq!(response.citations[1].source_url, "");
        assert_eq!(response.citations[1].section, "");
        assert!((response.citations[1].relevance_score - 0.7).abs() < f64::EPSILON);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let (model_id, prompt, params) = &prompts[0];
        assert_eq!(model_id, "amazon.titan-text-express-v1");
        assert!(prompt.contains("Apply online.\n\nBring ID."));
        assert!(prompt.contains("Question: How do I get a permit?"));
        assert_eq!(params, &GenerationParams::default());
    }

    #[tokio::test]
    async fn answer_without_prefix_is_returned_trimmed() {
        let retriever = Arc::new(StubRetriever {
            results: vec![passage("Call 311.", None, 0.4)],
            ..StubRetriever::default()
        });
        let generator = Arc::new(StubGenerator::new("Call 311 for help.\n"));
        let response = service(retriever, generator)
            .answer("Who do I call?", 1)
            .await
            .expect("response");
        assert_eq!(response.answer, "Call 311 for help.");
    }

    #[tokio::test]
    async fn passages_without_text_skip_generation() {
        let retriever = Arc::new(StubRetriever {
            results: vec![passage("", Some("https://nyc.gov/x"), 0.5)],
            ..StubRetriever::default()
        });
        let generator = Arc::new(StubGenerator::new("unused"));
        let response = service(retriever, generator.clone())
            .answer("Anything?", 2)
            .await
            .expect("response");
        assert_eq!(response.answer, NO_CONTEXT_ANSWER);
        assert!(response.citations.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn retrieval_failure_is_reported() {
        let retriever = Arc::new(StubRetriever {
            fail: true,
            ..StubRetriever::default()
        });
        let generator = Arc::new(StubGenerator::new("unused"));
        let err = service(retriever, generator.clone())
            .answer("Anything?", 2)
            .await
            .expect_err("retrieval fails");
        assert!(matches!(err, QueryError::Retrieval(_)));
        assert!(err.to_string().contains("boom"));
        assert_eq!(generator.calls(), 0);
    }
}
