//! Prompt assembly and answer cleanup.

const ANSWER_PREFIX: &str = "Answer:";

/// Build the grounded-answer prompt for `question` over `passages`.
///
/// Passages are joined with a blank line between them.
pub fn build_prompt<S: AsRef<str>>(question: &str, passages: &[S]) -> String {
    let context = passages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant for NYC residents. Answer the user's question based on the provided context.

Context:
{context}

Question: {question}

Instructions:
1. Answer the question using only the information provided in the context
2. Be specific and helpful
3. If the context doesn't contain enough information to answer the question, say so
4. Keep your answer concise but informative
5. Focus on practical steps and information NYC residents need

Answer:"
    )
}

/// Trim model output and drop a leading `Answer:` echoed from the prompt.
pub fn strip_answer_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(ANSWER_PREFIX)
        .map(str::trim)
        .unwrap_or(trimmed)
        .to_string()
}
