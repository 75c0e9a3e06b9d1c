//! Question supply for matches: a pluggable bank provider, validity and
//! duplicate filtering, a built-in fallback pool, and a per-match batch cache.

/// Built-in pool used when the external bank is empty or unreachable.
pub mod fallback;

use std::{collections::HashSet, error::Error, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{error::ServiceError, model::Question};

/// Error raised by a question bank provider.
#[derive(Debug, Error)]
#[error("question provider failure: {message}")]
pub struct ProviderError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ProviderError {
    /// Provider failure with a description only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Provider failure wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// External content provider for teacher-authored question banks.
///
/// Consumed, never implemented, by this engine. Implementations should return
/// the bank in a stable order: batch selection is deterministic, which is what
/// lets every client of one match derive the identical sequence.
pub trait QuestionProvider: Send + Sync {
    /// Fetch the active questions authored by `author_id`.
    fn fetch_active_questions(
        &self,
        author_id: &str,
    ) -> BoxFuture<'static, Result<Vec<Question>, ProviderError>>;
}

/// Supplies the ordered question batch for each match.
///
/// Batches are cached per match code so one process never re-deals a
/// different sequence mid-match, even if the bank changes underneath.
pub struct QuestionSource {
    provider: Option<Arc<dyn QuestionProvider>>,
    batches: DashMap<String, Arc<Vec<Question>>>,
}

impl QuestionSource {
    /// Source backed by an external bank provider, with the built-in fallback.
    pub fn new(provider: Arc<dyn QuestionProvider>) -> Self {
        Self {
            provider: Some(provider),
            batches: DashMap::new(),
        }
    }

    /// Source that only ever deals from the built-in fallback pool.
    pub fn fallback_only() -> Self {
        Self {
            provider: None,
            batches: DashMap::new(),
        }
    }

    /// The ordered batch dealt to `code`, loading and caching it on first use.
    ///
    /// Never fails on provider trouble (the fallback pool covers that); the
    /// only error is an empty batch even after falling back, which would leave
    /// the match with nothing to play.
    pub async fn batch_for_match(
        &self,
        code: &str,
        author_id: &str,
        count: usize,
    ) -> Result<Arc<Vec<Question>>, ServiceError> {
        if let Some(batch) = self.batches.get(code) {
            return Ok(batch.value().clone());
        }

        let selected = self.load_questions(author_id, count).await;
        if selected.is_empty() {
            return Err(ServiceError::InvalidQuestionState(format!(
                "no usable questions available for match `{code}`"
            )));
        }

        let batch = Arc::new(selected);
        // Two racing loads keep whichever batch landed first.
        let stored = self
            .batches
            .entry(code.to_string())
            .or_insert(batch)
            .value()
            .clone();
        Ok(stored)
    }

    /// Drop the cached batch for a torn-down match.
    pub fn forget_match(&self, code: &str) {
        self.batches.remove(code);
    }

    async fn load_questions(&self, author_id: &str, count: usize) -> Vec<Question> {
        if let Some(provider) = &self.provider {
            match provider.fetch_active_questions(author_id).await {
                Ok(fetched) if !fetched.is_empty() => {
                    let selected = sanitize(fetched, count);
                    if !selected.is_empty() {
                        return selected;
                    }
                    warn!(
                        author = %author_id,
                        "bank returned no usable questions; using built-in pool"
                    );
                }
                Ok(_) => {
                    info!(author = %author_id, "bank is empty; using built-in pool");
                }
                Err(err) => {
                    warn!(
                        author = %author_id,
                        error = %err,
                        "question provider failed; using built-in pool"
                    );
                }
            }
        }

        sanitize(fallback::pool(), count)
    }
}

/// Keep the first `count` valid questions, dropping malformed entries and
/// duplicate statements. Order is preserved so the selection is deterministic
/// for a given bank.
fn sanitize(candidates: Vec<Question>, count: usize) -> Vec<Question> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for question in candidates {
        if !question.is_valid() {
            warn!(question = %question.id, "dropping malformed question");
            continue;
        }
        if !seen.insert(normalize_text(&question.text)) {
            debug!(question = %question.id, "dropping duplicate question text");
            continue;
        }
        selected.push(question);
        if selected.len() == count {
            break;
        }
    }

    selected
}

/// Collapse whitespace and case so trivially re-worded copies dedup together.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use crate::model::AnswerLetter;

    use super::*;

    struct ScriptedProvider {
        result: Result<Vec<Question>, String>,
    }

    impl QuestionProvider for ScriptedProvider {
        fn fetch_active_questions(
            &self,
            _author_id: &str,
        ) -> BoxFuture<'static, Result<Vec<Question>, ProviderError>> {
            let result = self
                .result
                .clone()
                .map_err(ProviderError::new);
            Box::pin(async move { result })
        }
    }

    fn question(id: &str, text: &str) -> Question {
        Question {
            id: id.into(),
            text: text.into(),
            option_a: "1".into(),
            option_b: "2".into(),
            option_c: "3".into(),
            option_d: "4".into(),
            correct: AnswerLetter::A,
            difficulty: "easy".into(),
            topic: "test".into(),
            created_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_statements_are_dealt_once() {
        let provider = Arc::new(ScriptedProvider {
            result: Ok(vec![
                question("q1", "What is 2+2?"),
                question("q2", "  what   is 2+2? "),
                question("q3", "What is 3+3?"),
            ]),
        });
        let source = QuestionSource::new(provider);

        let batch = source.batch_for_match("AB12CD", "prof", 10).await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3"]);
    }

    #[tokio::test]
    async fn malformed_questions_are_filtered_out() {
        let mut broken = question("q-bad", "Broken?");
        broken.option_b = "".into();
        let provider = Arc::new(ScriptedProvider {
            result: Ok(vec![broken, question("q-ok", "Fine?")]),
        });
        let source = QuestionSource::new(provider);

        let batch = source.batch_for_match("AB12CD", "prof", 10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "q-ok");
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_the_builtin_pool() {
        let provider = Arc::new(ScriptedProvider {
            result: Err("bank offline".into()),
        });
        let source = QuestionSource::new(provider);

        let batch = source.batch_for_match("AB12CD", "prof", 5).await.unwrap();
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(Question::is_valid));
    }

    #[tokio::test]
    async fn batch_is_stable_per_match_code() {
        let source = QuestionSource::fallback_only();
        let first = source.batch_for_match("AB12CD", "prof", 5).await.unwrap();
        let second = source.batch_for_match("AB12CD", "prof", 5).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn truncates_to_the_requested_count() {
        let source = QuestionSource::fallback_only();
        let batch = source.batch_for_match("AB12CD", "prof", 3).await.unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn fallback_pool_is_entirely_valid_and_deduplicated() {
        let pool = fallback::pool();
        assert!(pool.len() >= 20);
        assert!(pool.iter().all(Question::is_valid));

        let mut seen = HashSet::new();
        for question in &pool {
            assert!(
                seen.insert(normalize_text(&question.text)),
                "duplicate fallback question: {}",
                question.text
            );
        }
    }
}
