//! AI collaborator interface
//!
//! The engine never talks to a chat-completion API itself. A host supplies an
//! [`AiClient`]; [`ask_about_selection`] records the question against the
//! selection before awaiting the answer, then merges the answer by id.

use crate::{Annotation, AnnotationController, AnnotationError, PendingSelection, Result};
use dom_model::DomTree;
use std::future::Future;
use store::AnnotationStore;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("AI settings are not configured")]
    NotConfigured,

    #[error("AI request failed: {0}")]
    Request(String),

    #[error("AI returned an empty answer")]
    EmptyAnswer,
}

/// Answers questions about selected book text
pub trait AiClient {
    fn ask(
        &self,
        question: &str,
        selected_text: &str,
        context: &str,
    ) -> impl Future<Output = std::result::Result<String, AiError>> + Send;
}

/// Ask a question about a selection and record the answer as an AI chat.
///
/// The selection is serialized and wrapped, and a thinking entry is added to
/// the feed, before the client is awaited. On failure the placeholder and
/// any spans are removed and the error is returned.
pub async fn ask_about_selection<S, C>(
    controller: &mut AnnotationController<S>,
    tree: &mut DomTree,
    selection: PendingSelection,
    question: &str,
    client: &C,
    context: &str,
) -> Result<Annotation>
where
    S: AnnotationStore,
    C: AiClient,
{
    let question = question.trim();
    if question.is_empty() {
        return Err(AnnotationError::InvalidOperation(
            "question must not be empty".to_string(),
        ));
    }

    let pending = controller.create_ai_chat(tree, selection, question)?;
    let answer = client
        .ask(pending.question(), pending.selected_text(), context)
        .await
        .and_then(|answer| {
            let answer = answer.trim().to_string();
            if answer.is_empty() {
                Err(AiError::EmptyAnswer)
            } else {
                Ok(answer)
            }
        });

    match answer {
        Ok(answer) => controller.resolve_ai_chat(pending, answer),
        Err(e) => {
            warn!("AI question failed: {}", e);
            controller.fail_ai_chat(tree, pending)?;
            Err(e.into())
        }
    }
}
