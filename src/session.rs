//! One counseling conversation, turn by turn

use std::sync::Arc;

use crate::corpus::Dataset;
use crate::config::DEFAULT_TOP_K;
use crate::gate::{TurnAction, TurnGate, TurnKind};
use crate::mood::Mood;
use crate::prompt::build_messages;
use crate::provider::ChatProvider;
use crate::retriever::Retriever;
use crate::Result;

/// Result of handling one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Gate classification, `None` when there was no input
    pub kind: Option<TurnKind>,
    /// Text to show and speak, if any
    pub reply: Option<String>,
    pub action: TurnAction,
    /// Mood reading of the transcript, `None` when there was no input
    pub mood: Option<Mood>,
}

impl TurnOutcome {
    const fn no_input() -> Self {
        Self {
            kind: None,
            reply: None,
            action: TurnAction::Reprompt,
            mood: None,
        }
    }

    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self.action, TurnAction::End)
    }
}

/// Gates, retrieves and generates replies for a conversation
pub struct Session {
    gate: TurnGate,
    retriever: Retriever,
    chat: Arc<dyn ChatProvider>,
    top_k: usize,
    dataset_filter: Option<Dataset>,
}

impl Session {
    #[must_use]
    pub fn new(gate: TurnGate, retriever: Retriever, chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            gate,
            retriever,
            chat,
            top_k: DEFAULT_TOP_K,
            dataset_filter: None,
        }
    }

    /// Number of examples retrieved per normal turn
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Only retrieve examples from one dataset
    #[must_use]
    pub fn with_dataset_filter(mut self, dataset: Option<Dataset>) -> Self {
        self.dataset_filter = dataset;
        self
    }

    #[must_use]
    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Handle one user transcript
    ///
    /// Gated turns (stop, filler, high risk) get their fixed reply without
    /// touching the retriever or chat model. Normal turns retrieve examples,
    /// assemble the prompt and ask the chat model.
    ///
    /// # Errors
    ///
    /// Returns error if embedding the query or the chat completion fails
    pub async fn handle(&self, transcript: &str) -> Result<TurnOutcome> {
        let text = transcript.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::no_input());
        }

        let kind = self.gate.classify(text);
        let mood = Mood::assess(text);
        if let Some(reply) = kind.reply() {
            tracing::info!(?kind, "gated turn");
            return Ok(TurnOutcome {
                kind: Some(kind),
                reply: Some(reply.to_string()),
                action: kind.action(),
                mood: Some(mood),
            });
        }

        let examples = self
            .retriever
            .search(text, self.top_k, self.dataset_filter.as_ref())
            .await?;
        let messages = build_messages(text, &examples);

        let reply = self.chat.complete(&messages).await?;
        tracing::info!(examples = examples.len(), reply_len = reply.len(), "turn answered");

        Ok(TurnOutcome {
            kind: Some(kind),
            reply: (!reply.is_empty()).then_some(reply),
            action: kind.action(),
            mood: Some(mood),
        })
    }
}
