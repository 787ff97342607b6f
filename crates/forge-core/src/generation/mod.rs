//! Chat/generation client contract.
//!
//! The session store only consumes the [`ChatMessage`] and [`GeneratedCode`]
//! values a generation produces. How the text is generated lives behind the
//! [`GenerationClient`] trait; this module also carries the prompt template
//! and the extraction of fenced code blocks from the model's reply.

mod extract;
mod prompt;

pub use extract::extract_generated_code;
pub use prompt::{DEFAULT_HISTORY_WINDOW, build_component_prompt};

use crate::error::Result;
use crate::session::{ChatMessage, GeneratedCode};
use async_trait::async_trait;

/// Input of one generation round.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// What the user just asked for.
    pub content: String,
    /// Most recent chat messages, oldest first.
    pub recent_history: Vec<ChatMessage>,
    /// The code currently shown in the editor.
    pub current_code: GeneratedCode,
}

impl GenerationRequest {
    /// Builds a request keeping only the last `window` messages of `history`.
    pub fn new(
        content: impl Into<String>,
        history: &[ChatMessage],
        current_code: GeneratedCode,
        window: usize,
    ) -> Self {
        let start = history.len().saturating_sub(window);
        Self {
            content: content.into(),
            recent_history: history[start..].to_vec(),
            current_code,
        }
    }
}

/// Output of one generation round.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// The full reply text, stored as the assistant message.
    pub response_text: String,
    /// Code extracted from the reply, `None` when it contained no code block.
    pub code: Option<GeneratedCode>,
}

impl GenerationResponse {
    /// Wraps a raw model reply, extracting any fenced code from it.
    pub fn from_text(response_text: impl Into<String>) -> Self {
        let response_text = response_text.into();
        let code = extract_generated_code(&response_text);
        Self {
            response_text,
            code,
        }
    }
}

/// Produces assistant replies and generated code for chat requests.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Runs one generation round.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Generation` (retryable or not) when the model
    /// could not be reached or produced no text.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_keeps_only_recent_messages() {
        let history: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage::user(format!("m{i}")))
            .collect();

        let request = GenerationRequest::new("next", &history, GeneratedCode::default(), 5);

        let kept: Vec<&str> = request
            .recent_history
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(kept, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[test]
    fn test_request_with_short_history_keeps_everything() {
        let history = vec![ChatMessage::user("only")];
        let request = GenerationRequest::new("next", &history, GeneratedCode::default(), 5);
        assert_eq!(request.recent_history.len(), 1);
    }

    #[test]
    fn test_response_from_text_extracts_code() {
        let response =
            GenerationResponse::from_text("Here you go\n```jsx\n<button/>\n```\nEnjoy.");
        assert_eq!(response.code.unwrap().markup, "<button/>");

        let plain = GenerationResponse::from_text("Sorry, can you clarify?");
        assert!(plain.code.is_none());
    }
}
