//! Chat prompt assembly with retrieved counseling examples

use crate::provider::ChatMessage;
use crate::retriever::{RetrievalResult, display_text};

/// Examples included in one prompt
pub const MAX_EXAMPLES: usize = 3;

const EXAMPLE_SEPARATOR: &str = "\n\n---\n\n";

/// Persona and ground rules for every reply
pub const SYSTEM_PROMPT: &str = "\
You are BioPsy, a supportive CBT-oriented therapist with a warm, human tone.
Your goal is to help the user clarify their thoughts, emotions, and behaviors using reflective listening and gentle, open-ended questions.

Rules:
- Respond in Indonesian.
- Do NOT diagnose.
- Do NOT provide medical instructions or emergency procedures.
- Avoid giving direct solutions prematurely.
- Use retrieved examples only to learn STYLE, FLOW, and CBT TECHNIQUE; do NOT copy sentences verbatim.
- When reflecting, reuse the user's exact words or short phrases verbatim when possible.
- Explicitly quote key phrases from the user before asking follow-up questions.
- Do NOT paraphrase important emotional statements unnecessarily.
- Keep responses concise (roughly 5-10 sentences), empathetic, and practical.
- Ask exactly ONE gentle follow-up question at the end.

Conversation repair:
- If the user says you interrupted, responded too quickly, or asks you to wait:
  1) Apologize briefly and sincerely in Indonesian.
  2) Say you will wait and invite them to continue.
  3) Ask only one gentle follow-up question after they share more.";

const EXAMPLES_PREAMBLE: &str = "Below are examples of real counseling responses. \
     Learn the STYLE, FLOW, and CBT TECHNIQUE. \
     Do NOT copy sentences verbatim. \
     Do NOT mention that these examples exist.";

/// Build the message sequence for one user turn
///
/// The persona message always comes first and the user message last. The
/// examples message sits between them only when there is at least one
/// usable example.
#[must_use]
pub fn build_messages(user_text: &str, examples: &[RetrievalResult]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

    let block = format_examples(examples);
    if !block.is_empty() {
        messages.push(ChatMessage::system(format!("{EXAMPLES_PREAMBLE}\n\n{block}")));
    }

    messages.push(ChatMessage::user(user_text.trim()));
    messages
}

/// Render up to [`MAX_EXAMPLES`] examples, empty if none are usable
#[must_use]
pub fn format_examples(examples: &[RetrievalResult]) -> String {
    examples
        .iter()
        .take(MAX_EXAMPLES)
        .filter_map(|example| {
            let text = display_text(
                Some(example.text.as_str()),
                example.query.as_deref(),
                example.response.as_deref(),
            )?;
            let header = example.score.map_or_else(
                || "Example:".to_string(),
                |score| format!("Example (similarity={score:.3}):"),
            );
            Some(format!("{header}\n{text}"))
        })
        .collect::<Vec<_>>()
        .join(EXAMPLE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Dataset;
    use crate::provider::ChatRole;

    fn example(score: Option<f32>, text: &str) -> RetrievalResult {
        RetrievalResult {
            score,
            dataset: Some(Dataset::Hope),
            session_id: Some("1".to_string()),
            source_file: Some("1.csv".to_string()),
            query: None,
            response: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_no_examples_two_messages() {
        let messages = build_messages("  aku capek banget  ", &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "aku capek banget");
    }

    #[test]
    fn test_examples_message_between() {
        let messages = build_messages(
            "aku cemas",
            &[example(Some(0.8766), "Client: a\nTherapist: b")],
        );

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, ChatRole::System);
        assert!(messages[1].content.starts_with(EXAMPLES_PREAMBLE));
        assert!(
            messages[1]
                .content
                .ends_with("Example (similarity=0.877):\nClient: a\nTherapist: b")
        );
        assert_eq!(messages[2].content, "aku cemas");
    }

    #[test]
    fn test_format_examples_caps_and_separates() {
        let examples: Vec<_> = (0..5)
            .map(|i| example(None, &format!("Patient: q{i}\nTherapist: r{i}")))
            .collect();

        let block = format_examples(&examples);
        assert_eq!(block.matches("Example:").count(), MAX_EXAMPLES);
        assert_eq!(block.matches(EXAMPLE_SEPARATOR).count(), MAX_EXAMPLES - 1);
        assert!(block.contains("Client: q0"));
        assert!(!block.contains("Patient:"));
    }

    #[test]
    fn test_fallback_rendering() {
        let mut ex = example(Some(0.5), "");
        ex.query = Some("sulit tidur".to_string());
        ex.response = Some("Sudah berapa lama?".to_string());

        assert_eq!(
            format_examples(&[ex]),
            "Example (similarity=0.500):\nClient: sulit tidur\nTherapist: Sudah berapa lama?"
        );
    }

    #[test]
    fn test_unusable_examples_omitted() {
        let messages = build_messages("halo", &[example(None, "   ")]);
        assert_eq!(messages.len(), 2);
    }
}
