//! Discussion participants.
//!
//! An agent holds a stable name and a persona descriptor, renders its own
//! prompt from the discussion state, and produces one utterance per turn by
//! delegating to a text-generation collaborator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SimulatorConfig;
use crate::generate::TextGenerator;

/// Sentinel text recorded when a turn's generation call fails or times out.
/// A failed turn is accepted as final output; the round continues.
pub const NO_RESPONSE: &str = "[No response from model]";

/// A simulated participant. Immutable for the session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Stable display name (`Agent 1`, `Agent 2`, ...).
    pub name: String,
    /// Style descriptor drawn from the persona pool at session creation.
    pub persona: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
        }
    }

    /// Render the prompt for this agent's turn.
    ///
    /// `is_first` holds only for the very first slot of the very first
    /// round, which omits the prior-context framing entirely.
    pub fn build_prompt(
        &self,
        config: &SimulatorConfig,
        topic: &str,
        remarks: &str,
        is_first: bool,
        human_just_spoke: bool,
    ) -> String {
        config.render_prompt(
            &self.name,
            &self.persona,
            topic,
            remarks,
            is_first,
            human_just_spoke,
        )
    }

    /// Produce one utterance for the given prompt, with a bounded wait.
    ///
    /// Timeouts and upstream errors degrade to [`NO_RESPONSE`] instead of
    /// propagating, so a single agent's failure cannot abort the round.
    pub async fn respond(
        &self,
        generator: &dyn TextGenerator,
        prompt: &str,
        limit: Duration,
    ) -> String {
        match tokio::time::timeout(limit, generator.generate(prompt)).await {
            Ok(Ok(text)) => {
                let cleaned = sanitize_response(&text);
                if cleaned.is_empty() {
                    tracing::warn!(agent = %self.name, "generator returned empty text");
                    NO_RESPONSE.to_string()
                } else {
                    cleaned
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(agent = %self.name, error = %e, "generation failed");
                NO_RESPONSE.to_string()
            }
            Err(_) => {
                tracing::warn!(agent = %self.name, "generation timed out");
                NO_RESPONSE.to_string()
            }
        }
    }
}

/// Sanitize model output by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reasoning",
        "internal",
        "scratchpad",
        "plan",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    // Remaining orphaned opening/closing tags
    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    // Markdown emphasis markers
    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GenerateError;
    use async_trait::async_trait;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Err(GenerateError::Empty)
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[test]
    fn test_sanitize_response_strips_reasoning_blocks() {
        let input = "<reasoning>weigh the last two remarks\nagainst the topic</reasoning>Retraining programs close most of the gap.";
        assert_eq!(
            sanitize_response(input),
            "Retraining programs close most of the gap."
        );

        // Case and attributes on the tag do not matter.
        let input = "<Reflection round=\"2\">hm</Reflection>Costs fall faster than wages adjust.";
        assert_eq!(sanitize_response(input), "Costs fall faster than wages adjust.");
    }

    #[test]
    fn test_sanitize_response_orphan_tags_and_emphasis() {
        let input = "I *strongly* back <aside>the previous speaker's point";
        assert_eq!(
            sanitize_response(input),
            "I strongly back the previous speaker's point"
        );
    }

    #[test]
    fn test_sanitize_response_collapses_whitespace() {
        let input = "Quality holds\n\n  even as   headcount shrinks.";
        assert_eq!(
            sanitize_response(input),
            "Quality holds even as headcount shrinks."
        );
    }

    #[tokio::test]
    async fn test_respond_sanitizes_output() {
        let agent = Agent::new("Agent 1", "logical and fact-driven");
        let text = agent
            .respond(
                &FixedGenerator("<think>hm</think>Jobs will shift, not vanish."),
                "prompt",
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(text, "Jobs will shift, not vanish.");
    }

    #[tokio::test]
    async fn test_respond_degrades_to_sentinel_on_error() {
        let agent = Agent::new("Agent 1", "logical and fact-driven");
        let text = agent
            .respond(&FailingGenerator, "prompt", Duration::from_secs(5))
            .await;
        assert_eq!(text, NO_RESPONSE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_respond_degrades_to_sentinel_on_timeout() {
        let agent = Agent::new("Agent 1", "logical and fact-driven");
        let text = agent
            .respond(&StalledGenerator, "prompt", Duration::from_millis(50))
            .await;
        assert_eq!(text, NO_RESPONSE);
    }
}
