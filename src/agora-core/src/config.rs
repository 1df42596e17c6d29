//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::SimulationError;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub personas: PersonaConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            personas: PersonaConfig::default(),
            prompts: PromptsConfig::default(),
            timing: TimingConfig::default(),
            voices: VoicesConfig::default(),
        }
    }
}

/// The pool of persona style descriptors agents are drawn from.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaConfig {
    pub pool: Vec<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            pool: vec![
                "logical and fact-driven".to_string(),
                "supportive and encouraging".to_string(),
                "critical but respectful".to_string(),
                "creative and optimistic".to_string(),
                "cautious and balanced".to_string(),
                "structured and methodical".to_string(),
            ],
        }
    }
}

/// Prompt templates with `{name}`, `{persona}`, `{topic}` and `{remarks}`
/// placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    /// Template for the very first speaker of a simulation.
    pub opening: String,
    /// Template for every other turn.
    pub reply: String,
    /// Extra line appended when the human participant spoke immediately
    /// before this agent's turn.
    pub human_followup: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            opening: DEFAULT_OPENING_PROMPT.to_string(),
            reply: DEFAULT_REPLY_PROMPT.to_string(),
            human_followup: "The human participant has just spoken. Address their point directly."
                .to_string(),
        }
    }
}

/// Timeouts and generation bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Ceiling on a single text-generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Ceiling on the wait for human input, in seconds.
    pub human_wait_secs: u64,
    /// Completion token budget per turn.
    pub max_completion_tokens: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: 30,
            human_wait_secs: 120,
            max_completion_tokens: 200,
        }
    }
}

impl TimingConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn human_wait(&self) -> Duration {
        Duration::from_secs(self.human_wait_secs)
    }
}

/// Voice pool for TTS; agents are assigned voices round-robin by index.
#[derive(Debug, Clone, Deserialize)]
pub struct VoicesConfig {
    pub pool: Vec<String>,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            pool: vec![
                "af_sky".to_string(),
                "am_adam".to_string(),
                "bf_emma".to_string(),
                "bm_george".to_string(),
                "af_bella".to_string(),
                "am_michael".to_string(),
            ],
        }
    }
}

impl VoicesConfig {
    /// Voice for the agent at the given registration index.
    pub fn voice_for(&self, agent_index: usize) -> &str {
        &self.pool[agent_index % self.pool.len()]
    }
}

impl SimulatorConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| SimulationError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, SimulationError> {
        toml::from_str(content)
            .map_err(|e| SimulationError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Render the prompt for one agent turn, with placeholders replaced.
    pub fn render_prompt(
        &self,
        name: &str,
        persona: &str,
        topic: &str,
        remarks: &str,
        is_first: bool,
        human_just_spoke: bool,
    ) -> String {
        let template = if is_first {
            &self.prompts.opening
        } else {
            &self.prompts.reply
        };

        let remarks = if remarks.trim().is_empty() {
            "No prior remarks yet."
        } else {
            remarks
        };

        let mut prompt = template
            .replace("{name}", name)
            .replace("{persona}", persona)
            .replace("{topic}", topic)
            .replace("{remarks}", remarks);

        if human_just_spoke {
            prompt.push('\n');
            prompt.push_str(&self.prompts.human_followup);
            prompt.push('\n');
        }

        prompt
    }
}

const DEFAULT_OPENING_PROMPT: &str = r#"You are {name}, a participant in a group discussion.
Your style: {persona}.
Topic: {topic}

You are the first to speak.
Start naturally with your viewpoint (under 80 words).
"#;

const DEFAULT_REPLY_PROMPT: &str = r#"You are {name}, a participant in a group discussion.
Your style: {persona}.
Topic: {topic}

Recent remarks:
{remarks}

Respond naturally in under 80 words, staying consistent with your persona.
"#;
