//! Session state: the utterance log and per-simulation counters.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;

/// Speaker id recorded for human contributions.
pub const HUMAN_SPEAKER: &str = "Human";

/// One recorded contribution to the discussion. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Stable name of the speaker (`Agent N` or `Human`).
    pub speaker: String,
    /// The spoken text.
    pub text: String,
    /// Base64-encoded WAV audio, when synthesis is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, audio: Option<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            audio,
        }
    }
}

/// One run of the discussion simulation: fixed topic, agents and round
/// budget, plus the growing utterance log.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub topic: String,
    pub agents: Vec<Agent>,
    /// Append-only log; ordering is the conversational history.
    pub utterances: Vec<Utterance>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub human_participant: bool,
    /// True only while a round is paused at the human turn slot.
    pub awaiting_human: bool,
    /// Monotonic token identifying the currently armed human wait, so a
    /// late submission cannot land in a later slot.
    turn_token: u64,
}

/// Point-in-time view of a session, returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub current_round: u32,
    pub total_rounds: u32,
    pub awaiting_human: bool,
    pub utterances_count: usize,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        agents: Vec<Agent>,
        total_rounds: u32,
        human_participant: bool,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            agents,
            utterances: Vec::new(),
            current_round: 0,
            total_rounds,
            human_participant,
            awaiting_human: false,
            turn_token: 0,
        }
    }

    pub fn append(&mut self, utterance: Utterance) {
        self.utterances.push(utterance);
    }

    /// A session is terminal for new rounds once the round budget is spent.
    pub fn is_complete(&self) -> bool {
        self.current_round >= self.total_rounds
    }

    /// The last `n` utterances formatted as `speaker: text` lines, used as
    /// the recent-history block of agent prompts.
    pub fn recent_remarks(&self, n: usize) -> String {
        let start = self.utterances.len().saturating_sub(n);
        self.utterances[start..]
            .iter()
            .map(|u| format!("{}: {}", u.speaker, u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Mark the session as waiting at the human slot and issue the token
    /// identifying this particular wait.
    pub fn arm_human_turn(&mut self) -> u64 {
        self.awaiting_human = true;
        self.turn_token += 1;
        self.turn_token
    }

    pub fn clear_human_turn(&mut self) {
        self.awaiting_human = false;
    }

    /// Advance the round counter. Called exactly once per round, after the
    /// last scheduled speaker resolves.
    pub fn finish_round(&mut self) -> u32 {
        self.current_round += 1;
        self.current_round
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            current_round: self.current_round,
            total_rounds: self.total_rounds,
            awaiting_human: self.awaiting_human,
            utterances_count: self.utterances.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("1", "AI and employment", Vec::new(), 2, false)
    }

    #[test]
    fn test_new_session_starts_at_round_zero() {
        let s = session();
        assert_eq!(s.current_round, 0);
        assert!(!s.is_complete());
        assert!(!s.awaiting_human);
    }

    #[test]
    fn test_finish_round_reaches_terminal() {
        let mut s = session();
        assert_eq!(s.finish_round(), 1);
        assert!(!s.is_complete());
        assert_eq!(s.finish_round(), 2);
        assert!(s.is_complete());
    }

    #[test]
    fn test_recent_remarks_takes_tail() {
        let mut s = session();
        for i in 0..5 {
            s.append(Utterance::new(format!("Agent {}", i), format!("point {}", i), None));
        }
        let remarks = s.recent_remarks(3);
        assert!(!remarks.contains("point 1"));
        assert!(remarks.contains("point 2"));
        assert!(remarks.contains("point 4"));
    }

    #[test]
    fn test_turn_tokens_are_monotonic() {
        let mut s = session();
        let a = s.arm_human_turn();
        s.clear_human_turn();
        let b = s.arm_human_turn();
        assert!(b > a);
        assert!(s.awaiting_human);
    }
}
