//! Agora Core Library
//!
//! Provides the group-discussion orchestration engine: sessions, agents,
//! turn scheduling, the round event stream, and the narrow contracts for
//! the text-generation, speech and transcription collaborators.

pub mod agent;
pub mod config;
pub mod error;
pub mod generate;
pub mod orchestrator;
pub mod registry;
pub mod schedule;
pub mod session;
pub mod speech;
pub mod store;
pub mod transcribe;

pub use agent::{Agent, NO_RESPONSE};
pub use config::SimulatorConfig;
pub use error::SimulationError;
pub use generate::{GenerateError, OpenAiGenerator, TextGenerator};
pub use orchestrator::{RoundAdvance, RoundEvent, RoundEventStream, RoundOrchestrator};
pub use registry::SessionRegistry;
pub use schedule::{Speaker, round_order};
pub use session::{HUMAN_SPEAKER, Session, SessionStatus, Utterance};
pub use speech::{KokoroSpeech, SpeechError, SpeechSynthesizer};
pub use store::{MemoryStore, SessionHandle, SessionStore};
pub use transcribe::{OpenAiTranscriber, Transcriber};
