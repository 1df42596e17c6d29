//! Round orchestration: the per-round event stream.
//!
//! One call to [`RoundOrchestrator::advance_round`] drives one round of a
//! session to completion, yielding events as each scheduled speaker
//! resolves. The human slot is a real suspension point: the stream parks
//! on a oneshot channel that the submission handler signals directly,
//! bounded by the configured wait ceiling.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::SimulatorConfig;
use crate::error::SimulationError;
use crate::generate::TextGenerator;
use crate::schedule::{Speaker, round_order};
use crate::session::{HUMAN_SPEAKER, SessionStatus, Utterance};
use crate::speech::SpeechSynthesizer;
use crate::store::SessionStore;

/// Events emitted while a round runs, in scheduled-speaker order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    /// An agent is about to produce its utterance.
    Thinking { agent: String },
    /// An agent's turn resolved; the utterance is in the log.
    Response {
        agent: String,
        text: String,
        audio: Option<String>,
    },
    /// The scheduled order reached the human slot; input is awaited.
    HumanTurn,
    /// Human input was accepted for this round's slot.
    HumanResponse { text: String },
    /// A slot failed to resolve (currently only the human-wait timeout).
    Error { message: String },
    /// All scheduled speakers resolved; the round counter has advanced.
    Complete { round: u32 },
}

pub type RoundEventStream = Pin<Box<dyn Stream<Item = RoundEvent> + Send>>;

/// Result of asking for another round.
pub enum RoundAdvance {
    /// The session already spent its round budget; nothing was mutated.
    AlreadyComplete(SessionStatus),
    /// A live event stream for the newly started round.
    Events(RoundEventStream),
}

struct PendingWait {
    token: u64,
    tx: oneshot::Sender<String>,
}

/// Registry of armed human waits, keyed by session id.
///
/// The map lock is the commit point for human input: a submission is
/// accepted atomically (utterance appended, flag cleared, waiter signaled)
/// or rejected, and the timeout path resolves against the same lock, so a
/// submission can never half-land in a slot that already moved on.
#[derive(Default)]
struct HumanInbox {
    waits: Mutex<HashMap<String, PendingWait>>,
}

impl HumanInbox {
    fn arm(&self, id: &str, token: u64) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        let mut waits = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        waits.insert(id.to_string(), PendingWait { token, tx });
        rx
    }

    /// Timeout path. If the wait with this token is still armed, disarm it
    /// and return `None` (genuine timeout). Otherwise a submission already
    /// completed it; drain the channel and hand back the text.
    fn disarm_or_drain(
        &self,
        id: &str,
        token: u64,
        rx: &mut oneshot::Receiver<String>,
    ) -> Option<String> {
        let mut waits = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        match waits.get(id) {
            Some(wait) if wait.token == token => {
                waits.remove(id);
                None
            }
            _ => rx.try_recv().ok(),
        }
    }

    /// Submission path: take the armed wait, run the commit closure and
    /// signal the waiter, all under the inbox lock.
    fn complete(
        &self,
        id: &str,
        text: String,
        commit: impl FnOnce(),
    ) -> Result<(), SimulationError> {
        let mut waits = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        let Some(wait) = waits.remove(id) else {
            return Err(SimulationError::InvalidInput(
                "simulation is not awaiting human input".to_string(),
            ));
        };

        commit();

        if wait.tx.send(text).is_err() {
            // The round's consumer went away mid-wait; the utterance is
            // recorded but nobody streams it.
            tracing::warn!(simulation = %id, "human input accepted but round stream was dropped");
        }
        Ok(())
    }
}

/// Drives rounds for any session in the injected store.
pub struct RoundOrchestrator {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn TextGenerator>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    config: Arc<SimulatorConfig>,
    inbox: Arc<HumanInbox>,
}

impl RoundOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn TextGenerator>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        config: Arc<SimulatorConfig>,
    ) -> Self {
        Self {
            store,
            generator,
            speech,
            config,
            inbox: Arc::new(HumanInbox::default()),
        }
    }

    /// Start one round of the given session.
    ///
    /// Returns [`RoundAdvance::AlreadyComplete`] without mutating anything
    /// when the round budget is spent; otherwise returns the event stream.
    /// Callers must not run two rounds of the same session concurrently.
    pub fn advance_round(&self, id: &str) -> Result<RoundAdvance, SimulationError> {
        let handle = self
            .store
            .get(id)
            .ok_or_else(|| SimulationError::SessionNotFound(id.to_string()))?;

        let (order, round_index, topic) = {
            let session = handle.lock().unwrap_or_else(|e| e.into_inner());
            if session.is_complete() {
                return Ok(RoundAdvance::AlreadyComplete(session.status()));
            }
            let order = round_order(
                session.agents.len(),
                session.human_participant,
                &mut rand::thread_rng(),
            );
            (order, session.current_round, session.topic.clone())
        };

        tracing::debug!(simulation = %id, round = round_index, slots = order.len(), "starting round");

        let store = Arc::clone(&self.store);
        let generator = Arc::clone(&self.generator);
        let speech = self.speech.clone();
        let config = Arc::clone(&self.config);
        let inbox = Arc::clone(&self.inbox);
        let id = id.to_string();

        let stream = async_stream::stream! {
            let mut human_just_spoke = false;

            for (position, speaker) in order.into_iter().enumerate() {
                match speaker {
                    Speaker::Agent(idx) => {
                        let (agent, prompt) = {
                            let session = handle.lock().unwrap_or_else(|e| e.into_inner());
                            let agent = session.agents[idx].clone();
                            let remarks = session.recent_remarks(3);
                            let is_first = round_index == 0 && position == 0;
                            let prompt = agent.build_prompt(
                                &config,
                                &topic,
                                &remarks,
                                is_first,
                                human_just_spoke,
                            );
                            (agent, prompt)
                        };

                        yield RoundEvent::Thinking { agent: agent.name.clone() };

                        let text = agent
                            .respond(
                                generator.as_ref(),
                                &prompt,
                                config.timing.generation_timeout(),
                            )
                            .await;

                        let audio = match &speech {
                            Some(synth) => {
                                let voice = config.voices.voice_for(idx).to_string();
                                match synth.synthesize(&text, &voice).await {
                                    Ok(bytes) => Some(BASE64.encode(bytes)),
                                    Err(e) => {
                                        tracing::warn!(agent = %agent.name, error = %e, "speech synthesis failed");
                                        None
                                    }
                                }
                            }
                            None => None,
                        };

                        {
                            let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
                            session.append(Utterance::new(
                                agent.name.clone(),
                                text.clone(),
                                audio.clone(),
                            ));
                        }
                        store.touch(&id);

                        human_just_spoke = false;
                        yield RoundEvent::Response {
                            agent: agent.name,
                            text,
                            audio,
                        };
                    }
                    Speaker::Human => {
                        let token = {
                            let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
                            session.arm_human_turn()
                        };
                        let mut rx = inbox.arm(&id, token);

                        yield RoundEvent::HumanTurn;

                        match tokio::time::timeout(config.timing.human_wait(), &mut rx).await {
                            Ok(Ok(text)) => {
                                // The submission handler already appended the
                                // utterance and cleared the awaiting flag.
                                store.touch(&id);
                                human_just_spoke = true;
                                yield RoundEvent::HumanResponse { text };
                            }
                            Ok(Err(_)) => {
                                // Sender dropped without a value.
                                handle
                                    .lock()
                                    .unwrap_or_else(|e| e.into_inner())
                                    .clear_human_turn();
                                yield RoundEvent::Error {
                                    message: "No human input received; skipping the human turn"
                                        .to_string(),
                                };
                            }
                            Err(_) => match inbox.disarm_or_drain(&id, token, &mut rx) {
                                Some(text) => {
                                    // Submission landed in the same instant the
                                    // ceiling elapsed; honor it.
                                    store.touch(&id);
                                    human_just_spoke = true;
                                    yield RoundEvent::HumanResponse { text };
                                }
                                None => {
                                    handle
                                        .lock()
                                        .unwrap_or_else(|e| e.into_inner())
                                        .clear_human_turn();
                                    tracing::info!(simulation = %id, "human turn timed out");
                                    yield RoundEvent::Error {
                                        message:
                                            "No human input received before the wait ceiling; skipping the human turn"
                                                .to_string(),
                                    };
                                }
                            },
                        }
                    }
                }
            }

            let round = {
                let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
                session.finish_round()
            };
            store.touch(&id);
            tracing::info!(simulation = %id, round, "round complete");
            yield RoundEvent::Complete { round };
        };

        Ok(RoundAdvance::Events(Box::pin(stream)))
    }

    /// Accept human input for a session's armed wait.
    ///
    /// Accepted iff the session is currently paused at its human slot;
    /// otherwise the submission is rejected as invalid input. On success
    /// the utterance is appended and the waiting round resumes.
    pub fn submit_human_input(&self, id: &str, text: &str) -> Result<String, SimulationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SimulationError::InvalidInput(
                "human input text is empty".to_string(),
            ));
        }

        let handle = self
            .store
            .get(id)
            .ok_or_else(|| SimulationError::SessionNotFound(id.to_string()))?;

        let accepted = text.to_string();
        let utterance_text = accepted.clone();
        self.inbox.complete(id, accepted.clone(), move || {
            let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
            session.append(Utterance::new(HUMAN_SPEAKER, utterance_text, None));
            session.clear_human_turn();
        })?;

        tracing::info!(simulation = %id, "human input accepted");
        Ok(accepted)
    }
}
