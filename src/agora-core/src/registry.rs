//! Session creation and lookup.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::agent::Agent;
use crate::config::SimulatorConfig;
use crate::error::SimulationError;
use crate::session::{Session, SessionStatus};
use crate::store::{SessionHandle, SessionStore};

/// Creates sessions (persona sampling, agent naming, id assignment) and
/// resolves ids for every other operation.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    config: Arc<SimulatorConfig>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, config: Arc<SimulatorConfig>) -> Self {
        Self { store, config }
    }

    /// Create a session: sample `num_agents` personas without replacement
    /// from the configured pool, name the agents `Agent 1..N`, and register
    /// the session under a fresh id.
    pub fn create(
        &self,
        topic: &str,
        num_agents: usize,
        rounds: u32,
        human_participant: bool,
    ) -> Result<(String, Vec<Agent>), SimulationError> {
        let pool = &self.config.personas.pool;

        if num_agents == 0 || num_agents > pool.len() {
            return Err(SimulationError::InvalidInput(format!(
                "num_agents must be between 1 and {}, got {}",
                pool.len(),
                num_agents
            )));
        }
        if rounds == 0 {
            return Err(SimulationError::InvalidInput(
                "rounds must be at least 1".to_string(),
            ));
        }
        if topic.trim().is_empty() {
            return Err(SimulationError::InvalidInput(
                "topic must not be empty".to_string(),
            ));
        }

        let personas: Vec<String> = pool
            .choose_multiple(&mut rand::thread_rng(), num_agents)
            .cloned()
            .collect();

        let agents: Vec<Agent> = personas
            .into_iter()
            .enumerate()
            .map(|(i, persona)| Agent::new(format!("Agent {}", i + 1), persona))
            .collect();

        let id = self.store.next_id();
        let session = Session::new(&id, topic, agents.clone(), rounds, human_participant);
        self.store.insert(session);

        tracing::info!(
            simulation = %id,
            agents = num_agents,
            rounds,
            human = human_participant,
            "created simulation"
        );

        Ok((id, agents))
    }

    pub fn get(&self, id: &str) -> Result<SessionHandle, SimulationError> {
        self.store
            .get(id)
            .ok_or_else(|| SimulationError::SessionNotFound(id.to_string()))
    }

    pub fn status(&self, id: &str) -> Result<SessionStatus, SimulationError> {
        let handle = self.get(id)?;
        let session = handle.lock().unwrap_or_else(|e| e.into_inner());
        Ok(session.status())
    }
}
