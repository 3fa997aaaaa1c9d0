//! State machine of a task registry

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Registry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryState {
    /// Nothing registered yet
    Empty,

    /// Registrations accepted
    Accepting,

    /// Sequence flattened, ready to run
    Assembled,

    /// Tasks running
    Executing,

    /// Every task completed
    Finished,

    /// A task failed
    Aborted,
}

/// Registry event
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A task was registered
    Register,

    /// The sequence was flattened
    Assemble,

    /// Execution started
    Execute,

    /// Every task completed
    Complete,

    /// A task failed
    Fail(String),

    /// Back to empty
    Reset,
}

/// Registry FSM
#[derive(Debug, Clone)]
pub struct RegistryFsm {
    state: RegistryState,
    error: Option<String>,
}

impl RegistryFsm {
    /// Create a new FSM in empty state
    pub fn new() -> Self {
        Self {
            state: RegistryState::Empty,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RegistryEvent) -> Result<(), DeployError> {
        let new_state = match (&self.state, &event) {
            (RegistryState::Empty | RegistryState::Accepting, RegistryEvent::Register) => {
                RegistryState::Accepting
            }

            // Assembling twice without new registrations changes nothing
            (
                RegistryState::Empty | RegistryState::Accepting | RegistryState::Assembled,
                RegistryEvent::Assemble,
            ) => RegistryState::Assembled,

            (RegistryState::Assembled, RegistryEvent::Execute) => RegistryState::Executing,

            (RegistryState::Executing, RegistryEvent::Complete) => RegistryState::Finished,
            (RegistryState::Executing, RegistryEvent::Fail(err)) => {
                self.error = Some(err.clone());
                RegistryState::Aborted
            }

            (_, RegistryEvent::Reset) => {
                self.error = None;
                RegistryState::Empty
            }

            (state, event) => {
                return Err(DeployError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Whether tasks may still be registered
    pub fn accepts_registrations(&self) -> bool {
        matches!(self.state, RegistryState::Empty | RegistryState::Accepting)
    }
}

impl Default for RegistryFsm {
    fn default() -> Self {
        Self::new()
    }
}
