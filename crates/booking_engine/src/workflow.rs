use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::types::EngineError;

/// The two things a run can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Poll for appointments and book one
    Search,
    /// Obtain a booking code via SMS verification
    Code,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Search => f.write_str("search"),
            Command::Code => f.write_str("code"),
        }
    }
}

/// Per-run options shared by the command line and the interactive menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSettings {
    /// Only collect and save contact data
    pub configure_only: bool,
    /// Never prompt for contact data; use the file as-is
    pub read_only: bool,
    /// Seconds to wait between probes
    pub retry_seconds: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            configure_only: false,
            read_only: false,
            retry_seconds: 60,
        }
    }
}

impl RunSettings {
    /// Rejects contradictory options
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.configure_only && self.read_only {
            return Err(EngineError::Configuration(
                "--configure-only and --read-only cannot be combined".to_string(),
            ));
        }
        if self.retry_seconds == 0 {
            return Err(EngineError::Configuration(
                "retry interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Pause between probes
    pub fn wait_interval(&self) -> Duration {
        Duration::from_secs(self.retry_seconds)
    }
}

/// Where a run currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
    /// Waiting for a command
    Idle,
    /// Collecting contact data for a command without running it
    Configuring(Command),
    /// Polling for appointments
    Searching,
    /// Requesting a booking code
    Generating,
    /// The run finished
    Done,
    /// The run ended with an error
    Failed(String),
}

impl WorkflowState {
    /// Whether a command is in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WorkflowState::Configuring(_) | WorkflowState::Searching | WorkflowState::Generating
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => f.write_str("idle"),
            WorkflowState::Configuring(command) => write!(f, "configuring {}", command),
            WorkflowState::Searching => f.write_str("searching"),
            WorkflowState::Generating => f.write_str("generating code"),
            WorkflowState::Done => f.write_str("done"),
            WorkflowState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Inputs that drive a [`Workflow`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    /// Flip the configure-only option
    ToggleConfigureOnly,
    /// Flip the read-only option
    ToggleReadOnly,
    /// Change the probe interval
    SetRetrySeconds(u64),
    /// Begin a command with the current settings
    Start(Command),
    /// The running command finished
    Complete,
    /// The running command failed
    Abort(String),
    /// Back to idle after a finished run
    Reset,
}

/// State machine behind the interactive menu.
///
/// Settings only change while idle, and a change that would produce an
/// invalid combination is refused with the settings left untouched.
#[derive(Debug, Clone)]
pub struct Workflow {
    state: WorkflowState,
    settings: RunSettings,
}

impl Workflow {
    /// Starts idle with the given settings
    pub fn new(settings: RunSettings) -> Result<Self, EngineError> {
        settings.validate()?;
        Ok(Self {
            state: WorkflowState::Idle,
            settings,
        })
    }

    /// Current state
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Current settings
    pub fn settings(&self) -> RunSettings {
        self.settings
    }

    /// Applies a command and returns the resulting state
    pub fn apply(&mut self, command: WorkflowCommand) -> Result<&WorkflowState, EngineError> {
        debug!("Workflow {} <- {:?}", self.state, command);

        let next = match (self.state.clone(), command) {
            (WorkflowState::Idle, WorkflowCommand::ToggleConfigureOnly) => {
                self.update_settings(|s| s.configure_only = !s.configure_only)?;
                WorkflowState::Idle
            }
            (WorkflowState::Idle, WorkflowCommand::ToggleReadOnly) => {
                self.update_settings(|s| s.read_only = !s.read_only)?;
                WorkflowState::Idle
            }
            (WorkflowState::Idle, WorkflowCommand::SetRetrySeconds(seconds)) => {
                self.update_settings(|s| s.retry_seconds = seconds)?;
                WorkflowState::Idle
            }
            (WorkflowState::Idle, WorkflowCommand::Start(command)) => {
                if self.settings.configure_only {
                    WorkflowState::Configuring(command)
                } else {
                    match command {
                        Command::Search => WorkflowState::Searching,
                        Command::Code => WorkflowState::Generating,
                    }
                }
            }
            (state, WorkflowCommand::Complete) if state.is_active() => WorkflowState::Done,
            (state, WorkflowCommand::Abort(reason)) if state.is_active() => {
                WorkflowState::Failed(reason)
            }
            (
                WorkflowState::Idle | WorkflowState::Done | WorkflowState::Failed(_),
                WorkflowCommand::Reset,
            ) => WorkflowState::Idle,
            (state, command) => {
                return Err(EngineError::Configuration(format!(
                    "{:?} is not possible while {}",
                    command, state
                )));
            }
        };

        self.state = next;
        Ok(&self.state)
    }

    fn update_settings(&mut self, change: impl FnOnce(&mut RunSettings)) -> Result<(), EngineError> {
        let mut candidate = self.settings;
        change(&mut candidate);
        candidate.validate()?;
        self.settings = candidate;
        Ok(())
    }
}
