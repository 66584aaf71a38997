//! Export run status events.
//!
//! A run emits a sequence of `StatusEvent`s: progress updates while jobs are
//! encoding, then exactly one terminal event (`done` or `failed`).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an export run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Export run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Running,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status update for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "runId")]
    pub run_id: RunId,
    /// 1-based job index the event refers to, if any
    #[serde(rename = "jobIndex", skip_serializing_if = "Option::is_none")]
    pub job_index: Option<u32>,
    /// Overall progress (0-100)
    pub percent: u8,
    pub message: String,
    pub state: RunState,
}

impl StatusEvent {
    /// Progress update for a running export.
    pub fn progress(
        run_id: &RunId,
        job_index: Option<u32>,
        percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.clone(),
            job_index,
            percent: percent.min(100),
            message: message.into(),
            state: RunState::Running,
        }
    }

    /// Terminal success event; always reports 100%.
    pub fn done(run_id: &RunId, delivered: usize) -> Self {
        Self {
            run_id: run_id.clone(),
            job_index: None,
            percent: 100,
            message: format!("Done! {} export(s) delivered.", delivered),
            state: RunState::Done,
        }
    }

    /// Terminal failure event; keeps the last reported percentage.
    pub fn failed(
        run_id: &RunId,
        job_index: Option<u32>,
        percent: u8,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            run_id: run_id.clone(),
            job_index,
            percent: percent.min(99),
            message: format!("Export failed: {}", reason),
            state: RunState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
