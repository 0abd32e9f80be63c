// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Task handles and snapshots handed out by the session manager.

use docflat_core::{ErrorKind, PhotoId, TaskId, TaskState};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Caller-side view of one pipeline run.
///
/// Handles are cheap to clone; every clone observes the same state.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task_id: TaskId,
    photo_id: PhotoId,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub(crate) fn new(task_id: TaskId, photo_id: PhotoId, state: watch::Receiver<TaskState>) -> Self {
        Self {
            task_id,
            photo_id,
            state,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn photo_id(&self) -> &PhotoId {
        &self.photo_id
    }

    /// Current state of the run.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Resolve once the run reaches a terminal state.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(|s| s.is_terminal()).await {
            return *state;
        }
        // The manager dropped the task (evicted); report the last state seen.
        *rx.borrow()
    }
}

/// Why a task ended in `Failed` (or `Cancelled`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// One row of the task table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub photo_id: PhotoId,
    pub task_id: TaskId,
    pub source_uri: String,
    pub state: TaskState,
}
