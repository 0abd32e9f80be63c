// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One JSON line per photo, printed once its task settles.

use docflat_core::{PhotoId, RectificationResult, TaskId, TaskState};
use docflat_session::{PhotoResult, TaskFailure, TaskHandle};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoReport {
    pub uri: String,
    pub photo_id: PhotoId,
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RectificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
}

impl PhotoReport {
    /// Report for a settled task.
    pub fn from_handle(uri: &str, handle: &TaskHandle, state: TaskState, outcome: PhotoResult) -> Self {
        Self::new(uri, handle.photo_id().clone(), handle.task_id(), state, outcome)
    }

    pub fn new(
        uri: &str,
        photo_id: PhotoId,
        task_id: TaskId,
        state: TaskState,
        outcome: PhotoResult,
    ) -> Self {
        let (result, error) = match outcome {
            PhotoResult::Ready(result) => (Some(result.as_ref().clone()), None),
            PhotoResult::Failed(failure) => (None, Some(failure)),
            PhotoResult::Pending | PhotoResult::NotSubmitted => (None, None),
        };
        Self {
            uri: uri.to_owned(),
            photo_id,
            task_id,
            state,
            result,
            error,
        }
    }

    /// Whether the caller got a usable image (rectified or original).
    pub fn usable(&self) -> bool {
        matches!(self.state, TaskState::Rectified | TaskState::FailedFallback)
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
