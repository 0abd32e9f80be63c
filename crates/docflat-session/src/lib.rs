// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docflat-session — runs the rectification pipeline per photo.
//
// A `SessionManager` lives for one composition session. It owns the task
// table and result cache, keyed by photo identity, bounds concurrent runs,
// and lets callers cancel or evict photos.

pub mod manager;
pub mod pipeline;
pub mod policy;
pub mod task;

pub use manager::{PhotoResult, SessionManager};
pub use pipeline::{Pipeline, RunOutput};
pub use policy::{FailurePolicy, classify_error};
pub use task::{TaskFailure, TaskHandle, TaskSnapshot};
