// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Failure policy — which pipeline errors degrade to the original photo and
// which are reported to the caller. Nothing is retried automatically.

use docflat_core::error::DocflatError;

/// What the session does with a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep the unrectified original as the usable result.
    Fallback,
    /// Mark the task `Failed` and report the error.
    Surface,
}

/// Classify a pipeline error.
pub fn classify_error(err: &DocflatError) -> FailurePolicy {
    match err {
        // Detection or geometry went wrong; the photo itself is fine.
        DocflatError::LowConfidenceDetection { .. } => FailurePolicy::Fallback,
        DocflatError::DegeneratePolygon(_) => FailurePolicy::Fallback,
        DocflatError::Transform(_) => FailurePolicy::Fallback,

        // The photo or the runtime is broken; the caller has to act.
        DocflatError::Decode(_) => FailurePolicy::Surface,
        DocflatError::NativeBridge(_) => FailurePolicy::Surface,
        DocflatError::InvalidTensor { .. } => FailurePolicy::Surface,
        DocflatError::Io(_) => FailurePolicy::Surface,
        DocflatError::Cancelled => FailurePolicy::Surface,
        DocflatError::Config(_) => FailurePolicy::Surface,
        DocflatError::Serialization(_) => FailurePolicy::Surface,
    }
}
