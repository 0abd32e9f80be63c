// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docflat.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Docflat operations.
#[derive(Debug, Error)]
pub enum DocflatError {
    // -- Input errors --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("native bridge error: {0}")]
    NativeBridge(String),

    #[error("invalid tensor: expected {expected} values, got {actual}")]
    InvalidTensor { expected: usize, actual: usize },

    // -- Detection errors (recoverable) --
    #[error("low confidence detection: found {found} of 4 corners")]
    LowConfidenceDetection { found: usize },

    #[error("degenerate polygon: {0}")]
    DegeneratePolygon(String),

    #[error("perspective transform failed: {0}")]
    Transform(String),

    // -- Task control --
    #[error("processing cancelled")]
    Cancelled,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocflatError {
    /// Cloneable tag for this error, suitable for storing in task records.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::NativeBridge(_) | Self::InvalidTensor { .. } => ErrorKind::NativeBridge,
            Self::LowConfidenceDetection { .. } => ErrorKind::LowConfidenceDetection,
            Self::DegeneratePolygon(_) => ErrorKind::DegeneratePolygon,
            Self::Transform(_) => ErrorKind::Transform,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) | Self::Serialization(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Error taxonomy without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Decode,
    NativeBridge,
    LowConfidenceDetection,
    DegeneratePolygon,
    Transform,
    Cancelled,
    Config,
    Io,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocflatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tensor_is_a_bridge_failure() {
        let err = DocflatError::InvalidTensor { expected: 12, actual: 11 };
        assert_eq!(err.kind(), ErrorKind::NativeBridge);
        assert_eq!(err.to_string(), "invalid tensor: expected 12 values, got 11");
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/definitely/not/here.png")?)
        }
        let err = read_missing().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
