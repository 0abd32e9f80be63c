// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language descriptions of pipeline errors.
//
// Callers decide how (and whether) to show these; the pipeline itself never
// retries. `retake` tells the caller that a fresh photo is the likely fix.

use crate::error::DocflatError;

/// How the caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The photo is still usable; only the flattening was skipped.
    Degraded,
    /// The user has to do something (retake, pick another file).
    ActionRequired,
    /// Nothing the user can do about it.
    Permanent,
}

/// A human-readable error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retaking or resubmitting the photo is likely to help.
    pub retake: bool,
    pub severity: Severity,
}

/// Convert a `DocflatError` into a `HumanError`.
pub fn humanize_error(err: &DocflatError) -> HumanError {
    match err {
        DocflatError::Decode(_) => HumanError {
            message: "This photo couldn't be opened.".into(),
            suggestion: "The file may be damaged or in an unusual format. Please take the photo again.".into(),
            retake: true,
            severity: Severity::ActionRequired,
        },

        DocflatError::NativeBridge(_) | DocflatError::InvalidTensor { .. } => HumanError {
            message: "Page detection isn't working right now.".into(),
            suggestion: "Try again in a moment. If this keeps happening, restart the app.".into(),
            retake: true,
            severity: Severity::ActionRequired,
        },

        DocflatError::LowConfidenceDetection { found } => HumanError {
            message: "We couldn't find all four corners of the page.".into(),
            suggestion: format!(
                "Only {found} of 4 corners were visible, so the original photo was kept. \
                 For a flat copy, retake it with the whole page in frame on a contrasting background."
            ),
            retake: true,
            severity: Severity::Degraded,
        },

        DocflatError::DegeneratePolygon(_) => HumanError {
            message: "The page outline didn't look like a page.".into(),
            suggestion: "The original photo was kept. Hold the camera further away so the page fills most of the frame.".into(),
            retake: true,
            severity: Severity::Degraded,
        },

        DocflatError::Transform(_) => HumanError {
            message: "The page couldn't be straightened.".into(),
            suggestion: "The original photo was kept. Try shooting from directly above the page.".into(),
            retake: true,
            severity: Severity::Degraded,
        },

        DocflatError::Cancelled => HumanError {
            message: "Processing was cancelled.".into(),
            suggestion: "Add the photo again if you still need it.".into(),
            retake: false,
            severity: Severity::ActionRequired,
        },

        DocflatError::Config(detail) => HumanError {
            message: "The app's settings are invalid.".into(),
            suggestion: format!("Reset the settings to their defaults. ({detail})"),
            retake: false,
            severity: Severity::Permanent,
        },

        DocflatError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The photo couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Please take it again.".into(),
                    retake: true,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retake: false,
                    severity: Severity::ActionRequired,
                }
            }
        }

        DocflatError::Serialization(_) => HumanError {
            message: "The app had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retake: false,
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_failures_are_degraded() {
        let human = humanize_error(&DocflatError::LowConfidenceDetection { found: 2 });
        assert_eq!(human.severity, Severity::Degraded);
        assert!(human.suggestion.contains("2 of 4"));

        let human = humanize_error(&DocflatError::Transform("singular".into()));
        assert_eq!(human.severity, Severity::Degraded);
    }

    #[test]
    fn decode_failure_asks_for_retake() {
        let human = humanize_error(&DocflatError::Decode("truncated JPEG".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.retake);
    }

    #[test]
    fn missing_file_asks_for_retake() {
        let err = DocflatError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(humanize_error(&err).retake);
    }

    #[test]
    fn config_error_is_permanent() {
        let human = humanize_error(&DocflatError::Config("bad".into()));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(!human.retake);
    }
}
