// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docflat-vision — the CPU stages of the rectification pipeline.
//
// Provides letterbox preprocessing into model tensors, heatmap-to-polygon
// corner detection, DLT homography estimation, and bilinear perspective
// rectification of the source photo.

pub mod homography;
pub mod image;
pub mod letterbox;
pub mod postprocess;
pub mod preprocess;
pub mod rectify;

// Re-export the primary structs so callers can use `docflat_vision::Rectifier` etc.
pub use homography::Homography;
pub use crate::image::processor::ImageProcessor;
pub use letterbox::Letterbox;
pub use postprocess::{Detection, Peak, Postprocessor};
pub use preprocess::{PreparedInput, Preprocessor};
pub use rectify::{Rectified, Rectifier};
