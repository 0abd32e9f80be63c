// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docflat-bridge — the boundary between the pipeline and model runtimes.
//
// Defines the asynchronous `InferenceGateway` capability, the base64 f32
// wire codec shared with device runtimes, the JSON contract those runtimes
// call into, and the gateways available on this build.

use std::path::Path;
use std::sync::Arc;

use docflat_core::error::Result;

pub mod codec;
pub mod native;
pub mod recorded;
pub mod stub;
pub mod traits;

#[cfg(feature = "rten")]
pub mod rten_gateway;

pub use recorded::RecordedGateway;
pub use stub::UnavailableGateway;
pub use traits::InferenceGateway;

#[cfg(feature = "rten")]
pub use rten_gateway::RtenGateway;

/// Build the in-process gateway for `model_path` on this build.
///
/// Without the `rten` feature, or without a model path, this is an
/// [`UnavailableGateway`] and every photo falls back to its original image.
pub fn local_gateway(model_path: Option<&Path>) -> Result<Arc<dyn InferenceGateway>> {
    match model_path {
        #[cfg(feature = "rten")]
        Some(path) => Ok(Arc::new(RtenGateway::load(path)?)),
        #[cfg(not(feature = "rten"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "Built without the \"rten\" feature; model file ignored"
            );
            Ok(Arc::new(UnavailableGateway))
        }
        None => Ok(Arc::new(UnavailableGateway)),
    }
}
