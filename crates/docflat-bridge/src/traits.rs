// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait for model inference.

use docflat_core::Tensor;
use docflat_core::error::Result;
use futures::future::BoxFuture;

/// Asynchronous access to the pretrained page-detection model.
///
/// One call per request, no streaming. Implementations may use FFI, RPC or
/// an in-process runtime; callers always await the returned future and never
/// block on it.
pub trait InferenceGateway: Send + Sync {
    /// Short runtime name for logs (e.g. "rten", "recorded").
    fn name(&self) -> &str;

    /// Whether model assets are loaded and `infer` can succeed.
    fn is_ready(&self) -> bool;

    /// Evaluate the model on a planar input tensor, returning its output
    /// (one heatmap channel, or one channel per corner).
    fn infer(&self, input: Tensor) -> BoxFuture<'_, Result<Tensor>>;
}
