// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recorded gateway — replays a model output captured from a device runtime,
// for offline debugging of the postprocess and rectify stages.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use docflat_core::Tensor;
use docflat_core::error::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, instrument};

use crate::codec;
use crate::traits::InferenceGateway;

/// Answers every request with the same recorded output tensor.
pub struct RecordedGateway {
    output: Tensor,
    calls: AtomicUsize,
}

impl RecordedGateway {
    pub fn new(output: Tensor) -> Self {
        Self {
            output,
            calls: AtomicUsize::new(0),
        }
    }

    /// Decode a base64 f32 buffer of the given shape.
    pub fn from_base64(encoded: &str, width: usize, height: usize, channels: usize) -> Result<Self> {
        Ok(Self::new(codec::decode_tensor(encoded, width, height, channels)?))
    }

    /// Read a file holding a base64 f32 buffer of the given shape.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(
        path: impl AsRef<Path>,
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Self> {
        let encoded = tokio::fs::read_to_string(path.as_ref()).await?;
        let gateway = Self::from_base64(&encoded, width, height, channels)?;
        info!(width, height, channels, "Recorded heatmap loaded");
        Ok(gateway)
    }

    /// Number of `infer` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceGateway for RecordedGateway {
    fn name(&self) -> &str {
        "recorded"
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn infer(&self, input: Tensor) -> BoxFuture<'_, Result<Tensor>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            call = n,
            input_w = input.width(),
            input_h = input.height(),
            "Replaying recorded output"
        );
        futures::future::ready(Ok(self.output.clone())).boxed()
    }
}
