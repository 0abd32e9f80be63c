// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process inference via the `rten` runtime.
//
// **Important:** `rten` should be compiled in release mode; debug builds are
// orders of magnitude slower.

use std::path::Path;
use std::sync::Arc;

use docflat_core::Tensor;
use docflat_core::error::{DocflatError, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use tracing::{debug, info, instrument};

use crate::traits::InferenceGateway;

/// Runs a `.rten` page-detection model on a blocking worker thread.
pub struct RtenGateway {
    model: Arc<Model>,
}

impl RtenGateway {
    /// Load a model file. Fails with `NativeBridge` if it cannot be parsed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let model = Model::load_file(path.as_ref()).map_err(|err| {
            DocflatError::NativeBridge(format!(
                "failed to load model {}: {err}",
                path.as_ref().display()
            ))
        })?;
        info!("Detection model loaded");
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

impl InferenceGateway for RtenGateway {
    fn name(&self) -> &str {
        "rten"
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn infer(&self, input: Tensor) -> BoxFuture<'_, Result<Tensor>> {
        let model = Arc::clone(&self.model);
        async move {
            tokio::task::spawn_blocking(move || run_model(&model, input))
                .await
                .map_err(|e| DocflatError::NativeBridge(format!("inference worker failed: {e}")))?
        }
        .boxed()
    }
}

/// NCHW forward pass with a batch of one.
fn run_model(model: &Model, input: Tensor) -> Result<Tensor> {
    let (w, h, c) = (input.width(), input.height(), input.channels());
    let batch = NdTensor::from_data([1, c, h, w], input.into_vec());

    let output = model
        .run_one(batch.view().into(), None)
        .map_err(|e| DocflatError::NativeBridge(format!("model run failed: {e}")))?;
    let output: NdTensor<f32, 4> = output
        .try_into()
        .map_err(|e| DocflatError::NativeBridge(format!("unexpected model output: {e:?}")))?;

    let [_, oc, oh, ow] = output.shape();
    debug!(out_w = ow, out_h = oh, out_c = oc, "Model output");
    Tensor::new(ow, oh, oc, output.to_vec())
}
