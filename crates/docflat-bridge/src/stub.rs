// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub gateway for builds and hosts with no inference runtime.

use docflat_core::Tensor;
use docflat_core::error::{DocflatError, Result};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::traits::InferenceGateway;

/// Gateway that is never ready.
pub struct UnavailableGateway;

impl InferenceGateway for UnavailableGateway {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn infer(&self, _input: Tensor) -> BoxFuture<'_, Result<Tensor>> {
        tracing::warn!("InferenceGateway::infer called on stub gateway");
        futures::future::ready(Err(DocflatError::NativeBridge(
            "no inference runtime configured".into(),
        )))
        .boxed()
    }
}
