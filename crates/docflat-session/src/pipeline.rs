// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One pipeline run: read → decode → preprocess → infer → postprocess →
// rectify → write. Stages run strictly in order; CPU-bound stages run on the
// blocking pool and the cancellation flag is checked between stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docflat_bridge::InferenceGateway;
use docflat_core::config::DocflatConfig;
use docflat_core::error::{DocflatError, ErrorKind, Result};
use docflat_core::{Heatmap, PhotoAsset, RectificationResult, TaskId};
use docflat_vision::{ImageProcessor, Postprocessor, Preprocessor, Rectifier};
use tracing::{debug, info, instrument, warn};

use crate::policy::{FailurePolicy, classify_error};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub enum RunOutput {
    /// The page was flattened and written to `output_path`.
    Rectified {
        result: RectificationResult,
        output_path: PathBuf,
    },
    /// Detection failed in a recoverable way; the original photo stands in.
    Fallback(RectificationResult),
}

impl RunOutput {
    pub fn result(&self) -> &RectificationResult {
        match self {
            Self::Rectified { result, .. } | Self::Fallback(result) => result,
        }
    }
}

/// The configured vision stages plus where rectified images go.
#[derive(Debug, Clone)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    postprocessor: Postprocessor,
    rectifier: Rectifier,
    output_dir: PathBuf,
}

impl Pipeline {
    pub fn from_config(config: &DocflatConfig) -> Self {
        Self {
            preprocessor: Preprocessor::from_config(config),
            postprocessor: Postprocessor::from_config(config),
            rectifier: Rectifier::from_config(config),
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run every stage for `photo`.
    ///
    /// Recoverable detection failures, and a gateway that is not ready,
    /// come back as `RunOutput::Fallback`; everything else is an error.
    #[instrument(skip_all, fields(photo_id = %photo.id, task_id = %task_id, gateway = gateway.name()))]
    pub async fn run(
        &self,
        gateway: &dyn InferenceGateway,
        photo: &PhotoAsset,
        task_id: TaskId,
        cancel: &AtomicBool,
    ) -> Result<RunOutput> {
        let bytes = tokio::fs::read(source_path(&photo.source_uri)).await?;
        checkpoint(cancel)?;

        let image = Arc::new(blocking(move || ImageProcessor::from_bytes(&bytes)).await?);
        let original_size = image.size();
        checkpoint(cancel)?;

        if !gateway.is_ready() {
            warn!("Model not ready; keeping the original photo");
            return Ok(RunOutput::Fallback(RectificationResult::fallback(
                photo,
                original_size,
                ErrorKind::NativeBridge,
            )));
        }

        match self.detect_and_rectify(gateway, photo, task_id, image, cancel).await {
            Ok(output) => Ok(output),
            Err(err) => match classify_error(&err) {
                FailurePolicy::Fallback => {
                    warn!(error = %err, "Detection failed; keeping the original photo");
                    Ok(RunOutput::Fallback(RectificationResult::fallback(
                        photo,
                        original_size,
                        err.kind(),
                    )))
                }
                FailurePolicy::Surface => Err(err),
            },
        }
    }

    async fn detect_and_rectify(
        &self,
        gateway: &dyn InferenceGateway,
        photo: &PhotoAsset,
        task_id: TaskId,
        image: Arc<ImageProcessor>,
        cancel: &AtomicBool,
    ) -> Result<RunOutput> {
        let prepared = {
            let image = Arc::clone(&image);
            let preprocessor = self.preprocessor.clone();
            blocking(move || Ok(preprocessor.prepare_image(image.as_dynamic()))).await?
        };
        checkpoint(cancel)?;

        // An in-flight call is never aborted; a cancelled task drops its output.
        let output = gateway.infer(prepared.tensor).await?;
        checkpoint(cancel)?;
        debug!(
            out_w = output.width(),
            out_h = output.height(),
            out_c = output.channels(),
            "Inference complete"
        );

        let postprocessor = self.postprocessor.clone();
        let rectifier = self.rectifier.clone();
        let letterbox = prepared.letterbox;
        let (detection, rectified, png) = blocking(move || {
            let planes = Heatmap::planes(&output)?;
            let detection = postprocessor.locate_corners(&planes, &letterbox)?;
            let rectified = rectifier.rectify(image.as_dynamic(), &detection.polygon)?;
            let png = rectified.to_png_bytes()?;
            Ok((detection, rectified, png))
        })
        .await?;
        checkpoint(cancel)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output_path = self.output_dir.join(format!("{}-{}.png", photo.id, task_id));
        tokio::fs::write(&output_path, png).await?;

        info!(
            confidence = detection.confidence,
            out_w = rectified.size.width,
            out_h = rectified.size.height,
            path = %output_path.display(),
            "Photo rectified"
        );

        Ok(RunOutput::Rectified {
            result: RectificationResult {
                photo_id: photo.id.clone(),
                polygon: detection.polygon,
                image_uri: output_path.display().to_string(),
                homography: rectified.homography.to_rows(),
                confidence: detection.confidence,
                output_size: rectified.size,
                fallback_reason: None,
            },
            output_path,
        })
    }
}

// -- Helpers ------------------------------------------------------------------

/// Local path for a photo URI (`file://` prefix optional).
pub fn source_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

fn checkpoint(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::SeqCst) {
        debug!("Cancellation observed between stages");
        return Err(DocflatError::Cancelled);
    }
    Ok(())
}

/// Run CPU-bound work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        DocflatError::Io(std::io::Error::other(format!("pipeline worker failed: {e}")))
    })?
}
