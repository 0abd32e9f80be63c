// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native runtime contract — the JSON calls a device host makes into the
// vision stages (`preprocess`, `postprocessHeatmap`, `transformImage`), and
// the response types the pipeline decodes when a device runtime answers.
//
// Every failure at this boundary is reported as `NativeBridge`.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use docflat_core::config::DocflatConfig;
use docflat_core::error::{DocflatError, Result};
use docflat_core::{Heatmap, Point, Polygon, Size, Tensor};
use docflat_vision::preprocess::INPUT_CHANNELS;
use docflat_vision::{ImageProcessor, Letterbox, Postprocessor, Preprocessor, Rectifier};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::codec;

// -- Wire types ---------------------------------------------------------------

/// `preprocess` result: the model input tensor and the photo's size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessResponse {
    /// Base64 little-endian f32, planar RGB.
    pub data: String,
    pub original_size: Size,
}

impl PreprocessResponse {
    /// Decode `data` as a square `input_size` RGB tensor.
    pub fn tensor(&self, input_size: usize) -> Result<Tensor> {
        codec::decode_tensor(&self.data, input_size, input_size, INPUT_CHANNELS)
    }
}

/// `postprocessHeatmap` arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostprocessRequest {
    /// Base64 little-endian f32, planar.
    pub heatmap: String,
    pub width: usize,
    pub height: usize,
    /// 1 for a combined heatmap, 4 for one plane per corner.
    #[serde(default = "default_heatmap_channels")]
    pub channels: usize,
    pub original_size: Size,
}

fn default_heatmap_channels() -> usize {
    4
}

/// `transformImage` arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub image: String,
    pub corners: [Point; 4],
}

/// `transformImage` result: a base64 PNG of the flattened page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    pub data: String,
    pub width: u32,
    pub height: u32,
    pub homography: [[f64; 3]; 3],
}

// -- Host-facing entry points -------------------------------------------------

/// The vision stages as a device host sees them.
#[derive(Debug, Clone)]
pub struct NativeVision {
    preprocessor: Preprocessor,
    postprocessor: Postprocessor,
    rectifier: Rectifier,
}

impl NativeVision {
    pub fn from_config(config: &DocflatConfig) -> Self {
        Self {
            preprocessor: Preprocessor::from_config(config),
            postprocessor: Postprocessor::from_config(config),
            rectifier: Rectifier::from_config(config),
        }
    }

    /// `preprocess(imageBytesAsBase64)`.
    #[instrument(skip_all, fields(input_len = image_base64.len()))]
    pub fn preprocess(&self, image_base64: &str) -> Result<PreprocessResponse> {
        let bytes = decode_image_base64(image_base64)?;
        let prepared = self.preprocessor.prepare(&bytes).map_err(into_bridge)?;
        Ok(PreprocessResponse {
            data: codec::encode_tensor(&prepared.tensor),
            original_size: prepared.original_size,
        })
    }

    /// `postprocessHeatmap(heatmapAsBase64, width, height)`.
    #[instrument(skip_all, fields(width = request.width, height = request.height, channels = request.channels))]
    pub fn postprocess_heatmap(&self, request: &PostprocessRequest) -> Result<Polygon> {
        let tensor = codec::decode_tensor(
            &request.heatmap,
            request.width,
            request.height,
            request.channels,
        )?;
        let planes = Heatmap::planes(&tensor).map_err(into_bridge)?;
        let side = self.preprocessor.input_size();
        let letterbox = Letterbox::fit(request.original_size, Size::new(side, side));
        let detection = self
            .postprocessor
            .locate_corners(&planes, &letterbox)
            .map_err(into_bridge)?;
        Ok(detection.polygon)
    }

    /// `transformImage(imageAsBase64, corners)`.
    #[instrument(skip_all)]
    pub fn transform_image(&self, request: &TransformRequest) -> Result<TransformResponse> {
        let bytes = decode_image_base64(&request.image)?;
        let image = ImageProcessor::from_bytes(&bytes).map_err(into_bridge)?;
        let polygon = Polygon::canonical(request.corners).map_err(into_bridge)?;
        let rectified = self
            .rectifier
            .rectify(image.as_dynamic(), &polygon)
            .map_err(into_bridge)?;
        let png = rectified.to_png_bytes()?;
        Ok(TransformResponse {
            data: STANDARD.encode(png),
            width: rectified.size.width,
            height: rectified.size.height,
            homography: rectified.homography.to_rows(),
        })
    }

    /// Dispatch a JSON call by method name and return the JSON result.
    pub fn handle_json(&self, method: &str, payload: &str) -> Result<String> {
        debug!(method, payload_len = payload.len(), "Native call");
        let json = match method {
            "preprocess" => {
                let image: String = parse(payload)?;
                serde_json::to_string(&self.preprocess(&image)?)?
            }
            "postprocessHeatmap" => {
                let request: PostprocessRequest = parse(payload)?;
                serde_json::to_string(&self.postprocess_heatmap(&request)?)?
            }
            "transformImage" => {
                let request: TransformRequest = parse(payload)?;
                serde_json::to_string(&self.transform_image(&request)?)?
            }
            other => {
                return Err(DocflatError::NativeBridge(format!("unknown method: {other}")));
            }
        };
        Ok(json)
    }
}

// -- Helpers ------------------------------------------------------------------

fn parse<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| DocflatError::NativeBridge(format!("malformed payload: {e}")))
}

fn decode_image_base64(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DocflatError::NativeBridge(format!("invalid base64 image: {e}")))
}

/// Report input-shaped failures as bridge errors; keep I/O and config as-is.
fn into_bridge(err: DocflatError) -> DocflatError {
    match err {
        DocflatError::Io(_) | DocflatError::Config(_) | DocflatError::NativeBridge(_) => err,
        other => DocflatError::NativeBridge(other.to_string()),
    }
}
