// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessor — turn a captured photo into the detection model's input
// tensor (letterboxed, RGB, planar, scaled to [0, 1]).

use docflat_core::config::DocflatConfig;
use docflat_core::error::Result;
use docflat_core::{Size, Tensor};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;
use crate::letterbox::Letterbox;

/// Colour channels fed to the model (RGB).
pub const INPUT_CHANNELS: usize = 3;

/// Model input plus what is needed to map detections back onto the photo.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    /// `input_size × input_size × 3`, planar.
    pub tensor: Tensor,
    pub original_size: Size,
    pub letterbox: Letterbox,
}

/// Normalises photos for a square-input detection model.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input_size: u32,
    pad_value: f32,
}

impl Preprocessor {
    pub fn new(input_size: u32, pad_value: f32) -> Self {
        Self {
            input_size: input_size.max(1),
            pad_value,
        }
    }

    pub fn from_config(config: &DocflatConfig) -> Self {
        Self::new(config.model_input_size, config.pad_value)
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Decode `data` and prepare it. Fails with `Decode` on unreadable bytes.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn prepare(&self, data: &[u8]) -> Result<PreparedInput> {
        let processor = ImageProcessor::from_bytes(data)?;
        Ok(self.prepare_image(processor.as_dynamic()))
    }

    /// Letterbox an already-decoded image into a model tensor.
    pub fn prepare_image(&self, image: &DynamicImage) -> PreparedInput {
        let original = Size::new(image.width(), image.height());
        let side = self.input_size;
        let letterbox = Letterbox::fit(original, Size::new(side, side));

        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb,
            letterbox.content.width,
            letterbox.content.height,
            FilterType::Triangle,
        );

        let n = side as usize;
        let mut tensor = Tensor::filled(n, n, INPUT_CHANNELS, self.pad_value);
        let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..INPUT_CHANNELS {
                tensor.set(
                    c,
                    pad_x + x as usize,
                    pad_y + y as usize,
                    pixel[c] as f32 / 255.0,
                );
            }
        }

        debug!(
            orig_w = original.width,
            orig_h = original.height,
            content_w = letterbox.content.width,
            content_h = letterbox.content.height,
            pad_x,
            pad_y,
            "Photo letterboxed into model input"
        );

        PreparedInput {
            tensor,
            original_size: original,
            letterbox,
        }
    }
}
