// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode captured photos and encode rectified output.
// Operates on in-memory images using the `image` crate.

use docflat_core::error::{DocflatError, Result};
use docflat_core::Size;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, instrument};

/// A decoded photo held in memory.
///
/// Source photos are only ever read; every stage that changes pixels produces
/// a new image.
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, etc.).
    ///
    /// Fails with `Decode` for unreadable data and for images with a zero
    /// dimension, since nothing downstream can work with those.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| DocflatError::Decode(format!("failed to decode image: {err}")))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(DocflatError::Decode(format!(
                "image has no pixels ({}x{})",
                img.width(),
                img.height()
            )));
        }
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Dimensions of the decoded image.
    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// Encode any `DynamicImage` as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    encode_to_format(image, ImageFormat::Png)
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        DocflatError::Io(std::io::Error::other(format!("image encoding failed: {err}")))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn png_bytes_decode_back_to_same_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(17, 9, Rgb([10, 20, 30])));
        let bytes = ImageProcessor::from_dynamic(img).to_png_bytes().unwrap();
        let decoded = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.size(), Size::new(17, 9));
        assert_eq!(decoded.as_dynamic().to_rgb8().get_pixel(3, 4), &Rgb([10, 20, 30]));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = ImageProcessor::from_bytes(b"definitely not an image")
            .err()
            .unwrap();
        assert!(matches!(err, DocflatError::Decode(_)));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        let bytes = ImageProcessor::from_dynamic(img).to_png_bytes().unwrap();
        let err = ImageProcessor::from_bytes(&bytes[..bytes.len() / 2])
            .err()
            .unwrap();
        assert!(matches!(err, DocflatError::Decode(_)));
    }
}
