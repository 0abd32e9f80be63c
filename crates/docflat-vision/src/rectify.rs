// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectifier — flatten a detected page into an upright rectangle by
// resampling the photo through a homography.

use docflat_core::config::DocflatConfig;
use docflat_core::error::{DocflatError, Result};
use docflat_core::{Point, Polygon, Size};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

use crate::homography::Homography;
use crate::image::processor::encode_png;

/// Longest output side we are willing to allocate.
pub const MAX_OUTPUT_SIDE: u32 = 16_384;

/// A flattened page.
pub struct Rectified {
    pub image: DynamicImage,
    /// Maps source-photo pixels onto output pixels.
    pub homography: Homography,
    pub size: Size,
}

impl Rectified {
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// Perspective-corrects photos given the page polygon.
#[derive(Debug, Clone)]
pub struct Rectifier {
    /// Colour for output pixels that map outside the photo.
    fill: Rgba<u8>,
}

impl Rectifier {
    pub fn new(fill: [u8; 4]) -> Self {
        Self { fill: Rgba(fill) }
    }

    pub fn from_config(config: &DocflatConfig) -> Self {
        Self::new(config.fill_rgba)
    }

    /// Output rectangle for `polygon`: width is the mean of the top and bottom
    /// edges, height the mean of the left and right edges.
    pub fn output_size(polygon: &Polygon) -> Result<Size> {
        let [tl, tr, br, bl] = *polygon.points();
        let width = ((tl.distance(&tr) + bl.distance(&br)) / 2.0).round();
        let height = ((tl.distance(&bl) + tr.distance(&br)) / 2.0).round();

        if !(width.is_finite() && height.is_finite())
            || width > MAX_OUTPUT_SIDE as f64
            || height > MAX_OUTPUT_SIDE as f64
        {
            return Err(DocflatError::Transform(format!(
                "output of {width}x{height} exceeds {MAX_OUTPUT_SIDE}px"
            )));
        }
        Ok(Size::new((width as u32).max(2), (height as u32).max(2)))
    }

    /// Warp the page inside `polygon` onto an upright rectangle.
    ///
    /// The source image is only read. Fails with `Transform` if no valid
    /// homography exists for the polygon.
    #[instrument(skip_all, fields(src_w = image.width(), src_h = image.height()))]
    pub fn rectify(&self, image: &DynamicImage, polygon: &Polygon) -> Result<Rectified> {
        let size = Self::output_size(polygon)?;
        let (max_x, max_y) = ((size.width - 1) as f64, (size.height - 1) as f64);

        // Corners land on the centres of the output's corner pixels.
        let dest = [
            Point::new(0.0, 0.0),   // top-left
            Point::new(max_x, 0.0), // top-right
            Point::new(max_x, max_y),
            Point::new(0.0, max_y),
        ];
        let homography = Homography::from_quad(polygon.points(), &dest)?;
        debug!(matrix = ?homography.to_rows(), "Homography computed");

        let projection = Projection::from_matrix(homography.to_f32_array()).ok_or_else(|| {
            DocflatError::Transform("projection matrix is not invertible".into())
        })?;

        let rgba_input = image.to_rgba8();
        let mut output = RgbaImage::new(size.width, size.height);
        warp_into(&rgba_input, &projection, Interpolation::Bilinear, self.fill, &mut output);

        info!(out_w = size.width, out_h = size.height, "Perspective correction applied");

        Ok(Rectified {
            image: DynamicImage::ImageRgba8(output),
            homography,
            size,
        })
    }
}
