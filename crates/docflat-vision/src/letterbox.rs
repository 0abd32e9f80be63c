// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Letterbox geometry — aspect-preserving fit of a photo into the square model
// input, and the coordinate maps between the two frames.

use docflat_core::{Point, Size};

/// Placement of a resized photo inside the model's input frame.
///
/// The photo is scaled uniformly to fit `target`, rounded to whole pixels and
/// centred; the remaining border is padding. Coordinates are continuous with
/// pixel `i` centred on `i` (covering `[i - 0.5, i + 0.5)`), so `to_model`
/// and `to_original` are exact inverses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub original: Size,
    pub target: Size,
    /// Size of the photo content inside `target`.
    pub content: Size,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Fit `original` into `target` preserving aspect ratio.
    ///
    /// Both sizes must be non-zero; the content is at least one pixel each way.
    pub fn fit(original: Size, target: Size) -> Self {
        let ow = original.width.max(1) as f64;
        let oh = original.height.max(1) as f64;
        let scale = (target.width as f64 / ow).min(target.height as f64 / oh);

        let content = Size::new(
            ((ow * scale).round() as u32).clamp(1, target.width.max(1)),
            ((oh * scale).round() as u32).clamp(1, target.height.max(1)),
        );
        Self {
            original,
            target,
            content,
            pad_x: (target.width.saturating_sub(content.width)) / 2,
            pad_y: (target.height.saturating_sub(content.height)) / 2,
        }
    }

    /// Horizontal scale from original to model pixels.
    pub fn scale_x(&self) -> f64 {
        self.content.width as f64 / self.original.width.max(1) as f64
    }

    /// Vertical scale from original to model pixels.
    pub fn scale_y(&self) -> f64 {
        self.content.height as f64 / self.original.height.max(1) as f64
    }

    /// Map a point in original-image pixels into model-input pixels.
    pub fn to_model(&self, p: Point) -> Point {
        Point::new(
            (p.x + 0.5) * self.scale_x() + self.pad_x as f64 - 0.5,
            (p.y + 0.5) * self.scale_y() + self.pad_y as f64 - 0.5,
        )
    }

    /// Map a point in model-input pixels back into original-image pixels.
    pub fn to_original(&self, p: Point) -> Point {
        Point::new(
            (p.x + 0.5 - self.pad_x as f64) / self.scale_x() - 0.5,
            (p.y + 0.5 - self.pad_y as f64) / self.scale_y() - 0.5,
        )
    }
}
