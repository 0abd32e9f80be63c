// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Docflat rectification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{DocflatError, ErrorKind, Result};

/// Stable identity of a photo, derived from its source URI.
///
/// Two submissions of the same URI map to the same id, which is what lets the
/// session manager deduplicate runs and key its cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotoId(pub String);

impl PhotoId {
    /// SHA-256 of the URI, hex encoded.
    pub fn from_uri(uri: &str) -> Self {
        let digest = Sha256::digest(uri.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The full digest is unwieldy in logs; the first 12 hex chars are plenty.
        let short: String = self.0.chars().take(12).collect();
        f.write_str(&short)
    }
}

/// Unique identifier for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a captured photo as seen by the rest of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoState {
    Captured,
    Queued,
    Processing,
    Rectified,
    Failed,
}

/// Per-photo processing state machine.
///
/// `Idle → Queued → Running → {Rectified | FailedFallback | Failed | Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Never submitted, or evicted.
    Idle,
    /// Waiting for a concurrency slot.
    Queued,
    /// Pipeline stages are executing.
    Running,
    /// Page detected and flattened.
    Rectified,
    /// Detection or transform failed; the original image stands in.
    FailedFallback,
    /// Decode or bridge failure surfaced to the caller.
    Failed,
    /// Cancelled by the caller; nothing was cached.
    Cancelled,
}

impl TaskState {
    /// Whether the state machine can leave this state on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rectified | Self::FailedFallback | Self::Failed | Self::Cancelled
        )
    }

    /// Whether a run is in flight (and a resubmission must be deduplicated).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Project onto the coarser photo lifecycle.
    pub fn photo_state(&self) -> PhotoState {
        match self {
            Self::Idle => PhotoState::Captured,
            Self::Queued => PhotoState::Queued,
            Self::Running => PhotoState::Processing,
            Self::Rectified | Self::FailedFallback => PhotoState::Rectified,
            Self::Failed | Self::Cancelled => PhotoState::Failed,
        }
    }
}

/// A photo handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoAsset {
    pub id: PhotoId,
    pub source_uri: String,
    pub captured_at: DateTime<Utc>,
    pub state: PhotoState,
}

impl PhotoAsset {
    pub fn new(source_uri: impl Into<String>) -> Self {
        let source_uri = source_uri.into();
        Self {
            id: PhotoId::from_uri(&source_uri),
            source_uri,
            captured_at: Utc::now(),
            state: PhotoState::Captured,
        }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

/// A point in continuous pixel coordinates (y pointing down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Tensors
// ---------------------------------------------------------------------------

/// Dense `f32` tensor in planar (channel-major) layout.
///
/// The value at channel `c`, column `x`, row `y` lives at
/// `data[c * width * height + y * width + x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Tensor {
    /// Wrap a buffer, rejecting it unless `data.len() == width * height * channels`.
    ///
    /// A shape whose element count overflows `usize` is reported with
    /// `expected == usize::MAX`; no buffer can match it.
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        let expected = width.saturating_mul(height).saturating_mul(channels);
        if data.len() != expected {
            return Err(DocflatError::InvalidTensor {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Tensor of the given shape filled with `value`.
    ///
    /// # Panics
    ///
    /// Panics like `vec!` if the element count does not fit in memory.
    pub fn filled(width: usize, height: usize, channels: usize, value: f32) -> Self {
        let len = width.saturating_mul(height).saturating_mul(channels);
        Self {
            width,
            height,
            channels,
            data: vec![value; len],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// One channel plane as a row-major slice.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= self.channels()`.
    pub fn plane(&self, channel: usize) -> &[f32] {
        let len = self.width * self.height;
        &self.data[channel * len..(channel + 1) * len]
    }

    pub fn get(&self, channel: usize, x: usize, y: usize) -> f32 {
        self.data[channel * self.width * self.height + y * self.width + x]
    }

    pub fn set(&mut self, channel: usize, x: usize, y: usize, value: f32) {
        let idx = channel * self.width * self.height + y * self.width + x;
        self.data[idx] = value;
    }
}

/// Single-channel confidence map with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    tensor: Tensor,
}

impl Heatmap {
    /// Build a heatmap, clamping values into [0, 1]. NaN becomes 0.
    pub fn new(width: usize, height: usize, mut data: Vec<f32>) -> Result<Self> {
        for v in &mut data {
            *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        }
        let tensor = Tensor::new(width, height, 1, data)?;
        Ok(Self { tensor })
    }

    /// Split a model output into one heatmap per channel.
    pub fn planes(tensor: &Tensor) -> Result<Vec<Heatmap>> {
        (0..tensor.channels())
            .map(|c| Heatmap::new(tensor.width(), tensor.height(), tensor.plane(c).to_vec()))
            .collect()
    }

    pub fn width(&self) -> usize {
        self.tensor.width()
    }

    pub fn height(&self) -> usize {
        self.tensor.height()
    }

    pub fn value(&self, x: usize, y: usize) -> f32 {
        self.tensor.get(0, x, y)
    }

    pub fn as_slice(&self) -> &[f32] {
        self.tensor.as_slice()
    }

    pub fn max_value(&self) -> f32 {
        self.tensor.as_slice().iter().copied().fold(0.0, f32::max)
    }

    pub fn as_tensor(&self) -> &Tensor {
        &self.tensor
    }
}

// ---------------------------------------------------------------------------
// Polygon
// ---------------------------------------------------------------------------

/// Absolute area (in px²) below which a quadrilateral is considered collapsed.
const MIN_POLYGON_AREA: f64 = 1e-6;

/// Four page corners, clockwise from the point nearest the top-left.
///
/// Construction always goes through [`Polygon::canonical`], so a `Polygon`
/// value is convex and non-self-intersecting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[Point; 4]", into = "[Point; 4]")]
pub struct Polygon {
    points: [Point; 4],
}

impl Polygon {
    /// Order four points canonically and validate the resulting quadrilateral.
    ///
    /// Points are sorted by angle around their centroid (increasing angle is
    /// clockwise on screen because y points down), then rotated so the point
    /// closest (Euclidean) to the top-left of their bounding box comes first;
    /// ties go to the smaller `y`.
    pub fn canonical(points: [Point; 4]) -> Result<Self> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(DocflatError::DegeneratePolygon(
                "corner coordinates must be finite".into(),
            ));
        }

        let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
        let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

        let mut sorted = points;
        sorted.sort_by(|a, b| {
            let ta = (a.y - cy).atan2(a.x - cx);
            let tb = (b.y - cy).atan2(b.x - cx);
            ta.total_cmp(&tb)
        });

        let top_left = Point::new(
            sorted.iter().map(|p| p.x).fold(f64::INFINITY, f64::min),
            sorted.iter().map(|p| p.y).fold(f64::INFINITY, f64::min),
        );
        let start = (0..4)
            .min_by(|&i, &j| {
                let di = sorted[i].distance(&top_left);
                let dj = sorted[j].distance(&top_left);
                di.total_cmp(&dj).then(sorted[i].y.total_cmp(&sorted[j].y))
            })
            .unwrap_or(0);
        sorted.rotate_left(start);

        let polygon = Self { points: sorted };
        polygon.validate()?;
        Ok(polygon)
    }

    /// Polygon covering a whole `size` frame; used when detection falls back.
    pub fn full_frame(size: Size) -> Self {
        let (w, h) = (size.width as f64, size.height as f64);
        Self {
            points: [
                Point::new(0.0, 0.0),
                Point::new(w, 0.0),
                Point::new(w, h),
                Point::new(0.0, h),
            ],
        }
    }

    fn validate(&self) -> Result<()> {
        let area = self.area();
        if area < MIN_POLYGON_AREA {
            return Err(DocflatError::DegeneratePolygon(format!(
                "quadrilateral area {area:.3} is effectively zero"
            )));
        }

        // Convex and simple iff every turn has the same orientation.
        let mut sign = 0.0f64;
        for i in 0..4 {
            let a = self.points[i];
            let b = self.points[(i + 1) % 4];
            let c = self.points[(i + 2) % 4];
            let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
            if cross.abs() < MIN_POLYGON_AREA {
                return Err(DocflatError::DegeneratePolygon(
                    "three corners are collinear".into(),
                ));
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return Err(DocflatError::DegeneratePolygon(
                    "quadrilateral is not convex".into(),
                ));
            }
        }
        Ok(())
    }

    /// `[top_left, top_right, bottom_right, bottom_left]` for an upright page.
    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    /// Shoelace area in px².
    pub fn area(&self) -> f64 {
        let mut twice = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += self.points[i].x * self.points[j].y - self.points[j].x * self.points[i].y;
        }
        twice.abs() / 2.0
    }
}

impl TryFrom<[Point; 4]> for Polygon {
    type Error = DocflatError;

    fn try_from(points: [Point; 4]) -> Result<Self> {
        Self::canonical(points)
    }
}

impl From<Polygon> for [Point; 4] {
    fn from(polygon: Polygon) -> Self {
        polygon.points
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of a completed pipeline run, cached by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectificationResult {
    pub photo_id: PhotoId,
    pub polygon: Polygon,
    /// Rectified image location, or the original photo URI on fallback.
    pub image_uri: String,
    /// Row-major 3×3 matrix mapping source pixels to output pixels.
    pub homography: [[f64; 3]; 3],
    /// Mean corner confidence in [0, 1]; 0 on fallback.
    pub confidence: f32,
    pub output_size: Size,
    /// Set when the original image stands in for a failed detection.
    pub fallback_reason: Option<ErrorKind>,
}

impl RectificationResult {
    pub const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    /// Result that points back at the untouched original photo.
    pub fn fallback(photo: &PhotoAsset, original_size: Size, reason: ErrorKind) -> Self {
        Self {
            photo_id: photo.id.clone(),
            polygon: Polygon::full_frame(original_size),
            image_uri: photo.source_uri.clone(),
            homography: Self::IDENTITY,
            confidence: 0.0,
            output_size: original_size,
            fallback_reason: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}
