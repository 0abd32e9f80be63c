// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Heatmap postprocessing — find corner peaks in the model's confidence maps
// and map them back onto the original photo as an ordered polygon.

use docflat_core::config::DocflatConfig;
use docflat_core::error::{DocflatError, Result};
use docflat_core::{Heatmap, Point, Polygon, Size};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, instrument, warn};

use crate::letterbox::Letterbox;

/// One connected region of above-threshold heatmap pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Confidence-weighted centroid, in heatmap pixels.
    pub position: Point,
    /// Highest value inside the region.
    pub confidence: f32,
    /// Region size in heatmap pixels.
    pub area: u32,
}

/// A located page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Corners in original-photo pixels.
    pub polygon: Polygon,
    /// Mean peak value of the four corners.
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    weight: f64,
    sum_x: f64,
    sum_y: f64,
    peak: f32,
    area: u32,
}

/// Converts model heatmaps into page polygons.
#[derive(Debug, Clone)]
pub struct Postprocessor {
    peak_threshold: f32,
    min_area_ratio: f64,
}

impl Postprocessor {
    pub fn new(peak_threshold: f32, min_area_ratio: f64) -> Self {
        Self {
            peak_threshold,
            min_area_ratio,
        }
    }

    pub fn from_config(config: &DocflatConfig) -> Self {
        Self::new(config.peak_threshold, config.min_area_ratio)
    }

    /// Label 8-connected regions at or above the threshold and return one
    /// peak per region, most confident first.
    pub fn find_peaks(&self, heatmap: &Heatmap) -> Vec<Peak> {
        let (w, h) = (heatmap.width() as u32, heatmap.height() as u32);
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let mask = GrayImage::from_fn(w, h, |x, y| {
            let v = heatmap.value(x as usize, y as usize);
            Luma([if v > 0.0 && v >= self.peak_threshold { 255 } else { 0 }])
        });
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        let mut regions: Vec<Accumulator> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if label >= regions.len() {
                regions.resize(label + 1, Accumulator::default());
            }
            let v = heatmap.value(x as usize, y as usize);
            let acc = &mut regions[label];
            acc.weight += v as f64;
            acc.sum_x += v as f64 * x as f64;
            acc.sum_y += v as f64 * y as f64;
            acc.peak = acc.peak.max(v);
            acc.area += 1;
        }

        let mut peaks: Vec<Peak> = regions
            .into_iter()
            .filter(|acc| acc.area > 0 && acc.weight > 0.0)
            .map(|acc| Peak {
                position: Point::new(acc.sum_x / acc.weight, acc.sum_y / acc.weight),
                confidence: acc.peak,
                area: acc.area,
            })
            .collect();
        peaks.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(b.area.cmp(&a.area))
        });
        peaks
    }

    /// Locate the page corners in `planes`, mapped into original-photo pixels.
    ///
    /// A single plane must show four peaks; four planes (one per corner)
    /// contribute their strongest peak each.
    #[instrument(skip_all, fields(planes = planes.len()))]
    pub fn locate_corners(&self, planes: &[Heatmap], letterbox: &Letterbox) -> Result<Detection> {
        let peaks: Vec<Peak> = match planes.len() {
            1 => {
                let mut peaks = self.find_peaks(&planes[0]);
                peaks.truncate(4);
                peaks
            }
            4 => planes
                .iter()
                .filter_map(|plane| self.find_peaks(plane).into_iter().next())
                .collect(),
            n => {
                return Err(DocflatError::NativeBridge(format!(
                    "expected 1 or 4 heatmap channels, got {n}"
                )));
            }
        };

        if peaks.len() < 4 {
            warn!(found = peaks.len(), "Too few confident corner peaks");
            return Err(DocflatError::LowConfidenceDetection { found: peaks.len() });
        }

        let grid = (planes[0].width(), planes[0].height());
        let original = letterbox.original;
        let mut corners = [Point::default(); 4];
        for (corner, peak) in corners.iter_mut().zip(&peaks) {
            let model = heatmap_to_model(peak.position, grid, letterbox.target);
            *corner = clamp_to_frame(letterbox.to_original(model), original);
        }

        let polygon = Polygon::canonical(corners)?;
        let min_area = self.min_area_ratio * original.area();
        if polygon.area() < min_area {
            warn!(
                area = polygon.area(),
                min_area, "Detected page is too small"
            );
            return Err(DocflatError::DegeneratePolygon(format!(
                "page covers {:.2}% of the photo",
                100.0 * polygon.area() / original.area().max(1.0)
            )));
        }

        let confidence = peaks.iter().map(|p| p.confidence).sum::<f32>() / 4.0;
        debug!(
            confidence,
            area = polygon.area(),
            corners = ?polygon.points(),
            "Page corners located"
        );
        Ok(Detection {
            polygon,
            confidence,
        })
    }
}

/// Map heatmap-grid coordinates into model-input pixels.
pub fn heatmap_to_model(p: Point, grid: (usize, usize), model: Size) -> Point {
    let sx = model.width as f64 / grid.0.max(1) as f64;
    let sy = model.height as f64 / grid.1.max(1) as f64;
    Point::new((p.x + 0.5) * sx - 0.5, (p.y + 0.5) * sy - 0.5)
}

/// Keep a corner on the photo's pixel centres.
fn clamp_to_frame(p: Point, size: Size) -> Point {
    let max_x = size.width.saturating_sub(1) as f64;
    let max_y = size.height.saturating_sub(1) as f64;
    Point::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Heatmap with a symmetric 3x3 blob centred on each `(x, y, peak)`.
    fn blobs(w: usize, h: usize, centres: &[(usize, usize, f32)]) -> Heatmap {
        let mut data = vec![0.0; w * h];
        for &(cx, cy, peak) in centres {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let x = (cx as i64 + dx) as usize;
                    let y = (cy as i64 + dy) as usize;
                    data[y * w + x] = if dx == 0 && dy == 0 { peak } else { peak * 0.8 };
                }
            }
        }
        Heatmap::new(w, h, data).unwrap()
    }

    fn post() -> Postprocessor {
        Postprocessor::new(0.3, 0.02)
    }

    #[test]
    fn peaks_are_weighted_centroids_sorted_by_confidence() {
        let hm = blobs(32, 32, &[(5, 6, 0.5), (20, 25, 0.9)]);
        let peaks = post().find_peaks(&hm);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].confidence, 0.9);
        assert!((peaks[0].position.x - 20.0).abs() < 1e-9);
        assert!((peaks[0].position.y - 25.0).abs() < 1e-9);
        assert_eq!(peaks[1].area, 9);
    }

    #[test]
    fn weak_regions_are_ignored() {
        let hm = blobs(32, 32, &[(5, 5, 0.2), (20, 20, 0.9)]);
        assert_eq!(post().find_peaks(&hm).len(), 1);
    }

    #[test]
    fn single_plane_with_four_peaks_maps_back_to_photo() {
        // 200x150 photo, 256 model input, heatmap at model resolution.
        let original = Size::new(200, 150);
        let lb = Letterbox::fit(original, Size::new(256, 256));
        let expected = [
            Point::new(20.0, 15.0),
            Point::new(180.0, 20.0),
            Point::new(170.0, 130.0),
            Point::new(30.0, 120.0),
        ];
        let centres: Vec<(usize, usize, f32)> = expected
            .iter()
            .map(|p| {
                let m = lb.to_model(*p);
                (m.x.round() as usize, m.y.round() as usize, 0.9)
            })
            .collect();
        let hm = blobs(256, 256, &centres);

        let detection = post().locate_corners(&[hm], &lb).unwrap();
        for (found, want) in detection.polygon.points().iter().zip(&expected) {
            assert!(found.distance(want) < 1.0, "{found:?} vs {want:?}");
        }
        assert!((detection.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn coarse_heatmap_grid_is_upscaled_to_model_space() {
        let lb = Letterbox::fit(Size::new(256, 256), Size::new(256, 256));
        // 64x64 grid: heatmap pixel 10 centres on model pixel 41.5.
        let hm = blobs(64, 64, &[(10, 10, 0.9), (50, 10, 0.9), (50, 50, 0.9), (10, 50, 0.9)]);
        let detection = post().locate_corners(&[hm], &lb).unwrap();
        let tl = detection.polygon.points()[0];
        assert!((tl.x - 41.5).abs() < 1e-6 && (tl.y - 41.5).abs() < 1e-6);
    }

    #[test]
    fn one_plane_per_corner_takes_best_peak_of_each() {
        let lb = Letterbox::fit(Size::new(64, 64), Size::new(64, 64));
        let planes = vec![
            blobs(64, 64, &[(8, 8, 0.9), (40, 40, 0.4)]),
            blobs(64, 64, &[(56, 8, 0.8)]),
            blobs(64, 64, &[(56, 56, 0.7)]),
            blobs(64, 64, &[(8, 56, 0.6)]),
        ];
        let detection = post().locate_corners(&planes, &lb).unwrap();
        let pts = detection.polygon.points();
        assert!(pts[0].distance(&Point::new(8.0, 8.0)) < 1e-6);
        assert!(pts[2].distance(&Point::new(56.0, 56.0)) < 1e-6);
        assert!((detection.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn uniform_heatmap_is_low_confidence() {
        let lb = Letterbox::fit(Size::new(64, 64), Size::new(64, 64));
        let flat = Heatmap::new(64, 64, vec![0.5; 64 * 64]).unwrap();
        let err = post().locate_corners(&[flat], &lb).unwrap_err();
        assert!(matches!(err, DocflatError::LowConfidenceDetection { found: 1 }));

        let empty = Heatmap::new(64, 64, vec![0.0; 64 * 64]).unwrap();
        let err = post().locate_corners(&[empty], &lb).unwrap_err();
        assert!(matches!(err, DocflatError::LowConfidenceDetection { found: 0 }));
    }

    #[test]
    fn missing_corner_plane_is_low_confidence() {
        let lb = Letterbox::fit(Size::new(64, 64), Size::new(64, 64));
        let planes = vec![
            blobs(64, 64, &[(8, 8, 0.9)]),
            blobs(64, 64, &[(56, 8, 0.9)]),
            blobs(64, 64, &[(56, 56, 0.9)]),
            Heatmap::new(64, 64, vec![0.1; 64 * 64]).unwrap(),
        ];
        let err = post().locate_corners(&planes, &lb).unwrap_err();
        assert!(matches!(err, DocflatError::LowConfidenceDetection { found: 3 }));
    }

    #[test]
    fn tiny_page_is_degenerate() {
        let lb = Letterbox::fit(Size::new(256, 256), Size::new(256, 256));
        let hm = blobs(256, 256, &[(100, 100, 0.9), (110, 100, 0.9), (110, 110, 0.9), (100, 110, 0.9)]);
        let err = post().locate_corners(&[hm], &lb).unwrap_err();
        assert!(matches!(err, DocflatError::DegeneratePolygon(_)));
    }

    #[test]
    fn identical_corner_planes_are_degenerate() {
        let lb = Letterbox::fit(Size::new(64, 64), Size::new(64, 64));
        let plane = Heatmap::new(64, 64, vec![0.5; 64 * 64]).unwrap();
        let planes = vec![plane.clone(), plane.clone(), plane.clone(), plane];
        let err = post().locate_corners(&planes, &lb).unwrap_err();
        assert!(matches!(err, DocflatError::DegeneratePolygon(_)));
    }

    #[test]
    fn unexpected_channel_count_is_a_bridge_error() {
        let lb = Letterbox::fit(Size::new(64, 64), Size::new(64, 64));
        let plane = Heatmap::new(4, 4, vec![0.0; 16]).unwrap();
        let err = post()
            .locate_corners(&[plane.clone(), plane.clone(), plane], &lb)
            .unwrap_err();
        assert!(matches!(err, DocflatError::NativeBridge(_)));
    }
}
