// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocflatError, Result};

/// Settings shared by the vision stages and the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocflatConfig {
    /// Square input resolution of the detection model (default 256).
    pub model_input_size: u32,
    /// Value written into letterbox padding, after normalisation.
    pub pad_value: f32,
    /// Heatmap confidence a pixel needs to belong to a corner peak.
    pub peak_threshold: f32,
    /// Smallest accepted page area, as a fraction of the photo area.
    pub min_area_ratio: f64,
    /// Upper bound on pipelines running at the same time.
    pub max_concurrent_runs: usize,
    /// Where rectified images are written.
    pub output_dir: PathBuf,
    /// RGBA colour for output pixels that map outside the source photo.
    pub fill_rgba: [u8; 4],
}

impl Default for DocflatConfig {
    fn default() -> Self {
        Self {
            model_input_size: 256,
            pad_value: 0.0,
            peak_threshold: 0.3,
            min_area_ratio: 0.02,
            max_concurrent_runs: 2,
            output_dir: std::env::temp_dir().join("docflat"),
            fill_rgba: [255, 255, 255, 255],
        }
    }
}

impl DocflatConfig {
    /// Read a JSON config file. Missing keys take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.model_input_size == 0 {
            return Err(DocflatError::Config("model_input_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.peak_threshold) {
            return Err(DocflatError::Config(format!(
                "peak_threshold {} is outside [0, 1]",
                self.peak_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.min_area_ratio) {
            return Err(DocflatError::Config(format!(
                "min_area_ratio {} is outside [0, 1)",
                self.min_area_ratio
            )));
        }
        if self.max_concurrent_runs == 0 {
            return Err(DocflatError::Config("max_concurrent_runs must be at least 1".into()));
        }
        Ok(())
    }
}
