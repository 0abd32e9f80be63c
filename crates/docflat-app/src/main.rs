// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docflat — flatten document photos from the command line.
//
// Entry point. Initialises logging, loads config, picks an inference gateway,
// submits every photo to one session and prints a JSON line per photo.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use docflat_bridge::{InferenceGateway, RecordedGateway, local_gateway};
use docflat_core::human_errors::humanize_error;
use docflat_core::{DocflatConfig, DocflatError};
use docflat_session::SessionManager;
use tracing_subscriber::EnvFilter;

use services::data_dir;
use services::report::PhotoReport;

/// Flatten photos of paper documents into upright, cropped page images.
#[derive(Parser, Debug)]
#[command(name = "docflat", version)]
struct Cli {
    /// Photos to rectify (paths or file:// URIs).
    #[arg(required = true)]
    photos: Vec<String>,

    /// JSON config file. Defaults to config.json in the data directory, if present.
    #[arg(long, env = "DOCFLAT_CONFIG")]
    config: Option<PathBuf>,

    /// Where rectified images are written (overrides the config file).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Recorded model output to use instead of a live model (base64 f32 buffer).
    #[arg(long, requires = "heatmap_shape", conflicts_with = "model")]
    heatmap: Option<PathBuf>,

    /// Shape of the recorded heatmap, as WIDTHxHEIGHTxCHANNELS.
    #[arg(long, requires = "heatmap")]
    heatmap_shape: Option<HeatmapShape>,

    /// Corner-detection model file (needs the `rten` feature).
    #[arg(long, env = "DOCFLAT_MODEL")]
    model: Option<PathBuf>,
}

/// `WxHxC`, e.g. `128x128x4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeatmapShape {
    width: usize,
    height: usize,
    channels: usize,
}

impl FromStr for HeatmapShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dims: Vec<usize> = s
            .split(['x', 'X'])
            .map(|part| part.trim().parse::<usize>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid heatmap shape '{s}': {e}"))?;
        match dims[..] {
            [width, height, channels] if width > 0 && height > 0 && channels > 0 => Ok(Self {
                width,
                height,
                channels,
            }),
            _ => Err(format!(
                "invalid heatmap shape '{s}': expected three positive sizes like 128x128x4"
            )),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Docflat starting");

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, "docflat failed");
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::from(2)
        }
    }
}

/// Process every photo. Returns whether all of them produced a usable image.
async fn run(cli: Cli) -> Result<bool, DocflatError> {
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    let gateway: Arc<dyn InferenceGateway> = match (cli.heatmap, cli.heatmap_shape) {
        (Some(path), Some(shape)) => Arc::new(
            RecordedGateway::load(&path, shape.width, shape.height, shape.channels).await?,
        ),
        _ => local_gateway(cli.model.as_deref())?,
    };

    let manager = SessionManager::new(config, gateway)?;
    if !manager.is_model_ready() {
        tracing::warn!("No model available; photos will be returned unflattened");
    }

    let handles: Vec<_> = cli
        .photos
        .iter()
        .map(|uri| (uri, manager.submit_photo(uri)))
        .collect();

    let mut all_usable = true;
    for (uri, handle) in handles {
        let state = handle.wait().await;
        let report = PhotoReport::from_handle(
            uri,
            &handle,
            state,
            manager.get_result(handle.photo_id()),
        );
        all_usable &= report.usable();
        println!("{}", report.to_json_line()?);
    }
    Ok(all_usable)
}

fn load_config(path: Option<&PathBuf>) -> Result<DocflatConfig, DocflatError> {
    if let Some(path) = path {
        return DocflatConfig::load(path);
    }
    let default_path = data_dir::config_path();
    if default_path.is_file() {
        tracing::debug!(path = %default_path.display(), "Using default config file");
        return DocflatConfig::load(default_path);
    }
    Ok(DocflatConfig {
        output_dir: data_dir::output_dir(),
        ..DocflatConfig::default()
    })
}
