// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

/// Return the application data directory, creating it if needed.
///
/// On desktop this uses a conventional location. On mobile the platform
/// runtime should pass `--config` and `--output-dir` explicitly instead.
pub fn data_dir() -> PathBuf {
    data_dir_in(&dirs_fallback())
}

/// Default location of the JSON config file (may not exist).
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Default directory for rectified images.
pub fn output_dir() -> PathBuf {
    let dir = data_dir().join("rectified");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn data_dir_in(base: &Path) -> PathBuf {
    let dir = base.join("docflat");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_created_under_base() {
        let base = tempfile::tempdir().unwrap();
        let dir = data_dir_in(base.path());
        assert_eq!(dir, base.path().join("docflat"));
        assert!(dir.is_dir());
    }
}
