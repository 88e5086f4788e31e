//! Logging setup
//!
//! `RUST_LOG` wins over the configured level. While the terminal UI is up,
//! records go to a file so they do not draw over the screen.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn init(level: &str, target: LogTarget) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let LogTarget::File(path) = &target {
        let file = open_log_file(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("logger already initialised")?;
    if let LogTarget::File(path) = &target {
        log::info!("Logging to {}", path.display());
    }
    Ok(())
}

/// `<data_local_dir>/eduassist/eduassist.log`, falling back to the temp directory
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("eduassist")
        .join("eduassist.log")
}

pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
