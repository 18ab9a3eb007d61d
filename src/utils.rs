use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;

/// Read and parse a JSON file, streaming from a buffered reader instead of
/// loading the whole file into memory first.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    Ok(value)
}

/// Progress bar counting images through a corpus-wide stage, labelled with
/// the stage name.
pub fn create_progress_bar(num_images: u64, stage: &str) -> ProgressBar {
    let pb = ProgressBar::new(num_images);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:>8} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images {msg}")
            .progress_chars("#>-"),
    );
    pb.set_prefix(stage.to_string());
    pb
}

/// Create the output directory if needed. Existing arrays in it are overwritten.
pub fn create_output_directory(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Existing arrays will be overwritten.",
            path
        );
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}
