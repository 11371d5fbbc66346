use crate::error::PipelineError;
use std::path::{Path, PathBuf};

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

/// JPEG files directly inside `dir`, sorted by path.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(dir, e))?.path();
        if path.is_file() && is_jpeg(&path) {
            images.push(path);
        }
    }
    if images.is_empty() {
        return Err(PipelineError::NoInputImagesFound(dir.to_path_buf()));
    }
    images.sort();
    Ok(images)
}
