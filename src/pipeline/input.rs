//! Input resolution: list the screenshots of a folder in processing order.
//!
//! Only regular files whose extension is `png`, `jpg` or `jpeg` (any case)
//! are picked up. The list is sorted by filename so the order of
//! `output.json` never depends on the file system's directory order.

use crate::error::ShotOcrError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions accepted by the extraction stage, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A screenshot found in the input folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// File name only; used as the key in the result map.
    pub filename: String,
    pub path: PathBuf,
}

/// Check if the path has one of [`IMAGE_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// List the images of `dir` in lexicographic filename order.
///
/// # Errors
/// - [`ShotOcrError::InputDirNotFound`] / [`ShotOcrError::NotADirectory`]
/// - [`ShotOcrError::ImageReadFailed`] when the listing itself fails
///
/// A folder without matching files yields an empty list.
pub async fn list_images(dir: &Path) -> Result<Vec<ImageFile>, ShotOcrError> {
    let meta = tokio::fs::metadata(dir)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShotOcrError::InputDirNotFound {
                path: dir.to_path_buf(),
            },
            _ => ShotOcrError::ImageReadFailed {
                path: dir.to_path_buf(),
                source: e,
            },
        })?;
    if !meta.is_dir() {
        return Err(ShotOcrError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let read_err = |e| ShotOcrError::ImageReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut images = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        if !is_supported_image(&path) {
            continue;
        }
        let file_type = entry.file_type().await.map_err(read_err)?;
        if !file_type.is_file() && !(file_type.is_symlink() && path.is_file()) {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        images.push(ImageFile { filename, path });
    }

    if images.is_empty() {
        warn!(
            "No .png, .jpg or .jpeg files in {}; nothing to process",
            dir.display()
        );
    }

    images.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!("Found {} images in {}", images.len(), dir.display());
    Ok(images)
}
