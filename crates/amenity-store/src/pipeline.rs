//! Image → detector → store pipeline.

use std::path::{Path, PathBuf};

use crate::detection::{Detection, Detector};
use crate::error::PipelineError;
use crate::query::ImageSummary;
use crate::store::AmenityStore;

/// File extensions picked up by [`AmenityPipeline::process_directory`].
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Runs images through a [`Detector`] and persists the results.
#[derive(Debug)]
pub struct AmenityPipeline<D> {
    detector: D,
    store: AmenityStore,
}

impl<D: Detector> AmenityPipeline<D> {
    /// Creates a pipeline over an initialized store.
    pub fn new(detector: D, store: AmenityStore) -> Self {
        Self { detector, store }
    }

    /// The underlying store.
    pub fn store(&self) -> &AmenityStore {
        &self.store
    }

    /// Detects amenities in one image and saves the result.
    pub fn process_image(&self, image_path: &Path) -> Result<Detection, PipelineError> {
        tracing::info!(image_path = %image_path.display(), "Processing image");
        let detection = self.detector.detect(image_path)?;
        let path = image_path.to_string_lossy();
        self.store.save(
            &path,
            &detection.amenities,
            &detection.description,
            &detection.flat_amenities,
        )?;
        Ok(detection)
    }

    /// Processes every supported image directly inside `dir`.
    ///
    /// A failing image is logged and skipped. Returns the store summary,
    /// or an empty list when the directory holds no images.
    pub fn process_directory(&self, dir: &Path) -> Result<Vec<ImageSummary>, PipelineError> {
        tracing::info!(dir = %dir.display(), "Processing all images in directory");
        let images = image_files(dir)?;
        if images.is_empty() {
            tracing::warn!(dir = %dir.display(), "No images found");
            return Ok(Vec::new());
        }
        tracing::info!(count = images.len(), "Found images to process");

        let mut failed = 0usize;
        for path in &images {
            match self.process_image(path) {
                Ok(detection) => tracing::info!(
                    image_path = %path.display(),
                    description = %detection.description,
                    "Processed image"
                ),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(image_path = %path.display(), error = %e, "Error processing image");
                }
            }
        }
        if failed > 0 {
            tracing::warn!(failed, total = images.len(), "Some images failed");
        }

        Ok(self.store.summary())
    }
}

/// Supported image files directly inside `dir`, sorted by path.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let list_err = |source: std::io::Error| PipelineError::ListDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() && is_supported(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}
