//! Subcommand implementations.

use std::io::Write;
use std::path::{Path, PathBuf};

use amenity_store::{
    flatten, AmenitiesByRoom, AmenityPipeline, AmenitySchema, AmenityStore, Detection,
    ImageSummary, RecordedDetector,
};
use arrow::util::pretty::pretty_format_batches;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::CliError;

/// One record of an `ingest` input file.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRecord {
    /// Image identity.
    pub image_path: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Room → amenity → presence.
    #[serde(default)]
    pub amenities: AmenitiesByRoom,
}

/// Opens the store described by `config`.
pub fn open_store(config: &AppConfig) -> Result<AmenityStore, CliError> {
    let schema = AmenitySchema::load(config.schema_file.as_deref());
    Ok(AmenityStore::initialize(config.store.clone(), schema)?)
}

/// `process`: run an image or a directory through recorded detections.
pub fn process(
    config: &AppConfig,
    detections: &Path,
    target: &Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let store = open_store(config)?;
    let detector = RecordedDetector::from_json_file(store.schema().clone(), detections)?;
    tracing::info!(recorded = detector.len(), "Loaded recorded detections");
    let pipeline = AmenityPipeline::new(detector, store);

    if target.is_dir() {
        let summary = pipeline.process_directory(target)?;
        write_summary(out, &summary)?;
    } else {
        let detection = pipeline.process_image(target)?;
        write_detection(out, &detection)?;
    }
    Ok(())
}

/// `ingest`: save externally produced records.
///
/// Returns the number of records saved. A record that fails to save is
/// logged and the rest are still attempted; any failure makes the command
/// fail with [`CliError::IngestIncomplete`].
pub fn ingest(config: &AppConfig, input: &Path) -> Result<usize, CliError> {
    let data = std::fs::read(input).map_err(|source| CliError::ReadFile {
        path: input.to_path_buf(),
        source,
    })?;
    let records: Vec<IngestRecord> =
        serde_json::from_slice(&data).map_err(|source| CliError::ParseFile {
            path: input.to_path_buf(),
            source,
        })?;

    let store = open_store(config)?;
    let mut saved = 0;
    for record in &records {
        let flat = flatten(&record.amenities);
        match store.save(&record.image_path, &record.amenities, &record.description, &flat) {
            Ok(()) => saved += 1,
            Err(e) => tracing::warn!(
                image_path = %record.image_path,
                error = %e,
                "Failed to save record"
            ),
        }
    }
    tracing::info!(saved, total = records.len(), "Ingest finished");
    if saved < records.len() {
        return Err(CliError::IngestIncomplete {
            failed: records.len() - saved,
            total: records.len(),
        });
    }
    Ok(saved)
}

/// `summary`: per-image amenity counts.
pub fn summary(config: &AppConfig, json: bool, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(config)?;
    let rows = store.summary();
    if json {
        serde_json::to_writer_pretty(&mut *out, &rows)?;
        writeln!(out).map_err(io_output)?;
    } else {
        write_summary(out, &rows)?;
    }
    Ok(())
}

/// `export`: the wide results table.
pub fn export(config: &AppConfig, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(config)?;
    let batch = store.all_results();
    let table = pretty_format_batches(&[batch])?;
    writeln!(out, "{table}").map_err(io_output)
}

fn write_detection(out: &mut impl Write, detection: &Detection) -> Result<(), CliError> {
    writeln!(out, "Detected Amenities:").map_err(io_output)?;
    for (room, present) in detection.present_by_room() {
        writeln!(out, "{}: {}", capitalize(room), present.join(", ")).map_err(io_output)?;
    }
    writeln!(out, "\nGenerated Description:").map_err(io_output)?;
    writeln!(out, "{}", detection.description).map_err(io_output)
}

fn write_summary(out: &mut impl Write, rows: &[ImageSummary]) -> Result<(), CliError> {
    if rows.is_empty() {
        return writeln!(out, "No results.").map_err(io_output);
    }
    writeln!(out, "Processed {} images.", rows.len()).map_err(io_output)?;
    for row in rows {
        writeln!(out, "{:>4}  {}", row.amenity_count, row.image_path).map_err(io_output)?;
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn io_output(e: std::io::Error) -> CliError {
    CliError::Output(e.to_string())
}

/// Resolves `path` relative to the config file's directory when relative.
#[must_use]
pub fn relative_to(base: Option<&Path>, path: PathBuf) -> PathBuf {
    match base.and_then(Path::parent) {
        Some(dir) if path.is_relative() && !dir.as_os_str().is_empty() => dir.join(path),
        _ => path,
    }
}
