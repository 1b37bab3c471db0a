//! `amenity`: detect, store and query property amenities.
//!
//! ```text
//! amenity [--config app.json] [--output-dir out] [--schema vocab.json]
//!         [--flat-policy append|replace-by-path] <COMMAND>
//!
//!   process --detections rec.json <image-or-dir>
//!   ingest <results.json>
//!   summary [--json]
//!   export
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use amenity_store::FlatRowPolicy;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::error::CliError;

/// Amenity detection result store.
#[derive(Debug, Parser)]
#[command(name = "amenity")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the flat file and the database.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Room/amenity vocabulary JSON file.
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Placement of re-processed images in the flat file.
    #[arg(long, global = true, value_name = "append|replace-by-path")]
    flat_policy: Option<FlatRowPolicy>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect amenities in an image, or every image in a directory.
    Process {
        /// Recorded model outputs keyed by image file name.
        #[arg(long)]
        detections: PathBuf,
        /// Image file or directory.
        target: PathBuf,
    },
    /// Save detection records from a JSON array.
    Ingest {
        /// Input file.
        input: PathBuf,
    },
    /// Print per-image amenity counts.
    Summary {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the wide results table.
    Export,
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig, CliError> {
        let file = AppConfig::load(self.config.as_deref())?;
        let schema_file = file
            .schema_file
            .clone()
            .map(|p| commands::relative_to(self.config.as_deref(), p));
        Ok(AppConfig {
            schema_file,
            ..file
        }
        .with_overrides(
            self.output_dir.clone(),
            self.schema.clone(),
            self.flat_policy,
        ))
    }

    fn run(self) -> Result<(), CliError> {
        let config = self.app_config()?;
        let mut stdout = std::io::stdout().lock();
        match self.command {
            Commands::Process { detections, target } => {
                commands::process(&config, &detections, &target, &mut stdout)
            }
            Commands::Ingest { input } => commands::ingest(&config, &input).map(|_| ()),
            Commands::Summary { json } => commands::summary(&config, json, &mut stdout),
            Commands::Export => commands::export(&config, &mut stdout),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "amenity",
            "summary",
            "--json",
            "--output-dir",
            "out",
            "--flat-policy",
            "replace-by-path",
        ]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.flat_policy, Some(FlatRowPolicy::ReplaceByPath));
        assert!(matches!(cli.command, Commands::Summary { json: true }));
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::parse_from(["amenity", "process", "--detections", "rec.json", "imgs"]);
        let Commands::Process { detections, target } = cli.command else {
            panic!("expected process");
        };
        assert_eq!(detections, PathBuf::from("rec.json"));
        assert_eq!(target, PathBuf::from("imgs"));
    }

    #[test]
    fn test_bad_policy_rejected() {
        assert!(Cli::try_parse_from(["amenity", "--flat-policy", "nope", "export"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.json");
        std::fs::write(
            &file,
            r#"{ "store": { "output_dir": "from-file" }, "schema_file": "vocab.json" }"#,
        )
        .unwrap();
        let file_arg = file.to_string_lossy().to_string();
        let cli = Cli::parse_from([
            "amenity",
            "--config",
            file_arg.as_str(),
            "--output-dir",
            "cli",
            "export",
        ]);
        let config = cli.app_config().unwrap();
        assert_eq!(config.store.output_dir, PathBuf::from("cli"));
        assert_eq!(config.schema_file, Some(dir.path().join("vocab.json")));
    }
}
