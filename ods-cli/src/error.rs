//! Error types emitted by the CLI.
//!
//! Large payloads are boxed; the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use ods_core::{AlignError, MatchError};
use ods_data::PipelineError;
use thiserror::Error;

/// Errors emitted by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without dashes.
        field: &'static str,
        /// Environment variable consulted.
        env: &'static str,
    },
    /// The boundary option could not be parsed.
    #[error("invalid boundary {value:?}: {reason}")]
    InvalidBoundary {
        /// Rejected value.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// The alignment tolerance was rejected.
    #[error(transparent)]
    InvalidTolerance(#[from] AlignError),
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Missing path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A download ended in failure.
    #[error("{feature_type} download failed: {source}")]
    Download {
        /// Feature type of the failed download.
        feature_type: String,
        /// Error reported by the pipeline.
        #[source]
        source: Box<PipelineError>,
    },
    /// A download was cancelled, usually by the feature ceiling.
    #[error("{feature_type} download was cancelled: {message}")]
    DownloadCancelled {
        /// Feature type of the cancelled download.
        feature_type: String,
        /// Advisory message of the run.
        message: String,
    },
    /// Matching the downloaded stores failed.
    #[error("matching failed: {0}")]
    Match(#[from] MatchError),
    /// Serialising the report failed.
    #[error("failed to serialise reconcile report: {0}")]
    SerialiseReport(#[source] serde_json::Error),
    /// Writing the report failed.
    #[error("failed to write reconcile report: {0}")]
    WriteReport(#[source] std::io::Error),
}
