//! Run states and the status reported to the invoker.

use std::{fmt, io};

use ods_core::{AlignError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CrsError, SourceError};

/// Stage of a download run.
///
/// Runs move forward only: `Idle`, `Preparing`, `Fetching`, `Processing`,
/// then one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started.
    Idle,
    /// Resolving the source and building the query.
    Preparing,
    /// Draining candidate features.
    Fetching,
    /// Mapping features and inserting entities.
    Processing,
    /// Finished normally.
    Succeeded,
    /// Stopped on request or by the feature ceiling.
    Cancelled,
    /// Stopped by an error.
    Failed,
}

impl PipelineState {
    /// Whether the state ends a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors that end a download run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The feature source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// A geometry could not be transformed.
    #[error(transparent)]
    Crs(#[from] CrsError),
    /// The target store rejected an entity.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Aligning an inserted entity failed.
    #[error(transparent)]
    Align(#[from] AlignError),
    /// The worker thread could not be started.
    #[error("failed to start the {feature_type} download thread: {source}")]
    Spawn {
        /// Feature type of the run.
        feature_type: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The worker thread panicked.
    #[error("the {feature_type} download panicked")]
    Panicked {
        /// Feature type of the run.
        feature_type: String,
    },
}

/// Outcome of one download run.
#[derive(Debug)]
pub struct Status {
    pub(crate) state: PipelineState,
    pub(crate) cancelled: bool,
    pub(crate) message: Option<String>,
    pub(crate) exception: Option<PipelineError>,
    pub(crate) feature_count: usize,
    pub(crate) entity_count: usize,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            cancelled: false,
            message: None,
            exception: None,
            feature_count: 0,
            entity_count: 0,
        }
    }
}

impl Status {
    pub(crate) fn failed(error: PipelineError) -> Self {
        Self {
            state: PipelineState::Failed,
            exception: Some(error),
            ..Self::default()
        }
    }

    /// State the run ended in.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Whether the run ended in [`PipelineState::Succeeded`].
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Succeeded
    }

    /// Whether the run was cancelled, on request or by the feature ceiling.
    #[must_use]
    pub const fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Advisory message for the user.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Error that failed the run.
    #[must_use]
    pub const fn exception(&self) -> Option<&PipelineError> {
        self.exception.as_ref()
    }

    /// Take the error that failed the run.
    #[must_use]
    pub fn into_exception(self) -> Option<PipelineError> {
        self.exception
    }

    /// Distinct features accepted during fetch, counted before grouping.
    #[must_use]
    pub const fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Entities inserted into the target store.
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.entity_count
    }
}
