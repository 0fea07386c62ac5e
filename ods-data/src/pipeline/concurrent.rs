//! Concurrent runs, one worker thread per data source.

use std::thread;

use geo::Polygon;
use log::error;
use ods_core::{BuildingAligner, EntityStore};

use super::{DownloadPipeline, PipelineError, Status};

/// One pipeline run together with the store it exclusively writes to.
#[derive(Debug)]
pub struct DownloadJob<'a> {
    /// Pipeline to run.
    pub pipeline: &'a mut DownloadPipeline,
    /// Target store, written only by this job.
    pub store: &'a mut EntityStore,
    /// Aligner invoked after every insert.
    pub aligner: Option<BuildingAligner>,
}

/// Run every job on its own named thread and wait for all of them.
///
/// Statuses are returned in job order. A run whose thread panics or cannot
/// be started yields a [`Failed`](super::PipelineState::Failed) status; the
/// other runs are unaffected.
pub fn run_concurrently(boundary: &Polygon<f64>, jobs: Vec<DownloadJob<'_>>) -> Vec<Status> {
    thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let feature_type = job.pipeline.data_source().feature_type.clone();
                let spawned = thread::Builder::new()
                    .name(format!("{feature_type} download"))
                    .spawn_scoped(scope, move || {
                        let DownloadJob {
                            pipeline,
                            store,
                            aligner,
                        } = job;
                        pipeline.run(boundary, store, aligner.as_ref())
                    });
                (feature_type, spawned)
            })
            .collect();

        handles
            .into_iter()
            .map(|(feature_type, spawned)| match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    error!("{feature_type} download panicked");
                    Status::failed(PipelineError::Panicked { feature_type })
                }),
                Err(source) => {
                    error!("failed to start the {feature_type} download: {source}");
                    Status::failed(PipelineError::Spawn {
                        feature_type,
                        source,
                    })
                }
            })
            .collect()
    })
}
