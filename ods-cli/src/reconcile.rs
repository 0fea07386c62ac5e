//! Reconcile command implementation.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geo::{Coord, Polygon, Rect};
use log::info;
use ods_core::{AttributeValue, BuildingAligner, EntityKey, EntityStore, MatchOutcome, Matcher};
use ods_data::{
    BuildingMapper, DataSource, DownloadJob, DownloadPipeline, EntityMapper, Host,
    JsonFeatureSource, PipelineState, Status, run_concurrently,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BOUNDARY, ARG_CURRENT, ARG_CURRENT_REFERENCE, ARG_CURRENT_TYPE, ARG_MAX_FEATURES,
    ARG_OPEN_DATA, ARG_OPEN_DATA_REFERENCE, ARG_OPEN_DATA_TYPE, ARG_TOLERANCE, CliError,
    ENV_BOUNDARY, ENV_CURRENT, ENV_OPEN_DATA,
};

pub(crate) const DEFAULT_TOLERANCE: f64 = 0.1;
pub(crate) const DEFAULT_OPEN_DATA_TYPE: &str = "bag:pand";
pub(crate) const DEFAULT_CURRENT_TYPE: &str = "osm:building";
pub(crate) const DEFAULT_OPEN_DATA_REFERENCE: &str = "identificatie";
pub(crate) const DEFAULT_CURRENT_REFERENCE: &str = "ref:bag";

/// CLI arguments for the `reconcile` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load an open-data feature file and a current-map feature \
                 file for the same area, align the open-data building \
                 outlines, match both sides by reference id and print a JSON \
                 report. Paths can come from CLI flags, configuration files, \
                 or environment variables.",
    about = "Reconcile open-data buildings with current-map buildings"
)]
#[ortho_config(prefix = "ODS")]
pub(crate) struct ReconcileArgs {
    /// Path to the open-data feature document (JSON).
    #[arg(long = ARG_OPEN_DATA, value_name = "path")]
    #[serde(default)]
    pub(crate) open_data: Option<Utf8PathBuf>,
    /// Path to the current-map feature document (JSON).
    #[arg(long = ARG_CURRENT, value_name = "path")]
    #[serde(default)]
    pub(crate) current: Option<Utf8PathBuf>,
    /// Download boundary as `min_x,min_y,max_x,max_y` in project coordinates.
    #[arg(long = ARG_BOUNDARY, value_name = "bbox")]
    #[serde(default)]
    pub(crate) boundary: Option<String>,
    /// Alignment tolerance in project units (default 0.1).
    #[arg(long = ARG_TOLERANCE, value_name = "distance")]
    #[serde(default)]
    pub(crate) tolerance: Option<f64>,
    /// Feature ceiling per download; reaching it cancels the download.
    #[arg(long = ARG_MAX_FEATURES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_features: Option<usize>,
    /// Feature type held by the open-data document (default `bag:pand`).
    #[arg(long = ARG_OPEN_DATA_TYPE, value_name = "name")]
    #[serde(default)]
    pub(crate) open_data_type: Option<String>,
    /// Feature type held by the current-map document (default `osm:building`).
    #[arg(long = ARG_CURRENT_TYPE, value_name = "name")]
    #[serde(default)]
    pub(crate) current_type: Option<String>,
    /// Open-data property holding the reference id (default `identificatie`).
    #[arg(long = ARG_OPEN_DATA_REFERENCE, value_name = "property")]
    #[serde(default)]
    pub(crate) open_data_reference: Option<String>,
    /// Current-map property holding the reference id (default `ref:bag`).
    #[arg(long = ARG_CURRENT_REFERENCE, value_name = "property")]
    #[serde(default)]
    pub(crate) current_reference: Option<String>,
}

impl ReconcileArgs {
    pub(crate) fn into_config(self) -> Result<ReconcileConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ReconcileConfig::try_from(merged)
    }
}

/// Resolved `reconcile` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReconcileConfig {
    pub(crate) open_data: Utf8PathBuf,
    pub(crate) current: Utf8PathBuf,
    pub(crate) boundary: Polygon<f64>,
    pub(crate) aligner: BuildingAligner,
    pub(crate) max_features: Option<usize>,
    pub(crate) open_data_type: String,
    pub(crate) current_type: String,
    pub(crate) open_data_reference: String,
    pub(crate) current_reference: String,
}

impl ReconcileConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.open_data, ARG_OPEN_DATA)?;
        Self::require_existing(&self.current, ARG_CURRENT)?;
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match crate::fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn data_source(&self, feature_type: &str, path: &Utf8Path, reference: &str) -> DataSource {
        let host = Host {
            name: path.file_name().unwrap_or(path.as_str()).to_owned(),
            url: path.to_string(),
            max_features: self.max_features,
        };
        DataSource::new(feature_type, host).with_mapper(EntityMapper::Building(
            BuildingMapper::with_reference_attribute(reference),
        ))
    }
}

impl TryFrom<ReconcileArgs> for ReconcileConfig {
    type Error = CliError;

    fn try_from(args: ReconcileArgs) -> Result<Self, Self::Error> {
        let open_data = args.open_data.ok_or(CliError::MissingArgument {
            field: ARG_OPEN_DATA,
            env: ENV_OPEN_DATA,
        })?;
        let current = args.current.ok_or(CliError::MissingArgument {
            field: ARG_CURRENT,
            env: ENV_CURRENT,
        })?;
        let boundary_value = args.boundary.ok_or(CliError::MissingArgument {
            field: ARG_BOUNDARY,
            env: ENV_BOUNDARY,
        })?;
        let boundary = parse_boundary(&boundary_value)?;
        let aligner = BuildingAligner::new(args.tolerance.unwrap_or(DEFAULT_TOLERANCE))?;

        Ok(Self {
            open_data,
            current,
            boundary,
            aligner,
            max_features: args.max_features,
            open_data_type: args
                .open_data_type
                .unwrap_or_else(|| DEFAULT_OPEN_DATA_TYPE.to_owned()),
            current_type: args
                .current_type
                .unwrap_or_else(|| DEFAULT_CURRENT_TYPE.to_owned()),
            open_data_reference: args
                .open_data_reference
                .unwrap_or_else(|| DEFAULT_OPEN_DATA_REFERENCE.to_owned()),
            current_reference: args
                .current_reference
                .unwrap_or_else(|| DEFAULT_CURRENT_REFERENCE.to_owned()),
        })
    }
}

/// Parse `min_x,min_y,max_x,max_y` into a boundary polygon.
pub(crate) fn parse_boundary(value: &str) -> Result<Polygon<f64>, CliError> {
    let invalid = |reason| CliError::InvalidBoundary {
        value: value.to_owned(),
        reason,
    };
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("coordinates must be numbers"))?;
    let [min_x, min_y, max_x, max_y] = numbers.as_slice() else {
        return Err(invalid("expected min_x,min_y,max_x,max_y"));
    };
    if !numbers.iter().all(|number| number.is_finite()) {
        return Err(invalid("coordinates must be finite"));
    }
    if min_x >= max_x || min_y >= max_y {
        return Err(invalid("minimum must be below maximum"));
    }
    let rect = Rect::new(
        Coord {
            x: *min_x,
            y: *min_y,
        },
        Coord {
            x: *max_x,
            y: *max_y,
        },
    );
    Ok(rect.to_polygon())
}

/// Summary of one finished download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DownloadSummary {
    pub(crate) feature_type: String,
    pub(crate) state: PipelineState,
    pub(crate) message: Option<String>,
    pub(crate) feature_count: usize,
    pub(crate) entity_count: usize,
}

impl DownloadSummary {
    fn from_status(feature_type: &str, status: Status) -> Result<Self, CliError> {
        let summary = Self {
            feature_type: feature_type.to_owned(),
            state: status.state(),
            message: status.message().map(str::to_owned),
            feature_count: status.feature_count(),
            entity_count: status.entity_count(),
        };
        if status.cancelled() {
            return Err(CliError::DownloadCancelled {
                feature_type: summary.feature_type,
                message: summary
                    .message
                    .unwrap_or_else(|| "cancelled on request".to_owned()),
            });
        }
        if let Some(source) = status.into_exception() {
            return Err(CliError::Download {
                feature_type: summary.feature_type,
                source: Box::new(source),
            });
        }
        Ok(summary)
    }
}

/// One reference id shared by both datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MatchSummary {
    pub(crate) reference_id: i64,
    pub(crate) open_data: Vec<AttributeValue>,
    pub(crate) current: Vec<AttributeValue>,
}

/// JSON document written to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ReconcileReport {
    pub(crate) downloads: Vec<DownloadSummary>,
    pub(crate) matches: Vec<MatchSummary>,
    pub(crate) unmatched_open_data: Vec<AttributeValue>,
    pub(crate) unmatched_current: Vec<AttributeValue>,
    pub(crate) unidentified_current: Vec<AttributeValue>,
}

impl ReconcileReport {
    fn new(
        downloads: Vec<DownloadSummary>,
        outcome: &MatchOutcome,
        open_data: &EntityStore,
        current: &EntityStore,
    ) -> Self {
        Self {
            downloads,
            matches: outcome
                .matches
                .iter()
                .map(|found| MatchSummary {
                    reference_id: found.reference_id,
                    open_data: ids(open_data, &found.open_data),
                    current: ids(current, &found.current),
                })
                .collect(),
            unmatched_open_data: ids(open_data, &outcome.unmatched_open_data),
            unmatched_current: ids(current, &outcome.unmatched_current),
            unidentified_current: ids(current, &outcome.unidentified_current),
        }
    }
}

fn ids(store: &EntityStore, keys: &[EntityKey]) -> Vec<AttributeValue> {
    keys.iter()
        .filter_map(|key| store.get(*key))
        .map(|entity| entity.id().clone())
        .collect()
}

fn building_store(name: &str) -> EntityStore {
    EntityStore::builder(name)
        .with_spatial_index()
        .with_reference_index()
        .build()
}

pub(crate) fn run_reconcile(args: ReconcileArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = resolve_reconcile_config(args)?;
    let report = execute_reconcile(&config)?;
    write_report(writer, &report)
}

fn resolve_reconcile_config(args: ReconcileArgs) -> Result<ReconcileConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

pub(crate) fn execute_reconcile(config: &ReconcileConfig) -> Result<ReconcileReport, CliError> {
    let mut open_data_store = building_store("open data");
    let mut current_store = building_store("current");
    let mut open_data = DownloadPipeline::new(
        config.data_source(
            &config.open_data_type,
            &config.open_data,
            &config.open_data_reference,
        ),
        Box::new(JsonFeatureSource::new(config.open_data.clone())),
    );
    let mut current = DownloadPipeline::new(
        config.data_source(&config.current_type, &config.current, &config.current_reference),
        Box::new(JsonFeatureSource::new(config.current.clone())),
    );

    let statuses = run_concurrently(
        &config.boundary,
        vec![
            DownloadJob {
                pipeline: &mut open_data,
                store: &mut open_data_store,
                aligner: Some(config.aligner),
            },
            DownloadJob {
                pipeline: &mut current,
                store: &mut current_store,
                aligner: None,
            },
        ],
    );
    let downloads = statuses
        .into_iter()
        .zip([&config.open_data_type, &config.current_type])
        .map(|(status, feature_type)| DownloadSummary::from_status(feature_type, status))
        .collect::<Result<Vec<_>, _>>()?;

    let outcome = Matcher::new().run(&mut open_data_store, &mut current_store)?;
    info!(
        "reconciled {} open-data and {} current entities into {} matches",
        open_data_store.len(),
        current_store.len(),
        outcome.matches.len()
    );
    Ok(ReconcileReport::new(
        downloads,
        &outcome,
        &open_data_store,
        &current_store,
    ))
}

fn write_report(writer: &mut dyn Write, report: &ReconcileReport) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(report).map_err(CliError::SerialiseReport)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteReport)?;
    writer.write_all(b"\n").map_err(CliError::WriteReport)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ReconcileConfig, CliError> {
    let merged = ReconcileArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ReconcileConfig::try_from(merged)
}
