//! Focused unit tests covering reconcile configuration validation.

use super::helpers::write_document;
use super::*;
use crate::reconcile::{
    DEFAULT_CURRENT_REFERENCE, DEFAULT_OPEN_DATA_REFERENCE, DEFAULT_TOLERANCE, ReconcileConfig,
    config_from_layers_for_test, parse_boundary,
};
use camino::Utf8PathBuf;
use geo::{BoundingRect, Coord};
use rstest::rstest;
use tempfile::TempDir;

fn complete_args() -> ReconcileArgs {
    ReconcileArgs {
        open_data: Some(Utf8PathBuf::from("bag.json")),
        current: Some(Utf8PathBuf::from("osm.json")),
        boundary: Some("0,0,10,10".to_owned()),
        ..ReconcileArgs::default()
    }
}

#[rstest]
#[case::open_data(ARG_OPEN_DATA, ENV_OPEN_DATA)]
#[case::current(ARG_CURRENT, ENV_CURRENT)]
#[case::boundary(ARG_BOUNDARY, ENV_BOUNDARY)]
fn converting_without_required_fields_errors(
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let mut args = complete_args();
    match field {
        ARG_OPEN_DATA => args.open_data = None,
        ARG_CURRENT => args.current = None,
        _ => args.boundary = None,
    }
    let err = ReconcileConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn converting_applies_defaults() {
    let config = ReconcileConfig::try_from(complete_args()).expect("config should build");
    assert_eq!(config.aligner.tolerance(), DEFAULT_TOLERANCE);
    assert_eq!(config.open_data_reference, DEFAULT_OPEN_DATA_REFERENCE);
    assert_eq!(config.current_reference, DEFAULT_CURRENT_REFERENCE);
    assert_eq!(config.max_features, None);
}

#[rstest]
#[case(0.0)]
#[case(-1.0)]
#[case(f64::NAN)]
fn converting_rejects_invalid_tolerance(#[case] tolerance: f64) {
    let args = ReconcileArgs {
        tolerance: Some(tolerance),
        ..complete_args()
    };
    let err = ReconcileConfig::try_from(args).expect_err("tolerance should be rejected");
    assert!(matches!(err, CliError::InvalidTolerance(_)), "{err:?}");
}

#[rstest]
fn boundary_parses_into_rectangle() {
    let boundary = parse_boundary(" 1, 2 ,30,40").expect("valid boundary");
    let rect = boundary.bounding_rect().expect("non-empty boundary");
    assert_eq!(rect.min(), Coord { x: 1.0, y: 2.0 });
    assert_eq!(rect.max(), Coord { x: 30.0, y: 40.0 });
}

#[rstest]
#[case::too_few("0,0,10", "expected min_x,min_y,max_x,max_y")]
#[case::too_many("0,0,10,10,10", "expected min_x,min_y,max_x,max_y")]
#[case::not_numbers("a,b,c,d", "coordinates must be numbers")]
#[case::infinite("0,0,inf,10", "coordinates must be finite")]
#[case::inverted("10,0,0,10", "minimum must be below maximum")]
#[case::empty_width("0,0,0,10", "minimum must be below maximum")]
fn boundary_rejects_malformed_values(#[case] value: &str, #[case] expected: &str) {
    match parse_boundary(value) {
        Err(CliError::InvalidBoundary {
            value: rejected,
            reason,
        }) => {
            assert_eq!(rejected, value);
            assert_eq!(reason, expected);
        }
        other => panic!("expected InvalidBoundary, found {other:?}"),
    }
}

#[rstest]
fn validate_sources_reports_missing_files() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    let args = ReconcileArgs {
        open_data: Some(root.join("missing-bag.json")),
        current: Some(root.join("missing-osm.json")),
        ..complete_args()
    };
    let config = ReconcileConfig::try_from(args).expect("config should build");
    match config.validate_sources().expect_err("expected failure") {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_OPEN_DATA),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn validate_sources_rejects_directories() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    let open_data = root.join("bag.json");
    write_document(&open_data, "bag:pand", Vec::new());
    let args = ReconcileArgs {
        open_data: Some(open_data),
        current: Some(root.clone()),
        ..complete_args()
    };
    let config = ReconcileConfig::try_from(args).expect("config should build");
    match config.validate_sources().expect_err("expected directory rejection") {
        CliError::SourcePathNotFile { field, .. } => assert_eq!(field, ARG_CURRENT),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "tolerance": "wide" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "open_data": "from-file-bag.json",
            "current": "from-file-osm.json",
            "boundary": "0,0,1,1",
            "tolerance": 0.5,
        }),
        None,
    );
    composer.push_environment(json!({
        "current": "from-env-osm.json",
        "max_features": 500,
    }));
    composer.push_cli(json!({
        "boundary": "0,0,100,100",
    }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.open_data, Utf8PathBuf::from("from-file-bag.json"));
    assert_eq!(config.current, Utf8PathBuf::from("from-env-osm.json"));
    assert_eq!(config.max_features, Some(500));
    assert_eq!(config.aligner.tolerance(), 0.5);
    let rect = config.boundary.bounding_rect().expect("non-empty boundary");
    assert_eq!(rect.max(), Coord { x: 100.0, y: 100.0 });
}
