//! End-to-end tests: RXT source → tokens → configuration tree

use rextporter_core::{ConfigError, KeyValueStore, MetricType, ServiceMode};
use rextporter_dsl::lexer::rxt_patterns;
use rextporter_dsl::{
    parse, parse_file, parse_with_context, tokenize, tokenize_threaded, DslContext, DslError,
    ParseError, ParseErrorKind, Scanner, TokenId,
};
use rextporter_test_utils::{assertions, fixtures};
use std::io::Write;
use std::sync::Arc;

fn parse_error_kind(result: Result<rextporter_core::RootConfig, DslError>) -> ParseErrorKind {
    match result {
        Err(DslError::Parse(ParseError { kind, .. })) => kind,
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_rxt_and_toml_build_the_same_tree() {
    let from_rxt = parse(fixtures::SKYCOIN_RXT).unwrap();
    let from_toml = rextporter_core::load_config_str(fixtures::SKYCOIN_TOML).unwrap();
    assert_eq!(from_rxt, fixtures::skycoin_config());
    assert_eq!(from_rxt, from_toml);
}

#[test]
fn test_single_service_scenario() {
    let config = parse("FOR_SERVICE \"svc1\"\n    METRIC\n        NAME \"up\"\n        TYPE GAUGE\n")
        .unwrap();
    assertions::assert_config_valid(&config);
    assert_eq!(config.services.len(), 1);
    assertions::assert_has_metric(&config.services[0], "up", MetricType::Gauge);
}

#[test]
fn test_keywords_are_case_insensitive() {
    let config = parse("for service a\n  metric\n    name up\n    type counter\n").unwrap();
    assertions::assert_has_metric(&config.services[0], "up", MetricType::Counter);
}

#[test]
fn test_comments_and_blank_lines_are_ignored() {
    let source = "\
# exporter targets

FOR_SERVICE a   # trailing comment
  # inside the block

  METRIC
    NAME up
    TYPE GAUGE
  # trailing indented comment
";
    let config = parse(source).unwrap();
    assert_eq!(config.services[0].metrics.len(), 1);
}

#[test]
fn test_last_line_without_newline_may_be_blank_or_comment() {
    let clean = parse("FOR_SERVICE a\n  METRIC\n    NAME up\n    TYPE GAUGE\n").unwrap();
    let spaces = parse("FOR_SERVICE a\n  METRIC\n    NAME up\n    TYPE GAUGE\n   ").unwrap();
    assert_eq!(clean, spaces);

    let config = parse("DATASET\n  # trailing note").unwrap();
    assert!(config.dataset);
    assert!(config.services.is_empty());
}

#[test]
fn test_threaded_tokenizer_matches_sequential() {
    let context = Arc::new(DslContext::default());
    let sequential = tokenize(fixtures::SKYCOIN_RXT).unwrap();
    let threaded = tokenize_threaded(fixtures::SKYCOIN_RXT, context).unwrap();
    assert_eq!(sequential, threaded);
    assert_eq!(sequential.first().map(|t| t.id), Some(TokenId::Ctx));
    assert_eq!(sequential.last().map(|t| t.id), Some(TokenId::Eof));
}

#[test]
fn test_threaded_tokenizer_reports_lexer_errors() {
    let err = tokenize_threaded("FOR_SERVICE a\n  GET ?", Arc::new(DslContext::default()))
        .unwrap_err();
    assert!(matches!(
        err,
        DslError::Parse(ParseError {
            kind: ParseErrorKind::UnexpectedInput,
            line: 2,
            column: 7,
            ..
        })
    ));
}

#[test]
fn test_cancelled_scan_delivers_nothing_more() {
    let mut handle = Scanner::new(rxt_patterns().unwrap(), fixtures::SKYCOIN_RXT).spawn();
    assert!(handle.next().is_some());
    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(handle.next().is_none());
}

#[test]
fn test_bad_indent_is_reported() {
    let source = "FOR_SERVICE a\n    METRIC\n      NAME up\n      TYPE GAUGE\n  GET '/x'\n";
    assert_eq!(parse_error_kind(parse(source)), ParseErrorKind::BadIndent);
}

#[test]
fn test_unexpected_character_is_reported() {
    assert_eq!(
        parse_error_kind(parse("FOR_SERVICE Svc")),
        ParseErrorKind::UnexpectedInput
    );
}

#[test]
fn test_undefined_auth_is_reported() {
    assert_eq!(
        parse_error_kind(parse("FOR_SERVICE a AS nobody")),
        ParseErrorKind::UndefinedReference
    );
}

#[test]
fn test_invalid_tree_fails_validation() {
    let err = parse("FOR_SERVICE proxy\n  SET mode TO forward_metrics").unwrap_err();
    match err {
        DslError::Config(ConfigError::Validation { issues }) => {
            assert!(issues.iter().any(|i| i.contains("requires a location")));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }

    let err = parse("FOR_SERVICE a, a").unwrap_err();
    assert!(matches!(err, DslError::Config(ConfigError::Validation { .. })));
}

#[test]
fn test_context_defaults_reach_every_service() {
    let context = DslContext::new()
        .with_default_option("location", "http://localhost:6420")
        .with_default_option("timeout", "10s");
    let config = parse_with_context("FOR_SERVICE a, b\nFOR_SERVICE c", context).unwrap();
    assert_eq!(config.services.len(), 3);
    for service in &config.services {
        assert_eq!(service.location, "http://localhost:6420");
        assert_eq!(service.options.get_string("timeout").unwrap(), "10s");
        assert_eq!(service.mode, ServiceMode::RestApi);
    }
}

#[test]
fn test_parse_file_reads_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(fixtures::SKYCOIN_RXT.as_bytes()).unwrap();
    let config = parse_file(file.path()).unwrap();
    assert_eq!(config, fixtures::skycoin_config());
}

#[test]
fn test_parse_file_missing_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_file(dir.path().join("missing.rxt")).unwrap_err();
    assert!(matches!(err, DslError::Read { .. }));
    assert!(err.to_string().contains("missing.rxt"));
}
