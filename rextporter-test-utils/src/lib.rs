//! rextporter Test Utilities
//!
//! Shared test infrastructure for the rextporter workspace:
//! - Proptest generators for configuration types and RXT documents
//! - Fixtures describing the same configuration in RXT and TOML
//! - Assertions over configuration trees

pub use rextporter_core::{
    AuthDef, ConfigError, DecoderDef, HttpMethod, KeyValueStore, MetricDef, MetricType,
    OptionValue, OptionsMap, ResourceDef, RootConfig, Service, ServiceMode,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for configuration values and RXT sources.

    use super::*;
    use proptest::prelude::*;

    /// Words the RXT lexer reads as keywords, in identifier spelling.
    pub const KEYWORDS: &[&str] = &[
        "with_options",
        "dataset",
        "for_service",
        "for_stack",
        "define_auth",
        "as",
        "set",
        "to",
        "get",
        "post",
        "from",
        "extract_using",
        "metric",
        "name",
        "type",
        "gauge",
        "counter",
        "histogram",
        "summary",
        "description",
        "labels",
        "help",
    ];

    /// Lowercase identifier that does not collide with a keyword.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,11}".prop_filter("identifier must not be a keyword", |s| {
            !KEYWORDS.contains(&s.as_str())
        })
    }

    pub fn arb_metric_type() -> impl Strategy<Value = MetricType> {
        prop_oneof![
            Just(MetricType::Counter),
            Just(MetricType::Gauge),
            Just(MetricType::Histogram),
            Just(MetricType::Summary),
        ]
    }

    pub fn arb_service_mode() -> impl Strategy<Value = ServiceMode> {
        prop_oneof![Just(ServiceMode::RestApi), Just(ServiceMode::ForwardMetrics)]
    }

    pub fn arb_http_method() -> impl Strategy<Value = HttpMethod> {
        prop_oneof![Just(HttpMethod::Get), Just(HttpMethod::Post)]
    }

    pub fn arb_option_value() -> impl Strategy<Value = OptionValue> {
        prop_oneof![
            any::<bool>().prop_map(OptionValue::Boolean),
            any::<i64>().prop_map(OptionValue::Integer),
            "[ -~]{0,16}".prop_map(OptionValue::String),
        ]
    }

    pub fn arb_options_map() -> impl Strategy<Value = OptionsMap> {
        prop::collection::vec((arb_identifier(), arb_option_value()), 0..6)
            .prop_map(|entries| entries.into_iter().collect())
    }

    pub fn arb_metric_def() -> impl Strategy<Value = MetricDef> {
        (
            arb_identifier(),
            arb_metric_type(),
            "[ -~]{0,24}",
            prop::collection::vec(arb_identifier(), 0..3),
            arb_options_map(),
        )
            .prop_map(|(name, metric_type, description, labels, options)| {
                let mut metric = MetricDef::new(name, metric_type)
                    .with_description(description)
                    .with_labels(labels);
                metric.options = options;
                metric
            })
    }

    /// A service section to render as RXT, with what parsing it must yield.
    #[derive(Debug, Clone)]
    pub struct ServiceSketch {
        pub names: Vec<String>,
        pub location: Option<String>,
        pub metrics: Vec<(String, MetricType)>,
        pub resources: Vec<(HttpMethod, String)>,
    }

    impl ServiceSketch {
        /// RXT text for this section, one indentation step being `step` spaces.
        pub fn to_rxt(&self, step: usize) -> String {
            let one = " ".repeat(step);
            let two = " ".repeat(step * 2);
            let mut out = format!("FOR_SERVICE {}\n", self.names.join(", "));
            if let Some(location) = &self.location {
                out.push_str(&format!("{}SET location TO '{}'\n", one, location));
            }
            for (name, metric_type) in &self.metrics {
                out.push_str(&format!("{}METRIC\n", one));
                out.push_str(&format!("{}NAME {}\n", two, name));
                out.push_str(&format!(
                    "{}TYPE {}\n",
                    two,
                    metric_type.as_str().to_uppercase()
                ));
            }
            for (method, path) in &self.resources {
                out.push_str(&format!("{}{} '{}'\n", one, method, path));
            }
            out
        }
    }

    pub fn arb_service_sketch() -> impl Strategy<Value = ServiceSketch> {
        (
            prop::collection::hash_set(arb_identifier(), 1..3),
            prop::option::of((1024u16..65535).prop_map(|port| format!("http://localhost:{}", port))),
            prop::collection::hash_set(arb_identifier(), 0..4),
            arb_metric_type(),
            prop::collection::vec((arb_http_method(), arb_identifier()), 0..3),
        )
            .prop_map(|(names, location, metric_names, metric_type, resources)| ServiceSketch {
                names: names.into_iter().collect(),
                location,
                metrics: metric_names
                    .into_iter()
                    .map(|name| (name, metric_type))
                    .collect(),
                resources: resources
                    .into_iter()
                    .map(|(method, path)| (method, format!("/api/{}", path)))
                    .collect(),
            })
    }

    /// RXT document made of 1 to 3 service sections with distinct names.
    pub fn arb_rxt_document() -> impl Strategy<Value = (String, Vec<ServiceSketch>)> {
        (prop::collection::vec(arb_service_sketch(), 1..4), 1usize..5).prop_map(
            |(mut sketches, step)| {
                for (i, sketch) in sketches.iter_mut().enumerate() {
                    for name in &mut sketch.names {
                        name.push_str(&format!("_s{}", i));
                    }
                }
                let source = sketches
                    .iter()
                    .map(|s| s.to_rxt(step))
                    .collect::<Vec<_>>()
                    .join("\n");
                (source, sketches)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! One configuration written both as RXT and as TOML.

    use super::*;

    pub const SKYCOIN_RXT: &str = "\
# Skycoin node and its host
DEFINE_AUTH rest_csrf AS skycoin_auth
  SET token_header_key TO 'X-CSRF-Token'

FOR_SERVICE skycoin AS skycoin_auth
  SET location TO 'http://localhost:6420'
  GET '/api/v1/health'
    METRIC
      NAME open_connections
      TYPE GAUGE
      FROM '/open_connections'
  METRIC
    NAME up
    TYPE GAUGE

FOR_SERVICE node_exporter
  SET mode TO forward_metrics
  SET location TO 'http://localhost:9100/metrics'
";

    pub const SKYCOIN_TOML: &str = r#"
[[services]]
name = "skycoin"
location = "http://localhost:6420"

[services.auth]
type = "rest_csrf"
[services.auth.options]
token_header_key = "X-CSRF-Token"

[[services.resources]]
type = "GET"
uri = "/api/v1/health"

[[services.resources.metrics]]
name = "open_connections"
type = "gauge"
path = "/open_connections"

[[services.metrics]]
name = "up"
type = "gauge"

[[services]]
name = "node_exporter"
mode = "forward_metrics"
location = "http://localhost:9100/metrics"
"#;

    /// The tree both Skycoin fixtures describe.
    pub fn skycoin_config() -> RootConfig {
        let mut auth = AuthDef::new("rest_csrf");
        auth.options.insert("token_header_key", "X-CSRF-Token");

        let mut health = ResourceDef::new(HttpMethod::Get, "/api/v1/health");
        health.add_metric_def(
            MetricDef::new("open_connections", MetricType::Gauge).with_path("/open_connections"),
        );

        let mut skycoin = Service::new("skycoin");
        skycoin.location = "http://localhost:6420".to_string();
        skycoin.auth = Some(auth);
        skycoin.resources.push(health);
        skycoin.metrics.push(MetricDef::new("up", MetricType::Gauge));

        let mut node_exporter = Service::new("node_exporter");
        node_exporter.mode = ServiceMode::ForwardMetrics;
        node_exporter.location = "http://localhost:9100/metrics".to_string();

        let mut config = RootConfig::new();
        config.services.push(skycoin);
        config.services.push(node_exporter);
        config
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    /// Assert that a configuration tree passes validation.
    pub fn assert_config_valid(config: &RootConfig) {
        if let Err(err) = config.validate() {
            panic!("Expected a valid configuration, got: {}", err);
        }
    }

    /// Assert that `service` declares a metric `name` of `metric_type`,
    /// directly or through one of its resources.
    pub fn assert_has_metric(service: &Service, name: &str, metric_type: MetricType) {
        let metric = service
            .all_metrics()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("service '{}' has no metric '{}'", service.name, name));
        assert_eq!(
            metric.metric_type, metric_type,
            "metric '{}' of service '{}' has the wrong type",
            name, service.name
        );
    }
}
