//! Resource definitions
//!
//! A resource is one HTTP endpoint of a service: how to reach it, how to
//! authenticate, how to decode the response and which metrics to extract.

use crate::error::StoreResult;
use crate::metric::MetricDef;
use crate::options::{KeyValueStore, OptionsMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method used to query a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication scheme for a service or resource (e.g. `rest_csrf`).
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthDef {
    #[serde(rename = "type")]
    pub auth_type: String,
    #[serde(default)]
    pub options: OptionsMap,
}

impl AuthDef {
    pub fn new(auth_type: impl Into<String>) -> Self {
        Self {
            auth_type: auth_type.into(),
            options: OptionsMap::new(),
        }
    }

    pub fn try_clone(&self) -> StoreResult<Self> {
        Ok(Self {
            auth_type: self.auth_type.clone(),
            options: self.options.clone_store()?,
        })
    }
}

/// Response decoder (e.g. `jsonpath`).
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DecoderDef {
    pub mode: String,
    #[serde(default)]
    pub options: OptionsMap,
}

impl DecoderDef {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            options: OptionsMap::new(),
        }
    }

    pub fn try_clone(&self) -> StoreResult<Self> {
        Ok(Self {
            mode: self.mode.clone(),
            options: self.options.clone_store()?,
        })
    }
}

/// One HTTP-reachable endpoint to scrape.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    #[serde(rename = "type", default)]
    resource_type: HttpMethod,
    #[serde(rename = "uri")]
    resource_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<AuthDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decoder: Option<DecoderDef>,
    #[serde(default)]
    metrics: Vec<MetricDef>,
    #[serde(default)]
    options: OptionsMap,
}

impl ResourceDef {
    pub fn new(resource_type: HttpMethod, resource_uri: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_uri: resource_uri.into(),
            ..Self::default()
        }
    }

    pub fn resource_type(&self) -> HttpMethod {
        self.resource_type
    }

    pub fn set_resource_type(&mut self, resource_type: HttpMethod) {
        self.resource_type = resource_type;
    }

    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    pub fn set_resource_uri(&mut self, uri: impl Into<String>) {
        self.resource_uri = uri.into();
    }

    /// Resource path against the service base path.
    pub fn resource_path(&self, base_path: &str) -> String {
        format!("{}{}", base_path, self.resource_uri)
    }

    /// Resource-specific auth if any, otherwise `default` unchanged.
    pub fn get_auth<'a>(&'a self, default: Option<&'a AuthDef>) -> Option<&'a AuthDef> {
        self.auth.as_ref().or(default)
    }

    pub fn set_auth(&mut self, auth: AuthDef) {
        self.auth = Some(auth);
    }

    pub fn decoder(&self) -> Option<&DecoderDef> {
        self.decoder.as_ref()
    }

    pub fn set_decoder(&mut self, decoder: DecoderDef) {
        self.decoder = Some(decoder);
    }

    pub fn add_metric_def(&mut self, metric: MetricDef) {
        self.metrics.push(metric);
    }

    pub fn metric_defs(&self) -> &[MetricDef] {
        &self.metrics
    }

    /// The options store. An empty map holds no allocation, so the store is
    /// always present without costing anything until first written.
    pub fn options(&self) -> &OptionsMap {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut OptionsMap {
        &mut self.options
    }

    /// Deep copy of auth, decoder, every metric and the options store.
    ///
    /// The first nested failure aborts the whole copy.
    pub fn try_clone(&self) -> StoreResult<Self> {
        let auth = match &self.auth {
            Some(auth) => Some(auth.try_clone().inspect_err(|err| {
                tracing::error!(error = %err, uri = %self.resource_uri, "can not clone http auth in resource");
            })?),
            None => None,
        };
        let decoder = match &self.decoder {
            Some(decoder) => Some(decoder.try_clone().inspect_err(|err| {
                tracing::error!(error = %err, uri = %self.resource_uri, "can not clone decoder in resource");
            })?),
            None => None,
        };
        let metrics = self
            .metrics
            .iter()
            .map(MetricDef::try_clone)
            .collect::<StoreResult<Vec<_>>>()
            .inspect_err(|err| {
                tracing::error!(error = %err, uri = %self.resource_uri, "can not clone metrics in resource");
            })?;
        let options = self.options.clone_store().inspect_err(|err| {
            tracing::error!(error = %err, uri = %self.resource_uri, "can not clone options in resource");
        })?;

        Ok(Self {
            resource_type: self.resource_type,
            resource_uri: self.resource_uri.clone(),
            auth,
            decoder,
            metrics,
            options,
        })
    }

    /// Collect structural problems with this resource.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.resource_uri.starts_with('/') {
            issues.push(format!(
                "resource uri '{}' should start with '/'",
                self.resource_uri
            ));
        }
        for metric in &self.metrics {
            if metric.name.trim().is_empty() {
                issues.push(format!(
                    "metric without name in resource '{}'",
                    self.resource_uri
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricType;
    use crate::options::OptionValue;

    fn sample_resource() -> ResourceDef {
        let mut auth = AuthDef::new("rest_csrf");
        auth.options
            .set_string("token_header_key", "X-CSRF-Token")
            .unwrap();
        let mut decoder = DecoderDef::new("jsonpath");
        decoder.options.set_string("root", "$").unwrap();

        let mut resource = ResourceDef::new(HttpMethod::Get, "/api/v1/health");
        resource.set_auth(auth);
        resource.set_decoder(decoder);
        resource.add_metric_def(
            MetricDef::new("open_connections", MetricType::Gauge).with_path("/open_connections"),
        );
        resource
            .options_mut()
            .set_object("timeout", OptionValue::Integer(30))
            .unwrap();
        resource
    }

    #[test]
    fn test_get_auth_prefers_resource_auth() {
        let resource = sample_resource();
        let default = AuthDef::new("basic");
        let auth = resource.get_auth(Some(&default)).unwrap();
        assert_eq!(auth.auth_type, "rest_csrf");
    }

    #[test]
    fn test_get_auth_falls_back_to_default() {
        let resource = ResourceDef::new(HttpMethod::Get, "/metrics");
        let default = AuthDef::new("basic");
        let auth = resource.get_auth(Some(&default)).unwrap();
        assert!(std::ptr::eq(auth, &default));
        assert!(resource.get_auth(None).is_none());
    }

    #[test]
    fn test_options_never_missing() {
        let mut resource = ResourceDef::new(HttpMethod::Post, "/x");
        assert!(resource.options().is_empty());
        resource.options_mut().set_string("k", "v").unwrap();
        assert_eq!(resource.options().get_string("k").unwrap(), "v");
    }

    #[test]
    fn test_resource_path_joins_base() {
        let resource = ResourceDef::new(HttpMethod::Get, "/api/v1/health");
        assert_eq!(
            resource.resource_path("http://localhost:6420"),
            "http://localhost:6420/api/v1/health"
        );
    }

    #[test]
    fn test_try_clone_is_structurally_equal() {
        let resource = sample_resource();
        let clone = resource.try_clone().unwrap();
        assert_eq!(clone, resource);
        assert_eq!(clone.resource_type(), HttpMethod::Get);
        assert_eq!(clone.resource_uri(), "/api/v1/health");
        assert_eq!(clone.metric_defs().len(), 1);
        assert_eq!(clone.options().keys(), resource.options().keys());
    }

    #[test]
    fn test_try_clone_is_independent() {
        let resource = sample_resource();
        let mut clone = resource.try_clone().unwrap();
        clone.set_resource_uri("/other");
        clone.options_mut().set_string("timeout", "never").unwrap();
        clone.add_metric_def(MetricDef::new("extra", MetricType::Counter));
        if let Some(auth) = clone.auth.as_mut() {
            auth.options.set_string("token_header_key", "X-Other").unwrap();
        }

        assert_eq!(resource.resource_uri(), "/api/v1/health");
        assert_eq!(
            resource.options().get_object("timeout").unwrap(),
            OptionValue::Integer(30)
        );
        assert_eq!(resource.metric_defs().len(), 1);
        assert_eq!(
            resource
                .get_auth(None)
                .unwrap()
                .options
                .get_string("token_header_key")
                .unwrap(),
            "X-CSRF-Token"
        );
    }

    #[test]
    fn test_validate_reports_relative_uri_and_unnamed_metric() {
        let mut resource = ResourceDef::new(HttpMethod::Get, "api/v1/health");
        resource.add_metric_def(MetricDef::new("  ", MetricType::Gauge));
        let issues = resource.validate();
        assert_eq!(issues.len(), 2);
        assert!(sample_resource().validate().is_empty());
    }

    #[test]
    fn test_resource_deserializes_from_toml() {
        let resource: ResourceDef = toml::from_str(
            r#"
            type = "POST"
            uri = "/api/v1/wallet"
            [decoder]
            mode = "jsonpath"
            [[metrics]]
            name = "balance"
            type = "gauge"
            "#,
        )
        .unwrap();
        assert_eq!(resource.resource_type(), HttpMethod::Post);
        assert_eq!(resource.decoder().unwrap().mode, "jsonpath");
        assert_eq!(resource.metric_defs()[0].metric_type, MetricType::Gauge);
        assert!(resource.get_auth(None).is_none());
    }
}
