//! Service tree
//!
//! `RootConfig` is the top level node: a list of services, each with the
//! resources and metrics to collect from it. The same tree is produced by
//! the DSL parser and by the TOML loader.

use crate::error::{ConfigError, StoreResult};
use crate::metric::{MetricDef, MetricType};
use crate::options::{KeyValueStore, OptionsMap};
use crate::resource::{AuthDef, DecoderDef, ResourceDef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How metrics are obtained from a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// Query REST resources and extract values from the responses.
    #[default]
    RestApi,
    /// Forward metrics already exposed by the service.
    ForwardMetrics,
}

impl ServiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::RestApi => "rest_api",
            ServiceMode::ForwardMetrics => "forward_metrics",
        }
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rest_api" => Ok(ServiceMode::RestApi),
            "forward_metrics" => Ok(ServiceMode::ForwardMetrics),
            other => Err(format!("unknown service mode '{}'", other)),
        }
    }
}

/// A service to collect metrics from.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub mode: ServiceMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Base URL every resource path is appended to.
    #[serde(default)]
    pub location: String,
    /// Default auth for resources without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoder: Option<DecoderDef>,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub metrics: Vec<MetricDef>,
    #[serde(default)]
    pub options: OptionsMap,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Deep copy, used to stamp one service template under several names.
    pub fn try_clone(&self) -> StoreResult<Self> {
        Ok(Self {
            name: self.name.clone(),
            mode: self.mode,
            stack: self.stack.clone(),
            location: self.location.clone(),
            auth: self.auth.as_ref().map(AuthDef::try_clone).transpose()?,
            decoder: self.decoder.as_ref().map(DecoderDef::try_clone).transpose()?,
            resources: self
                .resources
                .iter()
                .map(ResourceDef::try_clone)
                .collect::<StoreResult<_>>()?,
            metrics: self
                .metrics
                .iter()
                .map(MetricDef::try_clone)
                .collect::<StoreResult<_>>()?,
            options: self.options.clone_store()?,
        })
    }

    /// Auth to use when requesting `resource`.
    pub fn auth_for<'a>(&'a self, resource: &'a ResourceDef) -> Option<&'a AuthDef> {
        resource.get_auth(self.auth.as_ref())
    }

    /// Decoder to use for `resource` responses.
    pub fn decoder_for<'a>(&'a self, resource: &'a ResourceDef) -> Option<&'a DecoderDef> {
        resource.decoder().or(self.decoder.as_ref())
    }

    /// Full URL of `resource` on this service.
    pub fn resource_url(&self, resource: &ResourceDef) -> String {
        resource.resource_path(self.location.trim_end_matches('/'))
    }

    /// Service-level metrics followed by every resource's metrics.
    pub fn all_metrics(&self) -> impl Iterator<Item = &MetricDef> {
        self.metrics
            .iter()
            .chain(self.resources.iter().flat_map(|r| r.metric_defs().iter()))
    }

    fn validate_into(&self, issues: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            issues.push("service without name".to_string());
        }
        if !self.location.is_empty() {
            if let Err(err) = url::Url::parse(&self.location) {
                issues.push(format!(
                    "service '{}': invalid location '{}': {}",
                    self.name, self.location, err
                ));
            }
        } else if self.mode == ServiceMode::ForwardMetrics {
            issues.push(format!(
                "service '{}': forward_metrics mode requires a location",
                self.name
            ));
        }
        for resource in &self.resources {
            issues.extend(
                resource
                    .validate()
                    .into_iter()
                    .map(|issue| format!("service '{}': {}", self.name, issue)),
            );
        }
        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if metric.name.trim().is_empty() {
                issues.push(format!("service '{}': metric without name", self.name));
            }
        }
        for metric in self.all_metrics() {
            if !metric.name.trim().is_empty() && !seen.insert(metric.name.as_str()) {
                issues.push(format!(
                    "service '{}': duplicate metric '{}'",
                    self.name, metric.name
                ));
            }
        }
    }
}

/// Top level node of the configuration tree.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Set when the source declared itself a dataset.
    #[serde(default)]
    pub dataset: bool,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl RootConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Append the services of `other`, keeping insertion order.
    pub fn extend(&mut self, other: RootConfig) {
        self.dataset |= other.dataset;
        self.services.extend(other.services);
    }

    /// All the metrics whose type is `metric_type`, in tree order.
    pub fn filter_metrics_by_type(&self, metric_type: MetricType) -> Vec<&MetricDef> {
        self.services
            .iter()
            .flat_map(Service::all_metrics)
            .filter(|m| m.metric_type == metric_type)
            .collect()
    }

    /// All the services running in `mode`, in insertion order.
    pub fn filter_services_by_mode(&self, mode: ServiceMode) -> Vec<&Service> {
        self.services.iter().filter(|s| s.mode == mode).collect()
    }

    /// Check the whole tree, reporting every issue found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();
        let mut names = HashSet::new();
        for service in &self.services {
            if !service.name.trim().is_empty() && !names.insert(service.name.as_str()) {
                issues.push(format!("duplicate service '{}'", service.name));
            }
            service.validate_into(&mut issues);
        }
        if issues.is_empty() {
            return Ok(());
        }
        for issue in &issues {
            tracing::warn!(issue = %issue, "invalid configuration");
        }
        Err(ConfigError::Validation { issues })
    }
}
