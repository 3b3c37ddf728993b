//! rextporter core - configuration object model
//!
//! Services, resources, metrics, auth and decoder definitions plus the
//! mergeable options store they carry. The tree is built once, either by the
//! DSL parser in `rextporter-dsl` or by the TOML loader here, and is read-only
//! afterwards except for explicit `try_clone`/merge calls on private copies.

pub mod error;
pub mod loader;
pub mod metric;
pub mod options;
pub mod resource;
pub mod service;

pub use error::{ConfigError, RextError, RextResult, StoreError, StoreResult};
pub use loader::{load_config, load_config_str};
pub use metric::{MetricDef, MetricType};
pub use options::{
    merge_stores_in_a_new_one, merge_stores_inplace, KeyValueStore, OptionValue, OptionsMap,
};
pub use resource::{AuthDef, DecoderDef, HttpMethod, ResourceDef};
pub use service::{RootConfig, Service, ServiceMode};
