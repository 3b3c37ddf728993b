//! Root environment handed to the parser through the CTX token.

use rextporter_core::{AuthDef, OptionValue, OptionsMap};

/// Defaults shared by every service of a document.
///
/// Service options are merged over `default_options`, so per-service
/// settings win on conflicts. Services without an explicit `AS` clause get
/// a copy of `default_auth`.
#[derive(Debug, Default, PartialEq)]
pub struct DslContext {
    pub default_options: OptionsMap,
    pub default_auth: Option<AuthDef>,
}

impl DslContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.default_options.insert(key, value);
        self
    }

    pub fn with_default_auth(mut self, auth: AuthDef) -> Self {
        self.default_auth = Some(auth);
        self
    }
}
