//! Parser implementation
//!
//! Recursive descent over the adapted token stream, one token of lookahead.
//! `block(x)` stands for `BLOCK_OPEN x (SAME_LEVEL x)* BLOCK_CLOSE` and
//! `NAME` for a string literal or an identifier.
//!
//! ```text
//! document    := CTX SAME_LEVEL* [top (SAME_LEVEL+ top)*] SAME_LEVEL* EOF
//! top         := DATASET | define_auth | for_stack | for_service
//! define_auth := DEFINE_AUTH NAME AS NAME [block(option)]
//! for_stack   := FOR_STACK NAME block(for_service | define_auth)
//! for_service := FOR_SERVICE NAME (COMMA NAME)* [AS NAME] [block(service_item)]
//! service_item:= option | metric | resource | extract
//! resource    := (GET | POST) NAME [AS NAME] [block(option | metric | extract)]
//! extract     := EXTRACT_USING NAME [block(option)]
//! metric      := METRIC block(metric_item)
//! metric_item := NAME NAME | TYPE metric_type | (DESCRIPTION | HELP) NAME
//!              | LABELS NAME (COMMA NAME)* | FROM NAME | option
//! option      := SET NAME TO NAME | WITH_OPTIONS block(SET NAME TO NAME)
//! ```

use crate::context::DslContext;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Span, Token, TokenId, TokenValue};
use rextporter_core::{
    merge_stores_in_a_new_one, AuthDef, DecoderDef, HttpMethod, KeyValueStore, MetricDef,
    MetricType, OptionsMap, ResourceDef, RootConfig, Service, StoreError,
};
use std::collections::HashMap;
use std::sync::Arc;

static END_OF_INPUT: Token = Token {
    id: TokenId::Eof,
    value: TokenValue::None,
    span: Span {
        start: 0,
        end: 0,
        line: 1,
        column: 1,
    },
};

// ============================================================================
// PARSER
// ============================================================================

/// Parser for the RXT DSL.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    context: Arc<DslContext>,
    /// Auth templates declared with `DEFINE_AUTH`, by name.
    auths: HashMap<String, AuthDef>,
}

impl Parser {
    /// Create a new parser from a vector of tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            context: Arc::new(DslContext::default()),
            auths: HashMap::new(),
        }
    }

    /// Parse the whole token stream into a configuration tree.
    pub fn parse(&mut self) -> Result<RootConfig, ParseError> {
        if let Some(token) = self.tokens.iter().find(|t| t.id == TokenId::BadIndent) {
            return Err(ParseError::new(
                ParseErrorKind::BadIndent,
                "dedent does not match any enclosing indentation level",
                token.span,
            ));
        }

        self.parse_context()?;
        let mut config = RootConfig::new();
        self.skip_same_level();
        while !self.is_at_end() {
            self.parse_top(&mut config)?;
            if self.is_at_end() {
                break;
            }
            if !self.check(TokenId::SameLevel) {
                return Err(self.unexpected("end of line"));
            }
            self.skip_same_level();
        }
        Ok(config)
    }

    fn parse_context(&mut self) -> Result<(), ParseError> {
        if !self.check(TokenId::Ctx) {
            return Err(self.unexpected("CTX"));
        }
        let context = match &self.current().value {
            TokenValue::Context(ctx) => Some(Arc::clone(ctx)),
            _ => None,
        };
        if let Some(context) = context {
            self.context = context;
        }
        self.advance();
        Ok(())
    }

    fn parse_top(&mut self, config: &mut RootConfig) -> Result<(), ParseError> {
        match self.current().id {
            TokenId::Dataset => {
                self.advance();
                config.dataset = true;
                Ok(())
            }
            TokenId::DefineAuth => self.parse_define_auth(),
            TokenId::ForStack => self.parse_for_stack(config),
            TokenId::ForService => {
                let services = self.parse_for_service(None)?;
                config.services.extend(services);
                Ok(())
            }
            _ => Err(self.unexpected("DATASET, DEFINE_AUTH, FOR_STACK or FOR_SERVICE")),
        }
    }

    /// Parse an auth template: `DEFINE_AUTH type AS name`.
    fn parse_define_auth(&mut self) -> Result<(), ParseError> {
        self.expect(TokenId::DefineAuth)?;
        let auth_type = self.expect_value("auth type")?;
        self.expect(TokenId::As)?;
        let name = self.expect_value("auth name")?;

        let mut auth = AuthDef::new(auth_type);
        if self.check(TokenId::BlockOpen) {
            self.parse_block(|p| p.parse_option(&mut auth.options))?;
        }
        tracing::trace!(name = %name, auth_type = %auth.auth_type, "auth defined");
        self.auths.insert(name, auth);
        Ok(())
    }

    fn parse_for_stack(&mut self, config: &mut RootConfig) -> Result<(), ParseError> {
        self.expect(TokenId::ForStack)?;
        let stack = self.expect_value("stack name")?;
        self.parse_block(|p| match p.current().id {
            TokenId::ForService => {
                let services = p.parse_for_service(Some(&stack))?;
                config.services.extend(services);
                Ok(())
            }
            TokenId::DefineAuth => p.parse_define_auth(),
            _ => Err(p.unexpected("FOR_SERVICE or DEFINE_AUTH")),
        })
    }

    /// Parse a service section. Every listed name gets its own copy of the
    /// section body.
    fn parse_for_service(&mut self, stack: Option<&str>) -> Result<Vec<Service>, ParseError> {
        let start = self.expect(TokenId::ForService)?;
        let mut names = vec![self.expect_value("service name")?];
        while self.check(TokenId::Comma) {
            self.advance();
            names.push(self.expect_value("service name")?);
        }

        let mut template = Service::new("");
        template.stack = stack.map(str::to_string);
        template.auth = if self.check(TokenId::As) {
            self.advance();
            Some(self.resolve_auth()?)
        } else {
            self.context
                .default_auth
                .as_ref()
                .map(AuthDef::try_clone)
                .transpose()
                .map_err(|err| store_error(err, start))?
        };

        let mut options = OptionsMap::new();
        if self.check(TokenId::BlockOpen) {
            self.parse_block(|p| p.parse_service_item(&mut template, &mut options))?;
        }

        let mut options = merge_stores_in_a_new_one(&self.context.default_options, &options)
            .map_err(|err| store_error(err, start))?;
        if let Some(mode) = take_string_option(&mut options, "mode", start)? {
            template.mode = mode
                .parse()
                .map_err(|reason: String| ParseError::new(ParseErrorKind::InvalidValue, reason, start))?;
        }
        if let Some(location) = take_string_option(&mut options, "location", start)? {
            template.location = location;
        }
        template.options = options;

        let mut services = Vec::with_capacity(names.len());
        for name in names {
            let mut service = template.try_clone().map_err(|err| store_error(err, start))?;
            service.name = name;
            services.push(service);
        }
        Ok(services)
    }

    fn parse_service_item(
        &mut self,
        service: &mut Service,
        options: &mut OptionsMap,
    ) -> Result<(), ParseError> {
        match self.current().id {
            TokenId::Set | TokenId::WithOptions => self.parse_option(options),
            TokenId::Metric => {
                let metric = self.parse_metric()?;
                service.metrics.push(metric);
                Ok(())
            }
            TokenId::Get | TokenId::Post => {
                let resource = self.parse_resource()?;
                service.resources.push(resource);
                Ok(())
            }
            TokenId::ExtractUsing => {
                service.decoder = Some(self.parse_extract()?);
                Ok(())
            }
            _ => Err(self.unexpected("SET, WITH_OPTIONS, METRIC, GET, POST or EXTRACT_USING")),
        }
    }

    fn parse_resource(&mut self) -> Result<ResourceDef, ParseError> {
        let method = match self.current().id {
            TokenId::Get => HttpMethod::Get,
            TokenId::Post => HttpMethod::Post,
            _ => return Err(self.unexpected("GET or POST")),
        };
        self.advance();
        let uri = self.expect_value("resource path")?;

        let mut resource = ResourceDef::new(method, uri);
        if self.check(TokenId::As) {
            self.advance();
            let auth = self.resolve_auth()?;
            resource.set_auth(auth);
        }
        if self.check(TokenId::BlockOpen) {
            self.parse_block(|p| match p.current().id {
                TokenId::Set | TokenId::WithOptions => p.parse_option(resource.options_mut()),
                TokenId::Metric => {
                    let metric = p.parse_metric()?;
                    resource.add_metric_def(metric);
                    Ok(())
                }
                TokenId::ExtractUsing => {
                    let decoder = p.parse_extract()?;
                    resource.set_decoder(decoder);
                    Ok(())
                }
                _ => Err(p.unexpected("SET, WITH_OPTIONS, METRIC or EXTRACT_USING")),
            })?;
        }
        Ok(resource)
    }

    fn parse_extract(&mut self) -> Result<DecoderDef, ParseError> {
        self.expect(TokenId::ExtractUsing)?;
        let mut decoder = DecoderDef::new(self.expect_value("decoder")?);
        if self.check(TokenId::BlockOpen) {
            self.parse_block(|p| p.parse_option(&mut decoder.options))?;
        }
        Ok(decoder)
    }

    /// Parse a metric block. `NAME` and `TYPE` are required.
    fn parse_metric(&mut self) -> Result<MetricDef, ParseError> {
        let start = self.expect(TokenId::Metric)?;

        let mut name = None;
        let mut metric_type = None;
        let mut description = String::new();
        let mut labels = Vec::new();
        let mut path = None;
        let mut options = OptionsMap::new();

        self.parse_block(|p| {
            match p.current().id {
                TokenId::Name => {
                    p.advance();
                    name = Some(p.expect_value("metric name")?);
                }
                TokenId::Type => {
                    p.advance();
                    metric_type = Some(p.parse_metric_type()?);
                }
                TokenId::Description | TokenId::Help => {
                    p.advance();
                    description = p.expect_value("description")?;
                }
                TokenId::Labels => {
                    p.advance();
                    labels = p.parse_value_list("label")?;
                }
                TokenId::From => {
                    p.advance();
                    path = Some(p.expect_value("value path")?);
                }
                TokenId::Set | TokenId::WithOptions => p.parse_option(&mut options)?,
                _ => {
                    return Err(p.unexpected("NAME, TYPE, DESCRIPTION, HELP, LABELS, FROM or SET"))
                }
            }
            Ok(())
        })?;

        let name = name.ok_or_else(|| {
            ParseError::new(ParseErrorKind::MissingField, "metric without NAME", start)
        })?;
        let metric_type = metric_type.ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MissingField,
                format!("metric '{}' without TYPE", name),
                start,
            )
        })?;

        let mut metric = MetricDef::new(name, metric_type)
            .with_description(description)
            .with_labels(labels);
        metric.path = path;
        metric.options = options;
        Ok(metric)
    }

    fn parse_metric_type(&mut self) -> Result<MetricType, ParseError> {
        let metric_type = match self.current().id {
            TokenId::Counter => MetricType::Counter,
            TokenId::Gauge => MetricType::Gauge,
            TokenId::Histogram => MetricType::Histogram,
            TokenId::Summary => MetricType::Summary,
            _ => return Err(self.unexpected("COUNTER, GAUGE, HISTOGRAM or SUMMARY")),
        };
        self.advance();
        Ok(metric_type)
    }

    fn parse_option(&mut self, store: &mut OptionsMap) -> Result<(), ParseError> {
        match self.current().id {
            TokenId::Set => self.parse_set(store),
            TokenId::WithOptions => {
                self.advance();
                self.parse_block(|p| {
                    if p.check(TokenId::Set) {
                        p.parse_set(store)
                    } else {
                        Err(p.unexpected("SET"))
                    }
                })
            }
            _ => Err(self.unexpected("SET or WITH_OPTIONS")),
        }
    }

    /// `SET key TO value`
    fn parse_set(&mut self, store: &mut OptionsMap) -> Result<(), ParseError> {
        let start = self.expect(TokenId::Set)?;
        let key = self.expect_value("option name")?;
        self.expect(TokenId::To)?;
        let value = self.expect_value("option value")?;
        store
            .set_string(&key, &value)
            .map_err(|err| store_error(err, start))?;
        Ok(())
    }

    fn parse_value_list(&mut self, what: &str) -> Result<Vec<String>, ParseError> {
        let mut values = vec![self.expect_value(what)?];
        while self.check(TokenId::Comma) {
            self.advance();
            values.push(self.expect_value(what)?);
        }
        Ok(values)
    }

    /// Copy of a previously defined auth template.
    fn resolve_auth(&mut self) -> Result<AuthDef, ParseError> {
        let span = self.current().span;
        let name = self.expect_value("auth name")?;
        let auth = self.auths.get(&name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UndefinedReference,
                format!("auth '{}' is not defined", name),
                span,
            )
        })?;
        auth.try_clone().map_err(|err| store_error(err, span))
    }

    /// Run `item` for every line of an indented block.
    fn parse_block<F>(&mut self, mut item: F) -> Result<(), ParseError>
    where
        F: FnMut(&mut Self) -> Result<(), ParseError>,
    {
        self.expect(TokenId::BlockOpen)?;
        loop {
            self.skip_same_level();
            match self.current().id {
                TokenId::BlockClose => {
                    self.advance();
                    return Ok(());
                }
                TokenId::Eof => return Err(self.unexpected("end of block")),
                _ => {}
            }
            item(self)?;
            if !self.check(TokenId::SameLevel) && !self.check(TokenId::BlockClose) {
                return Err(self.unexpected("end of line"));
            }
        }
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    pub(crate) fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .unwrap_or(&END_OF_INPUT)
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len() || self.current().id == TokenId::Eof
    }

    pub(crate) fn check(&self, id: TokenId) -> bool {
        self.current().id == id
    }

    /// Consume a token of kind `id`, returning its span.
    pub(crate) fn expect(&mut self, id: TokenId) -> Result<Span, ParseError> {
        if self.check(id) {
            let span = self.current().span;
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(id.name()))
        }
    }

    /// Consume a string literal or identifier.
    pub(crate) fn expect_value(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current().id {
            TokenId::StrLiteral | TokenId::Identifier => {
                let value = self.current().as_str().unwrap_or_default().to_string();
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(crate) fn skip_same_level(&mut self) {
        while self.check(TokenId::SameLevel) {
            self.advance();
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::new(
            ParseErrorKind::UnexpectedToken,
            format!("expected {}, found {}", expected, token),
            token.span,
        )
    }
}

/// Remove `key` from `options` and return it as a string.
fn take_string_option(
    options: &mut OptionsMap,
    key: &str,
    span: Span,
) -> Result<Option<String>, ParseError> {
    match options.get_string(key) {
        Ok(value) => {
            options.remove(key);
            Ok(Some(value))
        }
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(err) => Err(ParseError::new(
            ParseErrorKind::InvalidValue,
            err.to_string(),
            span,
        )),
    }
}

fn store_error(err: StoreError, span: Span) -> ParseError {
    ParseError::new(ParseErrorKind::InvalidValue, err.to_string(), span)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize_with_context;
    use rextporter_core::{OptionValue, ServiceMode};

    fn parse_with(source: &str, context: DslContext) -> Result<RootConfig, ParseError> {
        let tokens = tokenize_with_context(source, Arc::new(context)).unwrap();
        Parser::new(tokens).parse()
    }

    fn parse(source: &str) -> Result<RootConfig, ParseError> {
        parse_with(source, DslContext::default())
    }

    #[test]
    fn test_service_with_metric() {
        let config = parse("FOR_SERVICE \"svc1\"\n    METRIC\n        NAME \"up\"\n        TYPE GAUGE\n")
            .unwrap();
        assert_eq!(config.services.len(), 1);
        let service = &config.services[0];
        assert_eq!(service.name, "svc1");
        assert_eq!(service.metrics.len(), 1);
        assert_eq!(service.metrics[0].name, "up");
        assert_eq!(service.metrics[0].metric_type, MetricType::Gauge);
    }

    #[test]
    fn test_empty_document() {
        let config = parse("\n# nothing here\n").unwrap();
        assert!(config.services.is_empty());
        assert!(!config.dataset);
    }

    #[test]
    fn test_dataset_marker() {
        let config = parse("DATASET\nFOR SERVICE a").unwrap();
        assert!(config.dataset);
        assert_eq!(config.services[0].name, "a");
    }

    #[test]
    fn test_service_list_gets_independent_copies() {
        let source = "\
FOR_SERVICE node_a, node_b
  SET location TO 'http://localhost:6420'
  GET '/api/v1/health'
    METRIC
      NAME open_connections
      TYPE GAUGE
";
        let mut config = parse(source).unwrap();
        let names: Vec<&str> = config.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["node_a", "node_b"]);
        assert_eq!(config.services[1].location, "http://localhost:6420");
        assert_eq!(config.services[1].resources[0].metric_defs()[0].name, "open_connections");

        config.services[0].resources[0].set_resource_uri("/changed");
        assert_eq!(config.services[1].resources[0].resource_uri(), "/api/v1/health");
    }

    #[test]
    fn test_auth_definitions_are_resolved() {
        let source = "\
DEFINE AUTH rest_csrf AS skycoin_auth
  SET token_header_key TO 'X-CSRF-Token'
DEFINE_AUTH basic AS admin
FOR SERVICE skycoin AS skycoin_auth
  GET '/api/v1/health'
  POST '/api/v1/wallet' AS admin
";
        let config = parse(source).unwrap();
        let service = &config.services[0];
        let auth = service.auth.as_ref().unwrap();
        assert_eq!(auth.auth_type, "rest_csrf");
        assert_eq!(
            auth.options.get_string("token_header_key").unwrap(),
            "X-CSRF-Token"
        );
        let health = &service.resources[0];
        assert_eq!(service.auth_for(health).unwrap().auth_type, "rest_csrf");
        let wallet = &service.resources[1];
        assert_eq!(wallet.resource_type(), HttpMethod::Post);
        assert_eq!(service.auth_for(wallet).unwrap().auth_type, "basic");
    }

    #[test]
    fn test_undefined_auth_is_reported() {
        let err = parse("FOR_SERVICE a AS missing").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UndefinedReference);
        assert_eq!((err.line, err.column), (1, 18));
    }

    #[test]
    fn test_context_defaults_are_merged() {
        let context = DslContext::new()
            .with_default_option("timeout", "30s")
            .with_default_option("location", "http://localhost:9100")
            .with_default_auth(AuthDef::new("basic"));
        let source = "\
FOR_SERVICE a
  SET timeout TO '5s'
FOR_SERVICE b
";
        let config = parse_with(source, context).unwrap();
        let a = config.service("a").unwrap();
        let b = config.service("b").unwrap();
        assert_eq!(a.options.get_string("timeout").unwrap(), "5s");
        assert_eq!(b.options.get_string("timeout").unwrap(), "30s");
        assert_eq!(b.location, "http://localhost:9100");
        assert!(!b.options.contains_key("location"));
        assert_eq!(b.auth.as_ref().unwrap().auth_type, "basic");
    }

    #[test]
    fn test_mode_is_lifted_and_checked() {
        let config = parse("FOR_SERVICE n\n  SET mode TO forward_metrics").unwrap();
        assert_eq!(config.services[0].mode, ServiceMode::ForwardMetrics);

        let err = parse("FOR_SERVICE n\n  SET mode TO push").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidValue);

        let context = DslContext::new().with_default_option("mode", OptionValue::Integer(1));
        let err = parse_with("FOR_SERVICE n", context).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidValue);
    }

    #[test]
    fn test_metric_items() {
        let source = "\
FOR_SERVICE a
  METRIC
    NAME burn_factor
    TYPE HISTOGRAM
    HELP 'Burn factor'
    LABELS coin, node
    FROM '/burn_factor'
    WITH OPTIONS
      SET unit TO ratio
";
        let config = parse(source).unwrap();
        let metric = &config.services[0].metrics[0];
        assert_eq!(metric.metric_type, MetricType::Histogram);
        assert_eq!(metric.description, "Burn factor");
        assert_eq!(metric.labels, vec!["coin", "node"]);
        assert_eq!(metric.path.as_deref(), Some("/burn_factor"));
        assert_eq!(metric.options.get_string("unit").unwrap(), "ratio");
    }

    #[test]
    fn test_metric_without_type_is_missing_field() {
        let err = parse("FOR_SERVICE a\n  METRIC\n    NAME up").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert_eq!(err.line, 2);
        assert!(err.message.contains("'up'"));
    }

    #[test]
    fn test_resource_items_and_decoder() {
        let source = "\
FOR_SERVICE a
  EXTRACT_USING jsonpath
  GET '/api/v1/network'
    EXTRACT USING jsonpath
      SET root TO '$.connections'
    SET retries TO '3'
";
        let config = parse(source).unwrap();
        let service = &config.services[0];
        assert_eq!(service.decoder.as_ref().unwrap().mode, "jsonpath");
        let resource = &service.resources[0];
        let decoder = service.decoder_for(resource).unwrap();
        assert_eq!(decoder.options.get_string("root").unwrap(), "$.connections");
        assert_eq!(resource.options().get_string("retries").unwrap(), "3");
    }

    #[test]
    fn test_stack_groups_services() {
        let source = "\
FOR_STACK skywire
  DEFINE_AUTH basic AS node_auth
  FOR_SERVICE visor AS node_auth
  FOR_SERVICE manager
";
        let config = parse(source).unwrap();
        assert_eq!(config.services.len(), 2);
        assert!(config
            .services
            .iter()
            .all(|s| s.stack.as_deref() == Some("skywire")));
        assert_eq!(config.services[0].auth.as_ref().unwrap().auth_type, "basic");
        assert!(config.services[1].auth.is_none());
    }

    #[test]
    fn test_bad_indent_is_a_parse_error() {
        let source = "FOR_SERVICE a\n  GET '/x'\n    METRIC\n      NAME up\n      TYPE GAUGE\n GET '/y'";
        let err = parse(source).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BadIndent);
        assert_eq!((err.line, err.column), (6, 2));
    }

    #[test]
    fn test_trailing_blank_or_comment_line_parses() {
        let config = parse("FOR_SERVICE a\n  METRIC\n    NAME up\n    TYPE GAUGE\n   ").unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].metrics.len(), 1);

        let config = parse("DATASET\n  # trailing note").unwrap();
        assert!(config.dataset);
    }

    #[test]
    fn test_unexpected_token_reports_position() {
        let err = parse("FOR_SERVICE a\n  TYPE GAUGE").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!((err.line, err.column), (2, 3));
        assert!(err.message.contains("found TYPE"));
    }

    #[test]
    fn test_two_statements_on_one_line_are_rejected() {
        let err = parse("DATASET DATASET").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert!(err.message.contains("end of line"));
    }

    #[test]
    fn test_missing_context_token() {
        let err = Parser::new(Vec::new()).parse().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }
}
