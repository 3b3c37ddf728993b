//! Token adapter
//!
//! The lexer reports what it recognized through a [`TokenHandler`]; the
//! handler decides what a parser token looks like. [`TokenAdapter`] resolves
//! names through the [`KeywordTable`] into [`Token`]s, [`TokenWriter`] prints
//! them instead.

mod keywords;
mod writer;

pub use keywords::KeywordTable;
pub use writer::TokenWriter;

use crate::context::DslContext;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Span, Token, TokenId, TokenValue};
use std::sync::Arc;

/// Which kind of text is emitted through [`TokenHandler::emit_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrChannel {
    Punct,
    Keyword,
    /// Quoted literal, quotes already stripped.
    Literal,
    /// Lowercase identifier.
    Variable,
}

/// Receives everything the lexer emits.
///
/// Every emission returns `Ok(Some(_))` to make the lexer hand control back
/// to its caller, or `Ok(None)` to keep it going.
pub trait TokenHandler {
    type Output;

    /// Structural token or end of stream, by table name.
    fn emit_int(
        &mut self,
        name: &str,
        level: usize,
        span: Span,
    ) -> Result<Option<Self::Output>, ParseError>;

    fn emit_str(
        &mut self,
        channel: StrChannel,
        text: &str,
        span: Span,
    ) -> Result<Option<Self::Output>, ParseError>;

    /// Root environment injection, once at stream start.
    fn emit_obj(
        &mut self,
        name: &str,
        value: Arc<DslContext>,
        span: Span,
    ) -> Result<Option<Self::Output>, ParseError>;

    /// Unrecoverable problem. The returned error aborts the lexer.
    fn error(&mut self, err: ParseError) -> ParseError {
        err
    }
}

/// Builds parser tokens, one per emission.
#[derive(Debug, Clone, Copy)]
pub struct TokenAdapter<'k> {
    keywords: &'k KeywordTable,
}

impl<'k> TokenAdapter<'k> {
    pub fn new(keywords: &'k KeywordTable) -> Self {
        Self { keywords }
    }

    fn emit(&self, id: TokenId, value: TokenValue, span: Span) -> Option<Token> {
        let token = Token::new(id, value, span);
        tracing::trace!(token = %token, line = span.line, column = span.column, "token");
        Some(token)
    }
}

impl Default for TokenAdapter<'static> {
    fn default() -> Self {
        Self::new(KeywordTable::global())
    }
}

impl TokenHandler for TokenAdapter<'_> {
    type Output = Token;

    fn emit_int(&mut self, name: &str, level: usize, span: Span) -> Result<Option<Token>, ParseError> {
        match self.keywords.lookup(name) {
            Some(TokenId::Eof) => Ok(self.emit(TokenId::Eof, TokenValue::None, span)),
            Some(id) if id.is_structural() && id != TokenId::Ctx => {
                Ok(self.emit(id, TokenValue::Level(level), span))
            }
            _ => Err(ParseError::new(
                ParseErrorKind::TokenTable,
                format!("no structural token named '{}'", name),
                span,
            )),
        }
    }

    fn emit_str(&mut self, channel: StrChannel, text: &str, span: Span) -> Result<Option<Token>, ParseError> {
        match channel {
            StrChannel::Punct | StrChannel::Keyword => match self.keywords.lookup(text) {
                Some(id) if !id.is_structural() => Ok(self.emit(id, TokenValue::None, span)),
                _ => Err(ParseError::new(
                    ParseErrorKind::UnknownKeyword,
                    format!("unknown keyword '{}'", text),
                    span,
                )),
            },
            StrChannel::Literal => Ok(self.emit(
                TokenId::StrLiteral,
                TokenValue::Str(text.to_string()),
                span,
            )),
            StrChannel::Variable => Ok(self.emit(
                TokenId::Identifier,
                TokenValue::Str(text.to_string()),
                span,
            )),
        }
    }

    fn emit_obj(
        &mut self,
        name: &str,
        value: Arc<DslContext>,
        span: Span,
    ) -> Result<Option<Token>, ParseError> {
        match self.keywords.lookup(name) {
            Some(TokenId::Ctx) => Ok(self.emit(TokenId::Ctx, TokenValue::Context(value), span)),
            _ => Err(ParseError::new(
                ParseErrorKind::TokenTable,
                format!("no object token named '{}'", name),
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_channel_resolves_ids() {
        let mut adapter = TokenAdapter::default();
        let token = adapter
            .emit_str(StrChannel::Keyword, "for service", Span::default())
            .unwrap()
            .unwrap();
        assert_eq!(token.id, TokenId::ForService);
        assert_eq!(token.value, TokenValue::None);
    }

    #[test]
    fn test_unknown_keyword_is_fatal() {
        let mut adapter = TokenAdapter::default();
        let err = adapter
            .emit_str(StrChannel::Keyword, "FETCH", Span::default())
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownKeyword);
        let err = adapter
            .emit_str(StrChannel::Keyword, "BLOCK_OPEN", Span::default())
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownKeyword);
    }

    #[test]
    fn test_literal_and_variable_channels_carry_text() {
        let mut adapter = TokenAdapter::default();
        let literal = adapter
            .emit_str(StrChannel::Literal, "/api/v1/health", Span::default())
            .unwrap()
            .unwrap();
        assert_eq!(literal.id, TokenId::StrLiteral);
        assert_eq!(literal.as_str(), Some("/api/v1/health"));
        let variable = adapter
            .emit_str(StrChannel::Variable, "svc1", Span::default())
            .unwrap()
            .unwrap();
        assert_eq!(variable.id, TokenId::Identifier);
        assert_eq!(variable.as_str(), Some("svc1"));
    }

    #[test]
    fn test_structural_names() {
        let mut adapter = TokenAdapter::default();
        let open = adapter.emit_int("BLOCK_OPEN", 4, Span::default()).unwrap().unwrap();
        assert_eq!((open.id, open.level()), (TokenId::BlockOpen, Some(4)));
        let eof = adapter.emit_int("EOF", 0, Span::default()).unwrap().unwrap();
        assert_eq!(eof.id, TokenId::Eof);
        let err = adapter.emit_int("BLK", 0, Span::default()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TokenTable);
        let err = adapter.emit_int("GET", 0, Span::default()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TokenTable);
    }

    #[test]
    fn test_object_channel_injects_context() {
        let mut adapter = TokenAdapter::default();
        let ctx = Arc::new(DslContext::new().with_default_option("mode", "rest_api"));
        let token = adapter
            .emit_obj("CTX", Arc::clone(&ctx), Span::default())
            .unwrap()
            .unwrap();
        assert_eq!(token.id, TokenId::Ctx);
        assert!(matches!(token.value, TokenValue::Context(ref c) if Arc::ptr_eq(c, &ctx)));
        assert!(adapter.emit_obj("ROOT", ctx, Span::default()).is_err());
    }
}
