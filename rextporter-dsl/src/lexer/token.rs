//! Parser token types

use crate::context::DslContext;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// TOKEN IDS
// ============================================================================

/// Token identifiers consumed by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenId {
    // Keywords
    Get,
    Post,
    Counter,
    Gauge,
    Histogram,
    Summary,
    From,
    Help,
    Labels,
    Metric,
    Name,
    Set,
    Type,
    To,
    Description,
    WithOptions,
    As,
    DefineAuth,
    ExtractUsing,
    ForService,
    ForStack,
    Dataset,

    // Punctuation
    Comma,

    // Values
    StrLiteral,
    Identifier,

    // Structural
    BlockOpen,
    SameLevel,
    BlockClose,
    BadIndent,

    // Special
    Ctx,
    Eof,
}

impl TokenId {
    /// Canonical table name, e.g. `FOR_SERVICE`.
    pub fn name(&self) -> &'static str {
        match self {
            TokenId::Get => "GET",
            TokenId::Post => "POST",
            TokenId::Counter => "COUNTER",
            TokenId::Gauge => "GAUGE",
            TokenId::Histogram => "HISTOGRAM",
            TokenId::Summary => "SUMMARY",
            TokenId::From => "FROM",
            TokenId::Help => "HELP",
            TokenId::Labels => "LABELS",
            TokenId::Metric => "METRIC",
            TokenId::Name => "NAME",
            TokenId::Set => "SET",
            TokenId::Type => "TYPE",
            TokenId::To => "TO",
            TokenId::Description => "DESCRIPTION",
            TokenId::WithOptions => "WITH_OPTIONS",
            TokenId::As => "AS",
            TokenId::DefineAuth => "DEFINE_AUTH",
            TokenId::ExtractUsing => "EXTRACT_USING",
            TokenId::ForService => "FOR_SERVICE",
            TokenId::ForStack => "FOR_STACK",
            TokenId::Dataset => "DATASET",
            TokenId::Comma => "COMMA",
            TokenId::StrLiteral => "STR_LITERAL",
            TokenId::Identifier => "IDENTIFIER",
            TokenId::BlockOpen => "BLOCK_OPEN",
            TokenId::SameLevel => "SAME_LEVEL",
            TokenId::BlockClose => "BLOCK_CLOSE",
            TokenId::BadIndent => "BAD_INDENT",
            TokenId::Ctx => "CTX",
            TokenId::Eof => "EOF",
        }
    }

    /// Tokens synthesized from whitespace or stream boundaries.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TokenId::BlockOpen
                | TokenId::SameLevel
                | TokenId::BlockClose
                | TokenId::BadIndent
                | TokenId::Ctx
                | TokenId::Eof
        )
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TOKENS
// ============================================================================

/// Source location span. Lines and columns start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// Semantic value carried by a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    /// Indentation level of a structural token.
    Level(usize),
    Str(String),
    Context(Arc<DslContext>),
}

/// A token with its id, value and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub id: TokenId,
    pub value: TokenValue,
    pub span: Span,
}

impl Token {
    pub fn new(id: TokenId, value: TokenValue, span: Span) -> Self {
        Self { id, value, span }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn level(&self) -> Option<usize> {
        match self.value {
            TokenValue::Level(level) => Some(level),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            TokenValue::None | TokenValue::Context(_) => write!(f, "{}", self.id),
            TokenValue::Level(level) => write!(f, "{}({})", self.id, level),
            TokenValue::Str(s) => write!(f, "{}({:?})", self.id, s),
        }
    }
}
