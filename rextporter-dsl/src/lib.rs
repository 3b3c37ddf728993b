//! rextporter DSL - RXT configuration language front end
//!
//! RXT is an indentation-sensitive language describing which services,
//! resources and metrics an exporter scrapes. This crate turns RXT source
//! into the `rextporter-core` configuration tree.
//!
//! Architecture:
//! ```text
//! RXT Source (.rxt files)
//!     ↓
//! Scanner (multi-DFA maximal munch → frames)
//!     ↓
//! Lexer driver + IndentTracker (frames → emissions, BLOCK_OPEN/SAME_LEVEL/BLOCK_CLOSE)
//!     ↓
//! Token adapter (names → Token ids via KeywordTable)
//!     ↓
//! Parser (tokens → RootConfig)
//!     ↓
//! RootConfig::validate
//! ```

pub mod adapter;
pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;

pub use adapter::{KeywordTable, StrChannel, TokenAdapter, TokenHandler, TokenWriter};
pub use context::DslContext;
pub use error::{DslError, DslResult, ParseError, ParseErrorKind, PatternError};
pub use lexer::{Lexer, Scanner, Span, Token, TokenId, TokenValue};
pub use parser::Parser;

use lexer::rxt_patterns;
use rextporter_core::RootConfig;
use std::path::Path;
use std::sync::Arc;

/// Tokenize RXT source with an empty root context.
pub fn tokenize(source: &str) -> DslResult<Vec<Token>> {
    tokenize_with_context(source, Arc::new(DslContext::default()))
}

pub fn tokenize_with_context(source: &str, context: Arc<DslContext>) -> DslResult<Vec<Token>> {
    let scanner = Scanner::new(rxt_patterns()?, source);
    let tokens = Lexer::new(scanner, context).collect_all(&mut TokenAdapter::default())?;
    Ok(tokens)
}

/// Tokenize with the scanner running on its own thread.
///
/// Produces the same tokens as [`tokenize_with_context`]. A lexer failure
/// drops the handle, which stops the scanner thread.
pub fn tokenize_threaded(source: &str, context: Arc<DslContext>) -> DslResult<Vec<Token>> {
    let handle = Scanner::new(rxt_patterns()?, source).spawn();
    let tokens = Lexer::new(handle, context).collect_all(&mut TokenAdapter::default())?;
    Ok(tokens)
}

/// Parse RXT source into a validated configuration tree.
pub fn parse(source: &str) -> DslResult<RootConfig> {
    parse_with_context(source, DslContext::default())
}

pub fn parse_with_context(source: &str, context: DslContext) -> DslResult<RootConfig> {
    let tokens = tokenize_with_context(source, Arc::new(context))?;
    let config = Parser::new(tokens).parse()?;
    config.validate()?;
    tracing::info!(
        services = config.services.len(),
        dataset = config.dataset,
        "RXT configuration loaded"
    );
    Ok(config)
}

/// Read and parse an RXT file.
pub fn parse_file(path: impl AsRef<Path>) -> DslResult<RootConfig> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| DslError::Read {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "RXT source read");
    parse(&source)
}
