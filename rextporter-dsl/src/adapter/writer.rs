//! Token handler that prints the token stream.

use super::{KeywordTable, StrChannel, TokenAdapter, TokenHandler};
use crate::context::DslContext;
use crate::error::ParseError;
use crate::lexer::{Span, Token};
use std::io::{self, Write};
use std::sync::Arc;

/// Writes one `line:column<TAB>TOKEN` line per emitted token.
///
/// Never asks the lexer to stop, except after a failed write. The write
/// error is kept and returned by [`TokenWriter::into_inner`].
pub struct TokenWriter<'k, W: Write> {
    out: W,
    adapter: TokenAdapter<'k>,
    count: usize,
    failure: Option<io::Error>,
}

impl<'k, W: Write> TokenWriter<'k, W> {
    pub fn new(out: W, keywords: &'k KeywordTable) -> Self {
        Self {
            out,
            adapter: TokenAdapter::new(keywords),
            count: 0,
            failure: None,
        }
    }

    /// Tokens written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn into_inner(self) -> io::Result<W> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.out),
        }
    }

    fn write(&mut self, token: Option<Token>) -> Option<()> {
        let token = token?;
        let span = token.span;
        match writeln!(self.out, "{}:{}\t{}", span.line, span.column, token) {
            Ok(()) => {
                self.count += 1;
                None
            }
            Err(err) => {
                self.failure = Some(err);
                Some(())
            }
        }
    }
}

impl<W: Write> TokenHandler for TokenWriter<'_, W> {
    type Output = ();

    fn emit_int(&mut self, name: &str, level: usize, span: Span) -> Result<Option<()>, ParseError> {
        let token = self.adapter.emit_int(name, level, span)?;
        Ok(self.write(token))
    }

    fn emit_str(&mut self, channel: StrChannel, text: &str, span: Span) -> Result<Option<()>, ParseError> {
        let token = self.adapter.emit_str(channel, text, span)?;
        Ok(self.write(token))
    }

    fn emit_obj(
        &mut self,
        name: &str,
        value: Arc<DslContext>,
        span: Span,
    ) -> Result<Option<()>, ParseError> {
        let token = self.adapter.emit_obj(name, value, span)?;
        Ok(self.write(token))
    }

    fn error(&mut self, err: ParseError) -> ParseError {
        if writeln!(self.out, "{}:{}\tERROR {}", err.line, err.column, err.message).is_err() {
            tracing::warn!("can not write lexer error to output");
        }
        err
    }
}
