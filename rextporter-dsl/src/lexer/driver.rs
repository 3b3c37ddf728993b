//! Lexer driver
//!
//! Pulls frames from a scanner, routes whitespace runs through the
//! indentation tracker and hands everything else to a [`TokenHandler`].
//! Pending structural tokens are always delivered before the next frame is
//! read. A whitespace run is only measured once a real token follows it, so
//! trailing blank or comment lines at end of input never open or close
//! anything.

use super::indent::IndentTracker;
use super::rules::{Action, Rule, RXT_RULES};
use super::scanner::Frame;
use super::token::Span;
use crate::adapter::{StrChannel, TokenHandler};
use crate::context::DslContext;
use crate::error::{ParseError, ParseErrorKind};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Scanning,
    Closing,
    Done,
}

/// Lexer over a stream of RXT frames.
pub struct Lexer<I> {
    frames: I,
    context: Arc<DslContext>,
    rules: &'static [Rule],
    indent: IndentTracker,
    /// Whitespace run not yet handed to the tracker.
    run: Option<String>,
    /// Frame held back while the structural tokens in front of it drain.
    held: Option<Frame>,
    phase: Phase,
    span: Span,
}

impl<I: Iterator<Item = Frame>> Lexer<I> {
    pub fn new(frames: I, context: Arc<DslContext>) -> Self {
        Self::with_rules(frames, context, RXT_RULES)
    }

    /// Lexer whose frames come from patterns compiled out of `rules`.
    ///
    /// Pattern indices reported by the scanner are looked up in `rules`, so
    /// the table must be the one passed to
    /// [`compile_rules`](crate::lexer::compile_rules).
    pub fn with_rules(frames: I, context: Arc<DslContext>, rules: &'static [Rule]) -> Self {
        Self {
            frames,
            context,
            rules,
            indent: IndentTracker::new(),
            run: None,
            held: None,
            phase: Phase::Start,
            span: Span::default(),
        }
    }

    /// Emit tokens until the handler asks to stop or the stream ends.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    pub fn lex<H: TokenHandler>(&mut self, handler: &mut H) -> Result<Option<H::Output>, ParseError> {
        loop {
            while let Some(token) = self.indent.next_pending() {
                if let Some(out) = handler.emit_int(token.name(), token.level(), self.span)? {
                    return Ok(Some(out));
                }
            }

            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Scanning;
                    let ctx = Arc::clone(&self.context);
                    if let Some(out) = handler.emit_obj("CTX", ctx, Span::default())? {
                        return Ok(Some(out));
                    }
                }
                Phase::Scanning => {
                    if let Some(out) = self.step(handler)? {
                        return Ok(Some(out));
                    }
                }
                Phase::Closing => {
                    self.phase = Phase::Done;
                    if let Some(out) = handler.emit_int("EOF", 0, self.span)? {
                        return Ok(Some(out));
                    }
                }
                Phase::Done => return Ok(None),
            }
        }
    }

    /// Consume one frame.
    fn step<H: TokenHandler>(&mut self, handler: &mut H) -> Result<Option<H::Output>, ParseError> {
        let frame = match self.held.take().or_else(|| self.frames.next()) {
            Some(frame) if !frame.is_end() => frame,
            end => {
                if let Some(frame) = end {
                    self.span = frame_span(&frame);
                }
                if let Some(run) = self.run.take() {
                    tracing::trace!(len = run.len(), "whitespace run at end of input dropped");
                }
                self.indent.finish();
                self.phase = Phase::Closing;
                return Ok(None);
            }
        };
        self.span = frame_span(&frame);

        let rules = self.rules;
        let Some(rule) = frame.pattern.and_then(|p| rules.get(p)) else {
            let err = ParseError::new(
                ParseErrorKind::TokenTable,
                format!("no lexical rule for pattern {:?}", frame.pattern),
                self.span,
            );
            return Err(handler.error(err));
        };

        match rule.action {
            Action::Skip => return Ok(None),
            Action::Indent => {
                self.run.get_or_insert_with(String::new).push_str(&frame.text);
                return Ok(None);
            }
            _ => {}
        }

        if let Some(run) = self.run.take() {
            self.indent.indent(&run);
            if self.indent.has_pending() {
                self.held = Some(frame);
                return Ok(None);
            }
        }

        let text = frame.text.as_str();
        match rule.action {
            Action::Skip | Action::Indent => Ok(None),
            Action::Punct => handler.emit_str(StrChannel::Punct, &text[..1], self.span),
            Action::Keyword => handler.emit_str(StrChannel::Keyword, text, self.span),
            Action::Literal => {
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                handler.emit_str(StrChannel::Literal, inner, self.span)
            }
            Action::Variable => handler.emit_str(StrChannel::Variable, text, self.span),
            Action::Unexpected => {
                let err = ParseError::new(
                    ParseErrorKind::UnexpectedInput,
                    format!("unexpected input {:?}", text),
                    self.span,
                );
                Err(handler.error(err))
            }
        }
    }

    /// Drive the lexer to the end, collecting every handler output.
    pub fn collect_all<H: TokenHandler>(&mut self, handler: &mut H) -> Result<Vec<H::Output>, ParseError> {
        let mut outputs = Vec::new();
        while let Some(out) = self.lex(handler)? {
            outputs.push(out);
        }
        Ok(outputs)
    }
}

fn frame_span(frame: &Frame) -> Span {
    Span {
        start: frame.offset,
        end: frame.offset + frame.text.len(),
        line: frame.line,
        column: frame.column,
    }
}

// =============================================================================
// TESTS
// =============================================================================
