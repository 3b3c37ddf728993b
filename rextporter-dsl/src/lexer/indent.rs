//! Indentation tracker
//!
//! Turns the whitespace run that follows a line break into structural tokens,
//! Python style. One tracker is owned by each lexer run.

use std::collections::VecDeque;

/// Block boundary synthesized from indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralToken {
    BlockOpen(usize),
    SameLevel(usize),
    BlockClose(usize),
    BadIndent(usize),
}

impl StructuralToken {
    /// Token table name.
    pub fn name(&self) -> &'static str {
        match self {
            StructuralToken::BlockOpen(_) => "BLOCK_OPEN",
            StructuralToken::SameLevel(_) => "SAME_LEVEL",
            StructuralToken::BlockClose(_) => "BLOCK_CLOSE",
            StructuralToken::BadIndent(_) => "BAD_INDENT",
        }
    }

    pub fn level(&self) -> usize {
        match *self {
            StructuralToken::BlockOpen(level)
            | StructuralToken::SameLevel(level)
            | StructuralToken::BlockClose(level)
            | StructuralToken::BadIndent(level) => level,
        }
    }
}

/// Indent level, stack of enclosing levels and the tokens not yet drained.
#[derive(Debug, Default)]
pub struct IndentTracker {
    level: usize,
    stack: Vec<usize>,
    pending: VecDeque<StructuralToken>,
}

impl IndentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of blocks currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Level announced by a whitespace run: the blanks after its last line
    /// break, or everything but the leading break when there is only one.
    fn level_of(whitespace: &str) -> usize {
        match whitespace.rfind('\n') {
            Some(idx) => whitespace[idx + 1..].chars().count(),
            None => whitespace.chars().count().saturating_sub(1),
        }
    }

    /// Queue the structural tokens for a whitespace run.
    pub fn indent(&mut self, whitespace: &str) {
        let new_level = Self::level_of(whitespace);
        if new_level > self.level {
            self.stack.push(self.level);
            self.level = new_level;
            self.pending.push_back(StructuralToken::BlockOpen(self.level));
        } else if new_level == self.level {
            self.pending.push_back(StructuralToken::SameLevel(self.level));
        } else {
            while new_level < self.level {
                let Some(outer) = self.stack.pop() else {
                    break;
                };
                self.pending.push_back(StructuralToken::BlockClose(self.level));
                self.level = outer;
            }
            if new_level == self.level {
                self.pending.push_back(StructuralToken::SameLevel(self.level));
            } else {
                self.pending.push_back(StructuralToken::BadIndent(self.level));
            }
        }
    }

    /// Close every open block at end of input.
    pub fn finish(&mut self) {
        while let Some(outer) = self.stack.pop() {
            self.pending.push_back(StructuralToken::BlockClose(self.level));
            self.level = outer;
        }
    }

    /// Next queued token, oldest first.
    pub fn next_pending(&mut self) -> Option<StructuralToken> {
        self.pending.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
