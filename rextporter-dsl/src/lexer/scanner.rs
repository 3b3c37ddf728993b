//! Scanner
//!
//! Runs every pattern of a [`PatternSet`] in parallel over the input and
//! emits one [`Frame`] per maximal match. Among the patterns alive at the
//! longest match, the one declared first wins. When nothing matches, one
//! symbol is dropped and scanning restarts at the next position.
//!
//! The scanner is a plain iterator. [`Scanner::spawn`] moves it onto a
//! producer thread that hands frames over one at a time.

use super::pattern::{Dfa, PatternSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One lexical match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Winning pattern, `None` for the end-of-stream sentinel.
    pub pattern: Option<usize>,
    pub text: String,
    /// Byte offset of the match in the input.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Frame {
    pub fn is_end(&self) -> bool {
        self.pattern.is_none()
    }
}

/// Pull-based multi-DFA scanner over an owned input.
pub struct Scanner {
    patterns: Arc<PatternSet>,
    input: Vec<char>,
    pos: usize,
    offset: usize,
    line: usize,
    column: usize,
    started: bool,
    finished: bool,
}

impl Scanner {
    pub fn new(patterns: Arc<PatternSet>, source: &str) -> Self {
        Self {
            patterns,
            input: source.chars().collect(),
            pos: 0,
            offset: 0,
            line: 1,
            column: 1,
            started: false,
            finished: false,
        }
    }

    fn advance(&mut self, count: usize) {
        for &c in &self.input[self.pos..self.pos + count] {
            self.offset += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += count;
    }

    /// Longest non-empty match at the current position as
    /// `(pattern index, length in chars)`.
    fn longest_match(&self) -> Option<(usize, usize)> {
        let dfas: Vec<&Dfa> = self.patterns.iter().map(|p| p.dfa()).collect();
        let mut states: Vec<Option<usize>> = vec![Some(Dfa::START); dfas.len()];

        // `^` holds only before the first symbol of the input
        if !self.started {
            for (state, dfa) in states.iter_mut().zip(&dfas) {
                if let Some(next) = dfa.start_transition(Dfa::START) {
                    *state = Some(next);
                }
            }
        }

        let mut best: Option<(usize, usize)> = None;
        let mut consider = |index: usize, length: usize| {
            let better = match best {
                None => true,
                Some((best_index, best_length)) => {
                    length > best_length || (length == best_length && index < best_index)
                }
            };
            if length > 0 && better {
                best = Some((index, length));
            }
        };

        let mut length = 0;
        loop {
            let Some(&symbol) = self.input.get(self.pos + length) else {
                for (index, (state, dfa)) in states.iter().zip(&dfas).enumerate() {
                    if let Some(end) = state.and_then(|s| dfa.end_transition(s)) {
                        if dfa.is_accepting(end) {
                            consider(index, length);
                        }
                    }
                }
                break;
            };
            length += 1;

            let mut alive = false;
            for (index, (state, dfa)) in states.iter_mut().zip(&dfas).enumerate() {
                *state = state.and_then(|s| dfa.next_state(s, symbol));
                if let Some(next) = *state {
                    alive = true;
                    if dfa.is_accepting(next) {
                        consider(index, length);
                    }
                }
            }
            if !alive {
                break;
            }
        }
        best
    }

    /// Move onto a producer thread with a rendezvous handoff.
    pub fn spawn(self) -> ScanHandle {
        let (sender, receiver) = mpsc::sync_channel(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let worker = thread::spawn(move || {
            for frame in self {
                if flag.load(Ordering::Acquire) || sender.send(frame).is_err() {
                    tracing::trace!("scanner producer stopped early");
                    return;
                }
            }
        });
        ScanHandle {
            receiver: Some(receiver),
            cancelled,
            worker: Some(worker),
        }
    }
}

impl Iterator for Scanner {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if self.finished {
                return None;
            }
            if self.pos >= self.input.len() {
                self.finished = true;
                return Some(Frame {
                    pattern: None,
                    text: String::new(),
                    offset: self.offset,
                    line: self.line,
                    column: self.column,
                });
            }

            let matched = self.longest_match();
            self.started = true;
            match matched {
                Some((pattern, length)) => {
                    let text: String = self.input[self.pos..self.pos + length].iter().collect();
                    let frame = Frame {
                        pattern: Some(pattern),
                        text,
                        offset: self.offset,
                        line: self.line,
                        column: self.column,
                    };
                    self.advance(length);
                    tracing::trace!(
                        pattern,
                        line = frame.line,
                        column = frame.column,
                        text = %frame.text.escape_debug(),
                        "frame"
                    );
                    return Some(frame);
                }
                None => {
                    tracing::debug!(
                        line = self.line,
                        column = self.column,
                        symbol = %self.input[self.pos].escape_debug(),
                        "dropping unmatched symbol"
                    );
                    self.advance(1);
                }
            }
        }
    }
}

/// Consumer side of a scanner running on its own thread.
///
/// The producer is never more than one frame ahead. Dropping the handle
/// cancels the producer and waits for it to exit.
pub struct ScanHandle {
    receiver: Option<Receiver<Frame>>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Ask the producer to stop. No frame is delivered afterwards.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // unblocks a producer waiting in `send`
        self.receiver = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Iterator for ScanHandle {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("scanner producer panicked");
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::pattern::Pattern;
    use proptest::prelude::*;

    fn set(sources: &[&str]) -> Arc<PatternSet> {
        Arc::new(PatternSet::compile(sources.iter().copied()).unwrap())
    }

    fn scan(sources: &[&str], input: &str) -> Vec<(Option<usize>, String)> {
        Scanner::new(set(sources), input)
            .map(|f| (f.pattern, f.text))
            .collect()
    }

    #[test]
    fn test_longest_match_wins() {
        let frames = scan(&["get", "[a-z]+", " "], "getter get");
        assert_eq!(
            frames,
            vec![
                (Some(1), "getter".to_string()),
                (Some(2), " ".to_string()),
                (Some(0), "get".to_string()),
                (None, String::new()),
            ]
        );
    }

    #[test]
    fn test_equal_length_prefers_earlier_pattern() {
        let frames = scan(&["[a-z]+", "get"], "get");
        assert_eq!(frames[0], (Some(0), "get".to_string()));
        let frames = scan(&["get", "[a-z]+"], "get");
        assert_eq!(frames[0], (Some(0), "get".to_string()));
    }

    #[test]
    fn test_unmatched_symbols_are_dropped() {
        let frames = scan(&["[a-z]+"], "ab!!cd");
        assert_eq!(
            frames,
            vec![
                (Some(0), "ab".to_string()),
                (Some(0), "cd".to_string()),
                (None, String::new()),
            ]
        );
    }

    #[test]
    fn test_sentinel_terminates_stream() {
        let mut scanner = Scanner::new(set(&["a"]), "");
        let end = scanner.next().unwrap();
        assert!(end.is_end());
        assert_eq!(scanner.next(), None);
        assert_eq!(scanner.next(), None);
    }

    #[test]
    fn test_positions_track_lines_and_bytes() {
        let frames: Vec<Frame> = Scanner::new(set(&["[a-zé]+", "\n", " +"]), "ab\n  é").collect();
        let last_word = &frames[3];
        assert_eq!(last_word.text, "é");
        assert_eq!((last_word.line, last_word.column), (2, 3));
        assert_eq!(last_word.offset, 5);
        let end = frames.last().unwrap();
        assert_eq!(end.offset, 7);
        assert_eq!((end.line, end.column), (2, 4));
    }

    #[test]
    fn test_start_anchor_only_at_input_start() {
        let frames = scan(&["^a", "a"], "aa");
        assert_eq!(frames[0], (Some(0), "a".to_string()));
        assert_eq!(frames[1], (Some(1), "a".to_string()));
    }

    #[test]
    fn test_end_anchor_only_at_input_end() {
        let frames = scan(&["b$", "[a-z]"], "bb");
        assert_eq!(frames[0], (Some(1), "b".to_string()));
        assert_eq!(frames[1], (Some(0), "b".to_string()));
    }

    #[test]
    fn test_zero_length_matches_are_ignored() {
        let frames = scan(&["x*", "y"], "yy");
        assert_eq!(
            frames,
            vec![
                (Some(1), "y".to_string()),
                (Some(1), "y".to_string()),
                (None, String::new()),
            ]
        );
    }

    #[test]
    fn test_spawned_scanner_yields_same_frames() {
        let patterns = set(&["[a-z]+", " +"]);
        let direct: Vec<Frame> = Scanner::new(Arc::clone(&patterns), "one two three").collect();
        let threaded: Vec<Frame> = Scanner::new(patterns, "one two three").spawn().collect();
        assert_eq!(direct, threaded);
    }

    #[test]
    fn test_cancel_stops_producer() {
        let mut handle = Scanner::new(set(&["[a-z]", " "]), "a b c d e f g").spawn();
        assert_eq!(handle.next().unwrap().text, "a");
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.next(), None);
        drop(handle);
    }

    #[test]
    fn test_dropping_handle_joins_producer() {
        let long_input = "word ".repeat(1000);
        let mut handle = Scanner::new(set(&["[a-z]+", " "]), &long_input).spawn();
        assert!(handle.next().is_some());
        drop(handle);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Frames never overlap and, apart from dropped symbols, cover the input in order.
        #[test]
        fn prop_frames_are_ordered_and_disjoint(input in "[a-c ]{0,40}") {
            let patterns = Arc::new(PatternSet::new(vec![
                Pattern::new("ab").unwrap(),
                Pattern::new("[a-c]+").unwrap(),
                Pattern::new(" ").unwrap(),
            ]));
            let frames: Vec<Frame> = Scanner::new(patterns, &input).collect();
            let mut cursor = 0;
            for frame in &frames {
                prop_assert!(frame.offset >= cursor);
                prop_assert_eq!(&input[frame.offset..frame.offset + frame.text.len()], frame.text.as_str());
                cursor = frame.offset + frame.text.len();
            }
            prop_assert!(frames.last().is_some_and(Frame::is_end));
            prop_assert_eq!(cursor, input.len());
        }

        /// Scanning is deterministic.
        #[test]
        fn prop_scanning_is_deterministic(input in "[a-z ]{0,30}") {
            let patterns = set(&["get|post", "[a-z]+", " +"]);
            let first: Vec<Frame> = Scanner::new(Arc::clone(&patterns), &input).collect();
            let second: Vec<Frame> = Scanner::new(patterns, &input).collect();
            prop_assert_eq!(first, second);
        }
    }
}
