//! Pattern engine
//!
//! Pattern sources use a small regular expression dialect: literals, escapes
//! (`\n \t \r \0` and escaped metacharacters), `.`, bracket classes with ranges
//! and negation, grouping, alternation, the `* + ?` quantifiers and the `^`/`$`
//! anchors. A source is parsed into a syntax tree, compiled into a Thompson NFA
//! and determinized by subset construction into a [`Dfa`] whose transitions
//! are sorted, disjoint symbol ranges.
//!
//! `^` only holds at the very start of the scanned input and `$` only at its
//! end, so both are kept as dedicated DFA transitions instead of symbols.

use crate::error::PatternError;
use std::collections::{BTreeSet, HashMap, VecDeque};

const MAX_SYMBOL: u32 = char::MAX as u32;

/// Inclusive range of code points.
type SymbolRange = (u32, u32);

// ============================================================================
// SYNTAX TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Empty,
    Class(Vec<SymbolRange>),
    StartAnchor,
    EndAnchor,
    Concat(Vec<Node>),
    Alternate(Vec<Node>),
    Star(Box<Node>),
    Plus(Box<Node>),
    Optional(Box<Node>),
}

struct SyntaxParser {
    chars: Vec<char>,
    pos: usize,
    case_insensitive: bool,
}

impl SyntaxParser {
    fn new(source: &str, case_insensitive: bool) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            case_insensitive,
        }
    }

    fn parse(mut self) -> Result<Node, PatternError> {
        if self.chars.is_empty() {
            return Err(PatternError::new(0, "empty pattern"));
        }
        let node = self.parse_alternation()?;
        if let Some(c) = self.peek() {
            return Err(PatternError::new(self.pos, format!("unmatched '{}'", c)));
        }
        Ok(node)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn parse_alternation(&mut self) -> Result<Node, PatternError> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            branches.push(self.parse_concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.swap_remove(0)
        } else {
            Node::Alternate(branches)
        })
    }

    fn parse_concat(&mut self) -> Result<Node, PatternError> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_atom()?;
            items.push(self.parse_repeat(atom));
        }
        Ok(match items.len() {
            0 => Node::Empty,
            1 => items.swap_remove(0),
            _ => Node::Concat(items),
        })
    }

    fn parse_repeat(&mut self, mut atom: Node) -> Node {
        while let Some(c) = self.peek() {
            atom = match c {
                '*' => Node::Star(Box::new(atom)),
                '+' => Node::Plus(Box::new(atom)),
                '?' => Node::Optional(Box::new(atom)),
                _ => break,
            };
            self.pos += 1;
        }
        atom
    }

    fn parse_atom(&mut self) -> Result<Node, PatternError> {
        let start = self.pos;
        let c = self
            .bump()
            .ok_or_else(|| PatternError::new(start, "unexpected end of pattern"))?;
        match c {
            '(' => {
                let inner = self.parse_alternation()?;
                if self.bump() != Some(')') {
                    return Err(PatternError::new(start, "unclosed group '('"));
                }
                Ok(inner)
            }
            '[' => self.parse_class(start),
            '.' => Ok(Node::Class(vec![(0, 0x09), (0x0B, MAX_SYMBOL)])),
            '^' => Ok(Node::StartAnchor),
            '$' => Ok(Node::EndAnchor),
            '*' | '+' | '?' => Err(PatternError::new(
                start,
                format!("nothing to repeat before '{}'", c),
            )),
            '\\' => {
                let c = self.parse_escape(start)?;
                Ok(self.literal(c))
            }
            c => Ok(self.literal(c)),
        }
    }

    fn parse_escape(&mut self, start: usize) -> Result<char, PatternError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some(c) if !c.is_ascii_alphanumeric() => Ok(c),
            Some(c) => Err(PatternError::new(
                start,
                format!("unknown escape '\\{}'", c),
            )),
            None => Err(PatternError::new(start, "dangling escape '\\'")),
        }
    }

    fn parse_class_char(&mut self, start: usize) -> Result<char, PatternError> {
        let at = self.pos;
        match self.bump() {
            Some('\\') => self.parse_escape(at),
            Some(c) => Ok(c),
            None => Err(PatternError::new(start, "unclosed character class")),
        }
    }

    fn parse_class(&mut self, start: usize) -> Result<Node, PatternError> {
        let negated = self.peek() == Some('^');
        if negated {
            self.pos += 1;
        }
        let mut ranges = Vec::new();
        let mut first = true;
        loop {
            // `]` right after the opening bracket is a literal
            if self.peek() == Some(']') && !first {
                self.pos += 1;
                break;
            }
            first = false;
            let lo = self.parse_class_char(start)?;
            let hi = if self.peek() == Some('-') && self.peek_at(1).is_some_and(|c| c != ']') {
                self.pos += 1;
                self.parse_class_char(start)?
            } else {
                lo
            };
            if hi < lo {
                return Err(PatternError::new(
                    self.pos,
                    format!("invalid range '{}-{}'", lo, hi),
                ));
            }
            ranges.push((lo as u32, hi as u32));
        }
        if self.case_insensitive {
            ranges = fold_case(ranges);
        }
        let ranges = normalize(ranges);
        Ok(Node::Class(if negated {
            complement(&ranges)
        } else {
            ranges
        }))
    }

    fn literal(&self, c: char) -> Node {
        let range = (c as u32, c as u32);
        if self.case_insensitive && c.is_ascii_alphabetic() {
            Node::Class(normalize(fold_case(vec![range])))
        } else {
            Node::Class(vec![range])
        }
    }
}

/// Add the other ASCII case of every letter in `ranges`.
fn fold_case(mut ranges: Vec<SymbolRange>) -> Vec<SymbolRange> {
    let mut extra = Vec::new();
    for &(lo, hi) in &ranges {
        for (from, to) in [('a', 'A'), ('A', 'a')] {
            let (letter_lo, letter_hi) = (from as u32, from as u32 + 25);
            let lo = lo.max(letter_lo);
            let hi = hi.min(letter_hi);
            if lo <= hi {
                let shift = |c: u32| c - letter_lo + to as u32;
                extra.push((shift(lo), shift(hi)));
            }
        }
    }
    ranges.extend(extra);
    ranges
}

/// Sort and merge overlapping or adjacent ranges.
fn normalize(mut ranges: Vec<SymbolRange>) -> Vec<SymbolRange> {
    ranges.sort_unstable();
    let mut merged: Vec<SymbolRange> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Complement of normalized ranges over the whole symbol space.
fn complement(ranges: &[SymbolRange]) -> Vec<SymbolRange> {
    let mut result = Vec::new();
    let mut next = 0u32;
    for &(lo, hi) in ranges {
        if lo > next {
            result.push((next, lo - 1));
        }
        next = hi.saturating_add(1);
    }
    if next <= MAX_SYMBOL {
        result.push((next, MAX_SYMBOL));
    }
    result
}

// ============================================================================
// NFA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Epsilon,
    Symbols(u32, u32),
    StartOfInput,
    EndOfInput,
}

#[derive(Debug, Default)]
struct Nfa {
    edges: Vec<Vec<(Edge, usize)>>,
}

impl Nfa {
    fn add_state(&mut self) -> usize {
        self.edges.push(Vec::new());
        self.edges.len() - 1
    }

    fn connect(&mut self, from: usize, edge: Edge, to: usize) {
        self.edges[from].push((edge, to));
    }

    /// Compile `node` into a fragment, returning its start and accept states.
    fn compile(&mut self, node: &Node) -> (usize, usize) {
        match node {
            Node::Empty => {
                let s = self.add_state();
                (s, s)
            }
            Node::Class(ranges) => {
                let (s, a) = (self.add_state(), self.add_state());
                for &(lo, hi) in ranges {
                    self.connect(s, Edge::Symbols(lo, hi), a);
                }
                (s, a)
            }
            Node::StartAnchor | Node::EndAnchor => {
                let (s, a) = (self.add_state(), self.add_state());
                let edge = if matches!(node, Node::StartAnchor) {
                    Edge::StartOfInput
                } else {
                    Edge::EndOfInput
                };
                self.connect(s, edge, a);
                (s, a)
            }
            Node::Concat(items) => {
                let mut fragment: Option<(usize, usize)> = None;
                for item in items {
                    let (is, ia) = self.compile(item);
                    fragment = Some(match fragment {
                        Some((s, a)) => {
                            self.connect(a, Edge::Epsilon, is);
                            (s, ia)
                        }
                        None => (is, ia),
                    });
                }
                fragment.unwrap_or_else(|| {
                    let s = self.add_state();
                    (s, s)
                })
            }
            Node::Alternate(branches) => {
                let (s, a) = (self.add_state(), self.add_state());
                for branch in branches {
                    let (bs, ba) = self.compile(branch);
                    self.connect(s, Edge::Epsilon, bs);
                    self.connect(ba, Edge::Epsilon, a);
                }
                (s, a)
            }
            Node::Star(inner) | Node::Plus(inner) | Node::Optional(inner) => {
                let (s, a) = (self.add_state(), self.add_state());
                let (is, ia) = self.compile(inner);
                self.connect(s, Edge::Epsilon, is);
                self.connect(ia, Edge::Epsilon, a);
                if !matches!(node, Node::Plus(_)) {
                    self.connect(s, Edge::Epsilon, a);
                }
                if !matches!(node, Node::Optional(_)) {
                    self.connect(ia, Edge::Epsilon, is);
                }
                (s, a)
            }
        }
    }

    fn closure(&self, seeds: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        let mut stack: Vec<usize> = seeds.into_iter().collect();
        while let Some(state) = stack.pop() {
            if set.insert(state) {
                stack.extend(
                    self.edges[state]
                        .iter()
                        .filter(|(edge, _)| *edge == Edge::Epsilon)
                        .map(|&(_, to)| to),
                );
            }
        }
        set
    }

    /// `set` extended with everything reachable through `anchor` edges,
    /// followed until nothing new is added.
    fn anchor_closure(&self, set: &BTreeSet<usize>, anchor: Edge) -> BTreeSet<usize> {
        let mut current = set.clone();
        loop {
            let targets: Vec<usize> = current
                .iter()
                .flat_map(|&s| self.edges[s].iter())
                .filter(|(edge, _)| *edge == anchor)
                .map(|&(_, to)| to)
                .collect();
            let next = self.closure(current.iter().copied().chain(targets));
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

// ============================================================================
// DFA
// ============================================================================

#[derive(Debug, Clone, Default)]
struct DfaState {
    accepting: bool,
    /// Sorted, disjoint `(lo, hi, target)` ranges.
    transitions: Vec<(u32, u32, usize)>,
    start_transition: Option<usize>,
    end_transition: Option<usize>,
}

/// Deterministic automaton for one pattern. State 0 is the start state.
#[derive(Debug, Clone)]
pub struct Dfa {
    states: Vec<DfaState>,
}

impl Dfa {
    pub const START: usize = 0;

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_accepting(&self, state: usize) -> bool {
        self.states.get(state).is_some_and(|s| s.accepting)
    }

    /// Transition on `symbol`, or `None` when the pattern dies.
    pub fn next_state(&self, state: usize, symbol: char) -> Option<usize> {
        let symbol = symbol as u32;
        let transitions = &self.states.get(state)?.transitions;
        transitions
            .binary_search_by(|&(lo, hi, _)| {
                if hi < symbol {
                    std::cmp::Ordering::Less
                } else if lo > symbol {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|i| transitions[i].2)
    }

    /// State reached by taking every `^` available from `state`.
    pub fn start_transition(&self, state: usize) -> Option<usize> {
        self.states.get(state)?.start_transition
    }

    /// State reached by taking every `$` available from `state`.
    pub fn end_transition(&self, state: usize) -> Option<usize> {
        self.states.get(state)?.end_transition
    }

    #[cfg(test)]
    fn transitions(&self, state: usize) -> &[(u32, u32, usize)] {
        self.states
            .get(state)
            .map_or(&[][..], |s| s.transitions.as_slice())
    }
}

struct Determinizer<'a> {
    nfa: &'a Nfa,
    accept: usize,
    ids: HashMap<BTreeSet<usize>, usize>,
    sets: Vec<BTreeSet<usize>>,
    states: Vec<DfaState>,
    queue: VecDeque<usize>,
}

impl<'a> Determinizer<'a> {
    fn new(nfa: &'a Nfa, accept: usize) -> Self {
        Self {
            nfa,
            accept,
            ids: HashMap::new(),
            sets: Vec::new(),
            states: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    fn intern(&mut self, set: BTreeSet<usize>) -> usize {
        if let Some(&id) = self.ids.get(&set) {
            return id;
        }
        let id = self.sets.len();
        self.states.push(DfaState {
            accepting: set.contains(&self.accept),
            ..DfaState::default()
        });
        self.ids.insert(set.clone(), id);
        self.sets.push(set);
        self.queue.push_back(id);
        id
    }

    fn anchor_target(&mut self, id: usize, anchor: Edge) -> Option<usize> {
        let set = &self.sets[id];
        let extended = self.nfa.anchor_closure(set, anchor);
        if extended == *set {
            None
        } else {
            Some(self.intern(extended))
        }
    }

    fn run(mut self, start: usize) -> Dfa {
        let start_set = self.nfa.closure([start]);
        self.intern(start_set);

        while let Some(id) = self.queue.pop_front() {
            let set = self.sets[id].clone();
            let ranges: Vec<(u32, u32, usize)> = set
                .iter()
                .flat_map(|&s| self.nfa.edges[s].iter())
                .filter_map(|&(edge, to)| match edge {
                    Edge::Symbols(lo, hi) => Some((lo, hi, to)),
                    _ => None,
                })
                .collect();

            // Every range boundary starts a new elementary interval, so each
            // interval lies either fully inside or fully outside every range.
            let mut bounds: Vec<u32> = Vec::with_capacity(ranges.len() * 2);
            for &(lo, hi, _) in &ranges {
                bounds.push(lo);
                if hi < MAX_SYMBOL {
                    bounds.push(hi + 1);
                }
            }
            bounds.sort_unstable();
            bounds.dedup();

            let mut transitions: Vec<(u32, u32, usize)> = Vec::new();
            for (i, &lo) in bounds.iter().enumerate() {
                let hi = bounds.get(i + 1).map_or(MAX_SYMBOL, |next| next - 1);
                let targets: Vec<usize> = ranges
                    .iter()
                    .filter(|&&(rlo, rhi, _)| rlo <= lo && hi <= rhi)
                    .map(|&(_, _, to)| to)
                    .collect();
                if targets.is_empty() {
                    continue;
                }
                let target = self.intern(self.nfa.closure(targets));
                match transitions.last_mut() {
                    Some(last) if last.2 == target && last.1 + 1 == lo => last.1 = hi,
                    _ => transitions.push((lo, hi, target)),
                }
            }

            let start_transition = self.anchor_target(id, Edge::StartOfInput);
            let end_transition = self.anchor_target(id, Edge::EndOfInput);
            let state = &mut self.states[id];
            state.transitions = transitions;
            state.start_transition = start_transition;
            state.end_transition = end_transition;
        }

        Dfa {
            states: self.states,
        }
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

/// A compiled lexical pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    dfa: Dfa,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        Self::compile(source, false)
    }

    /// Compile `source` so that ASCII letters match either case.
    pub fn case_insensitive(source: &str) -> Result<Self, PatternError> {
        Self::compile(source, true)
    }

    fn compile(source: &str, case_insensitive: bool) -> Result<Self, PatternError> {
        let node = SyntaxParser::new(source, case_insensitive).parse()?;
        let mut nfa = Nfa::default();
        let (start, accept) = nfa.compile(&node);
        let dfa = Determinizer::new(&nfa, accept).run(start);
        Ok(Self {
            source: source.to_string(),
            case_insensitive,
            dfa,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// Length in chars of the longest prefix of `input` this pattern accepts,
    /// treating `input` as the whole scanned text.
    pub fn longest_prefix(&self, input: &str) -> Option<usize> {
        let dfa = &self.dfa;
        let mut state = Dfa::START;
        if let Some(next) = dfa.start_transition(state) {
            state = next;
        }
        let accepts_at = |state: usize, at_end: bool| {
            dfa.is_accepting(state)
                || (at_end && dfa.end_transition(state).is_some_and(|s| dfa.is_accepting(s)))
        };

        let total = input.chars().count();
        let mut best = accepts_at(state, total == 0).then_some(0);
        for (i, c) in input.chars().enumerate() {
            match dfa.next_state(state, c) {
                Some(next) => state = next,
                None => return best,
            }
            if accepts_at(state, i + 1 == total) {
                best = Some(i + 1);
            }
        }
        best
    }
}

/// An ordered list of patterns; order decides ties between equal-length
/// matches.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// Compile case-sensitive sources in order.
    pub fn compile<'a, I>(sources: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let patterns = sources
            .into_iter()
            .map(Pattern::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }
}

// =============================================================================
// TESTS
// =============================================================================
