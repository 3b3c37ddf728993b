//! Lexer module for the RXT DSL

pub mod driver;
pub mod indent;
pub mod pattern;
pub mod rules;
pub mod scanner;
pub mod token;

pub use driver::*;
pub use indent::{IndentTracker, StructuralToken};
pub use pattern::{Dfa, Pattern, PatternSet};
pub use rules::{compile_rules, rxt_patterns, Action, Rule, RXT_RULES};
pub use scanner::{Frame, ScanHandle, Scanner};
pub use token::*;
