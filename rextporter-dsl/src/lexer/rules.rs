//! RXT lexical rules, in declaration order.

use super::pattern::{Pattern, PatternSet};
use crate::error::PatternError;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// What the lexer does with a frame matched by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    /// Emit the first character as punctuation.
    Punct,
    /// Feed the whitespace run to the indentation tracker.
    Indent,
    Keyword,
    /// Emit the text without its surrounding quotes.
    Literal,
    Variable,
    /// Abort with `UnexpectedInput`.
    Unexpected,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub source: &'static str,
    pub case_insensitive: bool,
    pub action: Action,
}

const KEYWORDS: &str = "with[ _]options|dataset|for[ _]service|for[ _]stack|define[ _]auth\
|as|set|to|get|post|from|extract[ _]using|metric|name|type|gauge|counter|histogram\
|summary|description|labels|help";

pub const RXT_RULES: &[Rule] = &[
    Rule {
        name: "comment",
        source: "#[^\\n]*",
        case_insensitive: false,
        action: Action::Skip,
    },
    Rule {
        name: "comma",
        source: ",[ \\t\\r\\n]*",
        case_insensitive: false,
        action: Action::Punct,
    },
    Rule {
        name: "indent",
        source: "\\n([ \\t\\r\\n]|#[^\\n]*\\n)*",
        case_insensitive: false,
        action: Action::Indent,
    },
    Rule {
        name: "blank",
        source: "[ \\t\\r]+",
        case_insensitive: false,
        action: Action::Skip,
    },
    Rule {
        name: "keyword",
        source: KEYWORDS,
        case_insensitive: true,
        action: Action::Keyword,
    },
    Rule {
        name: "dq-string",
        source: "\"[^\"]*\"",
        case_insensitive: false,
        action: Action::Literal,
    },
    Rule {
        name: "sq-string",
        source: "'[^']*'",
        case_insensitive: false,
        action: Action::Literal,
    },
    Rule {
        name: "identifier",
        source: "[a-z_][a-z0-9_]*",
        case_insensitive: false,
        action: Action::Variable,
    },
    Rule {
        name: "unexpected",
        source: ".",
        case_insensitive: false,
        action: Action::Unexpected,
    },
];

impl Rule {
    pub fn compile(&self) -> Result<Pattern, PatternError> {
        if self.case_insensitive {
            Pattern::case_insensitive(self.source)
        } else {
            Pattern::new(self.source)
        }
    }
}

/// Compile rules into a pattern set, keeping their order.
pub fn compile_rules(rules: &[Rule]) -> Result<PatternSet, PatternError> {
    let patterns = rules
        .iter()
        .map(Rule::compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PatternSet::new(patterns))
}

static RXT_PATTERNS: Lazy<Result<Arc<PatternSet>, PatternError>> =
    Lazy::new(|| compile_rules(RXT_RULES).map(Arc::new));

/// The compiled RXT pattern set, built on first use.
pub fn rxt_patterns() -> Result<Arc<PatternSet>, PatternError> {
    RXT_PATTERNS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scanner::Scanner;

    fn actions(source: &str) -> Vec<(Action, String)> {
        Scanner::new(rxt_patterns().unwrap(), source)
            .filter_map(|f| f.pattern.map(|p| (RXT_RULES[p].action, f.text)))
            .collect()
    }

    #[test]
    fn test_rules_compile() {
        let patterns = rxt_patterns().unwrap();
        assert_eq!(patterns.len(), RXT_RULES.len());
    }

    #[test]
    fn test_keyword_beats_identifier_on_tie() {
        assert_eq!(actions("get"), vec![(Action::Keyword, "get".to_string())]);
        assert_eq!(actions("GET"), vec![(Action::Keyword, "GET".to_string())]);
        assert_eq!(
            actions("getter"),
            vec![(Action::Variable, "getter".to_string())]
        );
    }

    #[test]
    fn test_multi_word_keywords() {
        assert_eq!(
            actions("FOR SERVICE"),
            vec![(Action::Keyword, "FOR SERVICE".to_string())]
        );
        assert_eq!(
            actions("extract_using"),
            vec![(Action::Keyword, "extract_using".to_string())]
        );
    }

    #[test]
    fn test_indent_absorbs_blank_and_comment_lines() {
        assert_eq!(
            actions("a\n\n  # note\n    b"),
            vec![
                (Action::Variable, "a".to_string()),
                (Action::Indent, "\n\n  # note\n    ".to_string()),
                (Action::Variable, "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_comma_absorbs_line_break() {
        assert_eq!(
            actions("a,\n  b"),
            vec![
                (Action::Variable, "a".to_string()),
                (Action::Punct, ",\n  ".to_string()),
                (Action::Variable, "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_strings_and_unexpected() {
        assert_eq!(
            actions("'/api/v1' \"x y\" Q"),
            vec![
                (Action::Literal, "'/api/v1'".to_string()),
                (Action::Skip, " ".to_string()),
                (Action::Literal, "\"x y\"".to_string()),
                (Action::Skip, " ".to_string()),
                (Action::Unexpected, "Q".to_string()),
            ]
        );
    }
}
