//! Static keyword table.

use crate::lexer::TokenId;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Maps normalized keyword, punctuation and structural names to token ids.
#[derive(Debug)]
pub struct KeywordTable {
    ids: HashMap<&'static str, TokenId>,
}

const ENTRIES: &[TokenId] = &[
    TokenId::Get,
    TokenId::Post,
    TokenId::Counter,
    TokenId::Gauge,
    TokenId::Histogram,
    TokenId::Summary,
    TokenId::From,
    TokenId::Help,
    TokenId::Labels,
    TokenId::Metric,
    TokenId::Name,
    TokenId::Set,
    TokenId::Type,
    TokenId::To,
    TokenId::Description,
    TokenId::WithOptions,
    TokenId::As,
    TokenId::DefineAuth,
    TokenId::ExtractUsing,
    TokenId::ForService,
    TokenId::ForStack,
    TokenId::Dataset,
    TokenId::BlockOpen,
    TokenId::SameLevel,
    TokenId::BlockClose,
    TokenId::BadIndent,
    TokenId::Ctx,
    TokenId::Eof,
];

static KEYWORDS: Lazy<KeywordTable> = Lazy::new(KeywordTable::new);

impl KeywordTable {
    fn new() -> Self {
        let mut ids: HashMap<&'static str, TokenId> =
            ENTRIES.iter().map(|id| (id.name(), *id)).collect();
        ids.insert(",", TokenId::Comma);
        Self { ids }
    }

    /// The process-wide table, built on first use.
    pub fn global() -> &'static KeywordTable {
        &KEYWORDS
    }

    /// Upper-case `text` and join multi-word keywords with `_`.
    pub fn normalize(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_ascii_uppercase()
    }

    pub fn lookup(&self, text: &str) -> Option<TokenId> {
        self.ids.get(Self::normalize(text).as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
