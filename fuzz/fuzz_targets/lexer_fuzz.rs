//! Fuzz target for the RXT scanner and lexer
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rextporter_dsl::lexer::rxt_patterns;
use rextporter_dsl::{tokenize, DslError, Scanner, TokenId};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let Ok(patterns) = rxt_patterns() else {
            return;
        };

        // Frames cover the input in order and end with the sentinel
        let frames: Vec<_> = Scanner::new(patterns, input).collect();
        assert!(frames.last().map_or(false, |f| f.is_end()));
        for pair in frames.windows(2) {
            assert!(pair[0].offset + pair[0].text.len() <= pair[1].offset);
        }

        match tokenize(input) {
            Ok(tokens) => {
                assert_eq!(tokens.first().map(|t| t.id), Some(TokenId::Ctx));
                assert_eq!(tokens.last().map(|t| t.id), Some(TokenId::Eof));
                for token in &tokens {
                    assert!(token.span.start <= token.span.end);
                    assert!(token.span.line >= 1);
                    assert!(token.span.column >= 1);
                }
            }
            Err(DslError::Parse(err)) => {
                assert!(err.line >= 1);
                assert!(err.column >= 1);
            }
            Err(other) => panic!("unexpected lexer failure: {}", other),
        }
    }
});
