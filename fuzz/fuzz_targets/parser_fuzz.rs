//! Fuzz target for the RXT parser
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rextporter_dsl::{parse, tokenize, DslError, Parser};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        match parse(input) {
            Ok(config) => {
                assert!(config.validate().is_ok());
            }
            Err(DslError::Parse(err)) => {
                assert!(err.line >= 1);
                assert!(err.column >= 1);
                assert!(!err.message.is_empty());
            }
            Err(_) => {}
        }

        // The parser must survive any token stream the lexer produces
        if let Ok(tokens) = tokenize(input) {
            let _ = Parser::new(tokens).parse();
        }
    }
});
