//! Parser module for the RXT DSL

pub mod parser;

pub use parser::*;
