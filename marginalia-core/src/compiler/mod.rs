//! Front end: source text to syntax tree

pub mod parser;
