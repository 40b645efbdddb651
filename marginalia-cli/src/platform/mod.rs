//! Terminal presentation

mod cli;

pub use cli::{print_load_error, print_source_context};
