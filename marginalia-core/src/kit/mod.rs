//! Generic building blocks shared by the compiler front end

pub mod lexer;
