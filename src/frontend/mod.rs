//! Frontend module - text stream, lexer, AST and parser

pub mod stream;
pub mod token;
pub mod lexer;
pub mod ast;
pub mod factory;
pub mod parser;
