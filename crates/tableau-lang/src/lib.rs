pub mod lexer;
pub mod parser;
pub mod writer;

pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use writer::write_model;
