pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod session;
pub mod token;

pub use crate::ast::*;
pub use crate::diagnostics::{Diagnostic, Severity, Span};
pub use crate::error::Error;
pub use crate::parser::parse_source;
pub use crate::session::{Session, UnitOutcome};
