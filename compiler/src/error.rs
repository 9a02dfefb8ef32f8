use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Lowering failures. All are local to the top-level unit being lowered;
/// the session discards the unit and continues.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unknown variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("unknown function `{name}` referenced")]
    UnknownFunction { name: String },

    #[error("function `{name}` expects {expected} argument(s) but {found} were passed")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("function `{name}` already has a body in this unit")]
    Redefinition { name: String },

    #[error("declaration of `{name}` does not match its earlier signature")]
    PrototypeMismatch { name: String },

    #[error("generated function `{name}` failed verification")]
    InvalidFunction { name: String },

    #[error("call to `{name}` produced no value")]
    VoidCall { name: String },

    #[error("no active insertion block")]
    MissingInsertBlock,

    #[error("llvm builder error: {0}")]
    Builder(#[from] inkwell::builder::BuilderError),
}

/// Failures in the execute half of the pipeline: engine assembly, module
/// attachment, and symbol lookup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to initialize native target: {0}")]
    TargetInit(String),

    #[error("failed to create JIT engine: {0}")]
    Engine(String),

    #[error("failed to attach module `{name}` to the JIT engine")]
    ModuleAttach { name: String },

    #[error("JIT symbol `{name}` not found: {detail}")]
    SymbolNotFound { name: String, detail: String },
}

/// Top-level error type for one pipeline call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Parse(Diagnostic),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Diagnostic> for Error {
    fn from(diag: Diagnostic) -> Self {
        Error::Parse(diag)
    }
}
