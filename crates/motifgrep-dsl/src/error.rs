use thiserror::Error;

/// Everything that can go wrong between motif source text and a valid IR.
///
/// Compilation reports one error at a time, raised at the point of
/// detection; a failed compile produces no IR.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error at line {line}, column {column}: {message}\n  | {snippet}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
        /// The offending source line, verbatim.
        snippet: String,
    },

    #[error("macro '{0}' is not defined")]
    UndefinedMacro(String),

    #[error("macro '{name}' takes {expected} argument(s) but was called with {got}")]
    MacroArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("recursive macro invocation: {cycle}")]
    MacroRecursion { cycle: String },

    #[error("'{0}' is neither a node nor a named edge in this motif")]
    UnresolvedIdentifier(String),

    #[error("edge {u} -> {v} is declared both to exist and to not exist")]
    EdgeDisagreement { u: String, v: String },

    #[error("unsatisfiable constraints on {entity}.{attr}: {detail}")]
    ConstraintCollision {
        entity: String,
        attr: String,
        detail: String,
    },
}
