mod grammar;
mod lexer;
mod transform;

use crate::error::CompileError;
use crate::motif::{Motif, MotifOptions};
use crate::validate::Validator;

/// Compile motif source with explicit options and validators.
pub fn compile_with(
    source: &str,
    options: MotifOptions,
    validators: &[Box<dyn Validator>],
) -> Result<Motif, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let stmts = grammar::parse(tokens, source)?;
    transform::run(stmts, options, validators)
}
