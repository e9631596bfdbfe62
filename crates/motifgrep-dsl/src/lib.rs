mod error;
mod motif;
pub mod parse;
mod skeleton;
pub mod validate;
pub mod value;

pub use error::CompileError;
pub use motif::{ConstraintTable, DynEdgeTable, DynNodeTable, EdgeMatch, Motif, MotifOptions};
pub use parse::compile_with;
pub use skeleton::{Action, EdgeSpec, Skeleton};
pub use value::{Op, Value};

use validate::default_validators;

/// Compile motif source with default options and the stock validators.
pub fn compile(source: &str) -> Result<Motif, CompileError> {
    compile_with(source, MotifOptions::default(), &default_validators())
}

/// Compile motif source with the given options and the stock validators.
pub fn compile_with_options(
    source: &str,
    options: MotifOptions,
) -> Result<Motif, CompileError> {
    compile_with(source, options, &default_validators())
}
