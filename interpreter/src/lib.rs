pub mod ast;
pub mod builtins;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod format;
pub mod lexer;
pub mod parser;
pub mod runtime_value;

pub use builtins::MAX_SEQUENCE_LEN;
pub use error::RuntimeError;
pub use executor::{Interpreter, MAX_ITERATIONS};
pub use runtime_value::{NativeFunction, RuntimeValue};
