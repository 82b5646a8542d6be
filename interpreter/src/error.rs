use stencil::BodyAborted;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("syntax error at column {}: {message}", .offset + 1)]
    Syntax { message: String, offset: usize },
    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),
    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },
    #[error("{name}() takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("'{type_name}' has no method '{method}'")]
    UnknownMethod { type_name: String, method: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    #[error("key '{0}' not found")]
    KeyNotFound(String),
    #[error("cannot unpack {got} value(s) into {expected} target(s)")]
    Unpack { expected: usize, got: usize },
    #[error("format error: {0}")]
    Format(String),
    #[error("unsupported compound statement: {0}")]
    UnsupportedCompound(String),
    #[error("integer {0} out of range")]
    IntegerOverflow(String),
    #[error("{what} would produce more than {limit} items")]
    SizeLimit { what: String, limit: usize },
    #[error("loop exceeded {0} iterations")]
    IterationLimit(usize),
    #[error("stack overflow")]
    StackOverflow,
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("{0}")]
    Custom(String),
    #[error(transparent)]
    BodyAborted(#[from] BodyAborted),
}

impl RuntimeError {
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        RuntimeError::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
