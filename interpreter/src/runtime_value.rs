use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::builtins::Builtin;
use crate::error::RuntimeError;

type NativeCall = dyn Fn(&[RuntimeValue]) -> Result<RuntimeValue, RuntimeError> + Send + Sync;

/// A function supplied by the host, callable from templates.
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    call: Arc<NativeCall>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        call: impl Fn(&[RuntimeValue]) -> Result<RuntimeValue, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            call: Arc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, arguments: &[RuntimeValue]) -> Result<RuntimeValue, RuntimeError> {
        (self.call)(arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Number(f64),
    Boolean(bool),
    String(String),
    None,
    List(Vec<RuntimeValue>),
    Tuple(Vec<RuntimeValue>),
    /// String-keyed mapping, iterated in key order.
    Dict(BTreeMap<String, RuntimeValue>),
    Builtin(Builtin),
    Function(NativeFunction),
}

impl RuntimeValue {
    pub fn function(
        name: impl Into<String>,
        call: impl Fn(&[RuntimeValue]) -> Result<RuntimeValue, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        RuntimeValue::Function(NativeFunction::new(name, call))
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_falsy(&self) -> bool {
        match self {
            RuntimeValue::Number(n) => *n == 0.0,
            RuntimeValue::Boolean(b) => !b,
            RuntimeValue::String(s) => s.is_empty(),
            RuntimeValue::None => true,
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => items.is_empty(),
            RuntimeValue::Dict(entries) => entries.is_empty(),
            RuntimeValue::Builtin(_) | RuntimeValue::Function(_) => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeValue::Number(_) => "number",
            RuntimeValue::Boolean(_) => "bool",
            RuntimeValue::String(_) => "str",
            RuntimeValue::None => "None",
            RuntimeValue::List(_) => "list",
            RuntimeValue::Tuple(_) => "tuple",
            RuntimeValue::Dict(_) => "dict",
            RuntimeValue::Builtin(_) | RuntimeValue::Function(_) => "function",
        }
    }

    /// Numeric view; booleans count as 0 and 1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuntimeValue::Number(n) => Some(*n),
            RuntimeValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Quoted rendering used inside containers.
    pub fn repr(&self) -> String {
        match self {
            RuntimeValue::String(s) => {
                format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            other => other.to_string(),
        }
    }

    /// Ordering for `<`, `>`, `min`, `max` and `sorted`.
    pub fn compare(&self, other: &RuntimeValue) -> Result<Ordering, RuntimeError> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a
                .partial_cmp(&b)
                .ok_or_else(|| RuntimeError::Custom("cannot order NaN".to_string()));
        }
        match (self, other) {
            (RuntimeValue::String(a), RuntimeValue::String(b)) => Ok(a.cmp(b)),
            (RuntimeValue::List(a), RuntimeValue::List(b))
            | (RuntimeValue::Tuple(a), RuntimeValue::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Ok(unequal),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(RuntimeError::type_error(
                "comparable values",
                format!("{} and {}", self.type_name(), other.type_name()),
            )),
        }
    }
}

fn write_sequence(
    f: &mut fmt::Formatter<'_>,
    items: &[RuntimeValue],
    open: &str,
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item.repr())?;
    }
    write!(f, "{}", close)
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            RuntimeValue::Boolean(true) => write!(f, "True"),
            RuntimeValue::Boolean(false) => write!(f, "False"),
            RuntimeValue::String(s) => write!(f, "{}", s),
            RuntimeValue::None => write!(f, "None"),
            RuntimeValue::List(items) => write_sequence(f, items, "[", "]"),
            RuntimeValue::Tuple(items) if items.len() == 1 => {
                write!(f, "({},)", items[0].repr())
            }
            RuntimeValue::Tuple(items) => write_sequence(f, items, "(", ")"),
            RuntimeValue::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", key, value.repr())?;
                }
                write!(f, "}}")
            }
            RuntimeValue::Builtin(builtin) => write!(f, "<built-in function {}>", builtin.name()),
            RuntimeValue::Function(function) => write!(f, "<function {}>", function.name()),
        }
    }
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b; // NaN != NaN per IEEE 754
        }
        match (self, other) {
            (RuntimeValue::String(a), RuntimeValue::String(b)) => a == b,
            (RuntimeValue::None, RuntimeValue::None) => true,
            (RuntimeValue::List(a), RuntimeValue::List(b)) => a == b,
            (RuntimeValue::Tuple(a), RuntimeValue::Tuple(b)) => a == b,
            (RuntimeValue::Dict(a), RuntimeValue::Dict(b)) => a == b,
            (RuntimeValue::Builtin(a), RuntimeValue::Builtin(b)) => a == b,
            (RuntimeValue::Function(a), RuntimeValue::Function(b)) => Arc::ptr_eq(&a.call, &b.call),
            _ => false,
        }
    }
}

impl From<f64> for RuntimeValue {
    fn from(n: f64) -> Self {
        RuntimeValue::Number(n)
    }
}

impl From<i64> for RuntimeValue {
    fn from(n: i64) -> Self {
        RuntimeValue::Number(n as f64)
    }
}

impl From<bool> for RuntimeValue {
    fn from(b: bool) -> Self {
        RuntimeValue::Boolean(b)
    }
}

impl From<&str> for RuntimeValue {
    fn from(s: &str) -> Self {
        RuntimeValue::String(s.to_string())
    }
}

impl From<String> for RuntimeValue {
    fn from(s: String) -> Self {
        RuntimeValue::String(s)
    }
}

impl<T: Into<RuntimeValue>> From<Vec<T>> for RuntimeValue {
    fn from(items: Vec<T>) -> Self {
        RuntimeValue::List(items.into_iter().map(Into::into).collect())
    }
}
