use std::cmp::Ordering;
use std::ops::RangeInclusive;

use crate::error::RuntimeError;
use crate::runtime_value::RuntimeValue;

/// Largest list or string a single operation may build.
pub const MAX_SEQUENCE_LEN: usize = 1_000_000;

/// Functions available to every template without being bound as globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Range,
    Len,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    Abs,
    Round,
    Min,
    Max,
    Sum,
    Sorted,
    Enumerate,
    Zip,
    List,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        Some(match name {
            "range" => Builtin::Range,
            "len" => Builtin::Len,
            "str" => Builtin::Str,
            "repr" => Builtin::Repr,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "bool" => Builtin::Bool,
            "abs" => Builtin::Abs,
            "round" => Builtin::Round,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "sum" => Builtin::Sum,
            "sorted" => Builtin::Sorted,
            "enumerate" => Builtin::Enumerate,
            "zip" => Builtin::Zip,
            "list" => Builtin::List,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Range => "range",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Repr => "repr",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Sorted => "sorted",
            Builtin::Enumerate => "enumerate",
            Builtin::Zip => "zip",
            Builtin::List => "list",
        }
    }

    pub fn call(self, args: &[RuntimeValue]) -> Result<RuntimeValue, RuntimeError> {
        let name = self.name();
        match self {
            Builtin::Range => {
                arity(name, args, 1..=3)?;
                let ints = args.iter().map(to_int).collect::<Result<Vec<_>, _>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => unreachable!("arity checked"),
                };
                if step == 0 {
                    return Err(RuntimeError::Custom("range() step must not be zero".to_string()));
                }
                let (start, stop, step) = (start as i128, stop as i128, step as i128);
                let span = if step > 0 { stop - start } else { start - stop };
                let count = if span > 0 { (span - 1) / step.abs() + 1 } else { 0 };
                if count > MAX_SEQUENCE_LEN as i128 {
                    return Err(size_limit(name));
                }
                Ok(RuntimeValue::List(
                    (0..count)
                        .map(|k| RuntimeValue::Number((start + k * step) as f64))
                        .collect(),
                ))
            }
            Builtin::Len => {
                arity(name, args, 1..=1)?;
                let len = match &args[0] {
                    RuntimeValue::String(s) => s.chars().count(),
                    RuntimeValue::List(items) | RuntimeValue::Tuple(items) => items.len(),
                    RuntimeValue::Dict(entries) => entries.len(),
                    other => return Err(RuntimeError::type_error("sized value", other.type_name())),
                };
                Ok(RuntimeValue::Number(len as f64))
            }
            Builtin::Str => {
                arity(name, args, 0..=1)?;
                Ok(RuntimeValue::String(
                    args.first().map(ToString::to_string).unwrap_or_default(),
                ))
            }
            Builtin::Repr => {
                arity(name, args, 1..=1)?;
                Ok(RuntimeValue::String(args[0].repr()))
            }
            Builtin::Int => {
                arity(name, args, 0..=1)?;
                let n = match args.first() {
                    None => 0.0,
                    Some(RuntimeValue::String(s)) => s.trim().parse::<i64>().map_err(|_| {
                        RuntimeError::Custom(format!("invalid literal for int(): '{}'", s))
                    })? as f64,
                    Some(other) => other
                        .as_number()
                        .ok_or_else(|| RuntimeError::type_error("number or string", other.type_name()))?
                        .trunc(),
                };
                Ok(RuntimeValue::Number(n))
            }
            Builtin::Float => {
                arity(name, args, 0..=1)?;
                let n = match args.first() {
                    None => 0.0,
                    Some(RuntimeValue::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                        RuntimeError::Custom(format!("could not convert string to float: '{}'", s))
                    })?,
                    Some(other) => other
                        .as_number()
                        .ok_or_else(|| RuntimeError::type_error("number or string", other.type_name()))?,
                };
                Ok(RuntimeValue::Number(n))
            }
            Builtin::Bool => {
                arity(name, args, 0..=1)?;
                Ok(RuntimeValue::Boolean(args.first().is_some_and(RuntimeValue::is_truthy)))
            }
            Builtin::Abs => {
                arity(name, args, 1..=1)?;
                Ok(RuntimeValue::Number(to_number(&args[0])?.abs()))
            }
            Builtin::Round => {
                arity(name, args, 1..=2)?;
                let n = to_number(&args[0])?;
                let digits = args.get(1).map(to_int).transpose()?.unwrap_or(0);
                let scale = 10f64.powi(digits as i32);
                Ok(RuntimeValue::Number((n * scale).round() / scale))
            }
            Builtin::Min | Builtin::Max => {
                arity(name, args, 1..=usize::MAX)?;
                let items = if args.len() == 1 { iterate(&args[0])? } else { args.to_vec() };
                let wanted = if self == Builtin::Min { Ordering::Less } else { Ordering::Greater };
                let mut items = items.into_iter();
                let mut best = items
                    .next()
                    .ok_or_else(|| RuntimeError::Custom(format!("{}() arg is an empty sequence", name)))?;
                for item in items {
                    if item.compare(&best)? == wanted {
                        best = item;
                    }
                }
                Ok(best)
            }
            Builtin::Sum => {
                arity(name, args, 1..=2)?;
                let mut total = args.get(1).map(to_number).transpose()?.unwrap_or(0.0);
                for item in iterate(&args[0])? {
                    total += to_number(&item)?;
                }
                Ok(RuntimeValue::Number(total))
            }
            Builtin::Sorted => {
                arity(name, args, 1..=1)?;
                Ok(RuntimeValue::List(sorted(iterate(&args[0])?)?))
            }
            Builtin::Enumerate => {
                arity(name, args, 1..=2)?;
                let start = args.get(1).map(to_int).transpose()?.unwrap_or(0);
                let items = iterate(&args[0])?
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| RuntimeValue::Tuple(vec![RuntimeValue::from(i), item]))
                    .collect();
                Ok(RuntimeValue::List(items))
            }
            Builtin::Zip => {
                let columns = args.iter().map(iterate).collect::<Result<Vec<_>, _>>()?;
                let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
                let items = (0..rows)
                    .map(|row| RuntimeValue::Tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect();
                Ok(RuntimeValue::List(items))
            }
            Builtin::List => {
                arity(name, args, 0..=1)?;
                match args.first() {
                    None => Ok(RuntimeValue::List(Vec::new())),
                    Some(value) => Ok(RuntimeValue::List(iterate(value)?)),
                }
            }
        }
    }
}

/// Call a method on a string or dict receiver.
pub fn call_method(
    receiver: &RuntimeValue,
    method: &str,
    args: &[RuntimeValue],
) -> Result<RuntimeValue, RuntimeError> {
    match receiver {
        RuntimeValue::String(s) => string_method(s, method, args),
        RuntimeValue::Dict(entries) => {
            let items = match method {
                "get" => {
                    arity(method, args, 1..=2)?;
                    let key = to_str(&args[0])?;
                    return Ok(entries
                        .get(key)
                        .cloned()
                        .or_else(|| args.get(1).cloned())
                        .unwrap_or(RuntimeValue::None));
                }
                "keys" => entries.keys().map(|k| RuntimeValue::from(k.as_str())).collect(),
                "values" => entries.values().cloned().collect(),
                "items" => entries
                    .iter()
                    .map(|(k, v)| RuntimeValue::Tuple(vec![RuntimeValue::from(k.as_str()), v.clone()]))
                    .collect(),
                _ => return Err(unknown_method(receiver, method)),
            };
            arity(method, args, 0..=0)?;
            Ok(RuntimeValue::List(items))
        }
        _ => Err(unknown_method(receiver, method)),
    }
}

fn string_method(s: &str, method: &str, args: &[RuntimeValue]) -> Result<RuntimeValue, RuntimeError> {
    let text = |t: &str| -> Result<RuntimeValue, RuntimeError> { Ok(RuntimeValue::String(t.to_string())) };
    match method {
        "upper" => {
            arity(method, args, 0..=0)?;
            text(&s.to_uppercase())
        }
        "lower" => {
            arity(method, args, 0..=0)?;
            text(&s.to_lowercase())
        }
        "strip" | "lstrip" | "rstrip" => {
            arity(method, args, 0..=1)?;
            let chars: Vec<char> = match args.first() {
                Some(set) => to_str(set)?.chars().collect(),
                None => Vec::new(),
            };
            let strip = |c: char| if chars.is_empty() { c.is_whitespace() } else { chars.contains(&c) };
            match method {
                "lstrip" => text(s.trim_start_matches(strip)),
                "rstrip" => text(s.trim_end_matches(strip)),
                _ => text(s.trim_matches(strip)),
            }
        }
        "title" => {
            arity(method, args, 0..=0)?;
            let mut out = String::with_capacity(s.len());
            let mut in_word = false;
            for c in s.chars() {
                if c.is_alphabetic() {
                    if in_word {
                        out.extend(c.to_lowercase());
                    } else {
                        out.extend(c.to_uppercase());
                    }
                    in_word = true;
                } else {
                    out.push(c);
                    in_word = false;
                }
            }
            text(&out)
        }
        "replace" => {
            arity(method, args, 2..=2)?;
            text(&s.replace(to_str(&args[0])?, to_str(&args[1])?))
        }
        "split" => {
            arity(method, args, 0..=1)?;
            let parts: Vec<RuntimeValue> = match args.first() {
                None | Some(RuntimeValue::None) => s.split_whitespace().map(RuntimeValue::from).collect(),
                Some(sep) => {
                    let sep = to_str(sep)?;
                    if sep.is_empty() {
                        return Err(RuntimeError::Custom("empty separator".to_string()));
                    }
                    s.split(sep).map(RuntimeValue::from).collect()
                }
            };
            Ok(RuntimeValue::List(parts))
        }
        "join" => {
            arity(method, args, 1..=1)?;
            let parts = iterate(&args[0])?
                .iter()
                .map(|item| to_str(item).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            text(&parts.join(s))
        }
        "startswith" => {
            arity(method, args, 1..=1)?;
            Ok(RuntimeValue::Boolean(s.starts_with(to_str(&args[0])?)))
        }
        "endswith" => {
            arity(method, args, 1..=1)?;
            Ok(RuntimeValue::Boolean(s.ends_with(to_str(&args[0])?)))
        }
        _ => Err(RuntimeError::UnknownMethod {
            type_name: "str".to_string(),
            method: method.to_string(),
        }),
    }
}

/// The items a `for` loop or an iterable-consuming builtin walks over.
pub fn iterate(value: &RuntimeValue) -> Result<Vec<RuntimeValue>, RuntimeError> {
    match value {
        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => Ok(items.clone()),
        RuntimeValue::String(s) => Ok(s.chars().map(|c| RuntimeValue::String(c.to_string())).collect()),
        RuntimeValue::Dict(entries) => Ok(entries.keys().map(|k| RuntimeValue::from(k.as_str())).collect()),
        other => Err(RuntimeError::type_error("iterable", other.type_name())),
    }
}

fn sorted(mut items: Vec<RuntimeValue>) -> Result<Vec<RuntimeValue>, RuntimeError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        a.compare(b).unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(items),
    }
}

fn arity(name: &str, args: &[RuntimeValue], expected: RangeInclusive<usize>) -> Result<(), RuntimeError> {
    if expected.contains(&args.len()) {
        return Ok(());
    }
    let (low, high) = (*expected.start(), *expected.end());
    let expected = if low == high {
        low.to_string()
    } else if high == usize::MAX {
        format!("at least {}", low)
    } else {
        format!("{} to {}", low, high)
    };
    Err(RuntimeError::Arity {
        name: name.to_string(),
        expected,
        got: args.len(),
    })
}

fn unknown_method(receiver: &RuntimeValue, method: &str) -> RuntimeError {
    RuntimeError::UnknownMethod {
        type_name: receiver.type_name().to_string(),
        method: method.to_string(),
    }
}

pub(crate) fn to_number(value: &RuntimeValue) -> Result<f64, RuntimeError> {
    value
        .as_number()
        .ok_or_else(|| RuntimeError::type_error("number", value.type_name()))
}

/// An integral number, as used for indices and counts.
pub(crate) fn to_int(value: &RuntimeValue) -> Result<i64, RuntimeError> {
    let n = to_number(value)?;
    if n.fract() != 0.0 {
        return Err(RuntimeError::type_error("integer", format!("{}", n)));
    }
    // 2^63 itself is not representable.
    if n < i64::MIN as f64 || n >= i64::MAX as f64 {
        return Err(RuntimeError::IntegerOverflow(value.to_string()));
    }
    Ok(n as i64)
}

/// Length of `len` items repeated `count` times, refused past `MAX_SEQUENCE_LEN`.
pub(crate) fn repeated_len(what: &str, len: usize, count: &RuntimeValue) -> Result<usize, RuntimeError> {
    let times = usize::try_from(to_int(count)?.max(0)).map_err(|_| size_limit(what))?;
    if len == 0 {
        return Ok(0);
    }
    match len.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(times),
        _ => Err(size_limit(what)),
    }
}

fn size_limit(what: &str) -> RuntimeError {
    RuntimeError::SizeLimit {
        what: what.to_string(),
        limit: MAX_SEQUENCE_LEN,
    }
}

pub(crate) fn to_str(value: &RuntimeValue) -> Result<&str, RuntimeError> {
    match value {
        RuntimeValue::String(s) => Ok(s),
        other => Err(RuntimeError::type_error("str", other.type_name())),
    }
}
