//! printf-style string formatting for the `%` operator.

use crate::error::RuntimeError;
use crate::runtime_value::RuntimeValue;

/// Apply `template % arguments`.
///
/// A tuple supplies positional arguments, a dict supplies `%(key)s`
/// lookups, and any other value is a single positional argument.
pub fn format(template: &str, arguments: &RuntimeValue) -> Result<String, RuntimeError> {
    let positional: &[RuntimeValue] = match arguments {
        RuntimeValue::Tuple(items) => items,
        other => std::slice::from_ref(other),
    };
    let mut next = 0;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let value = if chars.peek() == Some(&'(') {
            chars.next();
            let key: String = chars.by_ref().take_while(|&k| k != ')').collect();
            let RuntimeValue::Dict(entries) = arguments else {
                return Err(RuntimeError::Format("format requires a mapping".to_string()));
            };
            Some(
                entries
                    .get(&key)
                    .ok_or_else(|| RuntimeError::KeyNotFound(key.clone()))?,
            )
        } else {
            None
        };

        let directive = chars
            .next()
            .ok_or_else(|| RuntimeError::Format("incomplete format".to_string()))?;
        if directive == '%' && value.is_none() {
            out.push('%');
            continue;
        }

        let value = match value {
            Some(value) => value,
            None => {
                let value = positional.get(next).ok_or_else(|| {
                    RuntimeError::Format("not enough arguments for format string".to_string())
                })?;
                next += 1;
                value
            }
        };

        match directive {
            's' => out.push_str(&value.to_string()),
            'r' => out.push_str(&value.repr()),
            'd' | 'i' => {
                let n = value
                    .as_number()
                    .ok_or_else(|| RuntimeError::type_error("number", value.type_name()))?;
                out.push_str(&RuntimeValue::Number(n.trunc()).to_string());
            }
            other => {
                return Err(RuntimeError::Format(format!(
                    "unsupported format character '{}'",
                    other
                )));
            }
        }
    }

    if next > 0 && next < positional.len() {
        return Err(RuntimeError::Format(
            "not all arguments converted during string formatting".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn positional_directives() {
        let args = RuntimeValue::Tuple(vec![RuntimeValue::from("x"), RuntimeValue::Number(2.7)]);
        assert_eq!(format("%s is %d%%", &args).unwrap(), "x is 2%");
        assert_eq!(format("[%s]", &RuntimeValue::Number(3.0)).unwrap(), "[3]");
    }

    #[test]
    fn mapping_directives() {
        let args = RuntimeValue::Dict(BTreeMap::from([(
            "title".to_string(),
            RuntimeValue::from("Intro"),
        )]));
        assert_eq!(format("<h1>%(title)s</h1>", &args).unwrap(), "<h1>Intro</h1>");
        assert!(matches!(
            format("%(missing)s", &args),
            Err(RuntimeError::KeyNotFound(_))
        ));
    }

    #[test]
    fn argument_count_mismatch() {
        let two = RuntimeValue::Tuple(vec![RuntimeValue::None, RuntimeValue::None]);
        assert!(format("%s", &two).is_err());
        assert!(format("%s %s %s", &two).is_err());
    }
}
