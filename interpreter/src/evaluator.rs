use std::collections::BTreeMap;

use stencil::Namespace;

use crate::ast::{BinaryOperator, Expr, LogicalOperator, UnaryOperator};
use crate::builtins::{self, Builtin, repeated_len, to_int, to_number, to_str};
use crate::error::RuntimeError;
use crate::format;
use crate::runtime_value::RuntimeValue;

const MAX_DEPTH: usize = 256;

/// Evaluate an expression AST node to produce a RuntimeValue.
pub fn evaluate(
    expr: &Expr,
    namespace: &Namespace<'_, RuntimeValue>,
    depth: usize,
) -> Result<RuntimeValue, RuntimeError> {
    if depth > MAX_DEPTH {
        return Err(RuntimeError::StackOverflow);
    }
    let eval = |e: &Expr| evaluate(e, namespace, depth + 1);
    let eval_all = |es: &[Expr]| es.iter().map(eval).collect::<Result<Vec<_>, _>>();

    match expr {
        // --- Literals ---
        Expr::NumberLiteral(n) => Ok(RuntimeValue::Number(*n)),
        Expr::StringLiteral(s) => Ok(RuntimeValue::String(s.clone())),
        Expr::BooleanLiteral(b) => Ok(RuntimeValue::Boolean(*b)),
        Expr::NoneLiteral => Ok(RuntimeValue::None),

        // --- References ---
        Expr::VariableReference(name) => lookup(name, namespace),

        // --- Displays ---
        Expr::Tuple(items) => Ok(RuntimeValue::Tuple(eval_all(items)?)),
        Expr::List(items) => Ok(RuntimeValue::List(eval_all(items)?)),
        Expr::Dict(entries) => {
            let mut dict = BTreeMap::new();
            for (key, value) in entries {
                let key = eval(key)?;
                dict.insert(to_str(&key)?.to_string(), eval(value)?);
            }
            Ok(RuntimeValue::Dict(dict))
        }

        // --- Operations ---
        Expr::UnaryOperation { operator, operand } => {
            let val = eval(operand)?;
            match operator {
                UnaryOperator::Negation => Ok(RuntimeValue::Number(-to_number(&val)?)),
                UnaryOperator::LogicalNot => Ok(RuntimeValue::Boolean(val.is_falsy())),
            }
        }

        Expr::BinaryOperation {
            operator,
            left,
            right,
        } => {
            let l = eval(left)?;
            let r = eval(right)?;
            eval_binary_op(operator, &l, &r)
        }

        Expr::Logical {
            operator,
            left,
            right,
        } => {
            let l = eval(left)?;
            let short_circuit = match operator {
                LogicalOperator::And => l.is_falsy(),
                LogicalOperator::Or => l.is_truthy(),
            };
            if short_circuit { Ok(l) } else { eval(right) }
        }

        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if eval(condition)?.is_truthy() {
                eval(then)
            } else {
                eval(otherwise)
            }
        }

        // --- Postfix ---
        Expr::Call { callee, arguments } => {
            let callee = eval(callee)?;
            let arguments = eval_all(arguments)?;
            match callee {
                RuntimeValue::Builtin(builtin) => builtin.call(&arguments),
                RuntimeValue::Function(function) => function.call(&arguments),
                other => Err(RuntimeError::type_error("callable", other.type_name())),
            }
        }

        Expr::MethodCall {
            receiver,
            method,
            arguments,
        } => {
            let receiver = eval(receiver)?;
            let arguments = eval_all(arguments)?;
            builtins::call_method(&receiver, method, &arguments)
        }

        Expr::Subscript { value, index } => {
            let value = eval(value)?;
            let index = eval(index)?;
            subscript(&value, &index)
        }
    }
}

/// Names resolve locals, then globals, then builtins.
fn lookup(name: &str, namespace: &Namespace<'_, RuntimeValue>) -> Result<RuntimeValue, RuntimeError> {
    if let Some(value) = namespace.get(name) {
        return Ok(value.clone());
    }
    Builtin::lookup(name)
        .map(RuntimeValue::Builtin)
        .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
}

/// Resolve a possibly negative index against a sequence of `len` items.
pub(crate) fn position(len: usize, index: &RuntimeValue) -> Result<usize, RuntimeError> {
    let i = to_int(index)?;
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::IndexOutOfRange(i));
    }
    Ok(resolved as usize)
}

fn subscript(value: &RuntimeValue, index: &RuntimeValue) -> Result<RuntimeValue, RuntimeError> {
    match value {
        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => {
            Ok(items[position(items.len(), index)?].clone())
        }
        RuntimeValue::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(RuntimeValue::String(chars[position(chars.len(), index)?].to_string()))
        }
        RuntimeValue::Dict(entries) => {
            let key = to_str(index)?;
            entries
                .get(key)
                .cloned()
                .ok_or_else(|| RuntimeError::KeyNotFound(key.to_string()))
        }
        other => Err(RuntimeError::type_error("subscriptable value", other.type_name())),
    }
}

fn contains(container: &RuntimeValue, item: &RuntimeValue) -> Result<bool, RuntimeError> {
    match container {
        RuntimeValue::String(s) => Ok(s.contains(to_str(item)?)),
        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => Ok(items.contains(item)),
        RuntimeValue::Dict(entries) => Ok(match item {
            RuntimeValue::String(key) => entries.contains_key(key),
            _ => false,
        }),
        other => Err(RuntimeError::type_error("container", other.type_name())),
    }
}

pub(crate) fn eval_binary_op(
    op: &BinaryOperator,
    left: &RuntimeValue,
    right: &RuntimeValue,
) -> Result<RuntimeValue, RuntimeError> {
    match op {
        BinaryOperator::Addition => match (left, right) {
            (RuntimeValue::String(a), RuntimeValue::String(b)) => {
                Ok(RuntimeValue::String(format!("{}{}", a, b)))
            }
            (RuntimeValue::List(a), RuntimeValue::List(b)) => {
                Ok(RuntimeValue::List(a.iter().chain(b).cloned().collect()))
            }
            (RuntimeValue::Tuple(a), RuntimeValue::Tuple(b)) => {
                Ok(RuntimeValue::Tuple(a.iter().chain(b).cloned().collect()))
            }
            _ => match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => Ok(RuntimeValue::Number(a + b)),
                _ => Err(RuntimeError::TypeError {
                    expected: "matching numeric, string or sequence types".to_string(),
                    got: format!("{} + {}", left.type_name(), right.type_name()),
                }),
            },
        },
        BinaryOperator::Subtraction => numeric_binop(left, right, |a, b| a - b),
        BinaryOperator::Multiplication => match (left, right) {
            (RuntimeValue::String(s), count) | (count, RuntimeValue::String(s)) => {
                Ok(RuntimeValue::String(s.repeat(repeated_len("str *", s.len(), count)?)))
            }
            (RuntimeValue::List(items), count) | (count, RuntimeValue::List(items)) => {
                let times = repeated_len("list *", items.len(), count)?;
                Ok(RuntimeValue::List(
                    (0..times).flat_map(|_| items.iter().cloned()).collect(),
                ))
            }
            _ => numeric_binop(left, right, |a, b| a * b),
        },
        BinaryOperator::Division => {
            let (a, b) = divisible(left, right)?;
            Ok(RuntimeValue::Number(a / b))
        }
        BinaryOperator::FloorDivision => {
            let (a, b) = divisible(left, right)?;
            Ok(RuntimeValue::Number((a / b).floor()))
        }
        BinaryOperator::Modulo => {
            if let RuntimeValue::String(template) = left {
                return Ok(RuntimeValue::String(format::format(template, right)?));
            }
            let (a, b) = divisible(left, right)?;
            // Result takes the sign of the divisor.
            Ok(RuntimeValue::Number(a - b * (a / b).floor()))
        }
        BinaryOperator::Power => numeric_binop(left, right, f64::powf),
        BinaryOperator::Equality => Ok(RuntimeValue::Boolean(left == right)),
        BinaryOperator::Inequality => Ok(RuntimeValue::Boolean(left != right)),
        BinaryOperator::GreaterThan => Ok(RuntimeValue::Boolean(left.compare(right)?.is_gt())),
        BinaryOperator::LessThan => Ok(RuntimeValue::Boolean(left.compare(right)?.is_lt())),
        BinaryOperator::GreaterThanOrEqual => Ok(RuntimeValue::Boolean(left.compare(right)?.is_ge())),
        BinaryOperator::LessThanOrEqual => Ok(RuntimeValue::Boolean(left.compare(right)?.is_le())),
        BinaryOperator::In => Ok(RuntimeValue::Boolean(contains(right, left)?)),
        BinaryOperator::NotIn => Ok(RuntimeValue::Boolean(!contains(right, left)?)),
    }
}

fn numeric_binop(
    left: &RuntimeValue,
    right: &RuntimeValue,
    op: impl Fn(f64, f64) -> f64,
) -> Result<RuntimeValue, RuntimeError> {
    Ok(RuntimeValue::Number(op(to_number(left)?, to_number(right)?)))
}

fn divisible(left: &RuntimeValue, right: &RuntimeValue) -> Result<(f64, f64), RuntimeError> {
    let a = to_number(left)?;
    let b = to_number(right)?;
    if b == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::builtins::MAX_SEQUENCE_LEN;
    use crate::parser::parse_expression;

    fn eval_with(source: &str, globals: &HashMap<String, RuntimeValue>) -> Result<RuntimeValue, RuntimeError> {
        let namespace = Namespace::new(globals);
        evaluate(&parse_expression(source)?, &namespace, 0)
    }

    fn eval(source: &str) -> RuntimeValue {
        eval_with(source, &HashMap::new()).unwrap()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("7 // 2 + 2 ** 3").to_string(), "11");
        assert_eq!(eval("-7 % 3").to_string(), "2");
        assert_eq!(eval("7 / 2").to_string(), "3.5");
        assert_eq!(eval_with("1 / 0", &HashMap::new()), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("'' or 'fallback'"), RuntimeValue::from("fallback"));
        assert_eq!(eval("0 and missing"), RuntimeValue::Number(0.0));
        assert_eq!(eval("not []"), RuntimeValue::Boolean(true));
    }

    #[test]
    fn sequences_and_membership() {
        assert_eq!(eval("[1, 2] + [3]").to_string(), "[1, 2, 3]");
        assert_eq!(eval("'ab' * 2"), RuntimeValue::from("abab"));
        assert_eq!(eval("'b' in 'abc'"), RuntimeValue::Boolean(true));
        assert_eq!(eval("3 not in (1, 2)"), RuntimeValue::Boolean(true));
        assert_eq!(eval("{'k': 1}['k']"), RuntimeValue::Number(1.0));
        assert_eq!(eval("'xyz'[-1]"), RuntimeValue::from("z"));
        assert_eq!(eval_with("[1][3]", &HashMap::new()), Err(RuntimeError::IndexOutOfRange(3)));
    }

    #[test]
    fn oversized_repetition_is_an_error() {
        let too_big = RuntimeError::SizeLimit {
            what: "str *".to_string(),
            limit: MAX_SEQUENCE_LEN,
        };
        assert_eq!(eval_with("'ab' * 10**6", &HashMap::new()), Err(too_big));
        assert!(matches!(
            eval_with("'ab' * 10**19", &HashMap::new()),
            Err(RuntimeError::IntegerOverflow(_))
        ));
        assert!(matches!(
            eval_with("[0] * 10**7", &HashMap::new()),
            Err(RuntimeError::SizeLimit { .. })
        ));
        assert_eq!(eval("'ab' * -1"), RuntimeValue::from(""));
        assert_eq!(eval("[] * 10**18").to_string(), "[]");
    }

    #[test]
    fn names_resolve_through_globals_then_builtins() {
        let globals = HashMap::from([("files".to_string(), RuntimeValue::from(vec!["a", "b"]))]);
        assert_eq!(eval_with("len(files)", &globals).unwrap(), RuntimeValue::Number(2.0));
        assert_eq!(
            eval_with("nope", &globals),
            Err(RuntimeError::UndefinedVariable("nope".into()))
        );
    }

    #[test]
    fn native_functions_are_callable() {
        let globals = HashMap::from([(
            "double".to_string(),
            RuntimeValue::function("double", |args| Ok(RuntimeValue::Number(to_number(&args[0])? * 2.0))),
        )]);
        assert_eq!(eval_with("double(21)", &globals).unwrap().to_string(), "42");
        assert!(matches!(eval_with("3(1)", &globals), Err(RuntimeError::TypeError { .. })));
    }

    #[test]
    fn string_formatting_operator() {
        assert_eq!(eval("'%s-%d' % ('a', 3)"), RuntimeValue::from("a-3"));
    }
}
