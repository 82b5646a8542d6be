use stencil::evaluator::Body;
use stencil::{Clause, Compound, Evaluator, Namespace};
use tracing::trace;

use crate::ast::{ClauseHeader, Expr, Statement, Target};
use crate::builtins::{iterate, to_str};
use crate::error::RuntimeError;
use crate::evaluator::{eval_binary_op, evaluate, position};
use crate::parser::{parse_clause_header, parse_expression, parse_statements};
use crate::runtime_value::RuntimeValue;

/// Upper bound on `while` iterations before the loop is abandoned.
pub const MAX_ITERATIONS: usize = 100_000;

/// The default evaluator: a small, sandboxed Python-like language with no
/// access to the filesystem or environment beyond the functions it is given.
#[derive(Debug, Clone)]
pub struct Interpreter {
    max_iterations: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter {
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Evaluator for Interpreter {
    type Value = RuntimeValue;
    type Error = RuntimeError;

    fn evaluate(
        &self,
        expression: &str,
        namespace: &mut Namespace<'_, RuntimeValue>,
    ) -> Result<String, RuntimeError> {
        let expr = parse_expression(expression)?;
        Ok(evaluate(&expr, namespace, 0)?.to_string())
    }

    fn execute(
        &self,
        statement: &str,
        namespace: &mut Namespace<'_, RuntimeValue>,
    ) -> Result<(), RuntimeError> {
        execute_statements(&parse_statements(statement)?, namespace)
    }

    fn execute_compound<'g>(
        &self,
        compound: &Compound,
        namespace: &mut Namespace<'g, RuntimeValue>,
        body: &mut Body<'_, 'g, RuntimeValue, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let clauses = compound.clauses();
        // Every clause header must parse before any body runs.
        let headers = clauses
            .iter()
            .map(|clause| parse_clause_header(&clause.fragment.text))
            .collect::<Result<Vec<_>, _>>()?;

        match headers.first() {
            Some(ClauseHeader::If(_)) => run_conditional(&clauses, &headers, namespace, body),
            Some(ClauseHeader::For { .. } | ClauseHeader::While(_)) => {
                self.run_loop(&clauses, &headers, namespace, body)
            }
            Some(other) => Err(RuntimeError::UnsupportedCompound(format!(
                "a compound statement cannot open with '{}'",
                other.keyword()
            ))),
            None => Err(RuntimeError::UnsupportedCompound("empty compound statement".to_string())),
        }
    }
}

/// `if` / `elif`* / `else`?: copy the first body whose condition holds.
fn run_conditional<'g>(
    clauses: &[Clause<'_>],
    headers: &[ClauseHeader],
    namespace: &mut Namespace<'g, RuntimeValue>,
    body: &mut Body<'_, 'g, RuntimeValue, RuntimeError>,
) -> Result<(), RuntimeError> {
    for (i, header) in headers.iter().enumerate().skip(1) {
        let valid = match header {
            ClauseHeader::Elif(_) => true,
            ClauseHeader::Else => i == headers.len() - 1,
            _ => false,
        };
        if !valid {
            return Err(misplaced(header, "if"));
        }
    }

    for (clause, header) in clauses.iter().zip(headers) {
        let taken = match header {
            ClauseHeader::If(condition) | ClauseHeader::Elif(condition) => {
                evaluate(condition, namespace, 0)?.is_truthy()
            }
            _ => true,
        };
        if taken {
            trace!(clause = header.keyword(), "taking clause");
            return body(clause.body.clone(), namespace);
        }
    }
    Ok(())
}

impl Interpreter {
    /// `for` / `while` with an optional `else` run once the loop finishes.
    fn run_loop<'g>(
        &self,
        clauses: &[Clause<'_>],
        headers: &[ClauseHeader],
        namespace: &mut Namespace<'g, RuntimeValue>,
        body: &mut Body<'_, 'g, RuntimeValue, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let otherwise = match headers.get(1..).unwrap_or_default() {
            [] => None,
            [ClauseHeader::Else] => Some(clauses[1].body),
            [other, ..] => return Err(misplaced(other, headers[0].keyword())),
        };
        let range = clauses[0].body;

        match &headers[0] {
            ClauseHeader::For { target, iterable } => {
                let items = iterate(&evaluate(iterable, namespace, 0)?)?;
                for item in items {
                    assign(target, item, namespace)?;
                    body(range.clone(), namespace)?;
                }
            }
            ClauseHeader::While(condition) => {
                let mut iterations = 0;
                while evaluate(condition, namespace, 0)?.is_truthy() {
                    iterations += 1;
                    if iterations > self.max_iterations {
                        return Err(RuntimeError::IterationLimit(self.max_iterations));
                    }
                    body(range.clone(), namespace)?;
                }
            }
            other => return Err(misplaced(other, "loop")),
        }

        match otherwise {
            Some(range) => body(range.clone(), namespace),
            None => Ok(()),
        }
    }
}

fn misplaced(header: &ClauseHeader, construct: &str) -> RuntimeError {
    RuntimeError::UnsupportedCompound(format!(
        "'{}' clause cannot appear here in an '{}' statement",
        header.keyword(),
        construct
    ))
}

pub fn execute_statements(
    statements: &[Statement],
    namespace: &mut Namespace<'_, RuntimeValue>,
) -> Result<(), RuntimeError> {
    for statement in statements {
        execute_statement(statement, namespace)?;
    }
    Ok(())
}

fn execute_statement(
    statement: &Statement,
    namespace: &mut Namespace<'_, RuntimeValue>,
) -> Result<(), RuntimeError> {
    match statement {
        Statement::Expression(expr) => {
            evaluate(expr, namespace, 0)?;
        }
        Statement::Assignment { targets, value } => {
            let value = evaluate(value, namespace, 0)?;
            for target in targets {
                assign(target, value.clone(), namespace)?;
            }
        }
        Statement::AugmentedAssignment {
            target,
            operator,
            value,
        } => {
            let current = evaluate(&target_expr(target), namespace, 0)?;
            let value = evaluate(value, namespace, 0)?;
            let updated = eval_binary_op(operator, &current, &value)?;
            assign(target, updated, namespace)?;
        }
        Statement::Pass => {}
    }
    Ok(())
}

fn target_expr(target: &Target) -> Expr {
    match target {
        Target::Name(name) => Expr::VariableReference(name.clone()),
        Target::Tuple(targets) => Expr::Tuple(targets.iter().map(target_expr).collect()),
        Target::Subscript { name, index } => Expr::Subscript {
            value: Box::new(Expr::VariableReference(name.clone())),
            index: Box::new(index.clone()),
        },
    }
}

/// Bind `value` to `target`. Writes always land in the local namespace.
pub fn assign(
    target: &Target,
    value: RuntimeValue,
    namespace: &mut Namespace<'_, RuntimeValue>,
) -> Result<(), RuntimeError> {
    match target {
        Target::Name(name) => namespace.set(name.clone(), value),
        Target::Tuple(targets) => {
            let items = iterate(&value)?;
            if items.len() != targets.len() {
                return Err(RuntimeError::Unpack {
                    expected: targets.len(),
                    got: items.len(),
                });
            }
            for (target, item) in targets.iter().zip(items) {
                assign(target, item, namespace)?;
            }
        }
        Target::Subscript { name, index } => {
            let index = evaluate(index, namespace, 0)?;
            let container = namespace
                .local_mut(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone()))?;
            match container {
                RuntimeValue::List(items) => {
                    let i = position(items.len(), &index)?;
                    items[i] = value;
                }
                RuntimeValue::Dict(entries) => {
                    entries.insert(to_str(&index)?.to_string(), value);
                }
                other => {
                    return Err(RuntimeError::type_error("list or dict", other.type_name()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn run(source: &str, globals: &HashMap<String, RuntimeValue>) -> Result<HashMap<String, RuntimeValue>, RuntimeError> {
        let mut namespace = Namespace::new(globals);
        Interpreter::new().execute(source, &mut namespace)?;
        Ok(namespace.into_locals())
    }

    #[test]
    fn assignments_bind_locals() {
        let locals = run("a = b = 1\nc, d = 'xy'\na += 2", &HashMap::new()).unwrap();
        assert_eq!(locals["a"], RuntimeValue::Number(3.0));
        assert_eq!(locals["b"], RuntimeValue::Number(1.0));
        assert_eq!(locals["d"], RuntimeValue::from("y"));
    }

    #[test]
    fn subscript_assignment_copies_globals_on_write() {
        let globals = HashMap::from([("d".to_string(), RuntimeValue::Dict(Default::default()))]);
        let locals = run("d['k'] = 1", &globals).unwrap();
        assert_eq!(locals["d"].to_string(), "{'k': 1}");
        assert_eq!(globals["d"].to_string(), "{}");
    }

    #[test]
    fn unpack_mismatch() {
        assert_eq!(
            run("a, b = (1, 2, 3)", &HashMap::new()),
            Err(RuntimeError::Unpack { expected: 2, got: 3 })
        );
    }

    #[test]
    fn augmented_assignment_needs_an_existing_name() {
        assert_eq!(
            run("missing += 1", &HashMap::new()),
            Err(RuntimeError::UndefinedVariable("missing".into()))
        );
    }

    #[test]
    fn evaluate_renders_values() {
        let globals = HashMap::new();
        let mut namespace = Namespace::new(&globals);
        let text = Interpreter::new().evaluate("(1, 'a')", &mut namespace).unwrap();
        assert_eq!(text, "(1, 'a')");
    }
}
