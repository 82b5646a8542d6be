use std::collections::HashMap;
use std::error::Error;
use std::ops::Range;

use tracing::{debug, trace};

use crate::compound::{Compound, Fragment, Step};
use crate::error::CopyError;
use crate::evaluator::{BodyAborted, Evaluator};
use crate::hooks::{Hooks, Mode};
use crate::namespace::Namespace;
use crate::pattern::PatternSet;

/// Template copier: entry point of the engine.
#[derive(Debug)]
pub struct Copier<E> {
    patterns: PatternSet,
    evaluator: E,
    hooks: Hooks,
}

impl<E: Evaluator> Copier<E> {
    pub fn new(patterns: PatternSet, evaluator: E) -> Self {
        Copier {
            patterns,
            evaluator,
            hooks: Hooks::default(),
        }
    }

    /// Transform every expression and statement before it reaches the evaluator.
    pub fn with_preprocess(
        mut self,
        preprocess: impl Fn(&str, Mode) -> String + Send + Sync + 'static,
    ) -> Self {
        self.hooks.preprocess = Some(Box::new(preprocess));
        self
    }

    /// Recover from failed expressions by returning fallback text.
    pub fn with_error_handler(
        mut self,
        handle: impl Fn(&str, &(dyn Error + 'static)) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.handle = Some(Box::new(handle));
        self
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Copy a block of lines (each carrying its own terminator).
    pub fn copy<S: AsRef<str>>(
        &self,
        block: &[S],
        globals: &HashMap<String, E::Value>,
    ) -> Result<Vec<String>, CopyError> {
        let block: Vec<&str> = block.iter().map(AsRef::as_ref).collect();
        let mut namespace = Namespace::new(globals);
        let mut run = Run {
            block: &block,
            patterns: &self.patterns,
            hooks: &self.hooks,
            output: Vec::new(),
        };
        run.copy_block(&self.evaluator, &mut namespace, 0..block.len())?;
        Ok(run.output)
    }

    /// Copy a whole text, splitting it into lines and joining the result.
    pub fn copy_text(
        &self,
        text: &str,
        globals: &HashMap<String, E::Value>,
    ) -> Result<String, CopyError> {
        Ok(self.copy(&split_lines(text), globals)?.concat())
    }
}

/// Split text into lines, keeping each line's `\n`.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// State of one top-level copy.
struct Run<'a> {
    block: &'a [&'a str],
    patterns: &'a PatternSet,
    hooks: &'a Hooks,
    output: Vec<String>,
}

impl Run<'_> {
    /// Copy lines `range` of the block, appending to the output.
    fn copy_block<E: Evaluator>(
        &mut self,
        evaluator: &E,
        namespace: &mut Namespace<'_, E::Value>,
        range: Range<usize>,
    ) -> Result<(), CopyError> {
        let mut current = range.start;
        while current < range.end {
            let line = self.block[current];
            trace!(line = current, text = line.trim_end(), "copying");
            current = if let Some(first) = self.patterns.compound_start.at_start(line) {
                self.compound_statement(evaluator, namespace, first, current, range.end)?
            } else if let Some(first) = self.patterns.statement.at_start(line) {
                self.simple_statement(evaluator, namespace, first, current, range.end)?
            } else {
                let copied = self.substitute(evaluator, namespace, current)?;
                self.output.push(copied);
                current
            };
            current += 1;
        }
        Ok(())
    }

    /// Replace every expression on a literal line with its value.
    fn substitute<E: Evaluator>(
        &self,
        evaluator: &E,
        namespace: &mut Namespace<'_, E::Value>,
        index: usize,
    ) -> Result<String, CopyError> {
        let line = self.block[index];
        let found = self.patterns.expression.expressions(line);
        if found.is_empty() {
            return Ok(line.to_string());
        }

        let mut copied = String::with_capacity(line.len());
        let mut last = 0;
        for (span, expression) in found {
            copied.push_str(&line[last..span.start]);
            let expression = self.hooks.preprocess(expression, Mode::Evaluate);
            let value = match evaluator.evaluate(&expression, namespace) {
                Ok(value) => value,
                Err(err) => match self.hooks.handle(&expression, &err) {
                    Some(fallback) => fallback,
                    None => {
                        return Err(CopyError::Expression {
                            line: index,
                            expression: expression.into_owned(),
                            source: Box::new(err),
                        });
                    }
                },
            };
            copied.push_str(&value);
            last = span.end;
        }
        copied.push_str(&line[last..]);
        Ok(copied)
    }

    /// Merge `first` with the continuation lines following `index`.
    fn gather(&self, first: &str, index: usize, end: usize) -> Fragment {
        let mut fragment = Fragment::new(first, index);
        let mut current = index + 1;
        while current < end {
            let Some(rest) = self.patterns.continuation.at_start(self.block[current]) else {
                break;
            };
            fragment.push(rest, current);
            current += 1;
        }
        fragment
    }

    fn prepared(&self, mut fragment: Fragment) -> Fragment {
        fragment.text = self
            .hooks
            .preprocess(&fragment.text, Mode::Execute)
            .into_owned();
        fragment
    }

    /// Execute a simple statement. Returns the index of its last line.
    fn simple_statement<E: Evaluator>(
        &self,
        evaluator: &E,
        namespace: &mut Namespace<'_, E::Value>,
        first: &str,
        index: usize,
        end: usize,
    ) -> Result<usize, CopyError> {
        let fragment = self.prepared(self.gather(first, index, end));
        debug!(lines = ?fragment.lines, code = fragment.text.trim_end(), "executing statement");
        evaluator
            .execute(&fragment.text, namespace)
            .map_err(|err| CopyError::Statement {
                lines: fragment.lines.clone(),
                fragment: fragment.text.clone(),
                source: Box::new(err),
            })?;
        Ok(fragment.last_line())
    }

    /// Assemble and run a compound statement. Returns the index of its
    /// terminating line.
    fn compound_statement<E: Evaluator>(
        &mut self,
        evaluator: &E,
        namespace: &mut Namespace<'_, E::Value>,
        first: &str,
        index: usize,
        end: usize,
    ) -> Result<usize, CopyError> {
        let header = self.gather(first, index, end);
        // Last line belonging to the previous clause (or the header).
        let mut current = header.last_line();
        let mut steps = vec![Step::Header(self.prepared(header))];
        let mut scan = current + 1;
        let mut depth = 1usize;

        loop {
            if scan >= end {
                return Err(CopyError::Unterminated { line: index });
            }
            let line = self.block[scan];
            if self.patterns.compound_end.at_start(line).is_some() {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            } else if self.patterns.compound_start.at_start(line).is_some() {
                depth += 1;
            } else if depth == 1 {
                if let Some(rest) = self.patterns.compound_clause.at_start(line) {
                    let clause = self.gather(rest, scan, end);
                    steps.push(Step::Copy(current + 1..scan));
                    current = clause.last_line();
                    scan = current;
                    steps.push(Step::Clause(self.prepared(clause)));
                }
            }
            scan += 1;
        }
        steps.push(Step::Copy(current + 1..scan));

        let compound = Compound {
            steps,
            lines: index..scan + 1,
        };
        debug!(lines = ?compound.lines, steps = compound.steps.len(), "executing compound statement");

        let mut nested: Option<CopyError> = None;
        let result = evaluator.execute_compound(&compound, namespace, &mut |range, namespace| {
            self.copy_block(evaluator, namespace, range).map_err(|err| {
                nested.get_or_insert(err);
                <E::Error>::from(BodyAborted)
            })
        });
        if let Some(err) = nested {
            return Err(err);
        }
        result.map_err(|err| CopyError::Statement {
            lines: compound.lines.clone(),
            fragment: compound
                .header()
                .map(|header| header.text.clone())
                .unwrap_or_default(),
            source: Box::new(err),
        })?;
        Ok(scan)
    }
}
