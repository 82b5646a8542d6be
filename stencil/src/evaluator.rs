use std::ops::Range;

use crate::compound::Compound;
use crate::namespace::Namespace;

/// Raised through an [`Evaluator`] when a body copy fails. The copier
/// replaces it with the original failure once control returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("nested block copy aborted")]
pub struct BodyAborted;

/// Copies one body range through the copier, re-entrantly.
pub type Body<'b, 'g, V, E> = dyn FnMut(Range<usize>, &mut Namespace<'g, V>) -> Result<(), E> + 'b;

/// The code-running capability the copier delegates to. The copier only
/// finds fragments and clause boundaries; all meaning comes from here.
pub trait Evaluator {
    type Value: Clone;
    type Error: std::error::Error + Send + Sync + 'static + From<BodyAborted>;

    /// Evaluate an inline expression and render it as text.
    fn evaluate(
        &self,
        expression: &str,
        namespace: &mut Namespace<'_, Self::Value>,
    ) -> Result<String, Self::Error>;

    /// Execute a statement for its side effects on the namespace.
    fn execute(
        &self,
        statement: &str,
        namespace: &mut Namespace<'_, Self::Value>,
    ) -> Result<(), Self::Error>;

    /// Run a compound statement, calling `body` for every clause body that
    /// should be emitted, as often as the construct dictates.
    fn execute_compound<'g>(
        &self,
        compound: &Compound,
        namespace: &mut Namespace<'g, Self::Value>,
        body: &mut Body<'_, 'g, Self::Value, Self::Error>,
    ) -> Result<(), Self::Error>;
}
