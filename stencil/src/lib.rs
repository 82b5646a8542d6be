//! Line-oriented template copying.
//!
//! A template is a block of lines. Lines matching one of the caller's
//! statement patterns carry code; every other line is copied to the output
//! with its embedded expressions substituted. Compound statements (loops,
//! conditionals) are split into clauses and their bodies are copied back
//! through the same engine, as many times as the [`Evaluator`] decides.

pub mod compound;
pub mod copier;
pub mod error;
pub mod evaluator;
pub mod hooks;
pub mod namespace;
pub mod pattern;

pub use compound::{Clause, Compound, Fragment, Step};
pub use copier::{Copier, split_lines};
pub use error::{BoxError, CopyError, PatternError};
pub use evaluator::{BodyAborted, Evaluator};
pub use hooks::{Hooks, Mode};
pub use namespace::Namespace;
pub use pattern::{Matcher, PatternSet};
