use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A marker pattern that could not be compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("invalid pattern `{pattern}`: {message}")]
    Invalid { pattern: String, message: String },
    #[error("expression pattern `{0}` has no capture group for the expression text")]
    MissingCapture(String),
}

/// A failed copy. Line numbers are 0-based indices into the block.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("cannot evaluate `{expression}` on line {}: {source}", .line + 1)]
    Expression {
        line: usize,
        expression: String,
        source: BoxError,
    },
    #[error("cannot execute statement on lines {}-{}: {source}", .lines.start + 1, .lines.end)]
    Statement {
        lines: Range<usize>,
        fragment: String,
        source: BoxError,
    },
    #[error("compound statement starting on line {} is never closed", .line + 1)]
    Unterminated { line: usize },
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

impl CopyError {
    /// Lines of the block the error points at.
    pub fn lines(&self) -> Option<Range<usize>> {
        match self {
            CopyError::Expression { line, .. } | CopyError::Unterminated { line } => {
                Some(*line..*line + 1)
            }
            CopyError::Statement { lines, .. } => Some(lines.clone()),
            CopyError::Pattern(_) => None,
        }
    }

    /// Convert to a codespan-reporting Diagnostic against the copied block.
    pub fn to_diagnostic<S: AsRef<str>>(&self, file_id: usize, block: &[S]) -> Diagnostic<usize> {
        let mut diagnostic = Diagnostic::error().with_message(self.to_string());
        let Some(lines) = self.lines() else {
            return diagnostic;
        };
        let mut span = byte_span(block, lines);

        match self {
            CopyError::Expression { expression, .. } => {
                if let Some(offset) = block_text(block, span.clone()).find(expression.as_str()) {
                    span = span.start + offset..span.start + offset + expression.len();
                }
                diagnostic = diagnostic.with_labels(vec![
                    Label::primary(file_id, span).with_message("this expression failed"),
                ]);
            }
            CopyError::Statement { fragment, .. } => {
                diagnostic = diagnostic
                    .with_labels(vec![Label::primary(file_id, span)])
                    .with_notes(vec![format!("fragment:\n{}", fragment.trim_end())]);
            }
            CopyError::Unterminated { .. } => {
                diagnostic = diagnostic
                    .with_labels(vec![
                        Label::primary(file_id, span).with_message("opened here"),
                    ])
                    .with_notes(vec!["add a compound-end line to close it".to_string()]);
            }
            CopyError::Pattern(_) => {}
        }
        diagnostic
    }
}

/// Byte span of `lines` within the concatenated block, excluding the final line terminator.
fn byte_span<S: AsRef<str>>(block: &[S], lines: Range<usize>) -> Range<usize> {
    let end_line = lines.end.min(block.len());
    let start_line = lines.start.min(end_line);
    let start: usize = block[..start_line].iter().map(|l| l.as_ref().len()).sum();
    let text: String = block[start_line..end_line]
        .iter()
        .map(|l| l.as_ref())
        .collect();
    start..start + text.trim_end_matches(['\n', '\r']).len()
}

fn block_text<S: AsRef<str>>(block: &[S], span: Range<usize>) -> String {
    let text: String = block.iter().map(|l| l.as_ref()).collect();
    text.get(span).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_cover_whole_lines() {
        let block = ["ab\n", "cde\n", "f\n"];
        assert_eq!(byte_span(&block, 1..2), 3..6);
        assert_eq!(byte_span(&block, 0..3), 0..8);
    }

    #[test]
    fn expression_label_narrows_to_the_expression() {
        let block = ["one\n", "value: `oops`\n"];
        let err = CopyError::Expression {
            line: 1,
            expression: "oops".into(),
            source: "boom".into(),
        };
        let diagnostic = err.to_diagnostic(0, &block);
        assert_eq!(diagnostic.labels[0].range, 12..16);
        assert!(diagnostic.message.contains("line 2"));
    }

    #[test]
    fn unterminated_names_the_header_line() {
        let err = CopyError::Unterminated { line: 4 };
        assert_eq!(
            err.to_string(),
            "compound statement starting on line 5 is never closed"
        );
    }
}
