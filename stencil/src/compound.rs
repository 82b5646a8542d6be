use std::ops::Range;

/// Source text assembled from one marker line and its continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Marker-stripped lines joined in order; every line ends in `\n`.
    pub text: String,
    /// Block lines the fragment was assembled from.
    pub lines: Range<usize>,
}

impl Fragment {
    pub fn new(first: &str, line: usize) -> Self {
        let mut fragment = Fragment {
            text: String::new(),
            lines: line..line,
        };
        fragment.push(first, line);
        fragment
    }

    /// Append a continuation line.
    pub fn push(&mut self, part: &str, line: usize) {
        self.text.push_str(part);
        if !part.ends_with('\n') {
            self.text.push('\n');
        }
        self.lines.end = line + 1;
    }

    /// Index of the last block line consumed.
    pub fn last_line(&self) -> usize {
        self.lines.end - 1
    }
}

/// One node of an assembled compound statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The opening clause (`for ...:`, `if ...:`).
    Header(Fragment),
    /// A follow-on clause (`elif ...:`, `else:`).
    Clause(Fragment),
    /// Copy these block lines through the copier.
    Copy(Range<usize>),
}

/// A compound statement split into clauses and body ranges, in source order:
/// `Header, Copy, (Clause, Copy)*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub steps: Vec<Step>,
    /// Block lines from the header through the terminating line.
    pub lines: Range<usize>,
}

/// A clause paired with the body it controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clause<'a> {
    pub fragment: &'a Fragment,
    pub body: &'a Range<usize>,
}

impl Compound {
    pub fn header(&self) -> Option<&Fragment> {
        match self.steps.first() {
            Some(Step::Header(fragment)) => Some(fragment),
            _ => None,
        }
    }

    /// Clauses in source order, header first.
    pub fn clauses(&self) -> Vec<Clause<'_>> {
        self.steps
            .chunks(2)
            .filter_map(|pair| match pair {
                [Step::Header(fragment) | Step::Clause(fragment), Step::Copy(body)] => {
                    Some(Clause { fragment, body })
                }
                _ => None,
            })
            .collect()
    }
}
