use std::ops::Range;

use regex::Regex;

use crate::error::PatternError;

/// A line matcher. Marker classes the caller does not use stay `Never`,
/// so the copier can test every class unconditionally.
#[derive(Debug, Clone, Default)]
pub enum Matcher {
    #[default]
    Never,
    Regex {
        /// The pattern as given, for searching anywhere in a line.
        anywhere: Regex,
        /// The same pattern anchored to the start of the text.
        prefix: Regex,
    },
}

impl Matcher {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        let compile = |text: &str| {
            Regex::new(text).map_err(|e| PatternError::Invalid {
                pattern: source.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Matcher::Regex {
            anywhere: compile(source)?,
            prefix: compile(&format!("^(?:{})", source))?,
        })
    }

    /// Match at the very start of `line`. Returns the text following the
    /// marker with leading whitespace removed.
    pub fn at_start<'l>(&self, line: &'l str) -> Option<&'l str> {
        match self {
            Matcher::Never => None,
            Matcher::Regex { prefix, .. } => {
                let m = prefix.find(line)?;
                Some(line[m.end()..].trim_start())
            }
        }
    }

    /// All non-overlapping matches in `line`, as (whole match span, group 1 text).
    pub fn expressions<'l>(&self, line: &'l str) -> Vec<(Range<usize>, &'l str)> {
        match self {
            Matcher::Never => Vec::new(),
            Matcher::Regex { anywhere, .. } => anywhere
                .captures_iter(line)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let inner = caps.get(1)?;
                    Some((whole.range(), inner.as_str()))
                })
                .collect(),
        }
    }
}

/// The six marker classes recognised by the copier.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    /// Delimits an inline expression; capture group 1 is the expression text.
    pub expression: Matcher,
    /// Prefix of a simple (single-line) statement.
    pub statement: Matcher,
    /// Prefix of a line continuing the previous statement or clause.
    pub continuation: Matcher,
    /// Prefix of the header line of a compound statement.
    pub compound_start: Matcher,
    /// Prefix of a further clause (`else`, `elif`) of a compound statement.
    pub compound_clause: Matcher,
    /// Prefix of the line terminating a compound statement.
    pub compound_end: Matcher,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The marker set used by the `stencil` driver:
    /// `` `expr` ``, `# stmt`, `#\ cont`, `#> start`, `#= clause`, `#< end`.
    pub fn conventional() -> Result<Self, PatternError> {
        PatternSet::new()
            .with_expression(r"`([^`]+)`")?
            .with_statement("# ")?
            .with_continuation(r"#\\")?
            .with_compound_start("#>")?
            .with_compound_clause("#=")?
            .with_compound_end("#<")
    }

    pub fn with_expression(mut self, source: &str) -> Result<Self, PatternError> {
        let matcher = Matcher::new(source)?;
        if let Matcher::Regex { anywhere, .. } = &matcher {
            if anywhere.captures_len() < 2 {
                return Err(PatternError::MissingCapture(source.to_string()));
            }
        }
        self.expression = matcher;
        Ok(self)
    }

    pub fn with_statement(mut self, source: &str) -> Result<Self, PatternError> {
        self.statement = Matcher::new(source)?;
        Ok(self)
    }

    pub fn with_continuation(mut self, source: &str) -> Result<Self, PatternError> {
        self.continuation = Matcher::new(source)?;
        Ok(self)
    }

    pub fn with_compound_start(mut self, source: &str) -> Result<Self, PatternError> {
        self.compound_start = Matcher::new(source)?;
        Ok(self)
    }

    pub fn with_compound_clause(mut self, source: &str) -> Result<Self, PatternError> {
        self.compound_clause = Matcher::new(source)?;
        Ok(self)
    }

    pub fn with_compound_end(mut self, source: &str) -> Result<Self, PatternError> {
        self.compound_end = Matcher::new(source)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_matches_nothing() {
        let m = Matcher::Never;
        assert_eq!(m.at_start("# anything\n"), None);
        assert!(m.expressions("`x`").is_empty());
    }

    #[test]
    fn at_start_requires_line_start() {
        let m = Matcher::new("# ").unwrap();
        assert_eq!(m.at_start("#  x += 1\n"), Some("x += 1\n"));
        assert_eq!(m.at_start("text # x\n"), None);
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let m = Matcher::new("#>|%>").unwrap();
        assert_eq!(m.at_start("%> for x in y:\n"), Some("for x in y:\n"));
        assert_eq!(m.at_start("text #> not a marker\n"), None);
        assert_eq!(m.at_start("text %> not a marker\n"), None);
    }

    #[test]
    fn expressions_report_spans_and_captures() {
        let m = Matcher::new(r"`([^`]+)`").unwrap();
        let found = m.expressions("a `x` b `y*2` c");
        assert_eq!(found, vec![(2..5, "x"), (8..13, "y*2")]);
    }

    #[test]
    fn expression_pattern_needs_a_group() {
        let err = PatternSet::new().with_expression("`[^`]+`").unwrap_err();
        assert!(matches!(err, PatternError::MissingCapture(_)));
    }

    #[test]
    fn invalid_regex_is_reported() {
        assert!(matches!(
            PatternSet::new().with_statement("(").unwrap_err(),
            PatternError::Invalid { .. }
        ));
    }

    #[test]
    fn conventional_set_recognises_markers() {
        let set = PatternSet::conventional().unwrap();
        assert_eq!(set.compound_start.at_start("#> if x:\n"), Some("if x:\n"));
        assert_eq!(set.continuation.at_start("#\\    1)\n"), Some("1)\n"));
        assert_eq!(set.compound_end.at_start("#<\n"), Some(""));
        assert!(set.statement.at_start("#> if x:\n").is_none());
    }
}
