use crate::error::RuntimeError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Str(String),
    True,
    False,
    None,

    Ident(String),

    // Keywords
    And,
    Or,
    Not,
    In,
    If,
    Elif,
    Else,
    For,
    While,
    Pass,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Eq,        // =
    EqEq,      // ==
    BangEq,    // !=
    Gt,
    Lt,
    GtEq,
    LtEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    SlashSlashEq,
    PercentEq,

    // Grouping & punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,

    /// Statement separator: a newline outside brackets, or `;`.
    Newline,
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, RuntimeError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let len = chars.len();
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    let at = |i: usize| chars.get(i).map(|&(_, c)| c);

    while i < len {
        let (offset, c) = chars[i];
        let mut push = |token: Token| tokens.push(Spanned { token, offset });

        match c {
            ' ' | '\t' | '\r' => i += 1,

            '\n' | ';' => {
                i += 1;
                if depth == 0 || c == ';' {
                    separate(&mut tokens, offset);
                }
            }

            // Explicit line join
            '\\' => {
                let mut j = i + 1;
                if at(j) == Some('\r') {
                    j += 1;
                }
                if at(j) == Some('\n') || j >= len {
                    i = j + 1;
                } else {
                    return Err(RuntimeError::syntax("unexpected '\\'", offset));
                }
            }

            '#' => {
                while i < len && chars[i].1 != '\n' {
                    i += 1;
                }
            }

            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match at(i) {
                        None | Some('\n') => {
                            return Err(RuntimeError::syntax("unterminated string", offset));
                        }
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = at(i + 1)
                                .ok_or_else(|| RuntimeError::syntax("unterminated string", offset))?;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                push(Token::Str(s));
            }

            '0'..='9' => {
                let start = i;
                while i < len && chars[i].1.is_ascii_digit() {
                    i += 1;
                }
                if at(i) == Some('.') && at(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                    i += 1;
                    while i < len && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
                let end = chars.get(i).map_or(source.len(), |&(o, _)| o);
                let n = source[chars[start].0..end]
                    .parse::<f64>()
                    .map_err(|e| RuntimeError::syntax(e.to_string(), offset))?;
                push(Token::Number(n));
            }

            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < len && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let end = chars.get(i).map_or(source.len(), |&(o, _)| o);
                let ident = &source[chars[start].0..end];
                push(match ident {
                    "True" => Token::True,
                    "False" => Token::False,
                    "None" => Token::None,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "if" => Token::If,
                    "elif" => Token::Elif,
                    "else" => Token::Else,
                    "for" => Token::For,
                    "while" => Token::While,
                    "pass" => Token::Pass,
                    _ => Token::Ident(ident.to_string()),
                });
            }

            '(' | '[' | '{' => {
                depth += 1;
                i += 1;
                push(match c {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                });
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                i += 1;
                push(match c {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                });
            }

            _ => {
                let next = at(i + 1);
                let third = at(i + 2);
                let (token, width) = match (c, next, third) {
                    ('*', Some('*'), _) => (Token::StarStar, 2),
                    ('/', Some('/'), Some('=')) => (Token::SlashSlashEq, 3),
                    ('/', Some('/'), _) => (Token::SlashSlash, 2),
                    ('=', Some('='), _) => (Token::EqEq, 2),
                    ('!', Some('='), _) => (Token::BangEq, 2),
                    ('>', Some('='), _) => (Token::GtEq, 2),
                    ('<', Some('='), _) => (Token::LtEq, 2),
                    ('+', Some('='), _) => (Token::PlusEq, 2),
                    ('-', Some('='), _) => (Token::MinusEq, 2),
                    ('*', Some('='), _) => (Token::StarEq, 2),
                    ('/', Some('='), _) => (Token::SlashEq, 2),
                    ('%', Some('='), _) => (Token::PercentEq, 2),
                    ('+', ..) => (Token::Plus, 1),
                    ('-', ..) => (Token::Minus, 1),
                    ('*', ..) => (Token::Star, 1),
                    ('/', ..) => (Token::Slash, 1),
                    ('%', ..) => (Token::Percent, 1),
                    ('=', ..) => (Token::Eq, 1),
                    ('>', ..) => (Token::Gt, 1),
                    ('<', ..) => (Token::Lt, 1),
                    (',', ..) => (Token::Comma, 1),
                    (':', ..) => (Token::Colon, 1),
                    ('.', ..) => (Token::Dot, 1),
                    _ => {
                        return Err(RuntimeError::syntax(
                            format!("unexpected character '{}'", c),
                            offset,
                        ));
                    }
                };
                i += width;
                push(token);
            }
        }
    }

    while matches!(tokens.last(), Some(Spanned { token: Token::Newline, .. })) {
        tokens.pop();
    }
    Ok(tokens)
}

/// Push a statement separator unless one is already pending.
fn separate(tokens: &mut Vec<Spanned>, offset: usize) {
    if matches!(tokens.last(), None | Some(Spanned { token: Token::Newline, .. })) {
        return;
    }
    tokens.push(Spanned {
        token: Token::Newline,
        offset,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn comments_and_joined_lines() {
        assert_eq!(
            kinds("x += \\\n     1     # a continuation\n"),
            vec![Token::Ident("x".into()), Token::PlusEq, Token::Number(1.0)]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_whitespace() {
        assert_eq!(
            kinds("x = (x +  # comment\n 1)\ny = 2"),
            vec![
                Token::Ident("x".into()),
                Token::Eq,
                Token::LParen,
                Token::Ident("x".into()),
                Token::Plus,
                Token::Number(1.0),
                Token::RParen,
                Token::Newline,
                Token::Ident("y".into()),
                Token::Eq,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn operators_take_the_longest_match() {
        assert_eq!(
            kinds("a //= 2 ** 3 != 4"),
            vec![
                Token::Ident("a".into()),
                Token::SlashSlashEq,
                Token::Number(2.0),
                Token::StarStar,
                Token::Number(3.0),
                Token::BangEq,
                Token::Number(4.0),
            ]
        );
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb""#),
            vec![Token::Str("it's".into()), Token::Str("a\tb".into())]
        );
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn keywords_are_recognised() {
        assert_eq!(
            kinds("for i in range(3):"),
            vec![
                Token::For,
                Token::Ident("i".into()),
                Token::In,
                Token::Ident("range".into()),
                Token::LParen,
                Token::Number(3.0),
                Token::RParen,
                Token::Colon,
            ]
        );
    }
}
