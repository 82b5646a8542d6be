use crate::ast::{BinaryOperator, ClauseHeader, Expr, LogicalOperator, Statement, Target, UnaryOperator};
use crate::error::RuntimeError;
use crate::lexer::{Spanned, Token, tokenize};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse an inline expression. A bare comma list yields a tuple.
pub fn parse_expression(source: &str) -> Result<Expr, RuntimeError> {
    let mut parser = ExprParser::new(tokenize(source)?, source.len());
    parser.skip_newlines();
    let expr = parser.parse_expression_list(0)?;
    parser.skip_newlines();
    if !parser.at_end() {
        return Err(parser.error("unexpected tokens after expression"));
    }
    Ok(expr)
}

/// Parse a sequence of simple statements separated by newlines or `;`.
pub fn parse_statements(source: &str) -> Result<Vec<Statement>, RuntimeError> {
    let mut parser = ExprParser::new(tokenize(source)?, source.len());
    let mut statements = Vec::new();
    while !parser.at_end() {
        if parser.eat(&Token::Newline) {
            continue;
        }
        statements.push(parser.parse_statement()?);
        if !parser.at_end() && !parser.eat(&Token::Newline) {
            return Err(parser.error("expected end of statement"));
        }
    }
    Ok(statements)
}

/// Parse the header of one clause of a compound statement (`for x in y:`).
pub fn parse_clause_header(source: &str) -> Result<ClauseHeader, RuntimeError> {
    let mut parser = ExprParser::new(tokenize(source)?, source.len());
    parser.skip_newlines();

    let keyword = parser
        .advance()
        .ok_or_else(|| parser.error("empty compound statement header"))?;
    let header = match keyword {
        Token::If => ClauseHeader::If(parser.parse_expr(0)?),
        Token::Elif => ClauseHeader::Elif(parser.parse_expr(0)?),
        Token::Else => ClauseHeader::Else,
        Token::While => ClauseHeader::While(parser.parse_expr(0)?),
        Token::For => {
            // Stop before `in`, which would otherwise parse as a comparison.
            let target = parser.parse_expression_list(BP_COMPARISON + 1)?;
            let target = to_target(target).map_err(|m| parser.error(m))?;
            if !parser.eat(&Token::In) {
                return Err(parser.error("expected 'in' in for statement"));
            }
            let iterable = parser.parse_expression_list(0)?;
            ClauseHeader::For { target, iterable }
        }
        other => {
            return Err(RuntimeError::UnsupportedCompound(format!(
                "'{}' cannot open a clause",
                describe(&other)
            )));
        }
    };

    if !parser.eat(&Token::Colon) {
        return Err(parser.error(format!("expected ':' after {} clause", header.keyword())));
    }
    parser.skip_newlines();
    if !parser.at_end() {
        return Err(parser.error("a clause header must end after ':'"));
    }
    Ok(header)
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Offset reported for errors at end of input.
    end_offset: usize,
}

// Binding powers (precedence). Higher = tighter binding.
// Left bp, right bp. For left-assoc: right = left + 1. For right-assoc: right = left - 1.
const BP_CONDITIONAL: u8 = 2;     // x if c else y
const BP_OR: u8 = 4;              // or
const BP_AND: u8 = 6;             // and
const BP_NOT: u8 = 7;             // not
const BP_COMPARISON: u8 = 8;      // == != < > <= >= in, not in
const BP_ADDITIVE: u8 = 12;       // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / // %
const BP_UNARY: u8 = 16;          // -x
const BP_POWER: u8 = 18;          // **

impl ExprParser {
    fn new(tokens: Vec<Spanned>, end_offset: usize) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            end_offset,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.token.clone();
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    fn error(&self, msg: impl Into<String>) -> RuntimeError {
        let offset = self
            .tokens
            .get(self.pos)
            .map_or(self.end_offset, |s| s.offset);
        RuntimeError::syntax(msg, offset)
    }

    fn expect(&mut self, expected: Token) -> Result<(), RuntimeError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", describe(&expected))))
        }
    }

    fn expect_ident(&mut self) -> Result<String, RuntimeError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("expected identifier"))
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, RuntimeError> {
        if self.eat(&Token::Pass) {
            return Ok(Statement::Pass);
        }

        let first = self.parse_expression_list(0)?;

        if self.peek() == Some(&Token::Eq) {
            let mut targets = vec![to_target(first).map_err(|m| self.error(m))?];
            loop {
                self.advance();
                let value = self.parse_expression_list(0)?;
                if self.peek() == Some(&Token::Eq) {
                    targets.push(to_target(value).map_err(|m| self.error(m))?);
                } else {
                    return Ok(Statement::Assignment { targets, value });
                }
            }
        }

        let augmented = match self.peek() {
            Some(Token::PlusEq) => Some(BinaryOperator::Addition),
            Some(Token::MinusEq) => Some(BinaryOperator::Subtraction),
            Some(Token::StarEq) => Some(BinaryOperator::Multiplication),
            Some(Token::SlashEq) => Some(BinaryOperator::Division),
            Some(Token::SlashSlashEq) => Some(BinaryOperator::FloorDivision),
            Some(Token::PercentEq) => Some(BinaryOperator::Modulo),
            _ => None,
        };
        if let Some(operator) = augmented {
            let target = to_target(first).map_err(|m| self.error(m))?;
            if matches!(target, Target::Tuple(_)) {
                return Err(self.error("augmented assignment needs a single target"));
            }
            self.advance();
            let value = self.parse_expression_list(0)?;
            return Ok(Statement::AugmentedAssignment {
                target,
                operator,
                value,
            });
        }

        Ok(Statement::Expression(first))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// `a, b, c` → tuple; a single expression without a comma stays as is.
    fn parse_expression_list(&mut self, min_bp: u8) -> Result<Expr, RuntimeError> {
        let first = self.parse_expr(min_bp)?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at_list_end() {
                break;
            }
            items.push(self.parse_expr(min_bp)?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_list_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(
                Token::Newline
                    | Token::Eq
                    | Token::Colon
                    | Token::In
                    | Token::RParen
                    | Token::PlusEq
                    | Token::MinusEq
                    | Token::StarEq
                    | Token::SlashEq
                    | Token::SlashSlashEq
                    | Token::PercentEq
            )
        )
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_prefix()?;

        loop {
            let Some(token) = self.peek() else { break };

            // Postfix operators bind tighter than anything else.
            match token {
                Token::LParen => {
                    self.advance();
                    let arguments = self.parse_sequence(Token::RParen)?;
                    left = Expr::Call {
                        callee: Box::new(left),
                        arguments,
                    };
                    continue;
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression_list(0)?;
                    self.expect(Token::RBracket)?;
                    left = Expr::Subscript {
                        value: Box::new(left),
                        index: Box::new(index),
                    };
                    continue;
                }
                Token::Dot => {
                    self.advance();
                    let method = self.expect_ident()?;
                    if !self.eat(&Token::LParen) {
                        return Err(self.error(format!(
                            "attribute '{}' is not supported, only method calls",
                            method
                        )));
                    }
                    let arguments = self.parse_sequence(Token::RParen)?;
                    left = Expr::MethodCall {
                        receiver: Box::new(left),
                        method,
                        arguments,
                    };
                    continue;
                }
                _ => {}
            }

            let Some((l_bp, r_bp)) = infix_bp(token, self.peek_next()) else { break };
            if l_bp < min_bp {
                break;
            }

            let op = self.advance().ok_or_else(|| self.error("unexpected end of expression"))?;

            // Conditional expression: then if condition else otherwise
            if op == Token::If {
                let condition = self.parse_expr(BP_OR)?;
                if !self.eat(&Token::Else) {
                    return Err(self.error("expected 'else' in conditional expression"));
                }
                let otherwise = self.parse_expr(r_bp)?;
                left = Expr::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(left),
                    otherwise: Box::new(otherwise),
                };
                continue;
            }

            let logical = match op {
                Token::And => Some(LogicalOperator::And),
                Token::Or => Some(LogicalOperator::Or),
                _ => None,
            };
            if let Some(operator) = logical {
                let right = self.parse_expr(r_bp)?;
                left = Expr::Logical {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            let operator = match op {
                Token::Plus => BinaryOperator::Addition,
                Token::Minus => BinaryOperator::Subtraction,
                Token::Star => BinaryOperator::Multiplication,
                Token::Slash => BinaryOperator::Division,
                Token::SlashSlash => BinaryOperator::FloorDivision,
                Token::Percent => BinaryOperator::Modulo,
                Token::StarStar => BinaryOperator::Power,
                Token::EqEq => BinaryOperator::Equality,
                Token::BangEq => BinaryOperator::Inequality,
                Token::Gt => BinaryOperator::GreaterThan,
                Token::Lt => BinaryOperator::LessThan,
                Token::GtEq => BinaryOperator::GreaterThanOrEqual,
                Token::LtEq => BinaryOperator::LessThanOrEqual,
                Token::In => BinaryOperator::In,
                Token::Not => {
                    // `not in`; infix_bp only admits `not` when `in` follows.
                    self.advance();
                    BinaryOperator::NotIn
                }
                _ => return Err(self.error("unexpected infix operator")),
            };
            let right = self.parse_expr(r_bp)?;
            left = Expr::BinaryOperation {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, RuntimeError> {
        let token = self
            .advance()
            .ok_or_else(|| self.error("unexpected end of expression"))?;

        match token {
            // Literals
            Token::Number(n) => Ok(Expr::NumberLiteral(n)),
            Token::Str(mut s) => {
                // Adjacent literals concatenate: 'a' 'b'
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::StringLiteral(s))
            }
            Token::True => Ok(Expr::BooleanLiteral(true)),
            Token::False => Ok(Expr::BooleanLiteral(false)),
            Token::None => Ok(Expr::NoneLiteral),

            Token::Ident(name) => Ok(Expr::VariableReference(name)),

            // Unary operators
            Token::Minus => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::UnaryOperation {
                    operator: UnaryOperator::Negation,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => self.parse_expr(BP_UNARY),
            Token::Not => {
                let operand = self.parse_expr(BP_NOT)?;
                Ok(Expr::UnaryOperation {
                    operator: UnaryOperator::LogicalNot,
                    operand: Box::new(operand),
                })
            }

            // Parenthesized expression or tuple
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let expr = self.parse_expression_list(0)?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::LBracket => Ok(Expr::List(self.parse_sequence(Token::RBracket)?)),

            Token::LBrace => {
                let mut entries = Vec::new();
                while !self.eat(&Token::RBrace) {
                    let key = self.parse_expr(0)?;
                    self.expect(Token::Colon)?;
                    let value = self.parse_expr(0)?;
                    entries.push((key, value));
                    if !self.eat(&Token::Comma) {
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Dict(entries))
            }

            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }

    /// Comma-separated expressions up to `close` (consumed). Trailing comma allowed.
    fn parse_sequence(&mut self, close: Token) -> Result<Vec<Expr>, RuntimeError> {
        let mut items = Vec::new();
        while !self.eat(&close) {
            items.push(self.parse_expr(0)?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }
}

/// Infix binding powers: returns (left_bp, right_bp) or None if not infix.
fn infix_bp(token: &Token, next: Option<&Token>) -> Option<(u8, u8)> {
    match token {
        Token::If => Some((BP_CONDITIONAL, BP_CONDITIONAL)),
        Token::Or => Some((BP_OR, BP_OR + 1)),
        Token::And => Some((BP_AND, BP_AND + 1)),
        Token::EqEq
        | Token::BangEq
        | Token::Gt
        | Token::Lt
        | Token::GtEq
        | Token::LtEq
        | Token::In => Some((BP_COMPARISON, BP_COMPARISON + 1)),
        Token::Not if next == Some(&Token::In) => Some((BP_COMPARISON, BP_COMPARISON + 1)),
        Token::Plus | Token::Minus => Some((BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Star | Token::Slash | Token::SlashSlash | Token::Percent => {
            Some((BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1))
        }
        Token::StarStar => Some((BP_POWER, BP_POWER - 1)),
        _ => None,
    }
}

/// Reinterpret a parsed expression as an assignment target.
fn to_target(expr: Expr) -> Result<Target, String> {
    match expr {
        Expr::VariableReference(name) => Ok(Target::Name(name)),
        Expr::Tuple(items) | Expr::List(items) => items
            .into_iter()
            .map(to_target)
            .collect::<Result<_, _>>()
            .map(Target::Tuple),
        Expr::Subscript { value, index } => match *value {
            Expr::VariableReference(name) => Ok(Target::Subscript {
                name,
                index: *index,
            }),
            _ => Err("only a named variable can be assigned by subscript".to_string()),
        },
        _ => Err("cannot assign to expression".to_string()),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Str(_) => "string".to_string(),
        Token::Ident(name) => format!("'{}'", name),
        Token::Newline => "end of statement".to_string(),
        Token::RParen => "')'".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::RBrace => "'}'".to_string(),
        Token::Colon => "':'".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::VariableReference(name.to_string())
    }

    fn num(n: f64) -> Expr {
        Expr::NumberLiteral(n)
    }

    fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOperation {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn precedence_follows_arithmetic() {
        assert_eq!(
            parse_expression("1 + 2 * 3").unwrap(),
            binary(
                BinaryOperator::Addition,
                num(1.0),
                binary(BinaryOperator::Multiplication, num(2.0), num(3.0))
            )
        );
    }

    #[test]
    fn power_is_right_associative_and_beats_negation() {
        assert_eq!(
            parse_expression("-2 ** 3 ** 2").unwrap(),
            Expr::UnaryOperation {
                operator: UnaryOperator::Negation,
                operand: Box::new(binary(
                    BinaryOperator::Power,
                    num(2.0),
                    binary(BinaryOperator::Power, num(3.0), num(2.0))
                )),
            }
        );
    }

    #[test]
    fn not_in_is_one_operator() {
        assert_eq!(
            parse_expression("'a' not in xs").unwrap(),
            binary(
                BinaryOperator::NotIn,
                Expr::StringLiteral("a".into()),
                var("xs")
            )
        );
    }

    #[test]
    fn postfix_chains() {
        assert_eq!(
            parse_expression("fields['title'].upper()").unwrap(),
            Expr::MethodCall {
                receiver: Box::new(Expr::Subscript {
                    value: Box::new(var("fields")),
                    index: Box::new(Expr::StringLiteral("title".into())),
                }),
                method: "upper".into(),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn conditional_expression() {
        assert_eq!(
            parse_expression("'big' if x > 23 else 'small'").unwrap(),
            Expr::Conditional {
                condition: Box::new(binary(BinaryOperator::GreaterThan, var("x"), num(23.0))),
                then: Box::new(Expr::StringLiteral("big".into())),
                otherwise: Box::new(Expr::StringLiteral("small".into())),
            }
        );
    }

    #[test]
    fn statements_split_on_newlines_and_semicolons() {
        let statements = parse_statements("x = 1; y = 2\nx += \\\n 1\npass\n").unwrap();
        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[2],
            Statement::AugmentedAssignment {
                target: Target::Name("x".into()),
                operator: BinaryOperator::Addition,
                value: num(1.0),
            }
        );
        assert_eq!(statements[3], Statement::Pass);
    }

    #[test]
    fn tuple_and_chained_assignment() {
        assert_eq!(
            parse_statements("a, b = b, a").unwrap(),
            vec![Statement::Assignment {
                targets: vec![Target::Tuple(vec![
                    Target::Name("a".into()),
                    Target::Name("b".into())
                ])],
                value: Expr::Tuple(vec![var("b"), var("a")]),
            }]
        );
        let chained = parse_statements("a = b = 0").unwrap();
        assert!(matches!(&chained[0], Statement::Assignment { targets, .. } if targets.len() == 2));
    }

    #[test]
    fn invalid_targets_are_rejected() {
        assert!(parse_statements("f() = 1").is_err());
        assert!(parse_statements("a, b += 1").is_err());
    }

    #[test]
    fn clause_headers() {
        assert_eq!(
            parse_clause_header("if x>23:  # start of a compound statement\n").unwrap(),
            ClauseHeader::If(binary(BinaryOperator::GreaterThan, var("x"), num(23.0)))
        );
        assert_eq!(parse_clause_header("else:     # a clause\n").unwrap(), ClauseHeader::Else);
        assert_eq!(
            parse_clause_header("for i, name in enumerate(files):\n").unwrap(),
            ClauseHeader::For {
                target: Target::Tuple(vec![
                    Target::Name("i".into()),
                    Target::Name("name".into())
                ]),
                iterable: Expr::Call {
                    callee: Box::new(var("enumerate")),
                    arguments: vec![var("files")],
                },
            }
        );
    }

    #[test]
    fn clause_header_errors() {
        assert!(parse_clause_header("if x").is_err());
        assert!(parse_clause_header("if x: y = 1").is_err());
        assert!(matches!(
            parse_clause_header("try:"),
            Err(RuntimeError::UnsupportedCompound(_)) | Err(RuntimeError::Syntax { .. })
        ));
    }
}
