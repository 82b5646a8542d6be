#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    /// Arithmetic negation: -x
    Negation,
    /// Logical not: not x
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    FloorDivision,
    Modulo,
    Power,
    Equality,
    Inequality,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// An expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    NumberLiteral(f64),
    StringLiteral(String),
    BooleanLiteral(bool),
    NoneLiteral,

    VariableReference(String),

    // Displays
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),

    // Operations
    UnaryOperation {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    BinaryOperation {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Short-circuiting; yields one of its operands.
    Logical {
        operator: LogicalOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `then if condition else otherwise`
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    // Postfix
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        arguments: Vec<Expr>,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
}

/// The left-hand side of an assignment or a `for` loop variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
    /// `name[index] = ...`
    Subscript { name: String, index: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Evaluated for side effects, result discarded.
    Expression(Expr),
    /// `a = b = value`
    Assignment { targets: Vec<Target>, value: Expr },
    /// `target op= value`
    AugmentedAssignment {
        target: Target,
        operator: BinaryOperator,
        value: Expr,
    },
    Pass,
}

/// The opening line of one clause of a compound statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseHeader {
    If(Expr),
    Elif(Expr),
    Else,
    For { target: Target, iterable: Expr },
    While(Expr),
}

impl ClauseHeader {
    pub fn keyword(&self) -> &'static str {
        match self {
            ClauseHeader::If(_) => "if",
            ClauseHeader::Elif(_) => "elif",
            ClauseHeader::Else => "else",
            ClauseHeader::For { .. } => "for",
            ClauseHeader::While(_) => "while",
        }
    }
}
