//! Syntax tree for the callable source subset the runtime can execute.
//!
//! The parser in `parser.rs` emits this representation. Function objects on
//! the heap keep their parsed body next to their source text, so invoking a
//! function never re-parses it.

use serde::{Deserialize, Serialize};

/// Byte range of a token plus the one-based line and column it starts at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub range: std::ops::Range<usize>,
    pub line: u32,
    pub column: u32,
}

impl SourceSpan {
    pub fn locate(text: &str, start: usize, end: usize) -> Self {
        let (line, column) = line_column(text, start);
        Self {
            range: start..end,
            line,
            column,
        }
    }
}

fn line_column(text: &str, offset: usize) -> (u32, u32) {
    let end = text
        .char_indices()
        .map(|(index, _)| index)
        .find(|&index| index >= offset)
        .unwrap_or(text.len());
    let before = &text[..end];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map_or(0, |nl| nl + 1);
    let column = before[line_start..].chars().count() as u32 + 1;
    (line, column)
}

/// How a callable was written; decides `this` binding and constructibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    /// `function name(..) { .. }`: constructible, owns a `prototype`.
    Normal,
    /// `(..) => ..`: no own `this`, not constructible.
    Arrow,
    /// Method shorthand `name(..) { .. }`.
    Method,
    /// Accessor shorthand `get name() { .. }`.
    Getter,
    /// Accessor shorthand `set name(v) { .. }`.
    Setter,
}

/// Body of a callable: a statement block or an arrow's concise expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Box<Expression>),
}

/// A parsed callable: everything needed to build a function object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub kind: FunctionKind,
}

/// One member of a class body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMember {
    pub is_static: bool,
    pub function: FunctionNode,
    /// Verbatim source of the member, e.g. `sum(x) { return this.b + x; }`.
    pub source: String,
}

/// A parsed class declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub name: Option<String>,
    pub constructor: Option<FunctionNode>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Return(Option<Expression>),
    Declaration {
        kind: DeclarationKind,
        name: String,
        init: Option<Expression>,
    },
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    Block(Vec<Statement>),
    Expression(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    StrictEq,
    StrictNotEq,
    LooseEq,
    LooseNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
}

impl AssignOperator {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary(self) -> Option<BinaryOperator> {
        match self {
            Self::Assign => None,
            Self::AddAssign => Some(BinaryOperator::Add),
            Self::SubAssign => Some(BinaryOperator::Sub),
            Self::MulAssign => Some(BinaryOperator::Mul),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Identifier(String),
    This,
    Array(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    Member {
        object: Box<Expression>,
        property: MemberProperty,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    New {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        argument: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assign {
        operator: AssignOperator,
        target: Box<Expression>,
        value: Box<Expression>,
    },
}
