//! Deterministic parser for the callable source subset.
//!
//! Decoded functions and classes arrive as source text. This module turns a
//! function body, a parameter list, a concise arrow expression or a whole
//! class declaration into the `crate::ast` representation. Anything outside
//! the supported subset fails with [`ParseErrorCode::UnsupportedSyntax`]
//! rather than being approximated.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{
    AssignOperator, BinaryOperator, ClassMember, ClassNode, DeclarationKind, Expression,
    FunctionBody, FunctionKind, FunctionNode, LogicalOperator, MemberProperty, SourceSpan,
    Statement, UnaryOperator,
};
use crate::object_model::format_number;

pub type ParseResult<T> = Result<T, ParseError>;

const INLINE_LABEL: &str = "<inline>";

/// Deepest statement or expression nesting the parser descends into.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Stable parse error codes for deterministic diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseErrorCode {
    EmptySource,
    UnexpectedToken,
    UnexpectedEnd,
    UnterminatedString,
    UnterminatedComment,
    InvalidNumber,
    InvalidAssignmentTarget,
    UnsupportedSyntax,
    NestingTooDeep,
}

/// Deterministic parse error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub message: String,
    pub source_label: String,
    pub span: Option<SourceSpan>,
}

impl ParseError {
    pub(crate) fn new(
        code: ParseErrorCode,
        message: impl Into<String>,
        source_label: impl Into<String>,
        span: Option<SourceSpan>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source_label: source_label.into(),
            span,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(
                f,
                "{:?}: {} (source={}, line={}, column={})",
                self.code, self.message, self.source_label, span.line, span.column
            ),
            None => write!(
                f,
                "{:?}: {} (source={})",
                self.code, self.message, self.source_label
            ),
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Parse the statements of a block body (the text between the braces).
pub fn parse_function_body(text: &str) -> ParseResult<Vec<Statement>> {
    let mut parser = Parser::new(text, INLINE_LABEL)?;
    parser.parse_statements_until(None)
}

/// Parse a single expression spanning the whole text.
pub fn parse_expression(text: &str) -> ParseResult<Expression> {
    if text.trim().is_empty() {
        return Err(ParseError::new(
            ParseErrorCode::EmptySource,
            "expression is empty",
            INLINE_LABEL,
            None,
        ));
    }
    let mut parser = Parser::new(text, INLINE_LABEL)?;
    let expression = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expression)
}

/// Parse a comma-separated list of plain parameter names.
pub fn parse_parameters(text: &str) -> ParseResult<Vec<String>> {
    let mut parser = Parser::new(text, INLINE_LABEL)?;
    parser.parse_parameter_items(None)
}

/// Parse a whole `class Name { ... }` declaration.
pub fn parse_class(text: &str) -> ParseResult<ClassNode> {
    let mut parser = Parser::new(text, INLINE_LABEL)?;
    let class = parser.parse_class()?;
    parser.expect_end()?;
    Ok(class)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Str(String),
    Name(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
    newline_before: bool,
}

/// Longest first; every multi-character operator precedes its prefixes.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "...", "**", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "+=", "-=", "*=",
    "/=", "%=", "++", "--", "{", "}", "(", ")", "[", "]", ";", ",", ".", "?", ":", "+", "-", "*",
    "/", "%", "<", ">", "!", "=", "&", "|", "^", "~",
];

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "with", "yield", "await",
];

const UNSUPPORTED_STATEMENTS: &[&str] = &[
    "for", "while", "do", "switch", "try", "throw", "break", "continue", "function", "class",
    "import", "export", "with", "debugger", "async",
];

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_ident_part(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

fn tokenize(text: &str, label: &str) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut index = 0usize;
    let mut newline_before = false;

    while index < text.len() {
        let rest = &text[index..];
        let Some(ch) = rest.chars().next() else {
            break;
        };
        if ch == '\n' {
            newline_before = true;
            index += 1;
            continue;
        }
        if ch.is_whitespace() {
            index += ch.len_utf8();
            continue;
        }
        if rest.starts_with("//") {
            index += rest.find('\n').unwrap_or(rest.len());
            continue;
        }
        if let Some(comment) = rest.strip_prefix("/*") {
            let Some(close) = comment.find("*/") else {
                return Err(ParseError::new(
                    ParseErrorCode::UnterminatedComment,
                    "block comment is not terminated",
                    label,
                    Some(SourceSpan::locate(text, index, text.len())),
                ));
            };
            if comment[..close].contains('\n') {
                newline_before = true;
            }
            index += close + 4;
            continue;
        }

        let start = index;
        let next_is_digit = rest[ch.len_utf8()..].starts_with(|c: char| c.is_ascii_digit());
        let kind = if ch.is_ascii_digit() || (ch == '.' && next_is_digit) {
            let (value, len) = lex_number(rest).ok_or_else(|| {
                ParseError::new(
                    ParseErrorCode::InvalidNumber,
                    "invalid numeric literal",
                    label,
                    Some(SourceSpan::locate(text, start, start + 1)),
                )
            })?;
            index += len;
            TokenKind::Number(value)
        } else if ch == '"' || ch == '\'' {
            let (value, len) = lex_string(rest, ch).ok_or_else(|| {
                ParseError::new(
                    ParseErrorCode::UnterminatedString,
                    "string literal is not terminated",
                    label,
                    Some(SourceSpan::locate(text, start, text.len())),
                )
            })?;
            index += len;
            TokenKind::Str(value)
        } else if ch == '`' {
            return Err(ParseError::new(
                ParseErrorCode::UnsupportedSyntax,
                "template literals are not supported",
                label,
                Some(SourceSpan::locate(text, start, start + 1)),
            ));
        } else if is_ident_start(ch) {
            let len = rest
                .find(|c: char| !is_ident_part(c))
                .unwrap_or(rest.len());
            index += len;
            TokenKind::Name(rest[..len].to_string())
        } else if let Some(punct) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            index += punct.len();
            TokenKind::Punct(*punct)
        } else {
            return Err(ParseError::new(
                ParseErrorCode::UnexpectedToken,
                format!("unexpected character `{ch}`"),
                label,
                Some(SourceSpan::locate(text, start, start + ch.len_utf8())),
            ));
        };

        tokens.push(Token {
            kind,
            start,
            end: index,
            newline_before,
        });
        newline_before = false;
    }

    Ok(tokens)
}

fn lex_number(rest: &str) -> Option<(f64, usize)> {
    let bytes = rest.as_bytes();
    let radix = match (bytes.first(), bytes.get(1)) {
        (Some(b'0'), Some(b'x' | b'X')) => Some(16),
        (Some(b'0'), Some(b'o' | b'O')) => Some(8),
        (Some(b'0'), Some(b'b' | b'B')) => Some(2),
        _ => None,
    };

    let (value, len) = if let Some(radix) = radix {
        let digits_len = rest[2..]
            .find(|c: char| !(c.is_digit(radix) || c == '_'))
            .unwrap_or(rest.len() - 2);
        let digits: String = rest[2..2 + digits_len]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if digits.is_empty() {
            return None;
        }
        (u64::from_str_radix(&digits, radix).ok()? as f64, 2 + digits_len)
    } else {
        let digits = |mut end: usize| {
            while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'_') {
                end += 1;
            }
            end
        };
        let mut end = digits(0);
        if end < bytes.len() && bytes[end] == b'.' {
            end = digits(end + 1);
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exponent = end + 1;
            if exponent < bytes.len() && (bytes[exponent] == b'+' || bytes[exponent] == b'-') {
                exponent += 1;
            }
            let exponent_digits = exponent;
            while exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
                exponent += 1;
            }
            if exponent > exponent_digits {
                end = exponent;
            }
        }
        let cleaned: String = rest[..end].chars().filter(|c| *c != '_').collect();
        (cleaned.parse::<f64>().ok()?, end)
    };

    // `10n` (bigint) and `3in` are not numbers of this subset.
    if rest[len..].starts_with(|c: char| is_ident_part(c)) {
        return None;
    }
    Some((value, len))
}

fn take_hex(chars: &mut impl Iterator<Item = (usize, char)>, count: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..count {
        let (_, ch) = chars.next()?;
        code = code * 16 + ch.to_digit(16)?;
    }
    char::from_u32(code)
}

fn lex_string(rest: &str, quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((index, ch)) = chars.next() {
        match ch {
            c if c == quote => return Some((out, index + c.len_utf8())),
            '\n' => return None,
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    'x' => out.push(take_hex(&mut chars, 2)?),
                    'u' => {
                        let mut lookahead = chars.clone();
                        if matches!(lookahead.next(), Some((_, '{'))) {
                            chars.next();
                            let mut code = 0u32;
                            loop {
                                let (_, digit) = chars.next()?;
                                if digit == '}' {
                                    break;
                                }
                                code = code.checked_mul(16)?.checked_add(digit.to_digit(16)?)?;
                            }
                            out.push(char::from_u32(code)?);
                        } else {
                            out.push(take_hex(&mut chars, 4)?);
                        }
                    }
                    '\n' => {}
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

const BINARY_LEVELS: [&[(&str, BinaryOperator)]; 4] = [
    &[
        ("===", BinaryOperator::StrictEq),
        ("!==", BinaryOperator::StrictNotEq),
        ("==", BinaryOperator::LooseEq),
        ("!=", BinaryOperator::LooseNotEq),
    ],
    &[
        ("<", BinaryOperator::Less),
        (">", BinaryOperator::Greater),
        ("<=", BinaryOperator::LessEq),
        (">=", BinaryOperator::GreaterEq),
    ],
    &[("+", BinaryOperator::Add), ("-", BinaryOperator::Sub)],
    &[
        ("*", BinaryOperator::Mul),
        ("/", BinaryOperator::Div),
        ("%", BinaryOperator::Rem),
    ],
];

struct Parser<'a> {
    text: &'a str,
    label: &'a str,
    tokens: Vec<Token>,
    eof: Token,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, label: &'a str) -> ParseResult<Self> {
        let tokens = tokenize(text, label)?;
        Ok(Self {
            text,
            label,
            tokens,
            eof: Token {
                kind: TokenKind::Eof,
                start: text.len(),
                end: text.len(),
                newline_before: true,
            },
            pos: 0,
            depth: 0,
        })
    }

    // -- token helpers ------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens.get(self.pos + ahead).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(p) if *p == punct)
    }

    fn is_name(&self, name: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Name(n) if n == name)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(
        &self,
        code: ParseErrorCode,
        message: impl Into<String>,
        token: &Token,
    ) -> ParseError {
        ParseError::new(
            code,
            message,
            self.label,
            Some(SourceSpan::locate(self.text, token.start, token.end)),
        )
    }

    fn unexpected(&self) -> ParseError {
        let token = self.peek();
        match &token.kind {
            TokenKind::Eof => {
                self.error_at(ParseErrorCode::UnexpectedEnd, "unexpected end of input", token)
            }
            _ => self.error_at(
                ParseErrorCode::UnexpectedToken,
                format!("unexpected token `{}`", &self.text[token.start..token.end]),
                token,
            ),
        }
    }

    fn unsupported(&self, what: &str) -> ParseError {
        self.error_at(
            ParseErrorCode::UnsupportedSyntax,
            format!("{what} is not supported"),
            self.peek(),
        )
    }

    fn expect_punct(&mut self, punct: &str) -> ParseResult<Token> {
        if self.is_punct(punct) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_end(&self) -> ParseResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) if !RESERVED_WORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Any name (reserved words included) or a string, as after `.`.
    fn expect_property_name(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) | TokenKind::Str(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    // -- statements ---------------------------------------------------------

    fn parse_statements_until(&mut self, closing: Option<&str>) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            if let Some(closing) = closing
                && self.is_punct(closing)
            {
                break;
            }
            if self.at_end() {
                if closing.is_some() {
                    return Err(self.unexpected());
                }
                break;
            }
            self.parse_statement_into(&mut statements)?;
        }
        Ok(statements)
    }

    fn parse_single_statement(&mut self) -> ParseResult<Statement> {
        let mut statements = Vec::new();
        self.parse_statement_into(&mut statements)?;
        if statements.len() == 1
            && let Some(statement) = statements.pop()
        {
            return Ok(statement);
        }
        Ok(Statement::Block(statements))
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek().clone();
            return Err(self.error_at(
                ParseErrorCode::NestingTooDeep,
                format!("nesting deeper than {MAX_NESTING_DEPTH} levels"),
                &token,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn parse_statement_into(&mut self, out: &mut Vec<Statement>) -> ParseResult<()> {
        self.descend()?;
        let result = self.parse_statement_unguarded(out);
        self.ascend();
        result
    }

    fn parse_statement_unguarded(&mut self, out: &mut Vec<Statement>) -> ParseResult<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.eat_punct("{") {
            let body = self.parse_statements_until(Some("}"))?;
            self.expect_punct("}")?;
            out.push(Statement::Block(body));
            return Ok(());
        }

        let keyword = match &self.peek().kind {
            TokenKind::Name(name) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "return" => {
                self.advance();
                let argument = if self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_end()
                    || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_statement_end()?;
                out.push(Statement::Return(argument));
            }
            "let" | "const" | "var" => {
                self.advance();
                let kind = match keyword.as_str() {
                    "let" => DeclarationKind::Let,
                    "const" => DeclarationKind::Const,
                    _ => DeclarationKind::Var,
                };
                loop {
                    if self.is_punct("{") || self.is_punct("[") {
                        return Err(self.unsupported("destructuring"));
                    }
                    let name_token = self.peek().clone();
                    let name = self.expect_identifier()?;
                    let init = if self.eat_punct("=") {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    if kind == DeclarationKind::Const && init.is_none() {
                        return Err(self.error_at(
                            ParseErrorCode::UnexpectedToken,
                            format!("missing initializer in const declaration `{name}`"),
                            &name_token,
                        ));
                    }
                    out.push(Statement::Declaration { kind, name, init });
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.consume_statement_end()?;
            }
            "if" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.parse_single_statement()?);
                let alternate = if self.is_name("else") {
                    self.advance();
                    Some(Box::new(self.parse_single_statement()?))
                } else {
                    None
                };
                out.push(Statement::If {
                    test,
                    consequent,
                    alternate,
                });
            }
            keyword if UNSUPPORTED_STATEMENTS.contains(&keyword) => {
                return Err(self.unsupported(&format!("`{keyword}` statement")));
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_statement_end()?;
                out.push(Statement::Expression(expression));
            }
        }
        Ok(())
    }

    fn consume_statement_end(&mut self) -> ParseResult<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.is_punct("}") || self.at_end() || self.peek().newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // -- expressions --------------------------------------------------------

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_assignment()
    }

    fn looks_like_arrow(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Name(_) => matches!(self.peek_at(1).kind, TokenKind::Punct("=>")),
            TokenKind::Punct("(") => {
                let mut depth = 0usize;
                for (offset, token) in self.tokens[self.pos..].iter().enumerate() {
                    match token.kind {
                        TokenKind::Punct("(") => depth += 1,
                        TokenKind::Punct(")") => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                return matches!(
                                    self.peek_at(offset + 1).kind,
                                    TokenKind::Punct("=>")
                                );
                            }
                        }
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        self.descend()?;
        let result = self.parse_assignment_unguarded();
        self.ascend();
        result
    }

    fn parse_assignment_unguarded(&mut self) -> ParseResult<Expression> {
        if self.looks_like_arrow() {
            return Err(self.unsupported("nested arrow function"));
        }
        let start = self.peek().clone();
        let target = self.parse_conditional()?;
        let operator = match &self.peek().kind {
            TokenKind::Punct("=") => AssignOperator::Assign,
            TokenKind::Punct("+=") => AssignOperator::AddAssign,
            TokenKind::Punct("-=") => AssignOperator::SubAssign,
            TokenKind::Punct("*=") => AssignOperator::MulAssign,
            TokenKind::Punct("/=" | "%=") => {
                return Err(self.unsupported("this compound assignment"));
            }
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expression::Identifier(_) | Expression::Member { .. }
        ) {
            return Err(self.error_at(
                ParseErrorCode::InvalidAssignmentTarget,
                "invalid assignment target",
                &start,
            ));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expression::Assign {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let test = self.parse_logical(LogicalOperator::Or)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_logical(&mut self, operator: LogicalOperator) -> ParseResult<Expression> {
        let (punct, next) = match operator {
            LogicalOperator::Or => ("||", Some(LogicalOperator::And)),
            LogicalOperator::And => ("&&", None),
        };
        let operand = |parser: &mut Self| match next {
            Some(next) => parser.parse_logical(next),
            None => parser.parse_binary(0),
        };
        let mut left = operand(self)?;
        while self.eat_punct(punct) {
            let right = operand(self)?;
            left = Expression::Logical {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        if self.is_punct("??") {
            return Err(self.unsupported("nullish coalescing"));
        }
        Ok(left)
    }

    fn parse_binary(&mut self, level: usize) -> ParseResult<Expression> {
        let Some(table) = BINARY_LEVELS.get(level) else {
            return self.parse_unary();
        };
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let operator = match &self.peek().kind {
                TokenKind::Punct(p) => table
                    .iter()
                    .find(|(symbol, _)| symbol == p)
                    .map(|(_, operator)| *operator),
                _ => None,
            };
            let Some(operator) = operator else {
                break;
            };
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Expression::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        if self.is_punct("**") {
            return Err(self.unsupported("exponentiation"));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOperator::Not),
            TokenKind::Punct("-") => Some(UnaryOperator::Minus),
            TokenKind::Punct("+") => Some(UnaryOperator::Plus),
            TokenKind::Name(name) if name == "typeof" => Some(UnaryOperator::TypeOf),
            TokenKind::Punct("++" | "--" | "~") => {
                return Err(self.unsupported("this unary operator"));
            }
            TokenKind::Name(name) if matches!(name.as_str(), "void" | "delete" | "await") => {
                return Err(self.unsupported(&format!("`{name}`")));
            }
            _ => None,
        };
        let Some(operator) = operator else {
            return self.parse_call_member();
        };
        self.advance();
        self.descend()?;
        let argument = self.parse_unary();
        self.ascend();
        Ok(Expression::Unary {
            operator,
            argument: Box::new(argument?),
        })
    }

    fn parse_member_suffix(&mut self, object: Expression) -> ParseResult<Option<Expression>> {
        if self.eat_punct(".") {
            let name = self.expect_property_name()?;
            return Ok(Some(Expression::Member {
                object: Box::new(object),
                property: MemberProperty::Named(name),
            }));
        }
        if self.eat_punct("[") {
            let property = self.parse_expression()?;
            self.expect_punct("]")?;
            return Ok(Some(Expression::Member {
                object: Box::new(object),
                property: MemberProperty::Computed(Box::new(property)),
            }));
        }
        Ok(None)
    }

    fn parse_call_member(&mut self) -> ParseResult<Expression> {
        let mut expression = if self.is_name("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.is_punct(".") || self.is_punct("[") {
                if let Some(member) = self.parse_member_suffix(expression.clone())? {
                    expression = member;
                }
                continue;
            }
            if self.is_punct("(") {
                let arguments = self.parse_arguments()?;
                expression = Expression::Call {
                    callee: Box::new(expression),
                    arguments,
                };
                continue;
            }
            break;
        }
        Ok(expression)
    }

    fn parse_new(&mut self) -> ParseResult<Expression> {
        self.advance();
        let mut callee = if self.is_name("new") {
            self.descend()?;
            let inner = self.parse_new();
            self.ascend();
            inner?
        } else {
            self.parse_primary()?
        };
        while self.is_punct(".") || self.is_punct("[") {
            match self.parse_member_suffix(callee.clone())? {
                Some(member) => callee = member,
                None => break,
            }
        }
        let arguments = if self.is_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect_punct("(")?;
        let mut arguments = Vec::new();
        while !self.is_punct(")") {
            if self.is_punct("...") {
                return Err(self.unsupported("spread argument"));
            }
            arguments.push(self.parse_assignment()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expression::Number(*value))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expression::String(value.clone()))
            }
            TokenKind::Name(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance();
                    Ok(Expression::Bool(name == "true"))
                }
                "null" => {
                    self.advance();
                    Ok(Expression::Null)
                }
                "undefined" => {
                    self.advance();
                    Ok(Expression::Undefined)
                }
                "this" => {
                    self.advance();
                    Ok(Expression::This)
                }
                "function" | "class" | "async" | "super" | "import" | "yield" => {
                    Err(self.unsupported(&format!("`{name}` expression")))
                }
                _ => Ok(Expression::Identifier(self.expect_identifier()?)),
            },
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => self.parse_array_literal(),
            TokenKind::Punct("{") => self.parse_object_literal(),
            TokenKind::Punct("/") => Err(self.unsupported("regular expression literal")),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.is_punct("]") {
            if self.is_punct(",") {
                return Err(self.unsupported("array hole"));
            }
            if self.is_punct("...") {
                return Err(self.unsupported("spread element"));
            }
            elements.push(self.parse_assignment()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        while !self.is_punct("}") {
            let key_token = self.peek().clone();
            let (key, shorthand_allowed) = match &key_token.kind {
                TokenKind::Name(name) => (name.clone(), !RESERVED_WORDS.contains(&name.as_str())),
                TokenKind::Str(value) => (value.clone(), false),
                TokenKind::Number(value) => (format_number(*value), false),
                TokenKind::Punct("[") => return Err(self.unsupported("computed property key")),
                TokenKind::Punct("...") => return Err(self.unsupported("object spread")),
                _ => return Err(self.unexpected()),
            };
            self.advance();
            let value = if self.eat_punct(":") {
                self.parse_assignment()?
            } else if self.is_punct("(") {
                return Err(self.unsupported("method in object literal"));
            } else if shorthand_allowed && (self.is_punct(",") || self.is_punct("}")) {
                Expression::Identifier(key.clone())
            } else {
                return Err(self.unexpected());
            };
            properties.push((key, value));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expression::Object(properties))
    }

    // -- parameters and classes ----------------------------------------------

    fn parse_parameter_items(&mut self, closing: Option<&str>) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        loop {
            let done = match closing {
                Some(closing) => self.is_punct(closing),
                None => self.at_end(),
            };
            if done {
                break;
            }
            if self.is_punct("...") {
                return Err(self.unsupported("rest parameter"));
            }
            if self.is_punct("{") || self.is_punct("[") {
                return Err(self.unsupported("destructuring parameter"));
            }
            params.push(self.expect_identifier()?);
            if self.is_punct("=") {
                return Err(self.unsupported("default parameter value"));
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        match closing {
            Some(closing) => {
                self.expect_punct(closing)?;
            }
            None => self.expect_end()?,
        }
        Ok(params)
    }

    fn parse_class(&mut self) -> ParseResult<ClassNode> {
        if !self.is_name("class") {
            return Err(self.unexpected());
        }
        self.advance();
        let name = if matches!(&self.peek().kind, TokenKind::Name(n) if n != "extends") {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        if self.is_name("extends") {
            return Err(self.unsupported("class inheritance"));
        }
        self.expect_punct("{")?;

        let mut constructor = None;
        let mut members = Vec::new();
        while !self.is_punct("}") {
            if self.at_end() {
                return Err(self.unexpected());
            }
            if self.eat_punct(";") {
                continue;
            }
            let start = self.peek().start;
            let is_static =
                self.is_name("static") && !matches!(self.peek_at(1).kind, TokenKind::Punct("("));
            if is_static {
                self.advance();
            }
            let mut kind = FunctionKind::Method;
            if (self.is_name("get") || self.is_name("set"))
                && matches!(self.peek_at(1).kind, TokenKind::Name(_) | TokenKind::Str(_))
            {
                kind = if self.is_name("get") {
                    FunctionKind::Getter
                } else {
                    FunctionKind::Setter
                };
                self.advance();
            }
            if self.is_punct("[") {
                return Err(self.unsupported("computed class member"));
            }
            let name_token = self.peek().clone();
            let name = self.expect_property_name()?;
            if !self.is_punct("(") {
                return Err(self.unsupported("class field"));
            }
            self.advance();
            let params = self.parse_parameter_items(Some(")"))?;
            match kind {
                FunctionKind::Getter if !params.is_empty() => {
                    return Err(self.error_at(
                        ParseErrorCode::UnexpectedToken,
                        "getter must not declare parameters",
                        &name_token,
                    ));
                }
                FunctionKind::Setter if params.len() != 1 => {
                    return Err(self.error_at(
                        ParseErrorCode::UnexpectedToken,
                        "setter must declare exactly one parameter",
                        &name_token,
                    ));
                }
                _ => {}
            }
            self.expect_punct("{")?;
            let body = self.parse_statements_until(Some("}"))?;
            let close = self.expect_punct("}")?;

            let function = FunctionNode {
                name: Some(name.clone()),
                params,
                body: FunctionBody::Block(body),
                kind,
            };
            if !is_static && kind == FunctionKind::Method && name == "constructor" {
                if constructor.is_some() {
                    return Err(self.error_at(
                        ParseErrorCode::UnexpectedToken,
                        "a class may only have one constructor",
                        &name_token,
                    ));
                }
                constructor = Some(function);
            } else {
                members.push(ClassMember {
                    is_static,
                    function,
                    source: self.text[start..close.end].to_string(),
                });
            }
        }
        self.expect_punct("}")?;
        Ok(ClassNode {
            name,
            constructor,
            members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expression> {
        Box::new(Expression::Identifier(name.to_string()))
    }

    #[test]
    fn empty_body_parses_to_no_statements() {
        assert!(parse_function_body("  // nothing\n").expect("parse").is_empty());
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_expression("a + b * c").expect("parse");
        assert_eq!(
            expr,
            Expression::Binary {
                operator: BinaryOperator::Add,
                left: ident("a"),
                right: Box::new(Expression::Binary {
                    operator: BinaryOperator::Mul,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_expression("a = b = 1").expect("parse");
        let Expression::Assign { value, .. } = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(*value, Expression::Assign { .. }));
    }

    #[test]
    fn member_call_chain() {
        let expr = parse_expression("this.items.push(x)[0]").expect("parse");
        let Expression::Member { object, property } = expr else {
            panic!("expected member");
        };
        assert!(matches!(property, MemberProperty::Computed(_)));
        assert!(matches!(*object, Expression::Call { .. }));
    }

    #[test]
    fn new_without_arguments() {
        let expr = parse_expression("new Foo").expect("parse");
        assert_eq!(
            expr,
            Expression::New {
                callee: ident("Foo"),
                arguments: Vec::new()
            }
        );
    }

    #[test]
    fn statements_with_asi_and_declarations() {
        let body = parse_function_body("let a = 1, b\nconst c = a + 2\nreturn c").expect("parse");
        assert_eq!(body.len(), 4);
        assert!(matches!(body[3], Statement::Return(Some(_))));
    }

    #[test]
    fn return_followed_by_newline_returns_undefined() {
        let body = parse_function_body("return\n42").expect("parse");
        assert_eq!(body[0], Statement::Return(None));
    }

    #[test]
    fn if_else_chain() {
        let body =
            parse_function_body("if (x > 1) { return 1 } else if (x) return 2; else return 3")
                .expect("parse");
        let Statement::If { alternate, .. } = &body[0] else {
            panic!("expected if");
        };
        assert!(matches!(alternate.as_deref(), Some(Statement::If { .. })));
    }

    #[test]
    fn string_escapes_and_numbers() {
        assert_eq!(
            parse_expression(r#"'a\nA\x42\u{1F600}'"#).expect("parse"),
            Expression::String("a\nAB\u{1F600}".to_string())
        );
        assert_eq!(parse_expression("0xff").expect("parse"), Expression::Number(255.0));
        assert_eq!(parse_expression("1_000.5e1").expect("parse"), Expression::Number(10005.0));
        assert_eq!(parse_expression(".5").expect("parse"), Expression::Number(0.5));
    }

    #[test]
    fn object_literal_with_shorthand_and_string_keys() {
        let expr = parse_expression("{ a, 'b c': 1, 2: x }").expect("parse");
        let Expression::Object(props) = expr else {
            panic!("expected object");
        };
        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "2"]);
    }

    #[test]
    fn parameters() {
        assert_eq!(
            parse_parameters(" a , b ").expect("parse"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_parameters("").expect("parse").is_empty());
        let err = parse_parameters("a = 1").unwrap_err();
        assert_eq!(err.code, ParseErrorCode::UnsupportedSyntax);
    }

    #[test]
    fn class_members_keep_their_source() {
        let class = parse_class(
            "class Point {\n  constructor(x) { this.x = x; }\n  get double() { return this.x * 2; }\n  static origin() { return new Point(0); }\n}",
        )
        .expect("parse");
        assert_eq!(class.name.as_deref(), Some("Point"));
        assert!(class.constructor.is_some());
        assert_eq!(class.members.len(), 2);
        assert_eq!(class.members[0].function.kind, FunctionKind::Getter);
        assert_eq!(
            class.members[0].source,
            "get double() { return this.x * 2; }"
        );
        assert!(class.members[1].is_static);
    }

    #[test]
    fn method_named_get_is_a_plain_method() {
        let class = parse_class("class A { get() { return 1 } }").expect("parse");
        assert_eq!(class.members[0].function.name.as_deref(), Some("get"));
        assert_eq!(class.members[0].function.kind, FunctionKind::Method);
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        for source in [
            "for (;;) {}",
            "return x => x",
            "return `t`",
            "class A extends B {}",
            "return function () {}",
            "return [1,,2]",
        ] {
            let result = if source.starts_with("class") {
                parse_class(source).map(|_| ())
            } else {
                parse_function_body(source).map(|_| ())
            };
            let err = result.unwrap_err();
            assert_eq!(err.code, ParseErrorCode::UnsupportedSyntax, "{source}");
        }
    }

    #[test]
    fn class_field_is_unsupported() {
        let err = parse_class("class A { x = 1 }").unwrap_err();
        assert_eq!(err.code, ParseErrorCode::UnsupportedSyntax);
    }

    #[test]
    fn errors_carry_spans() {
        let err = parse_function_body("let a = ;").unwrap_err();
        assert_eq!(err.code, ParseErrorCode::UnexpectedToken);
        let span = err.span.as_ref().expect("span");
        assert_eq!(span.column, 9);
        assert!(err.to_string().contains("UnexpectedToken"));
    }

    #[test]
    fn invalid_assignment_target() {
        let err = parse_expression("1 = 2").unwrap_err();
        assert_eq!(err.code, ParseErrorCode::InvalidAssignmentTarget);
    }

    #[test]
    fn unterminated_string() {
        let err = parse_expression("'abc").unwrap_err();
        assert_eq!(err.code, ParseErrorCode::UnterminatedString);
    }

    #[test]
    fn nesting_within_the_cap_parses() {
        let depth = MAX_NESTING_DEPTH - 2;
        let text = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_expression(&text).expect("parse"), Expression::Number(1.0));
    }

    #[test]
    fn nesting_past_the_cap_is_rejected() {
        for depth in [MAX_NESTING_DEPTH + 1, 1_000, 20_000] {
            let parens = format!("return {}1{}", "(".repeat(depth), ")".repeat(depth));
            let err = parse_function_body(&parens).unwrap_err();
            assert_eq!(err.code, ParseErrorCode::NestingTooDeep, "{depth}");

            let blocks = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
            let err = parse_function_body(&blocks).unwrap_err();
            assert_eq!(err.code, ParseErrorCode::NestingTooDeep, "{depth}");

            let unary = format!("{}x", "- ".repeat(depth));
            let err = parse_expression(&unary).unwrap_err();
            assert_eq!(err.code, ParseErrorCode::NestingTooDeep, "{depth}");
        }
    }
}
