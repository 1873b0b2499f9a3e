//! Token Types
//!
//! Tokens for the directive expression language.

use std::fmt;

/// Source span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Token with kind and span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Piece of a template literal
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    /// Cooked text
    Text(Box<str>),
    /// Source of a `${...}` substitution and its byte offset
    Substitution { source: Box<str>, offset: u32 },
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(Box<str>),
    Template(Box<[TemplateChunk]>),
    Boolean(bool),
    Null,
    Undefined,

    Identifier(Box<str>),

    // Keywords
    Const,
    Else,
    Function,
    If,
    Let,
    Return,
    This,
    Typeof,
    Var,

    // Punctuators
    LBrace,           // {
    RBrace,           // }
    LParen,           // (
    RParen,           // )
    LBracket,         // [
    RBracket,         // ]
    Dot,              // .
    Semicolon,        // ;
    Comma,            // ,
    Colon,            // :
    Question,         // ?
    QuestionDot,      // ?.
    QuestionQuestion, // ??
    Arrow,            // =>

    // Operators
    Plus,               // +
    Minus,              // -
    Star,               // *
    Slash,              // /
    Percent,            // %
    PlusPlus,           // ++
    MinusMinus,         // --
    LessThan,           // <
    LessThanEq,         // <=
    GreaterThan,        // >
    GreaterThanEq,      // >=
    EqEq,               // ==
    NotEq,              // !=
    EqEqEq,             // ===
    NotEqEq,            // !==
    AmpersandAmpersand, // &&
    PipePipe,           // ||
    Bang,               // !

    // Assignment
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=

    // Special
    Eof,
    Error(Box<str>),
}

impl TokenKind {
    /// Check if this is an assignment operator
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
        )
    }

    /// Keywords that may still be used as property names (`obj.if`)
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Const => "const",
            TokenKind::Else => "else",
            TokenKind::Function => "function",
            TokenKind::If => "if",
            TokenKind::Let => "let",
            TokenKind::Return => "return",
            TokenKind::This => "this",
            TokenKind::Typeof => "typeof",
            TokenKind::Var => "var",
            TokenKind::Null => "null",
            TokenKind::Undefined => "undefined",
            TokenKind::Boolean(true) => "true",
            TokenKind::Boolean(false) => "false",
            _ => return None,
        })
    }
}

/// Keywords lookup table
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "const" => Some(TokenKind::Const),
        "else" => Some(TokenKind::Else),
        "false" => Some(TokenKind::Boolean(false)),
        "function" => Some(TokenKind::Function),
        "if" => Some(TokenKind::If),
        "let" => Some(TokenKind::Let),
        "null" => Some(TokenKind::Null),
        "return" => Some(TokenKind::Return),
        "this" => Some(TokenKind::This),
        "true" => Some(TokenKind::Boolean(true)),
        "typeof" => Some(TokenKind::Typeof),
        "undefined" => Some(TokenKind::Undefined),
        "var" => Some(TokenKind::Var),
        _ => None,
    }
}
