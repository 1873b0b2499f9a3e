//! Expression Lexer
//!
//! Tokenizes directive expressions and statement lists.

use std::iter::Peekable;
use std::str::Chars;

use crate::token::{Span, TemplateChunk, Token, TokenKind, keyword_from_str};

/// Expression lexer
#[derive(Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<Chars<'src>>,
    pos: u32,
    /// Added to every span (for substitutions lexed out of a template)
    base: u32,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self::with_offset(source, 0)
    }

    /// Lexer whose spans start at `base`
    pub fn with_offset(source: &'src str, base: u32) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            pos: 0,
            base,
        }
    }

    /// Peek at the next character
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Peek at the character after next
    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.pos as usize..].chars();
        iter.next();
        iter.next()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Consume `expected` if it is next
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '*' && self.eat('/') {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let Some(c) = self.advance() else {
            return Token::new(TokenKind::Eof, self.span(start));
        };

        let kind = match c {
            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier(start),

            // Numbers
            '0'..='9' => self.scan_number(start),
            '.' if matches!(self.peek(), Some('0'..='9')) => self.scan_number(start),

            // Strings
            '"' | '\'' => self.scan_string(c),
            '`' => self.scan_template(),

            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,

            '?' => {
                if self.eat('?') {
                    TokenKind::QuestionQuestion
                } else if self.peek() == Some('.') && !matches!(self.peek_next(), Some('0'..='9')) {
                    self.advance();
                    TokenKind::QuestionDot
                } else {
                    TokenKind::Question
                }
            }

            '+' => match self.peek() {
                Some('+') => {
                    self.advance();
                    TokenKind::PlusPlus
                }
                Some('=') => {
                    self.advance();
                    TokenKind::PlusEq
                }
                _ => TokenKind::Plus,
            },

            '-' => match self.peek() {
                Some('-') => {
                    self.advance();
                    TokenKind::MinusMinus
                }
                Some('=') => {
                    self.advance();
                    TokenKind::MinusEq
                }
                _ => TokenKind::Minus,
            },

            '*' => {
                if self.eat('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }

            '<' => {
                if self.eat('=') {
                    TokenKind::LessThanEq
                } else {
                    TokenKind::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterThanEq
                } else {
                    TokenKind::GreaterThan
                }
            }

            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Eq
                }
            }

            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::NotEqEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }

            '&' if self.eat('&') => TokenKind::AmpersandAmpersand,
            '|' if self.eat('|') => TokenKind::PipePipe,

            _ => TokenKind::Error(format!("Unexpected character: {c}").into()),
        };

        Token::new(kind, self.span(start))
    }

    fn span(&self, start: u32) -> Span {
        Span::new(self.base + start, self.base + self.pos)
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self, start: u32) -> TokenKind {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }
        let text = &self.source[start as usize..self.pos as usize];
        keyword_from_str(text).unwrap_or_else(|| TokenKind::Identifier(text.into()))
    }

    /// Scan a decimal number literal
    fn scan_number(&mut self, start: u32) -> TokenKind {
        while matches!(self.peek(), Some('0'..='9' | '_')) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9' | '_')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }

        let text = &self.source[start as usize..self.pos as usize];
        match text.replace('_', "").parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("Invalid number: {text}").into()),
        }
    }

    fn scan_escape(&mut self) -> Option<char> {
        Some(match self.advance()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        })
    }

    /// Scan a quoted string literal
    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return TokenKind::Error("Unterminated string".into()),
                Some(c) if c == quote => break,
                Some('\\') => match self.scan_escape() {
                    Some(c) => value.push(c),
                    None => return TokenKind::Error("Unterminated string".into()),
                },
                Some(c) => value.push(c),
            }
        }
        TokenKind::String(value.into())
    }

    /// Scan a template literal into text and substitution chunks
    fn scan_template(&mut self) -> TokenKind {
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return TokenKind::Error("Unterminated template literal".into()),
                Some('`') => break,
                Some('\\') => match self.scan_escape() {
                    Some(c) => text.push(c),
                    None => return TokenKind::Error("Unterminated template literal".into()),
                },
                Some('$') if self.peek() == Some('{') => {
                    self.advance();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text).into()));
                    }
                    let offset = self.pos;
                    let mut depth = 0usize;
                    loop {
                        match self.advance() {
                            None => {
                                return TokenKind::Error("Unterminated template substitution".into());
                            }
                            Some('{') => depth += 1,
                            Some('}') if depth == 0 => break,
                            Some('}') => depth -= 1,
                            Some(q @ ('"' | '\'')) => {
                                if let TokenKind::Error(e) = self.scan_string(q) {
                                    return TokenKind::Error(e);
                                }
                            }
                            Some(_) => {}
                        }
                    }
                    let source = &self.source[offset as usize..self.pos as usize - 1];
                    chunks.push(TemplateChunk::Substitution {
                        source: source.into(),
                        offset: self.base + offset,
                    });
                }
                Some(c) => text.push(c),
            }
        }
        if !text.is_empty() || chunks.is_empty() {
            chunks.push(TemplateChunk::Text(text.into()));
        }
        TokenKind::Template(chunks.into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a?.b ?? c === !d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::QuestionDot,
                TokenKind::Identifier("b".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier("c".into()),
                TokenKind::EqEqEq,
                TokenKind::Bang,
                TokenKind::Identifier("d".into()),
            ]
        );
    }

    #[test]
    fn test_conditional_with_decimal_is_not_optional_chain() {
        assert_eq!(
            kinds("x?.5:1"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Question,
                TokenKind::Number(0.5),
                TokenKind::Colon,
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_strings_and_numbers() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb" 1_000 2.5e1"#),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::String("a\nb".into()),
                TokenKind::Number(1000.0),
                TokenKind::Number(25.0),
            ]
        );
    }

    #[test]
    fn test_template_chunks() {
        let tokens = kinds("`Hi ${user.name}, {ok} ${ {a:1}.a }`");
        let [TokenKind::Template(chunks)] = tokens.as_slice() else {
            panic!("expected a single template token, got {tokens:?}");
        };
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], TemplateChunk::Text("Hi ".into()));
        assert!(matches!(&chunks[1], TemplateChunk::Substitution { source, .. } if &**source == "user.name"));
        assert_eq!(chunks[2], TemplateChunk::Text(", {ok} ".into()));
        assert!(matches!(&chunks[3], TemplateChunk::Substitution { source, .. } if &**source == " {a:1}.a "));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(kinds("'abc").as_slice(), [TokenKind::Error(_)]));
    }
}
