// Formula lexer - splits expression text into a single-pass token stream.
// Supports: non-negative decimal numbers (including scientific notation),
// identifiers, the four arithmetic operators, and parentheses.

use std::iter::Peekable;
use std::str::Chars;

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
}

impl OpKind {
    /// The operator's surface character, used for canonical rendering.
    pub(crate) fn symbol(self) -> char {
        match self {
            OpKind::Add => '+',
            OpKind::Sub => '-',
            OpKind::Mul => '*',
            OpKind::Div => '/',
        }
    }
}

/// One raw token of an expression.
///
/// Whitespace runs are dropped by the lexer and act only as separators, so
/// `"x 23"` yields `Var("x") Num(23)`. Characters outside the grammar come
/// back as `Unknown` and are rejected when the formula is parsed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    Op(OpKind),
    Var(String),
    Num(f64),
    Unknown(char),
}

/// Single-pass, non-restartable token stream over expression text.
pub(crate) struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Lex an identifier: `[A-Za-z_][A-Za-z0-9_]*`. The caller has already
    /// peeked a letter or underscore.
    fn lex_ident(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Var(ident)
    }

    /// Lex a number: digits with an optional fractional part, or a fractional
    /// part alone, then an optional exponent. The exponent marker is consumed
    /// only when a well-formed exponent follows, so `"2e"` lexes as the
    /// number 2 followed by the variable `e`.
    fn lex_number(&mut self) -> Token {
        let mut text = String::new();

        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        if self.chars.peek() == Some(&'.') {
            text.push('.');
            self.chars.next();
            while let Some(&c) = self.chars.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.chars.next();
                } else {
                    break;
                }
            }
        }

        if matches!(self.chars.peek(), Some('e') | Some('E')) {
            // Look past the marker (and an optional sign) for a digit before
            // committing; the marker might instead start a trailing variable.
            let mut lookahead = self.chars.clone();
            let marker = lookahead.next();
            let mut exponent = String::new();
            if let Some(&sign) = lookahead.peek() {
                if sign == '+' || sign == '-' {
                    exponent.push(sign);
                    lookahead.next();
                }
            }
            let mut has_digits = false;
            while let Some(&c) = lookahead.peek() {
                if c.is_ascii_digit() {
                    exponent.push(c);
                    has_digits = true;
                    lookahead.next();
                } else {
                    break;
                }
            }
            if has_digits {
                if let Some(marker) = marker {
                    text.push(marker);
                }
                text.push_str(&exponent);
                self.chars = lookahead;
            }
        }

        // The collected text matches the numeric grammar, so it parses.
        let value: f64 = text.parse().unwrap();
        Token::Num(value)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }

        let &c = self.chars.peek()?;
        let token = match c {
            '(' => {
                self.chars.next();
                Token::LParen
            }
            ')' => {
                self.chars.next();
                Token::RParen
            }
            '+' => {
                self.chars.next();
                Token::Op(OpKind::Add)
            }
            '-' => {
                self.chars.next();
                Token::Op(OpKind::Sub)
            }
            '*' => {
                self.chars.next();
                Token::Op(OpKind::Mul)
            }
            '/' => {
                self.chars.next();
                Token::Op(OpKind::Div)
            }
            'A'..='Z' | 'a'..='z' | '_' => self.lex_ident(),
            '0'..='9' => self.lex_number(),
            '.' => {
                // A dot starts a number only when a digit follows (".5");
                // a lone dot is not part of the grammar.
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if matches!(lookahead.peek(), Some(d) if d.is_ascii_digit()) {
                    self.lex_number()
                } else {
                    self.chars.next();
                    Token::Unknown('.')
                }
            }
            other => {
                self.chars.next();
                Token::Unknown(other)
            }
        };
        Some(token)
    }
}
