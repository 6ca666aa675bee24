// ABOUTME: Lexer turning Mini-C source text into a token stream

use std::collections::HashSet;

use crate::token::{Token, TokenKind, KEYWORDS};
use thiserror::Error;

/// Lexical errors: an invalid character is reported but does not abort
/// tokenization — scanning continues past it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Lexical Error (line {line}, col {col}): Invalid character '{ch}'")]
    InvalidChar { ch: char, line: usize, col: usize },
}

/// Output of the lexer: the token stream, the raw symbol set (identifiers
/// and literal lexemes seen), and any accumulated errors.
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub symbols: HashSet<String>,
    pub errors: Vec<LexError>,
}

const MULTI_CHAR_OPERATORS: &[&str] = &[
    "++", "--", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "&&", "||",
];
const SINGLE_CHAR_OPERATORS: &[char] = &['+', '-', '*', '/', '%', '=', '<', '>', '&', '|', '!'];

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Cursor {
    fn new(input: &str) -> Self {
        Cursor {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn peek_str(&self, len: usize) -> String {
        self.chars[self.pos..(self.pos + len).min(self.chars.len())]
            .iter()
            .collect()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn advance_n(&mut self, n: usize) -> String {
        let mut s = String::new();
        for _ in 0..n {
            if let Some(c) = self.advance() {
                s.push(c);
            }
        }
        s
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

/// Tokenize Mini-C source text.
///
/// Rule order matters and must be preserved: comments before float, float
/// before int, string/char, multi-char operators before single-char,
/// delimiters, identifiers (with keyword reclassification), newline,
/// whitespace skip, and finally mismatch.
pub fn tokenize(source: &str) -> LexOutput {
    let mut cur = Cursor::new(source);
    let mut tokens = Vec::new();
    let mut symbols = HashSet::new();
    let mut errors = Vec::new();

    while !cur.at_end() {
        let start_line = cur.line;
        let start_col = cur.col;
        let c = cur.peek().unwrap();

        // Comments: //... or /*...*/
        if c == '/' && cur.peek_at(1) == Some('/') {
            while cur.peek().is_some() && cur.peek() != Some('\n') {
                cur.advance();
            }
            continue;
        }
        if c == '/' && cur.peek_at(1) == Some('*') {
            cur.advance_n(2);
            loop {
                if cur.at_end() {
                    break;
                }
                if cur.peek() == Some('*') && cur.peek_at(1) == Some('/') {
                    cur.advance_n(2);
                    break;
                }
                cur.advance();
            }
            continue;
        }

        // Float literal: \d+\.\d+
        if c.is_ascii_digit() {
            if let Some(tok) = try_lex_number(&mut cur, start_line, start_col) {
                if tok.kind == TokenKind::IntegerLiteral || tok.kind == TokenKind::FloatLiteral {
                    symbols.insert(tok.lexeme.clone());
                }
                tokens.push(tok);
                continue;
            }
        }

        // String literal
        if c == '"' {
            let lexeme = lex_string(&mut cur);
            symbols.insert(lexeme.clone());
            tokens.push(Token::new(
                TokenKind::StringLiteral,
                lexeme,
                start_line,
                start_col,
            ));
            continue;
        }

        // Char literal
        if c == '\'' {
            let lexeme = lex_char(&mut cur);
            symbols.insert(lexeme.clone());
            tokens.push(Token::new(
                TokenKind::CharLiteral,
                lexeme,
                start_line,
                start_col,
            ));
            continue;
        }

        // Multi-char operators first
        if let Some(op) = MULTI_CHAR_OPERATORS
            .iter()
            .find(|op| cur.peek_str(op.len()) == **op)
        {
            cur.advance_n(op.len());
            tokens.push(Token::new(
                TokenKind::Operator,
                (*op).to_string(),
                start_line,
                start_col,
            ));
            continue;
        }

        // Single-char operators
        if SINGLE_CHAR_OPERATORS.contains(&c) {
            cur.advance();
            tokens.push(Token::new(
                TokenKind::Operator,
                c.to_string(),
                start_line,
                start_col,
            ));
            continue;
        }

        // Delimiters, re-tagged by lexeme directly
        if let Some(kind) = delimiter_kind(c) {
            cur.advance();
            tokens.push(Token::new(kind, c.to_string(), start_line, start_col));
            continue;
        }

        // Identifiers / keywords
        if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(ch) = cur.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    ident.push(ch);
                    cur.advance();
                } else {
                    break;
                }
            }
            symbols.insert(ident.clone());
            let kind = if KEYWORDS.contains(&ident.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            tokens.push(Token::new(kind, ident, start_line, start_col));
            continue;
        }

        // Newline / whitespace: skip
        if c == '\n' || c.is_whitespace() {
            cur.advance();
            continue;
        }

        // Mismatch
        cur.advance();
        errors.push(LexError::InvalidChar {
            ch: c,
            line: start_line,
            col: start_col,
        });
    }

    tokens.push(Token::eof(cur.line, cur.col));

    LexOutput {
        tokens,
        symbols,
        errors,
    }
}

fn delimiter_kind(c: char) -> Option<TokenKind> {
    match c {
        ';' => Some(TokenKind::Semicolon),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '{' => Some(TokenKind::LBrace),
        '}' => Some(TokenKind::RBrace),
        '[' => Some(TokenKind::LBracket),
        ']' => Some(TokenKind::RBracket),
        ',' => Some(TokenKind::Comma),
        _ => None,
    }
}

fn try_lex_number(cur: &mut Cursor, line: usize, col: usize) -> Option<Token> {
    let mut lexeme = String::new();
    while let Some(c) = cur.peek() {
        if c.is_ascii_digit() {
            lexeme.push(c);
            cur.advance();
        } else {
            break;
        }
    }

    if cur.peek() == Some('.') && cur.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
        lexeme.push('.');
        cur.advance();
        while let Some(c) = cur.peek() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                cur.advance();
            } else {
                break;
            }
        }
        return Some(Token::new(TokenKind::FloatLiteral, lexeme, line, col));
    }

    Some(Token::new(TokenKind::IntegerLiteral, lexeme, line, col))
}

fn lex_string(cur: &mut Cursor) -> String {
    let mut lexeme = String::new();
    lexeme.push(cur.advance().unwrap()); // opening quote
    while let Some(c) = cur.peek() {
        if c == '\\' {
            lexeme.push(cur.advance().unwrap());
            if let Some(escaped) = cur.advance() {
                lexeme.push(escaped);
            }
            continue;
        }
        if c == '"' {
            lexeme.push(cur.advance().unwrap());
            break;
        }
        lexeme.push(cur.advance().unwrap());
    }
    lexeme
}

fn lex_char(cur: &mut Cursor) -> String {
    let mut lexeme = String::new();
    lexeme.push(cur.advance().unwrap()); // opening quote
    if cur.peek() == Some('\\') {
        lexeme.push(cur.advance().unwrap());
        if let Some(escaped) = cur.advance() {
            lexeme.push(escaped);
        }
    } else if let Some(c) = cur.advance() {
        lexeme.push(c);
    }
    if cur.peek() == Some('\'') {
        lexeme.push(cur.advance().unwrap());
    }
    lexeme
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let out = tokenize("int x");
        assert_eq!(out.tokens[0].kind, TokenKind::Keyword);
        assert_eq!(out.tokens[0].lexeme, "int");
        assert_eq!(out.tokens[1].kind, TokenKind::Identifier);
        assert_eq!(out.tokens[1].lexeme, "x");
        assert_eq!(out.tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_float_before_int() {
        let out = tokenize("3.14");
        assert_eq!(out.tokens[0].kind, TokenKind::FloatLiteral);
        assert_eq!(out.tokens[0].lexeme, "3.14");
    }

    #[test]
    fn lexes_int_without_dot() {
        assert_eq!(kinds("42")[0], TokenKind::IntegerLiteral);
    }

    #[test]
    fn line_comment_outmatches_divide() {
        let out = tokenize("// comment\n1 / 2");
        assert_eq!(out.tokens[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(out.tokens[0].line, 2);
    }

    #[test]
    fn block_comment_counts_newlines() {
        let out = tokenize("/* a\nb\nc */x");
        assert_eq!(out.tokens[0].line, 3);
    }

    #[test]
    fn multi_char_operators_win_over_single() {
        let out = tokenize("a == b");
        assert_eq!(out.tokens[1].kind, TokenKind::Operator);
        assert_eq!(out.tokens[1].lexeme, "==");
    }

    #[test]
    fn delimiters_retagged_by_lexeme() {
        let out = tokenize("(){};,[]");
        let want = [
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::RBrace,
            TokenKind::Semicolon,
            TokenKind::Comma,
            TokenKind::LBracket,
            TokenKind::RBracket,
        ];
        for (tok, expected) in out.tokens.iter().zip(want.iter()) {
            assert_eq!(tok.kind, *expected);
        }
    }

    #[test]
    fn string_literal_keeps_quotes_and_escapes() {
        let out = tokenize(r#""hi\n""#);
        assert_eq!(out.tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(out.tokens[0].lexeme, r#""hi\n""#);
    }

    #[test]
    fn invalid_character_reports_error_but_continues() {
        let out = tokenize("int x = 1 @ 2;");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].to_string().contains("Invalid character '@'"));
        // Lexing continues: the trailing `2;` still produces tokens.
        assert!(out
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::IntegerLiteral && t.lexeme == "2"));
    }

    #[test]
    fn positions_are_well_formed() {
        let src = "int main() {\n  return 0;\n}\n";
        let out = tokenize(src);
        let newline_count = src.matches('\n').count();
        for tok in &out.tokens {
            if tok.kind == TokenKind::Eof {
                continue;
            }
            assert!(tok.col >= 1);
            assert!(tok.line <= newline_count + 1);
        }
    }
}
