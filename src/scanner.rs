// ABOUTME: Lexical scanner turning Lox source text into a token stream

use crate::error::ErrorSink;
use crate::token::{keyword, Token, TokenKind, TokenLiteral};

pub struct Scanner {
    chars: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scan the whole source, reporting errors to `sink` as they're found
    /// and continuing past them. Always ends with exactly one `EOF` token.
    pub fn scan_tokens(mut self, sink: &ErrorSink) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token(sink);
        }
        self.tokens.push(Token::eof(self.line));
        self.tokens
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> char {
        *self.chars.get(self.current).unwrap_or(&'\0')
    }

    fn peek_next(&self) -> char {
        *self.chars.get(self.current + 1).unwrap_or(&'\0')
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.add_token_with_literal(kind, None);
    }

    fn add_token_with_literal(&mut self, kind: TokenKind, literal: Option<TokenLiteral>) {
        let lexeme = self.lexeme();
        self.tokens.push(Token::new(kind, lexeme, literal, self.line));
    }

    fn scan_token(&mut self, sink: &ErrorSink) {
        use TokenKind::*;
        let c = self.advance();
        match c {
            '(' => self.add_token(LeftParen),
            ')' => self.add_token(RightParen),
            '{' => self.add_token(LeftBrace),
            '}' => self.add_token(RightBrace),
            ',' => self.add_token(Comma),
            '.' => self.add_token(Dot),
            '-' => self.add_token(Minus),
            '+' => self.add_token(Plus),
            ';' => self.add_token(Semicolon),
            '*' => self.add_token(Star),
            '!' => {
                let kind = if self.matches('=') { BangEqual } else { Bang };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.matches('=') { EqualEqual } else { Equal };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.matches('=') { LessEqual } else { Less };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.matches('=') { GreaterEqual } else { Greater };
                self.add_token(kind);
            }
            '/' => {
                if self.matches('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string(sink),
            c if c.is_ascii_digit() => self.number(),
            c if is_identifier_start(c) => self.identifier(),
            _ => sink.error(self.line, "Unexpected character."),
        }
    }

    fn string(&mut self, sink: &ErrorSink) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            sink.error(self.line, "Unterminated string.");
            return;
        }

        // the closing "
        self.advance();

        let value: String = self.chars[self.start + 1..self.current - 1].iter().collect();
        self.add_token_with_literal(TokenKind::String, Some(TokenLiteral::String(value)));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A trailing dot does not start a fractional part unless followed
        // by at least one digit.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = self.lexeme();
        let value: f64 = text.parse().expect("scanner only consumes valid digits");
        self.add_token_with_literal(TokenKind::Number, Some(TokenLiteral::Number(value)));
    }

    fn identifier(&mut self) {
        while is_identifier_continue(self.peek()) {
            self.advance();
        }

        let text = self.lexeme();
        let kind = keyword(&text).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

/// Convenience entry point: scan `source` and return its tokens. Errors are
/// reported through `sink`; check `sink.had_static_error()` afterward.
pub fn scan(source: &str, sink: &ErrorSink) -> Vec<Token> {
    Scanner::new(source).scan_tokens(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let sink = ErrorSink::new();
        scan(source, &sink).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn ends_with_single_eof() {
        let sink = ErrorSink::new();
        let tokens = scan("var a = 1;", &sink);
        assert_eq!(tokens.last().unwrap().kind, Eof);
        assert_eq!(tokens.iter().filter(|t| t.kind == Eof).count(), 1);
    }

    #[test]
    fn punctuation_and_operators() {
        assert_eq!(
            kinds("(){},.-+;*!!====<<=>>=/"),
            vec![
                LeftParen, RightParen, LeftBrace, RightBrace, Comma, Dot, Minus, Plus, Semicolon,
                Star, Bang, BangEqual, EqualEqual, Equal, Less, LessEqual, Greater, GreaterEqual,
                Slash, Eof
            ]
        );
    }

    #[test]
    fn comment_consumes_to_newline() {
        let sink = ErrorSink::new();
        let tokens = scan("1 // a comment\n2", &sink);
        let nums: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.literal {
                Some(TokenLiteral::Number(n)) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(nums, vec![1.0, 2.0]);
    }

    #[test]
    fn string_literal_multiline() {
        let sink = ErrorSink::new();
        let tokens = scan("\"a\nb\"", &sink);
        match &tokens[0].literal {
            Some(TokenLiteral::String(s)) => assert_eq!(s, "a\nb"),
            other => panic!("expected string literal, got {other:?}"),
        }
        assert!(!sink.had_static_error());
    }

    #[test]
    fn unterminated_string_reports_error() {
        let sink = ErrorSink::new();
        scan("\"unterminated", &sink);
        assert!(sink.had_static_error());
    }

    #[test]
    fn numbers_with_trailing_dot_do_not_consume_it() {
        let sink = ErrorSink::new();
        let tokens = scan("42.", &sink);
        assert!(matches!(
            tokens[0].literal,
            Some(TokenLiteral::Number(n)) if n == 42.0
        ));
        assert_eq!(tokens[1].kind, Dot);
    }

    #[test]
    fn identifiers_and_keywords() {
        assert_eq!(kinds("and class foo_bar"), vec![And, Class, Identifier, Eof]);
    }

    #[test]
    fn unknown_character_reports_and_continues() {
        let sink = ErrorSink::new();
        let tokens = scan("@ 1", &sink);
        assert!(sink.had_static_error());
        assert!(matches!(tokens[0].literal, Some(TokenLiteral::Number(n)) if n == 1.0));
    }
}
