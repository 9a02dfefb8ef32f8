use crate::diagnostics::Span;
use crate::token::{Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    len: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            len: input.len(),
            pos: 0,
        }
    }

    fn peek_char(&self) -> Option<char> {
        if self.pos < self.len {
            Some(self.input.as_bytes()[self.pos] as char)
        } else {
            None
        }
    }

    fn peek_next_char(&self) -> Option<char> {
        if self.pos + 1 < self.len {
            Some(self.input.as_bytes()[self.pos + 1] as char)
        } else {
            None
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        Some(c)
    }

    fn current_span(&self, start: usize) -> Span {
        Span::new(start, self.pos)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next_char() == Some('/') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let span = self.current_span(start);
        let text = &self.input[start..self.pos];
        let value = text.parse::<f64>().unwrap_or(0.0);

        Token {
            kind: TokenKind::Number(value),
            span,
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let span = self.current_span(start);
        let text = &self.input[start..self.pos];

        let kind = match text {
            "def" => TokenKind::KwDef,
            "extern" => TokenKind::KwExtern,
            "if" => TokenKind::KwIf,
            "then" => TokenKind::KwThen,
            "else" => TokenKind::KwElse,
            "for" => TokenKind::KwFor,
            "in" => TokenKind::KwIn,
            _ => TokenKind::Ident(text.to_string()),
        };

        Token { kind, span }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => {
                return Token {
                    kind: TokenKind::Eof,
                    span: Span::point(self.pos),
                }
            }
        };

        match c {
            '0'..='9' | '.' => self.lex_number(),
            'a'..='z' | 'A'..='Z' | '_' => self.lex_ident_or_keyword(),

            '(' => {
                self.advance();
                Token {
                    kind: TokenKind::LParen,
                    span: self.current_span(start),
                }
            }
            ')' => {
                self.advance();
                Token {
                    kind: TokenKind::RParen,
                    span: self.current_span(start),
                }
            }
            ',' => {
                self.advance();
                Token {
                    kind: TokenKind::Comma,
                    span: self.current_span(start),
                }
            }
            ';' => {
                self.advance();
                Token {
                    kind: TokenKind::Semicolon,
                    span: self.current_span(start),
                }
            }
            '+' => {
                self.advance();
                Token {
                    kind: TokenKind::Plus,
                    span: self.current_span(start),
                }
            }
            '-' => {
                self.advance();
                Token {
                    kind: TokenKind::Minus,
                    span: self.current_span(start),
                }
            }
            '*' => {
                self.advance();
                Token {
                    kind: TokenKind::Star,
                    span: self.current_span(start),
                }
            }
            '/' => {
                self.advance();
                Token {
                    kind: TokenKind::Slash,
                    span: self.current_span(start),
                }
            }
            '<' => {
                self.advance();
                Token {
                    kind: TokenKind::Lt,
                    span: self.current_span(start),
                }
            }
            '=' => {
                self.advance();
                Token {
                    kind: TokenKind::Eq,
                    span: self.current_span(start),
                }
            }
            other => {
                self.advance();
                Token {
                    kind: TokenKind::Unknown(other),
                    span: self.current_span(start),
                }
            }
        }
    }
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token();
        let is_eof = matches!(tok.kind, TokenKind::Eof);
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    tokens
}
