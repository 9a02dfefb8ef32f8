use crate::ast::{BinaryOp, Expr, FunctionDef, Prototype, TopLevel};
use crate::diagnostics::{Diagnostic, Span};
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};

/// Binding strengths, tightest first. Adding an operator is one row here
/// plus a token mapping in `binop_of`.
const PRECEDENCE: &[(BinaryOp, i32)] = &[
    (BinaryOp::Mul, 10),
    (BinaryOp::Div, 10),
    (BinaryOp::Add, 8),
    (BinaryOp::Sub, 8),
    (BinaryOp::Lt, 7),
];

const NOT_AN_OPERATOR: i32 = -1;

fn precedence_of(op: BinaryOp) -> i32 {
    PRECEDENCE
        .iter()
        .find(|(candidate, _)| *candidate == op)
        .map(|(_, prec)| *prec)
        .unwrap_or(NOT_AN_OPERATOR)
}

fn binop_of(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::Lt => Some(BinaryOp::Lt),
        _ => None,
    }
}

fn peek_precedence(kind: &TokenKind) -> i32 {
    binop_of(kind).map(precedence_of).unwrap_or(NOT_AN_OPERATOR)
}

/// Parses a whole source text into top-level units, collecting a diagnostic
/// per failed unit and resuming at the next one.
pub fn parse_source(source: &str) -> Result<Vec<TopLevel>, Vec<Diagnostic>> {
    let mut parser = Parser::new(tokenize(source));
    let mut units = Vec::new();
    let mut diagnostics = Vec::new();

    loop {
        match parser.next_unit() {
            Ok(Some(unit)) => units.push(unit),
            Ok(None) => break,
            Err(diag) => {
                diagnostics.push(diag);
                parser.synchronize();
            }
        }
    }

    if diagnostics.is_empty() {
        Ok(units)
    } else {
        Err(diagnostics)
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1]
    }

    /// Returns the next top-level unit, or `None` at end of input. Stray
    /// semicolons between units are skipped. On error the caller decides
    /// whether to `synchronize` and continue.
    pub fn next_unit(&mut self) -> Result<Option<TopLevel>, Diagnostic> {
        while matches!(self.current_kind(), TokenKind::Semicolon) {
            self.advance();
        }

        match self.current_kind() {
            TokenKind::Eof => Ok(None),
            TokenKind::KwDef => Ok(Some(TopLevel::Definition(self.parse_definition()?))),
            TokenKind::KwExtern => Ok(Some(TopLevel::Extern(self.parse_extern()?))),
            _ => Ok(Some(TopLevel::Expression(self.parse_expr()?))),
        }
    }

    /// Skips ahead past the next semicolon so parsing can resume with the
    /// following unit after an error. The failed unit is discarded.
    pub fn synchronize(&mut self) {
        while !self.is_at_end() {
            let dropped = self.advance();
            if matches!(dropped.kind, TokenKind::Semicolon) {
                return;
            }
        }
    }

    fn parse_definition(&mut self) -> Result<FunctionDef, Diagnostic> {
        self.advance();
        let proto = self.parse_prototype()?;
        let body = self.parse_expr()?;
        Ok(FunctionDef { proto, body })
    }

    fn parse_extern(&mut self) -> Result<Prototype, Diagnostic> {
        self.advance();
        self.parse_prototype()
    }

    fn parse_prototype(&mut self) -> Result<Prototype, Diagnostic> {
        let name = self.expect_ident("function")?;
        self.expect_token(TokenKind::LParen, "'('")?;

        let mut params = Vec::new();
        while let TokenKind::Ident(param) = self.current_kind() {
            params.push(param.clone());
            self.advance();
        }

        self.expect_token(TokenKind::RParen, "')'")?;
        Ok(Prototype { name, params })
    }

    pub fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        let lhs = self.parse_primary()?;
        self.parse_binop_rhs(0, lhs)
    }

    // Precedence climbing: fold same-or-looser operators into `lhs` in a
    // loop; recurse (with a raised floor) only when the lookahead operator
    // binds tighter than the one just consumed.
    fn parse_binop_rhs(&mut self, min_prec: i32, mut lhs: Expr) -> Result<Expr, Diagnostic> {
        loop {
            let op = match binop_of(self.current_kind()) {
                Some(op) => op,
                None => return Ok(lhs),
            };
            let prec = precedence_of(op);
            if prec < min_prec {
                return Ok(lhs);
            }
            self.advance();

            let mut rhs = self.parse_primary()?;
            if prec < peek_precedence(self.current_kind()) {
                rhs = self.parse_binop_rhs(prec + 1, rhs)?;
            }

            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::Ident(_) => self.parse_ident_expr(),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_token(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwFor => self.parse_for(),
            _ => Err(self.error_expected(tok.span, "expression", &tok.kind)),
        }
    }

    // identifier followed by '(' is a call, otherwise a variable reference
    fn parse_ident_expr(&mut self) -> Result<Expr, Diagnostic> {
        let name = self.expect_ident("variable or function")?;

        if !matches!(self.current_kind(), TokenKind::LParen) {
            return Ok(Expr::Variable(name));
        }
        self.advance();

        let mut args = Vec::new();
        if !matches!(self.current_kind(), TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if matches!(self.current_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_token(TokenKind::RParen, "')'")?;

        Ok(Expr::Call { callee: name, args })
    }

    fn parse_if(&mut self) -> Result<Expr, Diagnostic> {
        self.advance();

        let cond = self.parse_expr()?;
        self.expect_token(TokenKind::KwThen, "'then'")?;
        let then_branch = self.parse_expr()?;
        self.expect_token(TokenKind::KwElse, "'else'")?;
        let else_branch = self.parse_expr()?;

        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_for(&mut self) -> Result<Expr, Diagnostic> {
        self.advance();

        let var = self.expect_ident("loop variable")?;
        self.expect_token(TokenKind::Eq, "'='")?;
        let start = self.parse_expr()?;
        self.expect_token(TokenKind::Comma, "','")?;
        let end = self.parse_expr()?;

        let step = if matches!(self.current_kind(), TokenKind::Comma) {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        self.expect_token(TokenKind::KwIn, "'in'")?;
        let body = self.parse_expr()?;

        Ok(Expr::For {
            var,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
        })
    }

    fn expect_token(&mut self, expected: TokenKind, expected_name: &str) -> Result<(), Diagnostic> {
        let tok = self.current().clone();
        if tok.kind == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error_expected(tok.span, expected_name, &tok.kind))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, Diagnostic> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Ident(ref name) => {
                self.advance();
                Ok(name.clone())
            }
            _ => {
                let msg = format!(
                    "expected {} identifier but found {}",
                    what,
                    Self::pretty_token(&tok.kind)
                );
                Err(Diagnostic::new_error(msg, tok.span))
            }
        }
    }

    fn error_expected(&self, span: Span, expected: &str, found: &TokenKind) -> Diagnostic {
        let msg = format!(
            "expected {} but found {}",
            expected,
            Self::pretty_token(found)
        );
        Diagnostic::new_error(msg, span)
    }

    fn pretty_token(kind: &TokenKind) -> String {
        match kind {
            TokenKind::Ident(name) => format!("identifier `{}`", name),
            TokenKind::Number(v) => format!("number `{}`", v),

            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Semicolon => "`;`".to_string(),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::Slash => "`/`".to_string(),
            TokenKind::Lt => "`<`".to_string(),
            TokenKind::Eq => "`=`".to_string(),

            TokenKind::KwDef => "`def` keyword".to_string(),
            TokenKind::KwExtern => "`extern` keyword".to_string(),
            TokenKind::KwIf => "`if` keyword".to_string(),
            TokenKind::KwThen => "`then` keyword".to_string(),
            TokenKind::KwElse => "`else` keyword".to_string(),
            TokenKind::KwFor => "`for` keyword".to_string(),
            TokenKind::KwIn => "`in` keyword".to_string(),

            TokenKind::Unknown(c) => format!("unrecognized character {:?}", c),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}
