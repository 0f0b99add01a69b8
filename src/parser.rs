// ABOUTME: Hand-rolled recursive-descent parser producing the statement/expression tree
use std::rc::Rc;

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, LiteralValue, Stmt};
use crate::error::Diagnostics;
use crate::token::{Token, TokenKind};

const MAX_ARGS: usize = 255;

/// Internal control-flow marker for a parse failure. The diagnostic itself
/// has already been reported to `Diagnostics` by the time this is
/// constructed; it exists only to unwind to the nearest synchronization
/// point via `?`.
#[derive(Debug)]
struct ParseError;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    next_id: &'a mut ExprId,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    /// `next_id` is the caller's session-wide expression-id counter, not a
    /// fresh-per-parse counter: a REPL keeps one `Interpreter` alive across
    /// many `Parser`/`Resolver` cycles, and closures or class methods
    /// defined on one line can be invoked on a later one, so ids must stay
    /// unique for as long as the interpreter that resolves them does.
    pub fn new(tokens: Vec<Token>, next_id: &'a mut ExprId, diagnostics: &'a mut Diagnostics) -> Self {
        Self { tokens, current: 0, next_id, diagnostics }
    }

    pub fn parse(mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        statements
    }

    // ---- declarations ----

    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.match_kind(&[TokenKind::Class]) {
            return self.class_declaration();
        }
        if self.match_kind(&[TokenKind::Fun]) {
            return Ok(Stmt::Function(self.function("function")?));
        }
        if self.match_kind(&[TokenKind::Var]) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.match_kind(&[TokenKind::Less]) {
            let superclass_name = self.consume(TokenKind::Identifier, "Expect superclass name.")?;
            Some(self.new_expr(ExprKind::Variable(superclass_name)))
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class { name, superclass, methods })
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, ParseError> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenKind::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let peeked = self.peek().clone();
                    self.error(&peeked, &format!("Can't have more than {MAX_ARGS} parameters."));
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer =
            if self.match_kind(&[TokenKind::Equal]) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_kind(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.match_kind(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.match_kind(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.match_kind(&[TokenKind::Return]) {
            return self.return_statement();
        }
        if self.match_kind(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.match_kind(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_kind(&[TokenKind::Semicolon]) {
            None
        } else if self.match_kind(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| self.new_expr(ExprKind::Literal(LiteralValue::Bool(true))));
        body = Stmt::While { condition, body: Box::new(body) };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch =
            if self.match_kind(&[TokenKind::Else]) { Some(Box::new(self.statement()?)) } else { None };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn print_statement(&mut self) -> Result<Stmt, ParseError> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.or()?;

        if self.match_kind(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return Ok(match expr.kind {
                ExprKind::Variable(name) => self.new_expr(ExprKind::Assign { name, value: Box::new(value) }),
                ExprKind::Get { object, name } => {
                    self.new_expr(ExprKind::Set { object, name, value: Box::new(value) })
                }
                _ => {
                    self.error(&equals, "Invalid assignment target.");
                    expr
                }
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;
        while self.match_kind(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = self.new_expr(ExprKind::Logical { left: Box::new(expr), operator, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_kind(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = self.new_expr(ExprKind::Logical { left: Box::new(expr), operator, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_left(&[TokenKind::BangEqual, TokenKind::EqualEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_left(
            &[TokenKind::Greater, TokenKind::GreaterEqual, TokenKind::Less, TokenKind::LessEqual],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_left(&[TokenKind::Minus, TokenKind::Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        self.binary_left(&[TokenKind::Slash, TokenKind::Star], Self::unary)
    }

    fn binary_left(
        &mut self,
        kinds: &[TokenKind],
        mut operand: impl FnMut(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut expr = operand(self)?;
        while self.match_kind(kinds) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = self.new_expr(ExprKind::Binary { left: Box::new(expr), operator, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.new_expr(ExprKind::Unary { operator, right: Box::new(right) }));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = self.new_expr(ExprKind::Get { object: Box::new(expr), name });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    let peeked = self.peek().clone();
                    self.error(&peeked, &format!("Can't have more than {MAX_ARGS} arguments."));
                }
                arguments.push(self.expression()?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(self.new_expr(ExprKind::Call { callee: Box::new(callee), paren, arguments }))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::False]) {
            return Ok(self.new_expr(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.match_kind(&[TokenKind::True]) {
            return Ok(self.new_expr(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.match_kind(&[TokenKind::Nil]) {
            return Ok(self.new_expr(ExprKind::Literal(LiteralValue::Nil)));
        }
        if self.match_kind(&[TokenKind::Number]) {
            let n = match &self.previous().literal {
                Some(crate::token::Literal::Number(n)) => *n,
                _ => unreachable!("number token always carries a numeric literal"),
            };
            return Ok(self.new_expr(ExprKind::Literal(LiteralValue::Number(n))));
        }
        if self.match_kind(&[TokenKind::String]) {
            let s = match &self.previous().literal {
                Some(crate::token::Literal::Str(s)) => s.clone(),
                _ => unreachable!("string token always carries a string literal"),
            };
            return Ok(self.new_expr(ExprKind::Literal(LiteralValue::String(s))));
        }
        if self.match_kind(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenKind::Identifier, "Expect superclass method name.")?;
            return Ok(self.new_expr(ExprKind::Super { keyword, method }));
        }
        if self.match_kind(&[TokenKind::This]) {
            return Ok(self.new_expr(ExprKind::This(self.previous().clone())));
        }
        if self.match_kind(&[TokenKind::Identifier]) {
            return Ok(self.new_expr(ExprKind::Variable(self.previous().clone())));
        }
        if self.match_kind(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.new_expr(ExprKind::Grouping(Box::new(expr))));
        }

        let peeked = self.peek().clone();
        Err(self.error(&peeked, "Expect expression."))
    }

    // ---- helpers ----

    fn new_expr(&mut self, kind: ExprKind) -> Expr {
        let id = *self.next_id;
        *self.next_id += 1;
        Expr { id, kind }
    }

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k)) {
            self.advance();
            return true;
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        let peeked = self.peek().clone();
        Err(self.error(&peeked, message))
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.diagnostics.parse_error(token, message);
        ParseError
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Vec<Stmt>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut next_id = 0;
        let tokens = Lexer::new(src, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut next_id, &mut diagnostics).parse();
        (statements, diagnostics)
    }

    #[test]
    fn parses_expression_statement() {
        let (stmts, diagnostics) = parse("1 + 2;");
        assert!(!diagnostics.had_error());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Expression(_)));
    }

    #[test]
    fn parses_var_declaration_without_initializer() {
        let (stmts, diagnostics) = parse("var x;");
        assert!(!diagnostics.had_error());
        match &stmts[0] {
            Stmt::Var { name, initializer } => {
                assert_eq!(name.lexeme, "x");
                assert!(initializer.is_none());
            }
            other => panic!("expected Var, got {other:?}"),
        }
    }

    #[test]
    fn desugars_for_loop_into_while_block() {
        let (stmts, diagnostics) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!diagnostics.had_error());
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(inner[0], Stmt::Var { .. }));
                assert!(matches!(inner[1], Stmt::While { .. }));
            }
            other => panic!("expected desugared Block, got {other:?}"),
        }
    }

    #[test]
    fn for_loop_without_condition_defaults_true() {
        let (stmts, diagnostics) = parse("for (;;) print 1;");
        assert!(!diagnostics.had_error());
        match &stmts[0] {
            Stmt::While { condition, .. } => {
                assert!(matches!(condition.kind, ExprKind::Literal(LiteralValue::Bool(true))));
            }
            other => panic!("expected While, got {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_reports_error_but_does_not_panic() {
        let (_, diagnostics) = parse("1 = 2;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn missing_semicolon_is_a_static_error() {
        let (_, diagnostics) = parse("print 1");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn class_with_superclass_parses() {
        let (stmts, diagnostics) = parse("class A {} class B < A { init() {} }");
        assert!(!diagnostics.had_error());
        match &stmts[1] {
            Stmt::Class { superclass, methods, .. } => {
                assert!(superclass.is_some());
                assert_eq!(methods.len(), 1);
            }
            other => panic!("expected Class, got {other:?}"),
        }
    }

    #[test]
    fn synchronize_recovers_after_error_to_parse_remaining_statements() {
        let (stmts, diagnostics) = parse("1 = 2; print 1;");
        assert!(diagnostics.had_error());
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn each_expression_gets_a_distinct_id() {
        let (stmts, _) = parse("1 + 2; 3 + 4;");
        let ids: Vec<ExprId> = stmts
            .iter()
            .map(|s| match s {
                Stmt::Expression(e) => e.id,
                _ => unreachable!(),
            })
            .collect();
        assert_ne!(ids[0], ids[1]);
    }
}
