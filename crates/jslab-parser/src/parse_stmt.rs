//! Statement parsing.

use jslab_lexer::token::TokenKind;
use jslab_types::ast::*;
use jslab_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let kind = match self.peek_kind() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block_body()?),
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let decl = self.parse_var_decl(true)?;
                self.consume_semicolon();
                StmtKind::Var(decl)
            }
            TokenKind::Function => StmtKind::Function(self.parse_function_declaration()?),
            TokenKind::Identifier(name)
                if name == "async"
                    && self.look_ahead(1) == &TokenKind::Function
                    && !self.newline_at(1) =>
            {
                StmtKind::Function(self.parse_function_declaration()?)
            }
            TokenKind::Class => StmtKind::Class(self.parse_class(true)?),
            TokenKind::Import if self.look_ahead(1) != &TokenKind::LParen => {
                StmtKind::Import(self.parse_import()?)
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::While => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expression_allow_in()?;
                self.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::While { test, body }
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&TokenKind::While)?;
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expression_allow_in()?;
                self.expect(&TokenKind::RParen)?;
                self.eat(&TokenKind::Semicolon);
                StmtKind::DoWhile { body, test }
            }
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Break | TokenKind::Continue => {
                let is_break = self.advance().kind == TokenKind::Break;
                let label = match self.peek_kind() {
                    TokenKind::Identifier(_) if !self.peek().newline_before => {
                        Some(self.expect_identifier()?)
                    }
                    _ => None,
                };
                self.consume_semicolon();
                if is_break {
                    StmtKind::Break(label)
                } else {
                    StmtKind::Continue(label)
                }
            }
            TokenKind::Return => {
                let span = self.advance().span;
                if self.function_depth == 0 {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "'return' outside of function",
                        span,
                    );
                    return None;
                }
                let arg = if self.ends_statement() {
                    None
                } else {
                    Some(self.parse_expression_allow_in()?)
                };
                self.consume_semicolon();
                StmtKind::Return(arg)
            }
            TokenKind::Throw => {
                self.advance();
                if self.peek().newline_before {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "illegal newline after throw",
                    );
                    return None;
                }
                let arg = self.parse_expression_allow_in()?;
                self.consume_semicolon();
                StmtKind::Throw(arg)
            }
            TokenKind::Try => self.parse_try()?,
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Export => {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_SYNTAX,
                    "'export' is not supported in the console",
                );
                return None;
            }
            TokenKind::Identifier(_) if self.look_ahead(1) == &TokenKind::Colon => {
                let label = self.expect_identifier()?;
                self.advance();
                let body = Box::new(self.parse_statement()?);
                StmtKind::Labeled { label, body }
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon();
                StmtKind::Expr(expr)
            }
        };
        Some(Stmt::new(kind, start.merge(self.previous_span())))
    }

    /// True when the next token cannot continue the current statement.
    fn ends_statement(&self) -> bool {
        self.at_end()
            || self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.peek().newline_before
    }

    /// `{ stmt* }`
    pub(crate) fn parse_block_body(&mut self) -> Option<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Some(body)
    }

    // ── Declarations ──────────────────────────────────────────────────────────

    fn var_kind(&mut self) -> VarKind {
        match self.advance().kind {
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => VarKind::Var,
        }
    }

    /// `var|let|const a = 1, b`. `require_init` enforces const initializers.
    fn parse_var_decl(&mut self, require_init: bool) -> Option<VarDecl> {
        let kind = self.var_kind();
        let first = self.parse_binding_target()?;
        self.finish_var_decl(kind, first, require_init)
    }

    fn finish_var_decl(
        &mut self,
        kind: VarKind,
        first: Pattern,
        require_init: bool,
    ) -> Option<VarDecl> {
        let mut declarations = Vec::new();
        let mut target = first;
        loop {
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let needs_init =
                kind == VarKind::Const || !matches!(target, Pattern::Ident(_));
            if init.is_none() && needs_init && require_init {
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "missing initializer in declaration",
                    target.span(),
                );
                return None;
            }
            let span = match &init {
                Some(e) => target.span().merge(e.span),
                None => target.span(),
            };
            declarations.push(VarDeclarator { target, init, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            target = self.parse_binding_target()?;
        }
        Some(VarDecl { kind, declarations })
    }

    // ── Control Flow ──────────────────────────────────────────────────────────

    fn parse_if(&mut self) -> Option<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let test = self.parse_expression_allow_in()?;
        self.expect(&TokenKind::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Some(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Option<StmtKind> {
        self.advance();
        if self.check(&TokenKind::Await) {
            self.error_at_current(ErrorCode::UNSUPPORTED_SYNTAX, "'for await' is not supported");
            return None;
        }
        self.expect(&TokenKind::LParen)?;

        let init = match self.peek_kind() {
            TokenKind::Semicolon => None,
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let kind = self.var_kind();
                let target = self.parse_binding_target()?;
                if let Some(each) = self.for_each_kind() {
                    return self.finish_for_each(each, ForHead::Var(kind, target));
                }
                self.no_in = true;
                let decl = self.finish_var_decl(kind, target, true);
                self.no_in = false;
                Some(ForInit::Var(decl?))
            }
            _ => {
                self.no_in = true;
                let expr = self.parse_expression();
                self.no_in = false;
                let expr = expr?;
                if let Some(each) = self.for_each_kind() {
                    let target = self.expr_to_pattern(expr)?;
                    return self.finish_for_each(each, ForHead::Pattern(target));
                }
                Some(ForInit::Expr(expr))
            }
        };

        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression_allow_in()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression_allow_in()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Some(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn for_each_kind(&self) -> Option<ForEachKind> {
        if self.check(&TokenKind::In) {
            Some(ForEachKind::In)
        } else if self.check_word("of") {
            Some(ForEachKind::Of)
        } else {
            None
        }
    }

    fn finish_for_each(&mut self, kind: ForEachKind, left: ForHead) -> Option<StmtKind> {
        self.advance();
        let right = match kind {
            ForEachKind::In => self.parse_expression_allow_in()?,
            ForEachKind::Of => {
                let saved = std::mem::replace(&mut self.no_in, false);
                let e = self.parse_assignment();
                self.no_in = saved;
                e?
            }
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Some(StmtKind::ForEach {
            kind,
            left,
            right,
            body,
        })
    }

    fn parse_switch(&mut self) -> Option<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let discriminant = self.parse_expression_allow_in()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;

        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let case_start = self.current_span();
            let test = match self.peek_kind() {
                TokenKind::Case => {
                    self.advance();
                    Some(self.parse_expression_allow_in()?)
                }
                TokenKind::Default => {
                    if seen_default {
                        self.error_at_current(
                            ErrorCode::UNEXPECTED_TOKEN,
                            "more than one default clause in switch statement",
                        );
                        return None;
                    }
                    seen_default = true;
                    self.advance();
                    None
                }
                other => {
                    let message = format!("expected 'case' or 'default', got '{other}'");
                    self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                    return None;
                }
            };
            self.expect(&TokenKind::Colon)?;
            let mut body = Vec::new();
            while !matches!(
                self.peek_kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase {
                test,
                body,
                span: case_start.merge(self.previous_span()),
            });
        }
        self.expect(&TokenKind::RBrace)?;
        Some(StmtKind::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_try(&mut self) -> Option<StmtKind> {
        self.advance();
        let block = self.parse_block_body()?;
        let handler = if self.check(&TokenKind::Catch) {
            let start = self.advance().span;
            let param = if self.eat(&TokenKind::LParen) {
                let p = self.parse_binding_target()?;
                self.expect(&TokenKind::RParen)?;
                Some(p)
            } else {
                None
            };
            let body = self.parse_block_body()?;
            Some(CatchClause {
                param,
                body,
                span: start.merge(self.previous_span()),
            })
        } else {
            None
        };
        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block_body()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                "missing catch or finally after try",
            );
            return None;
        }
        Some(StmtKind::Try {
            block,
            handler,
            finalizer,
        })
    }
}
