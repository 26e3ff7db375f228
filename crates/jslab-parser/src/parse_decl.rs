//! Function, class and import declarations.

use std::rc::Rc;

use jslab_lexer::token::TokenKind;
use jslab_types::ast::*;
use jslab_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ── Functions ─────────────────────────────────────────────────────────────

    /// `[async] function name(params) { body }` as a statement.
    pub(crate) fn parse_function_declaration(&mut self) -> Option<Rc<Function>> {
        let func = self.parse_function(true)?;
        if func.name.is_none() {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                "function statement requires a name",
                func.span,
            );
            return None;
        }
        Some(func)
    }

    /// `[async] function [name](params) { body }` as an expression.
    pub(crate) fn parse_function_expression(&mut self) -> Option<Expr> {
        let func = self.parse_function(false)?;
        let span = func.span;
        Some(Expr::new(ExprKind::Function(func), span))
    }

    fn parse_function(&mut self, require_name: bool) -> Option<Rc<Function>> {
        let start = self.current_span();
        let is_async = self.check_word("async");
        if is_async {
            self.advance();
        }
        self.expect(&TokenKind::Function)?;
        if self.check(&TokenKind::Star) {
            self.error_at_current(ErrorCode::UNSUPPORTED_SYNTAX, "generators are not supported");
            return None;
        }
        let name = if matches!(self.peek_kind(), TokenKind::Identifier(_)) || require_name {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let (params, rest) = self.parse_params()?;
        let body = self.parse_function_body()?;
        Some(Rc::new(Function {
            name,
            params,
            rest,
            body: FunctionBody::Block(body),
            is_async,
            is_arrow: false,
            span: start.merge(self.previous_span()),
        }))
    }

    /// `x => ...`, `(a, b) => ...`, `async (a) => ...`
    pub(crate) fn parse_arrow(&mut self, is_async: bool) -> Option<Expr> {
        let start = self.current_span();
        if is_async {
            self.advance();
        }
        let (params, rest) = if matches!(self.peek_kind(), TokenKind::Identifier(_)) {
            (vec![Pattern::Ident(self.expect_identifier()?)], None)
        } else {
            self.parse_params()?
        };
        self.expect(&TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_function_body()?)
        } else {
            let saved_in = std::mem::replace(&mut self.no_in, false);
            self.function_depth += 1;
            let expr = self.parse_assignment();
            self.function_depth -= 1;
            self.no_in = saved_in;
            FunctionBody::Expr(Box::new(expr?))
        };
        let span = start.merge(self.previous_span());
        let func = Function {
            name: None,
            params,
            rest,
            body,
            is_async,
            is_arrow: true,
            span,
        };
        Some(Expr::new(ExprKind::Function(Rc::new(func)), span))
    }

    /// `(a, {b}, c = 1, ...rest)`
    pub(crate) fn parse_params(&mut self) -> Option<(Vec<Pattern>, Option<Pattern>)> {
        self.expect(&TokenKind::LParen)?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let mut params = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            if self.eat(&TokenKind::Ellipsis) {
                rest = Some(self.parse_binding_target()?);
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.check(&TokenKind::RParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.no_in = saved;
        self.expect(&TokenKind::RParen)?;
        Some((params, rest))
    }

    /// `{ statements }` of a function; enables `return`.
    pub(crate) fn parse_function_body(&mut self) -> Option<Vec<Stmt>> {
        self.function_depth += 1;
        let saved = std::mem::replace(&mut self.no_in, false);
        let body = self.parse_block_body();
        self.no_in = saved;
        self.function_depth -= 1;
        body
    }

    /// Method body for object literals and classes; `key_span` anchors the
    /// function's span at the property name.
    pub(crate) fn parse_method(
        &mut self,
        key: &PropKey,
        is_async: bool,
        key_span: Span,
    ) -> Option<Rc<Function>> {
        let name = match key {
            PropKey::Ident(n) | PropKey::String(n) => Some(Ident::new(n.clone(), key_span)),
            _ => None,
        };
        let (params, rest) = self.parse_params()?;
        let body = self.parse_function_body()?;
        Some(Rc::new(Function {
            name,
            params,
            rest,
            body: FunctionBody::Block(body),
            is_async,
            is_arrow: false,
            span: key_span.merge(self.previous_span()),
        }))
    }

    // ── Classes ───────────────────────────────────────────────────────────────

    /// `class [Name] [extends Expr] { methods }`
    pub(crate) fn parse_class(&mut self, require_name: bool) -> Option<Rc<Class>> {
        let start = self.advance().span;
        let name = if matches!(self.peek_kind(), TokenKind::Identifier(_)) || require_name {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let super_class = if self.eat(&TokenKind::Extends) {
            Some(Box::new(self.parse_class_heritage()?))
        } else {
            None
        };

        self.expect(&TokenKind::LBrace)?;
        let mut constructor = None;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            let member_start = self.current_span();
            let is_static = self.is_modifier_word("static");
            if is_static {
                self.advance();
            }
            if self.is_modifier_word("get") || self.is_modifier_word("set") {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_SYNTAX,
                    "getters and setters are not supported",
                );
                return None;
            }
            let is_async = self.is_modifier_word("async");
            if is_async {
                self.advance();
            }
            let key_span = self.current_span();
            let key = self.parse_property_key()?;
            if !self.check(&TokenKind::LParen) {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_SYNTAX,
                    "class fields are not supported; assign them in the constructor",
                );
                return None;
            }
            let func = self.parse_method(&key, is_async, key_span)?;
            let is_ctor = !is_static && matches!(&key, PropKey::Ident(n) if n == "constructor");
            if is_ctor {
                if constructor.is_some() {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "a class may only have one constructor",
                        key_span,
                    );
                    return None;
                }
                constructor = Some(func);
            } else {
                methods.push(ClassMethod {
                    key,
                    value: func,
                    is_static,
                    span: member_start.merge(self.previous_span()),
                });
            }
        }
        self.expect(&TokenKind::RBrace)?;

        Some(Rc::new(Class {
            name,
            super_class,
            constructor,
            methods,
            span: start.merge(self.previous_span()),
        }))
    }

    /// The `extends` clause: a left-hand-side expression.
    fn parse_class_heritage(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let mut expr = match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let e = Expr::ident(name.clone(), start);
                self.advance();
                e
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression_allow_in()?;
                self.expect(&TokenKind::RParen)?;
                inner
            }
            other => {
                let message = format!("expected class name after 'extends', got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                return None;
            }
        };
        while self.eat(&TokenKind::Dot) {
            let name = self.expect_property_name()?;
            let span = start.merge(name.span);
            expr = Expr::new(
                ExprKind::Member {
                    object: Box::new(expr),
                    property: MemberProp::Ident(name),
                    optional: false,
                },
                span,
            );
        }
        Some(expr)
    }

    // ── Imports ───────────────────────────────────────────────────────────────

    /// `import "m"`, `import d from "m"`, `import * as ns from "m"`,
    /// `import d, { a, b as c } from "m"`
    pub(crate) fn parse_import(&mut self) -> Option<ImportDecl> {
        self.advance();
        if let TokenKind::String(source) = self.peek_kind().clone() {
            self.advance();
            self.consume_semicolon();
            return Some(ImportDecl {
                source,
                specifiers: Vec::new(),
            });
        }

        let mut specifiers = Vec::new();
        if matches!(self.peek_kind(), TokenKind::Identifier(_)) {
            specifiers.push(ImportSpecifier::Default(self.expect_identifier()?));
            if !self.eat(&TokenKind::Comma) {
                return self.finish_import(specifiers);
            }
        }
        if self.eat(&TokenKind::Star) {
            self.expect_word("as")?;
            specifiers.push(ImportSpecifier::Namespace(self.expect_identifier()?));
        } else {
            self.expect(&TokenKind::LBrace)?;
            while !self.check(&TokenKind::RBrace) && !self.at_end() {
                let imported = self.expect_property_name()?;
                let local = if self.check_word("as") {
                    self.advance();
                    self.expect_identifier()?
                } else {
                    if imported.name.parse::<f64>().is_ok()
                        || jslab_lexer::ALL_KEYWORDS.contains(&imported.name.as_str())
                    {
                        self.error_at(
                            ErrorCode::UNEXPECTED_TOKEN,
                            format!("'{}' must be renamed with 'as'", imported.name),
                            imported.span,
                        );
                        return None;
                    }
                    imported.clone()
                };
                specifiers.push(ImportSpecifier::Named { imported, local });
                if !self.check(&TokenKind::RBrace) {
                    self.expect(&TokenKind::Comma)?;
                }
            }
            self.expect(&TokenKind::RBrace)?;
        }
        self.finish_import(specifiers)
    }

    fn finish_import(&mut self, specifiers: Vec<ImportSpecifier>) -> Option<ImportDecl> {
        self.expect_word("from")?;
        let source = match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                s
            }
            other => {
                let message = format!("expected module specifier string, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                return None;
            }
        };
        self.consume_semicolon();
        Some(ImportDecl { source, specifiers })
    }
}
