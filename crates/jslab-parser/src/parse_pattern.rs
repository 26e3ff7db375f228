//! Destructuring patterns.
//!
//! Binding patterns (`let {a, b: [c]} = o`) are parsed directly. Assignment
//! patterns (`[a, b] = [b, a]`) are first parsed as expressions and then
//! reinterpreted by [`Parser::expr_to_pattern`].

use jslab_lexer::token::TokenKind;
use jslab_types::ast::*;
use jslab_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ── Binding Patterns ──────────────────────────────────────────────────────

    /// Identifier, `[...]` or `{...}` binding target.
    pub(crate) fn parse_binding_target(&mut self) -> Option<Pattern> {
        match self.peek_kind() {
            TokenKind::Identifier(_) => Some(Pattern::Ident(self.expect_identifier()?)),
            TokenKind::LBracket => self.parse_array_binding(),
            TokenKind::LBrace => self.parse_object_binding(),
            other => {
                let message = format!("expected binding pattern, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                None
            }
        }
    }

    /// Binding target with an optional `= default`.
    pub(crate) fn parse_binding_element(&mut self) -> Option<Pattern> {
        let target = self.parse_binding_target()?;
        if !self.eat(&TokenKind::Eq) {
            return Some(target);
        }
        let default = self.parse_assignment()?;
        let span = target.span().merge(default.span);
        Some(Pattern::Default {
            target: Box::new(target),
            default: Box::new(default),
            span,
        })
    }

    fn parse_array_binding(&mut self) -> Option<Pattern> {
        let start = self.advance().span;
        let mut elems = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBracket) && !self.at_end() {
            if self.eat(&TokenKind::Comma) {
                elems.push(None);
                continue;
            }
            if self.eat(&TokenKind::Ellipsis) {
                rest = Some(Box::new(self.parse_binding_target()?));
                break;
            }
            elems.push(Some(self.parse_binding_element()?));
            if !self.check(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Some(Pattern::Array {
            elems,
            rest,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_object_binding(&mut self) -> Option<Pattern> {
        let start = self.advance().span;
        let mut props = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(&TokenKind::Ellipsis) {
                rest = Some(Box::new(Pattern::Ident(self.expect_identifier()?)));
                break;
            }
            let key_token = self.peek().clone();
            let key = self.parse_property_key()?;
            let value = if self.eat(&TokenKind::Colon) {
                self.parse_binding_element()?
            } else {
                let name = match (&key_token.kind, &key) {
                    (TokenKind::Identifier(_), PropKey::Ident(name)) => name.clone(),
                    _ => {
                        self.error_at(
                            ErrorCode::UNEXPECTED_TOKEN,
                            format!("expected ':' after property '{}'", key_token.kind),
                            key_token.span,
                        );
                        return None;
                    }
                };
                let target = Pattern::Ident(Ident::new(name, key_token.span));
                if self.eat(&TokenKind::Eq) {
                    let default = self.parse_assignment()?;
                    let span = key_token.span.merge(default.span);
                    Pattern::Default {
                        target: Box::new(target),
                        default: Box::new(default),
                        span,
                    }
                } else {
                    target
                }
            };
            props.push(PatternProp {
                key,
                span: key_token.span.merge(value.span()),
                value,
            });
            if !self.check(&TokenKind::RBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(Pattern::Object {
            props,
            rest,
            span: start.merge(self.previous_span()),
        })
    }

    // ── Cover Grammar ─────────────────────────────────────────────────────────

    /// Reinterpret an already-parsed expression as an assignment target.
    pub(crate) fn expr_to_pattern(&mut self, expr: Expr) -> Option<Pattern> {
        let span = expr.span;
        if matches!(
            expr.kind,
            ExprKind::Member {
                optional: false,
                ..
            } | ExprKind::SuperMember(_)
        ) {
            return Some(Pattern::Expr(Box::new(expr)));
        }
        match expr.kind {
            ExprKind::Ident(name) => Some(Pattern::Ident(Ident::new(name, span))),
            ExprKind::Array(items) => {
                let mut elems = Vec::new();
                let mut rest = None;
                let count = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        None => elems.push(None),
                        Some(Element::Expr(e)) => elems.push(Some(self.element_to_pattern(e)?)),
                        Some(Element::Spread(e)) if i + 1 == count => {
                            rest = Some(Box::new(self.expr_to_pattern(e)?));
                        }
                        Some(Element::Spread(e)) => {
                            self.error_at(
                                ErrorCode::INVALID_ASSIGNMENT_TARGET,
                                "rest element must be last element",
                                e.span,
                            );
                            return None;
                        }
                    }
                }
                Some(Pattern::Array { elems, rest, span })
            }
            ExprKind::Object(items) => {
                let mut props = Vec::new();
                let mut rest = None;
                let count = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        ObjectProp::KeyValue(key, value) => {
                            let prop_span = value.span;
                            let value = self.element_to_pattern(value)?;
                            props.push(PatternProp {
                                key,
                                value,
                                span: prop_span,
                            });
                        }
                        ObjectProp::Shorthand(id) => props.push(PatternProp {
                            key: PropKey::Ident(id.name.clone()),
                            span: id.span,
                            value: Pattern::Ident(id),
                        }),
                        ObjectProp::Spread(e) if i + 1 == count => {
                            rest = Some(Box::new(self.expr_to_pattern(e)?));
                        }
                        ObjectProp::Spread(e) => {
                            self.error_at(
                                ErrorCode::INVALID_ASSIGNMENT_TARGET,
                                "rest element must be last element",
                                e.span,
                            );
                            return None;
                        }
                        ObjectProp::Method(_, f) => {
                            self.error_at(
                                ErrorCode::INVALID_ASSIGNMENT_TARGET,
                                "invalid destructuring assignment target",
                                f.span,
                            );
                            return None;
                        }
                    }
                }
                Some(Pattern::Object { props, rest, span })
            }
            _ => {
                self.error_at(
                    ErrorCode::INVALID_ASSIGNMENT_TARGET,
                    "invalid left-hand side in assignment",
                    span,
                );
                None
            }
        }
    }

    /// Pattern element: a nested pattern or `target = default`.
    fn element_to_pattern(&mut self, expr: Expr) -> Option<Pattern> {
        let span = expr.span;
        match expr.kind {
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => Some(Pattern::Default {
                target,
                default: value,
                span,
            }),
            kind => self.expr_to_pattern(Expr::new(kind, span)),
        }
    }
}
