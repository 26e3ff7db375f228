//! Expression parsing with precedence climbing.
//!
//! Precedence (lowest to highest):
//! 1. Sequence `,`
//! 2. Assignment / arrow functions
//! 3. Conditional `? :`
//! 4. `??`, `||`, `&&`, bitwise, equality, relational, shift, additive,
//!    multiplicative, `**` (see [`BinaryOp::precedence`])
//! 5. Unary prefix (`!`, `-`, `typeof`, `await`, ...)
//! 6. Postfix `++` / `--`
//! 7. Calls, member access, optional chains, `new`
//! 8. Primary

use jslab_lexer::token::TokenKind;
use jslab_types::ast::*;
use jslab_types::ErrorCode;

use crate::parser::{Parser, MAX_EXPR_DEPTH};

/// A binary-level operator: arithmetic/relational or short-circuit.
#[derive(Clone, Copy)]
enum InfixOp {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl InfixOp {
    fn precedence(self) -> u8 {
        match self {
            InfixOp::Binary(op) => op.precedence(),
            InfixOp::Logical(op) => op.precedence(),
        }
    }
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::Add,
        TokenKind::MinusEq => AssignOp::Sub,
        TokenKind::StarEq => AssignOp::Mul,
        TokenKind::SlashEq => AssignOp::Div,
        TokenKind::PercentEq => AssignOp::Rem,
        TokenKind::StarStarEq => AssignOp::Exp,
        TokenKind::ShlEq => AssignOp::Shl,
        TokenKind::ShrEq => AssignOp::Shr,
        TokenKind::UShrEq => AssignOp::UShr,
        TokenKind::AmpEq => AssignOp::BitAnd,
        TokenKind::PipeEq => AssignOp::BitOr,
        TokenKind::CaretEq => AssignOp::BitXor,
        TokenKind::AmpAmpEq => AssignOp::And,
        TokenKind::PipePipeEq => AssignOp::Or,
        TokenKind::QuestionQuestionEq => AssignOp::Nullish,
        _ => return None,
    })
}

impl<'src> Parser<'src> {
    // ── Entry Points ──────────────────────────────────────────────────────────

    /// Parse a full expression, including the comma operator.
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Some(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        let span = exprs[0].span.merge(exprs[exprs.len() - 1].span);
        Some(Expr::new(ExprKind::Sequence(exprs), span))
    }

    /// Parse an expression with `in` re-enabled (inside brackets).
    pub(crate) fn parse_expression_allow_in(&mut self) -> Option<Expr> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let expr = self.parse_expression();
        self.no_in = saved;
        expr
    }

    /// Parse an assignment expression (no top-level comma).
    pub(crate) fn parse_assignment(&mut self) -> Option<Expr> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_DEPTH {
            self.error_at_current(
                ErrorCode::UNSUPPORTED_SYNTAX,
                "expression nesting too deep",
            );
            self.expr_depth -= 1;
            return None;
        }
        let result = self.parse_assignment_inner();
        self.expr_depth -= 1;
        result
    }

    fn parse_assignment_inner(&mut self) -> Option<Expr> {
        if let Some(is_async) = self.arrow_ahead() {
            return self.parse_arrow(is_async);
        }
        if self.check_word("async")
            && self.look_ahead(1) == &TokenKind::Function
            && !self.newline_at(1)
        {
            return self.parse_function_expression();
        }

        let lhs = self.parse_conditional()?;
        let Some(op) = assign_op(self.peek_kind()) else {
            return Some(lhs);
        };
        self.advance();
        let target = if op == AssignOp::Assign {
            self.expr_to_pattern(lhs)?
        } else {
            self.simple_target(lhs, "invalid left-hand side in assignment")?
        };
        let value = self.parse_assignment()?;
        let span = target.span().merge(value.span);
        Some(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    /// Detect an arrow function at the cursor. Returns `Some(is_async)`.
    fn arrow_ahead(&self) -> Option<bool> {
        match self.peek_kind() {
            TokenKind::Identifier(name) if name == "async" && !self.newline_at(1) => {
                match self.look_ahead(1) {
                    TokenKind::Identifier(_) if self.look_ahead(2) == &TokenKind::Arrow => {
                        Some(true)
                    }
                    TokenKind::LParen => {
                        let close = self.matching_close(1)?;
                        (self.look_ahead(close + 1) == &TokenKind::Arrow).then_some(true)
                    }
                    TokenKind::Arrow => Some(false),
                    _ => None,
                }
            }
            TokenKind::Identifier(_) => {
                (self.look_ahead(1) == &TokenKind::Arrow && !self.newline_at(1)).then_some(false)
            }
            TokenKind::LParen => {
                let close = self.matching_close(0)?;
                (self.look_ahead(close + 1) == &TokenKind::Arrow).then_some(false)
            }
            _ => None,
        }
    }

    /// Only identifiers and non-optional member expressions may be the
    /// target of compound assignment and update operators.
    pub(crate) fn simple_target(&mut self, expr: Expr, message: &str) -> Option<Pattern> {
        match &expr.kind {
            ExprKind::Ident(name) => Some(Pattern::Ident(Ident::new(name.clone(), expr.span))),
            ExprKind::Member {
                optional: false, ..
            }
            | ExprKind::SuperMember(_) => Some(Pattern::Expr(Box::new(expr))),
            _ => {
                self.error_at(ErrorCode::INVALID_ASSIGNMENT_TARGET, message, expr.span);
                None
            }
        }
    }

    // ── Conditional & Binary ──────────────────────────────────────────────────

    fn parse_conditional(&mut self) -> Option<Expr> {
        let test = self.parse_binary(1)?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let saved = std::mem::replace(&mut self.no_in, false);
        let consequent = self.parse_assignment();
        self.no_in = saved;
        let consequent = consequent?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = test.span.merge(alternate.span);
        Some(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn infix_op(&self) -> Option<InfixOp> {
        let op = match self.peek_kind() {
            TokenKind::QuestionQuestion => return Some(InfixOp::Logical(LogicalOp::Nullish)),
            TokenKind::PipePipe => return Some(InfixOp::Logical(LogicalOp::Or)),
            TokenKind::AmpAmp => return Some(InfixOp::Logical(LogicalOp::And)),
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::Amp => BinaryOp::BitAnd,
            TokenKind::EqEq => BinaryOp::EqEq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::EqEqEq => BinaryOp::StrictEq,
            TokenKind::NotEqEq => BinaryOp::StrictNotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::Instanceof => BinaryOp::Instanceof,
            TokenKind::In if !self.no_in => BinaryOp::In,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::UShr => BinaryOp::UShr,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::StarStar => BinaryOp::Exp,
            _ => return None,
        };
        Some(InfixOp::Binary(op))
    }

    /// Precedence climbing over every binary and logical operator.
    fn parse_binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.infix_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let right_assoc = matches!(op, InfixOp::Binary(BinaryOp::Exp));
            let right = self.parse_binary(if right_assoc { prec } else { prec + 1 })?;
            let span = left.span.merge(right.span);
            let kind = match op {
                InfixOp::Binary(op) => ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                InfixOp::Logical(op) => ExprKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
            left = Expr::new(kind, span);
        }
        Some(left)
    }

    // ── Unary & Postfix ───────────────────────────────────────────────────────

    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.parse_unary()?;
            let span = start.merge(arg.span);
            return Some(Expr::new(
                ExprKind::Unary {
                    op,
                    arg: Box::new(arg),
                },
                span,
            ));
        }

        match self.peek_kind() {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let arg = self.parse_unary()?;
                let span = start.merge(arg.span);
                self.simple_target(arg.clone(), "invalid operand for prefix operator")?;
                Some(Expr::new(
                    ExprKind::Update {
                        op,
                        prefix: true,
                        arg: Box::new(arg),
                    },
                    span,
                ))
            }
            TokenKind::Await => {
                self.advance();
                let arg = self.parse_unary()?;
                let span = start.merge(arg.span);
                Some(Expr::new(ExprKind::Await(Box::new(arg)), span))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let expr = self.parse_call_member()?;
        let op = match self.peek_kind() {
            TokenKind::PlusPlus if !self.peek().newline_before => UpdateOp::Increment,
            TokenKind::MinusMinus if !self.peek().newline_before => UpdateOp::Decrement,
            _ => return Some(expr),
        };
        self.simple_target(expr.clone(), "invalid operand for postfix operator")?;
        let end = self.advance().span;
        let span = expr.span.merge(end);
        Some(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                arg: Box::new(expr),
            },
            span,
        ))
    }

    // ── Calls & Member Access ─────────────────────────────────────────────────

    fn parse_call_member(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let mut expr = match self.peek_kind() {
            TokenKind::New => self.parse_new()?,
            TokenKind::Super => self.parse_super()?,
            TokenKind::Import if self.look_ahead(1) == &TokenKind::LParen => {
                self.advance();
                self.advance();
                let spec = self.parse_assignment()?;
                self.expect(&TokenKind::RParen)?;
                Expr::new(
                    ExprKind::Import(Box::new(spec)),
                    start.merge(self.previous_span()),
                )
            }
            _ => self.parse_primary()?,
        };

        let mut in_chain = false;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_property_name()?;
                    expr = self.member(expr, MemberProp::Ident(name), false, start);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression_allow_in()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = self.member(expr, MemberProp::Computed(Box::new(index)), false, start);
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            optional: false,
                        },
                        start.merge(self.previous_span()),
                    );
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    in_chain = true;
                    match self.peek_kind() {
                        TokenKind::LParen => {
                            let args = self.parse_arguments()?;
                            expr = Expr::new(
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    args,
                                    optional: true,
                                },
                                start.merge(self.previous_span()),
                            );
                        }
                        TokenKind::LBracket => {
                            self.advance();
                            let index = self.parse_expression_allow_in()?;
                            self.expect(&TokenKind::RBracket)?;
                            expr = self.member(
                                expr,
                                MemberProp::Computed(Box::new(index)),
                                true,
                                start,
                            );
                        }
                        _ => {
                            let name = self.expect_property_name()?;
                            expr = self.member(expr, MemberProp::Ident(name), true, start);
                        }
                    }
                }
                TokenKind::Template(_) | TokenKind::TemplateHead(_)
                    if !self.peek().newline_before =>
                {
                    self.error_at_current(
                        ErrorCode::UNSUPPORTED_SYNTAX,
                        "tagged templates are not supported",
                    );
                    return None;
                }
                _ => break,
            }
        }

        if in_chain {
            let span = expr.span;
            expr = Expr::new(ExprKind::Chain(Box::new(expr)), span);
        }
        Some(expr)
    }

    fn member(
        &self,
        object: Expr,
        property: MemberProp,
        optional: bool,
        start: jslab_types::Span,
    ) -> Expr {
        Expr::new(
            ExprKind::Member {
                object: Box::new(object),
                property,
                optional,
            },
            start.merge(self.previous_span()),
        )
    }

    /// `new Callee(args)`. The callee is a member expression without calls.
    fn parse_new(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let callee_start = self.current_span();
        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_property_name()?;
                    callee = self.member(callee, MemberProp::Ident(name), false, callee_start);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression_allow_in()?;
                    self.expect(&TokenKind::RBracket)?;
                    callee = self.member(
                        callee,
                        MemberProp::Computed(Box::new(index)),
                        false,
                        callee_start,
                    );
                }
                _ => break,
            }
        }
        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Some(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            start.merge(self.previous_span()),
        ))
    }

    fn parse_super(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        match self.peek_kind() {
            TokenKind::LParen => {
                let args = self.parse_arguments()?;
                Some(Expr::new(
                    ExprKind::SuperCall(args),
                    start.merge(self.previous_span()),
                ))
            }
            TokenKind::Dot => {
                self.advance();
                let name = self.expect_property_name()?;
                Some(Expr::new(
                    ExprKind::SuperMember(MemberProp::Ident(name)),
                    start.merge(self.previous_span()),
                ))
            }
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_expression_allow_in()?;
                self.expect(&TokenKind::RBracket)?;
                Some(Expr::new(
                    ExprKind::SuperMember(MemberProp::Computed(Box::new(index))),
                    start.merge(self.previous_span()),
                ))
            }
            _ => {
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "'super' keyword unexpected here",
                    start,
                );
                None
            }
        }
    }

    /// `( [...]expr, ... )`
    pub(crate) fn parse_arguments(&mut self) -> Option<Vec<Element>> {
        self.expect(&TokenKind::LParen)?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let arg = if self.eat(&TokenKind::Ellipsis) {
                Element::Spread(self.parse_assignment()?)
            } else {
                Element::Expr(self.parse_assignment()?)
            };
            args.push(arg);
            if !self.check(&TokenKind::RParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.no_in = saved;
        self.expect(&TokenKind::RParen)?;
        Some(args)
    }

    // ── Primary Expressions ───────────────────────────────────────────────────

    fn parse_primary(&mut self) -> Option<Expr> {
        let token = self.peek().clone();
        let span = token.span;
        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::String(s) => ExprKind::String(s),
            TokenKind::Template(s) => ExprKind::Template {
                quasis: vec![s],
                exprs: Vec::new(),
            },
            TokenKind::TemplateHead(s) => return self.parse_template(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::This => ExprKind::This,
            TokenKind::Identifier(name) => {
                if name == "async"
                    && self.look_ahead(1) == &TokenKind::Function
                    && !self.newline_at(1)
                {
                    return self.parse_function_expression();
                }
                ExprKind::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression_allow_in()?;
                self.expect(&TokenKind::RParen)?;
                return Some(inner);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => return self.parse_function_expression(),
            TokenKind::Class => {
                let class = self.parse_class(false)?;
                let span = class.span;
                return Some(Expr::new(ExprKind::Class(class), span));
            }
            TokenKind::Export => {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_SYNTAX,
                    "'export' is not supported in the console",
                );
                return None;
            }
            ref other => {
                let code = if matches!(other, TokenKind::Eof) {
                    ErrorCode::UNCLOSED_DELIMITER
                } else {
                    ErrorCode::UNEXPECTED_TOKEN
                };
                self.error_at_current(code, format!("unexpected token '{other}'"));
                return None;
            }
        };
        self.advance();
        Some(Expr::new(kind, span))
    }

    fn parse_template(&mut self, head: String) -> Option<Expr> {
        let start = self.advance().span;
        let mut quasis = vec![head];
        let mut exprs = Vec::new();
        loop {
            exprs.push(self.parse_expression_allow_in()?);
            match self.peek_kind().clone() {
                TokenKind::TemplateMiddle(s) => {
                    self.advance();
                    quasis.push(s);
                }
                TokenKind::TemplateTail(s) => {
                    self.advance();
                    quasis.push(s);
                    break;
                }
                _ => {
                    self.error_at_current(
                        ErrorCode::UNCLOSED_DELIMITER,
                        "unterminated template substitution",
                    );
                    return None;
                }
            }
        }
        Some(Expr::new(
            ExprKind::Template { quasis, exprs },
            start.merge(self.previous_span()),
        ))
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let saved = std::mem::replace(&mut self.no_in, false);
        let mut elems = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.at_end() {
            if self.eat(&TokenKind::Comma) {
                elems.push(None);
                continue;
            }
            let elem = if self.eat(&TokenKind::Ellipsis) {
                Element::Spread(self.parse_assignment()?)
            } else {
                Element::Expr(self.parse_assignment()?)
            };
            elems.push(Some(elem));
            if !self.check(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.no_in = saved;
        self.expect(&TokenKind::RBracket)?;
        Some(Expr::new(
            ExprKind::Array(elems),
            start.merge(self.previous_span()),
        ))
    }

    fn parse_object_literal(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let saved = std::mem::replace(&mut self.no_in, false);
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            props.push(self.parse_object_prop()?);
            if !self.check(&TokenKind::RBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.no_in = saved;
        self.expect(&TokenKind::RBrace)?;
        Some(Expr::new(
            ExprKind::Object(props),
            start.merge(self.previous_span()),
        ))
    }

    /// Returns `true` when the word at the cursor is a modifier (`async`,
    /// `get`, `set`, `static`) rather than a property name itself.
    pub(crate) fn is_modifier_word(&self, word: &str) -> bool {
        self.check_word(word)
            && !matches!(
                self.look_ahead(1),
                TokenKind::Comma
                    | TokenKind::Colon
                    | TokenKind::LParen
                    | TokenKind::RBrace
                    | TokenKind::Eq
                    | TokenKind::Semicolon
            )
            && !self.newline_at(1)
    }

    fn parse_object_prop(&mut self) -> Option<ObjectProp> {
        if self.eat(&TokenKind::Ellipsis) {
            return Some(ObjectProp::Spread(self.parse_assignment()?));
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
        if self.check(&TokenKind::Star) {
            self.error_at_current(ErrorCode::UNSUPPORTED_SYNTAX, "generators are not supported");
            return None;
        }

        let key_token = self.peek().clone();
        let key = self.parse_property_key()?;
        if self.check(&TokenKind::LParen) {
            let func = self.parse_method(&key, is_async, key_token.span)?;
            return Some(ObjectProp::Method(key, func));
        }
        if is_async {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '(', got '{}'", self.peek_kind()),
            );
            return None;
        }
        if self.eat(&TokenKind::Colon) {
            let value = self.parse_assignment()?;
            return Some(ObjectProp::KeyValue(key, value));
        }

        match (&key_token.kind, key) {
            (TokenKind::Identifier(_), PropKey::Ident(name)) => {
                let id = Ident::new(name.clone(), key_token.span);
                if self.eat(&TokenKind::Eq) {
                    // Shorthand with initializer; only meaningful once the
                    // object is reinterpreted as a destructuring pattern.
                    let default = self.parse_assignment()?;
                    let span = id.span.merge(default.span);
                    let value = Expr::assign(Pattern::Ident(id), default, span);
                    Some(ObjectProp::KeyValue(PropKey::Ident(name), value))
                } else {
                    Some(ObjectProp::Shorthand(id))
                }
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected ':', got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Property key in object literals, patterns and class bodies.
    pub(crate) fn parse_property_key(&mut self) -> Option<PropKey> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Some(PropKey::String(s))
            }
            TokenKind::Number(n) => {
                self.advance();
                Some(PropKey::Number(n))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_assignment()?;
                self.expect(&TokenKind::RBracket)?;
                Some(PropKey::Computed(Box::new(expr)))
            }
            kind => match kind.property_name() {
                Some(name) => {
                    self.advance();
                    Some(PropKey::Ident(name))
                }
                None => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected property name, got '{kind}'"),
                    );
                    None
                }
            },
        }
    }
}
