//! Top-level binding rewrite.
//!
//! Declarations in the submission's top scope become member assignments on
//! the persistent context object, so the next submission sees them:
//!
//! ```text
//! var a = 1;            jsl.context.a = 1;
//! let { b, c } = f();   const __jsl_tmp0 = f();
//!                       jsl.context.b = __jsl_tmp0.b;
//!                       jsl.context.c = __jsl_tmp0.c;
//! function g() {}       function g() {}
//!                       jsl.context.g = g;
//! ```
//!
//! The whole body is then wrapped in an async arrow that is called
//! immediately, with the last expression statement returned.

use std::rc::Rc;

use jslab_types::ast::*;
use jslab_types::Span;

use crate::checker::RESERVED_PREFIX;

/// One lowered piece of a destructuring declaration, in evaluation order.
enum Step {
    /// Bind a temporary to a value evaluated once.
    Temp(Ident, Expr),
    /// Evaluate an expression (an assignment, usually).
    Expr(Expr),
}

pub struct Rewriter {
    context_path: Vec<String>,
    names: Vec<String>,
    temps: usize,
}

impl Rewriter {
    /// `context_path` is the dotted path of the context object, e.g.
    /// `jsl.context`. Its first segment is the helper root (`jsl.omit`).
    pub fn new(context_path: &str) -> Self {
        Self {
            context_path: context_path.split('.').map(str::to_string).collect(),
            names: Vec::new(),
            temps: 0,
        }
    }

    /// Top-level names introduced so far, in first-declaration order.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }

    /// Rewrite a parsed submission into a single-statement program
    /// `(async () => { ... })();`.
    pub fn rewrite_program(&mut self, program: Program) -> Program {
        let span = program.span;
        let mut stmts = program.body;
        let tail = match stmts.last() {
            Some(Stmt {
                kind: StmtKind::Expr(_),
                ..
            }) => stmts.pop(),
            _ => None,
        };

        let mut body = Vec::new();
        for stmt in stmts {
            self.stmt(stmt, 0, &mut body);
        }
        match tail {
            Some(Stmt {
                kind: StmtKind::Expr(e),
                span,
            }) => body.push(Stmt::new(StmtKind::Return(Some(e)), span)),
            _ => {
                let end = Span::point(span.end_line, span.end_col);
                body.push(Stmt::new(StmtKind::Return(Some(undefined(end))), end));
            }
        }

        let func = Function {
            name: None,
            params: Vec::new(),
            rest: None,
            body: FunctionBody::Block(body),
            is_async: true,
            is_arrow: true,
            span,
        };
        let call = Expr::new(
            ExprKind::Call {
                callee: Box::new(Expr::new(ExprKind::Function(Rc::new(func)), span)),
                args: Vec::new(),
                optional: false,
            },
            span,
        );
        Program {
            body: vec![Stmt::new(StmtKind::Expr(call), span)],
            span,
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    /// Rewrite one statement of the top scope. `depth` is 0 for the
    /// submission's own statement list and grows with block nesting;
    /// function bodies are never entered.
    fn stmt(&mut self, stmt: Stmt, depth: usize, out: &mut Vec<Stmt>) {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::Var(decl) if persists(decl.kind, depth) => {
                let mut steps = Vec::new();
                for d in decl.declarations {
                    let value = d.init.unwrap_or_else(|| undefined(d.span));
                    self.lower(&d.target, value, d.span, &mut steps);
                }
                out.extend(steps_to_stmts(steps));
            }
            StmtKind::Function(f) if depth == 0 => {
                let name = f.name.clone();
                out.push(Stmt::new(StmtKind::Function(f), span));
                if let Some(name) = name {
                    out.push(self.publish(&name, span));
                }
            }
            StmtKind::Class(c) if depth == 0 => {
                let name = c.name.clone();
                out.push(Stmt::new(StmtKind::Class(c), span));
                if let Some(name) = name {
                    out.push(self.publish(&name, span));
                }
            }
            StmtKind::Import(decl) => out.extend(self.import(decl, span)),
            StmtKind::Block(body) => {
                let body = self.block(body, depth + 1);
                out.push(Stmt::new(StmtKind::Block(body), span));
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                let consequent = Box::new(self.nested(*consequent, depth));
                let alternate = alternate.map(|alt| Box::new(self.nested(*alt, depth)));
                out.push(Stmt::new(
                    StmtKind::If {
                        test,
                        consequent,
                        alternate,
                    },
                    span,
                ));
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let body = Box::new(self.nested(*body, depth));
                let init = match init {
                    Some(ForInit::Var(decl)) if decl.kind == VarKind::Var => {
                        let mut steps = Vec::new();
                        for d in decl.declarations {
                            let value = d.init.unwrap_or_else(|| undefined(d.span));
                            self.lower(&d.target, value, d.span, &mut steps);
                        }
                        let mut exprs = Vec::new();
                        for step in steps {
                            match step {
                                Step::Temp(id, value) => {
                                    out.push(let_stmt(id.clone()));
                                    let target = Pattern::Ident(id);
                                    exprs.push(Expr::assign(target, value, span));
                                }
                                Step::Expr(e) => exprs.push(e),
                            }
                        }
                        Some(ForInit::Expr(sequence(exprs, span)))
                    }
                    other => other,
                };
                out.push(Stmt::new(
                    StmtKind::For {
                        init,
                        test,
                        update,
                        body,
                    },
                    span,
                ));
            }
            StmtKind::ForEach {
                kind,
                left,
                right,
                body,
            } => {
                let mut body = self.nested(*body, depth);
                let left = match left {
                    ForHead::Var(var_kind, target) if persists(var_kind, depth) => match target {
                        Pattern::Ident(id) => {
                            self.declare(&id.name);
                            let member = self.context_member(&id.name, id.span);
                            ForHead::Pattern(Pattern::Expr(Box::new(member)))
                        }
                        pattern => {
                            let tmp = self.temp(pattern.span());
                            let mut steps = Vec::new();
                            let value = Expr::ident(tmp.name.clone(), tmp.span);
                            self.lower(&pattern, value, pattern.span(), &mut steps);
                            let mut stmts = steps_to_stmts(steps);
                            let body_span = body.span;
                            match body.kind {
                                StmtKind::Block(inner) => stmts.extend(inner),
                                other => stmts.push(Stmt::new(other, body_span)),
                            }
                            body = Stmt::new(StmtKind::Block(stmts), body_span);
                            ForHead::Var(VarKind::Const, Pattern::Ident(tmp))
                        }
                    },
                    other => other,
                };
                out.push(Stmt::new(
                    StmtKind::ForEach {
                        kind,
                        left,
                        right,
                        body: Box::new(body),
                    },
                    span,
                ));
            }
            StmtKind::While { test, body } => {
                let body = Box::new(self.nested(*body, depth));
                out.push(Stmt::new(StmtKind::While { test, body }, span));
            }
            StmtKind::DoWhile { body, test } => {
                let body = Box::new(self.nested(*body, depth));
                out.push(Stmt::new(StmtKind::DoWhile { body, test }, span));
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                let cases = cases
                    .into_iter()
                    .map(|case| SwitchCase {
                        test: case.test,
                        body: self.block(case.body, depth + 1),
                        span: case.span,
                    })
                    .collect();
                out.push(Stmt::new(
                    StmtKind::Switch {
                        discriminant,
                        cases,
                    },
                    span,
                ));
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let block = self.block(block, depth + 1);
                let handler = handler.map(|h| CatchClause {
                    param: h.param,
                    body: self.block(h.body, depth + 1),
                    span: h.span,
                });
                let finalizer = finalizer.map(|f| self.block(f, depth + 1));
                out.push(Stmt::new(
                    StmtKind::Try {
                        block,
                        handler,
                        finalizer,
                    },
                    span,
                ));
            }
            StmtKind::Labeled { label, body } => {
                // Anything hoisted out of the body goes before the label.
                let mut inner = Vec::new();
                self.stmt(*body, depth, &mut inner);
                let last = inner
                    .pop()
                    .unwrap_or_else(|| Stmt::new(StmtKind::Empty, span));
                out.extend(inner);
                out.push(Stmt::new(
                    StmtKind::Labeled {
                        label,
                        body: Box::new(last),
                    },
                    span,
                ));
            }
            other => out.push(Stmt::new(other, span)),
        }
    }

    fn block(&mut self, body: Vec<Stmt>, depth: usize) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            self.stmt(stmt, depth, &mut out);
        }
        out
    }

    /// A statement in a single-statement position (loop or branch body).
    fn nested(&mut self, stmt: Stmt, depth: usize) -> Stmt {
        let span = stmt.span;
        let mut out = Vec::new();
        self.stmt(stmt, depth + 1, &mut out);
        if out.len() == 1 {
            if let Some(only) = out.pop() {
                return only;
            }
        }
        Stmt::new(StmtKind::Block(out), span)
    }

    fn import(&mut self, decl: ImportDecl, span: Span) -> Vec<Stmt> {
        let spec = Expr::new(ExprKind::String(decl.source), span);
        let load = Expr::new(
            ExprKind::Await(Box::new(Expr::new(ExprKind::Import(Box::new(spec)), span))),
            span,
        );
        match decl.specifiers.as_slice() {
            [] => vec![Stmt::new(StmtKind::Expr(load), span)],
            [ImportSpecifier::Default(id)] => {
                let value = Expr::member(load, "default", span);
                vec![self.assign_context(id, value, span)]
            }
            [ImportSpecifier::Namespace(id)] => vec![self.assign_context(id, load, span)],
            specs => {
                let tmp = self.temp(span);
                let mut out = vec![const_stmt(tmp.clone(), load)];
                for spec in specs {
                    let module = Expr::ident(tmp.name.clone(), span);
                    let value = match spec {
                        ImportSpecifier::Default(_) => Expr::member(module, "default", span),
                        ImportSpecifier::Namespace(_) => module,
                        ImportSpecifier::Named { imported, .. } => {
                            Expr::member(module, imported.name.clone(), imported.span)
                        }
                    };
                    out.push(self.assign_context(spec.local(), value, span));
                }
                out
            }
        }
    }

    // ── Destructuring ─────────────────────────────────────────────────────────

    /// Lower `target = value` into context assignments.
    fn lower(&mut self, target: &Pattern, value: Expr, span: Span, steps: &mut Vec<Step>) {
        match target {
            Pattern::Ident(id) => {
                self.declare(&id.name);
                let member = self.context_member(&id.name, id.span);
                steps.push(Step::Expr(Expr::assign(
                    Pattern::Expr(Box::new(member)),
                    value,
                    span,
                )));
            }
            Pattern::Expr(e) => {
                let target = Pattern::Expr(e.clone());
                steps.push(Step::Expr(Expr::assign(target, value, span)));
            }
            Pattern::Default {
                target, default, ..
            } => {
                let value = self.repeatable(value, span, steps);
                let test = Expr::new(
                    ExprKind::Binary {
                        op: BinaryOp::StrictEq,
                        left: Box::new(value.clone()),
                        right: Box::new(undefined(span)),
                    },
                    span,
                );
                let chosen = Expr::new(
                    ExprKind::Conditional {
                        test: Box::new(test),
                        consequent: default.clone(),
                        alternate: Box::new(value),
                    },
                    span,
                );
                self.lower(target, chosen, span, steps);
            }
            Pattern::Object { props, rest, .. } => {
                let accesses = props.len() + usize::from(rest.is_some());
                if accesses == 0 {
                    steps.push(Step::Expr(value));
                    return;
                }
                let base = if accesses > 1 {
                    self.repeatable(value, span, steps)
                } else {
                    value
                };
                for prop in props {
                    let access = key_access(base.clone(), &prop.key, prop.span);
                    self.lower(&prop.value, access, prop.span, steps);
                }
                if let Some(rest) = rest {
                    let keys = props
                        .iter()
                        .map(|p| Some(Element::Expr(key_value(&p.key, p.span))))
                        .collect();
                    let omit = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(self.helper("omit", span)),
                            args: vec![
                                Element::Expr(base),
                                Element::Expr(Expr::new(ExprKind::Array(keys), span)),
                            ],
                            optional: false,
                        },
                        span,
                    );
                    self.lower(rest, omit, rest.span(), steps);
                }
            }
            Pattern::Array { elems, rest, .. } => {
                let accesses =
                    elems.iter().flatten().count() + usize::from(rest.is_some());
                if accesses == 0 {
                    steps.push(Step::Expr(value));
                    return;
                }
                let base = if accesses > 1 {
                    self.repeatable(value, span, steps)
                } else {
                    value
                };
                for (i, el) in elems.iter().enumerate() {
                    if let Some(el) = el {
                        let index = Expr::new(ExprKind::Number(i as f64), el.span());
                        let access = Expr::index(base.clone(), index, el.span());
                        self.lower(el, access, el.span(), steps);
                    }
                }
                if let Some(rest) = rest {
                    let slice = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(Expr::member(base, "slice", rest.span())),
                            args: vec![Element::Expr(Expr::new(
                                ExprKind::Number(elems.len() as f64),
                                rest.span(),
                            ))],
                            optional: false,
                        },
                        rest.span(),
                    );
                    self.lower(rest, slice, rest.span(), steps);
                }
            }
        }
    }

    /// `value` itself when re-evaluating it is unobservable, otherwise a
    /// fresh temporary bound to it.
    fn repeatable(&mut self, value: Expr, span: Span, steps: &mut Vec<Step>) -> Expr {
        if is_repeatable(&value) {
            return value;
        }
        let tmp = self.temp(span);
        let reference = Expr::ident(tmp.name.clone(), span);
        steps.push(Step::Temp(tmp, value));
        reference
    }

    // ── Builders ──────────────────────────────────────────────────────────────

    fn declare(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    fn temp(&mut self, span: Span) -> Ident {
        let name = format!("{RESERVED_PREFIX}tmp{}", self.temps);
        self.temps += 1;
        Ident::new(name, span)
    }

    /// `jsl.context.<name>`
    fn context_member(&self, name: &str, span: Span) -> Expr {
        let mut segments = self.context_path.iter();
        let root = segments.next().map_or("jsl", String::as_str);
        let mut expr = Expr::ident(root, span);
        for segment in segments {
            expr = Expr::member(expr, segment.clone(), span);
        }
        Expr::member(expr, name, span)
    }

    /// `jsl.<name>`
    fn helper(&self, name: &str, span: Span) -> Expr {
        let root = self.context_path.first().map_or("jsl", String::as_str);
        Expr::member(Expr::ident(root, span), name, span)
    }

    fn assign_context(&mut self, id: &Ident, value: Expr, span: Span) -> Stmt {
        self.declare(&id.name);
        let member = self.context_member(&id.name, id.span);
        let assign = Expr::assign(Pattern::Expr(Box::new(member)), value, span);
        Stmt::new(StmtKind::Expr(assign), span)
    }

    /// `jsl.context.f = f;`
    fn publish(&mut self, id: &Ident, span: Span) -> Stmt {
        let value = Expr::ident(id.name.clone(), id.span);
        self.assign_context(id, value, span)
    }
}

/// Whether a declaration of `kind` at `depth` targets the context.
fn persists(kind: VarKind, depth: usize) -> bool {
    kind == VarKind::Var || depth == 0
}

fn undefined(span: Span) -> Expr {
    Expr::ident("undefined", span)
}

fn is_repeatable(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Member {
            object,
            property,
            optional: false,
        } => {
            is_repeatable(object)
                && match property {
                    MemberProp::Ident(_) => true,
                    MemberProp::Computed(key) => {
                        matches!(key.kind, ExprKind::Number(_) | ExprKind::String(_))
                    }
                }
        }
        _ => e.is_pure(),
    }
}

/// `base.key` / `base["key"]` / `base[expr]`
fn key_access(base: Expr, key: &PropKey, span: Span) -> Expr {
    match key {
        PropKey::Ident(name) => Expr::member(base, name.clone(), span),
        other => Expr::index(base, key_value(other, span), span),
    }
}

/// The key as a value, for computed access and `jsl.omit`.
fn key_value(key: &PropKey, span: Span) -> Expr {
    match key {
        PropKey::Ident(name) | PropKey::String(name) => {
            Expr::new(ExprKind::String(name.clone()), span)
        }
        PropKey::Number(n) => Expr::new(ExprKind::Number(*n), span),
        PropKey::Computed(e) => (**e).clone(),
    }
}

fn sequence(mut exprs: Vec<Expr>, span: Span) -> Expr {
    if exprs.len() == 1 {
        if let Some(only) = exprs.pop() {
            return only;
        }
    }
    Expr::new(ExprKind::Sequence(exprs), span)
}

fn const_stmt(id: Ident, value: Expr) -> Stmt {
    let span = id.span;
    Stmt::new(
        StmtKind::Var(VarDecl {
            kind: VarKind::Const,
            declarations: vec![VarDeclarator {
                target: Pattern::Ident(id),
                init: Some(value),
                span,
            }],
        }),
        span,
    )
}

fn let_stmt(id: Ident) -> Stmt {
    let span = id.span;
    Stmt::new(
        StmtKind::Var(VarDecl {
            kind: VarKind::Let,
            declarations: vec![VarDeclarator {
                target: Pattern::Ident(id),
                init: None,
                span,
            }],
        }),
        span,
    )
}

fn steps_to_stmts(steps: Vec<Step>) -> Vec<Stmt> {
    steps
        .into_iter()
        .map(|step| match step {
            Step::Temp(id, value) => const_stmt(id, value),
            Step::Expr(e) => {
                let span = e.span;
                Stmt::new(StmtKind::Expr(e), span)
            }
        })
        .collect()
}
