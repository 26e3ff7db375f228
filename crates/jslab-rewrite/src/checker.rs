//! Static validation of declaration sites.
//!
//! Walks the whole tree, including nested function bodies, and rejects any
//! binding or assignment of a protected name. Also enforces two structural
//! rules the rewriter relies on: imports only at the top level, and no
//! user bindings in the rewriter's temporary namespace.

use std::collections::HashSet;

use jslab_types::ast::*;
use jslab_types::{ErrorCode, JslabError, SourceFile, Span};

use crate::error::{DeclKind, RewriteError};

/// Prefix of identifiers the rewriter introduces.
pub const RESERVED_PREFIX: &str = "__jsl_";

pub struct Checker<'a> {
    forbidden: &'a HashSet<String>,
    source: &'a SourceFile,
    line_one_shift: u32,
}

/// Validate `program` against the forbidden-name set.
pub fn check_program(
    program: &Program,
    forbidden: &HashSet<String>,
    source: &SourceFile,
    line_one_shift: u32,
) -> Result<(), RewriteError> {
    let checker = Checker {
        forbidden,
        source,
        line_one_shift,
    };
    program
        .body
        .iter()
        .try_for_each(|stmt| checker.stmt(stmt, 0))
}

impl<'a> Checker<'a> {
    fn diagnostic(&self, code: ErrorCode, message: String, span: Span) -> JslabError {
        let span = span.unshift_line(1, self.line_one_shift);
        let line = self.source.line(span.start_line).unwrap_or_default();
        JslabError::new(self.source.name.clone(), code, message, span, line)
    }

    fn name(&self, id: &Ident, kind: DeclKind) -> Result<(), RewriteError> {
        let (code, message) = if self.forbidden.contains(&id.name) {
            (
                ErrorCode::FORBIDDEN_NAME,
                format!(
                    "'{}' is a reserved name and cannot be used as {}",
                    id.name,
                    kind.describe()
                ),
            )
        } else if id.name.starts_with(RESERVED_PREFIX) {
            (
                ErrorCode::RESERVED_PREFIX,
                format!(
                    "'{}' uses the reserved prefix '{RESERVED_PREFIX}' and cannot be used as {}",
                    id.name,
                    kind.describe()
                ),
            )
        } else {
            return Ok(());
        };
        Err(RewriteError::Forbidden {
            name: id.name.clone(),
            kind,
            error: self.diagnostic(code, message, id.span),
        })
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn stmt(&self, stmt: &Stmt, depth: usize) -> Result<(), RewriteError> {
        match &stmt.kind {
            StmtKind::Var(decl) => self.var_decl(decl),
            StmtKind::Function(f) => {
                if let Some(name) = &f.name {
                    self.name(name, DeclKind::Function)?;
                }
                self.function(f)
            }
            StmtKind::Class(c) => {
                if let Some(name) = &c.name {
                    self.name(name, DeclKind::Class)?;
                }
                self.class(c)
            }
            StmtKind::Import(decl) => {
                if depth > 0 {
                    let error = self.diagnostic(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "import declarations may only appear at the top level".into(),
                        stmt.span,
                    );
                    return Err(RewriteError::Syntax(error));
                }
                decl.specifiers
                    .iter()
                    .try_for_each(|s| self.name(s.local(), DeclKind::Import))
            }
            StmtKind::Expr(e) | StmtKind::Throw(e) => self.expr(e),
            StmtKind::Return(e) => e.as_ref().map_or(Ok(()), |e| self.expr(e)),
            StmtKind::Block(body) => self.stmts(body, depth + 1),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test)?;
                self.stmt(consequent, depth + 1)?;
                match alternate {
                    Some(alt) => self.stmt(alt, depth + 1),
                    None => Ok(()),
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl)?,
                    Some(ForInit::Expr(e)) => self.expr(e)?,
                    None => {}
                }
                for e in test.iter().chain(update.iter()) {
                    self.expr(e)?;
                }
                self.stmt(body, depth + 1)
            }
            StmtKind::ForEach {
                left, right, body, ..
            } => {
                match left {
                    ForHead::Var(_, target) => self.pattern(target, DeclKind::Variable)?,
                    ForHead::Pattern(target) => self.pattern(target, DeclKind::Assignment)?,
                }
                self.expr(right)?;
                self.stmt(body, depth + 1)
            }
            StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
                self.expr(test)?;
                self.stmt(body, depth + 1)
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.expr(discriminant)?;
                for case in cases {
                    if let Some(test) = &case.test {
                        self.expr(test)?;
                    }
                    self.stmts(&case.body, depth + 1)?;
                }
                Ok(())
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.stmts(block, depth + 1)?;
                if let Some(handler) = handler {
                    if let Some(param) = &handler.param {
                        self.pattern_defaults(param)?;
                    }
                    self.stmts(&handler.body, depth + 1)?;
                }
                match finalizer {
                    Some(body) => self.stmts(body, depth + 1),
                    None => Ok(()),
                }
            }
            StmtKind::Labeled { body, .. } => self.stmt(body, depth),
            StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Empty => Ok(()),
        }
    }

    fn stmts(&self, body: &[Stmt], depth: usize) -> Result<(), RewriteError> {
        body.iter().try_for_each(|s| self.stmt(s, depth))
    }

    fn var_decl(&self, decl: &VarDecl) -> Result<(), RewriteError> {
        for d in &decl.declarations {
            self.pattern(&d.target, DeclKind::Variable)?;
            if let Some(init) = &d.init {
                self.expr(init)?;
            }
        }
        Ok(())
    }

    fn function(&self, f: &Function) -> Result<(), RewriteError> {
        for p in f.params.iter().chain(f.rest.iter()) {
            self.pattern_defaults(p)?;
        }
        match &f.body {
            // Function bodies are never top level.
            FunctionBody::Block(body) => self.stmts(body, 1),
            FunctionBody::Expr(e) => self.expr(e),
        }
    }

    fn class(&self, c: &Class) -> Result<(), RewriteError> {
        if let Some(sup) = &c.super_class {
            self.expr(sup)?;
        }
        if let Some(ctor) = &c.constructor {
            self.function(ctor)?;
        }
        for m in &c.methods {
            if let PropKey::Computed(key) = &m.key {
                self.expr(key)?;
            }
            self.function(&m.value)?;
        }
        Ok(())
    }

    // ── Patterns ──────────────────────────────────────────────────────────────

    fn pattern(&self, p: &Pattern, kind: DeclKind) -> Result<(), RewriteError> {
        match p {
            Pattern::Ident(id) => self.name(id, kind),
            Pattern::Object { props, rest, .. } => {
                for prop in props {
                    if let PropKey::Computed(key) = &prop.key {
                        self.expr(key)?;
                    }
                    self.pattern(&prop.value, kind)?;
                }
                match rest {
                    Some(rest) => self.pattern(rest, kind),
                    None => Ok(()),
                }
            }
            Pattern::Array { elems, rest, .. } => {
                for el in elems.iter().flatten() {
                    self.pattern(el, kind)?;
                }
                match rest {
                    Some(rest) => self.pattern(rest, kind),
                    None => Ok(()),
                }
            }
            Pattern::Default {
                target, default, ..
            } => {
                self.pattern(target, kind)?;
                self.expr(default)
            }
            Pattern::Expr(e) => self.expr(e),
        }
    }

    /// Parameters and catch bindings are local; only their default
    /// expressions are inspected.
    fn pattern_defaults(&self, p: &Pattern) -> Result<(), RewriteError> {
        match p {
            Pattern::Ident(_) => Ok(()),
            Pattern::Object { props, rest, .. } => {
                for prop in props {
                    self.pattern_defaults(&prop.value)?;
                }
                rest.as_deref().map_or(Ok(()), |r| self.pattern_defaults(r))
            }
            Pattern::Array { elems, rest, .. } => {
                for el in elems.iter().flatten() {
                    self.pattern_defaults(el)?;
                }
                rest.as_deref().map_or(Ok(()), |r| self.pattern_defaults(r))
            }
            Pattern::Default {
                target, default, ..
            } => {
                self.pattern_defaults(target)?;
                self.expr(default)
            }
            Pattern::Expr(e) => self.expr(e),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn expr(&self, e: &Expr) -> Result<(), RewriteError> {
        match &e.kind {
            ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Ident(_)
            | ExprKind::This => Ok(()),
            ExprKind::Template { exprs, .. } => exprs.iter().try_for_each(|x| self.expr(x)),
            ExprKind::Sequence(items) => items.iter().try_for_each(|x| self.expr(x)),
            ExprKind::Array(items) => items.iter().flatten().try_for_each(|el| self.element(el)),
            ExprKind::Object(props) => props.iter().try_for_each(|prop| match prop {
                ObjectProp::KeyValue(key, value) => {
                    self.key(key)?;
                    self.expr(value)
                }
                ObjectProp::Shorthand(_) => Ok(()),
                ObjectProp::Method(key, f) => {
                    self.key(key)?;
                    self.function(f)
                }
                ObjectProp::Spread(e) => self.expr(e),
            }),
            ExprKind::Function(f) => self.function(f),
            ExprKind::Class(c) => self.class(c),
            ExprKind::SuperMember(prop) => self.member_prop(prop),
            ExprKind::SuperCall(args) => args.iter().try_for_each(|a| self.element(a)),
            ExprKind::Unary { arg, .. }
            | ExprKind::Update { arg, .. }
            | ExprKind::Await(arg)
            | ExprKind::Import(arg)
            | ExprKind::Chain(arg) => self.expr(arg),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Assign { target, value, .. } => {
                self.pattern(target, DeclKind::Assignment)?;
                self.expr(value)
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test)?;
                self.expr(consequent)?;
                self.expr(alternate)
            }
            ExprKind::Member {
                object, property, ..
            } => {
                self.expr(object)?;
                self.member_prop(property)
            }
            ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                self.expr(callee)?;
                args.iter().try_for_each(|a| self.element(a))
            }
        }
    }

    fn element(&self, el: &Element) -> Result<(), RewriteError> {
        match el {
            Element::Expr(e) | Element::Spread(e) => self.expr(e),
        }
    }

    fn member_prop(&self, prop: &MemberProp) -> Result<(), RewriteError> {
        match prop {
            MemberProp::Ident(_) => Ok(()),
            MemberProp::Computed(e) => self.expr(e),
        }
    }

    fn key(&self, key: &PropKey) -> Result<(), RewriteError> {
        match key {
            PropKey::Computed(e) => self.expr(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jslab_parser::parse_source;

    fn check(source: &str) -> Result<(), RewriteError> {
        let sf = SourceFile::new("console", source);
        let program = parse_source(&sf).program.expect("parse");
        let forbidden: HashSet<String> = ["config", "jsl"].iter().map(|s| s.to_string()).collect();
        check_program(&program, &forbidden, &sf, 0)
    }

    fn rejected(source: &str) -> (String, DeclKind) {
        match check(source) {
            Err(RewriteError::Forbidden { name, kind, .. }) => (name, kind),
            other => panic!("expected a forbidden-name error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_ordinary_code() {
        assert!(check("var a = 1; function f(config) { return config }").is_ok());
        assert!(check("x.config = 2; ({ config: 1 })").is_ok());
    }

    #[test]
    fn rejects_every_declaration_kind() {
        assert_eq!(rejected("var config = 1").1, DeclKind::Variable);
        assert_eq!(rejected("function jsl() {}").1, DeclKind::Function);
        assert_eq!(rejected("class config {}").1, DeclKind::Class);
        assert_eq!(rejected("import config from 'm'").1, DeclKind::Import);
        assert_eq!(rejected("config = 5").1, DeclKind::Assignment);
    }

    #[test]
    fn rejects_nested_destructuring_and_inner_scopes() {
        assert_eq!(rejected("let { a: [config] } = o").0, "config");
        assert_eq!(rejected("function f() { let jsl = 1 }").0, "jsl");
        assert_eq!(rejected("for (const config of xs) {}").1, DeclKind::Variable);
    }

    #[test]
    fn reports_position_of_the_identifier() {
        match check("let a = 1;\nvar config = 2") {
            Err(e) => {
                let d = e.diagnostic();
                assert_eq!((d.span.start_line, d.span.start_col), (2, 5));
                assert_eq!(d.code, ErrorCode::FORBIDDEN_NAME);
                assert_eq!(
                    d.message,
                    "'config' is a reserved name and cannot be used as a variable name"
                );
            }
            Ok(()) => panic!("expected rejection"),
        }
    }

    #[test]
    fn rejects_reserved_prefix() {
        match check("var __jsl_tmp0 = 1") {
            Err(e) => assert_eq!(e.diagnostic().code, ErrorCode::RESERVED_PREFIX),
            Ok(()) => panic!("expected rejection"),
        }
    }

    #[test]
    fn rejects_nested_import() {
        assert!(matches!(
            check("if (a) { import x from 'm' }"),
            Err(RewriteError::Syntax(_))
        ));
    }
}
