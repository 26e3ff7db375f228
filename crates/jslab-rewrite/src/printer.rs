//! AST → source text, recording a source-map entry at the start of every
//! statement and expression that carries an original span.
//!
//! Output is deterministic: two-space indentation, one statement per line,
//! and non-block bodies of control statements wrapped in braces. Parentheses
//! are inserted from operator precedence alone, so the printed text always
//! re-parses to an equivalent tree.

use jslab_types::ast::*;
use jslab_types::{Position, Span};
use std::fmt::Write as _;

use crate::source_map::SourceMap;

const INDENT: &str = "  ";

/// Binding power of each expression form; a child printed at a position
/// requiring a higher level is parenthesised.
mod prec {
    pub const SEQUENCE: u8 = 0;
    pub const ASSIGN: u8 = 1;
    pub const CONDITIONAL: u8 = 2;
    pub const UNARY: u8 = 15;
    pub const POSTFIX: u8 = 16;
    pub const CHAIN: u8 = 17;
    pub const CALL: u8 = 18;
    pub const PRIMARY: u8 = 19;
}

/// Print `program` on its own, mapping back to `source_name`.
pub fn print_program(program: &Program, source_name: &str) -> (String, SourceMap) {
    let mut printer = Printer::new(SourceMap::new("", source_name));
    printer.program(program);
    printer.finish()
}

pub struct Printer {
    out: String,
    line: u32,
    col: u32,
    indent: usize,
    map: SourceMap,
    /// Columns on original line 1 are shifted left by this much before
    /// being recorded (undoes the object-literal wrap).
    line_one_shift: u32,
    /// Set while printing a `for(;;)` init clause, where a bare `in` would
    /// be read as a for-in loop.
    no_in: bool,
}

impl Printer {
    pub fn new(map: SourceMap) -> Self {
        Self {
            out: String::new(),
            line: 1,
            col: 1,
            indent: 0,
            map,
            line_one_shift: 0,
            no_in: false,
        }
    }

    pub fn with_line_one_shift(mut self, shift: u32) -> Self {
        self.line_one_shift = shift;
        self
    }

    pub fn finish(self) -> (String, SourceMap) {
        (self.out, self.map)
    }

    // ── Output ────────────────────────────────────────────────────────────────

    fn write(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.write("\n");
        for _ in 0..self.indent {
            self.write(INDENT);
        }
    }

    fn original(&self, span: Span) -> Position {
        let mut original = span.start();
        if original.line == 1 && self.line_one_shift > 0 {
            original.column = original.column.saturating_sub(self.line_one_shift).max(1);
        }
        original
    }

    fn mark(&mut self, span: Span) {
        let original = self.original(span);
        self.map
            .add_mapping(Position::new(self.line, self.col), original);
    }

    /// Like `mark`, also recording the identifier printed here. Nodes the
    /// rewriter synthesizes carry the span of a whole declaration and stay
    /// unnamed.
    fn mark_named(&mut self, span: Span, name: &str) {
        let width = span.end_col.saturating_sub(span.start_col) as usize;
        if span.start_line != span.end_line || width != name.chars().count() {
            self.mark(span);
            return;
        }
        let original = self.original(span);
        self.map
            .add_named_mapping(Position::new(self.line, self.col), original, name);
    }

    // ── Statements ────────────────────────────────────────────────────────────

    pub fn program(&mut self, program: &Program) {
        for (i, stmt) in program.body.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.stmt(stmt);
        }
        self.write("\n");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.mark(stmt.span);
        match &stmt.kind {
            StmtKind::Var(decl) => {
                self.var_decl(decl);
                self.write(";");
            }
            StmtKind::Function(f) => self.function(f),
            StmtKind::Class(c) => self.class(c),
            StmtKind::Import(decl) => self.import(decl),
            StmtKind::Expr(e) => {
                if leftmost_is_ambiguous(e) {
                    self.paren_expr(e);
                } else {
                    self.expr(e, prec::SEQUENCE);
                }
                self.write(";");
            }
            StmtKind::Block(body) => self.block(body),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.write("if (");
                self.expr(test, prec::SEQUENCE);
                self.write(") ");
                self.body(consequent);
                if let Some(alt) = alternate {
                    self.write(" else ");
                    if matches!(alt.kind, StmtKind::If { .. }) {
                        self.stmt(alt);
                    } else {
                        self.body(alt);
                    }
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.write("for (");
                let saved = std::mem::replace(&mut self.no_in, true);
                match init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(e)) => self.expr(e, prec::SEQUENCE),
                    None => {}
                }
                self.no_in = saved;
                self.write(";");
                if let Some(test) = test {
                    self.write(" ");
                    self.expr(test, prec::SEQUENCE);
                }
                self.write(";");
                if let Some(update) = update {
                    self.write(" ");
                    self.expr(update, prec::SEQUENCE);
                }
                self.write(") ");
                self.body(body);
            }
            StmtKind::ForEach {
                kind,
                left,
                right,
                body,
            } => {
                self.write("for (");
                match left {
                    ForHead::Var(var_kind, target) => {
                        self.write(var_kind.as_str());
                        self.write(" ");
                        self.pattern(target);
                    }
                    ForHead::Pattern(target) => self.pattern(target),
                }
                match kind {
                    ForEachKind::In => {
                        self.write(" in ");
                        self.expr(right, prec::SEQUENCE);
                    }
                    ForEachKind::Of => {
                        self.write(" of ");
                        self.expr(right, prec::ASSIGN);
                    }
                }
                self.write(") ");
                self.body(body);
            }
            StmtKind::While { test, body } => {
                self.write("while (");
                self.expr(test, prec::SEQUENCE);
                self.write(") ");
                self.body(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.write("do ");
                self.body(body);
                self.write(" while (");
                self.expr(test, prec::SEQUENCE);
                self.write(");");
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.write("switch (");
                self.expr(discriminant, prec::SEQUENCE);
                self.write(") {");
                self.indent += 1;
                for case in cases {
                    self.newline();
                    self.mark(case.span);
                    match &case.test {
                        Some(test) => {
                            self.write("case ");
                            self.expr(test, prec::SEQUENCE);
                            self.write(":");
                        }
                        None => self.write("default:"),
                    }
                    self.indent += 1;
                    for s in &case.body {
                        self.newline();
                        self.stmt(s);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.newline();
                self.write("}");
            }
            StmtKind::Break(label) | StmtKind::Continue(label) => {
                let word = if matches!(stmt.kind, StmtKind::Break(_)) {
                    "break"
                } else {
                    "continue"
                };
                self.write(word);
                if let Some(label) = label {
                    self.write(" ");
                    self.write(&label.name);
                }
                self.write(";");
            }
            StmtKind::Return(arg) => {
                self.write("return");
                if let Some(arg) = arg {
                    self.write(" ");
                    self.expr(arg, prec::SEQUENCE);
                }
                self.write(";");
            }
            StmtKind::Throw(arg) => {
                self.write("throw ");
                self.expr(arg, prec::SEQUENCE);
                self.write(";");
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.write("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.write(" catch ");
                    if let Some(param) = &handler.param {
                        self.write("(");
                        self.pattern(param);
                        self.write(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.write(" finally ");
                    self.block(finalizer);
                }
            }
            StmtKind::Labeled { label, body } => {
                self.write(&label.name);
                self.write(": ");
                self.stmt(body);
            }
            StmtKind::Empty => self.write(";"),
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.write("{}");
            return;
        }
        let saved = std::mem::replace(&mut self.no_in, false);
        self.write("{");
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
        self.no_in = saved;
    }

    /// Body of a control statement, always braced.
    fn body(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(body) => {
                self.mark(stmt.span);
                self.block(body);
            }
            _ => self.block(std::slice::from_ref(stmt)),
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.write(decl.kind.as_str());
        self.write(" ");
        for (i, d) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.pattern(&d.target);
            if let Some(init) = &d.init {
                self.write(" = ");
                self.expr(init, prec::ASSIGN);
            }
        }
    }

    fn import(&mut self, decl: &ImportDecl) {
        self.write("import ");
        if !decl.specifiers.is_empty() {
            let mut named = Vec::new();
            let mut first = true;
            for spec in &decl.specifiers {
                match spec {
                    ImportSpecifier::Default(id) => {
                        self.write(&id.name);
                        first = false;
                    }
                    ImportSpecifier::Namespace(id) => {
                        if !first {
                            self.write(", ");
                        }
                        self.write("* as ");
                        self.write(&id.name);
                        first = false;
                    }
                    ImportSpecifier::Named { imported, local } => named.push((imported, local)),
                }
            }
            if !named.is_empty() {
                if !first {
                    self.write(", ");
                }
                self.write("{ ");
                for (i, (imported, local)) in named.into_iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write(&imported.name);
                    if imported.name != local.name {
                        self.write(" as ");
                        self.write(&local.name);
                    }
                }
                self.write(" }");
            }
            self.write(" from ");
        }
        self.write(&quote(&decl.source));
        self.write(";");
    }

    // ── Functions & Classes ───────────────────────────────────────────────────

    fn function(&mut self, f: &Function) {
        if f.is_async {
            self.write("async ");
        }
        if f.is_arrow {
            self.params(f);
            self.write(" => ");
            match &f.body {
                FunctionBody::Block(body) => self.block(body),
                FunctionBody::Expr(e) => {
                    if leftmost_is_ambiguous(e) {
                        self.paren_expr(e);
                    } else {
                        self.expr(e, prec::ASSIGN);
                    }
                }
            }
            return;
        }
        self.write("function");
        if let Some(name) = &f.name {
            self.write(" ");
            self.mark(name.span);
            self.write(&name.name);
        }
        self.params(f);
        self.write(" ");
        self.function_body(&f.body);
    }

    fn function_body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Block(stmts) => self.block(stmts),
            FunctionBody::Expr(e) => {
                // Only arrows have concise bodies; print as a block anyway.
                self.write("{ return ");
                self.expr(e, prec::SEQUENCE);
                self.write("; }");
            }
        }
    }

    fn params(&mut self, f: &Function) {
        self.write("(");
        for (i, p) in f.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.pattern(p);
        }
        if let Some(rest) = &f.rest {
            if !f.params.is_empty() {
                self.write(", ");
            }
            self.write("...");
            self.pattern(rest);
        }
        self.write(")");
    }

    fn method(&mut self, key: &PropKey, f: &Function, is_static: bool) {
        if is_static {
            self.write("static ");
        }
        if f.is_async {
            self.write("async ");
        }
        self.prop_key(key);
        self.params(f);
        self.write(" ");
        self.function_body(&f.body);
    }

    fn class(&mut self, c: &Class) {
        self.write("class");
        if let Some(name) = &c.name {
            self.write(" ");
            self.mark(name.span);
            self.write(&name.name);
        }
        if let Some(sup) = &c.super_class {
            self.write(" extends ");
            if is_simple_reference(sup) {
                self.expr(sup, prec::CALL);
            } else {
                self.paren_expr(sup);
            }
        }
        if c.constructor.is_none() && c.methods.is_empty() {
            self.write(" {}");
            return;
        }
        self.write(" {");
        self.indent += 1;
        if let Some(ctor) = &c.constructor {
            self.newline();
            self.mark(ctor.span);
            self.method(&PropKey::Ident("constructor".into()), ctor, false);
        }
        for m in &c.methods {
            self.newline();
            self.mark(m.span);
            self.method(&m.key, &m.value, m.is_static);
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Print `e`, parenthesised when it binds looser than `min`.
    fn expr(&mut self, e: &Expr, min: u8) {
        let bare_in = self.no_in
            && matches!(
                e.kind,
                ExprKind::Binary {
                    op: BinaryOp::In,
                    ..
                }
            );
        if expr_prec(e) < min || bare_in {
            self.paren_expr(e);
        } else {
            self.expr_inner(e);
        }
    }

    fn paren_expr(&mut self, e: &Expr) {
        let saved = std::mem::replace(&mut self.no_in, false);
        self.write("(");
        self.expr_inner(e);
        self.write(")");
        self.no_in = saved;
    }

    fn expr_inner(&mut self, e: &Expr) {
        self.mark(e.span);
        match &e.kind {
            ExprKind::Number(n) => self.write(&format_number(*n)),
            ExprKind::String(s) => self.write(&quote(s)),
            ExprKind::Template { quasis, exprs } => {
                self.write("`");
                for (i, q) in quasis.iter().enumerate() {
                    self.write(&escape_template(q));
                    if let Some(x) = exprs.get(i) {
                        self.write("${");
                        self.expr(x, prec::SEQUENCE);
                        self.write("}");
                    }
                }
                self.write("`");
            }
            ExprKind::Bool(b) => self.write(if *b { "true" } else { "false" }),
            ExprKind::Null => self.write("null"),
            ExprKind::Array(items) => {
                self.write("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if let Some(el) = item {
                        self.element(el);
                    }
                }
                if matches!(items.last(), Some(None)) {
                    self.write(",");
                }
                self.write("]");
            }
            ExprKind::Object(props) => {
                if props.is_empty() {
                    self.write("{}");
                    return;
                }
                self.write("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    match prop {
                        ObjectProp::KeyValue(key, value) => {
                            self.prop_key(key);
                            self.write(": ");
                            self.expr(value, prec::ASSIGN);
                        }
                        ObjectProp::Shorthand(id) => {
                            self.mark(id.span);
                            self.write(&id.name);
                        }
                        ObjectProp::Method(key, f) => self.method(key, f, false),
                        ObjectProp::Spread(e) => {
                            self.write("...");
                            self.expr(e, prec::ASSIGN);
                        }
                    }
                }
                self.write(" }");
            }
            ExprKind::Function(f) => self.function(f),
            ExprKind::Class(c) => self.class(c),
            ExprKind::Ident(name) => {
                self.mark_named(e.span, name);
                self.write(name);
            }
            ExprKind::This => self.write("this"),
            ExprKind::SuperMember(prop) => {
                self.write("super");
                self.member_prop(prop, false);
            }
            ExprKind::SuperCall(args) => {
                self.write("super");
                self.arguments(args);
            }
            ExprKind::Unary { op, arg } => {
                self.write(op.as_str());
                match op {
                    UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete => self.write(" "),
                    UnaryOp::Neg | UnaryOp::Plus
                        if matches!(
                            arg.kind,
                            ExprKind::Unary {
                                op: UnaryOp::Neg | UnaryOp::Plus,
                                ..
                            } | ExprKind::Update { prefix: true, .. }
                        ) =>
                    {
                        self.write(" ")
                    }
                    _ => {}
                }
                self.expr(arg, prec::UNARY);
            }
            ExprKind::Update { op, prefix, arg } => {
                if *prefix {
                    self.write(op.as_str());
                    self.expr(arg, prec::UNARY);
                } else {
                    self.expr(arg, prec::CALL);
                    self.write(op.as_str());
                }
            }
            ExprKind::Binary { op, left, right } => {
                let p = op.precedence();
                if *op == BinaryOp::Exp {
                    self.expr(left, prec::POSTFIX);
                    self.write(" ** ");
                    self.expr(right, p);
                } else {
                    self.expr(left, p);
                    self.write(" ");
                    self.write(op.as_str());
                    self.write(" ");
                    self.expr(right, p + 1);
                }
            }
            ExprKind::Logical { op, left, right } => {
                let p = op.precedence();
                self.logical_operand(left, *op, p);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.logical_operand(right, *op, p + 1);
            }
            ExprKind::Assign { op, target, value } => {
                self.pattern(target);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.expr(value, prec::ASSIGN);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test, prec::CONDITIONAL + 1);
                self.write(" ? ");
                self.expr(consequent, prec::ASSIGN);
                self.write(" : ");
                self.expr(alternate, prec::ASSIGN);
            }
            ExprKind::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expr(item, prec::ASSIGN);
                }
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                if matches!(object.kind, ExprKind::Number(_)) {
                    self.paren_expr(object);
                } else {
                    self.expr(object, prec::CALL);
                }
                self.member_prop(property, *optional);
            }
            ExprKind::Call {
                callee,
                args,
                optional,
            } => {
                self.expr(callee, prec::CALL);
                if *optional {
                    self.write("?.");
                }
                self.arguments(args);
            }
            ExprKind::New { callee, args } => {
                self.write("new ");
                if contains_call(callee) {
                    self.paren_expr(callee);
                } else {
                    self.expr(callee, prec::CALL);
                }
                self.arguments(args);
            }
            ExprKind::Chain(inner) => self.expr_inner(inner),
            ExprKind::Await(arg) => {
                self.write("await ");
                self.expr(arg, prec::UNARY);
            }
            ExprKind::Import(arg) => {
                // Dynamic import goes through the host module cache.
                self.write("jsl.import(");
                self.expr(arg, prec::ASSIGN);
                self.write(")");
            }
        }
    }

    fn logical_operand(&mut self, e: &Expr, op: LogicalOp, min: u8) {
        // `??` cannot be mixed with `&&`/`||` without parentheses.
        let mixed = matches!(
            &e.kind,
            ExprKind::Logical { op: inner, .. }
                if (*inner == LogicalOp::Nullish) != (op == LogicalOp::Nullish)
        );
        if mixed {
            self.paren_expr(e);
        } else {
            self.expr(e, min);
        }
    }

    fn member_prop(&mut self, prop: &MemberProp, optional: bool) {
        match prop {
            MemberProp::Ident(id) => {
                self.write(if optional { "?." } else { "." });
                self.mark_named(id.span, &id.name);
                self.write(&id.name);
            }
            MemberProp::Computed(e) => {
                self.write(if optional { "?.[" } else { "[" });
                self.expr(e, prec::SEQUENCE);
                self.write("]");
            }
        }
    }

    fn arguments(&mut self, args: &[Element]) {
        self.write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.element(arg);
        }
        self.write(")");
    }

    fn element(&mut self, el: &Element) {
        match el {
            Element::Expr(e) => self.expr(e, prec::ASSIGN),
            Element::Spread(e) => {
                self.write("...");
                self.expr(e, prec::ASSIGN);
            }
        }
    }

    fn prop_key(&mut self, key: &PropKey) {
        match key {
            PropKey::Ident(name) => self.write(name),
            PropKey::String(s) => self.write(&quote(s)),
            PropKey::Number(n) => self.write(&format_number(*n)),
            PropKey::Computed(e) => {
                self.write("[");
                self.expr(e, prec::ASSIGN);
                self.write("]");
            }
        }
    }

    // ── Patterns ──────────────────────────────────────────────────────────────

    fn pattern(&mut self, p: &Pattern) {
        match p {
            Pattern::Ident(id) => {
                self.mark_named(id.span, &id.name);
                self.write(&id.name);
            }
            Pattern::Object { props, rest, span } => {
                self.mark(*span);
                if props.is_empty() && rest.is_none() {
                    self.write("{}");
                    return;
                }
                self.write("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.pattern_prop(prop);
                }
                if let Some(rest) = rest {
                    if !props.is_empty() {
                        self.write(", ");
                    }
                    self.write("...");
                    self.pattern(rest);
                }
                self.write(" }");
            }
            Pattern::Array { elems, rest, span } => {
                self.mark(*span);
                self.write("[");
                for (i, el) in elems.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if let Some(el) = el {
                        self.pattern(el);
                    }
                }
                match rest {
                    Some(rest) => {
                        if !elems.is_empty() {
                            self.write(", ");
                        }
                        self.write("...");
                        self.pattern(rest);
                    }
                    None if matches!(elems.last(), Some(None)) => self.write(","),
                    None => {}
                }
                self.write("]");
            }
            Pattern::Default {
                target, default, ..
            } => {
                self.pattern(target);
                self.write(" = ");
                self.expr(default, prec::ASSIGN);
            }
            Pattern::Expr(e) => self.expr(e, prec::CALL),
        }
    }

    fn pattern_prop(&mut self, prop: &PatternProp) {
        if let PropKey::Ident(key) = &prop.key {
            match &prop.value {
                Pattern::Ident(id) if &id.name == key => {
                    self.pattern(&prop.value);
                    return;
                }
                Pattern::Default { target, .. }
                    if matches!(target.as_ref(), Pattern::Ident(id) if &id.name == key) =>
                {
                    self.pattern(&prop.value);
                    return;
                }
                _ => {}
            }
        }
        self.prop_key(&prop.key);
        self.write(": ");
        self.pattern(&prop.value);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn expr_prec(e: &Expr) -> u8 {
    match &e.kind {
        ExprKind::Sequence(_) => prec::SEQUENCE,
        ExprKind::Assign { .. } => prec::ASSIGN,
        ExprKind::Function(f) if f.is_arrow => prec::ASSIGN,
        ExprKind::Conditional { .. } => prec::CONDITIONAL,
        ExprKind::Logical { op, .. } => op.precedence(),
        ExprKind::Binary { op, .. } => op.precedence(),
        ExprKind::Unary { .. } | ExprKind::Await(_) => prec::UNARY,
        ExprKind::Update { prefix: true, .. } => prec::UNARY,
        ExprKind::Update { prefix: false, .. } => prec::POSTFIX,
        ExprKind::Chain(_) => prec::CHAIN,
        ExprKind::Member { .. }
        | ExprKind::Call { .. }
        | ExprKind::New { .. }
        | ExprKind::SuperMember(_)
        | ExprKind::SuperCall(_)
        | ExprKind::Import(_) => prec::CALL,
        _ => prec::PRIMARY,
    }
}

/// True when printing `e` at the start of a statement (or a concise arrow
/// body) would begin with `{`, `function` or `class`.
fn leftmost_is_ambiguous(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Object(_) | ExprKind::Class(_) => true,
        ExprKind::Function(f) => !f.is_arrow,
        ExprKind::Assign { target, .. } => match target.as_ref() {
            Pattern::Object { .. } => true,
            Pattern::Expr(inner) => leftmost_is_ambiguous(inner),
            _ => false,
        },
        ExprKind::Binary { left, .. } | ExprKind::Logical { left, .. } => {
            leftmost_is_ambiguous(left)
        }
        ExprKind::Conditional { test, .. } => leftmost_is_ambiguous(test),
        ExprKind::Sequence(items) => items.first().is_some_and(leftmost_is_ambiguous),
        ExprKind::Member { object, .. } => leftmost_is_ambiguous(object),
        ExprKind::Call { callee, .. } => leftmost_is_ambiguous(callee),
        ExprKind::Update {
            prefix: false, arg, ..
        } => leftmost_is_ambiguous(arg),
        ExprKind::Chain(inner) => leftmost_is_ambiguous(inner),
        _ => false,
    }
}

/// `new f().x` would call `f` before constructing; such callees need
/// parentheses.
fn contains_call(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Call { .. } | ExprKind::Chain(_) => true,
        ExprKind::Member { object, .. } => contains_call(object),
        _ => false,
    }
}

/// Identifier or dotted member path, the forms accepted after `extends`.
fn is_simple_reference(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Ident(_) => true,
        ExprKind::Member {
            object,
            property: MemberProp::Ident(_),
            optional: false,
        } => is_simple_reference(object),
        _ => false,
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.into()
    } else {
        format!("{n}")
    }
}

/// Double-quoted string literal with escapes.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || c == '\u{2028}' || c == '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn escape_template(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}
