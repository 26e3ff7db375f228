//! Parser tests: statements, expressions, patterns, arrow detection,
//! automatic semicolon insertion and error reporting.

use jslab_parser::parse_source;
use jslab_types::ast::*;
use jslab_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse_ok(source: &str) -> Program {
    let sf = SourceFile::new("test.jsl", source);
    let result = parse_source(&sf);
    if result.errors.has_errors() {
        panic!("unexpected errors: {:?}", result.errors.errors);
    }
    result.program.expect("program")
}

fn first_error(source: &str) -> (ErrorCode, String) {
    let sf = SourceFile::new("test.jsl", source);
    let result = parse_source(&sf);
    assert!(result.program.is_none(), "expected a parse failure");
    let err = result.errors.first().expect("error").clone();
    (err.code, err.message)
}

fn single_expr(source: &str) -> Expr {
    let program = parse_ok(source);
    assert_eq!(program.body.len(), 1);
    match &program.body[0].kind {
        StmtKind::Expr(e) => e.clone(),
        other => panic!("expected expression statement, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_var_declaration_with_multiple_declarators() {
    let program = parse_ok("var a = 1, b = 2;");
    match &program.body[0].kind {
        StmtKind::Var(decl) => {
            assert_eq!(decl.kind, VarKind::Var);
            assert_eq!(decl.declarations.len(), 2);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_asi_splits_lines() {
    let program = parse_ok("let a = 1\nlet b = a\na + b");
    assert_eq!(program.body.len(), 3);
}

#[test]
fn test_asi_restricted_return() {
    let program = parse_ok("function f() {\n  return\n  1\n}");
    match &program.body[0].kind {
        StmtKind::Function(f) => match &f.body {
            FunctionBody::Block(body) => {
                assert!(matches!(body[0].kind, StmtKind::Return(None)));
                assert_eq!(body.len(), 2);
            }
            other => panic!("{other:?}"),
        },
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_postfix_increment_does_not_cross_newline() {
    let program = parse_ok("a\n++b");
    assert_eq!(program.body.len(), 2);
}

#[test]
fn test_for_of_with_destructuring_head() {
    let program = parse_ok("for (const [k, v] of pairs) { total += v }");
    match &program.body[0].kind {
        StmtKind::ForEach {
            kind: ForEachKind::Of,
            left: ForHead::Var(VarKind::Const, Pattern::Array { elems, .. }),
            ..
        } => assert_eq!(elems.len(), 2),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_for_in_with_member_head() {
    let program = parse_ok("for (o.key in source) {}");
    assert!(matches!(
        &program.body[0].kind,
        StmtKind::ForEach {
            kind: ForEachKind::In,
            left: ForHead::Pattern(Pattern::Expr(_)),
            ..
        }
    ));
}

#[test]
fn test_classic_for_with_in_inside_parens() {
    let program = parse_ok("for (var i = ('a' in o) ? 1 : 0; i < 3; i++) {}");
    assert!(matches!(&program.body[0].kind, StmtKind::For { .. }));
}

#[test]
fn test_class_declaration() {
    let program = parse_ok(
        "class B extends A {\n  constructor(x) { super(x); this.y = 1 }\n  static make() { return new B(1) }\n  get2() { return super.get() }\n}",
    );
    match &program.body[0].kind {
        StmtKind::Class(class) => {
            assert_eq!(class.name.as_ref().map(|n| n.name.as_str()), Some("B"));
            assert!(class.super_class.is_some());
            assert!(class.constructor.is_some());
            assert_eq!(class.methods.len(), 2);
            assert!(class.methods[0].is_static);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_import_forms() {
    let program = parse_ok(
        "import 'side'\nimport d from 'm'\nimport * as ns from 'm'\nimport e, { a, b as c, default as f } from 'm'",
    );
    let specs: Vec<usize> = program
        .body
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Import(decl) => decl.specifiers.len(),
            other => panic!("{other:?}"),
        })
        .collect();
    assert_eq!(specs, vec![0, 1, 1, 4]);
}

#[test]
fn test_switch_try_labels() {
    let program = parse_ok(
        "outer: for (;;) { switch (x) { case 1: break outer; default: continue } }\ntry { f() } catch { g() } finally { h() }",
    );
    assert!(matches!(&program.body[0].kind, StmtKind::Labeled { .. }));
    assert!(matches!(
        &program.body[1].kind,
        StmtKind::Try {
            handler: Some(CatchClause { param: None, .. }),
            finalizer: Some(_),
            ..
        }
    ));
}

// ─────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_binary_precedence() {
    let expr = single_expr("1 + 2 * 3");
    match expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        )),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_exponent_is_right_associative() {
    let expr = single_expr("2 ** 3 ** 2");
    match expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Exp,
            left,
            right,
        } => {
            assert!(matches!(left.kind, ExprKind::Number(n) if n == 2.0));
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Exp,
                    ..
                }
            ));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_arrow_functions() {
    for src in ["x => x + 1", "(a, b) => a + b", "async () => { await f() }", "({a}, [b]) => a"] {
        let expr = single_expr(src);
        match expr.kind {
            ExprKind::Function(f) => assert!(f.is_arrow, "{src}"),
            other => panic!("{src}: {other:?}"),
        }
    }
}

#[test]
fn test_parenthesised_expression_is_not_arrow() {
    let expr = single_expr("(a, b)");
    assert!(matches!(expr.kind, ExprKind::Sequence(_)));
}

#[test]
fn test_destructuring_assignment() {
    let expr = single_expr("[a, b = 2, ...rest] = list");
    match expr.kind {
        ExprKind::Assign { target, .. } => match *target {
            Pattern::Array { elems, rest, .. } => {
                assert_eq!(elems.len(), 2);
                assert!(matches!(elems[1], Some(Pattern::Default { .. })));
                assert!(rest.is_some());
            }
            other => panic!("{other:?}"),
        },
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_object_assignment_pattern_with_shorthand_default() {
    let expr = single_expr("({ a = 1, b: { c } } = o)");
    match expr.kind {
        ExprKind::Assign { target, .. } => match *target {
            Pattern::Object { props, .. } => {
                assert!(matches!(props[0].value, Pattern::Default { .. }));
                assert!(matches!(props[1].value, Pattern::Object { .. }));
            }
            other => panic!("{other:?}"),
        },
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_optional_chain_is_wrapped() {
    let expr = single_expr("a?.b.c()");
    match expr.kind {
        ExprKind::Chain(inner) => assert!(matches!(inner.kind, ExprKind::Call { .. })),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_new_with_member_callee() {
    let expr = single_expr("new ns.Thing(1).run()");
    match expr.kind {
        ExprKind::Call { callee, .. } => match callee.kind {
            ExprKind::Member { object, .. } => {
                assert!(matches!(object.kind, ExprKind::New { .. }))
            }
            other => panic!("{other:?}"),
        },
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_template_literal() {
    let expr = single_expr("`a${1 + 2}b${c}`");
    match expr.kind {
        ExprKind::Template { quasis, exprs } => {
            assert_eq!(quasis, vec!["a", "b", ""]);
            assert_eq!(exprs.len(), 2);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_dynamic_import_and_await() {
    let expr = single_expr("await import('m')");
    match expr.kind {
        ExprKind::Await(inner) => assert!(matches!(inner.kind, ExprKind::Import(_))),
        other => panic!("{other:?}"),
    }
}

#[test]
fn test_spans_are_one_based() {
    let program = parse_ok("x;\n  foo(1)");
    assert_eq!(program.body[1].span.start_line, 2);
    assert_eq!(program.body[1].span.start_col, 3);
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_missing_paren_reports_position() {
    let sf = SourceFile::new("test.jsl", "var a = 1;\nf(1;");
    let result = parse_source(&sf);
    let err = result.errors.first().expect("error");
    assert_eq!(err.span.start_line, 2);
    assert_eq!(err.code, ErrorCode::UNEXPECTED_TOKEN);
}

#[test]
fn test_invalid_assignment_target() {
    let (code, _) = first_error("1 = 2");
    assert_eq!(code, ErrorCode::INVALID_ASSIGNMENT_TARGET);
}

#[test]
fn test_return_outside_function() {
    let (_, message) = first_error("return 1");
    assert_eq!(message, "'return' outside of function");
}

#[test]
fn test_const_requires_initializer() {
    let (_, message) = first_error("const x;");
    assert_eq!(message, "missing initializer in declaration");
}

#[test]
fn test_unsupported_syntax_is_reported() {
    let (code, _) = first_error("export const a = 1");
    assert_eq!(code, ErrorCode::UNSUPPORTED_SYNTAX);
}

#[test]
fn test_unclosed_block() {
    let (code, _) = first_error("function f() {");
    assert_eq!(code, ErrorCode::UNCLOSED_DELIMITER);
}
