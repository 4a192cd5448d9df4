//! Diagnostics tests: every error kind, and recovery behavior

mod common;

use common::*;
use pretty_assertions::assert_eq;
use tarn_ast::{DeclGroup, Expr, Path, Stmt, TypeDecl, TypeExpr};
use tarn_ir::Opcode;
use tarn_sema::SemaErrorKind;

fn kinds(diagnostics: &[tarn_sema::Diagnostic]) -> Vec<SemaErrorKind> {
    diagnostics.iter().map(|d| d.kind()).collect()
}

#[test]
fn test_assignment_type_mismatch_suppresses_store() {
    // var x: integer; var y: real; x := y
    let prog = program(
        vec![
            DeclGroup::new(["x"], TypeExpr::named("integer")),
            DeclGroup::new(["y"], TypeExpr::named("real")),
        ],
        vec![],
        Stmt::assign(Expr::var("x"), Expr::var("y")),
    );
    let (analysis, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);
    // No store is emitted for the bad assignment.
    assert!(insns_with_opcode(analysis.main_function(), Opcode::St).is_empty());
    analysis.module.validate().unwrap();
}

#[test]
fn test_non_local_write_is_reported_but_lowered() {
    let prog = program(
        vec![DeclGroup::new(["g"], TypeExpr::named("integer"))],
        vec![procedure("q", vec![], Stmt::assign(Expr::var("g"), Expr::lit(1)))],
        Stmt::Call {
            callee: Path::ident("q"),
            args: vec![],
            span: None,
        },
    );
    let (analysis, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::NonLocalAssignment]);
    // Recovery still lowers the store through the display.
    let q = analysis.module.function_by_name("q").unwrap();
    assert_eq!(insns_with_opcode(q, Opcode::St).len(), 1);
}

#[test]
fn test_unknown_names() {
    let prog = program(vec![], vec![], Stmt::assign(Expr::var("x"), Expr::lit(1)));
    let (_, diagnostics) = check(&prog);
    assert!(kinds(&diagnostics).contains(&SemaErrorKind::UnknownName));

    let prog = program(
        vec![],
        vec![],
        Stmt::Call {
            callee: Path::ident("nope"),
            args: vec![],
            span: None,
        },
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::UnknownName]);
}

#[test]
fn test_duplicate_names() {
    let prog = program(
        vec![
            DeclGroup::new(["x"], TypeExpr::named("integer")),
            DeclGroup::new(["x"], TypeExpr::named("real")),
        ],
        vec![],
        Stmt::empty(),
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::DuplicateName]);

    // Same-scope subprogram names collide too.
    let prog = program(
        vec![],
        vec![
            procedure("q", vec![], Stmt::empty()),
            procedure("q", vec![], Stmt::empty()),
        ],
        Stmt::empty(),
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::DuplicateName]);
}

#[test]
fn test_bad_field_access() {
    // x.f where x is an integer
    let prog = program(
        vec![DeclGroup::new(["x"], TypeExpr::named("integer"))],
        vec![],
        Stmt::assign(Expr::Path(Path::dotted(["x", "f"])), Expr::lit(1)),
    );
    let (_, diagnostics) = check(&prog);
    assert!(kinds(&diagnostics).contains(&SemaErrorKind::BadFieldAccess));

    // r.nope where r is a record without that field
    let record = TypeDecl {
        name: "r".to_string(),
        ty: TypeExpr::Record(vec![DeclGroup::new(["a"], TypeExpr::named("integer"))]),
        span: None,
    };
    let prog = program_with_types(
        vec![record],
        vec![DeclGroup::new(["v"], TypeExpr::named("r"))],
        vec![],
        Stmt::assign(Expr::Path(Path::dotted(["v", "nope"])), Expr::lit(1)),
    );
    let (_, diagnostics) = check(&prog);
    assert!(kinds(&diagnostics).contains(&SemaErrorKind::BadFieldAccess));
}

#[test]
fn test_call_arity_and_argument_types() {
    let f = function(
        "f",
        vec![DeclGroup::new(["a"], TypeExpr::named("integer"))],
        TypeExpr::named("integer"),
        vec![],
        Stmt::assign(Expr::var("f"), Expr::var("a")),
    );
    let prog = program(
        vec![DeclGroup::new(["x"], TypeExpr::named("integer"))],
        vec![f.clone()],
        Stmt::assign(
            Expr::var("x"),
            Expr::Call {
                callee: Path::ident("f"),
                args: vec![],
                span: None,
            },
        ),
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::BadCall]);

    let prog = program(
        vec![
            DeclGroup::new(["x"], TypeExpr::named("integer")),
            DeclGroup::new(["b"], TypeExpr::named("boolean")),
        ],
        vec![f],
        Stmt::assign(
            Expr::var("x"),
            Expr::Call {
                callee: Path::ident("f"),
                args: vec![Expr::var("b")],
                span: None,
            },
        ),
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);
}

#[test]
fn test_unknown_import() {
    let mut prog = program(vec![], vec![], Stmt::empty());
    prog.imports = vec!["graphics".to_string()];
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::UnknownImport]);
}

#[test]
fn test_function_must_assign_its_return_slot() {
    let f = function(
        "f",
        vec![],
        TypeExpr::named("integer"),
        vec![],
        Stmt::empty(),
    );
    let prog = program(vec![], vec![f], Stmt::empty());
    let (analysis, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::UnassignedReturn]);
    // The function still gets a terminated body.
    analysis.module.validate().unwrap();
}

#[test]
fn test_read_rejects_non_lvalues() {
    let prog = program(
        vec![],
        vec![],
        Stmt::Call {
            callee: Path::ident("read"),
            args: vec![Expr::lit(3)],
            span: None,
        },
    );
    let (analysis, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::NotAnLvalue]);
    assert!(fcall_symbols(analysis.main_function()).is_empty());
}

#[test]
fn test_write_rejects_unprintable_types() {
    let record = TypeDecl {
        name: "r".to_string(),
        ty: TypeExpr::Record(vec![DeclGroup::new(["a"], TypeExpr::named("integer"))]),
        span: None,
    };
    let prog = program_with_types(
        vec![record],
        vec![DeclGroup::new(["v"], TypeExpr::named("r"))],
        vec![],
        Stmt::Call {
            callee: Path::ident("write"),
            args: vec![Expr::var("v")],
            span: None,
        },
    );
    let (analysis, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);
    assert!(fcall_symbols(analysis.main_function()).is_empty());
}

#[test]
fn test_condition_and_bound_types() {
    let prog = program(
        vec![DeclGroup::new(["x"], TypeExpr::named("integer"))],
        vec![],
        Stmt::If {
            cond: Expr::var("x"),
            then_branch: Box::new(Stmt::empty()),
            else_branch: None,
            span: None,
        },
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);

    let prog = program(
        vec![
            DeclGroup::new(["b"], TypeExpr::named("boolean")),
            DeclGroup::new(["x"], TypeExpr::named("integer")),
        ],
        vec![],
        Stmt::For {
            var: "i".to_string(),
            from: Expr::var("b"),
            to: Expr::lit(3),
            body: Box::new(Stmt::assign(Expr::var("x"), Expr::lit(1))),
            span: None,
        },
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);
}

#[test]
fn test_assignment_to_non_lvalue() {
    let prog = program(
        vec![],
        vec![procedure(
            "q",
            vec![],
            Stmt::assign(Expr::lit(1), Expr::lit(2)),
        )],
        Stmt::Call {
            callee: Path::ident("q"),
            args: vec![],
            span: None,
        },
    );
    let (_, diagnostics) = check(&prog);
    assert!(kinds(&diagnostics).contains(&SemaErrorKind::NotAnLvalue));
}

#[test]
fn test_binary_operand_mismatch() {
    let prog = program(
        vec![
            DeclGroup::new(["x"], TypeExpr::named("integer")),
            DeclGroup::new(["y"], TypeExpr::named("real")),
        ],
        vec![],
        Stmt::assign(
            Expr::var("x"),
            Expr::binary(tarn_ast::BinaryOp::Add, Expr::var("x"), Expr::var("y")),
        ),
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);
}

#[test]
fn test_relational_result_is_boolean() {
    // b := x < y is fine; x := x < y is not.
    let decls = vec![
        DeclGroup::new(["x", "y"], TypeExpr::named("integer")),
        DeclGroup::new(["b"], TypeExpr::named("boolean")),
    ];
    let prog = program(
        decls.clone(),
        vec![],
        Stmt::assign(
            Expr::var("b"),
            Expr::binary(tarn_ast::BinaryOp::Lt, Expr::var("x"), Expr::var("y")),
        ),
    );
    let (_, diagnostics) = check(&prog);
    assert!(diagnostics.is_empty());

    let prog = program(
        decls,
        vec![],
        Stmt::assign(
            Expr::var("x"),
            Expr::binary(tarn_ast::BinaryOp::Lt, Expr::var("x"), Expr::var("y")),
        ),
    );
    let (_, diagnostics) = check(&prog);
    assert_eq!(kinds(&diagnostics), vec![SemaErrorKind::TypeMismatch]);
}
