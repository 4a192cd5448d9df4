//! Shared helpers: program construction and lowered-IR inspection

use tarn_ast::{
    DeclGroup, Program, Stmt, Subprogram, SubprogramHead, SubprogramKind, TypeDecl, TypeExpr,
};
use tarn_ir::{Function, InsnId, Instruction, Opcode, Operand};
use tarn_sema::{analyze, Analysis, Diagnostic, Target};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn program(decls: Vec<DeclGroup>, subprogs: Vec<Subprogram>, body: Stmt) -> Program {
    program_with_types(Vec::new(), decls, subprogs, body)
}

pub fn program_with_types(
    types: Vec<TypeDecl>,
    decls: Vec<DeclGroup>,
    subprogs: Vec<Subprogram>,
    body: Stmt,
) -> Program {
    Program {
        name: "p".to_string(),
        imports: vec!["input".to_string(), "output".to_string()],
        types,
        decls,
        subprogs,
        body,
    }
}

pub fn procedure(name: &str, decls: Vec<DeclGroup>, body: Stmt) -> Subprogram {
    Subprogram {
        name: name.to_string(),
        head: SubprogramHead {
            kind: SubprogramKind::Procedure,
            params: Vec::new(),
            ret: None,
        },
        types: Vec::new(),
        decls,
        subprogs: Vec::new(),
        body,
        span: None,
    }
}

pub fn function(
    name: &str,
    params: Vec<DeclGroup>,
    ret: TypeExpr,
    decls: Vec<DeclGroup>,
    body: Stmt,
) -> Subprogram {
    Subprogram {
        name: name.to_string(),
        head: SubprogramHead {
            kind: SubprogramKind::Function,
            params,
            ret: Some(ret),
        },
        types: Vec::new(),
        decls,
        subprogs: Vec::new(),
        body,
        span: None,
    }
}

/// Analyze and hand back whatever came out, without judging it.
pub fn check(program: &Program) -> (Analysis, Vec<Diagnostic>) {
    init_logs();
    analyze(program, Target::default())
}

/// Analyze a program expected to be clean, and validate every CFG.
pub fn check_ok(program: &Program) -> Analysis {
    let (analysis, diagnostics) = check(program);
    assert!(
        diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        diagnostics
    );
    analysis
        .module
        .validate()
        .expect("lowered module must have a well-formed CFG");
    analysis
}

/// All instructions of a function with the given opcode, in block order.
pub fn insns_with_opcode(func: &Function, op: Opcode) -> Vec<(InsnId, Instruction)> {
    let mut found = Vec::new();
    for block in &func.blocks {
        for &id in &block.insns {
            if func.insn(id).op == op {
                found.push((id, func.insn(id).clone()));
            }
        }
    }
    found
}

/// The symbol targets of every `fcall`, in emission order.
pub fn fcall_symbols(func: &Function) -> Vec<String> {
    insns_with_opcode(func, Opcode::FCall)
        .into_iter()
        .filter_map(|(_, insn)| match insn.operands.first() {
            Some(Operand::Sym(s)) => Some(s.clone()),
            _ => None,
        })
        .collect()
}
