//! Semantic analysis for the Tarn compiler
//!
//! One pass over a parsed program resolves names against a scope stack,
//! checks types against the registry, and lowers statements and
//! expressions into per-function control-flow graphs, including the
//! display bookkeeping that lets nested subprograms reach enclosing
//! locals.

pub mod builtins;
pub mod errors;
pub mod symtab;
pub mod target;
pub mod types;

mod analyzer;

use tarn_ast::Program;
use tarn_ir::{FuncId, Function, Module};

pub use builtins::Magic;
pub use errors::{CollectingSink, Diagnostic, DiagnosticSink, SemaError, SemaErrorKind, Severity};
pub use symtab::{ScopeKind, SymbolTable, Var, VarId};
pub use target::Target;
pub use types::{ResolvedType, TypeId, TypeTable};

/// Everything analysis produces: the populated symbol table, the compiled
/// module, the synthetic main, and the final display width.
#[derive(Debug)]
pub struct Analysis {
    pub symbols: SymbolTable,
    pub module: Module,
    pub main: FuncId,
    /// One slot per captured variable, in capture order.
    pub display_slots: u32,
}

impl Analysis {
    pub fn main_function(&self) -> &Function {
        self.module.func(self.main)
    }
}

/// Analyze a program, collecting diagnostics.
///
/// Errors are accumulated rather than thrown, so a single pass reports as
/// much as it can; callers that got any error-severity diagnostics will
/// usually discard the IR.
pub fn analyze(program: &Program, target: Target) -> (Analysis, Vec<Diagnostic>) {
    let mut sink = CollectingSink::new();
    let analysis = analyzer::run(program, target, &mut sink);
    (analysis, sink.diagnostics)
}

/// Analyze a program, reporting diagnostics to an injected sink.
pub fn analyze_with_sink(
    program: &Program,
    target: Target,
    sink: &mut dyn DiagnosticSink,
) -> Analysis {
    analyzer::run(program, target, sink)
}
