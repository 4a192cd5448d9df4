//! The analysis pass: one recursive descent over the AST that resolves
//! names, checks types, and lowers to IR at the same time
//!
//! Statement lowering owns the emission cursor; expression lowering only
//! appends to whatever block is current. Subprogram analysis saves and
//! restores the cursor and the current-function marker around recursion.

use log::{debug, trace};

use tarn_ast::{
    BinaryOp, DeclGroup, Expr, Path, Program, Span, Stmt, Subprogram, SubprogramKind, TypeDecl,
    UnaryOp,
};
use tarn_ir::{BlockId, Cursor, InsnId, Module, Opcode, Operand};

use crate::builtins::{self, Magic};
use crate::errors::{Diagnostic, DiagnosticSink, SemaError};
use crate::symtab::{ScopeKind, SymbolTable};
use crate::target::Target;
use crate::types::{self, ResolvedType, TypeId};
use crate::Analysis;

/// A typed expression result. `ir` is the instruction computing the value
/// (an address, for lvalue forms), or `None` when lowering already failed
/// and reported a diagnostic.
#[derive(Debug, Clone, Copy)]
struct ExprValue {
    ty: TypeId,
    ir: Option<InsnId>,
}

impl ExprValue {
    fn poisoned() -> Self {
        Self {
            ty: types::VOID_TYPE,
            ir: None,
        }
    }
}

/// The root variable a target expression writes through.
fn assign_root(e: &Expr) -> Option<&str> {
    match e {
        Expr::Path(p) => Some(p.head()),
        Expr::Index { path, .. } | Expr::Deref { path, .. } => Some(path.head()),
        _ => None,
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::And => Opcode::And,
        BinaryOp::Or => Opcode::Or,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Ge => Opcode::Ge,
    }
}

struct Analyzer<'a> {
    symbols: SymbolTable,
    module: Module,
    cursor: Cursor,
    /// Type entry of the subprogram being lowered; `None` in the program
    /// body, where assignment targets are unrestricted.
    current_func: Option<TypeId>,
    /// Next free display slot. Monotonic; offsets are never reused.
    disp_slots: u32,
    target: Target,
    sink: &'a mut dyn DiagnosticSink,
}

/// Run analysis over a whole program.
pub(crate) fn run(program: &Program, target: Target, sink: &mut dyn DiagnosticSink) -> Analysis {
    let mut symbols = SymbolTable::new();
    let mut module = Module::new();

    symbols.enter(ScopeKind::Subprogram);
    symbols.bind_builtin_types();
    let main = module.add_function("main");
    let cursor = Cursor::at_entry(&module, main);

    let mut cx = Analyzer {
        symbols,
        module,
        cursor,
        current_func: None,
        disp_slots: 0,
        target,
        sink,
    };

    cx.imports(&program.imports);
    for decl in &program.types {
        cx.declare_type(decl);
    }
    cx.finish_type_decls();
    for group in &program.decls {
        cx.declare_vars(group, true);
    }

    for sub in &program.subprogs {
        let func = cx.module.add_function(&sub.name);
        match cx.symbols.add_func(&sub.name, &sub.head, func) {
            Ok(_) => cx.subprogram(sub),
            Err(e) => cx.report(e, sub.span),
        }
    }

    // Global cells and the display slots of captured globals belong to the
    // synthetic main's entry block.
    cx.emit_scope_allocs();
    cx.emit_display_prelude();
    cx.stmt(&program.body);
    cx.emit(Opcode::Ret, vec![]);

    cx.symbols.leave();

    Analysis {
        symbols: cx.symbols,
        module: cx.module,
        main,
        display_slots: cx.disp_slots,
    }
}

impl<'a> Analyzer<'a> {
    // ---- plumbing --------------------------------------------------------

    fn report(&mut self, error: SemaError, span: Option<Span>) {
        self.sink.report(Diagnostic::error(error, span));
    }

    fn emit(&mut self, op: Opcode, operands: Vec<Operand>) -> InsnId {
        self.cursor.emit(&mut self.module, op, operands)
    }

    fn new_block(&mut self) -> BlockId {
        self.cursor.new_block(&mut self.module)
    }

    fn move_to(&mut self, block: BlockId) {
        trace!("current block -> {}", block);
        self.cursor.move_to(block);
    }

    fn patch(&mut self, insn: InsnId, index: usize, target: BlockId) {
        self.cursor.patch(&mut self.module, insn, index, target);
    }

    fn size_of(&self, ty: TypeId) -> i64 {
        self.symbols.types.size_of(ty) as i64
    }

    fn render(&self, ty: TypeId) -> String {
        self.symbols.types.render(ty)
    }

    // ---- declarations ----------------------------------------------------

    fn imports(&mut self, imports: &[String]) {
        for name in imports {
            match name.as_str() {
                "input" => {
                    self.symbols.add_magic_func(Magic::Read);
                    self.symbols.add_magic_func(Magic::Readln);
                }
                "output" => {
                    self.symbols.add_magic_func(Magic::Write);
                    self.symbols.add_magic_func(Magic::Writeln);
                }
                _ => self.report(SemaError::UnknownImport { name: name.clone() }, None),
            }
        }
    }

    fn declare_type(&mut self, decl: &TypeDecl) {
        if let Err(e) = self.symbols.add_type(&decl.name, &decl.ty) {
            self.report(e, decl.span);
        }
    }

    fn finish_type_decls(&mut self) {
        for e in self.symbols.finish_type_decls() {
            self.report(e, None);
        }
    }

    fn declare_vars(&mut self, group: &DeclGroup, address_taken: bool) {
        let (_, errors) = self.symbols.add_decls(group, address_taken);
        for e in errors {
            self.report(e, group.span);
        }
    }

    /// Give every variable of the current scope its stack cell, in
    /// declaration order, in the current (entry) block.
    fn emit_scope_allocs(&mut self) {
        for vid in self.symbols.top_scope_vars() {
            let size = self.size_of(self.symbols.var(vid).ty);
            let loc = self.emit(Opcode::Alloc, vec![Operand::Int(size)]);
            self.symbols.var_mut(vid).loc = Some(loc);
        }
    }

    /// Install every captured variable of the current scope into the
    /// display: save the old slot into a fresh cell, then store the
    /// variable's address over it.
    fn emit_display_prelude(&mut self) {
        let align = self.target.pointer_align as i64;
        let psize = self.target.pointer_size as i64;
        let mut display = None;
        for vid in self.symbols.top_scope_vars() {
            let var = self.symbols.var(vid);
            if !var.captured {
                continue;
            }
            let (Some(offset), Some(loc)) = (var.disp_offset, var.loc) else {
                continue;
            };
            trace!("display slot {} <- `{}`", offset, var.name);
            let display = *display.get_or_insert_with(|| {
                self.cursor.emit(
                    &mut self.module,
                    Opcode::SymRef,
                    vec![Operand::sym(builtins::DISPLAY_SYMBOL)],
                )
            });
            let slot = self.emit(
                Opcode::Add,
                vec![Operand::Reg(display), Operand::Int(offset as i64 * align)],
            );
            let save = self.emit(Opcode::Alloc, vec![Operand::Int(psize)]);
            let old = self.emit(Opcode::Ld, vec![Operand::Reg(slot), Operand::Int(psize)]);
            self.emit(
                Opcode::St,
                vec![Operand::Reg(save), Operand::Reg(old), Operand::Int(psize)],
            );
            self.emit(
                Opcode::St,
                vec![Operand::Reg(slot), Operand::Reg(loc), Operand::Int(psize)],
            );
        }
    }

    // ---- subprograms -----------------------------------------------------

    fn subprogram(&mut self, sub: &Subprogram) {
        debug!("analyzing subprogram `{}`", sub.name);
        let Some(fty) = self.symbols.resolve_func(&sub.name) else {
            self.report(
                SemaError::InternalInvariant {
                    message: format!("subprogram `{}` analyzed before binding", sub.name),
                },
                sub.span,
            );
            return;
        };
        let Some(func) = self.symbols.types.function(fty).and_then(|f| f.func) else {
            self.report(
                SemaError::InternalInvariant {
                    message: format!("subprogram `{}` has no compiled function", sub.name),
                },
                sub.span,
            );
            return;
        };

        let parent_depth = self.module.func(self.cursor.func).nest_depth;
        self.module.func_mut(func).nest_depth = parent_depth + 1;

        let saved_cursor = self.cursor;
        let saved_func = self.current_func.replace(fty);
        self.cursor = Cursor::at_entry(&self.module, func);
        self.symbols.enter(ScopeKind::Subprogram);

        for decl in &sub.types {
            self.declare_type(decl);
        }
        self.finish_type_decls();
        for group in &sub.head.params {
            self.declare_vars(group, false);
        }
        for group in &sub.decls {
            self.declare_vars(group, true);
        }

        // The return slot carries the subprogram's own name; assigning to
        // it writes the returned value.
        let ret = self
            .symbols
            .types
            .function(fty)
            .map(|f| f.ret)
            .unwrap_or(types::VOID_TYPE);
        if let Err(e) = self.symbols.add_var(&sub.name, ret, sub.span, true) {
            self.report(e, sub.span);
        }

        self.emit_scope_allocs();

        // Bind every nested subprogram before analyzing any, so sibling
        // and mutual references resolve.
        let mut bound = Vec::with_capacity(sub.subprogs.len());
        for nested in &sub.subprogs {
            let nested_func = self.module.add_function(&nested.name);
            match self.symbols.add_func(&nested.name, &nested.head, nested_func) {
                Ok(_) => bound.push(true),
                Err(e) => {
                    self.report(e, nested.span);
                    bound.push(false);
                }
            }
        }
        for (nested, ok) in sub.subprogs.iter().zip(bound) {
            if ok {
                self.subprogram(nested);
            }
        }

        // Captured flags are final once the nested bodies are lowered.
        self.emit_display_prelude();

        self.stmt(&sub.body);

        let kind = self
            .symbols
            .types
            .function(fty)
            .map(|f| (f.kind, f.ret_assigned));
        if let Some((SubprogramKind::Function, ret_assigned)) = kind {
            if !ret_assigned {
                self.report(
                    SemaError::UnassignedReturn {
                        name: sub.name.clone(),
                    },
                    sub.span,
                );
            }
            let slot = self
                .symbols
                .resolve_var(&sub.name)
                .and_then(|v| self.symbols.var(v).loc);
            if let Some(loc) = slot {
                let size = self.size_of(ret);
                let value = self.emit(Opcode::Ld, vec![Operand::Reg(loc), Operand::Int(size)]);
                self.emit(Opcode::Ret, vec![Operand::Reg(value)]);
            } else {
                self.emit(Opcode::Ret, vec![]);
            }
        } else {
            self.emit(Opcode::Ret, vec![]);
        }

        self.symbols.leave();
        self.cursor = saved_cursor;
        self.current_func = saved_func;
    }

    // ---- statements ------------------------------------------------------

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Assign {
                target,
                value,
                span,
            } => self.assign(target, value, *span),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => self.ite(cond, then_branch, else_branch.as_deref(), *span),
            Stmt::While { cond, body, span } => self.while_loop(cond, body, *span),
            Stmt::For {
                var,
                from,
                to,
                body,
                span,
            } => self.for_loop(var, from, to, body, *span),
            Stmt::Compound(stmts) => {
                for s in stmts {
                    self.stmt(s);
                }
            }
            Stmt::Call { callee, args, span } => {
                self.call(callee, args, *span);
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, span: Option<Span>) {
        let lhs = self.expr(target);
        let target_ok = self.check_assignability(target, span);
        let rhs = self.expr(value);
        if !self.symbols.types_eq(lhs.ty, rhs.ty) {
            let error = SemaError::TypeMismatch {
                expected: self.render(lhs.ty),
                found: self.render(rhs.ty),
            };
            self.report(error, span);
            return;
        }
        if !target_ok {
            return;
        }
        if let (Some(addr), Some(val)) = (lhs.ir, rhs.ir) {
            let size = self.size_of(rhs.ty);
            self.emit(
                Opcode::St,
                vec![Operand::Reg(addr), Operand::Reg(val), Operand::Int(size)],
            );
        }
    }

    /// Enforce the target restriction for assignments inside subprograms:
    /// the root must be local, or the subprogram's own name (the return
    /// slot). A non-local write is reported but still lowered.
    fn check_assignability(&mut self, target: &Expr, span: Option<Span>) -> bool {
        let Some(root) = assign_root(target) else {
            self.report(SemaError::NotAnLvalue, span);
            return false;
        };
        let Some(fty) = self.current_func else {
            return true;
        };
        if !self.symbols.has_local_var(root) {
            self.report(
                SemaError::NonLocalAssignment {
                    name: root.to_string(),
                },
                span,
            );
        }
        if self.symbols.types.name(fty) == root {
            if let Some(f) = self.symbols.types.function_mut(fty) {
                f.ret_assigned = true;
            }
        }
        true
    }

    fn condition(&mut self, cond: &Expr, span: Option<Span>) -> Operand {
        let c = self.expr(cond);
        if c.ty != types::BOOLEAN_TYPE {
            let error = SemaError::TypeMismatch {
                expected: "boolean".to_string(),
                found: self.render(c.ty),
            };
            self.report(error, span);
        }
        c.ir.map(Operand::Reg).unwrap_or(Operand::TRUE)
    }

    fn ite(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>, span: Option<Span>) {
        let cond_op = self.condition(cond, span);
        let branch = self.emit(Opcode::Br, vec![cond_op, Operand::Pending, Operand::Pending]);

        let then_block = self.new_block();
        self.move_to(then_block);
        self.stmt(then_branch);
        let then_exit = self.emit(Opcode::Br, vec![Operand::TRUE, Operand::Pending]);

        match else_branch {
            Some(els) => {
                let else_block = self.new_block();
                self.move_to(else_block);
                self.stmt(els);
                let else_exit = self.emit(Opcode::Br, vec![Operand::TRUE, Operand::Pending]);

                let join = self.new_block();
                self.patch(branch, 1, then_block);
                self.patch(branch, 2, else_block);
                self.patch(then_exit, 1, join);
                self.patch(else_exit, 1, join);
                self.move_to(join);
            }
            None => {
                let join = self.new_block();
                self.patch(branch, 1, then_block);
                self.patch(branch, 2, join);
                self.patch(then_exit, 1, join);
                self.move_to(join);
            }
        }
    }

    fn while_loop(&mut self, cond: &Expr, body: &Stmt, span: Option<Span>) {
        let head = self.new_block();
        self.emit(Opcode::Br, vec![Operand::TRUE, Operand::Label(head)]);
        self.move_to(head);

        let cond_op = self.condition(cond, span);
        let branch = self.emit(Opcode::Br, vec![cond_op, Operand::Pending, Operand::Pending]);

        let body_block = self.new_block();
        self.move_to(body_block);
        self.stmt(body);
        self.emit(Opcode::Br, vec![Operand::TRUE, Operand::Label(head)]);

        let exit = self.new_block();
        self.patch(branch, 1, body_block);
        self.patch(branch, 2, exit);
        self.move_to(exit);
    }

    fn for_loop(&mut self, var: &str, from: &Expr, to: &Expr, body: &Stmt, span: Option<Span>) {
        let start = self.expr(from);
        let end = self.expr(to);
        for bound in [&start, &end] {
            if bound.ty != types::INTEGER_TYPE {
                let error = SemaError::TypeMismatch {
                    expected: "integer".to_string(),
                    found: self.render(bound.ty),
                };
                self.report(error, span);
            }
        }

        // The induction variable lives in its own scope for the duration
        // of the loop.
        self.symbols.enter(ScopeKind::Block);
        let int_size = self.size_of(types::INTEGER_TYPE);
        let cell = self.emit(Opcode::Alloc, vec![Operand::Int(int_size)]);
        if let Ok(vid) = self.symbols.add_var(var, types::INTEGER_TYPE, span, true) {
            self.symbols.var_mut(vid).loc = Some(cell);
        }
        if let Some(init) = start.ir {
            self.emit(
                Opcode::St,
                vec![Operand::Reg(cell), Operand::Reg(init), Operand::Int(int_size)],
            );
        }
        let enter_loop = self.emit(Opcode::Br, vec![Operand::TRUE, Operand::Pending]);

        let head = self.new_block();
        self.move_to(head);
        let current = self.emit(Opcode::Ld, vec![Operand::Reg(cell), Operand::Int(int_size)]);
        let limit = end.ir.map(Operand::Reg).unwrap_or(Operand::Int(0));
        let cond = self.emit(Opcode::Lt, vec![Operand::Reg(current), limit]);
        let branch = self.emit(
            Opcode::Br,
            vec![Operand::Reg(cond), Operand::Pending, Operand::Pending],
        );

        let body_block = self.new_block();
        self.move_to(body_block);
        self.stmt(body);
        let next = self.emit(Opcode::Add, vec![Operand::Reg(current), Operand::Int(1)]);
        self.emit(
            Opcode::St,
            vec![Operand::Reg(cell), Operand::Reg(next), Operand::Int(int_size)],
        );
        self.emit(Opcode::Br, vec![Operand::TRUE, Operand::Label(head)]);

        let exit = self.new_block();
        self.patch(enter_loop, 1, head);
        self.patch(branch, 1, body_block);
        self.patch(branch, 2, exit);
        self.move_to(exit);

        self.symbols.leave();
    }

    // ---- expressions -----------------------------------------------------

    fn expr(&mut self, e: &Expr) -> ExprValue {
        match e {
            Expr::Path(path) => self.path(path),
            Expr::Literal { value, .. } => ExprValue {
                ty: types::INTEGER_TYPE,
                ir: Some(self.emit(Opcode::Lit, vec![Operand::Int(*value)])),
            },
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => self.binary(*op, left, right, *span),
            Expr::Unary { op, operand, span } => self.unary(*op, operand, *span),
            Expr::Index { path, index, span } => self.index(path, index, *span),
            Expr::Deref { path, span } => self.deref(path, *span),
            Expr::AddrOf { operand, .. } => {
                let value = self.expr(operand);
                ExprValue {
                    ty: self.symbols.intern_pointer_to(value.ty),
                    ir: value.ir,
                }
            }
            Expr::Call { callee, args, span } => self.call(callee, args, *span),
        }
    }

    /// Resolve a path to `(type, address)`. Non-local heads are reached
    /// through the display; each field component advances the address by
    /// its byte offset.
    fn path(&mut self, path: &Path) -> ExprValue {
        let head = path.head();
        let Some(vid) = self.symbols.resolve_var(head) else {
            self.report(
                SemaError::UnknownName {
                    name: head.to_string(),
                },
                path.span,
            );
            return ExprValue::poisoned();
        };

        let mut addr;
        if !self.symbols.has_local_var(head) {
            let offset = {
                let var = self.symbols.var_mut(vid);
                if !var.captured {
                    var.captured = true;
                    var.disp_offset = Some(self.disp_slots);
                    self.disp_slots += 1;
                    trace!("captured `{}` at display slot {}", var.name, self.disp_slots - 1);
                }
                var.disp_offset.unwrap_or(0)
            };
            let align = self.target.pointer_align as i64;
            let psize = self.target.pointer_size as i64;
            let display = self.emit(
                Opcode::SymRef,
                vec![Operand::sym(builtins::DISPLAY_SYMBOL)],
            );
            let slot = self.emit(
                Opcode::Add,
                vec![Operand::Reg(display), Operand::Int(offset as i64 * align)],
            );
            addr = Some(self.emit(Opcode::Ld, vec![Operand::Reg(slot), Operand::Int(psize)]));
        } else {
            addr = self.symbols.var(vid).loc;
        }

        let mut ty = self.symbols.var(vid).ty;
        for field in &path.segments[1..] {
            if !matches!(self.symbols.types.ty(ty), ResolvedType::Record(_)) {
                let error = SemaError::FieldOfNonRecord {
                    field: field.clone(),
                    ty: self.render(ty),
                };
                self.report(error, path.span);
                return ExprValue::poisoned();
            }
            match self.symbols.types.field_offset(ty, field) {
                Some((field_ty, offset)) => {
                    if let Some(base) = addr {
                        addr = Some(self.emit(
                            Opcode::Add,
                            vec![Operand::Reg(base), Operand::Int(offset as i64)],
                        ));
                    }
                    ty = field_ty;
                }
                None => {
                    let error = SemaError::UnknownField {
                        field: field.clone(),
                        ty: self.render(ty),
                    };
                    self.report(error, path.span);
                    return ExprValue::poisoned();
                }
            }
        }

        ExprValue { ty, ir: addr }
    }

    fn deref(&mut self, path: &Path, span: Option<Span>) -> ExprValue {
        let base = self.path(path);
        let pointee = match self.symbols.types.ty(base.ty) {
            ResolvedType::Pointer(p) => Some(*p),
            _ => None,
        };
        let Some(pointee) = pointee else {
            let error = SemaError::TypeMismatch {
                expected: "a pointer type".to_string(),
                found: self.render(base.ty),
            };
            self.report(error, span);
            return ExprValue::poisoned();
        };
        let size = self.size_of(pointee);
        let ir = base
            .ir
            .map(|addr| self.emit(Opcode::Ld, vec![Operand::Reg(addr), Operand::Int(size)]));
        ExprValue { ty: pointee, ir }
    }

    fn index(&mut self, path: &Path, index: &Expr, span: Option<Span>) -> ExprValue {
        let base = self.path(path);
        let elem = match self.symbols.types.ty(base.ty) {
            ResolvedType::Array { elem, .. } => Some(*elem),
            _ => None,
        };
        if elem.is_none() {
            let error = SemaError::TypeMismatch {
                expected: "an array type".to_string(),
                found: self.render(base.ty),
            };
            self.report(error, span);
        }

        let idx = self.expr(index);
        if idx.ty != types::INTEGER_TYPE {
            let error = SemaError::TypeMismatch {
                expected: "integer".to_string(),
                found: self.render(idx.ty),
            };
            self.report(error, index.span().or(span));
        }

        let Some(elem) = elem else {
            return ExprValue::poisoned();
        };
        let size = self.size_of(elem);
        let ir = match (base.ir, idx.ir) {
            (Some(base), Some(idx)) => {
                let scaled = self.emit(Opcode::Mul, vec![Operand::Reg(idx), Operand::Int(size)]);
                Some(self.emit(Opcode::Add, vec![Operand::Reg(base), Operand::Reg(scaled)]))
            }
            _ => None,
        };
        ExprValue { ty: elem, ir }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Option<Span>) -> ExprValue {
        let lhs = self.expr(left);
        let rhs = self.expr(right);
        if !self.symbols.types_eq(lhs.ty, rhs.ty) {
            let error = SemaError::TypeMismatch {
                expected: self.render(lhs.ty),
                found: self.render(rhs.ty),
            };
            self.report(error, span);
        }
        let ty = if op.is_relational() {
            types::BOOLEAN_TYPE
        } else {
            lhs.ty
        };
        let ir = match (lhs.ir, rhs.ir) {
            (Some(a), Some(b)) => {
                Some(self.emit(binary_opcode(op), vec![Operand::Reg(a), Operand::Reg(b)]))
            }
            _ => None,
        };
        ExprValue { ty, ir }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr, span: Option<Span>) -> ExprValue {
        let value = self.expr(operand);
        match op {
            UnaryOp::Plus | UnaryOp::Minus => {
                if value.ty != types::INTEGER_TYPE && value.ty != types::REAL_TYPE {
                    let error = SemaError::TypeMismatch {
                        expected: "a numeric type".to_string(),
                        found: self.render(value.ty),
                    };
                    self.report(error, span);
                }
            }
            UnaryOp::Not => {
                if value.ty != types::BOOLEAN_TYPE {
                    let error = SemaError::TypeMismatch {
                        expected: "boolean".to_string(),
                        found: self.render(value.ty),
                    };
                    self.report(error, span);
                }
            }
        }
        match op {
            UnaryOp::Plus => value,
            UnaryOp::Minus => {
                let ir = value.ir.map(|v| {
                    let zero = self.emit(Opcode::Lit, vec![Operand::Int(0)]);
                    self.emit(Opcode::Sub, vec![Operand::Reg(zero), Operand::Reg(v)])
                });
                ExprValue { ty: value.ty, ir }
            }
            UnaryOp::Not => {
                let ir = value
                    .ir
                    .map(|v| self.emit(Opcode::Not, vec![Operand::Reg(v)]));
                ExprValue { ty: value.ty, ir }
            }
        }
    }

    // ---- calls -----------------------------------------------------------

    fn call(&mut self, callee: &Path, args: &[Expr], span: Option<Span>) -> ExprValue {
        if callee.segments.len() != 1 {
            self.report(
                SemaError::NotCallable {
                    name: callee.to_string(),
                },
                span,
            );
            return ExprValue::poisoned();
        }
        let name = callee.head();
        let Some(fty) = self.symbols.resolve_func(name) else {
            self.report(
                SemaError::UnknownName {
                    name: name.to_string(),
                },
                span,
            );
            return ExprValue::poisoned();
        };
        let Some(signature) = self.symbols.types.function(fty).cloned() else {
            self.report(
                SemaError::NotCallable {
                    name: name.to_string(),
                },
                span,
            );
            return ExprValue::poisoned();
        };

        if let Some(magic) = signature.magic {
            self.builtin_call(magic, args, span);
            return ExprValue {
                ty: types::VOID_TYPE,
                ir: None,
            };
        }

        if args.len() != signature.params.len() {
            self.report(
                SemaError::ArityMismatch {
                    name: name.to_string(),
                    expected: signature.params.len(),
                    found: args.len(),
                },
                span,
            );
        }

        let mut ir_args = Vec::new();
        for (arg, &param) in args.iter().zip(&signature.params) {
            let value = self.expr(arg);
            let expected = self.symbols.var(param).ty;
            if !self.symbols.types_eq(value.ty, expected) {
                let error = SemaError::TypeMismatch {
                    expected: self.render(expected),
                    found: self.render(value.ty),
                };
                self.report(error, arg.span().or(span));
            }
            if let Some(ir) = value.ir {
                ir_args.push(Operand::Reg(ir));
            }
        }
        // Surplus arguments still get analyzed for their own diagnostics.
        for arg in args.iter().skip(signature.params.len()) {
            self.expr(arg);
        }

        let callee_name = match signature.func {
            Some(f) => self.module.func(f).name.clone(),
            None => name.to_string(),
        };
        let call = self.emit(
            Opcode::Call,
            vec![Operand::Sym(callee_name), Operand::Args(ir_args)],
        );
        ExprValue {
            ty: signature.ret,
            ir: Some(call),
        }
    }

    /// Lower a built-in I/O call. Write routines are selected by argument
    /// type; read routines additionally require lvalue-form arguments to
    /// have an address to read into.
    fn builtin_call(&mut self, magic: Magic, args: &[Expr], _span: Option<Span>) {
        match magic {
            Magic::Write | Magic::Writeln => {
                for arg in args {
                    let value = self.expr(arg);
                    match builtins::write_symbol(value.ty) {
                        Some(symbol) => {
                            if let Some(ir) = value.ir {
                                self.emit(
                                    Opcode::FCall,
                                    vec![Operand::sym(symbol), Operand::Args(vec![Operand::Reg(ir)])],
                                );
                            }
                        }
                        None => {
                            let error = SemaError::UnsupportedBuiltinArg {
                                builtin: magic.name().to_string(),
                                ty: self.render(value.ty),
                            };
                            self.report(error, arg.span());
                        }
                    }
                }
                if magic == Magic::Writeln {
                    self.emit(
                        Opcode::FCall,
                        vec![Operand::sym(builtins::WRITE_NEWLINE_SYMBOL)],
                    );
                }
            }
            Magic::Read | Magic::Readln => {
                for arg in args {
                    if !arg.is_lvalue_form() {
                        self.report(SemaError::NotAnLvalue, arg.span());
                        continue;
                    }
                    let value = self.expr(arg);
                    match builtins::read_symbol(value.ty) {
                        Some(symbol) => {
                            if let Some(ir) = value.ir {
                                self.emit(
                                    Opcode::FCall,
                                    vec![Operand::sym(symbol), Operand::Args(vec![Operand::Reg(ir)])],
                                );
                            }
                        }
                        None => {
                            let error = SemaError::UnsupportedBuiltinArg {
                                builtin: magic.name().to_string(),
                                ty: self.render(value.ty),
                            };
                            self.report(error, arg.span());
                        }
                    }
                }
            }
        }
    }
}
