//! Scoped symbol table: variable, function, and type bindings
//!
//! Scopes form a strict stack. Lookup walks innermost to outermost;
//! insertion always targets the top scope, and a name may shadow the same
//! name further out. The table also owns the type registry and the
//! variable arena, so interning syntactic types can consult the chain.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use tarn_ast::{DeclGroup, Span, SubprogramHead, TypeExpr};
use tarn_ir::{FuncId, InsnId};

use crate::builtins::Magic;
use crate::errors::SemaError;
use crate::types::{Field, FunctionType, ResolvedType, TypeId, TypeTable, VOID_TYPE};

/// Index of a variable in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

/// A declared variable (including formals and return slots).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    pub ty: TypeId,
    pub defn: Option<Span>,
    /// Whether the variable needs an addressable cell.
    pub address_taken: bool,
    /// Set when a nested subprogram reaches this variable.
    pub captured: bool,
    /// Display slot, assigned on first capture and never reused.
    pub disp_offset: Option<u32>,
    /// The instruction whose result is the variable's address, normally
    /// its `alloc`.
    pub loc: Option<InsnId>,
}

/// What region a scope covers. Locality checks stop at the nearest
/// `Subprogram` boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Subprogram,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scope {
    kind: ScopeKind,
    vars: IndexMap<String, VarId>,
    funcs: IndexMap<String, TypeId>,
    types: IndexMap<String, TypeId>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            vars: IndexMap::new(),
            funcs: IndexMap::new(),
            types: IndexMap::new(),
        }
    }
}

/// The symbol table for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTable {
    vars: Vec<Var>,
    scopes: Vec<Scope>,
    pub types: TypeTable,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            scopes: Vec::new(),
            types: TypeTable::new(),
        }
    }

    /// Push a fresh scope.
    pub fn enter(&mut self, kind: ScopeKind) {
        debug!("enter {:?} scope (depth {})", kind, self.scopes.len() + 1);
        self.scopes.push(Scope::new(kind));
    }

    /// Pop the top scope. Bindings vanish; the arenas keep the entries.
    pub fn leave(&mut self) {
        debug!("leave scope (depth {})", self.scopes.len());
        self.scopes.pop();
    }

    /// Current scope-stack depth.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn top(&mut self) -> &mut Scope {
        self.scopes
            .last_mut()
            .expect("symbol table used outside any scope")
    }

    /// Bind the primitive type names in the current scope.
    pub fn bind_builtin_types(&mut self) {
        use crate::types::{BOOLEAN_TYPE, CHAR_TYPE, INTEGER_TYPE, REAL_TYPE, STRING_TYPE};
        let top = self.top();
        top.types.insert("integer".to_string(), INTEGER_TYPE);
        top.types.insert("real".to_string(), REAL_TYPE);
        top.types.insert("string".to_string(), STRING_TYPE);
        top.types.insert("boolean".to_string(), BOOLEAN_TYPE);
        top.types.insert("char".to_string(), CHAR_TYPE);
    }

    // ---- variables -------------------------------------------------------

    pub fn add_var(
        &mut self,
        name: &str,
        ty: TypeId,
        defn: Option<Span>,
        address_taken: bool,
    ) -> Result<VarId, SemaError> {
        if self.top().vars.contains_key(name) {
            return Err(SemaError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = self.push_var(name, ty, defn, address_taken);
        self.top().vars.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a variable to the arena without binding it in any scope; used
    /// for the formal-parameter lists carried by function signatures.
    fn push_var(&mut self, name: &str, ty: TypeId, defn: Option<Span>, address_taken: bool) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Var {
            name: name.to_string(),
            ty,
            defn,
            address_taken,
            captured: false,
            disp_offset: None,
            loc: None,
        });
        id
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.vars[id.0 as usize]
    }

    pub fn vars(&self) -> impl Iterator<Item = (VarId, &Var)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId(i as u32), v))
    }

    /// Intern a declaration group's type once and add every name in it.
    pub fn add_decls(
        &mut self,
        group: &DeclGroup,
        address_taken: bool,
    ) -> (Vec<VarId>, Vec<SemaError>) {
        let ty = match self.intern_type(&group.ty) {
            Ok(ty) => ty,
            Err(e) => return (Vec::new(), vec![e]),
        };
        let mut ids = Vec::new();
        let mut errors = Vec::new();
        for name in &group.names {
            match self.add_var(name, ty, group.span, address_taken) {
                Ok(id) => ids.push(id),
                Err(e) => errors.push(e),
            }
        }
        (ids, errors)
    }

    /// Variables bound in the top scope, in declaration order.
    pub fn top_scope_vars(&self) -> Vec<VarId> {
        self.scopes
            .last()
            .map(|s| s.vars.values().copied().collect())
            .unwrap_or_default()
    }

    // ---- functions -------------------------------------------------------

    /// Intern a subprogram's signature and bind its name in the current
    /// scope. `func` is the compiled function the body will be lowered
    /// into.
    pub fn add_func(
        &mut self,
        name: &str,
        head: &SubprogramHead,
        func: FuncId,
    ) -> Result<TypeId, SemaError> {
        if self.scopes.last().is_some_and(|s| s.funcs.contains_key(name)) {
            return Err(SemaError::DuplicateName {
                name: name.to_string(),
            });
        }
        let mut params = Vec::new();
        for group in &head.params {
            let ty = self.intern_type(&group.ty)?;
            for pname in &group.names {
                params.push(self.push_var(pname, ty, group.span, false));
            }
        }
        let ret = match &head.ret {
            Some(ty) => self.intern_type(ty)?,
            None => VOID_TYPE,
        };
        let id = self.types.push(
            name,
            ResolvedType::Function(FunctionType {
                kind: head.kind,
                params,
                ret,
                ret_assigned: false,
                magic: None,
                func: Some(func),
            }),
        );
        self.top().funcs.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a built-in I/O routine under its magic discriminator.
    pub fn add_magic_func(&mut self, magic: Magic) {
        let id = self.types.push(
            magic.name(),
            ResolvedType::Function(FunctionType {
                kind: tarn_ast::SubprogramKind::Procedure,
                params: Vec::new(),
                ret: VOID_TYPE,
                ret_assigned: false,
                magic: Some(magic),
                func: None,
            }),
        );
        self.top().funcs.insert(magic.name().to_string(), id);
    }

    // ---- resolution ------------------------------------------------------

    pub fn resolve_var(&self, name: &str) -> Option<VarId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.vars.get(name).copied())
    }

    pub fn resolve_func(&self, name: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.funcs.get(name).copied())
    }

    pub fn resolve_type_name(&self, name: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.types.get(name).copied())
    }

    /// Whether `name` is reachable without crossing out of the innermost
    /// subprogram; a variable that fails this test is only reachable
    /// through the display.
    pub fn has_local_var(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.vars.contains_key(name) {
                return true;
            }
            if scope.kind == ScopeKind::Subprogram {
                break;
            }
        }
        false
    }

    // ---- types -----------------------------------------------------------

    /// Intern a syntactic type, binding it under `name` in the current
    /// scope, and resolve any forward aliases the declaration satisfied.
    pub fn add_type(&mut self, name: &str, ty: &TypeExpr) -> Result<TypeId, SemaError> {
        if self.top().types.contains_key(name) {
            return Err(SemaError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = self.intern_type(ty)?;
        if self.types.name(id).is_empty() {
            self.types.set_name(id, name);
        }
        self.top().types.insert(name.to_string(), id);
        self.resolve_forward_refs();
        Ok(id)
    }

    /// Intern a syntactic type against the current scope chain.
    pub fn intern_type(&mut self, ty: &TypeExpr) -> Result<TypeId, SemaError> {
        self.intern_inner(ty, false)
    }

    fn intern_inner(&mut self, ty: &TypeExpr, in_pointer: bool) -> Result<TypeId, SemaError> {
        match ty {
            TypeExpr::Named(name) => match self.resolve_type_name(name) {
                Some(id) => Ok(id),
                // A pointer may reference a type declared later in the same
                // section; direct (non-pointer) recursion stays an error.
                None if in_pointer => Ok(self.intern_resolved(ResolvedType::Ref(name.clone()))),
                None => Err(SemaError::UnknownName { name: name.clone() }),
            },
            TypeExpr::Array { lower, upper, elem } => {
                let elem = self.intern_inner(elem, false)?;
                Ok(self.intern_resolved(ResolvedType::Array {
                    lower: *lower,
                    upper: *upper,
                    elem,
                }))
            }
            TypeExpr::Pointer(pointee) => {
                let pointee = self.intern_inner(pointee, true)?;
                Ok(self.intern_resolved(ResolvedType::Pointer(pointee)))
            }
            TypeExpr::Record(groups) => {
                let mut fields = Vec::new();
                for group in groups {
                    let fty = self.intern_inner(&group.ty, false)?;
                    for name in &group.names {
                        fields.push(Field {
                            name: name.clone(),
                            ty: fty,
                        });
                    }
                }
                Ok(self.intern_resolved(ResolvedType::Record(fields)))
            }
        }
    }

    /// Push `ty` unless a structurally equal type already exists.
    pub fn intern_resolved(&mut self, ty: ResolvedType) -> TypeId {
        let id = self.types.push("", ty);
        for i in 0..id.0 {
            let existing = TypeId(i);
            if matches!(self.types.ty(existing), ResolvedType::Function(_)) {
                continue;
            }
            if self.types_eq(existing, id) {
                self.types.pop_last();
                return existing;
            }
        }
        id
    }

    /// Intern a pointer to an already resolved type (address-of lowering).
    pub fn intern_pointer_to(&mut self, pointee: TypeId) -> TypeId {
        self.intern_resolved(ResolvedType::Pointer(pointee))
    }

    /// Repoint pointers whose pointee is a forward alias that the chain
    /// can now resolve.
    fn resolve_forward_refs(&mut self) {
        let mut fixes = Vec::new();
        for id in self.types.ids() {
            if let ResolvedType::Pointer(p) = self.types.ty(id) {
                if let ResolvedType::Ref(name) = self.types.ty(*p) {
                    if let Some(target) = self.resolve_type_name(name) {
                        fixes.push((id, target));
                    }
                }
            }
        }
        for (id, target) in fixes {
            self.types.set_pointee(id, target);
        }
    }

    /// Close out a type-declaration section: report pointers whose pointee
    /// never got declared and heal them to `void` so later size queries
    /// stay total.
    pub fn finish_type_decls(&mut self) -> Vec<SemaError> {
        self.resolve_forward_refs();
        let mut dangling = Vec::new();
        for id in self.types.ids() {
            if let ResolvedType::Pointer(p) = self.types.ty(id) {
                if let ResolvedType::Ref(name) = self.types.ty(*p) {
                    dangling.push((id, name.clone()));
                }
            }
        }
        let mut errors = Vec::new();
        for (id, name) in dangling {
            errors.push(SemaError::UnknownName { name });
            self.types.set_pointee(id, VOID_TYPE);
        }
        errors
    }

    /// Structural type equivalence: identity, or identical tag with
    /// recursively equal payloads. Cyclic pointer structures compare
    /// coinductively.
    pub fn types_eq(&self, a: TypeId, b: TypeId) -> bool {
        self.types_eq_inner(a, b, &mut Vec::new())
    }

    fn types_eq_inner(&self, a: TypeId, b: TypeId, assumed: &mut Vec<(TypeId, TypeId)>) -> bool {
        if a == b {
            return true;
        }
        if assumed.contains(&(a, b)) {
            return true;
        }
        assumed.push((a, b));
        let eq = match (self.types.ty(a), self.types.ty(b)) {
            (ResolvedType::Integer, ResolvedType::Integer)
            | (ResolvedType::Real, ResolvedType::Real)
            | (ResolvedType::String, ResolvedType::String)
            | (ResolvedType::Boolean, ResolvedType::Boolean)
            | (ResolvedType::Char, ResolvedType::Char)
            | (ResolvedType::Void, ResolvedType::Void) => true,
            (
                ResolvedType::Array {
                    lower: l1,
                    upper: u1,
                    elem: e1,
                },
                ResolvedType::Array {
                    lower: l2,
                    upper: u2,
                    elem: e2,
                },
            ) => l1 == l2 && u1 == u2 && self.types_eq_inner(*e1, *e2, assumed),
            (ResolvedType::Pointer(p1), ResolvedType::Pointer(p2)) => {
                self.types_eq_inner(*p1, *p2, assumed)
            }
            (ResolvedType::Record(f1), ResolvedType::Record(f2)) => {
                f1.len() == f2.len()
                    && f1
                        .iter()
                        .zip(f2)
                        .all(|(x, y)| x.name == y.name && self.types_eq_inner(x.ty, y.ty, assumed))
            }
            (ResolvedType::Function(f1), ResolvedType::Function(f2)) => {
                f1.kind == f2.kind
                    && f1.params.len() == f2.params.len()
                    && self.types_eq_inner(f1.ret, f2.ret, assumed)
                    && f1
                        .params
                        .iter()
                        .zip(&f2.params)
                        .all(|(&p, &q)| self.types_eq_inner(self.var(p).ty, self.var(q).ty, assumed))
            }
            (ResolvedType::Ref(n1), ResolvedType::Ref(n2)) => n1 == n2,
            _ => false,
        };
        assumed.pop();
        eq
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SemaErrorKind;
    use crate::types::{BOOLEAN_TYPE, CHAR_TYPE, INTEGER_TYPE};
    use pretty_assertions::assert_eq;

    fn table() -> SymbolTable {
        let mut st = SymbolTable::new();
        st.enter(ScopeKind::Subprogram);
        st.bind_builtin_types();
        st
    }

    #[test]
    fn test_shadowing_resolves_innermost_first() {
        let mut st = table();
        let outer = st.add_var("x", INTEGER_TYPE, None, true).unwrap();
        st.enter(ScopeKind::Subprogram);
        let inner = st.add_var("x", BOOLEAN_TYPE, None, true).unwrap();

        assert_eq!(st.resolve_var("x"), Some(inner));
        st.leave();
        assert_eq!(st.resolve_var("x"), Some(outer));
        st.leave();
        assert_eq!(st.resolve_var("x"), None);
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut st = table();
        st.add_var("x", INTEGER_TYPE, None, true).unwrap();
        let err = st.add_var("x", INTEGER_TYPE, None, true).unwrap_err();
        assert_eq!(err.kind(), SemaErrorKind::DuplicateName);
    }

    #[test]
    fn test_has_local_var_stops_at_subprogram_boundary() {
        let mut st = table();
        st.add_var("g", INTEGER_TYPE, None, true).unwrap();

        // Block scopes (for loops) do not hide outer variables.
        st.enter(ScopeKind::Block);
        assert!(st.has_local_var("g"));
        st.leave();

        // Subprogram scopes do.
        st.enter(ScopeKind::Subprogram);
        assert!(!st.has_local_var("g"));
        st.add_var("g", INTEGER_TYPE, None, true).unwrap();
        assert!(st.has_local_var("g"));
        st.leave();
    }

    #[test]
    fn test_add_decls_expands_every_name() {
        let mut st = table();
        let group = DeclGroup::new(["a", "b", "c"], TypeExpr::named("integer"));
        let (ids, errors) = st.add_decls(&group, true);
        assert!(errors.is_empty());
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|&id| st.var(id).ty == INTEGER_TYPE));
        assert_eq!(st.top_scope_vars(), ids);
    }

    #[test]
    fn test_pointer_interning_dedupes() {
        let mut st = table();
        let a = st
            .intern_type(&TypeExpr::pointer(TypeExpr::named("integer")))
            .unwrap();
        let b = st
            .intern_type(&TypeExpr::pointer(TypeExpr::named("integer")))
            .unwrap();
        let c = st.intern_pointer_to(INTEGER_TYPE);
        assert_eq!(a, b);
        assert_eq!(a, c);
        let d = st.intern_pointer_to(CHAR_TYPE);
        assert_ne!(a, d);
    }

    #[test]
    fn test_forward_pointer_through_record_resolves() {
        let mut st = table();
        // type node = record next: ^node; v: integer end
        let decl = TypeExpr::Record(vec![
            DeclGroup::new(["next"], TypeExpr::pointer(TypeExpr::named("node"))),
            DeclGroup::new(["v"], TypeExpr::named("integer")),
        ]);
        let node = st.add_type("node", &decl).unwrap();
        assert!(st.finish_type_decls().is_empty());

        let (next_ty, off) = st.types.field_offset(node, "next").unwrap();
        assert_eq!(off, 0);
        assert_eq!(st.types.ty(next_ty), &ResolvedType::Pointer(node));
        assert_eq!(st.types.field_offset(node, "v").unwrap().1, 8);

        // A later `^node` reuses the healed pointer type.
        let again = st
            .intern_type(&TypeExpr::pointer(TypeExpr::named("node")))
            .unwrap();
        assert_eq!(again, next_ty);
    }

    #[test]
    fn test_direct_recursion_is_an_error() {
        let mut st = table();
        let decl = TypeExpr::Record(vec![DeclGroup::new(["inner"], TypeExpr::named("loop"))]);
        let err = st.add_type("loop", &decl).unwrap_err();
        assert_eq!(err.kind(), SemaErrorKind::UnknownName);
    }

    #[test]
    fn test_dangling_forward_ref_reported_and_healed() {
        let mut st = table();
        st.add_type("p", &TypeExpr::pointer(TypeExpr::named("ghost")))
            .unwrap();
        let errors = st.finish_type_decls();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), SemaErrorKind::UnknownName);

        let p = st.resolve_type_name("p").unwrap();
        assert_eq!(st.types.ty(p), &ResolvedType::Pointer(VOID_TYPE));
        // Healing keeps size queries total.
        assert_eq!(st.types.size_of(p), 8);
    }

    #[test]
    fn test_structural_equivalence() {
        let mut st = table();
        let a1 = st
            .intern_type(&TypeExpr::array(1, 10, TypeExpr::named("integer")))
            .unwrap();
        let a2 = st
            .intern_type(&TypeExpr::array(1, 10, TypeExpr::named("integer")))
            .unwrap();
        let a3 = st
            .intern_type(&TypeExpr::array(0, 10, TypeExpr::named("integer")))
            .unwrap();
        assert!(st.types_eq(a1, a2));
        assert!(!st.types_eq(a1, a3));
        assert!(!st.types_eq(INTEGER_TYPE, BOOLEAN_TYPE));

        let r1 = st.intern_resolved(ResolvedType::Record(vec![Field {
            name: "a".into(),
            ty: INTEGER_TYPE,
        }]));
        let r2 = st.intern_resolved(ResolvedType::Record(vec![Field {
            name: "b".into(),
            ty: INTEGER_TYPE,
        }]));
        assert!(!st.types_eq(r1, r2));
    }

    #[test]
    fn test_magic_binding() {
        let mut st = table();
        st.add_magic_func(Magic::Writeln);
        let id = st.resolve_func("writeln").unwrap();
        let f = st.types.function(id).unwrap();
        assert_eq!(f.magic, Some(Magic::Writeln));
        assert!(f.func.is_none());
    }
}
