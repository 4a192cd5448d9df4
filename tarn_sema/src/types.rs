//! Type registry: interned resolved types, sizes, and field layout

use serde::{Deserialize, Serialize};

use tarn_ast::SubprogramKind;
use tarn_ir::FuncId;

use crate::builtins::Magic;
use crate::symtab::VarId;

/// Index of a type in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

// Well-known types, pre-interned by `TypeTable::new` in this order.
pub const INTEGER_TYPE: TypeId = TypeId(0);
pub const REAL_TYPE: TypeId = TypeId(1);
pub const STRING_TYPE: TypeId = TypeId(2);
pub const BOOLEAN_TYPE: TypeId = TypeId(3);
pub const CHAR_TYPE: TypeId = TypeId(4);
pub const VOID_TYPE: TypeId = TypeId(5);

/// A record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

/// The signature and analysis state of a procedure or function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionType {
    pub kind: SubprogramKind,
    /// Formal parameters, in declaration order.
    pub params: Vec<VarId>,
    /// `VOID_TYPE` for procedures.
    pub ret: TypeId,
    /// Set once the body assigns through the subprogram's own name.
    pub ret_assigned: bool,
    /// `Some` for the built-in I/O routines.
    pub magic: Option<Magic>,
    /// The compiled function, absent only for built-ins.
    pub func: Option<FuncId>,
}

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedType {
    Integer,
    Real,
    String,
    Boolean,
    Char,
    Void,
    /// Inclusive bounds.
    Array { lower: i64, upper: i64, elem: TypeId },
    Pointer(TypeId),
    /// Fields in declaration order; offsets accumulate field sizes with no
    /// padding.
    Record(Vec<Field>),
    Function(FunctionType),
    /// A forward alias created while a pointer's pointee is not yet
    /// declared. Resolved away before sizes are ever queried.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TypeEntry {
    /// The declared name; empty for structural (anonymous) types.
    name: String,
    ty: ResolvedType,
}

/// The arena all types live in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeTable {
    entries: Vec<TypeEntry>,
}

impl TypeTable {
    /// A registry with the well-known scalars pre-interned.
    pub fn new() -> Self {
        let scalars = [
            ("integer", ResolvedType::Integer),
            ("real", ResolvedType::Real),
            ("string", ResolvedType::String),
            ("boolean", ResolvedType::Boolean),
            ("char", ResolvedType::Char),
            ("void", ResolvedType::Void),
        ];
        Self {
            entries: scalars
                .into_iter()
                .map(|(name, ty)| TypeEntry {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, ty: ResolvedType) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(TypeEntry {
            name: name.into(),
            ty,
        });
        id
    }

    /// Drop the most recently pushed entry; used to undo a tentative push
    /// when interning finds a structural duplicate.
    pub(crate) fn pop_last(&mut self) {
        self.entries.pop();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ty(&self, id: TypeId) -> &ResolvedType {
        &self.entries[id.0 as usize].ty
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.entries[id.0 as usize].name
    }

    pub(crate) fn set_name(&mut self, id: TypeId, name: &str) {
        self.entries[id.0 as usize].name = name.to_string();
    }

    /// Rewrite a pointer entry's pointee; used when a forward alias
    /// resolves.
    pub(crate) fn set_pointee(&mut self, id: TypeId, pointee: TypeId) {
        if let ResolvedType::Pointer(p) = &mut self.entries[id.0 as usize].ty {
            *p = pointee;
        }
    }

    /// The function payload of `id`, if it is a subprogram type.
    pub fn function(&self, id: TypeId) -> Option<&FunctionType> {
        match self.ty(id) {
            ResolvedType::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, id: TypeId) -> Option<&mut FunctionType> {
        match &mut self.entries[id.0 as usize].ty {
            ResolvedType::Function(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.entries.len() as u32).map(TypeId)
    }

    /// Storage size in bytes.
    ///
    /// Panics on [`ResolvedType::Ref`]: a forward alias surviving to a size
    /// query is a bug in the analyzer, not in the input program.
    pub fn size_of(&self, id: TypeId) -> u64 {
        match self.ty(id) {
            ResolvedType::Integer | ResolvedType::Real => 8,
            ResolvedType::String => 8,
            ResolvedType::Boolean | ResolvedType::Char | ResolvedType::Void => 1,
            // Arrays are handles, not inline storage.
            ResolvedType::Array { .. } => 8,
            ResolvedType::Pointer(_) => 8,
            ResolvedType::Record(_) => 64,
            ResolvedType::Function(_) => 8,
            ResolvedType::Ref(name) => {
                panic!("forward type alias `{}` reached size_of", name)
            }
        }
    }

    /// Find a record field by name, accumulating the byte offsets of the
    /// fields declared before it.
    pub fn field_offset(&self, record: TypeId, field: &str) -> Option<(TypeId, u64)> {
        let ResolvedType::Record(fields) = self.ty(record) else {
            return None;
        };
        let mut offset = 0;
        for f in fields {
            if f.name == field {
                return Some((f.ty, offset));
            }
            offset += self.size_of(f.ty);
        }
        None
    }

    /// Human-readable rendering for diagnostics. Named types render by
    /// name, which also keeps cyclic record types printable.
    pub fn render(&self, id: TypeId) -> String {
        let entry = &self.entries[id.0 as usize];
        if !entry.name.is_empty() {
            return entry.name.clone();
        }
        match &entry.ty {
            ResolvedType::Integer => "integer".to_string(),
            ResolvedType::Real => "real".to_string(),
            ResolvedType::String => "string".to_string(),
            ResolvedType::Boolean => "boolean".to_string(),
            ResolvedType::Char => "char".to_string(),
            ResolvedType::Void => "void".to_string(),
            ResolvedType::Array { lower, upper, elem } => {
                format!("array [{}..{}] of {}", lower, upper, self.render(*elem))
            }
            ResolvedType::Pointer(p) => format!("^{}", self.render(*p)),
            ResolvedType::Record(fields) => {
                let body = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, self.render(f.ty)))
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("record {} end", body)
            }
            ResolvedType::Function(f) => match f.kind {
                SubprogramKind::Procedure => "procedure".to_string(),
                SubprogramKind::Function => format!("function: {}", self.render(f.ret)),
            },
            ResolvedType::Ref(name) => name.clone(),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(INTEGER_TYPE, 8)]
    #[case(REAL_TYPE, 8)]
    #[case(STRING_TYPE, 8)]
    #[case(BOOLEAN_TYPE, 1)]
    #[case(CHAR_TYPE, 1)]
    #[case(VOID_TYPE, 1)]
    fn test_scalar_sizes(#[case] ty: TypeId, #[case] expected: u64) {
        assert_eq!(TypeTable::new().size_of(ty), expected);
    }

    #[test]
    fn test_compound_sizes() {
        let mut table = TypeTable::new();
        let arr = table.push(
            "",
            ResolvedType::Array {
                lower: 1,
                upper: 10,
                elem: INTEGER_TYPE,
            },
        );
        let ptr = table.push("", ResolvedType::Pointer(INTEGER_TYPE));
        let rec = table.push("", ResolvedType::Record(vec![]));
        assert_eq!(table.size_of(arr), 8);
        assert_eq!(table.size_of(ptr), 8);
        assert_eq!(table.size_of(rec), 64);
    }

    #[test]
    #[should_panic(expected = "reached size_of")]
    fn test_ref_size_is_a_bug() {
        let mut table = TypeTable::new();
        let r = table.push("", ResolvedType::Ref("node".to_string()));
        table.size_of(r);
    }

    #[test]
    fn test_field_offsets_accumulate_without_padding() {
        let mut table = TypeTable::new();
        let rec = table.push(
            "r",
            ResolvedType::Record(vec![
                Field {
                    name: "a".into(),
                    ty: INTEGER_TYPE,
                },
                Field {
                    name: "b".into(),
                    ty: CHAR_TYPE,
                },
                Field {
                    name: "c".into(),
                    ty: INTEGER_TYPE,
                },
            ]),
        );
        assert_eq!(table.field_offset(rec, "a"), Some((INTEGER_TYPE, 0)));
        assert_eq!(table.field_offset(rec, "b"), Some((CHAR_TYPE, 8)));
        assert_eq!(table.field_offset(rec, "c"), Some((INTEGER_TYPE, 9)));
        assert_eq!(table.field_offset(rec, "d"), None);
        assert_eq!(table.field_offset(INTEGER_TYPE, "a"), None);
    }

    #[test]
    fn test_render() {
        let mut table = TypeTable::new();
        let ptr = table.push("", ResolvedType::Pointer(INTEGER_TYPE));
        let arr = table.push(
            "",
            ResolvedType::Array {
                lower: 1,
                upper: 4,
                elem: ptr,
            },
        );
        assert_eq!(table.render(arr), "array [1..4] of ^integer");

        let named = table.push("node", ResolvedType::Record(vec![]));
        assert_eq!(table.render(named), "node");
    }
}
