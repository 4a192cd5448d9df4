//! Abstract syntax tree for the Tarn source language
//!
//! These nodes are the input to semantic analysis. A parser produces them;
//! the analyzer consumes them read-only.

pub mod ast;
pub mod span;

pub use ast::{
    BinaryOp, DeclGroup, Expr, Path, Program, Stmt, Subprogram, SubprogramHead, SubprogramKind,
    TypeDecl, TypeExpr, UnaryOp,
};
pub use span::Span;
