//! Diagnostics: error values, severities, and the reporting sink

use std::fmt;

use thiserror::Error;

use tarn_ast::Span;

/// Errors the analyzer can report.
///
/// Every variant is recoverable: the analyzer reports it to the sink and
/// keeps going so one pass surfaces as many diagnostics as possible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemaError {
    #[error("unknown name `{name}`")]
    UnknownName { name: String },

    #[error("`{name}` is already defined in this scope")]
    DuplicateName { name: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("expression cannot be used as an lvalue")]
    NotAnLvalue,

    #[error("assignment to `{name}`, which is not local to the current subprogram")]
    NonLocalAssignment { name: String },

    #[error("cannot access field `{field}` of non-record type {ty}")]
    FieldOfNonRecord { field: String, ty: String },

    #[error("no field `{field}` in {ty}")]
    UnknownField { field: String, ty: String },

    #[error("`{name}` cannot be called")]
    NotCallable { name: String },

    #[error("`{name}` expects {expected} arguments, {found} were passed")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("argument of type {ty} cannot be passed to `{builtin}`")]
    UnsupportedBuiltinArg { builtin: String, ty: String },

    #[error("function `{name}` never assigns its return value")]
    UnassignedReturn { name: String },

    #[error("no such library: `{name}`")]
    UnknownImport { name: String },

    #[error("internal invariant violated: {message}")]
    InternalInvariant { message: String },
}

/// The coarse classification of a [`SemaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaErrorKind {
    UnknownName,
    DuplicateName,
    TypeMismatch,
    NotAnLvalue,
    NonLocalAssignment,
    BadFieldAccess,
    BadCall,
    UnassignedReturn,
    UnknownImport,
    InternalInvariant,
}

impl SemaError {
    /// Get the kind of this error.
    pub fn kind(&self) -> SemaErrorKind {
        match self {
            SemaError::UnknownName { .. } => SemaErrorKind::UnknownName,
            SemaError::DuplicateName { .. } => SemaErrorKind::DuplicateName,
            SemaError::TypeMismatch { .. } | SemaError::UnsupportedBuiltinArg { .. } => {
                SemaErrorKind::TypeMismatch
            }
            SemaError::NotAnLvalue => SemaErrorKind::NotAnLvalue,
            SemaError::NonLocalAssignment { .. } => SemaErrorKind::NonLocalAssignment,
            SemaError::FieldOfNonRecord { .. } | SemaError::UnknownField { .. } => {
                SemaErrorKind::BadFieldAccess
            }
            SemaError::NotCallable { .. } | SemaError::ArityMismatch { .. } => {
                SemaErrorKind::BadCall
            }
            SemaError::UnassignedReturn { .. } => SemaErrorKind::UnassignedReturn,
            SemaError::UnknownImport { .. } => SemaErrorKind::UnknownImport,
            SemaError::InternalInvariant { .. } => SemaErrorKind::InternalInvariant,
        }
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One reported problem: severity, optional source position, error value.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<Span>,
    pub error: SemaError,
}

impl Diagnostic {
    pub fn error(error: SemaError, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            error,
        }
    }

    pub fn kind(&self) -> SemaErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.span {
            Some(span) => write!(f, "{} at {}: {}", severity, span, self.error),
            None => write!(f, "{}: {}", severity, self.error),
        }
    }
}

/// Where diagnostics go. The analyzer never writes to stdout or stderr;
/// the driver supplies a sink.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// The default sink: accumulate everything in a vector.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
