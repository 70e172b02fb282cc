//! The single error-reporting sink.
//!
//! An outer enum wrapping small per-kind structs, each implementing
//! `Display` + `std::error::Error`, carrying a source position. The position
//! here is a plain `(line, col)` pair (`Span`) rather than a parser-derived
//! span, since lexing/parsing is out of scope for this crate.

use std::fmt;

/// A 1-based `(line, col)` source position. One of these is attached to
/// every `ResoValue`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Span { line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// The abstract error-kind catalogue. Each variant carries
/// enough context to render a useful message without re-deriving it from the
/// AST at print time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownType { name: String },
    UndefinedVariable { name: String },
    UninitializedRead { name: String },
    DuplicateDefinition { name: String },
    NotAssignable { description: String },
    ConstReassignment { name: String },
    VisibilityViolation { name: String },
    TypeMismatch { expected: String, actual: String },
    NonBooleanCondition { actual: String },
    NonNumericOperand { actual: String },
    NonIntegerOperand { actual: String },
    AmbiguousOperandTypes { left: String, right: String },
    BadLiteral { reason: String },
    ReturnOutsideFunction,
    ReturnMissingValue { expected: String },
    ReturnWrongType { expected: String, actual: String },
    LoopControlOutsideLoop { keyword: &'static str },
    InvalidLvalue { description: String },
    OutOfContext { description: String },
    ArgCountMismatch { expected: usize, actual: usize },
    ArgConvertFail { index: usize, expected: String },
    GlobalVariableDefinition,
    UnreachableCode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnknownType { name } => write!(f, "Unknown type: {name}"),
            ErrorKind::UndefinedVariable { name } => {
                write!(f, "'{name}' is not defined")
            }
            ErrorKind::UninitializedRead { name } => {
                write!(f, "'{name}' is not initialized")
            }
            ErrorKind::DuplicateDefinition { name } => {
                write!(f, "'{name}' is already defined in this scope")
            }
            ErrorKind::NotAssignable { description } => {
                write!(f, "{description} is not assignable")
            }
            ErrorKind::ConstReassignment { name } => {
                write!(f, "cannot reassign constant '{name}'")
            }
            ErrorKind::VisibilityViolation { name } => {
                write!(f, "'{name}' is not visible from this file")
            }
            ErrorKind::TypeMismatch { expected, actual } => {
                write!(f, "expected type '{expected}' but got '{actual}'")
            }
            ErrorKind::NonBooleanCondition { actual } => {
                write!(f, "expected 'bool' condition but got '{actual}'")
            }
            ErrorKind::NonNumericOperand { actual } => {
                write!(f, "expected a numeric operand but got '{actual}'")
            }
            ErrorKind::NonIntegerOperand { actual } => {
                write!(f, "expected an integer operand but got '{actual}'")
            }
            ErrorKind::AmbiguousOperandTypes { left, right } => {
                write!(f, "ambiguous operand types '{left}' and '{right}'")
            }
            ErrorKind::BadLiteral { reason } => write!(f, "{reason}"),
            ErrorKind::ReturnOutsideFunction => write!(f, "'return' outside of a function"),
            ErrorKind::ReturnMissingValue { expected } => {
                write!(f, "function must return a value of type '{expected}'")
            }
            ErrorKind::ReturnWrongType { expected, actual } => {
                write!(f, "expected return type '{expected}' but got '{actual}'")
            }
            ErrorKind::LoopControlOutsideLoop { keyword } => {
                write!(f, "'{keyword}' outside of a loop")
            }
            ErrorKind::InvalidLvalue { description } => {
                write!(f, "{description} is not a valid assignment target")
            }
            ErrorKind::OutOfContext { description } => write!(f, "{description}"),
            ErrorKind::ArgCountMismatch { expected, actual } => write!(
                f,
                "expected {expected} argument(s) but got {actual}"
            ),
            ErrorKind::ArgConvertFail { index, expected } => write!(
                f,
                "argument {index} could not be converted to '{expected}'"
            ),
            ErrorKind::GlobalVariableDefinition => {
                write!(f, "variables cannot be defined in global scope")
            }
            ErrorKind::UnreachableCode => write!(f, "unreachable code"),
        }
    }
}

impl std::error::Error for ErrorKind {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub span: Span,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{label} at {}: {}", self.span, self.kind)
    }
}

/// Append-only diagnostic sink shared by the whole lowering pipeline.
#[derive(Default, Debug, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    /// Whether an "unreachable code" warning has already been emitted for
    /// the block currently being lowered.
    unreachable_warned: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: ErrorKind, span: Span) {
        self.entries.push(Diagnostic {
            kind,
            span,
            severity: Severity::Error,
        });
    }

    pub fn warn_unreachable_once(&mut self, span: Span) {
        if self.unreachable_warned {
            return;
        }
        self.unreachable_warned = true;
        self.entries.push(Diagnostic {
            kind: ErrorKind::UnreachableCode,
            span,
            severity: Severity::Warning,
        });
    }

    /// Reset the "already warned" latch; called when lowering moves to a new
    /// block.
    pub fn reset_unreachable_latch(&mut self) {
        self.unreachable_warned = false;
    }

    pub fn had_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_warning_fires_once() {
        let mut diags = Diagnostics::new();
        diags.warn_unreachable_once(Span::new(1, 1));
        diags.warn_unreachable_once(Span::new(2, 1));
        assert_eq!(
            diags
                .entries()
                .iter()
                .filter(|d| d.kind == ErrorKind::UnreachableCode)
                .count(),
            1
        );
    }

    #[test]
    fn had_errors_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.warn_unreachable_once(Span::new(1, 1));
        assert!(!diags.had_errors());
        diags.report(ErrorKind::ReturnOutsideFunction, Span::new(1, 1));
        assert!(diags.had_errors());
    }
}
