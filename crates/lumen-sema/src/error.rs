//! Semantic errors.
//!
//! A [`TypeError`] is an [`ErrorKind`] plus an optional location. Errors
//! raised deep inside helpers usually carry no span; the expression and
//! statement checkers attach their own span as the error propagates through
//! them (see [`TypeError::or_span`]), so every error that reaches the caller
//! is reportable.

use std::fmt;

use rowan::TextRange;

/// What went wrong.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A name was declared twice in the same namespace.
    DuplicateDefinition { name: String },
    TypeMismatch { expected: String, found: String },
    UndefinedVariable { name: String },
    UndefinedType { name: String },
    UndefinedMember { member: String, ty: String },
    /// An operator or built-in operation does not apply to its operands.
    InvalidOperation { op: String, lhs: String, rhs: String },
    WrongArgumentCount { callee: String, expected: usize, found: usize },
    UseOfMovedValue { name: String },
    AssignToImmutable { name: String },
    AssignToNonAddressable,
    /// A method taking `self ref` was called on a temporary.
    RvalueReceiver { method: String, ty: String },
    NonExhaustiveMatch { missing: String },
    /// Conditions without a dedicated kind: trait conformance, recursion
    /// legality, visibility and the like.
    Other(String),
}

/// A semantic error with the location it was attributed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeError {
    pub kind: ErrorKind,
    pub span: Option<TextRange>,
    pub file: Option<String>,
}

impl TypeError {
    pub fn new(kind: ErrorKind) -> Self {
        TypeError { kind, span: None, file: None }
    }

    pub fn other(message: impl Into<String>) -> Self {
        TypeError::new(ErrorKind::Other(message.into()))
    }

    pub fn mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        TypeError::new(ErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }

    pub fn invalid_operation(
        op: impl fmt::Display,
        lhs: impl fmt::Display,
        rhs: impl fmt::Display,
    ) -> Self {
        TypeError::new(ErrorKind::InvalidOperation {
            op: op.to_string(),
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        })
    }

    pub fn undefined_member(member: &str, ty: impl fmt::Display) -> Self {
        TypeError::new(ErrorKind::UndefinedMember { member: member.to_string(), ty: ty.to_string() })
    }

    /// Attach `span` and `file` unless the error already has a location.
    pub fn or_span(mut self, span: TextRange, file: &str) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
            self.file = Some(file.to_string());
        }
        self
    }

    /// The message text, if this is a catch-all error.
    pub fn message(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Other(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::DuplicateDefinition { name } => {
                write!(f, "duplicate definition of `{}`", name)
            }
            ErrorKind::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            ErrorKind::UndefinedVariable { name } => write!(f, "undefined variable `{}`", name),
            ErrorKind::UndefinedType { name } => write!(f, "undefined type `{}`", name),
            ErrorKind::UndefinedMember { member, ty } => {
                write!(f, "member `{}` not found in type `{}`", member, ty)
            }
            ErrorKind::InvalidOperation { op, lhs, rhs } => {
                if rhs.is_empty() {
                    write!(f, "invalid operation `{}` on `{}`", op, lhs)
                } else {
                    write!(f, "invalid operation `{}` between `{}` and `{}`", op, lhs, rhs)
                }
            }
            ErrorKind::WrongArgumentCount { callee, expected, found } => write!(
                f,
                "`{}` expects {} argument{}, found {}",
                callee,
                expected,
                if *expected == 1 { "" } else { "s" },
                found
            ),
            ErrorKind::UseOfMovedValue { name } => write!(f, "use of moved value `{}`", name),
            ErrorKind::AssignToImmutable { name } => {
                write!(f, "cannot assign to immutable binding `{}`", name)
            }
            ErrorKind::AssignToNonAddressable => {
                write!(f, "cannot assign to a value that is not addressable")
            }
            ErrorKind::RvalueReceiver { method, ty } => write!(
                f,
                "method `{}` takes `self ref` but was called on a temporary `{}`; bind it with `let mut` first",
                method, ty
            ),
            ErrorKind::NonExhaustiveMatch { missing } => {
                write!(f, "non-exhaustive match: `{}` not covered", missing)
            }
            ErrorKind::Other(message) => write!(f, "{}", message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_common::span::range;

    #[test]
    fn or_span_keeps_the_innermost_location() {
        let err = TypeError::mismatch("Int", "Bool")
            .or_span(range(3, 5), "inner.lm")
            .or_span(range(0, 10), "outer.lm");
        assert_eq!(err.span, Some(range(3, 5)));
        assert_eq!(err.file.as_deref(), Some("inner.lm"));
    }

    #[test]
    fn messages() {
        insta::assert_snapshot!(
            TypeError::mismatch("Int", "Bool").to_string(),
            @"type mismatch: expected `Int`, found `Bool`"
        );
        insta::assert_snapshot!(
            TypeError::invalid_operation("-", "Bool", "").to_string(),
            @"invalid operation `-` on `Bool`"
        );
        let count = TypeError::new(ErrorKind::WrongArgumentCount {
            callee: "f".into(),
            expected: 1,
            found: 3,
        });
        assert_eq!(count.to_string(), "`f` expects 1 argument, found 3");
    }
}
