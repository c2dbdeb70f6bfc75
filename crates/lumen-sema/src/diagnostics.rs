//! Ariadne-based rendering of semantic errors and warnings.
//!
//! Output is colorless so it can be snapshotted. Every error gets a code, a
//! one-line message, a label at its span and, where a plausible fix exists,
//! a help line.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::{ErrorKind, TypeError};

// ── Error Codes ────────────────────────────────────────────────────────

/// A stable code per error kind.
pub fn error_code(err: &TypeError) -> &'static str {
    match &err.kind {
        ErrorKind::DuplicateDefinition { .. } => "E0001",
        ErrorKind::TypeMismatch { .. } => "E0002",
        ErrorKind::UndefinedVariable { .. } => "E0003",
        ErrorKind::UndefinedType { .. } => "E0004",
        ErrorKind::UndefinedMember { .. } => "E0005",
        ErrorKind::InvalidOperation { .. } => "E0006",
        ErrorKind::WrongArgumentCount { .. } => "E0007",
        ErrorKind::UseOfMovedValue { .. } => "E0008",
        ErrorKind::AssignToImmutable { .. } => "E0009",
        ErrorKind::AssignToNonAddressable => "E0010",
        ErrorKind::RvalueReceiver { .. } => "E0011",
        ErrorKind::NonExhaustiveMatch { .. } => "E0012",
        ErrorKind::Other(_) => "E0100",
    }
}

// ── Labels and help ────────────────────────────────────────────────────

fn label_message(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::DuplicateDefinition { .. } => "defined again here".to_string(),
        ErrorKind::TypeMismatch { expected, found } => format!("expected {}, found {}", expected, found),
        ErrorKind::UndefinedVariable { .. } => "not found in this scope".to_string(),
        ErrorKind::UndefinedType { .. } => "unknown type".to_string(),
        ErrorKind::UndefinedMember { ty, .. } => format!("`{}` has no such member", ty),
        ErrorKind::InvalidOperation { op, .. } => format!("`{}` used here", op),
        ErrorKind::WrongArgumentCount { expected, .. } => format!("expected {} argument(s)", expected),
        ErrorKind::UseOfMovedValue { .. } => "value used here after move".to_string(),
        ErrorKind::AssignToImmutable { .. } => "cannot assign twice".to_string(),
        ErrorKind::AssignToNonAddressable => "not a place".to_string(),
        ErrorKind::RvalueReceiver { .. } => "this value is a temporary".to_string(),
        ErrorKind::NonExhaustiveMatch { missing } => format!("missing: {}", missing),
        ErrorKind::Other(_) => "here".to_string(),
    }
}

fn help(kind: &ErrorKind) -> Option<String> {
    match kind {
        ErrorKind::WrongArgumentCount { expected, found, .. } if expected > found => {
            Some(format!("missing {} argument(s)", expected - found))
        }
        ErrorKind::WrongArgumentCount { expected, found, .. } => {
            Some(format!("{} extra argument(s)", found - expected))
        }
        ErrorKind::AssignToImmutable { name } => Some(format!("declare `{}` with `let mut`", name)),
        ErrorKind::RvalueReceiver { .. } => Some("bind the value with `let mut` and call the method on the binding".to_string()),
        ErrorKind::UseOfMovedValue { name } => Some(format!("assign a new value to `{}` before using it again", name)),
        ErrorKind::NonExhaustiveMatch { .. } => Some("add the missing patterns or a wildcard `_` arm".to_string()),
        _ => None,
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Render an error against the source text of the file it points into.
pub fn render_diagnostic(error: &TypeError, source: &str) -> String {
    render(ReportKind::Error, Color::Red, error, source)
}

/// Render a warning (an unreachable match arm, for instance).
pub fn render_warning(warning: &TypeError, source: &str) -> String {
    render(ReportKind::Warning, Color::Yellow, warning, source)
}

fn render(kind: ReportKind<'_>, color: Color, error: &TypeError, source: &str) -> String {
    let config = Config::default().with_color(false);
    let span = clamp(error.span.map(to_range).unwrap_or(0..0), source.len());
    let label = match kind {
        ReportKind::Warning => "this arm is unreachable".to_string(),
        _ => label_message(&error.kind),
    };

    let mut builder = Report::build(kind, span.clone())
        .with_code(error_code(error))
        .with_message(error.to_string())
        .with_config(config)
        .with_label(Label::new(span).with_message(label).with_color(color));
    if let Some(help) = help(&error.kind) {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    if builder.finish().write(Source::from(source), &mut buf).is_err() {
        return error.to_string();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn to_range(range: rowan::TextRange) -> Range<usize> {
    let start: usize = range.start().into();
    let end: usize = range.end().into();
    start..end
}

/// Keep a range inside the source; ariadne needs at least one character.
fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let start = range.start.min(len);
    let end = range.end.min(len).max(start);
    if start == end {
        start..end.saturating_add(1).min(len)
    } else {
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_common::span::range;

    #[test]
    fn codes_are_distinct_per_kind() {
        let a = TypeError::mismatch("Int", "Bool");
        let b = TypeError::new(ErrorKind::UndefinedVariable { name: "x".into() });
        assert_ne!(error_code(&a), error_code(&b));
    }

    #[test]
    fn rendered_error_names_code_and_message() {
        let source = "let x Int = true";
        let err = TypeError::mismatch("Int", "Bool").or_span(range(12, 16), "main.lm");
        let out = render_diagnostic(&err, source);
        assert!(out.contains("E0002"), "got: {}", out);
        assert!(out.contains("type mismatch: expected `Int`, found `Bool`"), "got: {}", out);
        assert!(out.contains("expected Int, found Bool"), "got: {}", out);
    }

    #[test]
    fn errors_without_span_still_render() {
        let err = TypeError::other("something odd");
        let out = render_diagnostic(&err, "f()");
        assert!(out.contains("something odd"), "got: {}", out);
    }
}
