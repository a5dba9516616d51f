//! Diagnostic entries produced by the parser adapter, consistency checker, and
//! evaluator (spec §6 "Outputs", §7 "Error Handling Design").
//!
//! The core never renders localized strings: diagnostics carry a stable
//! `template_id` plus an already-formatted `message` for convenience in this
//! standalone crate, and an optional addendum chain for inferred-vs-expected
//! type detail (spec §7 "User-visible behavior").

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Information,
}

/// A byte-offset range inside one source file, derived from the string-interior
/// offset when the problem is inside a parsed refinement (spec §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub file: Option<Arc<str>>,
    pub start: u32,
    pub end: u32,
}

impl SourceRange {
    pub fn new(file: impl Into<Arc<str>>, start: u32, end: u32) -> Self {
        Self {
            file: Some(file.into()),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub template_id: &'static str,
    pub message: String,
    pub range: Option<SourceRange>,
    pub addendum: Option<Box<Diagnostic>>,
}

impl Diagnostic {
    pub fn error(template_id: &'static str, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            template_id,
            message: message.into(),
            range: None,
            addendum: None,
        }
    }

    pub fn warning(template_id: &'static str, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Warning,
            template_id,
            message: message.into(),
            range: None,
            addendum: None,
        }
    }

    #[must_use]
    pub fn at(mut self, range: SourceRange) -> Self {
        self.range = Some(range);
        self
    }

    #[must_use]
    pub fn with_addendum(mut self, addendum: Diagnostic) -> Self {
        self.addendum = Some(Box::new(addendum));
        self
    }
}

/// Convenience sink bundle threaded through the evaluator (spec §4.4 options
/// `{errors?: sink, warnings?: sink}`) and the parser adapter's single
/// diagnostic callback (spec §4.2). Kept as a plain struct of optional
/// mutable borrows rather than a trait object, matching the teacher's
/// preference for concrete types over abstracting early.
pub struct Diagnostics<'a> {
    pub errors: Option<&'a mut Vec<Diagnostic>>,
    pub warnings: Option<&'a mut Vec<Diagnostic>>,
}

impl<'a> Diagnostics<'a> {
    pub fn none() -> Self {
        Self {
            errors: None,
            warnings: None,
        }
    }

    pub fn both(errors: &'a mut Vec<Diagnostic>, warnings: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            errors: Some(errors),
            warnings: Some(warnings),
        }
    }

    pub fn report_error(&mut self, diag: Diagnostic) {
        if let Some(sink) = self.errors.as_deref_mut() {
            sink.push(diag);
        }
    }

    pub fn report_warning(&mut self, diag: Diagnostic) {
        if let Some(sink) = self.warnings.as_deref_mut() {
            sink.push(diag);
        }
    }
}
