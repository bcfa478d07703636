//! Diagnostic collection and rendering
//!
//! The engine only collects; rendering against the buffer registry happens
//! on demand. Collected diagnostics are monotonic: they are never retracted.

use codespan_reporting::diagnostic::{Diagnostic as CodespanDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use kes_buffers::BufferRegistry;
use kes_span::BufferSpan;

/// How severe a diagnostic is
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    /// Hard error; the session will not reach `Ready` cleanly
    Error,
    /// Non-fatal warning
    Warning,
}

/// A collected diagnostic
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity of the diagnostic
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `frontend::unknown_target_triple`
    pub code: &'static str,
    /// Rendered message text
    pub message: String,
    /// Primary location, when one exists
    pub span: Option<BufferSpan>,
}

/// Accumulates diagnostics for one session
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticEngine {
    /// Creates an empty engine
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error diagnostic
    pub fn error(&mut self, code: &'static str, message: impl Into<String>, span: Option<BufferSpan>) {
        self.error_count += 1;
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
        });
    }

    /// Records a warning diagnostic
    pub fn warning(
        &mut self,
        code: &'static str,
        message: impl Into<String>,
        span: Option<BufferSpan>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span,
        });
    }

    /// Whether any error diagnostic was recorded
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of recorded errors
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// All collected diagnostics, in emission order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Renders every diagnostic in rustc-style text against the registry
    pub fn render(&self, buffers: &BufferRegistry) -> String {
        let mut files = SimpleFiles::new();
        // File ids follow admission order, so they coincide with buffer ids.
        for buffer in buffers.iter() {
            files.add(buffer.identifier.clone(), buffer.text().into_owned());
        }

        let config = term::Config::default();
        let mut output = Vec::new();
        for diagnostic in &self.diagnostics {
            let mut rendered = match diagnostic.severity {
                Severity::Error => CodespanDiagnostic::error(),
                Severity::Warning => CodespanDiagnostic::warning(),
            }
            .with_message(diagnostic.message.clone())
            .with_code(diagnostic.code);

            if let Some(span) = diagnostic.span {
                rendered =
                    rendered.with_labels(vec![Label::primary(span.buffer.index(), span.range())]);
            }

            #[allow(deprecated, reason = "kept until codespan's replacement API lands")]
            term::emit(&mut output, &config, &files, &rendered).unwrap_or_default();
        }

        String::from_utf8_lossy(&output).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kes_span::Span;

    #[test]
    fn errors_are_counted_and_kept_in_order() {
        let mut engine = DiagnosticEngine::new();
        engine.warning("parser::hashbang", "ignoring hashbang", None);
        engine.error("checker::unknown_name", "unknown name `x`", None);
        assert!(engine.has_errors());
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.diagnostics().len(), 2);
        assert_eq!(engine.diagnostics()[1].code, "checker::unknown_name");
    }

    #[test]
    fn render_includes_source_context() {
        let mut buffers = BufferRegistry::new();
        let id = buffers.register_memory(b"let x = missing;", "line.kes");

        let mut engine = DiagnosticEngine::new();
        engine.error(
            "checker::unknown_name",
            "unknown name `missing`",
            Some(BufferSpan::new(id, Span::new(8, 15))),
        );

        let output = engine.render(&buffers);
        assert!(output.contains("unknown name `missing`"));
        assert!(output.contains("line.kes"));
    }
}
