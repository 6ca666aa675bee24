// ABOUTME: Shared diagnostic type each compiler phase converges on

use std::fmt;

/// Which phase of the pipeline produced a diagnostic.
///
/// Used only for grouping/labelling output; the message text itself already
/// carries the phase-specific wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexer,
    Parser,
    Semantic,
    CodeGen,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lexer => "Lexer",
            Phase::Parser => "Parser",
            Phase::Semantic => "Semantic",
            Phase::CodeGen => "CodeGen",
        };
        write!(f, "{}", name)
    }
}

/// A single accumulated error, ready to print or collect.
///
/// Every phase boundary in the pipeline returns
/// `Result<Artifact, Vec<Diagnostic>>`; this is the `Diagnostic`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
}

impl Diagnostic {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Diagnostic {
            phase,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Render a batch of diagnostics for display: each phase's errors go to
/// standard output with a visible marker.
pub fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        out.push_str(&format!(">>> [{}] {}\n", d.phase, d.message));
    }
    out
}
