// diag.rs — Unified diagnostics model
//
// Provides the diagnostic types shared by the textual front end, the
// verifier, and the scalar type analysis. Diagnostics are values: nothing in
// the library prints them, the caller decides how to surface or escalate.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use chumsky::span::SimpleSpan;
use serde::Serialize;

use crate::ir::InstId;

/// Byte-offset span in textual IR source.
pub type Span = SimpleSpan;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0101`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Textual IR syntax error.
    pub const PARSE: DiagCode = DiagCode("E0001");
    /// Reference to a value name that is not in scope.
    pub const UNDEFINED_VALUE: DiagCode = DiagCode("E0002");
    /// Value name defined twice.
    pub const DUPLICATE_VALUE: DiagCode = DiagCode("E0003");
    /// Tensor literal does not match its declared kind or shape.
    pub const BAD_LITERAL: DiagCode = DiagCode("E0004");
    /// Operand used outside the scope of its definition.
    pub const USE_BEFORE_DEF: DiagCode = DiagCode("E0010");
    /// Use lists disagree with operands or region returns.
    pub const BROKEN_USE_LIST: DiagCode = DiagCode("E0011");

    /// Several tensor kinds reach a uniform operator with no output hint.
    pub const AMBIGUOUS_TENSOR_KINDS: DiagCode = DiagCode("W0101");
    /// Inferred kind has no wire-format type identifier.
    pub const UNMAPPED_WIRE_TYPE: DiagCode = DiagCode("W0102");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Location ─────────────────────────────────────────────────────────────

/// Where a diagnostic points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// A range of textual IR source.
    Source(Span),
    /// An instruction of the graph being analyzed.
    Inst(InstId),
    /// Not tied to a particular place.
    Graph,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Source(span) => write!(f, "{}..{}", span.start, span.end),
            Location::Inst(id) => write!(f, "instruction {}", id),
            Location::Graph => write!(f, "graph"),
        }
    }
}

// ── Cause record ─────────────────────────────────────────────────────────

/// One link in a cause chain explaining how a diagnostic came about.
#[derive(Debug, Clone)]
pub struct CauseRecord {
    pub message: String,
    pub location: Option<Location>,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub location: Location,
    pub message: String,
    pub hint: Option<String>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, or causes.
    pub fn new(level: DiagLevel, location: Location, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location,
            message: message.into(),
            hint: None,
            cause_chain: Vec::new(),
        }
    }

    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, location, message)
    }

    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, location, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a cause record to the chain.
    pub fn with_cause(mut self, message: impl Into<String>, location: Option<Location>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
            location,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        for cause in &self.cause_chain {
            write!(f, "\n  note: {}", cause.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}
