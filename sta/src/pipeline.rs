// pipeline.rs — Load, verify, analyze and report on one graph
//
// Runs the stages in order: load (textual IR or JSON), verify the input,
// run the scalar type analysis, then verify the result and list remaining
// kind inconsistencies. Every stage hands its diagnostics to a callback
// before the next stage starts, so the caller can display them immediately.
//
// Preconditions: none.
// Postconditions: on success `graph` holds the rewritten graph and
//   `provenance` fingerprints the printed input and output.
// Failure modes: a stage emitting error-level diagnostics stops the run.
// Side effects: calls `on_stage_complete` after each stage; prints timing
//   lines to stderr when `verbose` is set.

use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::diag::{codes, has_errors, DiagLevel, Diagnostic, Location};
use crate::ir::{Graph, IrError};
use crate::rewrite::RewriteStats;
use crate::scalar_types::{scalar_type_analysis_with, AnalysisOptions};
use crate::verify::{check_type_consistency, verify_graph, Inconsistency};

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// Textual IR.
    #[default]
    Ir,
    /// Serialized `Graph`.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Ir,
    Json,
    Report,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub input_format: InputFormat,
    pub analysis: AnalysisOptions,
    pub verbose: bool,
}

// ── Stages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    VerifyInput,
    Analyze,
    VerifyOutput,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::VerifyInput => "verify_input",
            Stage::Analyze => "scalar_type_analysis",
            Stage::VerifyOutput => "verify_output",
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────────────

/// Failures outside the graph itself: files and serialization.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid graph JSON: {0}")]
    Structure(#[from] IrError),

    #[error("no graph to emit")]
    NothingToEmit,
}

/// A stage produced error-level diagnostics. The diagnostics themselves are
/// in `Compilation::diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    pub failing_stage: Stage,
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Fingerprints of the printed input and output graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub input_hash: [u8; 32],
    pub output_hash: [u8; 32],
    pub version: &'static str,
}

impl Provenance {
    pub fn input_hash_hex(&self) -> String {
        bytes_to_hex(&self.input_hash)
    }

    pub fn output_hash_hex(&self) -> String {
        bytes_to_hex(&self.output_hash)
    }
}

fn sha256(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Fingerprint two printed graphs. Printing normalizes formatting and
/// comments away, so equivalent sources hash the same.
pub fn compute_provenance(input: &Graph, output: &Graph) -> Provenance {
    Provenance {
        input_hash: sha256(&input.to_string()),
        output_hash: sha256(&output.to_string()),
        version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Artifacts and diagnostics accumulated over one run.
#[derive(Debug, Default)]
pub struct Compilation {
    pub graph: Option<Graph>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RewriteStats,
    pub inconsistencies: Vec<Inconsistency>,
    pub provenance: Option<Provenance>,
    pub has_error: bool,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagLevel::Warning)
            .count()
    }
}

/// Read a graph serialized as JSON.
pub fn load_json(source: &str) -> Result<Graph, LoadError> {
    let graph: Graph = serde_json::from_str(source)?;
    graph.check_structure()?;
    Ok(graph)
}

fn finish_stage(
    state: &mut Compilation,
    stage: Stage,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    verbose: bool,
    on_stage_complete: &mut impl FnMut(Stage, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_stage_complete(stage, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    debug!(
        stage = stage.name(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "stage complete"
    );
    if verbose {
        eprintln!(
            "sta: {} complete, {:.1}ms",
            stage.name(),
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_stage: stage,
        });
    }
    Ok(())
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run every stage on `source`.
///
/// Per-stage sequence: execute → on_stage_complete(callback) → verbose → error check.
pub fn run_pipeline(
    state: &mut Compilation,
    source: &str,
    options: &PipelineOptions,
    mut on_stage_complete: impl FnMut(Stage, &[Diagnostic]),
) -> Result<(), PipelineError> {
    let verbose = options.verbose;

    let t = Instant::now();
    let loaded = match options.input_format {
        InputFormat::Ir => crate::load::parse_graph(source),
        InputFormat::Json => load_json(source).map_err(|e| {
            vec![Diagnostic::error(Location::Graph, e.to_string()).with_code(codes::PARSE)]
        }),
    };
    let (mut graph, diags) = match loaded {
        Ok(graph) => (graph, Vec::new()),
        Err(diags) => (Graph::new(), diags),
    };
    finish_stage(
        state,
        Stage::Load,
        diags,
        t.elapsed(),
        verbose,
        &mut on_stage_complete,
    )?;

    let t = Instant::now();
    let diags = verify_graph(&graph);
    finish_stage(
        state,
        Stage::VerifyInput,
        diags,
        t.elapsed(),
        verbose,
        &mut on_stage_complete,
    )?;
    let input = graph.clone();

    let t = Instant::now();
    let result = scalar_type_analysis_with(&mut graph, &options.analysis);
    state.stats = result.stats;
    finish_stage(
        state,
        Stage::Analyze,
        result.diagnostics,
        t.elapsed(),
        verbose,
        &mut on_stage_complete,
    )?;

    let t = Instant::now();
    let diags = verify_graph(&graph);
    state.inconsistencies = check_type_consistency(&graph);
    state.provenance = Some(compute_provenance(&input, &graph));
    state.graph = Some(graph);
    finish_stage(
        state,
        Stage::VerifyOutput,
        diags,
        t.elapsed(),
        verbose,
        &mut on_stage_complete,
    )
}

// ── Output ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DiagnosticRecord<'a> {
    code: Option<&'static str>,
    level: DiagLevel,
    location: String,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
}

#[derive(Serialize)]
struct ProvenanceRecord {
    input_sha256: String,
    output_sha256: String,
    version: &'static str,
}

#[derive(Serialize)]
struct Report<'a> {
    diagnostics: Vec<DiagnosticRecord<'a>>,
    stats: &'a RewriteStats,
    inconsistencies: &'a [Inconsistency],
    provenance: Option<ProvenanceRecord>,
}

/// Render the result of a run in the requested form.
pub fn emit(state: &Compilation, kind: EmitKind) -> Result<String, LoadError> {
    match kind {
        EmitKind::Ir => {
            let graph = state.graph.as_ref().ok_or(LoadError::NothingToEmit)?;
            Ok(format!("{}\n", graph))
        }
        EmitKind::Json => {
            let graph = state.graph.as_ref().ok_or(LoadError::NothingToEmit)?;
            Ok(serde_json::to_string_pretty(graph)? + "\n")
        }
        EmitKind::Report => {
            let report = Report {
                diagnostics: state
                    .diagnostics
                    .iter()
                    .map(|d| DiagnosticRecord {
                        code: d.code.map(|c| c.0),
                        level: d.level,
                        location: d.location.to_string(),
                        message: &d.message,
                        hint: d.hint.as_deref(),
                    })
                    .collect(),
                stats: &state.stats,
                inconsistencies: &state.inconsistencies,
                provenance: state.provenance.as_ref().map(|p| ProvenanceRecord {
                    input_sha256: p.input_hash_hex(),
                    output_sha256: p.output_hash_hex(),
                    version: p.version,
                }),
            };
            Ok(serde_json::to_string_pretty(&report)? + "\n")
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
