use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sta::dce::SideEffectPolicy;
use sta::pipeline::{self, Compilation, EmitKind, InputFormat, PipelineOptions};
use sta::scalar_types::AnalysisOptions;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum InputArg {
    Ir,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitArg {
    Ir,
    Json,
    Report,
}

#[derive(Parser, Debug)]
#[command(
    name = "sta",
    version,
    about = "Scalar type analysis — inserts the implicit casts an ONNX export needs"
)]
struct Cli {
    /// Input graph file
    source: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input format
    #[arg(long, value_enum, default_value_t = InputArg::Ir)]
    input_format: InputArg,

    /// Output form
    #[arg(long, value_enum, default_value_t = EmitArg::Ir)]
    emit: EmitArg,

    /// Keep unused side-effecting instructions during dead-code elimination
    #[arg(long)]
    preserve_side_effects: bool,

    /// Exit with failure when any warning is reported
    #[arg(long)]
    deny_warnings: bool,

    /// Print stages and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.verbose {
        eprintln!("sta: source = {}", cli.source.display());
        eprintln!("sta: emit   = {:?}", cli.emit);
    }

    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            let err = pipeline::LoadError::Read {
                path: cli.source.display().to_string(),
                source: e,
            };
            eprintln!("sta: error: {}", err);
            std::process::exit(2);
        }
    };

    let options = PipelineOptions {
        input_format: match cli.input_format {
            InputArg::Ir => InputFormat::Ir,
            InputArg::Json => InputFormat::Json,
        },
        analysis: AnalysisOptions {
            dce_policy: if cli.preserve_side_effects {
                SideEffectPolicy::Preserve
            } else {
                SideEffectPolicy::AllowDeleting
            },
        },
        verbose: cli.verbose,
    };

    let mut state = Compilation::new();
    let result = pipeline::run_pipeline(&mut state, &source, &options, |_, diags| {
        for diag in diags {
            eprintln!("sta: {}", diag);
        }
    });

    if result.is_err() {
        std::process::exit(1);
    }

    if cli.verbose {
        eprintln!(
            "sta: {} instruction(s) typed, {} constant(s) recast, {} cast(s) inserted, {} removed",
            state.stats.instructions_typed,
            state.stats.constants_recast,
            state.stats.casts_inserted,
            state.stats.instructions_removed,
        );
    }

    let emit = match cli.emit {
        EmitArg::Ir => EmitKind::Ir,
        EmitArg::Json => EmitKind::Json,
        EmitArg::Report => EmitKind::Report,
    };
    let text = match pipeline::emit(&state, emit) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("sta: error: {}", e);
            std::process::exit(2);
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &text) {
                let err = pipeline::LoadError::Write {
                    path: path.display().to_string(),
                    source: e,
                };
                eprintln!("sta: error: {}", err);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }

    if cli.deny_warnings && state.warning_count() > 0 {
        eprintln!(
            "sta: {} warning(s) reported with --deny-warnings",
            state.warning_count()
        );
        std::process::exit(1);
    }
}
