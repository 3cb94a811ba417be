use std::path::{Path, PathBuf};

use clap::Args;

use tpcmask::diagnostic::Diagnostic;
use tpcmask::rewrite::{rewrite_file, LaunchMode};
use tpcmask::span::Span;

use super::{exit_with, load_project, resolve_kernels};

const DEFAULT_OUTPUT: &str = "output.cu";

#[derive(Args)]
pub struct PartitionArgs {
    /// Input CUDA source file
    pub input: PathBuf,
    /// Output file (default: [rewrite] output, else output.cu)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Kernel partitions: name:1-4 (range), name:1,4 (list), name:4 (single)
    #[arg(short, long, num_args = 1.., value_name = "NAME:SPEC")]
    pub kernels: Vec<String>,
    /// Print every inserted mask
    #[arg(short, long)]
    pub verbose: bool,
    /// Project file (default: tpcmask.toml next to the input or above it)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Use stream masks for launches that name a stream
    #[arg(long)]
    pub stream: bool,
}

pub fn cmd_partition(args: PartitionArgs) {
    let project = load_project(args.config.as_deref(), &args.input);
    let kernels = resolve_kernels(&project, &args.kernels);

    let mut options = project.rewrite_options();
    if args.stream {
        options.launch_mode = LaunchMode::Stream;
    }

    let output = args
        .output
        .clone()
        .or_else(|| project.output.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    if same_file(&args.input, &output) {
        exit_with(&Diagnostic::error(
            format!("output '{}' would overwrite the input", output.display()),
            Span::dummy(),
        ));
    }

    if args.verbose {
        eprintln!("Input file: {}", args.input.display());
        eprintln!("Output file: {}", output.display());
        for directive in kernels.iter() {
            eprintln!(
                "  {} -> partitions {} ({})",
                directive.name, directive.partitions, directive.mask
            );
        }
    }

    let report = match rewrite_file(&args.input, &output, &kernels, &options) {
        Ok(report) => report,
        Err(e) => exit_with(&e),
    };

    if args.verbose {
        for m in &report.matches {
            eprintln!("kernel call {} found, line {}", m.kernel, m.line);
            eprintln!("  {}", m.statement);
        }
    }

    eprintln!(
        "Done. Parsed {} lines, inserted {} masks.",
        report.lines,
        report.matches.len()
    );

    if let Some(warning) = report.unmatched_warning() {
        warning.render("", "");
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
