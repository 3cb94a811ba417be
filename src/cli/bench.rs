use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::Args;

use tpcmask::bench::{
    csv_row, prepare_backup, restore_backup, sweep, Backup, BenchPlan, Timing, CSV_HEADER,
    DEFAULT_RUNS, DEFAULT_TPCS,
};
use tpcmask::diagnostic::Diagnostic;
use tpcmask::directive::render_directive_errors;
use tpcmask::rewrite::LaunchMode;
use tpcmask::span::Span;

use super::{exit_with, load_project};

#[derive(Args)]
pub struct BenchArgs {
    /// The CUDA source file the build compiles
    pub source: PathBuf,
    /// Kernels to confine to each partition spec
    #[arg(short, long, num_args = 1.., value_name = "NAME")]
    pub kernels: Vec<String>,
    /// Sweep 1-1 through 1-N (ignored when --partitions is given)
    #[arg(long, value_name = "N")]
    pub tpcs: Option<u32>,
    /// Explicit partition specs to benchmark
    #[arg(long, num_args = 1.., value_name = "SPEC")]
    pub partitions: Vec<String>,
    /// Timed runs per partition spec
    #[arg(long)]
    pub runs: Option<usize>,
    /// Benchmark command, run in the source directory
    #[arg(long)]
    pub command: Option<String>,
    /// Build command (default: make)
    #[arg(long)]
    pub build: Option<String>,
    /// Clean command (default: make clean)
    #[arg(long)]
    pub clean: Option<String>,
    /// CSV output (default: partition_performance.csv)
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,
    /// Project file (default: tpcmask.toml next to the source or above it)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Use stream masks for launches that name a stream
    #[arg(long)]
    pub stream: bool,
}

pub fn cmd_bench(args: BenchArgs) {
    let plan = resolve_plan(args);

    if let Err(errors) = plan.check_partitions() {
        render_directive_errors(&errors);
        eprintln!("error: invalid partition specs, nothing was run");
        process::exit(1);
    }

    let (_, backup) = match prepare_backup(&plan.source) {
        Ok(b) => b,
        Err(e) => exit_with(&e),
    };
    if backup == Backup::Restored {
        eprintln!(".old source file found, backup will be used.");
    }

    if let Err(e) = std::fs::write(&plan.csv, format!("{}\n", CSV_HEADER)) {
        fail(&plan, &Diagnostic::io("write", &plan.csv, e));
    }

    let work_dir = plan.work_dir();
    for spec in &plan.partitions {
        eprintln!("== partitions {} ==", spec);
        match plan.partition_source(spec) {
            Ok(report) => {
                if let Some(warning) = report.unmatched_warning() {
                    warning.render("", "");
                }
            }
            Err(e) => fail(&plan, &e),
        }

        // A failing clean usually just means there was nothing to clean.
        if let Err(msg) = run_shell(&plan.clean, &work_dir) {
            eprintln!("warning: {}", msg);
        }
        if let Err(msg) = run_shell(&plan.build, &work_dir) {
            fail(&plan, &Diagnostic::error(msg, Span::dummy()));
        }

        let mut samples = Vec::with_capacity(plan.runs);
        for run in 0..plan.runs {
            match run_shell(&plan.command, &work_dir) {
                Ok(secs) => {
                    eprintln!("  run {}: {:.4} s", run + 1, secs);
                    samples.push(secs);
                }
                Err(msg) => fail(&plan, &Diagnostic::error(msg, Span::dummy())),
            }
        }

        let Some(timing) = Timing::from_samples(&samples) else {
            continue;
        };
        eprintln!(
            "  average {:.4} s (std dev {:.4} s, min {:.4} s, max {:.4} s)",
            timing.mean, timing.std_dev, timing.min, timing.max
        );
        if let Err(e) = append_row(&plan.csv, &csv_row(&plan.command, spec, &timing)) {
            fail(&plan, &Diagnostic::io("write", &plan.csv, e));
        }
    }

    if let Err(e) = restore_backup(&plan.source) {
        exit_with(&e);
    }
    eprintln!("Results written to {}", plan.csv.display());
}

/// Command line over project file over defaults.
fn resolve_plan(args: BenchArgs) -> BenchPlan {
    let project = load_project(args.config.as_deref(), &args.source);
    let bench = project.bench.clone();

    let kernels = if args.kernels.is_empty() {
        // Kernel names from [kernels]; their specs are replaced per sweep step.
        project
            .kernels
            .iter()
            .filter_map(|d| d.split_once(':').map(|(name, _)| name.to_string()))
            .collect()
    } else {
        args.kernels
    };
    if kernels.is_empty() {
        eprintln!("error: no kernels given (use -k or a [kernels] section)");
        process::exit(1);
    }

    let partitions = if !args.partitions.is_empty() {
        args.partitions
    } else if let Some(n) = args.tpcs {
        sweep(n)
    } else if !bench.partitions.is_empty() {
        bench.partitions
    } else {
        sweep(DEFAULT_TPCS)
    };

    let Some(command) = args.command.or(bench.command) else {
        eprintln!("error: no benchmark command given (use --command or [bench] command)");
        process::exit(1);
    };

    let runs = args.runs.or(bench.runs).unwrap_or(DEFAULT_RUNS);
    if runs == 0 {
        eprintln!("error: the run count must be at least 1");
        process::exit(1);
    }

    let mut options = project.rewrite_options();
    if args.stream {
        options.launch_mode = LaunchMode::Stream;
    }

    BenchPlan {
        source: args.source,
        kernels,
        partitions,
        runs,
        command,
        build: args.build.or(bench.build).unwrap_or_else(|| "make".to_string()),
        clean: args
            .clean
            .or(bench.clean)
            .unwrap_or_else(|| "make clean".to_string()),
        csv: args
            .csv
            .or(bench.csv)
            .unwrap_or_else(|| PathBuf::from("partition_performance.csv")),
        options,
    }
}

/// Put the pristine source back before exiting on an error.
fn fail(plan: &BenchPlan, diag: &Diagnostic) -> ! {
    diag.render("", "");
    if let Err(e) = restore_backup(&plan.source) {
        e.render("", "");
    }
    process::exit(1);
}

/// Run `cmd` through the shell in `dir`, returning wall-clock seconds.
fn run_shell(cmd: &str, dir: &Path) -> Result<f64, String> {
    let start = std::time::Instant::now();
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(dir)
        .status()
        .map_err(|e| format!("failed to run `{}`: {}", cmd, e))?;
    let elapsed = start.elapsed().as_secs_f64();

    if !status.success() {
        return Err(format!("`{}` failed with {}", cmd, status));
    }
    Ok(elapsed)
}

fn append_row(csv: &Path, row: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(csv)?;
    writeln!(file, "{}", row)
}
