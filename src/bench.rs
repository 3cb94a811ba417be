//! Partition sweep benchmarking.
//!
//! For each partition spec the pristine source is rewritten with every
//! kernel confined to that spec, rebuilt, and timed over several runs.
//! Process orchestration (build, run) lives in the CLI; this module holds
//! the plan, the backup handling, and the statistics.

use std::path::{Path, PathBuf};

use statrs::statistics::Statistics;

use crate::diagnostic::Diagnostic;
use crate::directive::{parse_directives, DirectiveError};
use crate::rewrite::{rewrite_file, MatchReport, RewriteOptions};
use crate::span::Span;

/// Number of TPCs swept by default (`1-1` through `1-7`).
pub const DEFAULT_TPCS: u32 = 7;
/// Timed runs per partition spec.
pub const DEFAULT_RUNS: usize = 10;

pub const CSV_HEADER: &str =
    "Exe,TPCS,Average Completion Time (seconds),Std Dev (seconds)";

/// Growing prefix sweep: `1-1`, `1-2`, ..., `1-tpcs`.
pub fn sweep(tpcs: u32) -> Vec<String> {
    (1..=tpcs).map(|last| format!("1-{}", last)).collect()
}

/// `<source>.old`, the pristine copy kept next to the source.
pub fn backup_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".old");
    PathBuf::from(name)
}

/// How the backup was set up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backup {
    /// The source was copied to a new backup.
    Created,
    /// A backup already existed and was copied back over the source.
    Restored,
}

/// Make sure a pristine backup exists and the source matches it.
pub fn prepare_backup(source: &Path) -> Result<(PathBuf, Backup), Diagnostic> {
    let backup = backup_path(source);
    if backup.exists() {
        std::fs::copy(&backup, source).map_err(|e| Diagnostic::io("restore", source, e))?;
        Ok((backup, Backup::Restored))
    } else {
        std::fs::copy(source, &backup).map_err(|e| Diagnostic::io("back up", source, e))?;
        Ok((backup, Backup::Created))
    }
}

/// Copy the backup back over the source.
pub fn restore_backup(source: &Path) -> Result<(), Diagnostic> {
    let backup = backup_path(source);
    std::fs::copy(&backup, source).map_err(|e| Diagnostic::io("restore", source, e))?;
    Ok(())
}

/// Everything needed to run one sweep.
#[derive(Clone, Debug)]
pub struct BenchPlan {
    /// The source file the build compiles.
    pub source: PathBuf,
    /// Kernels confined to each partition spec.
    pub kernels: Vec<String>,
    pub partitions: Vec<String>,
    pub runs: usize,
    /// Benchmark command, run through the shell in the source directory.
    pub command: String,
    pub build: String,
    pub clean: String,
    pub csv: PathBuf,
    pub options: RewriteOptions,
}

impl BenchPlan {
    /// Directory builds and runs happen in.
    pub fn work_dir(&self) -> PathBuf {
        match self.source.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Directives confining every kernel to `spec`.
    pub fn directives(&self, spec: &str) -> Vec<String> {
        self.kernels
            .iter()
            .map(|kernel| format!("{}:{}", kernel, spec))
            .collect()
    }

    /// Parse the directives of every partition spec, collecting all errors.
    /// Run before the source is touched.
    pub fn check_partitions(&self) -> Result<(), Vec<DirectiveError>> {
        let errors: Vec<DirectiveError> = self
            .partitions
            .iter()
            .filter_map(|spec| parse_directives(self.directives(spec)).err())
            .flatten()
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Rewrite the pristine backup into the source for `spec`.
    pub fn partition_source(&self, spec: &str) -> Result<MatchReport, Diagnostic> {
        let kernels = parse_directives(self.directives(spec)).map_err(|errors| {
            let mut diag = Diagnostic::error(
                format!("invalid partition spec `{}`", spec),
                Span::dummy(),
            );
            for err in errors {
                diag = diag.with_note(format!("{}: {}", err.directive, err.diagnostic.message));
            }
            diag
        })?;
        rewrite_file(&backup_path(&self.source), &self.source, &kernels, &self.options)
    }
}

/// Wall-clock summary of the timed runs for one spec, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub runs: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 for a single run.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Timing {
    pub fn from_samples(samples: &[f64]) -> Option<Timing> {
        if samples.is_empty() {
            return None;
        }
        let std_dev = if samples.len() > 1 {
            samples.std_dev()
        } else {
            0.0
        };
        Some(Timing {
            runs: samples.len(),
            mean: samples.mean(),
            std_dev,
            min: Statistics::min(samples),
            max: Statistics::max(samples),
        })
    }
}

/// One CSV row for `spec`.
pub fn csv_row(command: &str, spec: &str, timing: &Timing) -> String {
    format!(
        "{},{},{},{}",
        csv_field(command),
        csv_field(spec),
        timing.mean,
        timing.std_dev
    )
}

/// Quote a field holding a comma, quote or newline.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn plan(dir: &Path) -> BenchPlan {
        BenchPlan {
            source: dir.join("gaussian.cu"),
            kernels: vec!["Fan1".to_string(), "Fan2".to_string()],
            partitions: sweep(3),
            runs: 2,
            command: "./gaussian -s 16".to_string(),
            build: "make".to_string(),
            clean: "make clean".to_string(),
            csv: dir.join("out.csv"),
            options: RewriteOptions::default(),
        }
    }

    #[test]
    fn test_sweep() {
        assert_eq!(sweep(3), vec!["1-1", "1-2", "1-3"]);
        assert_eq!(sweep(DEFAULT_TPCS).len(), 7);
        assert!(sweep(0).is_empty());
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("src/gaussian.cu")),
            PathBuf::from("src/gaussian.cu.old")
        );
    }

    #[test]
    fn test_prepare_backup_creates_then_restores() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("k.cu");
        fs::write(&source, "pristine\n").unwrap();

        let (backup, kind) = prepare_backup(&source).unwrap();
        assert_eq!(kind, Backup::Created);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "pristine\n");

        fs::write(&source, "partitioned\n").unwrap();
        let (_, kind) = prepare_backup(&source).unwrap();
        assert_eq!(kind, Backup::Restored);
        assert_eq!(fs::read_to_string(&source).unwrap(), "pristine\n");
    }

    #[test]
    fn test_prepare_backup_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_backup(&dir.path().join("missing.cu")).unwrap_err();
        assert!(err.message.starts_with("cannot back up"));
    }

    #[test]
    fn test_partition_source_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        fs::write(
            &plan.source,
            "void run() {\n    Fan1<<<g, b>>>(m);\n    Fan2<<<g, b>>>(m);\n}\n",
        )
        .unwrap();
        prepare_backup(&plan.source).unwrap();

        let report = plan.partition_source("1-2").unwrap();
        assert!(report.unmatched.is_empty());
        let text = fs::read_to_string(&plan.source).unwrap();
        assert!(text.contains("    libsmctrl_set_next_mask(~0x3ull);Fan1<<<g, b>>>(m);\n"));
        assert!(text.contains("    libsmctrl_set_next_mask(~0x3ull);Fan2<<<g, b>>>(m);\n"));

        // The next spec starts from the pristine backup, not the last output.
        plan.partition_source("1-3").unwrap();
        let text = fs::read_to_string(&plan.source).unwrap();
        assert_eq!(text.matches("libsmctrl_set_next_mask").count(), 2);
        assert!(text.contains("~0x7ull"));

        restore_backup(&plan.source).unwrap();
        assert!(!fs::read_to_string(&plan.source)
            .unwrap()
            .contains("libsmctrl"));
    }

    #[test]
    fn test_partition_source_bad_spec() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let err = plan.partition_source("3-1").unwrap_err();
        assert!(err.message.contains("invalid partition spec `3-1`"));
        assert_eq!(err.notes.len(), 2);
    }

    #[test]
    fn test_check_partitions_reports_every_bad_spec() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = plan(dir.path());
        assert!(plan.check_partitions().is_ok());

        plan.partitions = vec!["1".to_string(), "3-1".to_string(), "x".to_string()];
        let errors = plan.check_partitions().unwrap_err();
        // Two kernels per bad spec.
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].directive, "Fan1:3-1");
        assert_eq!(errors[3].directive, "Fan2:x");
        assert!(!plan.source.exists());
    }

    #[test]
    fn test_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(plan(dir.path()).work_dir(), dir.path());

        let mut bare = plan(dir.path());
        bare.source = PathBuf::from("gaussian.cu");
        assert_eq!(bare.work_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_timing() {
        let t = Timing::from_samples(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.runs, 3);
        assert!((t.mean - 2.0).abs() < 1e-12);
        assert!((t.std_dev - 1.0).abs() < 1e-12);
        assert_eq!(t.min, 1.0);
        assert_eq!(t.max, 3.0);

        let single = Timing::from_samples(&[0.5]).unwrap();
        assert_eq!(single.std_dev, 0.0);
        assert!(Timing::from_samples(&[]).is_none());
    }

    #[test]
    fn test_csv_row() {
        let t = Timing::from_samples(&[1.5, 2.5]).unwrap();
        let row = csv_row("./gaussian -s 2000", "1-4", &t);
        assert!(row.starts_with("./gaussian -s 2000,1-4,2,"));
        assert_eq!(csv_row("a,b", "1", &t).split('"').count(), 3);
        assert_eq!(CSV_HEADER.split(',').count(), 4);
    }
}
