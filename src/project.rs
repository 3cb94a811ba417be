use std::path::{Path, PathBuf};

use crate::diagnostic::Diagnostic;
use crate::directive::parse_partition_spec;
use crate::mask::PartitionSet;
use crate::rewrite::{LaunchMode, RewriteOptions};
use crate::span::Span;

/// Name of the project file looked up next to the input source.
pub const PROJECT_FILE: &str = "tpcmask.toml";

/// Project configuration from tpcmask.toml.
///
/// ```toml
/// [rewrite]
/// output = "partitioned.cu"
/// chunk_bytes = 8000
/// launch = "next"
/// global = "1"
///
/// [kernels]
/// Fan1 = "1-4"
///
/// [bench]
/// command = "./gaussian -s 2000"
/// runs = 10
/// partitions = ["1-1", "1-2"]
/// ```
#[derive(Clone, Debug, Default)]
pub struct Project {
    pub root_dir: PathBuf,
    /// Default output path, relative paths resolved against `root_dir`.
    pub output: Option<PathBuf>,
    pub chunk_bytes: Option<usize>,
    pub launch_mode: Option<LaunchMode>,
    /// Partitions the prologue's global mask leaves enabled.
    pub global: Option<PartitionSet>,
    /// `[kernels]` entries as `name:spec` directives, in file order.
    pub kernels: Vec<String>,
    pub bench: BenchSection,
}

/// The `[bench]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BenchSection {
    pub command: Option<String>,
    pub runs: Option<usize>,
    pub partitions: Vec<String>,
    pub build: Option<String>,
    pub clean: Option<String>,
    pub csv: Option<PathBuf>,
}

/// Parse a minimal TOML string array: `["a", "b", "c"]` → `vec!["a", "b", "c"]`.
fn parse_string_array(s: &str) -> Vec<String> {
    let s = s.trim();
    if !s.starts_with('[') || !s.ends_with(']') {
        return Vec::new();
    }
    let inner = &s[1..s.len() - 1];
    inner
        .split(',')
        .map(|part| part.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Drop a trailing `# comment`, leaving quoted strings and arrays intact.
fn value_text(raw: &str) -> &str {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('"') {
        return match rest.find('"') {
            Some(end) => &raw[..end + 2],
            None => raw,
        };
    }
    if raw.starts_with('[') {
        return match raw.rfind(']') {
            Some(end) => &raw[..=end],
            None => raw,
        };
    }
    raw.split('#').next().unwrap_or("").trim()
}

fn config_error(path: &Path, message: String) -> Diagnostic {
    Diagnostic::error(
        format!("{}: {}", path.display(), message),
        Span::dummy(),
    )
}

fn parse_count(path: &Path, key: &str, value: &str) -> Result<usize, Diagnostic> {
    value
        .parse()
        .map_err(|_| config_error(path, format!("`{}` must be an integer, got `{}`", key, value)))
}

impl Project {
    /// Load project from a tpcmask.toml file.
    pub fn load(toml_path: &Path) -> Result<Project, Diagnostic> {
        let content = std::fs::read_to_string(toml_path)
            .map_err(|e| Diagnostic::io("read", toml_path, e))?;

        let root_dir = toml_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let mut project = Project {
            root_dir: root_dir.clone(),
            ..Project::default()
        };

        // Section-aware minimal TOML parsing
        let mut current_section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim().trim_matches('"');
            let value = value_text(value);
            let text = value.trim_matches('"');

            match current_section.as_str() {
                "rewrite" => match key {
                    "output" => project.output = Some(root_dir.join(text)),
                    "chunk_bytes" => {
                        project.chunk_bytes = Some(parse_count(toml_path, key, text)?)
                    }
                    "launch" => {
                        let mode = LaunchMode::from_name(text).ok_or_else(|| {
                            config_error(
                                toml_path,
                                format!("unknown launch mode `{}` (expected next or stream)", text),
                            )
                        })?;
                        project.launch_mode = Some(mode);
                    }
                    "global" => {
                        let set = parse_partition_spec(text, 0).map_err(|d| {
                            config_error(toml_path, format!("global `{}`: {}", text, d.message))
                        })?;
                        project.global = Some(set);
                    }
                    _ => {}
                },
                "kernels" => project.kernels.push(format!("{}:{}", key, text)),
                "bench" => match key {
                    "command" => project.bench.command = Some(text.to_string()),
                    "runs" => project.bench.runs = Some(parse_count(toml_path, key, text)?),
                    "partitions" => project.bench.partitions = parse_string_array(value),
                    "build" => project.bench.build = Some(text.to_string()),
                    "clean" => project.bench.clean = Some(text.to_string()),
                    "csv" => project.bench.csv = Some(root_dir.join(text)),
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(project)
    }

    /// Try to find a tpcmask.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(PROJECT_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Rewrite options with project overrides applied to the defaults.
    pub fn rewrite_options(&self) -> RewriteOptions {
        let defaults = RewriteOptions::default();
        RewriteOptions {
            chunk_bytes: self.chunk_bytes.unwrap_or(defaults.chunk_bytes),
            launch_mode: self.launch_mode.unwrap_or(defaults.launch_mode),
            global: self.global.clone().unwrap_or(defaults.global),
        }
    }
}
