//! Statement-level rewriting of CUDA sources.
//!
//! Each physical line is split into statements on `;`. Comment state is
//! advanced per statement, and a live statement launching a mapped kernel
//! gets a masking call inserted in front of it:
//!
//! ```text
//!     Fan1<<<grid, block>>>(m, a, n);
//! ```
//! becomes
//! ```text
//!     libsmctrl_set_next_mask(~0xfull);Fan1<<<grid, block>>>(m, a, n);
//! ```
//!
//! Splitting on `;` is not a lexer: a `;` inside a string literal, or a
//! statement holding several comment tokens, is classified as if the
//! tokens were in statement order. Launches must sit on one physical line.

mod chunk;
mod launch;
mod scan;


use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::directive::KernelMap;
use crate::mask::{Mask, PartitionSet};
use crate::smctrl::{self, MaskCall};
use crate::span::Span;

pub use chunk::{LineChunks, DEFAULT_CHUNK_BYTES};
pub use launch::{leading_whitespace, parse_launch, Launch, LAUNCH_MARKER};
pub use scan::ScanState;

const STATEMENT_END: &str = ";";

/// Which libsmctrl call guards a matched launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LaunchMode {
    /// `libsmctrl_set_next_mask` before every launch.
    #[default]
    Next,
    /// `libsmctrl_set_stream_mask` when the launch names a stream,
    /// otherwise `libsmctrl_set_next_mask`.
    Stream,
}

impl LaunchMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "next" => Some(LaunchMode::Next),
            "stream" => Some(LaunchMode::Stream),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RewriteOptions {
    /// Read budget per chunk, in bytes.
    pub chunk_bytes: usize,
    pub launch_mode: LaunchMode,
    /// Partitions left enabled by the prologue's global mask.
    pub global: PartitionSet,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            launch_mode: LaunchMode::Next,
            global: PartitionSet::default(),
        }
    }
}

/// A launch that received a masking call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchMatch {
    pub kernel: String,
    /// 1-based physical line in the input.
    pub line: usize,
    /// The launch statement, trimmed.
    pub statement: String,
    pub call: MaskCall,
}

/// Outcome of one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub matches: Vec<LaunchMatch>,
    /// Mapped kernels never launched in live code, sorted.
    pub unmatched: Vec<String>,
    /// Physical lines scanned.
    pub lines: usize,
}

impl MatchReport {
    /// Warning naming every kernel that was never matched, if any.
    pub fn unmatched_warning(&self) -> Option<Diagnostic> {
        if self.unmatched.is_empty() {
            return None;
        }
        Some(
            Diagnostic::warning(
                format!("couldn't find kernels: {}", self.unmatched.join(", ")),
                Span::dummy(),
            )
            .with_note(
                "no live launch of these kernels was found; their masks were not inserted"
                    .to_string(),
            ),
        )
    }
}

/// Streaming rewriter. One instance per file pass.
pub struct Rewriter<'a> {
    kernels: &'a KernelMap,
    options: &'a RewriteOptions,
    state: ScanState,
    matches: Vec<LaunchMatch>,
}

impl<'a> Rewriter<'a> {
    pub fn new(kernels: &'a KernelMap, options: &'a RewriteOptions) -> Self {
        Self {
            kernels,
            options,
            state: ScanState::new(kernels),
            matches: Vec::new(),
        }
    }

    /// Text written ahead of the source.
    pub fn prologue(&self) -> String {
        smctrl::prologue(Mask::for_partitions(&self.options.global))
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Rewrite one physical line (terminator included, if any).
    pub fn rewrite_line(&mut self, line: &str) -> String {
        self.state.start_line();
        let mut statements: Vec<String> = Vec::new();
        for statement in line.split(STATEMENT_END) {
            self.rewrite_statement(statement, &mut statements);
        }
        statements.join(STATEMENT_END)
    }

    /// Rewrite a chunk of lines in place.
    pub fn rewrite_chunk(&mut self, lines: &mut [String]) {
        for line in lines.iter_mut() {
            *line = self.rewrite_line(line);
        }
    }

    fn rewrite_statement(&mut self, statement: &str, out: &mut Vec<String>) {
        self.state.advance(statement);

        let kernels = self.kernels;
        let matched = if self.state.is_live() {
            parse_launch(statement)
                .and_then(|launch| kernels.get(launch.kernel).map(|d| (launch, d)))
        } else {
            None
        };
        let Some((launch, directive)) = matched else {
            out.push(statement.to_string());
            return;
        };

        let call = match (self.options.launch_mode, launch.stream()) {
            (LaunchMode::Stream, Some(stream)) => MaskCall::Stream {
                stream: stream.to_string(),
                mask: directive.mask,
            },
            _ => MaskCall::Next(directive.mask),
        };

        let indent = leading_whitespace(statement);
        out.push(format!("{}{}", indent, call));
        out.push(statement[indent.len()..].to_string());

        self.state.mark_found(&directive.name);
        self.matches.push(LaunchMatch {
            kernel: directive.name.clone(),
            line: self.state.line_number,
            statement: statement.trim().to_string(),
            call,
        });
    }

    pub fn finish(self) -> MatchReport {
        MatchReport {
            unmatched: self.state.unmatched(),
            lines: self.state.line_number,
            matches: self.matches,
        }
    }
}

/// Rewrite `input` into `output`, reading chunks of whole lines.
pub fn rewrite<R, W>(
    kernels: &KernelMap,
    options: &RewriteOptions,
    input: R,
    output: &mut W,
) -> io::Result<MatchReport>
where
    R: BufRead,
    W: Write,
{
    let mut rewriter = Rewriter::new(kernels, options);
    output.write_all(rewriter.prologue().as_bytes())?;

    for chunk in LineChunks::new(input, options.chunk_bytes) {
        let mut lines = chunk?;
        rewriter.rewrite_chunk(&mut lines);
        for line in &lines {
            output.write_all(line.as_bytes())?;
        }
    }
    output.flush()?;

    Ok(rewriter.finish())
}

/// Rewrite an in-memory source.
pub fn rewrite_str(
    source: &str,
    kernels: &KernelMap,
    options: &RewriteOptions,
) -> (String, MatchReport) {
    let mut rewriter = Rewriter::new(kernels, options);
    let mut out = rewriter.prologue();
    for line in source.split_inclusive('\n') {
        out.push_str(&rewriter.rewrite_line(line));
    }
    (out, rewriter.finish())
}

/// Rewrite the file at `input` into `output`.
///
/// Output written before a failure is left in place.
pub fn rewrite_file(
    input: &Path,
    output: &Path,
    kernels: &KernelMap,
    options: &RewriteOptions,
) -> Result<MatchReport, Diagnostic> {
    let reader = File::open(input).map_err(|e| Diagnostic::io("read", input, e))?;
    let writer = File::create(output).map_err(|e| Diagnostic::io("write", output, e))?;

    let mut writer = BufWriter::new(writer);
    rewrite(kernels, options, BufReader::new(reader), &mut writer).map_err(|e| {
        Diagnostic::error(
            format!(
                "cannot rewrite '{}' into '{}': {}",
                input.display(),
                output.display(),
                e
            ),
            Span::dummy(),
        )
    })
}
