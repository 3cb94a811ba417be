//! Kernel partition directives: `name:spec` → resolved mask mapping.
//!
//! Accepted partition specs:
//!
//! - `a-b`   inclusive range, `b >= a`
//! - `a,b,c` explicit list
//! - `a`     single partition
//!
//! Any malformed directive is fatal. Parsing reports every bad directive,
//! but never returns a partial mapping.

use std::collections::BTreeMap;

use crate::diagnostic::Diagnostic;
use crate::mask::{Mask, PartitionSet, MAX_PARTITION};
use crate::span::Span;

/// One resolved directive: kernel name and the partitions it may use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelDirective {
    pub name: String,
    pub partitions: PartitionSet,
    pub mask: Mask,
}

impl KernelDirective {
    pub fn new(name: String, partitions: PartitionSet) -> Self {
        let mask = Mask::for_partitions(&partitions);
        Self {
            name,
            partitions,
            mask,
        }
    }
}

/// Kernel name → directive. A later directive for the same kernel replaces
/// the earlier one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelMap {
    directives: BTreeMap<String, KernelDirective>,
}

impl KernelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `directive`, replacing any earlier one for the same kernel.
    pub fn insert(&mut self, directive: KernelDirective) {
        self.directives.insert(directive.name.clone(), directive);
    }

    pub fn get(&self, kernel: &str) -> Option<&KernelDirective> {
        self.directives.get(kernel)
    }

    pub fn mask(&self, kernel: &str) -> Option<Mask> {
        self.get(kernel).map(|d| d.mask)
    }

    /// Kernel names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.directives.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelDirective> {
        self.directives.values()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// A rejected directive together with the raw text it was parsed from, so
/// the diagnostic span can be rendered against it.
#[derive(Clone, Debug)]
pub struct DirectiveError {
    pub directive: String,
    pub diagnostic: Diagnostic,
}

impl DirectiveError {
    pub fn render(&self) {
        self.diagnostic.render("<directive>", &self.directive);
    }
}

/// Render a list of directive errors.
pub fn render_directive_errors(errors: &[DirectiveError]) {
    for err in errors {
        err.render();
    }
}

/// Parse all directives. Returns every error found, or the full mapping.
pub fn parse_directives<I, S>(raw: I) -> Result<KernelMap, Vec<DirectiveError>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = KernelMap::new();
    let mut errors = Vec::new();

    for directive in raw {
        let directive = directive.as_ref();
        match parse_directive(directive) {
            Ok(d) => map.insert(d),
            Err(diagnostic) => errors.push(DirectiveError {
                directive: directive.to_string(),
                diagnostic,
            }),
        }
    }

    if errors.is_empty() {
        Ok(map)
    } else {
        Err(errors)
    }
}

/// Parse one `name:spec` directive.
pub fn parse_directive(raw: &str) -> Result<KernelDirective, Diagnostic> {
    let Some((name, spec)) = raw.split_once(':') else {
        return Err(Diagnostic::error(
            "expected `kernel_name:partitions`".to_string(),
            Span::at(0, raw.len()),
        )
        .with_help("e.g. `my_kernel:1-4`, `my_kernel:1,4` or `my_kernel:2`".to_string()));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(Diagnostic::error(
            "missing kernel name".to_string(),
            Span::at(0, 1),
        ));
    }

    let offset = raw.len() - spec.len();
    let partitions = parse_partition_spec(spec, offset)?;
    Ok(KernelDirective::new(name.to_string(), partitions))
}

/// Parse a partition spec (`a-b`, `a,b,c` or `a`). `offset` is the byte
/// position of `spec` inside the text diagnostics are rendered against.
pub fn parse_partition_spec(spec: &str, offset: usize) -> Result<PartitionSet, Diagnostic> {
    if spec.contains('-') {
        let bounds: Vec<(usize, &str)> = pieces(spec, '-', offset);
        if bounds.len() != 2 {
            return Err(Diagnostic::error(
                "range can only have 2 values, beginning and end".to_string(),
                Span::at(offset, spec.len()),
            ));
        }
        let first = parse_index(bounds[0].1, bounds[0].0)?;
        let last = parse_index(bounds[1].1, bounds[1].0)?;
        return PartitionSet::range(first, last).ok_or_else(|| {
            Diagnostic::error(
                format!("descending range {}-{}", first, last),
                Span::at(offset, spec.len()),
            )
            .with_note("in range x-y, y must not be smaller than x".to_string())
        });
    }

    let mut indices = Vec::new();
    for (start, token) in pieces(spec, ',', offset) {
        indices.push(parse_index(token, start)?);
    }
    // Indices are already range-checked, so only an empty list can fail.
    PartitionSet::new(indices).ok_or_else(|| {
        Diagnostic::error(
            "no partitions given".to_string(),
            Span::at(offset, spec.len().max(1)),
        )
    })
}

/// Split `text` on `sep`, keeping each piece's absolute byte offset.
fn pieces(text: &str, sep: char, offset: usize) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    for piece in text.split(sep) {
        out.push((offset + start, piece));
        start += piece.len() + sep.len_utf8();
    }
    out
}

fn parse_index(token: &str, start: usize) -> Result<u32, Diagnostic> {
    let span = Span::at(start, token.len().max(1));
    let index: u32 = token.trim().parse().map_err(|_| {
        Diagnostic::error(format!("`{}` is not an integer", token.trim()), span)
    })?;
    if index == 0 || index > MAX_PARTITION {
        return Err(Diagnostic::error(
            format!("partition {} out of range", index),
            span,
        )
        .with_note(format!(
            "partitions are numbered from 1 to {}",
            MAX_PARTITION
        )));
    }
    Ok(index)
}
