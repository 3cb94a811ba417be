use std::collections::BTreeMap;

use crate::directive::KernelMap;

const LINE_COMMENT: &str = "//";
const BLOCK_OPEN: &str = "/*";
const BLOCK_CLOSE: &str = "*/";

/// Comment and match state for one pass over a file.
///
/// Lives for the whole pass: block-comment state crosses line and chunk
/// boundaries, line-comment state is cleared by [`ScanState::start_line`].
#[derive(Clone, Debug)]
pub struct ScanState {
    pub in_block_comment: bool,
    pub in_line_comment: bool,
    /// 1-based number of the physical line being scanned (0 before the first).
    pub line_number: usize,
    found: BTreeMap<String, bool>,
}

impl ScanState {
    pub fn new(kernels: &KernelMap) -> Self {
        Self {
            in_block_comment: false,
            in_line_comment: false,
            line_number: 0,
            found: kernels.names().map(|name| (name.to_string(), false)).collect(),
        }
    }

    /// Enter the next physical line.
    pub fn start_line(&mut self) {
        self.line_number += 1;
        self.in_line_comment = false;
    }

    /// Update comment state from one statement.
    ///
    /// The three checks are independent, so a statement holding both `/*`
    /// and `*/` ends up outside a block comment.
    pub fn advance(&mut self, statement: &str) {
        if statement.contains(LINE_COMMENT) && !self.in_line_comment {
            self.in_line_comment = true;
        }
        if statement.contains(BLOCK_OPEN) && !self.in_block_comment {
            self.in_block_comment = true;
        }
        if statement.contains(BLOCK_CLOSE) && self.in_block_comment {
            self.in_block_comment = false;
        }
    }

    /// Whether the current statement is live code.
    pub fn is_live(&self) -> bool {
        !self.in_block_comment && !self.in_line_comment
    }

    pub fn mark_found(&mut self, kernel: &str) {
        if let Some(found) = self.found.get_mut(kernel) {
            *found = true;
        }
    }

    pub fn is_found(&self, kernel: &str) -> bool {
        self.found.get(kernel).copied().unwrap_or(false)
    }

    /// Kernels never matched so far, sorted.
    pub fn unmatched(&self) -> Vec<String> {
        self.found
            .iter()
            .filter(|(_, &found)| !found)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
