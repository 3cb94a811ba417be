//! Insert libsmctrl partition masks ahead of CUDA kernel launches.
//!
//! Directives like `Fan1:1-4` are resolved to disable masks, then a source
//! file is streamed through the statement rewriter, which places a
//! `libsmctrl_set_next_mask(...)` call in front of every live launch of a
//! mapped kernel.

pub mod bench;
pub mod diagnostic;
pub mod directive;
pub mod mask;
pub mod project;
pub mod rewrite;
pub mod smctrl;
pub mod span;

pub use directive::{parse_directives, KernelDirective, KernelMap};
pub use mask::{Mask, PartitionSet};
pub use rewrite::{rewrite, rewrite_file, rewrite_str, MatchReport, RewriteOptions};
