//! Partition sets and the libsmctrl mask literals derived from them.
//!
//! libsmctrl takes a *disable* mask: bit `i-1` set means partition `i` is
//! off for the launch. A [`Mask`] is therefore the complement of the
//! requested [`PartitionSet`], rendered as `~0x<hex>ull`.

use std::collections::BTreeSet;
use std::fmt;

/// Highest partition index representable in a 64-bit mask.
pub const MAX_PARTITION: u32 = 64;

/// A non-empty set of 1-based partition (TPC/SM) indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionSet {
    indices: BTreeSet<u32>,
}

impl PartitionSet {
    /// Build a set from indices. Returns `None` for an empty input or any
    /// index outside `1..=MAX_PARTITION`.
    pub fn new(indices: impl IntoIterator<Item = u32>) -> Option<Self> {
        let indices: BTreeSet<u32> = indices.into_iter().collect();
        if indices.is_empty() {
            return None;
        }
        if indices.iter().any(|&i| i == 0 || i > MAX_PARTITION) {
            return None;
        }
        Some(Self { indices })
    }

    /// Inclusive range `first..=last`.
    pub fn range(first: u32, last: u32) -> Option<Self> {
        if last < first {
            return None;
        }
        Self::new(first..=last)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Bits of the enabled partitions (before complementing).
    fn enabled_bits(&self) -> u64 {
        self.indices
            .iter()
            .fold(0u64, |acc, &index| acc | (1u64 << (index - 1)))
    }
}

impl Default for PartitionSet {
    /// Partition 1 only.
    fn default() -> Self {
        Self {
            indices: BTreeSet::from([1]),
        }
    }
}

impl fmt::Display for PartitionSet {
    /// Compact form: runs of consecutive indices collapse to `a-b`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let mut iter = self.indices.iter().copied().peekable();
        while let Some(first) = iter.next() {
            let mut last = first;
            while iter.peek() == Some(&(last + 1)) {
                last += 1;
                iter.next();
            }
            if first == last {
                parts.push(first.to_string());
            } else {
                parts.push(format!("{}-{}", first, last));
            }
        }
        write!(f, "{}", parts.join(","))
    }
}

/// A libsmctrl disable mask: `~(enabled bits)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mask {
    enabled: u64,
}

impl Mask {
    /// Compute the mask that leaves exactly `partitions` enabled.
    pub fn for_partitions(partitions: &PartitionSet) -> Self {
        Self {
            enabled: partitions.enabled_bits(),
        }
    }

    /// The raw disable mask value passed to libsmctrl at runtime.
    pub fn value(&self) -> u64 {
        !self.enabled
    }

    /// Partitions left enabled by this mask, ascending.
    pub fn enabled_partitions(&self) -> Vec<u32> {
        (0..MAX_PARTITION)
            .filter(|bit| self.enabled & (1u64 << bit) != 0)
            .map(|bit| bit + 1)
            .collect()
    }

    /// Parse a literal in the rendered `~0x<hex>ull` form.
    pub fn parse(literal: &str) -> Option<Self> {
        let hex = literal
            .trim()
            .strip_prefix("~0x")?
            .strip_suffix("ull")?;
        if hex.is_empty() {
            return None;
        }
        let enabled = u64::from_str_radix(hex, 16).ok()?;
        Some(Self { enabled })
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{:#x}ull", self.enabled)
    }
}
