//! Kernel launch syntax: `name<<<grid, block, shmem, stream>>>(args)`.

/// Token that opens a launch configuration.
pub const LAUNCH_MARKER: &str = "<<<";

/// Token that closes a launch configuration.
const CONFIG_END: &str = ">>>";

/// A launch found inside one statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Launch<'s> {
    /// Identifier immediately preceding the launch marker.
    pub kernel: &'s str,
    /// Text between `<<<` and `>>>`, if the statement closes it.
    pub config: Option<&'s str>,
}

impl<'s> Launch<'s> {
    /// The stream argument (fourth launch parameter), if one is given.
    pub fn stream(&self) -> Option<&'s str> {
        let config = self.config?;
        let args = split_top_level(config);
        args.get(3).map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

/// Find the first launch in `statement` whose marker is preceded by an
/// identifier (whitespace in between is allowed).
pub fn parse_launch(statement: &str) -> Option<Launch<'_>> {
    for (pos, _) in statement.match_indices(LAUNCH_MARKER) {
        let before = statement[..pos].trim_end();
        let Some(start) = ident_start(before) else {
            continue;
        };
        let after = &statement[pos + LAUNCH_MARKER.len()..];
        let config = after.find(CONFIG_END).map(|end| &after[..end]);
        return Some(Launch {
            kernel: &before[start..],
            config,
        });
    }
    None
}

/// Leading whitespace of a statement: the indentation a masking call
/// inserted before it must reuse.
pub fn leading_whitespace(statement: &str) -> &str {
    &statement[..statement.len() - statement.trim_start().len()]
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte index where the identifier ending `text` starts.
fn ident_start(text: &str) -> Option<usize> {
    text.char_indices()
        .rev()
        .take_while(|&(_, c)| is_ident_char(c))
        .last()
        .map(|(i, _)| i)
}

/// Split on commas not nested in (), [] or {}.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
