use std::io::{self, BufRead};

/// Default read budget per chunk, in bytes.
pub const DEFAULT_CHUNK_BYTES: usize = 8000;

/// Reads whole physical lines in groups of roughly `budget` bytes.
///
/// A chunk stops at the first line that brings its size to the budget or
/// beyond, so lines are never split. Line terminators are kept.
pub struct LineChunks<R> {
    reader: R,
    budget: usize,
    done: bool,
}

impl<R: BufRead> LineChunks<R> {
    pub fn new(reader: R, budget: usize) -> Self {
        Self {
            reader,
            budget: budget.max(1),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineChunks<R> {
    type Item = io::Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut lines = Vec::new();
        let mut total = 0;
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => {
                    total += n;
                    lines.push(line);
                    if total >= self.budget {
                        break;
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        if lines.is_empty() {
            None
        } else {
            Some(Ok(lines))
        }
    }
}
