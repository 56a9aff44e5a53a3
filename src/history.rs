use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Line-oriented on-disk command history.
///
/// The REPL appends every executed line; the `history` builtin reads it
/// back, and `undo` scans it from the end for the last file-mutating
/// command and drops the entry once reverted.
#[derive(Debug, Clone)]
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Append one command line, creating the file on first use.
    pub fn append(&self, line: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("history: can't open {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("history: can't write {}", self.path.display()))?;
        Ok(())
    }

    /// All recorded entries, oldest first. A missing file is an empty history.
    pub fn entries(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("history: can't read {}", self.path.display()))?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// The last `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> Result<Vec<String>> {
        let entries = self.entries()?;
        let skip = entries.len().saturating_sub(count);
        Ok(entries.into_iter().skip(skip).collect())
    }

    /// Scan from the end for the most recent entry whose command word is one
    /// of `names`. Returns the entry index and the raw line, so the caller
    /// can run it back through the lexer.
    pub fn find_last_of(&self, names: &[&str]) -> Result<Option<(usize, String)>> {
        let entries = self.entries()?;
        for (index, line) in entries.iter().enumerate().rev() {
            if let Some(command) = line.split_whitespace().next()
                && names.contains(&command)
            {
                return Ok(Some((index, line.clone())));
            }
        }
        Ok(None)
    }

    /// Remove the entry at `index`, rewriting the file.
    pub fn remove(&self, index: usize) -> Result<()> {
        let mut entries = self.entries()?;
        if index < entries.len() {
            entries.remove(index);
        }
        let mut text = entries.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&self.path, text)
            .with_context(|| format!("history: can't rewrite {}", self.path.display()))?;
        Ok(())
    }
}
