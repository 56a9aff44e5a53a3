use std::env as stdenv;
use std::path::{Path, PathBuf};

const TILDE: &str = "~";
const HISTORY_FILE: &str = ".history";
const TRASH_DIR: &str = ".trash";

/// Mutable, user-level view of the process environment used by the shell.
///
/// The environment tracks the working directory for command execution, the
/// user's home directory, the locations of the on-disk history file and the
/// trash directory used by `rm`/`undo`, and a flag the REPL checks to know
/// when to terminate.
///
/// Note: fields are public for simplicity; tests construct the struct
/// directly with paths under a temp directory.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// The user's home directory; `~` in arguments expands to it.
    pub home: PathBuf,
    /// Location of the command history file, `~/.history`.
    pub history_path: PathBuf,
    /// Location of the soft-delete trash directory, `~/.trash`.
    pub trash_dir: PathBuf,
    /// When set to true, indicates that the interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment`.
    ///
    /// `home` comes from the HOME variable, falling back to the current
    /// directory when unset; history and trash paths derive from it.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let home = stdenv::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| current_dir.clone());
        Self::with_home(home, current_dir)
    }

    /// Build an environment rooted at an explicit home directory.
    pub fn with_home(home: PathBuf, current_dir: PathBuf) -> Self {
        let history_path = home.join(HISTORY_FILE);
        let trash_dir = home.join(TRASH_DIR);
        Self {
            current_dir,
            home,
            history_path,
            trash_dir,
            should_exit: false,
        }
    }

    /// Expand a leading `~` to the home directory.
    pub fn expand_tilde(&self, raw: &str) -> String {
        if raw == TILDE {
            self.home.to_string_lossy().into_owned()
        } else if let Some(rest) = raw.strip_prefix("~/") {
            self.home.join(rest).to_string_lossy().into_owned()
        } else {
            raw.to_string()
        }
    }

    /// Resolve a user-supplied path against the current directory, with `~`
    /// expansion. Does not require the path to exist.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let expanded = self.expand_tilde(raw);
        let path = Path::new(&expanded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    /// Render the current directory for the prompt, abbreviating the home
    /// directory back to `~`.
    pub fn display_cwd(&self) -> String {
        let cwd = self.current_dir.to_string_lossy();
        let home = self.home.to_string_lossy();
        if let Some(rest) = cwd.strip_prefix(home.as_ref()) {
            format!("{TILDE}{rest}")
        } else {
            cwd.into_owned()
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
