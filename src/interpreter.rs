use crate::builtin::{Cat, Cd, Cp, Grep, HistoryCmd, Ls, Mv, Rm, Undo, Zip};
use crate::command::{CommandError, ExitCode, ShellCommand};
use crate::env::Environment;
use crate::history::History;
use crate::lexer::split_line;
use crate::parser::parse_arguments;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{Read, Write};

const EXIT_COMMAND: &str = "exit";

/// The interactive shell: a registry of builtin commands behind a
/// line-by-line loop.
///
/// Each input line is logged to the history file, split by the lexer,
/// dispatched to the named command, and parsed against that command's
/// option set. Command failures are printed, not fatal.
///
/// Example
/// ```
/// use rshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("ls", &[]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn ShellCommand>>,
}

impl Interpreter {
    pub fn new(commands: Vec<Box<dyn ShellCommand>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    /// Run a single command invocation by name, wired to the real stdin
    /// and stdout.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        let tokens: Vec<String> = args.iter().map(|a| self.env.expand_tilde(a)).collect();
        self.dispatch(name, &tokens, &mut std::io::stdin().lock(), &mut std::io::stdout())
    }

    fn dispatch(
        &mut self,
        name: &str,
        tokens: &[String],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let command = self
            .commands
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        let args = parse_arguments(&command.options(), tokens)?;
        command.run(&args, stdin, stdout, &mut self.env)
    }

    fn execute_line(&mut self, line: &str) {
        let words = match split_line(line) {
            Ok(words) => words,
            Err(err) => {
                println!("{err}");
                tracing::error!("lexer: {err}");
                return;
            }
        };
        let Some((name, rest)) = words.split_first() else {
            return;
        };
        if name == EXIT_COMMAND {
            self.env.should_exit = true;
            return;
        }

        let tokens: Vec<String> = rest.iter().map(|w| self.env.expand_tilde(w)).collect();
        let name = name.clone();
        match self.dispatch(&name, &tokens, &mut std::io::stdin().lock(), &mut std::io::stdout()) {
            Ok(code) => {
                tracing::info!("{name}: exit code {code}");
            }
            Err(err) => {
                println!("{err}");
                tracing::error!("{name}: {err}");
            }
        }
    }

    /// The read-eval-print loop. Runs until `exit`, Ctrl-C or Ctrl-D.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let history = History::new(&self.env.history_path);

        loop {
            let prompt = format!("➜ {} ", self.env.display_cwd());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)?;
                    if let Err(err) = history.append(line) {
                        tracing::error!("history: {err}");
                    }
                    self.execute_line(line);
                    if self.env.should_exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    println!("readline error: {err:?}");
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Default for Interpreter {
    /// The full builtin set: `ls`, `cd`, `cat`, `cp`, `mv`, `rm`, `grep`,
    /// `zip`, `history` and `undo`.
    fn default() -> Self {
        Self::new(vec![
            Box::new(Ls),
            Box::new(Cd),
            Box::new(Cat),
            Box::new(Cp),
            Box::new(Mv),
            Box::new(Rm),
            Box::new(Grep),
            Box::new(Zip),
            Box::new(HistoryCmd),
            Box::new(Undo),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_interpreter(tag: &str) -> (PathBuf, Interpreter) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut dir = std::env::temp_dir();
        dir.push(format!("rshell_interp_{tag}_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&dir).expect("create temp dir");

        let mut interp = Interpreter::default();
        interp.env = Environment::with_home(dir.clone(), dir.clone());
        (dir, interp)
    }

    fn dispatch_capture(
        interp: &mut Interpreter,
        name: &str,
        raw: &[&str],
    ) -> anyhow::Result<(ExitCode, String)> {
        let tokens: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        let code = interp.dispatch(name, &tokens, &mut Cursor::new(Vec::new()), &mut out)?;
        Ok((code, String::from_utf8(out).expect("utf8")))
    }

    #[test]
    fn dispatches_to_the_named_command() {
        let (dir, mut interp) = test_interpreter("dispatch");
        fs::write(dir.join("note.txt"), "hello\n").unwrap();

        let (code, out) = dispatch_capture(&mut interp, "cat", &["note.txt"]).unwrap();
        assert_eq!(code, 0);
        assert_eq!(out, "hello\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let (dir, mut interp) = test_interpreter("unknown");
        let err = dispatch_capture(&mut interp, "frobnicate", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn parse_errors_surface_from_dispatch() {
        let (dir, mut interp) = test_interpreter("parse_err");
        let err = dispatch_capture(&mut interp, "ls", &["-q"]).unwrap_err();
        assert!(err.to_string().contains("unknown option"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn execute_line_handles_exit() {
        let (dir, mut interp) = test_interpreter("exit");
        interp.execute_line("exit");
        assert!(interp.env.should_exit);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn execute_line_expands_tilde_in_arguments() {
        let (dir, mut interp) = test_interpreter("tilde");
        fs::write(dir.join("home.txt"), "x").unwrap();

        let home = interp.env.expand_tilde("~/home.txt");
        assert_eq!(PathBuf::from(home), dir.join("home.txt"));

        let _ = fs::remove_dir_all(dir);
    }
}
