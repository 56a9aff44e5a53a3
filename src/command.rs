use crate::env::Environment;
use crate::parser::{OptionSpec, ParsedArguments};
use anyhow::Result;
use std::io::{Read, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

pub const HELP_LONG: &str = "--help";

/// Object-safe trait implemented by every builtin command.
///
/// A command declares the options it accepts; the interpreter parses the
/// tokenized command line against that declaration and hands the result to
/// [`ShellCommand::run`] together with the IO streams and the environment.
/// Commands never read the terminal or mutate global state directly, which
/// keeps them testable against in-memory streams.
pub trait ShellCommand {
    /// Canonical name of the command, e.g. "ls" or "grep".
    fn name(&self) -> &'static str;

    /// The option set this command's grammar allows.
    fn options(&self) -> Vec<OptionSpec>;

    /// Execute the command.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error.
    fn run(
        &self,
        args: &ParsedArguments,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Failures raised by command bodies, as opposed to argument parsing.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("not enough arguments")]
    NotEnoughArguments,

    #[error("unexpected arguments: {}", .0.join(", "))]
    UnexpectedArguments(Vec<String>),

    #[error("not enough option: {0}")]
    MissingOption(String),

    #[error("next path is not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Render the option table for a command's `--help` output.
pub fn render_help(name: &str, options: &[OptionSpec]) -> String {
    let mut lines = vec![format!("usage: {name}")];
    let width = options
        .iter()
        .map(|o| o.short.len() + o.long.len() + 2)
        .max()
        .unwrap_or(0);
    for option in options {
        let spelled = format!("{}, {}", option.short, option.long);
        lines.push(format!("  {spelled:<width$}  {}", option.description));
    }
    lines.join("\n")
}

/// Print help and return true when the help flag was set.
pub fn help_requested(
    name: &str,
    options: &[OptionSpec],
    args: &ParsedArguments,
    stdout: &mut dyn Write,
) -> std::io::Result<bool> {
    if args.is_set(HELP_LONG) {
        writeln!(stdout, "{}", render_help(name, options))?;
        return Ok(true);
    }
    Ok(false)
}
