//! An interactive file-command shell with its own option-parsing engine.
//!
//! The crate provides a small set of Unix-like builtin commands (`ls`,
//! `cd`, `cat`, `cp`, `mv`, `rm`, `grep`, `zip`, `history`, `undo`) and
//! the declarative argument parser they share: each command describes its
//! options as [`parser::OptionSpec`] values, and [`parser::parse_arguments`]
//! turns a token stream into [`parser::ParsedArguments`] or a precise
//! [`parser::ParseError`].
//!
//! The main entry point is [`Interpreter`], which dispatches commands by
//! name and drives the read-eval-print loop. Deleted files land in a trash
//! directory so the `undo` builtin can restore them.

mod builtin;
pub mod command;
pub mod env;
mod history;
mod interpreter;
mod lexer;
pub mod parser;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
