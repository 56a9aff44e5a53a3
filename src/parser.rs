//! Option declaration and argument parsing for the shell's builtin commands.
//!
//! Every command declares the set of options it accepts as [`OptionSpec`]
//! values and hands the tokenized remainder of the command line to
//! [`parse_arguments`]. The engine classifies each token as positional or
//! option, expands combined short-option clusters (`-lar`), binds values to
//! value-requiring options and enforces repeatability, returning a
//! [`ParsedArguments`] or the first [`ParseError`] encountered.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

const OPTION_PREFIX: char = '-';
const SENTINEL: &str = "--";

/// Immutable descriptor of one command-line option.
///
/// An option has a short spelling (`-p`), a long spelling (`--pattern`), a
/// human-readable description used for `--help` output, and two grammar
/// flags: whether the option binds the following token as its value, and
/// whether it may be supplied more than once.
///
/// The pair `(short, long)` must be unique within one declared option set;
/// the engine does not deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionSpec {
    /// Human-readable description shown in help output.
    pub description: String,
    /// Short spelling: `-` followed by exactly one character.
    pub short: String,
    /// Long spelling: `--` followed by a name.
    pub long: String,
    /// When true, the next token is consumed as this option's value.
    pub requires_value: bool,
    /// When true, the option may appear more than once; the last value wins.
    pub repeatable: bool,
}

impl OptionSpec {
    pub fn new(
        description: &str,
        short: &str,
        long: &str,
        requires_value: bool,
        repeatable: bool,
    ) -> Self {
        Self {
            description: description.to_string(),
            short: short.to_string(),
            long: long.to_string(),
            requires_value,
            repeatable,
        }
    }
}

/// The result of one successful parse.
///
/// Matched options are recorded under their canonical key — the declared
/// option's long spelling — regardless of how the user spelled them, so
/// `-l` and `--list` are the same entry. An option never appears in both
/// `flags` and `values`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedArguments {
    /// Positional tokens in encounter order, excluding consumed option values.
    pub positional: Vec<String>,
    /// Matched options that carry no value, keyed by long spelling.
    pub flags: HashSet<String>,
    /// Matched options with their bound value, keyed by long spelling.
    pub values: HashMap<String, String>,
}

impl ParsedArguments {
    /// True when the option with the given long spelling matched, with or
    /// without a value.
    pub fn is_set(&self, long: &str) -> bool {
        self.flags.contains(long) || self.values.contains_key(long)
    }

    /// The bound value of a value-requiring option, if it matched.
    pub fn value_of(&self, long: &str) -> Option<&str> {
        self.values.get(long).map(String::as_str)
    }
}

/// Errors raised while parsing command arguments.
///
/// This is a closed set: no other failure kind originates from the engine.
/// The engine fails fast on the first violation and never exposes a partial
/// result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A token, or a member of a combined cluster, matches no declared option.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// A combined cluster contains a value-requiring option anywhere but the
    /// last position. Carries the whole cluster token.
    #[error("invalid option position: {0}")]
    InvalidOptionPosition(String),

    /// A token expected to be an option is not one.
    #[error("unexpected token while parsing: {0}")]
    UnexpectedToken(String),

    /// A value-requiring option has no following token to bind, or the
    /// following token is itself option-shaped.
    #[error("no value supplied for option {0}")]
    MissingOptionValue(String),

    /// A non-repeatable option appeared more than once, in any spelling.
    #[error("this option can't be repeated: {0}")]
    OptionRepeated(String),

    /// The cursor was advanced past the end of the token list. Guards
    /// against engine bugs; not reachable from well-formed input.
    #[error("cursor advanced past the end of the argument list")]
    CursorOutOfRange,
}

/// Parse a token list against a declared option set.
///
/// A single left-to-right pass with one cursor and no backtracking. All
/// lookup and cursor state is local to the call, so the function is
/// deterministic and side-effect free — the undo feature relies on replaying
/// historical command lines through it.
///
/// The sentinel token `--` permanently switches the parser into
/// positional-only mode; the sentinel itself is not emitted.
pub fn parse_arguments(
    options: &[OptionSpec],
    tokens: &[String],
) -> Result<ParsedArguments, ParseError> {
    ArgParser::new(options, tokens).run()
}

/// True for tokens the grammar treats as options: a `-` followed by at
/// least one more character. A lone `-` is positional (it conventionally
/// names stdin).
fn is_option_shaped(token: &str) -> bool {
    token.starts_with(OPTION_PREFIX) && token.len() > 1
}

/// Single options name exactly one declared option: `-x`, or any `--name`.
fn is_single_option(token: &str) -> bool {
    token.len() == 2 || token.starts_with(SENTINEL)
}

struct ArgParser<'a> {
    tokens: &'a [String],
    pos: usize,
    positional_only: bool,
    lookup: HashMap<&'a str, &'a OptionSpec>,
    result: ParsedArguments,
}

impl<'a> ArgParser<'a> {
    fn new(options: &'a [OptionSpec], tokens: &'a [String]) -> Self {
        let mut lookup = HashMap::with_capacity(options.len() * 2);
        for spec in options {
            lookup.insert(spec.short.as_str(), spec);
            lookup.insert(spec.long.as_str(), spec);
        }
        ArgParser {
            tokens,
            pos: 0,
            positional_only: false,
            lookup,
            result: ParsedArguments::default(),
        }
    }

    fn run(mut self) -> Result<ParsedArguments, ParseError> {
        while self.pos < self.tokens.len() {
            let token = self.current()?.to_string();
            self.pos += 1;

            if self.positional_only {
                self.result.positional.push(token);
            } else if token == SENTINEL {
                self.positional_only = true;
            } else if is_option_shaped(&token) {
                self.parse_option(&token)?;
            } else {
                self.result.positional.push(token);
            }
        }
        Ok(self.result)
    }

    fn current(&self) -> Result<&str, ParseError> {
        self.tokens
            .get(self.pos)
            .map(String::as_str)
            .ok_or(ParseError::CursorOutOfRange)
    }

    fn parse_option(&mut self, token: &str) -> Result<(), ParseError> {
        if !is_option_shaped(token) {
            return Err(ParseError::UnexpectedToken(token.to_string()));
        }
        if is_single_option(token) {
            self.parse_single(token)
        } else {
            self.parse_cluster(token)
        }
    }

    fn parse_single(&mut self, spelling: &str) -> Result<(), ParseError> {
        let spec = self.lookup_spec(spelling)?;
        self.check_repeat(spec, spelling)?;
        self.record(spec, spelling)
    }

    /// Expand `-xyz` into `-x -y -z`. Non-final members must not require a
    /// value; the constraint is checked before any value is consumed, so a
    /// misplaced value-requiring member fails without eating the next token.
    fn parse_cluster(&mut self, token: &str) -> Result<(), ParseError> {
        let members: Vec<String> = token
            .chars()
            .skip(1)
            .map(|c| format!("{OPTION_PREFIX}{c}"))
            .collect();

        let last = members.len() - 1;
        for spelling in &members[..last] {
            let spec = self.lookup_spec(spelling)?;
            if spec.requires_value {
                return Err(ParseError::InvalidOptionPosition(token.to_string()));
            }
            self.check_repeat(spec, spelling)?;
            self.result.flags.insert(spec.long.clone());
        }

        let spelling = &members[last];
        let spec = self.lookup_spec(spelling)?;
        self.check_repeat(spec, spelling)?;
        self.record(spec, spelling)
    }

    /// Record a matched option, consuming the next token as its value when
    /// the declaration requires one.
    fn record(&mut self, spec: &OptionSpec, spelling: &str) -> Result<(), ParseError> {
        if spec.requires_value {
            let value = self.take_value(spelling)?;
            self.result.values.insert(spec.long.clone(), value);
        } else {
            self.result.flags.insert(spec.long.clone());
        }
        Ok(())
    }

    fn take_value(&mut self, spelling: &str) -> Result<String, ParseError> {
        let Some(next) = self.tokens.get(self.pos) else {
            return Err(ParseError::MissingOptionValue(spelling.to_string()));
        };
        if next.starts_with(OPTION_PREFIX) {
            return Err(ParseError::MissingOptionValue(spelling.to_string()));
        }
        self.pos += 1;
        Ok(next.clone())
    }

    fn lookup_spec(&self, spelling: &str) -> Result<&'a OptionSpec, ParseError> {
        self.lookup
            .get(spelling)
            .copied()
            .ok_or_else(|| ParseError::UnknownOption(spelling.to_string()))
    }

    fn check_repeat(&self, spec: &OptionSpec, spelling: &str) -> Result<(), ParseError> {
        if !spec.repeatable
            && (self.result.flags.contains(&spec.long)
                || self.result.values.contains_key(&spec.long))
        {
            return Err(ParseError::OptionRepeated(spelling.to_string()));
        }
        Ok(())
    }
}
