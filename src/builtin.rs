//! The builtin file commands.
//!
//! Each command declares its option grammar as a [`OptionSpec`] set and
//! consumes the [`ParsedArguments`] the engine produced for it. All paths
//! resolve against the environment's current directory; `rm` soft-deletes
//! into the trash directory so that `undo` can restore.

use crate::command::{help_requested, CommandError, ExitCode, ShellCommand, HELP_LONG};
use crate::env::Environment;
use crate::history::History;
use crate::lexer::split_line;
use crate::parser::{parse_arguments, OptionSpec, ParsedArguments};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use regex::RegexBuilder;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

const DIRECTORY_MARK: &str = "🗂 ";
const FILE_MARK: &str = "📄";

fn help_option() -> OptionSpec {
    OptionSpec::new("show the list of options", "-h", "--help", false, true)
}

fn recursive_option(description: &str) -> OptionSpec {
    OptionSpec::new(description, "-r", "--recursive", false, true)
}

/// Presence check that does not follow symlinks, so a dangling link still
/// counts as existing.
fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_hidden(path: &Path) -> bool {
    file_name_of(path).starts_with('.')
}

/// Move a path into the trash directory, replacing a same-named entry.
fn move_to_trash(path: &Path, env: &Environment) -> Result<()> {
    fs::create_dir_all(&env.trash_dir)
        .with_context(|| format!("can't create trash directory {}", env.trash_dir.display()))?;
    let target = env.trash_dir.join(file_name_of(path));
    if path_exists(&target) {
        if target.is_dir() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("can't replace trash entry {}", target.display()))?;
        } else {
            fs::remove_file(&target)
                .with_context(|| format!("can't replace trash entry {}", target.display()))?;
        }
    }
    fs::rename(path, &target)
        .with_context(|| format!("can't move {} to the trash", path.display()))?;
    Ok(())
}

/// Print the current working directory contents, or those of the given paths.
pub struct Ls;

impl ShellCommand for Ls {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("use the long listing format", "-l", "--list", false, true),
            OptionSpec::new("include hidden entries", "-a", "--all", false, true),
            help_option(),
        ]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }

        if args.positional.is_empty() {
            let entries = directory_entries(&env.current_dir)?;
            write_listing(stdout, &entries, args, None)?;
            return Ok(0);
        }

        let mut code = 0;
        let write_headers = args.positional.len() > 1;
        for raw in &args.positional {
            let path = env.resolve(raw);
            if !path_exists(&path) {
                writeln!(stdout, "{}", CommandError::PathNotFound(path))?;
                code = 1;
                continue;
            }
            if path.is_file() {
                writeln!(stdout, "{}", file_name_of(&path))?;
                continue;
            }
            let entries = directory_entries(&path)?;
            let header = write_headers.then(|| raw.as_str());
            write_listing(stdout, &entries, args, header)?;
        }
        Ok(code)
    }
}

fn directory_entries(path: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("ls: can't read {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries)
}

fn write_listing(
    stdout: &mut dyn Write,
    entries: &[PathBuf],
    args: &ParsedArguments,
    header: Option<&str>,
) -> Result<()> {
    if let Some(name) = header {
        writeln!(stdout, "{name}:")?;
    }
    let visible: Vec<&PathBuf> = entries
        .iter()
        .filter(|path| args.is_set("--all") || !is_hidden(path))
        .collect();

    if args.is_set("--list") {
        let align = visible
            .iter()
            .filter_map(|path| path.symlink_metadata().ok())
            .map(|meta| meta.len().to_string().len())
            .max()
            .unwrap_or(0);
        for path in &visible {
            writeln!(stdout, "{}", long_format(path, align)?)?;
        }
    } else {
        let mut line = String::new();
        for path in &visible {
            let mark = if path.is_dir() { DIRECTORY_MARK } else { FILE_MARK };
            line.push_str(mark);
            line.push_str(&file_name_of(path));
            line.push(' ');
        }
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}

fn long_format(path: &Path, align: usize) -> Result<String> {
    use std::os::unix::fs::MetadataExt;

    let meta = path
        .symlink_metadata()
        .with_context(|| format!("ls: can't stat {}", path.display()))?;
    let modified: DateTime<Local> = meta
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Local::now());
    Ok(format!(
        "{} {:>2} {:>align$} {} {}",
        mode_string(&meta),
        meta.nlink(),
        meta.len(),
        modified.format("%Y-%m-%d %H:%M:%S"),
        file_name_of(path),
    ))
}

fn mode_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;

    let kind = if meta.file_type().is_symlink() {
        'l'
    } else if meta.is_dir() {
        'd'
    } else {
        '-'
    };
    let mode = meta.mode();
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Change the current working directory. Defaults to the home directory.
pub struct Cd;

impl ShellCommand for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![help_option()]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }

        let target = match args.positional.as_slice() {
            [] => env.home.clone(),
            [one] => env.resolve(one),
            [_, rest @ ..] => {
                return Err(CommandError::UnexpectedArguments(rest.to_vec()).into());
            }
        };

        let canonical = fs::canonicalize(&target)
            .with_context(|| format!("cd: can't canonicalize {}", target.display()))?;
        std::env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

/// Print files to standard output. Takes no options.
pub struct Cat;

impl ShellCommand for Cat {
    fn name(&self) -> &'static str {
        "cat"
    }

    fn options(&self) -> Vec<OptionSpec> {
        Vec::new()
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if args.positional.is_empty() {
            return Err(CommandError::NotEnoughArguments.into());
        }
        for raw in &args.positional {
            let path = env.resolve(raw);
            if !path_exists(&path) {
                return Err(CommandError::PathNotFound(path).into());
            }
            if !path.is_file() {
                return Err(CommandError::NotAFile(path).into());
            }
            let bytes =
                fs::read(&path).with_context(|| format!("cat: can't read {}", path.display()))?;
            stdout.write_all(String::from_utf8_lossy(&bytes).as_bytes())?;
        }
        Ok(0)
    }
}

/// Copy files, or directories with `-r`. The last positional is the
/// destination.
pub struct Cp;

impl ShellCommand for Cp {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            help_option(),
            recursive_option("copy directories and their contents"),
        ]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }
        if args.positional.len() < 2 {
            return Err(CommandError::NotEnoughArguments.into());
        }

        let recursive = args.is_set("--recursive");
        let (dest_raw, source_raws) = args
            .positional
            .split_last()
            .ok_or(CommandError::NotEnoughArguments)?;
        let dest = env.resolve(dest_raw);

        let mut code = 0;
        let mut sources = Vec::new();
        for raw in source_raws {
            let path = env.resolve(raw);
            if path_exists(&path) {
                sources.push(path);
            } else {
                writeln!(stdout, "{}", CommandError::PathNotFound(path))?;
                code = 1;
            }
        }
        if sources.is_empty() {
            return Err(CommandError::NotEnoughArguments.into());
        }

        if sources.len() > 1 {
            if !path_exists(&dest) {
                return Err(CommandError::PathNotFound(dest).into());
            }
            if !dest.is_dir() {
                return Err(CommandError::NotADirectory(dest).into());
            }
        }
        for src in &sources {
            copy_one(src, &dest, recursive)?;
        }
        Ok(code)
    }
}

fn copy_one(src: &Path, dest: &Path, recursive: bool) -> Result<()> {
    let target = if dest.is_dir() {
        dest.join(file_name_of(src))
    } else {
        dest.to_path_buf()
    };
    if src.is_dir() {
        if !recursive {
            return Err(CommandError::MissingOption("-r".to_string()).into());
        }
        copy_tree(src, &target)
    } else {
        fs::copy(src, &target).with_context(|| {
            format!("cp: can't copy {} to {}", src.display(), target.display())
        })?;
        Ok(())
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)
        .with_context(|| format!("cp: can't create {}", dest.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("cp: can't read {}", src.display()))? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("cp: can't copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Move or rename files and directories. The last positional is the
/// destination.
pub struct Mv;

impl ShellCommand for Mv {
    fn name(&self) -> &'static str {
        "mv"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![help_option()]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }
        if args.positional.len() < 2 {
            return Err(CommandError::NotEnoughArguments.into());
        }

        let (dest_raw, source_raws) = args
            .positional
            .split_last()
            .ok_or(CommandError::NotEnoughArguments)?;
        let dest = env.resolve(dest_raw);

        if source_raws.len() > 1 {
            if !path_exists(&dest) {
                return Err(CommandError::PathNotFound(dest).into());
            }
            if !dest.is_dir() {
                return Err(CommandError::NotADirectory(dest).into());
            }
        }

        let mut code = 0;
        for raw in source_raws {
            let src = env.resolve(raw);
            if !path_exists(&src) {
                writeln!(stdout, "{}", CommandError::PathNotFound(src))?;
                code = 1;
                continue;
            }
            let target = if dest.is_dir() {
                dest.join(file_name_of(&src))
            } else {
                dest.clone()
            };
            fs::rename(&src, &target).with_context(|| {
                format!("mv: can't move {} to {}", src.display(), target.display())
            })?;
        }
        Ok(code)
    }
}

/// Soft delete: move paths into the trash directory after confirmation.
/// Directories require `-r`.
pub struct Rm;

impl ShellCommand for Rm {
    fn name(&self) -> &'static str {
        "rm"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            help_option(),
            recursive_option("remove directories and their contents"),
        ]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }

        let recursive = args.is_set("--recursive");
        let mut code = 0;
        let mut targets = Vec::new();
        for raw in &args.positional {
            let path = env.resolve(raw);
            if !path_exists(&path) {
                writeln!(stdout, "{}", CommandError::PathNotFound(path))?;
                code = 1;
                continue;
            }
            if path.is_dir() && !recursive {
                writeln!(stdout, "not enough option: -r for {}", path.display())?;
                tracing::error!("rm: missing -r for {}", path.display());
                code = 1;
                continue;
            }
            targets.push(path);
        }
        if targets.is_empty() {
            return Err(CommandError::NotEnoughArguments.into());
        }

        write!(stdout, "Do you really want to remove? [y/n]: ")?;
        stdout.flush()?;
        let mut answer = String::new();
        BufReader::new(stdin).read_line(&mut answer)?;
        if answer.trim().to_lowercase() != "y" {
            return Ok(code);
        }

        for path in &targets {
            move_to_trash(path, env)?;
        }
        Ok(code)
    }
}

/// Search for a regex pattern in files, and in directories with `-r`.
pub struct Grep;

impl ShellCommand for Grep {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            help_option(),
            recursive_option("search directories recursively"),
            OptionSpec::new("ignore case distinctions", "-i", "--ignore-case", false, true),
            OptionSpec::new("the pattern to search for", "-p", "--pattern", true, false),
        ]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }

        let pattern = args
            .value_of("--pattern")
            .ok_or_else(|| CommandError::MissingOption("-p".to_string()))?;
        let re = RegexBuilder::new(pattern)
            .case_insensitive(args.is_set("--ignore-case"))
            .build()
            .with_context(|| format!("grep: invalid pattern: {pattern}"))?;

        if args.positional.is_empty() {
            return Err(CommandError::NotEnoughArguments.into());
        }

        let mut code = 0;
        let mut files = Vec::new();
        for raw in &args.positional {
            let path = env.resolve(raw);
            if !path_exists(&path) {
                writeln!(stdout, "{}", CommandError::PathNotFound(path))?;
                code = 1;
            } else if path.is_dir() {
                if args.is_set("--recursive") {
                    collect_files(&path, &mut files)?;
                } else {
                    writeln!(stdout, "not enough option: -r for {}", path.display())?;
                    tracing::error!("grep: missing -r for {}", path.display());
                    code = 1;
                }
            } else {
                files.push(path);
            }
        }

        for file in &files {
            search_file(&re, file, stdout)?;
        }
        Ok(code)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for path in directory_entries(dir)? {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn search_file(re: &regex::Regex, file: &Path, stdout: &mut dyn Write) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("grep: can't read {}", file.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    let mut found = Vec::new();
    for (num, line) in text.lines().enumerate() {
        if re.is_match(line) {
            found.push(format!("{}: {}", num + 1, line));
        }
    }
    if !found.is_empty() {
        writeln!(stdout, "file: {}", file.display())?;
        for line in found {
            writeln!(stdout, "{line}")?;
        }
    }
    Ok(())
}

/// Create (`-c`) or extract (`-x`) a zip archive named by `-f`.
pub struct Zip;

impl ShellCommand for Zip {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            help_option(),
            OptionSpec::new("create an archive", "-c", "--create", false, false),
            OptionSpec::new("extract an archive", "-x", "--extract", false, false),
            OptionSpec::new("name of the archive file", "-f", "--file", true, false),
        ]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }

        let create = args.is_set("--create");
        let extract = args.is_set("--extract");
        if create && extract {
            return Err(
                CommandError::UnexpectedArguments(vec!["-x".to_string(), "--extract".to_string()])
                    .into(),
            );
        }
        if !create && !extract {
            return Err(CommandError::MissingOption("-c or -x".to_string()).into());
        }
        let archive = env.resolve(
            args.value_of("--file")
                .ok_or_else(|| CommandError::MissingOption("-f".to_string()))?,
        );

        if create {
            if args.positional.is_empty() {
                return Err(CommandError::NotEnoughArguments.into());
            }
            let mut code = 0;
            let mut sources = Vec::new();
            for raw in &args.positional {
                let path = env.resolve(raw);
                if path_exists(&path) {
                    sources.push(path);
                } else {
                    writeln!(stdout, "{}", CommandError::PathNotFound(path))?;
                    code = 1;
                }
            }
            if sources.is_empty() {
                return Err(CommandError::NotEnoughArguments.into());
            }
            create_archive(&archive, &sources)?;
            Ok(code)
        } else {
            if !args.positional.is_empty() {
                return Err(CommandError::UnexpectedArguments(args.positional.clone()).into());
            }
            if !path_exists(&archive) {
                return Err(CommandError::PathNotFound(archive).into());
            }
            extract_archive(&archive, &env.current_dir)?;
            Ok(0)
        }
    }
}

fn create_archive(archive: &Path, sources: &[PathBuf]) -> Result<()> {
    let file = fs::File::create(archive)
        .with_context(|| format!("zip: can't create {}", archive.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for path in sources {
        add_to_archive(&mut writer, path, &file_name_of(path), options)?;
    }
    writer
        .finish()
        .with_context(|| format!("zip: can't finish {}", archive.display()))?;
    Ok(())
}

fn add_to_archive(
    writer: &mut zip::ZipWriter<fs::File>,
    path: &Path,
    name: &str,
    options: zip::write::SimpleFileOptions,
) -> Result<()> {
    if path.is_dir() {
        writer
            .add_directory(name, options)
            .with_context(|| format!("zip: can't add directory {name}"))?;
        for child in directory_entries(path)? {
            let child_name = format!("{name}/{}", file_name_of(&child));
            add_to_archive(writer, &child, &child_name, options)?;
        }
    } else {
        writer
            .start_file(name, options)
            .with_context(|| format!("zip: can't add file {name}"))?;
        let mut source = fs::File::open(path)
            .with_context(|| format!("zip: can't open {}", path.display()))?;
        std::io::copy(&mut source, writer)
            .with_context(|| format!("zip: can't compress {}", path.display()))?;
    }
    Ok(())
}

fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)
        .with_context(|| format!("zip: can't open {}", archive.display()))?;
    let mut reader = zip::ZipArchive::new(file)
        .with_context(|| format!("zip: {} is not a zip archive", archive.display()))?;
    reader
        .extract(dest)
        .with_context(|| format!("zip: can't extract into {}", dest.display()))?;
    Ok(())
}

/// Print the recorded command history, optionally only the last N entries.
pub struct HistoryCmd;

impl ShellCommand for HistoryCmd {
    fn name(&self) -> &'static str {
        "history"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![
            help_option(),
            OptionSpec::new("show only the last n entries", "-n", "--number", true, false),
        ]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }
        if !args.positional.is_empty() {
            return Err(CommandError::UnexpectedArguments(args.positional.clone()).into());
        }

        let history = History::new(&env.history_path);
        let entries = match args.value_of("--number") {
            Some(raw) => {
                let count: usize = raw
                    .parse()
                    .with_context(|| format!("history: invalid entry count: {raw}"))?;
                history.tail(count)?
            }
            None => history.entries()?,
        };
        for (num, entry) in entries.iter().enumerate() {
            writeln!(stdout, "{}: {}", num + 1, entry)?;
        }
        Ok(0)
    }
}

/// Revert the most recent `rm`, `cp` or `mv` found in history.
///
/// The historical line is fed back through the lexer and the argument
/// parser; a line that no longer parses is reported, not replayed.
pub struct Undo;

impl ShellCommand for Undo {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![help_option()]
    }

    fn run(
        &self,
        args: &ParsedArguments,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if help_requested(self.name(), &self.options(), args, stdout)? {
            return Ok(0);
        }
        if !args.positional.is_empty() {
            return Err(CommandError::UnexpectedArguments(args.positional.clone()).into());
        }

        let history = History::new(&env.history_path);
        let Some((index, line)) = history.find_last_of(&["rm", "cp", "mv"])? else {
            writeln!(stdout, "not found next commands: rm, cp, mv")?;
            tracing::error!("undo: no rm, cp or mv entry in history");
            return Ok(1);
        };

        let Ok(words) = split_line(&line) else {
            report_invalid(stdout, &line)?;
            return Ok(1);
        };
        let Some((command, tokens)) = words.split_first() else {
            report_invalid(stdout, &line)?;
            return Ok(1);
        };
        let command = command.clone();

        let options = match command.as_str() {
            "rm" => Rm.options(),
            "cp" => Cp.options(),
            "mv" => Mv.options(),
            other => return Err(CommandError::UnknownCommand(other.to_string()).into()),
        };
        let Ok(parsed) = parse_arguments(&options, tokens) else {
            report_invalid(stdout, &line)?;
            return Ok(1);
        };
        if parsed.is_set(HELP_LONG) {
            writeln!(stdout, "last {command} command was called with -h or --help")?;
            return Ok(0);
        }

        match command.as_str() {
            "rm" => undo_rm(&parsed, env, stdout)?,
            "mv" => undo_mv(&parsed, env, stdout)?,
            _ => undo_cp(&parsed, env)?,
        }
        history.remove(index)?;
        Ok(0)
    }
}

fn report_invalid(stdout: &mut dyn Write, line: &str) -> Result<()> {
    writeln!(stdout, "last file command can't be replayed: {line}")?;
    tracing::error!("undo: can't replay history entry: {line}");
    Ok(())
}

fn undo_rm(parsed: &ParsedArguments, env: &Environment, stdout: &mut dyn Write) -> Result<()> {
    for raw in &parsed.positional {
        let path = env.resolve(raw);
        let name = file_name_of(&path);
        let in_trash = env.trash_dir.join(&name);
        if !path_exists(&in_trash) {
            writeln!(stdout, "not found in the trash: {name}")?;
            return Ok(());
        }
        if path_exists(&path) {
            writeln!(stdout, "can't undo rm for {name}: it already exists")?;
            return Ok(());
        }
        fs::rename(&in_trash, &path)
            .with_context(|| format!("undo: can't restore {name} from the trash"))?;
    }
    Ok(())
}

fn undo_mv(parsed: &ParsedArguments, env: &Environment, stdout: &mut dyn Write) -> Result<()> {
    if parsed.positional.len() < 2 {
        writeln!(stdout, "last mv command can't be replayed")?;
        return Ok(());
    }
    let Some((dest_raw, source_raws)) = parsed.positional.split_last() else {
        return Ok(());
    };
    let dest = env.resolve(dest_raw);

    for raw in source_raws {
        let src = env.resolve(raw);
        let name = file_name_of(&src);
        let inside = dest.join(&name);
        // mv either renamed src to dest or moved it into the dest directory.
        let moved = if dest.is_dir() && path_exists(&inside) {
            inside
        } else {
            dest.clone()
        };
        if !path_exists(&moved) {
            writeln!(stdout, "can't undo mv for {name}: nothing to move back")?;
            continue;
        }
        fs::rename(&moved, &src)
            .with_context(|| format!("undo: can't move {} back", moved.display()))?;
    }
    Ok(())
}

fn undo_cp(parsed: &ParsedArguments, env: &Environment) -> Result<()> {
    if parsed.positional.len() < 2 {
        return Ok(());
    }
    let Some((dest_raw, source_raws)) = parsed.positional.split_last() else {
        return Ok(());
    };
    let dest = env.resolve(dest_raw);

    for raw in source_raws {
        let src = env.resolve(raw);
        let copied = if dest.is_dir() {
            dest.join(file_name_of(&src))
        } else {
            dest.clone()
        };
        if path_exists(&copied) {
            move_to_trash(&copied, env)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::io::Cursor;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = stdenv::temp_dir();
        path.push(format!("rshell_{tag}_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    fn test_env(tag: &str) -> (PathBuf, Environment) {
        let dir = make_unique_temp_dir(tag);
        let env = Environment::with_home(dir.clone(), dir.clone());
        (dir, env)
    }

    fn run_ok(
        command: &dyn ShellCommand,
        raw: &[&str],
        input: &str,
        env: &mut Environment,
    ) -> (ExitCode, String) {
        let tokens: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        let args = parse_arguments(&command.options(), &tokens).expect("parse");
        let mut out = Vec::new();
        let code = command
            .run(&args, &mut Cursor::new(input.as_bytes().to_vec()), &mut out, env)
            .expect("run");
        (code, String::from_utf8(out).expect("utf8"))
    }

    fn run_err(command: &dyn ShellCommand, raw: &[&str], env: &mut Environment) -> String {
        let tokens: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        let args = parse_arguments(&command.options(), &tokens).expect("parse");
        let mut out = Vec::new();
        command
            .run(&args, &mut Cursor::new(Vec::new()), &mut out, env)
            .expect_err("expected failure")
            .to_string()
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write file");
        path
    }

    #[test]
    fn cat_prints_files_in_order() {
        let (dir, mut env) = test_env("cat");
        write_file(&dir, "a.txt", "hello\n");
        write_file(&dir, "b.txt", "world\n");

        let (code, out) = run_ok(&Cat, &["a.txt", "b.txt"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "hello\nworld\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn cat_rejects_missing_and_non_file_paths() {
        let (dir, mut env) = test_env("cat_err");

        let message = run_err(&Cat, &["nope.txt"], &mut env);
        assert!(message.contains("not exist"));

        fs::create_dir(dir.join("sub")).unwrap();
        let message = run_err(&Cat, &["sub"], &mut env);
        assert!(message.contains("not a file"));

        let message = run_err(&Cat, &[], &mut env);
        assert!(message.contains("not enough arguments"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn ls_hides_dotfiles_unless_all() {
        let (dir, mut env) = test_env("ls");
        write_file(&dir, "visible.txt", "x");
        write_file(&dir, ".hidden", "x");

        let (_, out) = run_ok(&Ls, &[], "", &mut env);
        assert!(out.contains("visible.txt"));
        assert!(!out.contains(".hidden"));

        let (_, out) = run_ok(&Ls, &["-a"], "", &mut env);
        assert!(out.contains("visible.txt"));
        assert!(out.contains(".hidden"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn ls_long_format_shows_mode_and_size() {
        let (dir, mut env) = test_env("ls_long");
        write_file(&dir, "data.txt", "12345");

        let (_, out) = run_ok(&Ls, &["-l"], "", &mut env);
        let line = out.lines().find(|l| l.ends_with("data.txt")).expect("line");
        assert!(line.starts_with('-'), "mode string expected: {line}");
        assert!(line.contains(" 5 "), "size expected: {line}");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn ls_marks_directories_and_files() {
        let (dir, mut env) = test_env("ls_marks");
        write_file(&dir, "f.txt", "x");
        fs::create_dir(dir.join("sub")).unwrap();

        let (_, out) = run_ok(&Ls, &[], "", &mut env);
        assert!(out.contains(&format!("{FILE_MARK}f.txt")));
        assert!(out.contains(&format!("{DIRECTORY_MARK}sub")));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn ls_reports_missing_paths_but_continues() {
        let (dir, mut env) = test_env("ls_missing");
        write_file(&dir, "real.txt", "x");

        let (code, out) = run_ok(&Ls, &["ghost", "real.txt"], "", &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("not exist"));
        assert!(out.contains("real.txt"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn ls_help_prints_the_option_table() {
        let (dir, mut env) = test_env("ls_help");
        let (code, out) = run_ok(&Ls, &["--help"], "", &mut env);
        assert_eq!(code, 0);
        assert!(out.contains("usage: ls"));
        assert!(out.contains("-a, --all"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn cd_changes_into_a_directory_and_back_home() {
        let _lock = lock_current_dir();
        let (dir, mut env) = test_env("cd");
        let orig = stdenv::current_dir().unwrap();
        fs::create_dir(dir.join("sub")).unwrap();

        let (code, _) = run_ok(&Cd, &["sub"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, fs::canonicalize(dir.join("sub")).unwrap());

        // No argument goes home.
        let (code, _) = run_ok(&Cd, &[], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, fs::canonicalize(&dir).unwrap());

        stdenv::set_current_dir(orig).unwrap();
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn cd_rejects_missing_target_and_extra_arguments() {
        let _lock = lock_current_dir();
        let (dir, mut env) = test_env("cd_err");
        let orig = stdenv::current_dir().unwrap();

        let message = run_err(&Cd, &["ghost"], &mut env);
        assert!(message.contains("cd"));

        let message = run_err(&Cd, &["a", "b"], &mut env);
        assert!(message.contains("unexpected arguments"));

        assert_eq!(stdenv::current_dir().unwrap(), orig);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn cp_copies_a_file_into_a_directory() {
        let (dir, mut env) = test_env("cp");
        write_file(&dir, "src.txt", "payload");
        fs::create_dir(dir.join("dest")).unwrap();

        let (code, _) = run_ok(&Cp, &["src.txt", "dest"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(dir.join("dest/src.txt")).unwrap(), "payload");
        assert!(dir.join("src.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn cp_directory_requires_recursive() {
        let (dir, mut env) = test_env("cp_r");
        fs::create_dir(dir.join("tree")).unwrap();
        write_file(&dir.join("tree"), "leaf.txt", "x");

        let message = run_err(&Cp, &["tree", "copy"], &mut env);
        assert!(message.contains("-r"));

        let (code, _) = run_ok(&Cp, &["-r", "tree", "copy"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(dir.join("copy/leaf.txt")).unwrap(), "x");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn cp_multiple_sources_need_a_directory_destination() {
        let (dir, mut env) = test_env("cp_multi");
        write_file(&dir, "a.txt", "a");
        write_file(&dir, "b.txt", "b");
        write_file(&dir, "plain.txt", "p");

        let message = run_err(&Cp, &["a.txt", "b.txt", "plain.txt"], &mut env);
        assert!(message.contains("not a directory"));

        fs::create_dir(dir.join("into")).unwrap();
        let (code, _) = run_ok(&Cp, &["a.txt", "b.txt", "into"], "", &mut env);
        assert_eq!(code, 0);
        assert!(dir.join("into/a.txt").exists());
        assert!(dir.join("into/b.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn mv_renames_and_moves_into_directories() {
        let (dir, mut env) = test_env("mv");
        write_file(&dir, "old.txt", "x");

        let (code, _) = run_ok(&Mv, &["old.txt", "new.txt"], "", &mut env);
        assert_eq!(code, 0);
        assert!(!dir.join("old.txt").exists());
        assert!(dir.join("new.txt").exists());

        fs::create_dir(dir.join("into")).unwrap();
        let (code, _) = run_ok(&Mv, &["new.txt", "into"], "", &mut env);
        assert_eq!(code, 0);
        assert!(dir.join("into/new.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn rm_moves_to_trash_after_confirmation() {
        let (dir, mut env) = test_env("rm");
        write_file(&dir, "doomed.txt", "x");

        let (code, out) = run_ok(&Rm, &["doomed.txt"], "y\n", &mut env);
        assert_eq!(code, 0);
        assert!(out.contains("[y/n]"));
        assert!(!dir.join("doomed.txt").exists());
        assert!(env.trash_dir.join("doomed.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn rm_keeps_the_file_when_declined() {
        let (dir, mut env) = test_env("rm_no");
        write_file(&dir, "kept.txt", "x");

        let (code, _) = run_ok(&Rm, &["kept.txt"], "n\n", &mut env);
        assert_eq!(code, 0);
        assert!(dir.join("kept.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn rm_directory_requires_recursive() {
        let (dir, mut env) = test_env("rm_r");
        fs::create_dir(dir.join("tree")).unwrap();

        let message = run_err(&Rm, &["tree"], &mut env);
        assert!(message.contains("not enough arguments"));
        assert!(dir.join("tree").exists());

        let (code, _) = run_ok(&Rm, &["-r", "tree"], "y\n", &mut env);
        assert_eq!(code, 0);
        assert!(!dir.join("tree").exists());
        assert!(env.trash_dir.join("tree").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn rm_replaces_a_same_named_trash_entry() {
        let (dir, mut env) = test_env("rm_dup");
        fs::create_dir_all(&env.trash_dir).unwrap();
        write_file(&env.trash_dir, "twice.txt", "old");
        write_file(&dir, "twice.txt", "new");

        let (code, _) = run_ok(&Rm, &["twice.txt"], "y\n", &mut env);
        assert_eq!(code, 0);
        assert_eq!(
            fs::read_to_string(env.trash_dir.join("twice.txt")).unwrap(),
            "new"
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn grep_prints_matches_with_line_numbers() {
        let (dir, mut env) = test_env("grep");
        write_file(&dir, "notes.txt", "alpha\nbeta\ngamma beta\n");

        let (code, out) = run_ok(&Grep, &["-p", "beta", "notes.txt"], "", &mut env);
        assert_eq!(code, 0);
        assert!(out.contains("file: "));
        assert!(out.contains("2: beta"));
        assert!(out.contains("3: gamma beta"));
        assert!(!out.contains("1: alpha"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn grep_ignore_case() {
        let (dir, mut env) = test_env("grep_i");
        write_file(&dir, "notes.txt", "Target\nTARGET\nmiss\n");

        let (_, out) = run_ok(&Grep, &["-i", "-p", "target", "notes.txt"], "", &mut env);
        assert!(out.contains("1: Target"));
        assert!(out.contains("2: TARGET"));
        assert!(!out.contains("miss"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn grep_directory_needs_recursive() {
        let (dir, mut env) = test_env("grep_r");
        fs::create_dir(dir.join("sub")).unwrap();
        write_file(&dir.join("sub"), "deep.txt", "needle\n");

        let (code, out) = run_ok(&Grep, &["-p", "needle", "sub"], "", &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("not enough option: -r"));

        let (code, out) = run_ok(&Grep, &["-r", "-p", "needle", "sub"], "", &mut env);
        assert_eq!(code, 0);
        assert!(out.contains("1: needle"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn grep_requires_a_pattern() {
        let (dir, mut env) = test_env("grep_p");
        write_file(&dir, "notes.txt", "x\n");
        let message = run_err(&Grep, &["notes.txt"], &mut env);
        assert!(message.contains("-p"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn zip_create_and_extract_round_trip() {
        let (dir, mut env) = test_env("zip");
        write_file(&dir, "a.txt", "alpha");
        fs::create_dir(dir.join("sub")).unwrap();
        write_file(&dir.join("sub"), "b.txt", "beta");

        let (code, _) = run_ok(&Zip, &["-c", "-f", "pack.zip", "a.txt", "sub"], "", &mut env);
        assert_eq!(code, 0);
        assert!(dir.join("pack.zip").exists());

        let out_dir = dir.join("out");
        fs::create_dir(&out_dir).unwrap();
        env.current_dir = out_dir.clone();
        let (code, _) = run_ok(&Zip, &["-x", "-f", "~/pack.zip"], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(out_dir.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(out_dir.join("sub/b.txt")).unwrap(), "beta");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn zip_rejects_conflicting_modes() {
        let (dir, mut env) = test_env("zip_modes");
        let message = run_err(&Zip, &["-c", "-x", "-f", "p.zip"], &mut env);
        assert!(message.contains("unexpected arguments"));

        let message = run_err(&Zip, &["-f", "p.zip"], &mut env);
        assert!(message.contains("not enough option"));

        let message = run_err(&Zip, &["-c", "a.txt"], &mut env);
        assert!(message.contains("-f"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn history_command_prints_numbered_entries() {
        let (dir, mut env) = test_env("history_cmd");
        let history = History::new(&env.history_path);
        for line in ["ls", "cd /tmp", "cat a.txt"] {
            history.append(line).unwrap();
        }

        let (_, out) = run_ok(&HistoryCmd, &[], "", &mut env);
        assert_eq!(out, "1: ls\n2: cd /tmp\n3: cat a.txt\n");

        let (_, out) = run_ok(&HistoryCmd, &["-n", "2"], "", &mut env);
        assert_eq!(out, "1: cd /tmp\n2: cat a.txt\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn undo_restores_a_removed_file() {
        let (dir, mut env) = test_env("undo_rm");
        write_file(&dir, "gone.txt", "data");

        let (code, _) = run_ok(&Rm, &["gone.txt"], "y\n", &mut env);
        assert_eq!(code, 0);
        History::new(&env.history_path).append("rm gone.txt").unwrap();

        let (code, _) = run_ok(&Undo, &[], "", &mut env);
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(dir.join("gone.txt")).unwrap(), "data");
        // The replayed entry is consumed.
        assert!(History::new(&env.history_path)
            .find_last_of(&["rm"])
            .unwrap()
            .is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn undo_moves_a_renamed_file_back() {
        let (dir, mut env) = test_env("undo_mv");
        write_file(&dir, "old.txt", "x");
        let (code, _) = run_ok(&Mv, &["old.txt", "new.txt"], "", &mut env);
        assert_eq!(code, 0);
        History::new(&env.history_path)
            .append("mv old.txt new.txt")
            .unwrap();

        let (code, _) = run_ok(&Undo, &[], "", &mut env);
        assert_eq!(code, 0);
        assert!(dir.join("old.txt").exists());
        assert!(!dir.join("new.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn undo_trashes_a_copied_file() {
        let (dir, mut env) = test_env("undo_cp");
        write_file(&dir, "src.txt", "x");
        fs::create_dir(dir.join("dest")).unwrap();
        let (code, _) = run_ok(&Cp, &["src.txt", "dest"], "", &mut env);
        assert_eq!(code, 0);
        History::new(&env.history_path)
            .append("cp src.txt dest")
            .unwrap();

        let (code, _) = run_ok(&Undo, &[], "", &mut env);
        assert_eq!(code, 0);
        assert!(dir.join("src.txt").exists());
        assert!(!dir.join("dest/src.txt").exists());
        assert!(env.trash_dir.join("src.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn undo_reports_an_empty_history() {
        let (dir, mut env) = test_env("undo_empty");
        let (code, out) = run_ok(&Undo, &[], "", &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("not found next commands"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn undo_swallows_an_unparsable_history_entry() {
        let (dir, mut env) = test_env("undo_bad");
        History::new(&env.history_path)
            .append("rm -x whatever.txt")
            .unwrap();

        let (code, out) = run_ok(&Undo, &[], "", &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("can't be replayed"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn mode_string_renders_permission_bits() {
        let (dir, _env) = test_env("mode");
        let file = write_file(&dir, "m.txt", "x");
        let meta = file.symlink_metadata().unwrap();
        let rendered = mode_string(&meta);
        assert_eq!(rendered.len(), 10);
        assert!(rendered.starts_with('-'));
        assert!(rendered[1..].chars().all(|c| "rwx-".contains(c)));

        let dir_meta = dir.symlink_metadata().unwrap();
        assert!(mode_string(&dir_meta).starts_with('d'));

        let _ = fs::remove_dir_all(dir);
    }
}
