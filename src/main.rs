use anyhow::{Context, Result};
use rshell::Interpreter;
use std::fs;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "rshell.log";

/// Logs go to a file so they never interleave with the prompt.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)
        .with_context(|| format!("can't open {LOG_FILE}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;
    tracing::info!("shell started");
    Interpreter::default().repl()?;
    tracing::info!("shell stopped");
    Ok(())
}
