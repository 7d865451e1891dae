//! Line-oriented command console
//!
//! Positions typed by the user are 1-based, as shown by `list`.

use anyhow::{bail, Context, Result};
use watchlist_sync::WatchlistSession;

use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    /// 0-based source and target positions
    Move(usize, usize),
    Search(String),
    /// 0-based index into the current search results
    Pick(usize),
    List,
    Help,
    Quit,
}

fn position(raw: Option<&str>, what: &str) -> Result<usize> {
    let raw = raw.with_context(|| format!("missing {}", what))?;
    let n: usize = raw
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", what, raw))?;
    if n == 0 {
        bail!("{} starts at 1", what);
    }
    Ok(n - 1)
}

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" => Command::Add(args.next().context("usage: add <TICKER>")?.to_string()),
        "rm" | "remove" => Command::Remove(args.next().context("usage: rm <TICKER>")?.to_string()),
        "mv" | "move" => {
            let from = position(args.next(), "source position")?;
            let to = position(args.next(), "target position")?;
            Command::Move(from, to)
        }
        "search" | "s" => Command::Search(rest.to_string()),
        "pick" => Command::Pick(position(args.next(), "result number")?),
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "" => bail!("empty command"),
        other => bail!("unknown command '{}'", other),
    };
    Ok(command)
}

/// Run one command against the session.
///
/// Failures of user actions are already published as notices, so they are
/// only logged here.
pub async fn execute(session: &WatchlistSession, command: Command) {
    match command {
        Command::Add(ticker) => {
            if let Err(e) = session.add(&ticker).await {
                tracing::debug!("add {} failed: {}", ticker, e);
            }
        }
        Command::Remove(ticker) => {
            if let Err(e) = session.remove(&ticker).await {
                tracing::debug!("rm {} failed: {}", ticker, e);
            }
        }
        Command::Move(from, to) => {
            if let Err(e) = session.on_drop(from, to).await {
                tracing::debug!("mv {} {} failed: {}", from + 1, to + 1, e);
            }
        }
        Command::Search(text) => session.search(&text).await,
        Command::Pick(index) => {
            if let Err(e) = session.pick(index).await {
                tracing::debug!("pick {} failed: {}", index + 1, e);
            }
        }
        Command::List => render::print_table(&session.snapshot().await),
        Command::Help => render::print_help(),
        Command::Quit => {}
    }
}
