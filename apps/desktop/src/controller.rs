//! Typed shell commands and their translation into engine intents.

use std::sync::Arc;

use client_core::BreachQueryEngine;
use shared::domain::FilterMode;
use tracing::debug;

use crate::render::render_detail;

pub const HELP: &str = "commands: search [text] | filter all|verified|unverified | more | retry | reset | show <name> | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Search(String),
    Filter(FilterMode),
    LoadMore,
    Retry,
    Reset,
    Show(String),
    Help,
    Quit,
}

pub fn parse_intent(line: &str) -> Result<Intent, String> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "search" | "/" => Ok(Intent::Search(rest.to_string())),
        "filter" => rest
            .parse::<FilterMode>()
            .map(Intent::Filter)
            .map_err(|err| err.to_string()),
        "more" | "load" => Ok(Intent::LoadMore),
        "retry" => Ok(Intent::Retry),
        "reset" | "refresh" => Ok(Intent::Reset),
        "show" if !rest.is_empty() => Ok(Intent::Show(rest.to_string())),
        "show" => Err("usage: show <name>".to_string()),
        "help" | "?" | "" => Ok(Intent::Help),
        "quit" | "exit" | "q" => Ok(Intent::Quit),
        other => Err(format!("unknown command '{other}'; {HELP}")),
    }
}

/// Forwards an intent to the engine. Returns text to print directly, if any;
/// state changes are rendered by the subscriber.
pub fn dispatch_intent(engine: &Arc<BreachQueryEngine>, intent: Intent) -> Option<String> {
    let intent_name = match &intent {
        Intent::Search(_) => "search",
        Intent::Filter(_) => "filter",
        Intent::LoadMore => "load_more",
        Intent::Retry => "retry",
        Intent::Reset => "reset",
        Intent::Show(_) => "show",
        Intent::Help => "help",
        Intent::Quit => "quit",
    };
    debug!(intent = intent_name, "dispatching shell intent");

    match intent {
        Intent::Search(text) => {
            engine.set_search_query(text);
            None
        }
        Intent::Filter(mode) => {
            engine.set_filter_mode(mode);
            None
        }
        Intent::LoadMore => {
            if engine.load().is_some() {
                return None;
            }
            let state = engine.snapshot();
            Some(if state.is_loading() {
                "already loading".to_string()
            } else {
                "no more breaches to load".to_string()
            })
        }
        Intent::Retry => engine
            .retry()
            .is_none()
            .then(|| "nothing to retry right now".to_string()),
        Intent::Reset => {
            if !engine.reset() {
                return Some("cannot reset while a fetch is in flight".to_string());
            }
            let _ = engine.load();
            None
        }
        Intent::Show(name) => Some(match engine.snapshot().find(&name) {
            Some(record) => render_detail(record),
            None => format!("no loaded breach named '{name}'"),
        }),
        Intent::Help => Some(HELP.to_string()),
        Intent::Quit => None,
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
