// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-driven dashboard session
//!
//! Each stdin line is either a `/command` or the new raw search term. The
//! page is re-rendered whenever a term settles, a command changes state, or
//! another session edits the shared state file.

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use udash::dashboard::{Action, Dashboard};
use udash::output::print_json;

use super::{render, Context};
use crate::cli::CliFilter;

const HELP: &str = "Type to search. Commands: /next /prev /first /last /page N \
/open ID /back /filter all|name|email|company /clear /retry /quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Action(Action),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let Some(command) = line.trim().strip_prefix('/') else {
        return Input::Action(Action::SearchChange(line.to_string()));
    };
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    let action = match (name, arg) {
        ("q" | "quit" | "exit", _) => return Input::Quit,
        ("h" | "help", _) => return Input::Help,
        ("n" | "next", _) => Action::NextPage,
        ("p" | "prev", _) => Action::PreviousPage,
        ("first", _) => Action::FirstPage,
        ("last", _) => Action::LastPage,
        ("back", _) => Action::Back,
        ("clear", _) => Action::Clear,
        ("retry", _) => Action::Retry,
        ("page", Some(n)) => match n.parse() {
            Ok(page) => Action::PageChange(page),
            Err(_) => return Input::Invalid(format!("not a page number: {n}")),
        },
        ("open", Some(id)) => match id.parse() {
            Ok(id) => Action::UserClick(id),
            Err(_) => return Input::Invalid(format!("not a user id: {id}")),
        },
        ("filter", Some(field)) => match CliFilter::from_str(field, true) {
            Ok(filter) => Action::SetFilter(filter.into()),
            Err(_) => return Input::Invalid(format!("unknown filter: {field}")),
        },
        _ => return Input::Invalid(format!("unknown command: /{command}")),
    };
    Input::Action(action)
}

fn show(ctx: &Context, dashboard: &Dashboard) -> Result<()> {
    let view = dashboard.view();
    if ctx.is_json() {
        // One document per line.
        print_json(&view, true)?;
        return Ok(());
    }
    match &view.selected {
        Some(user) => render::user_detail(user),
        None => render::dashboard(&view),
    }
    Ok(())
}

pub async fn run(ctx: &Context) -> Result<()> {
    let _watch = ctx.watch_external()?;
    let mut dashboard = ctx.dashboard(None);
    let mut settled = dashboard.settled_updates();
    let mut events = dashboard.storage_events();

    // A failed load is shown in the view and can be retried.
    let _ = dashboard.load().await;
    if !ctx.is_json() {
        println!("{} {}", "ℹ".cyan(), HELP.dimmed());
    }
    show(ctx, &dashboard)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Quit => break,
                    Input::Help => println!("{HELP}"),
                    Input::Invalid(message) => eprintln!("{} {}", "✗".red(), message),
                    // Rendered once the term settles.
                    Input::Action(action @ Action::SearchChange(_)) => {
                        dashboard.handle(action).await
                    }
                    Input::Action(action) => {
                        dashboard.handle(action).await;
                        show(ctx, &dashboard)?;
                    }
                }
            }
            changed = settled.changed() => {
                if changed.is_err() {
                    break;
                }
                settled.borrow_and_update();
                dashboard.refresh();
                show(ctx, &dashboard)?;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    dashboard.apply_storage_event(&event);
                    show(ctx, &dashboard)?;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed external state changes"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Input ended mid-window.
    if dashboard.view().is_searching {
        dashboard.settle_now();
        show(ctx, &dashboard)?;
    }
    Ok(())
}
