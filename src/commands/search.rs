// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot search with timing stats

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use udash::output::print_json;
use udash::record::User;
use udash::search::{FieldFilter, FieldMatch, MatchStrategy, SearchSession, SearchStats, TokenMatch};

use super::{render, Context};

/// Search result for JSON output
#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    filter: FieldFilter,
    strategy: &'static str,
    stats: SearchStats,
    total: usize,
    results: &'a [Arc<User>],
}

pub async fn run(
    ctx: &Context,
    query: &str,
    filter: FieldFilter,
    simple: bool,
    limit: Option<usize>,
) -> Result<()> {
    let records = ctx.store().get_all().await?;

    let strategy: Box<dyn MatchStrategy> = if simple {
        Box::new(FieldMatch)
    } else {
        Box::new(TokenMatch)
    };
    let strategy_name = strategy.name();
    let mut session = SearchSession::new(strategy);
    session.set_records(records);

    let results = filter.apply(session.search(query), query);
    let stats = session.engine().stats();
    let shown = &results[..limit.unwrap_or(results.len()).min(results.len())];

    if ctx.is_json() {
        let output = SearchOutput {
            query,
            filter,
            strategy: strategy_name,
            stats,
            total: results.len(),
            results: shown,
        };
        print_json(&output, ctx.compact)?;
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No users match: {}", "✗".red(), query.yellow());
        return Ok(());
    }

    println!("\n{} Searching for: {}\n", "🔍".cyan(), query.yellow());
    for user in shown {
        render::user_row(user);
    }
    println!();
    render::stats(&stats);
    if shown.len() < results.len() {
        println!(
            "{} Showing {} of {} matches (use `-m` to increase)",
            "ℹ".cyan(),
            shown.len().to_string().cyan(),
            results.len().to_string().cyan()
        );
    }
    Ok(())
}
