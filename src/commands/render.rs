// SPDX-License-Identifier: MIT OR Apache-2.0

//! Colored text rendering for users, pages and search stats

use colored::Colorize;

use udash::dashboard::DashboardView;
use udash::pagination::PageMarker;
use udash::record::{truncate, User};
use udash::search::{FieldFilter, SearchStats};

const NAME_WIDTH: usize = 24;
const EMAIL_WIDTH: usize = 28;

pub fn user_row(user: &User) {
    println!(
        "  {} {} {:<name$} {:<email$} {}",
        format!("{:>3}", user.id).dimmed(),
        format!("[{}]", user.initials()).blue(),
        truncate(&user.name, NAME_WIDTH).green(),
        truncate(&user.email, EMAIL_WIDTH).cyan(),
        user.company.name.yellow(),
        name = NAME_WIDTH + 3,
        email = EMAIL_WIDTH + 3,
    );
}

pub fn user_detail(user: &User) {
    println!(
        "\n{} {} {}\n",
        format!("[{}]", user.initials()).blue(),
        user.name.green().bold(),
        format!("@{}", user.username).dimmed()
    );
    println!("  {:<9} {}", "Email".dimmed(), user.email.cyan());
    println!("  {:<9} {}", "Phone".dimmed(), user.formatted_phone());
    println!("  {:<9} {}", "Website".dimmed(), user.website);
    println!("  {:<9} {}", "Address".dimmed(), user.full_address());
    println!("  {:<9} {}", "Company".dimmed(), user.company.name.yellow());
    if !user.company.catch_phrase.is_empty() {
        println!("  {:<9} {}", "", user.company.catch_phrase.italic());
    }
    println!();
}

pub fn markers(markers: &[PageMarker], current: usize) -> String {
    markers
        .iter()
        .map(|marker| match marker {
            PageMarker::Page(page) if *page == current => format!("[{page}]").bold().to_string(),
            PageMarker::Page(page) => page.to_string(),
            PageMarker::Ellipsis => "...".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn stats(stats: &SearchStats) {
    let source = if stats.cache_hit { "cached" } else { "computed" };
    println!(
        "{} {} results in {}ms ({})",
        "ℹ".cyan(),
        stats.total_results.to_string().cyan(),
        stats.search_time_ms,
        source
    );
}

pub fn dashboard(view: &DashboardView) {
    if let Some(error) = &view.error {
        println!("{} {}", "✗".red(), error);
        println!("{} Type /retry to try again", "ℹ".cyan());
        return;
    }

    if !view.search_term.is_empty() || view.filter != FieldFilter::All {
        let filter = match view.filter {
            FieldFilter::All => String::new(),
            other => format!(" in {other}"),
        };
        let pending = if view.is_searching { " (searching...)" } else { "" };
        println!(
            "\n{} Search: {}{}{}",
            "🔍".cyan(),
            view.search_term.yellow(),
            filter,
            pending.dimmed()
        );
    }

    if view.records.is_empty() {
        println!("{} No users found", "✗".red());
        return;
    }

    println!(
        "\n{} Users {}-{} of {} ({} total)\n",
        "👥".cyan(),
        view.page.start_index + 1,
        view.page.end_index,
        view.filtered_count.to_string().cyan(),
        view.total_users
    );
    for user in &view.records {
        user_row(user);
    }
    if view.page.total_pages > 1 {
        println!(
            "\n  Page {} of {}   {}",
            view.page.current_page,
            view.page.total_pages,
            markers(&view.markers, view.page.current_page)
        );
    }
    println!();
}
