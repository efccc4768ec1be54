// SPDX-License-Identifier: MIT OR Apache-2.0

//! One page of the directory, honoring the remembered search and page

use anyhow::Result;
use udash::dashboard::Action;
use udash::output::print_json;

use super::{render, Context};
use crate::cli::CliFilter;

pub async fn run(
    ctx: &Context,
    page: Option<usize>,
    search: Option<String>,
    filter: Option<CliFilter>,
    per_page: Option<usize>,
) -> Result<()> {
    let mut dashboard = ctx.dashboard(per_page);
    dashboard.load().await?;

    if let Some(term) = search {
        dashboard.handle(Action::SearchChange(term)).await;
        dashboard.settle_now();
    }
    if let Some(filter) = filter {
        dashboard.handle(Action::SetFilter(filter.into())).await;
    }
    if let Some(page) = page {
        dashboard.handle(Action::PageChange(page)).await;
    }

    let view = dashboard.view();
    if ctx.is_json() {
        print_json(&view, ctx.compact)?;
    } else {
        render::dashboard(&view);
    }
    Ok(())
}
