// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full details of a single user

use anyhow::Result;
use udash::output::print_json;

use super::{render, Context};

pub async fn run(ctx: &Context, id: u64) -> Result<()> {
    let user = ctx.store().get_by_id(id).await?;
    if ctx.is_json() {
        print_json(&*user, ctx.compact)?;
    } else {
        render::user_detail(&user);
    }
    Ok(())
}
