// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON output helpers shared by the CLI commands

use serde::Serialize;
use std::io::Write;

/// Print `value` to stdout as JSON, pretty unless `compact`.
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> serde_json::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if compact {
        serde_json::to_writer(&mut out, value)?;
    } else {
        serde_json::to_writer_pretty(&mut out, value)?;
    }
    writeln!(out).map_err(serde_json::Error::io)
}
