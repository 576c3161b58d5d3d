//! Cell edit commands.

use serde::Serialize;

use super::CliContext;
use crate::error::Result;
use crate::output::emit_success;

#[derive(Serialize)]
struct SetReport<'a> {
    sheet: &'a str,
    row: usize,
    col: usize,
    value: &'a str,
    actor: &'a str,
}

pub fn run_set(ctx: &CliContext, sheet: &str, row: usize, col: usize, value: &str) -> Result<()> {
    ctx.engine.edit_cell(sheet, row, col, value, &ctx.actor)?;
    ctx.drain_events()?;

    emit_success(
        ctx.output,
        "cell set",
        &SetReport {
            sheet,
            row,
            col,
            value,
            actor: &ctx.actor,
        },
        &format!("Set {sheet} r{row}c{col} = {value:?}"),
    )
}
