//! Sheet-level commands: new, show, renumber.

use serde::Serialize;

use super::CliContext;
use crate::error::Result;
use crate::output::emit_success;

#[derive(Serialize)]
struct NewReport<'a> {
    sheet: &'a str,
    header: &'a str,
}

pub fn run_new(ctx: &CliContext, sheet: &str, header: &str) -> Result<()> {
    ctx.engine.create_sheet(sheet, header)?;
    ctx.drain_events()?;

    emit_success(
        ctx.output,
        "new",
        &NewReport { sheet, header },
        &format!("Created {sheet}"),
    )
}

#[derive(Serialize)]
struct ShowReport<'a> {
    sheet: &'a str,
    lines: &'a [String],
}

pub fn run_show(ctx: &CliContext, sheet: &str) -> Result<()> {
    let lines = ctx.engine.load(sheet)?;

    emit_success(
        ctx.output,
        "show",
        &ShowReport {
            sheet,
            lines: &lines,
        },
        &lines.join("\n"),
    )
}

#[derive(Serialize)]
struct RenumberReport<'a> {
    sheet: &'a str,
    changed: usize,
}

pub fn run_renumber(ctx: &CliContext, sheet: &str) -> Result<()> {
    let changed = ctx.engine.renumber(sheet, &ctx.actor)?;
    ctx.drain_events()?;

    let human = if changed == 0 {
        format!("{sheet} already numbered")
    } else {
        format!("Renumbered {changed} line(s) in {sheet}")
    };
    emit_success(
        ctx.output,
        "renumber",
        &RenumberReport { sheet, changed },
        &human,
    )
}
