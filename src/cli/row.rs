//! Structural row commands: insert, delete, move, promote.

use serde::Serialize;

use super::CliContext;
use crate::error::Result;
use crate::output::emit_success;

#[derive(Serialize)]
struct InsertReport<'a> {
    sheet: &'a str,
    row: usize,
    after: usize,
    actor: &'a str,
}

pub fn run_insert(ctx: &CliContext, sheet: &str, after: usize) -> Result<()> {
    let row = ctx.engine.insert_row(sheet, after, &ctx.actor)?;
    ctx.drain_events()?;

    emit_success(
        ctx.output,
        "row insert",
        &InsertReport {
            sheet,
            row,
            after,
            actor: &ctx.actor,
        },
        &format!("Inserted row {row} into {sheet}"),
    )
}

#[derive(Serialize)]
struct DeleteReport<'a> {
    sheet: &'a str,
    row: usize,
    actor: &'a str,
}

pub fn run_delete(ctx: &CliContext, sheet: &str, row: usize) -> Result<()> {
    ctx.engine.delete_row(sheet, row, &ctx.actor)?;
    ctx.drain_events()?;

    emit_success(
        ctx.output,
        "row delete",
        &DeleteReport {
            sheet,
            row,
            actor: &ctx.actor,
        },
        &format!("Deleted row {row} from {sheet}"),
    )
}

#[derive(Serialize)]
struct MoveReport<'a> {
    sheet: &'a str,
    from: usize,
    to: usize,
    actor: &'a str,
}

pub fn run_move(ctx: &CliContext, sheet: &str, from: usize, to: usize) -> Result<()> {
    ctx.engine.move_row(sheet, from, to, &ctx.actor)?;
    ctx.drain_events()?;

    emit_success(
        ctx.output,
        "row move",
        &MoveReport {
            sheet,
            from,
            to,
            actor: &ctx.actor,
        },
        &format!("Moved row {from} to {to} in {sheet}"),
    )
}

#[derive(Serialize)]
struct PromoteReport<'a> {
    sheet: &'a str,
    row: usize,
    target: &'a str,
    actor: &'a str,
}

pub fn run_promote(ctx: &CliContext, sheet: &str, row: usize, target: &str) -> Result<()> {
    ctx.engine.promote_row(sheet, row, target, &ctx.actor)?;
    ctx.drain_events()?;

    emit_success(
        ctx.output,
        "row promote",
        &PromoteReport {
            sheet,
            row,
            target,
            actor: &ctx.actor,
        },
        &format!("Promoted row {row} from {sheet} to {target}"),
    )
}
