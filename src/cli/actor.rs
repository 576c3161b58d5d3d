//! Actor identity commands.

use serde::Serialize;

use super::CliContext;
use crate::error::Result;
use crate::output::emit_success;

#[derive(Serialize)]
struct ActorReport<'a> {
    actor: &'a str,
}

pub fn run_set(ctx: &CliContext, name: &str) -> Result<()> {
    crate::actor::persist_actor(&ctx.root, name)?;

    emit_success(
        ctx.output,
        "actor",
        &ActorReport { actor: name },
        &format!("Actor set to {name}"),
    )
}

pub fn run_show(ctx: &CliContext) -> Result<()> {
    emit_success(
        ctx.output,
        "actor",
        &ActorReport { actor: &ctx.actor },
        &ctx.actor,
    )
}
