//! Actor identity management.
//!
//! Actor resolution order:
//! 1) CLI --actor (explicit)
//! 2) SHEETSYNC_ACTOR environment variable
//! 3) Persisted value in <root>/.sheetsync/actor
//! 4) Config default (actor.default) or "unknown"

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

const ACTOR_FILENAME: &str = "actor";
const STATE_DIR: &str = ".sheetsync";

/// Resolve the current actor using CLI, environment, persisted value, and config.
pub fn resolve_actor(root: Option<&Path>, cli_actor: Option<&str>) -> Result<String> {
    if let Some(actor) = non_empty(cli_actor) {
        return Ok(actor.to_string());
    }

    if let Ok(env_actor) = std::env::var("SHEETSYNC_ACTOR") {
        if let Some(actor) = non_empty(Some(env_actor.as_str())) {
            return Ok(actor.to_string());
        }
    }

    if let Some(root) = root {
        if let Some(actor) = load_persisted_actor(root)? {
            return Ok(actor);
        }

        let config = Config::load(root)?;
        return Ok(config.actor.default);
    }

    Ok("unknown".to_string())
}

/// Persist the actor identity in `<root>/.sheetsync/actor`.
pub fn persist_actor(root: &Path, actor: &str) -> Result<()> {
    let actor = non_empty(Some(actor))
        .ok_or_else(|| Error::InvalidArgument("actor name cannot be empty".to_string()))?;

    let state_dir = root.join(STATE_DIR);
    std::fs::create_dir_all(&state_dir)?;
    std::fs::write(actor_path(root), format!("{actor}\n"))?;
    Ok(())
}

/// Load the actor identity from `<root>/.sheetsync/actor`, if present.
pub fn load_persisted_actor(root: &Path) -> Result<Option<String>> {
    let path = actor_path(root);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    let actor = raw.trim();
    if actor.is_empty() {
        return Ok(None);
    }

    Ok(Some(actor.to_string()))
}

fn actor_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(ACTOR_FILENAME)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
