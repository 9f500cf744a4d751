// Workspace persistence: versioned JSON under the user config directory.
// Unknown schema versions fail safe: callers fall back to a fresh
// workspace rather than guessing at a migration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workspace::Workspace;

/// Current on-disk schema. Version 1 predates the drawer model and is
/// discarded rather than migrated.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("unsupported workspace schema version {0}")]
    UnsupportedSchema(u32),
    #[error("could not access workspace file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse workspace file: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct PersistedWorkspace {
    schema_version: u32,
    workspace: Workspace,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

pub fn encode(workspace: &Workspace) -> Result<String, PersistError> {
    let persisted = PersistedWorkspace {
        schema_version: SCHEMA_VERSION,
        workspace: workspace.clone(),
    };
    Ok(serde_json::to_string_pretty(&persisted)?)
}

pub fn decode(json: &str) -> Result<Workspace, PersistError> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    if probe.schema_version != SCHEMA_VERSION {
        return Err(PersistError::UnsupportedSchema(probe.schema_version));
    }
    let persisted: PersistedWorkspace = serde_json::from_str(json)?;
    Ok(persisted.workspace)
}

pub fn save_workspace(path: &Path, workspace: &Workspace) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode(workspace)?)?;
    Ok(())
}

pub fn load_workspace(path: &Path) -> Result<Workspace, PersistError> {
    decode(&std::fs::read_to_string(path)?)
}

pub fn default_workspace_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("quay").join("workspace.json"))
}
