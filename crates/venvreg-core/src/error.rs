use std::path::PathBuf;

use thiserror::Error;

use crate::registry::EntryId;

/// Failures surfaced by the environment provisioner.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The builder could not be started, exited non-zero, timed out, or left no environment.
    #[error("failed to provision environment: {reason}{}", captured(.output))]
    ProvisioningFailed { reason: String, output: String },

    /// The environment exists but has no usable interpreter, even after one repair attempt.
    #[error("environment at '{}' is corrupt: missing interpreter '{}'", .path.display(), .executable.display())]
    CorruptEnvironment { path: PathBuf, executable: PathBuf },

    #[error("registry refused to create entry: {0}")]
    RegistrationFailed(#[source] RegistryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

fn captured(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", output.trim_end())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no registry entry with id {0}")]
    UnknownEntry(EntryId),

    #[error("registry mutation attempted outside a write scope")]
    OutsideWriteScope,

    #[error("a write scope is already open")]
    ScopeAlreadyOpen,

    #[error("home path must not be empty")]
    EmptyHomePath,

    #[error("failed to persist registry to '{}': {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load registry from '{}': {reason}", .path.display())]
    Load { path: PathBuf, reason: String },
}
