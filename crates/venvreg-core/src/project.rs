use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use crate::config::EnvironmentConfig;
use crate::registry::SdkKind;

/// Root directory of a project whose environment is being reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    root: PathBuf,
}

impl ProjectRef {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonicalizes `path` so registry keys and home paths are absolute.
    pub fn resolve(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(path.canonicalize()?))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The final path component, used when naming registry entries.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub(crate) fn key(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }
}

impl Display for ProjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

/// Paths of a project's environment. Computed fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    pub environment_path: PathBuf,
    pub runtime_executable_path: PathBuf,
}

impl EnvironmentHandle {
    pub fn environment_exists(&self) -> bool {
        self.environment_path.exists()
    }

    /// True when the interpreter resolves to an executable regular file.
    pub fn is_usable(&self) -> bool {
        match std::fs::metadata(&self.runtime_executable_path) {
            Ok(meta) => meta.is_file() && is_executable(&meta),
            Err(_) => false,
        }
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

/// Naming convention for environments and the registry entries that point at them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentLayout {
    pub dir_name: String,
    pub runtime: String,
    pub display_name: String,
    pub default_version: String,
    pub kind: SdkKind,
}

impl EnvironmentLayout {
    pub fn from_config(cfg: &EnvironmentConfig) -> Self {
        Self {
            dir_name: cfg.dir.clone(),
            runtime: cfg.runtime.clone(),
            display_name: cfg.display_name.clone(),
            default_version: cfg.default_version.clone(),
            kind: SdkKind::Python,
        }
    }

    pub fn locate(&self, project: &ProjectRef) -> EnvironmentHandle {
        let environment_path = project.path().join(&self.dir_name);
        let runtime_executable_path = environment_path.join("bin").join(&self.runtime);
        EnvironmentHandle {
            environment_path,
            runtime_executable_path,
        }
    }
}

impl Default for EnvironmentLayout {
    fn default() -> Self {
        Self::from_config(&EnvironmentConfig::default())
    }
}
