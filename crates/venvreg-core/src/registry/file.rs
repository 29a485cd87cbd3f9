use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RegistryError;
use crate::project::ProjectRef;
use crate::registry::memory::{MemoryRegistry, RegistryState};
use crate::registry::{EntryId, Registry, RegistryEntry, SdkKind};

/// A registry persisted as TOML. Changes reach disk only when a write scope commits.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    inner: MemoryRegistry,
}

impl FileRegistry {
    /// Loads the registry at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let state = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| RegistryError::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            toml::from_str::<RegistryState>(&text).map_err(|e| RegistryError::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            debug!("registry {} does not exist yet", path.display());
            RegistryState::default()
        };

        Ok(Self {
            path,
            inner: MemoryRegistry::from_state(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), RegistryError> {
        let persist_err = |source: std::io::Error| RegistryError::Persist {
            path: self.path.clone(),
            source,
        };

        let text = toml::to_string_pretty(self.inner.state()).map_err(|e| {
            persist_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }
        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, text).map_err(persist_err)?;
        fs::rename(&staging, &self.path).map_err(persist_err)?;
        info!("registry saved to {}", self.path.display());
        Ok(())
    }
}

impl Registry for FileRegistry {
    fn entries(&self, kind: SdkKind) -> Vec<RegistryEntry> {
        self.inner.entries(kind)
    }

    fn entry(&self, id: EntryId) -> Option<RegistryEntry> {
        self.inner.entry(id)
    }

    fn create_entry(
        &mut self,
        kind: SdkKind,
        name: &str,
        home_path: &Path,
    ) -> Result<RegistryEntry, RegistryError> {
        self.inner.create_entry(kind, name, home_path)
    }

    fn rename_entry(&mut self, id: EntryId, name: &str) -> Result<RegistryEntry, RegistryError> {
        self.inner.rename_entry(id, name)
    }

    fn remove_entry(&mut self, id: EntryId) -> Result<RegistryEntry, RegistryError> {
        self.inner.remove_entry(id)
    }

    fn active_entry(&self, project: &ProjectRef) -> Option<RegistryEntry> {
        self.inner.active_entry(project)
    }

    fn set_active_entry(&mut self, project: &ProjectRef, id: EntryId) -> Result<(), RegistryError> {
        self.inner.set_active_entry(project, id)
    }

    fn is_assigned(&self, id: EntryId) -> bool {
        self.inner.is_assigned(id)
    }

    fn begin(&mut self) -> Result<(), RegistryError> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), RegistryError> {
        if !self.inner.in_scope() {
            return Err(RegistryError::OutsideWriteScope);
        }
        if let Err(e) = self.persist() {
            self.inner.rollback();
            return Err(e);
        }
        self.inner.commit()
    }

    fn rollback(&mut self) {
        self.inner.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::write_scope;

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::open(dir.path().join("registry.toml")).unwrap();
        assert!(registry.entries(SdkKind::Python).is_empty());
    }

    #[test]
    fn committed_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/registry.toml");
        let project = ProjectRef::new("/work/proj1");

        let mut registry = FileRegistry::open(&path).unwrap();
        let entry = write_scope(&mut registry, |r| {
            let entry = r.create_entry(
                SdkKind::Python,
                "Python 3.12 (.venv proj1)",
                Path::new("/work/proj1/.venv/bin/python"),
            )?;
            r.set_active_entry(&project, entry.id)?;
            Ok::<_, RegistryError>(entry)
        })
        .unwrap();

        let reopened = FileRegistry::open(&path).unwrap();
        assert_eq!(reopened.entries(SdkKind::Python), vec![entry.clone()]);
        assert_eq!(reopened.active_entry(&project), Some(entry));
    }

    #[test]
    fn rolled_back_changes_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");

        let mut registry = FileRegistry::open(&path).unwrap();
        let result: Result<(), RegistryError> = write_scope(&mut registry, |r| {
            r.create_entry(SdkKind::Python, "Python 3.12", Path::new("/p/.venv/bin/python"))?;
            Err(RegistryError::EmptyHomePath)
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(registry.entries(SdkKind::Python).is_empty());
    }

    #[test]
    fn corrupt_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        fs::write(&path, "entries = 7").unwrap();
        let err = FileRegistry::open(&path).expect_err("must fail");
        assert!(matches!(err, RegistryError::Load { .. }));
    }
}
