use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;
use crate::project::ProjectRef;
use crate::registry::{EntryId, Registry, RegistryEntry, SdkKind};

/// The full contents of a registry. This is what [`super::FileRegistry`] persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    entries: Vec<RegistryEntry>,
    /// Project root -> active entry.
    #[serde(default)]
    active: BTreeMap<String, EntryId>,
}

impl RegistryState {
    fn name_taken(&self, kind: SdkKind, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.kind == kind && entry.name == name)
    }

    fn unique_name(&self, kind: SdkKind, name: &str) -> String {
        if !self.name_taken(kind, name) {
            return name.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{name} ({n})");
            if !self.name_taken(kind, &candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn position(&self, id: EntryId) -> Result<usize, RegistryError> {
        self.entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(RegistryError::UnknownEntry(id))
    }
}

/// A registry held entirely in memory.
///
/// `begin` snapshots the state and `rollback` restores it.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: RegistryState,
    snapshot: Option<RegistryState>,
}

impl MemoryRegistry {
    pub fn from_state(state: RegistryState) -> Self {
        Self {
            state,
            snapshot: None,
        }
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    pub(crate) fn in_scope(&self) -> bool {
        self.snapshot.is_some()
    }

    fn ensure_writable(&self) -> Result<(), RegistryError> {
        if self.snapshot.is_none() {
            return Err(RegistryError::OutsideWriteScope);
        }
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    fn entries(&self, kind: SdkKind) -> Vec<RegistryEntry> {
        self.state
            .entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .cloned()
            .collect()
    }

    fn entry(&self, id: EntryId) -> Option<RegistryEntry> {
        self.state.entries.iter().find(|entry| entry.id == id).cloned()
    }

    fn create_entry(
        &mut self,
        kind: SdkKind,
        name: &str,
        home_path: &Path,
    ) -> Result<RegistryEntry, RegistryError> {
        self.ensure_writable()?;
        if home_path.as_os_str().is_empty() {
            return Err(RegistryError::EmptyHomePath);
        }

        self.state.next_id += 1;
        let entry = RegistryEntry {
            id: EntryId(self.state.next_id),
            name: self.state.unique_name(kind, name),
            home_path: home_path.to_path_buf(),
            kind,
        };
        debug!("registered {} -> {}", entry.name, entry.home_path.display());
        self.state.entries.push(entry.clone());
        Ok(entry)
    }

    fn rename_entry(&mut self, id: EntryId, name: &str) -> Result<RegistryEntry, RegistryError> {
        self.ensure_writable()?;
        let idx = self.state.position(id)?;
        let entry = &mut self.state.entries[idx];
        debug!("renaming '{}' to '{}'", entry.name, name);
        entry.name = name.to_string();
        Ok(entry.clone())
    }

    fn remove_entry(&mut self, id: EntryId) -> Result<RegistryEntry, RegistryError> {
        self.ensure_writable()?;
        let idx = self.state.position(id)?;
        let removed = self.state.entries.remove(idx);
        self.state.active.retain(|_, active| *active != id);
        Ok(removed)
    }

    fn active_entry(&self, project: &ProjectRef) -> Option<RegistryEntry> {
        let id = self.state.active.get(&project.key())?;
        self.entry(*id)
    }

    fn set_active_entry(&mut self, project: &ProjectRef, id: EntryId) -> Result<(), RegistryError> {
        self.ensure_writable()?;
        self.state.position(id)?;
        self.state.active.insert(project.key(), id);
        Ok(())
    }

    fn is_assigned(&self, id: EntryId) -> bool {
        self.state.active.values().any(|active| *active == id)
    }

    fn begin(&mut self) -> Result<(), RegistryError> {
        if self.snapshot.is_some() {
            return Err(RegistryError::ScopeAlreadyOpen);
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), RegistryError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(RegistryError::OutsideWriteScope)
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.state = snapshot;
        }
    }
}
