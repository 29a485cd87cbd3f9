use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::RegistryError;
use crate::project::ProjectRef;

pub mod dedupe;
pub mod file;
pub mod memory;

pub use dedupe::cleanup_duplicates;
pub use file::FileRegistry;
pub use memory::MemoryRegistry;

/// The kind of runtime an entry registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkKind {
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named runtime registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: EntryId,
    pub name: String,
    pub home_path: PathBuf,
    pub kind: SdkKind,
}

/// A store of named runtime registrations.
///
/// Mutations are only accepted between [`Registry::begin`] and
/// [`Registry::commit`]; use [`write_scope`] rather than calling those directly.
pub trait Registry {
    /// All entries of `kind`, in registration order.
    fn entries(&self, kind: SdkKind) -> Vec<RegistryEntry>;

    fn entry(&self, id: EntryId) -> Option<RegistryEntry>;

    /// Registers `home_path`. The registry may suffix `name` with ` (<n>)` to keep names unique.
    fn create_entry(
        &mut self,
        kind: SdkKind,
        name: &str,
        home_path: &Path,
    ) -> Result<RegistryEntry, RegistryError>;

    fn rename_entry(&mut self, id: EntryId, name: &str) -> Result<RegistryEntry, RegistryError>;

    /// Removes the entry and any project assignment pointing at it.
    fn remove_entry(&mut self, id: EntryId) -> Result<RegistryEntry, RegistryError>;

    fn active_entry(&self, project: &ProjectRef) -> Option<RegistryEntry>;

    fn set_active_entry(&mut self, project: &ProjectRef, id: EntryId) -> Result<(), RegistryError>;

    /// Whether any project uses the entry as its active runtime.
    fn is_assigned(&self, id: EntryId) -> bool;

    fn begin(&mut self) -> Result<(), RegistryError>;

    fn commit(&mut self) -> Result<(), RegistryError>;

    fn rollback(&mut self);
}

/// Looks up the entry of `kind` registered for `home_path`, whatever its name.
pub fn find_by_home_path<R>(registry: &R, kind: SdkKind, home_path: &Path) -> Option<RegistryEntry>
where
    R: Registry + ?Sized,
{
    registry
        .entries(kind)
        .into_iter()
        .find(|entry| entry.home_path == home_path)
}

/// An open write scope. Rolls back on drop unless committed.
pub struct WriteScope<'a, R: Registry + ?Sized> {
    registry: &'a mut R,
    committed: bool,
}

impl<'a, R: Registry + ?Sized> WriteScope<'a, R> {
    pub fn open(registry: &'a mut R) -> Result<Self, RegistryError> {
        registry.begin()?;
        Ok(Self {
            registry,
            committed: false,
        })
    }

    pub fn commit(mut self) -> Result<(), RegistryError> {
        self.committed = true;
        self.registry.commit()
    }
}

impl<R: Registry + ?Sized> Deref for WriteScope<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.registry
    }
}

impl<R: Registry + ?Sized> DerefMut for WriteScope<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.registry
    }
}

impl<R: Registry + ?Sized> Drop for WriteScope<'_, R> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("rolling back registry write scope");
            self.registry.rollback();
        }
    }
}

/// Runs `f` inside a write scope: commits when it returns `Ok`, rolls back on
/// `Err` or panic.
#[instrument(skip_all)]
pub fn write_scope<R, T, E, F>(registry: &mut R, f: F) -> Result<T, E>
where
    R: Registry + ?Sized,
    E: From<RegistryError>,
    F: FnOnce(&mut R) -> Result<T, E>,
{
    let mut scope = WriteScope::open(registry)?;
    match f(&mut *scope) {
        Ok(value) => {
            scope.commit()?;
            Ok(value)
        }
        Err(e) => {
            warn!("registry write scope aborted");
            Err(e)
        }
    }
}
