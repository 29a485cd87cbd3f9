use tracing::{info, instrument};

use crate::error::RegistryError;
use crate::naming::strip_collision_suffix;
use crate::registry::{write_scope, Registry, RegistryEntry, SdkKind};

/// Two entries are duplicates when they share a home path, or when their names
/// agree once a trailing collision suffix like `(2)` is removed.
pub fn is_duplicate(a: &RegistryEntry, b: &RegistryEntry) -> bool {
    a.kind == b.kind
        && (a.home_path == b.home_path
            || strip_collision_suffix(&a.name) == strip_collision_suffix(&b.name))
}

/// Removes duplicate entries of `kind`, keeping one survivor per group.
///
/// The survivor is the entry some project has active, else the earliest
/// registered. Entries that are active for a project are never removed.
#[instrument(skip(registry))]
pub fn cleanup_duplicates<R>(registry: &mut R, kind: SdkKind) -> Result<Vec<RegistryEntry>, RegistryError>
where
    R: Registry + ?Sized,
{
    let mut survivors: Vec<RegistryEntry> = Vec::new();
    let mut doomed: Vec<RegistryEntry> = Vec::new();

    for entry in registry.entries(kind) {
        let Some(idx) = survivors.iter().position(|s| is_duplicate(s, &entry)) else {
            survivors.push(entry);
            continue;
        };

        let entry_assigned = registry.is_assigned(entry.id);
        let survivor_assigned = registry.is_assigned(survivors[idx].id);
        match (survivor_assigned, entry_assigned) {
            (true, true) => survivors.push(entry),
            (false, true) => {
                let replaced = std::mem::replace(&mut survivors[idx], entry);
                doomed.push(replaced);
            }
            _ => doomed.push(entry),
        }
    }

    if doomed.is_empty() {
        return Ok(doomed);
    }

    write_scope(registry, |r| {
        for entry in &doomed {
            info!("removing duplicate sdk '{}' ({})", entry.name, entry.home_path.display());
            r.remove_entry(entry.id)?;
        }
        Ok::<_, RegistryError>(())
    })?;

    Ok(doomed)
}
