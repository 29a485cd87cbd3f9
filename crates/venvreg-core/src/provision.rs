//! Reconciles a project's environment with its runtime registration.
//!
//! Reconciliation runs three phases: [`Provisioner::ensure_environment`]
//! makes sure `<project>/.venv` holds a usable interpreter,
//! [`Provisioner::reconcile_registration`] finds or creates the registry entry
//! for that interpreter, and [`Provisioner::assign_and_activate`] makes it the
//! project's active runtime under its canonical name. The phases are not
//! transactional with each other: an environment built before a registry
//! failure stays on disk.

use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::builder::EnvironmentBuilder;
use crate::error::ProvisionError;
use crate::naming::{derive_sdk_name, runtime_version};
use crate::project::{EnvironmentHandle, EnvironmentLayout, ProjectRef};
use crate::registry::{find_by_home_path, write_scope, Registry, RegistryEntry};

/// Result of a full reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The project already had an active runtime of the right kind; nothing was touched.
    AlreadyConfigured(RegistryEntry),
    Configured {
        entry: RegistryEntry,
        handle: EnvironmentHandle,
    },
}

impl Outcome {
    pub fn entry(&self) -> &RegistryEntry {
        match self {
            Self::AlreadyConfigured(entry) => entry,
            Self::Configured { entry, .. } => entry,
        }
    }
}

#[derive(Debug)]
pub struct Provisioner<B> {
    builder: B,
    layout: EnvironmentLayout,
}

impl<B: EnvironmentBuilder> Provisioner<B> {
    pub fn new(builder: B, layout: EnvironmentLayout) -> Self {
        Self { builder, layout }
    }

    /// Runs the whole reconciliation for `project`.
    ///
    /// Returns early, without invoking the builder, when the project already
    /// has an active entry of the layout's kind.
    #[instrument(skip(self, registry), fields(project = %project))]
    pub fn reconcile<R>(&self, registry: &mut R, project: &ProjectRef) -> Result<Outcome, ProvisionError>
    where
        R: Registry + ?Sized,
    {
        if let Some(active) = registry.active_entry(project) {
            if active.kind == self.layout.kind {
                info!("project runtime is already set to '{}'", active.name);
                return Ok(Outcome::AlreadyConfigured(active));
            }
            debug!("active entry '{}' is not a {:?} runtime", active.name, self.layout.kind);
        }

        let handle = self.ensure_environment(project)?;
        let entry = self.reconcile_registration(registry, project, &handle)?;
        let entry = self.assign_and_activate(registry, project, entry)?;
        info!("project runtime set to '{}'", entry.name);

        Ok(Outcome::Configured { entry, handle })
    }

    /// Makes sure the project's environment exists and holds an interpreter.
    ///
    /// A missing environment is built once. An environment without an
    /// interpreter is deleted and rebuilt once; if the rebuild is still broken
    /// the error is returned rather than retried.
    #[instrument(skip(self), fields(project = %project))]
    pub fn ensure_environment(&self, project: &ProjectRef) -> Result<EnvironmentHandle, ProvisionError> {
        let handle = self.layout.locate(project);

        if !handle.environment_exists() {
            info!(
                "no environment at {}, running '{}'",
                handle.environment_path.display(),
                self.builder.describe()
            );
            self.build(project, &handle)?;
        }

        if handle.is_usable() {
            return Ok(handle);
        }

        warn!(
            "environment at {} has no interpreter at {}, recreating it",
            handle.environment_path.display(),
            handle.runtime_executable_path.display()
        );
        remove_environment(&handle.environment_path)?;
        self.build(project, &handle)?;

        if !handle.is_usable() {
            return Err(ProvisionError::CorruptEnvironment {
                path: handle.environment_path.clone(),
                executable: handle.runtime_executable_path.clone(),
            });
        }
        Ok(handle)
    }

    /// Returns the entry registered for the handle's interpreter, creating it if absent.
    ///
    /// Existing entries are matched on home path only, so an entry renamed by
    /// the user or suffixed by the registry still counts.
    #[instrument(skip(self, registry, handle), fields(project = %project))]
    pub fn reconcile_registration<R>(
        &self,
        registry: &mut R,
        project: &ProjectRef,
        handle: &EnvironmentHandle,
    ) -> Result<RegistryEntry, ProvisionError>
    where
        R: Registry + ?Sized,
    {
        let home = &handle.runtime_executable_path;
        if let Some(existing) = find_by_home_path(&*registry, self.layout.kind, home) {
            info!("runtime already registered as '{}'", existing.name);
            return Ok(existing);
        }

        let name = self.proper_name(project);
        info!("registering '{}' for {}", name, home.display());
        write_scope(registry, |r| r.create_entry(self.layout.kind, &name, home))
            .map_err(ProvisionError::RegistrationFailed)
    }

    /// Points the project at `entry` and gives the entry its canonical name,
    /// both in a single registry write scope.
    #[instrument(skip(self, registry, entry), fields(project = %project, entry = %entry.name))]
    pub fn assign_and_activate<R>(
        &self,
        registry: &mut R,
        project: &ProjectRef,
        entry: RegistryEntry,
    ) -> Result<RegistryEntry, ProvisionError>
    where
        R: Registry + ?Sized,
    {
        let proper = self.proper_name(project);
        let activated = write_scope(registry, |r| {
            let entry = if entry.name == proper {
                entry
            } else {
                info!("renaming '{}' to '{}'", entry.name, proper);
                r.rename_entry(entry.id, &proper)?
            };
            r.set_active_entry(project, entry.id)?;
            Ok::<_, ProvisionError>(entry)
        })?;
        Ok(activated)
    }

    /// `"<Runtime> <version> (.venv <project>)"` for the project's current environment.
    pub fn proper_name(&self, project: &ProjectRef) -> String {
        let handle = self.layout.locate(project);
        let version = runtime_version(&handle.environment_path, &self.layout.default_version);
        derive_sdk_name(&self.layout.display_name, &version, &project.name())
    }

    fn build(&self, project: &ProjectRef, handle: &EnvironmentHandle) -> Result<(), ProvisionError> {
        self.builder.build(project)?;
        if !handle.environment_path.is_dir() {
            return Err(ProvisionError::ProvisioningFailed {
                reason: format!(
                    "'{}' succeeded but produced no environment at {}",
                    self.builder.describe(),
                    handle.environment_path.display()
                ),
                output: String::new(),
            });
        }
        Ok(())
    }
}

/// Deletes a broken environment, including everything inside it.
fn remove_environment(path: &Path) -> Result<(), ProvisionError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|e| {
        ProvisionError::io(
            format!("failed to remove broken environment {}", path.display()),
            e,
        )
    })
}
