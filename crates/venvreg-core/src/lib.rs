//! Core logic for venvreg.
//!
//! This crate defines the project and environment model, the environment
//! builder and runtime registry ports with their default implementations, and
//! the provisioner that reconciles the two.

pub mod builder;
pub mod config;
pub mod constants;
pub mod error;
pub mod naming;
pub mod project;
pub mod provision;
pub mod registry;

pub use builder::{EnvironmentBuilder, UvBuilder};
pub use config::VenvregConfig;
pub use error::{ProvisionError, RegistryError};
pub use project::{EnvironmentHandle, EnvironmentLayout, ProjectRef};
pub use provision::{Outcome, Provisioner};
pub use registry::{
    cleanup_duplicates, write_scope, EntryId, FileRegistry, MemoryRegistry, Registry,
    RegistryEntry, SdkKind,
};
