use std::fmt::Debug;

use crate::error::ProvisionError;
use crate::project::ProjectRef;

pub mod uv;

pub use uv::UvBuilder;

/// Materializes an isolated runtime directory for a project.
pub trait EnvironmentBuilder: Debug {
    /// The command line this builder runs, for logs and error messages.
    fn describe(&self) -> String;

    /// Creates the environment inside `project`. Blocks until the build finishes.
    ///
    /// # Errors
    /// Returns [`ProvisionError::ProvisioningFailed`] when the build cannot be
    /// started, exits unsuccessfully, or exceeds its time limit.
    fn build(&self, project: &ProjectRef) -> Result<(), ProvisionError>;
}

impl<B: EnvironmentBuilder + ?Sized> EnvironmentBuilder for &B {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn build(&self, project: &ProjectRef) -> Result<(), ProvisionError> {
        (**self).build(project)
    }
}
