//! Constants used across the venvreg workspace.

/// The filename for venvreg's configuration.
pub const CONFIG_FILE: &str = "venvreg.toml";

/// Directory name (under the platform config dir) holding venvreg state.
pub const APP_DIR: &str = "venvreg";

/// The filename of the persisted runtime registry.
pub const REGISTRY_FILE: &str = "registry.toml";

/// Conventional environment directory inside a project root.
pub const ENV_DIR: &str = ".venv";

/// Interpreter executable inside `<env>/bin`.
pub const RUNTIME_EXECUTABLE: &str = "python";

/// Human-facing runtime name used when naming registry entries.
pub const RUNTIME_DISPLAY_NAME: &str = "Python";

/// Environment metadata written by the builder.
pub const METADATA_FILE: &str = "pyvenv.cfg";

/// Version assumed when the metadata file is missing or unparseable.
pub const DEFAULT_RUNTIME_VERSION: &str = "3.12";

/// The environment builder binary.
pub const BUILDER_PROGRAM: &str = "uv";
pub const DEFAULT_BUILDER_TIMEOUT_SECS: u64 = 300;
