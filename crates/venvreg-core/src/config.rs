use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::constants::*;

#[derive(Debug, Default, Deserialize)]
pub struct VenvregConfig {
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl VenvregConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        let cfg = toml::from_str::<Self>(&text)
            .with_context(|| format!("failed to parse TOML config: {path}"))?;
        Ok(cfg)
    }

    /// Loads `path` if it exists, otherwise falls back to built-in defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            return Self::load_from_file(path);
        }
        debug!("config file {} not found, using defaults", path);
        Ok(Self::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment directory, relative to the project root.
    #[serde(default = "default_env_dir")]
    pub dir: String,
    /// Interpreter name inside `<dir>/bin`.
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_version")]
    pub default_version: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            dir: default_env_dir(),
            runtime: default_runtime(),
            display_name: default_display_name(),
            default_version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    #[serde(default = "default_builder_program")]
    pub program: String,
    /// Arguments passed to the builder. Defaults to `venv <environment.dir>`.
    pub args: Option<Vec<String>>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BuilderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolved_args(&self, env: &EnvironmentConfig) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => vec!["venv".to_string(), env.dir.clone()],
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            program: default_builder_program(),
            args: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Location of the registry file. Defaults to `<config dir>/venvreg/registry.toml`.
    pub path: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR).join(REGISTRY_FILE)))
    }
}

fn default_env_dir() -> String {
    ENV_DIR.to_string()
}

fn default_runtime() -> String {
    RUNTIME_EXECUTABLE.to_string()
}

fn default_display_name() -> String {
    RUNTIME_DISPLAY_NAME.to_string()
}

fn default_version() -> String {
    DEFAULT_RUNTIME_VERSION.to_string()
}

fn default_builder_program() -> String {
    BUILDER_PROGRAM.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_BUILDER_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: VenvregConfig = toml::from_str("").expect("empty config should parse");
        assert_eq!(cfg.environment.dir, ".venv");
        assert_eq!(cfg.environment.runtime, "python");
        assert_eq!(cfg.environment.default_version, "3.12");
        assert_eq!(cfg.builder.program, "uv");
        assert_eq!(
            cfg.builder.resolved_args(&cfg.environment),
            vec!["venv", ".venv"]
        );
        assert_eq!(cfg.builder.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn builder_args_follow_environment_dir() {
        let cfg: VenvregConfig = toml::from_str(
            r#"
            [environment]
            dir = ".env"

            [builder]
            timeout_secs = 30
            "#,
        )
        .expect("config should parse");
        assert_eq!(
            cfg.builder.resolved_args(&cfg.environment),
            vec!["venv", ".env"]
        );
        assert_eq!(cfg.builder.timeout_secs, 30);
    }

    #[test]
    fn explicit_registry_path_wins() {
        let cfg: VenvregConfig = toml::from_str(
            r#"
            [registry]
            path = "/tmp/sdks.toml"
            "#,
        )
        .expect("config should parse");
        assert_eq!(
            cfg.registry.resolved_path(),
            Some(PathBuf::from("/tmp/sdks.toml"))
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cfg = VenvregConfig::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.environment.display_name, "Python");
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venvreg.toml");
        std::fs::write(&path, "[environment\n").unwrap();
        let err = VenvregConfig::load_or_default(path.to_str().unwrap()).expect_err("must fail");
        assert!(err.to_string().contains("failed to parse TOML config"));
    }
}
