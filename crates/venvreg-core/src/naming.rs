//! Registry entry naming derived from the project and the environment metadata.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::constants::METADATA_FILE;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

/// Extracts `<major>.<minor>` from the first `version = ...` line of the metadata text.
pub fn parse_runtime_version(metadata: &str) -> Option<String> {
    let re = VERSION_RE
        .get_or_init(|| Regex::new(r"version\s*=\s*(\d+\.\d+)").expect("version regex"));
    metadata
        .lines()
        .find_map(|line| re.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Reads the environment's metadata file, falling back to `default` when it is
/// missing, unreadable, or carries no version line.
pub fn runtime_version(environment_path: &Path, default: &str) -> String {
    let path = environment_path.join(METADATA_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => parse_runtime_version(&text).unwrap_or_else(|| {
            debug!("no version line in {}, using {}", path.display(), default);
            default.to_string()
        }),
        Err(e) => {
            debug!("could not read {}: {}, using {}", path.display(), e, default);
            default.to_string()
        }
    }
}

/// `"<Runtime> <version> (.venv <project>)"`
pub fn derive_sdk_name(display_name: &str, version: &str, project_name: &str) -> String {
    format!("{display_name} {version} (.venv {project_name})")
}

static SUFFIX_RE: OnceLock<Regex> = OnceLock::new();

/// Strips a trailing collision suffix such as `(2)` added by the registry.
pub fn strip_collision_suffix(name: &str) -> &str {
    let re = SUFFIX_RE.get_or_init(|| Regex::new(r"\(\d+\)$").expect("suffix regex"));
    match re.find(name) {
        Some(m) => name[..m.start()].trim_end(),
        None => name.trim_end(),
    }
}
