use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};

use tracing::{info, instrument};

/// Writes a default `venvreg.toml` to `path`.
#[instrument]
pub fn run(path: &str, force: bool) -> Result<()> {
    write_if_absent(path, &render_config(), force)
        .with_context(|| format!("failed to write '{}'", path))?;

    // Parse what we wrote so a broken template fails here, not on the next sync.
    venvreg_core::VenvregConfig::load_from_file(path)?;

    info!("init complete: config={}", path);
    println!("next: run 'venvreg sync'");
    Ok(())
}

fn render_config() -> String {
    r#"# venvreg configuration

[environment]
# Environment directory, relative to the project root.
dir = ".venv"
# Interpreter inside <dir>/bin.
runtime = "python"
display_name = "Python"
# Used when <dir>/pyvenv.cfg has no `version = X.Y` line.
default_version = "3.12"

[builder]
program = "uv"
# Defaults to ["venv", <environment.dir>].
# args = ["venv", ".venv", "--seed"]
timeout_secs = 300

[registry]
# Defaults to <config dir>/venvreg/registry.toml.
# path = "/home/me/.config/venvreg/registry.toml"
"#
    .to_string()
}

fn write_if_absent(path: &str, content: &str, force: bool) -> Result<()> {
    let output = Path::new(path);

    if output.exists() && !force {
        return Err(anyhow!(
            "'{}' already exists. Re-run with --force to overwrite",
            path
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }

    fs::write(output, content)
        .with_context(|| format!("failed to write file '{}'", output.display()))
}
