use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use venvreg_core::constants::CONFIG_FILE;
use venvreg_core::{
    cleanup_duplicates, EnvironmentLayout, FileRegistry, Outcome, ProjectRef, Provisioner,
    Registry, SdkKind, UvBuilder, VenvregConfig,
};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod init;
mod styles;

use styles as s;

/// The command-line interface for venvreg.
#[derive(Debug, Parser)]
#[command(name = "venvreg")]
#[command(version)]
#[command(styles = s::get_clap_styles())]
#[command(
    help_template = "{bin} {version}\n\n{about-with-newline}{usage-heading} {usage}\n\n{all-args}{after-help}"
)]
#[command(about = "Keep a project's uv virtualenv and its registered Python SDK in sync")]
#[command(
    long_about = "venvreg makes sure a project has a working `.venv` built by uv, and that the
runtime registry holds exactly one Python SDK entry pointing at its interpreter,
named after the project and Python version, and active for the project.
"
)]
#[command(
    after_help = "\x1b[1;32mExamples:\x1b[0m\n  \x1b[36mvenvreg sync\x1b[0m                 \x1b[2m# Reconcile the current project\x1b[0m\n  \x1b[36mvenvreg ensure ~/src/app\x1b[0m     \x1b[2m# Only build or repair .venv\x1b[0m\n  \x1b[36mvenvreg list --json\x1b[0m          \x1b[2m# Show registered SDKs\x1b[0m\n  \x1b[36mvenvreg dedupe\x1b[0m               \x1b[2m# Remove duplicate registrations\x1b[0m\n  \x1b[36mvenvreg commit-msg \"$1\"\x1b[0m      \x1b[2m# Use as a git commit-msg hook\x1b[0m"
)]
pub(crate) struct Cli {
    /// Path to venvreg config file. Built-in defaults apply if it does not exist.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: String,
    /// Registry file to use instead of the configured one.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default venvreg.toml
    Init {
        /// Overwrite the config file if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Build or repair .venv, register its interpreter, and make it the project's runtime
    Sync {
        /// Project root (defaults to the current directory).
        project: Option<PathBuf>,
    },
    /// Build or repair .venv only, then print the interpreter path
    Ensure {
        /// Project root (defaults to the current directory).
        project: Option<PathBuf>,
    },
    /// List registered Python SDKs
    List {
        /// Print entries as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Remove duplicate Python SDK registrations
    Dedupe,
    /// Check a commit message file (for use as a git commit-msg hook)
    CommitMsg {
        /// File holding the commit message.
        file: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {:?}", cli);

    execute(&cli)
}

/// Executes a parsed command line.
fn execute(cli: &Cli) -> Result<ExitCode> {
    let command = match &cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            return Ok(ExitCode::SUCCESS);
        }
    };

    match command {
        Command::Init { force } => init::run(&cli.config, *force).map(|_| ExitCode::SUCCESS),
        Command::CommitMsg { file } => Ok(commit_msg(file)),
        Command::Sync { project } => {
            let cfg = load_config(cli)?;
            let mut registry = open_registry(cli, &cfg)?;
            let project = resolve_project(project.as_deref())?;
            let outcome = provisioner(&cfg).reconcile(&mut registry, &project)?;
            match &outcome {
                Outcome::AlreadyConfigured(entry) => println!(
                    "{}already configured:{} {} {}({}){}",
                    s::DESC,
                    s::DESC.render_reset(),
                    entry.name,
                    s::DESC,
                    entry.home_path.display(),
                    s::DESC.render_reset()
                ),
                Outcome::Configured { entry, .. } => println!(
                    "{}configured:{} {} -> {}",
                    s::SUCCESS,
                    s::SUCCESS.render_reset(),
                    entry.name,
                    entry.home_path.display()
                ),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Ensure { project } => {
            let cfg = load_config(cli)?;
            let project = resolve_project(project.as_deref())?;
            let handle = provisioner(&cfg).ensure_environment(&project)?;
            println!("{}", handle.runtime_executable_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::List { json } => {
            let cfg = load_config(cli)?;
            let registry = open_registry(cli, &cfg)?;
            list(&registry, *json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Dedupe => {
            let cfg = load_config(cli)?;
            let mut registry = open_registry(cli, &cfg)?;
            let removed = cleanup_duplicates(&mut registry, SdkKind::Python)?;
            if removed.is_empty() {
                println!("no duplicate sdks found");
            }
            for entry in removed {
                println!("removed {} ({})", entry.name, entry.home_path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<VenvregConfig> {
    VenvregConfig::load_or_default(&cli.config)
        .with_context(|| format!("unable to load config '{}'", cli.config))
}

fn open_registry(cli: &Cli, cfg: &VenvregConfig) -> Result<FileRegistry> {
    let path = cli
        .registry
        .clone()
        .or_else(|| cfg.registry.resolved_path())
        .ok_or_else(|| {
            anyhow!("unable to determine a registry location; pass --registry or set registry.path")
        })?;
    debug!("using registry {}", path.display());
    Ok(FileRegistry::open(path)?)
}

fn resolve_project(path: Option<&Path>) -> Result<ProjectRef> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().context("unable to read the current directory")?,
    };
    ProjectRef::resolve(&path)
        .with_context(|| format!("project directory '{}' is not accessible", path.display()))
}

fn provisioner(cfg: &VenvregConfig) -> Provisioner<UvBuilder> {
    Provisioner::new(
        UvBuilder::from_config(&cfg.builder, &cfg.environment),
        EnvironmentLayout::from_config(&cfg.environment),
    )
}

fn list(registry: &FileRegistry, json: bool) -> Result<()> {
    let entries = registry.entries(SdkKind::Python);
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("no python sdks registered in {}", registry.path().display());
    }
    for entry in entries {
        let marker = if registry.is_assigned(entry.id) { "*" } else { " " };
        println!(
            "{marker} {:>3}  {}  {}{}{}",
            entry.id,
            entry.name,
            s::DESC,
            entry.home_path.display(),
            s::DESC.render_reset()
        );
    }
    Ok(())
}

/// Prints the verdict; a rejected message exits 1 so git aborts the commit.
fn commit_msg(file: &Path) -> ExitCode {
    match venvreg_hooks::check_commit_message_file(file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}{}{}", s::ERROR, e, s::ERROR.render_reset());
            ExitCode::FAILURE
        }
    }
}
