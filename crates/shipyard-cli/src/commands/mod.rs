//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod logs;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shipyard_common::config::RuntimeConfig;
use shipyard_common::constants::{DEFAULT_CGROUP_ROOT, DEFAULT_ROOT_DIR, DEFAULT_RUN_DIR, SELF_EXE};

/// shipyard: a minimal daemon-less container runtime.
#[derive(Parser, Debug)]
#[command(name = "shipyard", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding image archives, layers, and container mounts.
    #[arg(long, global = true, env = "SHIPYARD_ROOT", default_value = DEFAULT_ROOT_DIR)]
    pub root: PathBuf,

    /// Directory holding per-container records and logs.
    #[arg(long, global = true, env = "SHIPYARD_RUN_DIR", default_value = DEFAULT_RUN_DIR)]
    pub run_dir: PathBuf,

    /// Mount point of the cgroup controller hierarchies.
    #[arg(long, global = true, env = "SHIPYARD_CGROUP_ROOT", default_value = DEFAULT_CGROUP_ROOT)]
    pub cgroup_root: PathBuf,
}

impl Cli {
    /// Builds the runtime configuration from the global flags.
    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            mnt_dir: self.root.join("mnt"),
            root_dir: self.root.clone(),
            run_dir: self.run_dir.clone(),
            cgroup_root: self.cgroup_root.clone(),
            self_exe: PathBuf::from(SELF_EXE),
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// Container entry point; not for direct use.
    #[command(hide = true)]
    Init,
    /// List containers.
    Ps,
    /// Print the output of a detached container.
    Logs(logs::LogsArgs),
    /// Run a command inside a running container.
    Exec(exec::ExecArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// Save a container's filesystem as an image archive.
    Commit(commit::CommitArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.runtime_config();
    match cli.command {
        Command::Run(args) => run::execute(args, config),
        Command::Init => init::execute(),
        Command::Ps => ps::execute(config),
        Command::Logs(args) => logs::execute(&args, config),
        Command::Exec(args) => exec::execute(args, config),
        Command::Stop(args) => stop::execute(&args, config),
        Command::Rm(args) => rm::execute(&args, config),
        Command::Commit(args) => commit::execute(&args, config),
    }
}
