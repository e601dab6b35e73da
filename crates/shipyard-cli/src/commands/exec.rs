//! `shipyard exec`: Run a command inside a running container.

use anyhow::Context;
use clap::Args;
use shipyard_common::config::RuntimeConfig;
use shipyard_runtime::engine::Engine;
use shipyard_runtime::exec::{exec_target_from_env, run_in_container};

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: Option<String>,

    /// Command to execute.
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command and exits with the command's exit code.
///
/// When re-invoked by the runtime with the target in the environment, joins
/// the container's namespaces and runs the command there instead.
///
/// # Errors
///
/// Returns an error if the container is not running or the command cannot
/// be started.
pub fn execute(args: ExecArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    if let Some(target) = exec_target_from_env()? {
        tracing::debug!(pid = target.pid, command = %target.command, "entering container namespaces");
        let code = run_in_container(&target)?;
        std::process::exit(code);
    }

    let container = args.container.context("missing container name")?;
    if args.command.is_empty() {
        anyhow::bail!("missing command to run in {container}");
    }
    let code = Engine::new(config).exec(&container, &args.command)?;
    std::process::exit(code);
}
