//! `shipyard logs`: View container logs.

use clap::Args;
use shipyard_common::config::RuntimeConfig;
use shipyard_runtime::engine::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// Prints the captured stdout of a detached container.
///
/// # Errors
///
/// Returns an error if the container is not found or its log is unreadable.
pub fn execute(args: &LogsArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let logs = Engine::new(config).logs(&args.container)?;
    print!("{logs}");
    Ok(())
}
