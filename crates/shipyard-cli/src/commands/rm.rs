//! `shipyard rm`: Remove a stopped container.

use clap::Args;
use shipyard_common::config::RuntimeConfig;
use shipyard_runtime::engine::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// Unmounts and deletes the container's workspace, removes its cgroups,
/// and deletes its record.
///
/// # Errors
///
/// Returns an error if the container is still running or a teardown step
/// failed.
pub fn execute(args: &RmArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    Engine::new(config).remove(&args.container)?;
    println!("{}", args.container);
    Ok(())
}
