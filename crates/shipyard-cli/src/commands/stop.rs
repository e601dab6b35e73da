//! `shipyard stop`: Stop a running container.

use clap::Args;
use shipyard_common::config::RuntimeConfig;
use shipyard_runtime::engine::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// Sends `SIGTERM` to the container's init process and marks it stopped.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be signalled.
pub fn execute(args: &StopArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let info = Engine::new(config).stop(&args.container)?;
    println!("{}", info.name);
    Ok(())
}
