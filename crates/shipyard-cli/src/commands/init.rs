//! `shipyard init`: In-container entry point.
//!
//! Invoked by the runtime itself as PID 1 of a new container.

/// Executes the `init` command. Does not return on success.
///
/// # Errors
///
/// Returns an error if the container root cannot be set up or the command
/// cannot be executed.
pub fn execute() -> anyhow::Result<()> {
    tracing::debug!("container init starting");
    shipyard_runtime::init::run_container_init()?;
    Ok(())
}
