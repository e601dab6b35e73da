//! `shipyard ps`: List containers.

use shipyard_common::config::RuntimeConfig;
use shipyard_runtime::engine::Engine;

use crate::output::Table;

/// Executes the `ps` command.
///
/// Containers whose process has vanished are shown as exited.
///
/// # Errors
///
/// Returns an error if the run directory cannot be read.
pub fn execute(config: RuntimeConfig) -> anyhow::Result<()> {
    let containers = Engine::new(config).list()?;

    let mut table = Table::new(&["ID", "NAME", "PID", "STATUS", "COMMAND", "CREATED"]);
    for c in containers {
        table.add_row(vec![
            c.id.to_string(),
            c.name,
            c.pid,
            c.status.to_string(),
            c.command,
            c.create_time,
        ]);
    }
    print!("{}", table.render());
    Ok(())
}
