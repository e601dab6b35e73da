//! `shipyard commit`: Save a container's filesystem as an image.

use std::path::PathBuf;

use clap::Args;
use shipyard_common::config::RuntimeConfig;
use shipyard_runtime::engine::Engine;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub container: String,

    /// Name of the image to create.
    pub image: String,

    /// Directory to write `<image>.tar` to; defaults to the image root.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or archiving fails.
pub fn execute(args: &CommitArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let archive = Engine::new(config).commit(&args.container, &args.image, args.output.as_deref())?;
    println!("{}", archive.display());
    Ok(())
}
