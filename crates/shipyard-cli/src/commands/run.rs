//! `shipyard run`: Create and start a container.

use clap::Args;
use shipyard_common::config::RuntimeConfig;
use shipyard_common::types::{ResourceSpec, VolumeSpec};
use shipyard_runtime::engine::{Engine, RunRequest};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach the container to this terminal and wait for it to exit.
    #[arg(short = 't', long = "tty", visible_alias = "ti", conflicts_with = "detach")]
    pub tty: bool,

    /// Run in the background, logging output to a file (the default).
    #[arg(short, long)]
    pub detach: bool,

    /// Container name; defaults to the generated id.
    #[arg(long)]
    pub name: Option<String>,

    /// Memory limit, as accepted by `memory.limit_in_bytes`.
    #[arg(short = 'm', long = "memory", default_value = "")]
    pub memory: String,

    /// Relative CPU weight, as accepted by `cpu.shares`.
    #[arg(long = "cpushare", default_value = "")]
    pub cpu_share: String,

    /// CPUs to run on, as accepted by `cpuset.cpus`.
    #[arg(long = "cpuset", default_value = "")]
    pub cpu_set: String,

    /// Bind a host directory into the container (`host:container`).
    #[arg(short = 'v', long = "volume")]
    pub volume: Option<String>,

    /// Extra environment variable (`KEY=VALUE`); repeatable.
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Port mapping to record (`host:container`); repeatable.
    #[arg(short = 'p', long = "publish")]
    pub ports: Vec<String>,

    /// Image to run, resolved as `<root>/<image>.tar`.
    pub image: String,

    /// Command and arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn into_request(self) -> anyhow::Result<RunRequest> {
        let volume = self
            .volume
            .as_deref()
            .map(|v| {
                VolumeSpec::parse(v)
                    .ok_or_else(|| anyhow::anyhow!("invalid volume {v:?}, expected host:container"))
            })
            .transpose()?;
        Ok(RunRequest {
            tty: self.tty,
            name: self.name,
            resources: ResourceSpec::from_flags(&self.memory, &self.cpu_share, &self.cpu_set),
            image: self.image,
            command: self.command,
            volume,
            env: self.env,
            ports: self.ports,
        })
    }
}

/// Executes the `run` command.
///
/// Prints the container id when detached. With a terminal attached, exits
/// with the container's exit code.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the container cannot be
/// started.
pub fn execute(args: RunArgs, config: RuntimeConfig) -> anyhow::Result<()> {
    let request = args.into_request()?;
    let engine = Engine::new(config);
    let outcome = engine.run(&request)?;

    if let Some(code) = outcome.exit_code {
        std::process::exit(code);
    }
    println!("{}", outcome.id);
    Ok(())
}
