use crate::config::{Config, ConfigFile};
use crate::errors::*;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Increase logging output (can be used multiple times)
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Change the current directory to this path before executing the subcommand
    #[arg(short = 'C', long)]
    pub context: Option<PathBuf>,
    /// Load settings from this file instead of ./digest-pin.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    Scan(Scan),
    Pin(Pin),
    Release(Release),
    Completions(Completions),
}

/// Settings that can be passed on the command line, overriding the config file
#[derive(Debug, Default, Parser)]
pub struct Overrides {
    /// Path of the manifest, relative to the checkout
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
    /// Only pin images starting with this prefix (can be used multiple times)
    #[arg(short, long = "prefix")]
    pub prefixes: Vec<String>,
    /// The container engine used to pull, inspect and build images
    #[arg(long)]
    pub engine: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: Config) -> Config {
        config.merge(ConfigFile {
            manifest: self.manifest.clone(),
            prefixes: (!self.prefixes.is_empty()).then(|| self.prefixes.clone()),
            engine: self.engine.clone(),
            ..Default::default()
        })
    }
}

/// List the image references that would be pinned
#[derive(Debug, Parser)]
pub struct Scan {
    #[command(flatten)]
    pub overrides: Overrides,
}

/// Pin the images of a manifest in the current checkout to their digests
#[derive(Debug, Parser)]
pub struct Pin {
    #[command(flatten)]
    pub overrides: Overrides,
    /// Do not attempt to pull the images from the registry before resolving them
    #[arg(long)]
    pub no_pull: bool,
    /// Resolve all images and show the changes, but don't modify the manifest
    #[arg(short = 'n', long)]
    pub dry_run: bool,
    /// Write the resolved digests to this lockfile
    #[arg(short, long)]
    pub lockfile: Option<PathBuf>,
}

/// Clone a branch, pin its manifest and build an index image from it
#[derive(Debug, Parser)]
pub struct Release {
    #[command(flatten)]
    pub overrides: Overrides,
    /// The git repository to clone
    #[arg(long)]
    pub repository: Option<String>,
    /// The directory inside the checkout to build the image from
    #[arg(long)]
    pub build_context: Option<PathBuf>,
    /// Do not attempt to pull the images from the registry before resolving them
    #[arg(long)]
    pub no_pull: bool,
    /// Do not delete the checkout after the build
    #[arg(short, long)]
    pub keep: bool,
    /// The branch to release from
    pub branch: String,
    /// The target image name, without tag (e.g. quay.io/example/serverless-operator-index)
    pub target: String,
}

impl Release {
    pub fn apply(&self, config: Config) -> Config {
        self.overrides.apply(config).merge(ConfigFile {
            repository: self.repository.clone(),
            build_context: self.build_context.clone(),
            ..Default::default()
        })
    }
}

/// Generate shell completions
#[derive(Debug, Parser)]
pub struct Completions {
    pub shell: Shell,
}

impl Completions {
    pub fn generate<W: io::Write>(&self, mut w: W) -> Result<()> {
        clap_complete::generate(self.shell, &mut Args::command(), "digest-pin", &mut w);
        Ok(())
    }
}
