use clap::Parser;
use digest_pin::args::{self, Args, SubCommand};
use digest_pin::config::{Config, ConfigFile};
use digest_pin::container::Runtime;
use digest_pin::errors::*;
use digest_pin::pin::{self, PinOptions};
use digest_pin::release;
use digest_pin::resolver::ContainerResolver;
use std::env;
use std::io;

async fn load_config(args: &Args) -> Result<Config> {
    let file = ConfigFile::load(args.config.as_deref()).await?;
    Ok(Config::default().merge(file))
}

async fn scan_manifest(scan_args: &args::Scan, config: Config) -> Result<()> {
    let config = scan_args.overrides.apply(config);
    config.validate()?;

    let text = pin::read_manifest(&config.manifest).await?;
    let images = pin::collect_images(&text, config.prefixes.as_slice());
    for image in &images {
        println!("{image}");
    }
    Ok(())
}

async fn pin_manifest(pin_args: &args::Pin, config: Config) -> Result<()> {
    let config = pin_args.overrides.apply(config);
    config.validate()?;

    let resolver = ContainerResolver::new(Runtime::new(&config.engine), !pin_args.no_pull);
    pin::pin_manifest(
        &config.manifest,
        config.prefixes.as_slice(),
        &resolver,
        &PinOptions {
            dry_run: pin_args.dry_run,
            lockfile: pin_args.lockfile.as_deref(),
        },
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(log_level));

    if let Some(path) = &args.context {
        debug!("Changing current directory to {path:?}...");
        env::set_current_dir(path)
            .with_context(|| anyhow!("Failed to switch to directory {path:?}"))?;
    }

    match &args.subcommand {
        SubCommand::Scan(scan_args) => scan_manifest(scan_args, load_config(&args).await?).await,
        SubCommand::Pin(pin_args) => pin_manifest(pin_args, load_config(&args).await?).await,
        SubCommand::Release(release_args) => {
            let config = release_args.apply(load_config(&args).await?);
            config.validate()?;
            release::release(release_args, &config).await
        }
        SubCommand::Completions(completions) => completions.generate(io::stdout()),
    }
}
