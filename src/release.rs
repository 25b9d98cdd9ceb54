use crate::args;
use crate::config::Config;
use crate::container::{ImageRef, Runtime};
use crate::errors::*;
use crate::git;
use crate::pin::{self, PinOptions};
use crate::resolver::ContainerResolver;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use time::macros::format_description;
use time::OffsetDateTime;

/// The target image name needs to be a bare repository, the tag is generated
pub fn validate_target(target: &str) -> Result<()> {
    let image_ref = target.parse::<ImageRef>()?;
    if image_ref.tag.is_some() || image_ref.digest.is_some() {
        bail!("Target image name should not have a tag: {target:?}");
    }
    Ok(())
}

/// `<branch>-<short rev>-<YYYYmmdd-HHMMSS>`
pub fn release_tag(branch: &str, rev: &str, now: OffsetDateTime) -> Result<String> {
    let timestamp = now.format(format_description!(
        "[year][month][day]-[hour][minute][second]"
    ))?;
    let tag = format!("{branch}-{rev}-{timestamp}").replace('/', "-");
    Ok(tag)
}

async fn run(release: &args::Release, config: &Config, checkout: &Path) -> Result<String> {
    git::clone(&config.repository, &release.branch, checkout).await?;
    let commit = git::rev_parse(checkout, false).await?;
    info!("Current commit: {commit}");

    let rev = git::rev_parse(checkout, true).await?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let target = format!(
        "{}:{}",
        release.target,
        release_tag(&release.branch, &rev, now)?
    );
    info!("Target image name: {target}");

    let runtime = Runtime::new(&config.engine);
    let resolver = ContainerResolver::new(runtime.clone(), !release.no_pull);
    let manifest = checkout.join(&config.manifest);
    pin::pin_manifest(
        &manifest,
        config.prefixes.as_slice(),
        &resolver,
        &PinOptions::default(),
    )
    .await?;

    runtime
        .build(&checkout.join(&config.build_context), &target)
        .await?;

    Ok(target)
}

/// Remove the temporary checkout, or persist it if `keep` is set
fn cleanup(temp_dir: TempDir, keep: bool) -> Option<PathBuf> {
    if keep {
        let path = temp_dir.keep();
        info!("Keeping checkout at {path:?}");
        Some(path)
    } else {
        let checkout = temp_dir.path().to_owned();
        debug!("Removing checkout at {checkout:?}");
        if let Err(err) = temp_dir.close() {
            warn!("Failed to remove checkout {checkout:?}: {err:#}");
        }
        None
    }
}

pub async fn release(release: &args::Release, config: &Config) -> Result<()> {
    validate_target(&release.target)?;

    let temp_dir = tempfile::Builder::new()
        .prefix("digest-pin-")
        .tempdir()
        .context("Failed to create temporary directory")?;
    let checkout = temp_dir.path().to_owned();

    let result = run(release, config, &checkout).await;

    cleanup(temp_dir, release.keep);

    let target = result?;
    info!("Now push {target} manually using the following command:");
    info!("{} push {target}", config.engine);
    Ok(())
}
