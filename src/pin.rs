use crate::digests::DigestMap;
use crate::errors::*;
use crate::lockfile::Lockfile;
use crate::resolver::DigestResolver;
use crate::rewrite::{self, Rewrite};
use crate::scan::{self, ReferenceSet};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Default)]
pub struct PinOptions<'a> {
    /// Resolve and rewrite, but leave the manifest untouched
    pub dry_run: bool,
    /// Also record the resolved digests in this file
    pub lockfile: Option<&'a Path>,
}

#[derive(Debug)]
pub struct Pinned {
    pub images: ReferenceSet,
    pub digests: DigestMap,
    pub rewrite: Rewrite,
}

/// Scan for all images of `prefixes`, references that already carry a digest are skipped
pub fn collect_images<S: AsRef<str>>(text: &str, prefixes: &[S]) -> ReferenceSet {
    let images = scan::scan_all(text, prefixes)
        .into_iter()
        .filter(|image| {
            if image.is_pinned() {
                debug!("Image is already pinned, skipping: {image:?}");
                false
            } else {
                true
            }
        })
        .collect::<ReferenceSet>();
    info!("Collected {} images:", images.len());
    for image in &images {
        info!("  {image}");
    }
    images
}

pub async fn read_manifest(path: &Path) -> Result<String> {
    info!("Reading manifest: {path:?}");
    fs::read_to_string(path)
        .await
        .with_context(|| anyhow!("Failed to read manifest: {path:?}"))
}

/// Scan, resolve and rewrite `text` in memory
pub async fn pin_text<R, S>(text: &str, prefixes: &[S], resolver: &R) -> Result<Pinned>
where
    R: DigestResolver,
    S: AsRef<str>,
{
    let images = collect_images(text, prefixes);

    let digests = DigestMap::build(&images, resolver).await?;
    info!("Image map:\n{}", digests.to_json()?);

    let rewrite = rewrite::rewrite(text, &digests);
    rewrite.ensure_complete()?;
    info!(
        "Pinned {} occurrences of {} images",
        rewrite.total(),
        digests.len()
    );

    Ok(Pinned {
        images,
        digests,
        rewrite,
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp_path = path.to_path_buf();
    tmp_path.as_mut_os_string().push(".tmp");
    tmp_path
}

/// Write all files next to their destination first, then rename them into place
async fn write_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, buf) in files {
        let tmp_path = tmp_path(path);
        if let Err(err) = fs::write(&tmp_path, buf).await {
            for (tmp_path, _) in &staged {
                if let Err(err) = fs::remove_file(tmp_path).await {
                    warn!("Failed to remove temporary file {tmp_path:?}: {err:#}");
                }
            }
            return Err(err).with_context(|| anyhow!("Failed to write file: {tmp_path:?}"));
        }
        staged.push((tmp_path, *path));
    }

    for (tmp_path, path) in staged {
        fs::rename(&tmp_path, path)
            .await
            .with_context(|| anyhow!("Failed to rename {tmp_path:?} to {path:?}"))?;
    }
    Ok(())
}

/// Pin all images of the manifest at `path`, the file is only replaced once every image resolved
pub async fn pin_manifest<R, S>(
    path: &Path,
    prefixes: &[S],
    resolver: &R,
    options: &PinOptions<'_>,
) -> Result<Pinned>
where
    R: DigestResolver,
    S: AsRef<str>,
{
    let text = read_manifest(path).await?;
    let pinned = pin_text(&text, prefixes, resolver).await?;

    if pinned.images.is_empty() {
        warn!("No unpinned images found in manifest, nothing to pin: {path:?}");
        return Ok(pinned);
    }

    if options.dry_run {
        for (line, old, new) in rewrite::changed_lines(&text, &pinned.rewrite.text) {
            info!("{path:?}:{line}");
            info!("  - {}", old.trim());
            info!("  + {}", new.trim());
        }
        info!("Dry run, not writing manifest: {path:?}");
        return Ok(pinned);
    }

    let lockfile = options
        .lockfile
        .map(|lockfile_path| {
            let lockfile = Lockfile::new(path.to_string_lossy(), &pinned.digests);
            lockfile.serialize().map(|buf| (lockfile_path, buf))
        })
        .transpose()?;

    let mut files = vec![(path, pinned.rewrite.text.as_bytes())];
    if let Some((lockfile_path, buf)) = &lockfile {
        debug!("Writing digest lockfile: {lockfile_path:?}");
        files.push((*lockfile_path, buf.as_bytes()));
    }

    info!("Replacing images in manifest: {path:?}");
    write_atomic(&files).await?;

    Ok(pinned)
}
