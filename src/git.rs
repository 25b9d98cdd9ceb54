use crate::errors::*;
use crate::utils::{self, ExecConfig};
use std::path::Path;

async fn git<S: AsRef<str>>(args: &[S], cwd: Option<&Path>) -> Result<Vec<u8>> {
    let args = args.iter().map(|a| a.as_ref()).collect::<Vec<_>>();
    utils::exec(
        "git",
        &args,
        &ExecConfig {
            capture_stdout: true,
            cwd,
            ..Default::default()
        },
    )
    .await
}

/// Clone `branch` of `repository` into the (empty) directory `dest`
pub async fn clone(repository: &str, branch: &str, dest: &Path) -> Result<()> {
    info!("Cloning {repository} and branch {branch} to {dest:?}");
    let dest_str = dest
        .to_str()
        .with_context(|| anyhow!("Clone destination is not valid utf-8: {dest:?}"))?;
    git(
        &[
            "clone",
            "--single-branch",
            "--branch",
            branch,
            "--",
            repository,
            dest_str,
        ],
        None,
    )
    .await
    .with_context(|| anyhow!("Failed to clone {repository:?} at {branch:?}"))?;
    Ok(())
}

pub async fn rev_parse(repo: &Path, short: bool) -> Result<String> {
    let args: &[&str] = if short {
        &["rev-parse", "--short", "HEAD"]
    } else {
        &["rev-parse", "HEAD"]
    };
    let out = git(args, Some(repo))
        .await
        .with_context(|| anyhow!("Failed to determine current commit of {repo:?}"))?;
    let rev = utils::first_line(out)?;
    if rev.is_empty() || !rev.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Unexpected output from git rev-parse: {rev:?}");
    }
    Ok(rev)
}
