use crate::errors::*;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Default)]
pub struct ExecConfig<'a> {
    pub capture_stdout: bool,
    pub silence_stderr: bool,
    pub cwd: Option<&'a Path>,
}

/// Spawn `bin` with `args`, wait for it to exit and bail on a non-zero exit code
pub async fn exec<I, S>(bin: &str, args: I, config: &ExecConfig<'_>) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr> + fmt::Debug,
{
    let mut cmd = Command::new(bin);
    let args = args.into_iter().collect::<Vec<_>>();
    cmd.args(&args);
    if let Some(cwd) = config.cwd {
        cmd.current_dir(cwd);
    }
    if config.capture_stdout {
        cmd.stdout(Stdio::piped());
    }
    if config.silence_stderr {
        cmd.stderr(Stdio::null());
    }
    debug!("Spawning child process: {bin} {:?}", args);
    let child = cmd
        .spawn()
        .with_context(|| anyhow!("Failed to execute {bin} binary"))?;

    let out = child.wait_with_output().await?;
    debug!("Child process {bin} exited: {:?}", out.status);
    if !out.status.success() {
        bail!(
            "Command ({bin} {:?}) failed to execute: {:?}",
            args,
            out.status
        );
    }
    Ok(out.stdout)
}

/// Interpret captured output as a single line of utf-8
pub fn first_line(mut out: Vec<u8>) -> Result<String> {
    if let Some(idx) = memchr::memchr(b'\n', &out) {
        out.truncate(idx);
    }
    let line = String::from_utf8(out).context("Command output is not valid utf-8")?;
    Ok(line.trim_end_matches('\r').to_string())
}
