use crate::errors::*;
use crate::utils::{self, ExecConfig};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_ENGINE: &str = "podman";

#[derive(Debug, PartialEq, Clone)]
pub struct ImageRef {
    pub repo: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl FromStr for ImageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            bail!("Image name can not be empty");
        }
        if s.contains(char::is_whitespace) {
            bail!("Image name can not contain whitespace: {s:?}");
        }

        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (s, None),
        };

        // a colon before the last slash belongs to the registry port
        let (repo, tag) = match name.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag.to_string())),
            _ => (name, None),
        };

        Ok(ImageRef {
            repo: repo.to_string(),
            tag,
            digest,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repo)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    #[serde(default)]
    pub repo_digests: Vec<String>,
}

/// A container engine with a docker compatible command line (podman, docker)
#[derive(Debug, Clone, PartialEq)]
pub struct Runtime {
    pub bin: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(DEFAULT_ENGINE)
    }
}

impl Runtime {
    pub fn new(bin: impl Into<String>) -> Self {
        Runtime { bin: bin.into() }
    }

    pub async fn exec<I, S>(&self, args: I, config: &ExecConfig<'_>) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr> + fmt::Debug,
    {
        utils::exec(&self.bin, args, config).await
    }

    pub async fn pull(&self, image: &str) -> Result<()> {
        info!("Pulling image {image:?}...");
        self.exec(["image", "pull", "--", image], &ExecConfig::default())
            .await?;
        Ok(())
    }

    pub async fn inspect(&self, image: &str) -> Result<Image> {
        let inspect = self
            .exec(
                ["image", "inspect", "--", image],
                &ExecConfig {
                    capture_stdout: true,
                    silence_stderr: true,
                    ..Default::default()
                },
            )
            .await?;
        parse_inspect(image, &inspect)
    }

    pub async fn build(&self, context: &Path, tag: &str) -> Result<()> {
        info!("Building image {tag:?} from {context:?}...");
        let context = context
            .to_str()
            .with_context(|| anyhow!("Build context is not valid utf-8: {context:?}"))?;
        self.exec(["build", "--tag", tag, "--", context], &ExecConfig::default())
            .await
            .with_context(|| anyhow!("Failed to build image {tag:?}"))?;
        Ok(())
    }
}

fn parse_inspect(image: &str, buf: &[u8]) -> Result<Image> {
    let mut list = serde_json::from_slice::<Vec<Image>>(buf)
        .context("Failed to parse image inspect output")?;
    debug!("Image inspect result: {list:?}");

    let inspect = list
        .pop()
        .with_context(|| anyhow!("Could not find any matching image: {image:?}"))?;

    match list.len() {
        0 => Ok(inspect),
        len => bail!(
            "The specified image is not canonical, inspect returned {}, expected 1",
            len + 1
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_ref() -> Result<()> {
        let image_ref = ImageRef::from_str("quay.io/aliok/serverless-operator-index")?;
        assert_eq!(
            image_ref,
            ImageRef {
                repo: "quay.io/aliok/serverless-operator-index".to_string(),
                tag: None,
                digest: None,
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_image_ref_digest() -> Result<()> {
        let image_ref = ImageRef::from_str(
            "rust@sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a",
        )?;
        assert_eq!(
            image_ref,
            ImageRef {
                repo: "rust".to_string(),
                tag: None,
                digest: Some(
                    "sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"
                        .to_string()
                ),
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_image_ref_tag() -> Result<()> {
        let image_ref = ImageRef::from_str("rust:1-alpine3.18")?;
        assert_eq!(
            image_ref,
            ImageRef {
                repo: "rust".to_string(),
                tag: Some("1-alpine3.18".to_string()),
                digest: None,
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_image_ref_registry_port() -> Result<()> {
        let image_ref = ImageRef::from_str("localhost:5000/index")?;
        assert_eq!(image_ref.repo, "localhost:5000/index");
        assert_eq!(image_ref.tag, None);

        let image_ref = ImageRef::from_str("localhost:5000/index:release-1.24")?;
        assert_eq!(image_ref.repo, "localhost:5000/index");
        assert_eq!(image_ref.tag.as_deref(), Some("release-1.24"));
        Ok(())
    }

    #[test]
    fn test_parse_image_ref_tag_and_digest() -> Result<()> {
        let s = "registry.ci.openshift.org/openshift/knative-v1.5.0:knative-serving-queue@sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a";
        let image_ref = ImageRef::from_str(s)?;
        assert_eq!(image_ref.repo, "registry.ci.openshift.org/openshift/knative-v1.5.0");
        assert_eq!(image_ref.tag.as_deref(), Some("knative-serving-queue"));
        assert!(image_ref.digest.is_some());
        assert_eq!(image_ref.to_string(), s);
        Ok(())
    }

    #[test]
    fn test_parse_image_ref_invalid() {
        assert!(ImageRef::from_str("").is_err());
        assert!(ImageRef::from_str("quay.io/foo bar").is_err());
    }

    #[test]
    fn test_parse_inspect() -> Result<()> {
        let image = parse_inspect(
            "registry.ci.openshift.org/openshift/knative-v1.5.0:knative-serving-queue",
            br#"[
  {
    "Id": "9a4d9ff6e7c1b6d4a8f3a25a2f1e0c8e2c4d0d6c1b7d5c3a2e1f0a9b8c7d6e5f",
    "Digest": "sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a",
    "RepoTags": ["registry.ci.openshift.org/openshift/knative-v1.5.0:knative-serving-queue"],
    "RepoDigests": [
      "registry.ci.openshift.org/openshift/knative-v1.5.0@sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"
    ]
  }
]"#,
        )?;
        assert_eq!(
            image.repo_digests,
            &["registry.ci.openshift.org/openshift/knative-v1.5.0@sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"]
        );
        Ok(())
    }

    #[test]
    fn test_parse_inspect_missing_digests() -> Result<()> {
        let image = parse_inspect("foo", br#"[{"Id": "abc"}]"#)?;
        assert!(image.repo_digests.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_inspect_not_canonical() {
        assert!(parse_inspect("foo", b"[]").is_err());
        assert!(parse_inspect("foo", br#"[{"RepoDigests": []}, {"RepoDigests": []}]"#).is_err());
    }
}
