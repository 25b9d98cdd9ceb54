use crate::container::Runtime;
use crate::errors::*;
use crate::scan::ImageReference;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const SHA256_PREFIX: &str = "sha256:";

/// A content-addressed image identifier, `sha256:<64 hex chars>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hash = s
            .strip_prefix(SHA256_PREFIX)
            .with_context(|| anyhow!("Digest is not using sha256: {s:?}"))?;
        if hash.len() != 64 {
            bail!("Unexpected sha256 checksum length: {:?}", hash.len());
        }
        if hash.bytes().any(|b| b.is_ascii_uppercase()) {
            bail!("Unexpected uppercase characters in sha256: {hash:?}");
        }
        hex::decode(hash).with_context(|| anyhow!("Unexpected characters in sha256: {hash:?}"))?;
        Ok(Digest(s.to_string()))
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> String {
        digest.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Failed to fetch image {reference:?}")]
    Fetch {
        reference: String,
        #[source]
        source: BoxError,
    },
    #[error("Failed to inspect image {reference:?} in local store")]
    Inspect {
        reference: String,
        #[source]
        source: BoxError,
    },
    #[error("Local store has no digest recorded for image {reference:?}")]
    NoDigest { reference: String },
    #[error("Local store reported an invalid digest for image {reference:?}: {digest:?}")]
    InvalidDigest { reference: String, digest: String },
}

impl ResolutionError {
    pub fn reference(&self) -> &str {
        match self {
            ResolutionError::Fetch { reference, .. }
            | ResolutionError::Inspect { reference, .. }
            | ResolutionError::NoDigest { reference }
            | ResolutionError::InvalidDigest { reference, .. } => reference,
        }
    }
}

/// Turns an image reference into the digest it currently points to
#[allow(async_fn_in_trait)]
pub trait DigestResolver {
    async fn resolve(&self, image: &ImageReference) -> Result<Digest, ResolutionError>;
}

/// Resolve digests through the local store of a container engine
#[derive(Debug, Clone)]
pub struct ContainerResolver {
    pub runtime: Runtime,
    /// Fetch the image before reading its digest
    pub pull: bool,
}

impl ContainerResolver {
    pub fn new(runtime: Runtime, pull: bool) -> Self {
        ContainerResolver { runtime, pull }
    }
}

impl DigestResolver for ContainerResolver {
    async fn resolve(&self, image: &ImageReference) -> Result<Digest, ResolutionError> {
        let reference = image.as_str();

        if self.pull {
            self.runtime
                .pull(reference)
                .await
                .map_err(|source| ResolutionError::Fetch {
                    reference: reference.to_string(),
                    source: source.into(),
                })?;
        }

        let inspect = self
            .runtime
            .inspect(reference)
            .await
            .map_err(|source| ResolutionError::Inspect {
                reference: reference.to_string(),
                source: source.into(),
            })?;

        select_repo_digest(image, &inspect.repo_digests)
    }
}

/// Pick the digest for `image` out of the `repo@sha256:...` entries the store recorded
///
/// The store lists the most recent entry first, entries of the image's own
/// repository take precedence over digests recorded under other names.
pub fn select_repo_digest(
    image: &ImageReference,
    repo_digests: &[String],
) -> Result<Digest, ResolutionError> {
    let repository = image.repository();
    let entry = repo_digests
        .iter()
        .find(|entry| {
            entry
                .split_once('@')
                .is_some_and(|(repo, _)| repo == repository)
        })
        .or_else(|| repo_digests.first())
        .ok_or_else(|| ResolutionError::NoDigest {
            reference: image.to_string(),
        })?;

    let digest = entry.split_once('@').map_or(entry.as_str(), |(_, d)| d);
    digest
        .parse::<Digest>()
        .map_err(|_| ResolutionError::InvalidDigest {
            reference: image.to_string(),
            digest: entry.to_string(),
        })
}
