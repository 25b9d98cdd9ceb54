use crate::digests::DigestMap;
use crate::errors::*;
use crate::resolver::Digest;
use serde::{Deserialize, Serialize};

/// Record of which tag was pinned to which digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    pub manifest: String,
    #[serde(default, rename = "image")]
    pub images: Vec<ImageLock>,
}

impl Lockfile {
    pub fn new(manifest: impl Into<String>, digests: &DigestMap) -> Self {
        let images = digests
            .iter()
            .map(|(name, digest)| ImageLock {
                name: name.to_string(),
                digest: digest.clone(),
            })
            .collect();
        Lockfile {
            manifest: manifest.into(),
            images,
        }
    }

    pub fn deserialize(buf: &str) -> Result<Self> {
        let lockfile = toml::from_str(buf)?;
        Ok(lockfile)
    }

    pub fn serialize(&self) -> Result<String> {
        let toml = toml::to_string_pretty(self)?;
        Ok(toml)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLock {
    pub name: String,
    pub digest: Digest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_lockfile() -> Result<()> {
        let digests = [(
            "registry.ci.openshift.org/openshift/knative-v1.5.0:knative-serving-queue".to_string(),
            "sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"
                .parse::<Digest>()?,
        )]
        .into_iter()
        .collect::<DigestMap>();

        let lockfile = Lockfile::new("manifests/operator.clusterserviceversion.yaml", &digests);
        let buf = lockfile.serialize()?;
        assert!(buf.starts_with("manifest = \"manifests/operator.clusterserviceversion.yaml\"\n"));
        assert!(buf.contains(
            r#"[[image]]
name = "registry.ci.openshift.org/openshift/knative-v1.5.0:knative-serving-queue"
digest = "sha256:28ee8822965a932e229599b59928f8c2655b2a198af30568acf63e8aff0e8a3a"
"#
        ));
        assert_eq!(Lockfile::deserialize(&buf)?, lockfile);
        Ok(())
    }

    #[test]
    fn test_deserialize_rejects_invalid_digest() {
        let buf = r#"manifest = "operator.yaml"

[[image]]
name = "quay.io/foo:1"
digest = "sha256:1234"
"#;
        assert!(Lockfile::deserialize(buf).is_err());
    }
}
