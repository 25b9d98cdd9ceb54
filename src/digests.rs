use crate::errors::*;
use crate::resolver::{Digest, DigestResolver, ResolutionError};
use crate::scan::ReferenceSet;
use indexmap::IndexMap;
use serde::Serialize;

/// Every distinct image reference of a run mapped to its resolved digest
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DigestMap {
    digests: IndexMap<String, Digest>,
}

impl DigestMap {
    /// Resolve every image in `images`, all-or-nothing
    pub async fn build<R: DigestResolver>(
        images: &ReferenceSet,
        resolver: &R,
    ) -> Result<Self, ResolutionError> {
        info!("Resolving {} images...", images.len());
        let mut digests = IndexMap::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            info!("Resolving {image}: {}/{}", i + 1, images.len());
            let digest = resolver.resolve(image).await?;
            debug!("Resolved {image:?} to {digest:?}");
            digests.insert(image.to_string(), digest);
        }
        Ok(DigestMap { digests })
    }

    pub fn get_index(&self, index: usize) -> Option<(&String, &Digest)> {
        self.digests.get_index(index)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Digest> {
        self.digests.iter()
    }

    pub fn to_json(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }
}

impl FromIterator<(String, Digest)> for DigestMap {
    fn from_iter<T: IntoIterator<Item = (String, Digest)>>(iter: T) -> Self {
        DigestMap {
            digests: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DigestMap {
    type Item = (&'a String, &'a Digest);
    type IntoIter = indexmap::map::Iter<'a, String, Digest>;

    fn into_iter(self) -> Self::IntoIter {
        self.digests.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ImageReference;
    use std::sync::Mutex;

    const DIGEST_A: &str =
        "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const DIGEST_B: &str =
        "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[derive(Default)]
    struct MockResolver {
        digests: Vec<(&'static str, &'static str)>,
        calls: Mutex<Vec<String>>,
    }

    impl DigestResolver for MockResolver {
        async fn resolve(&self, image: &ImageReference) -> Result<Digest, ResolutionError> {
            self.calls.lock().unwrap().push(image.to_string());
            let (_, digest) = self
                .digests
                .iter()
                .find(|(name, _)| *name == image.as_str())
                .ok_or_else(|| ResolutionError::NoDigest {
                    reference: image.to_string(),
                })?;
            Ok(digest.parse().unwrap())
        }
    }

    fn set(images: &[&str]) -> ReferenceSet {
        images
            .iter()
            .map(|i| ImageReference::new(*i, "host/"))
            .collect()
    }

    #[tokio::test]
    async fn test_build_in_order() -> Result<()> {
        let resolver = MockResolver {
            digests: vec![("host/b:1", DIGEST_B), ("host/a:1", DIGEST_A)],
            ..Default::default()
        };
        let map = DigestMap::build(&set(&["host/b:1", "host/a:1"]), &resolver).await?;

        let entries = map
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(entries, &[("host/a:1", DIGEST_A), ("host/b:1", DIGEST_B)]);
        assert_eq!(*resolver.calls.lock().unwrap(), &["host/a:1", "host/b:1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_build_resolves_once() -> Result<()> {
        let resolver = MockResolver {
            digests: vec![("host/a:1", DIGEST_A)],
            ..Default::default()
        };
        let map = DigestMap::build(&set(&["host/a:1", "host/a:1", "host/a:1"]), &resolver).await?;
        assert_eq!(map.len(), 1);
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_build_all_or_nothing() {
        let resolver = MockResolver {
            digests: vec![("host/a:1", DIGEST_A), ("host/c:1", DIGEST_B)],
            ..Default::default()
        };
        let err = DigestMap::build(&set(&["host/a:1", "host/b:1", "host/c:1"]), &resolver)
            .await
            .unwrap_err();
        assert_eq!(err.reference(), "host/b:1");
        // resolving stops at the first failure
        assert_eq!(*resolver.calls.lock().unwrap(), &["host/a:1", "host/b:1"]);
    }

    #[tokio::test]
    async fn test_build_empty() -> Result<()> {
        let resolver = MockResolver::default();
        let map = DigestMap::build(&ReferenceSet::default(), &resolver).await?;
        assert!(map.is_empty());
        assert_eq!(map.to_json()?, "{}");
        Ok(())
    }

    #[test]
    fn test_to_json() -> Result<()> {
        let map = [
            ("host/b:1".to_string(), DIGEST_B.parse::<Digest>()?),
            ("host/a:1".to_string(), DIGEST_A.parse::<Digest>()?),
        ]
        .into_iter()
        .collect::<DigestMap>();
        assert_eq!(
            map.to_json()?,
            format!("{{\n  \"host/b:1\": \"{DIGEST_B}\",\n  \"host/a:1\": \"{DIGEST_A}\"\n}}")
        );
        assert_eq!(
            map.get_index(1).map(|(k, v)| (k.as_str(), v.as_str())),
            Some(("host/a:1", DIGEST_A))
        );
        Ok(())
    }
}
