use crate::errors::*;
use std::fmt;

/// A tag-qualified image name that was found in the manifest text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageReference {
    value: String,
    prefix: String,
}

impl ImageReference {
    pub fn new(value: impl Into<String>, prefix: impl Into<String>) -> Self {
        ImageReference {
            value: value.into(),
            prefix: prefix.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The configured prefix this reference was matched with
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The reference already carries a digest (`registry/path:tag@sha256:...`)
    pub fn is_pinned(&self) -> bool {
        self.value.contains('@')
    }

    /// Everything up to the tag separator, `registry/path` for `registry/path:tag`
    pub fn repository(&self) -> &str {
        match self.value.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => repo,
            _ => &self.value,
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Extract every image reference starting with `prefix`
///
/// Only the first occurrence of the prefix on each line is captured, the
/// candidate runs until the end of the (trimmed) line and loses at most one
/// trailing double-quote.
pub fn scan(text: &str, prefix: &str) -> Vec<ImageReference> {
    let mut images = Vec::new();
    if prefix.is_empty() {
        return images;
    }

    for line in text.lines() {
        let line = line.trim();
        let Some(start) = line.find(prefix) else {
            continue;
        };

        let mut image = &line[start..];
        if let Some(stripped) = image.strip_suffix('"') {
            image = stripped;
        }

        if image.contains(char::is_whitespace) {
            warn!("Image reference contains whitespace, it's likely not going to be pinned: {image:?}");
        }
        trace!("Found image reference with prefix {prefix:?}: {image:?}");
        images.push(ImageReference::new(image, prefix));
    }

    images
}

/// Run [`scan`] for each prefix and concatenate the results
pub fn scan_all<I, S>(text: &str, prefixes: I) -> Vec<ImageReference>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut images = Vec::new();
    for prefix in prefixes {
        let prefix = prefix.as_ref();
        let found = scan(text, prefix);
        debug!(
            "Collected {} image references with prefix {prefix:?}",
            found.len()
        );
        images.extend(found);
    }
    images
}

/// Unique image references, sorted by their byte representation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReferenceSet {
    images: Vec<ImageReference>,
}

impl ReferenceSet {
    pub fn dedupe(mut images: Vec<ImageReference>) -> Self {
        // ties on the reference string keep the lowest prefix
        images.sort();
        images.dedup_by(|a, b| a.value == b.value);
        ReferenceSet { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageReference> {
        self.images.iter()
    }
}

impl FromIterator<ImageReference> for ReferenceSet {
    fn from_iter<T: IntoIterator<Item = ImageReference>>(iter: T) -> Self {
        Self::dedupe(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ReferenceSet {
    type Item = &'a ImageReference;
    type IntoIter = std::slice::Iter<'a, ImageReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}
