use crate::digests::DigestMap;
use crate::errors::*;
use indexmap::IndexMap;

/// The outcome of pinning a manifest, the original text is left as-is
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub text: String,
    /// Number of anchored matches replaced per image reference
    pub replacements: IndexMap<String, usize>,
}

impl Rewrite {
    /// Image references that were resolved but never found at a quote or newline boundary
    pub fn unmatched(&self) -> Vec<&str> {
        self.replacements
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(image, _)| image.as_str())
            .collect()
    }

    /// Fail if scanning and rewriting disagree about an image reference
    pub fn ensure_complete(&self) -> Result<()> {
        let unmatched = self.unmatched();
        if !unmatched.is_empty() {
            bail!(
                "Found image references that could not be pinned, scan and rewrite disagree: {unmatched:?}"
            );
        }
        Ok(())
    }

    pub fn total(&self) -> usize {
        self.replacements.values().sum()
    }
}

struct Anchored {
    /// Start of the pattern, including an opening quote
    start: usize,
    /// End of the pattern, including the closing quote or line break
    end: usize,
    /// Byte offset directly after the image reference
    insert: usize,
    index: usize,
}

/// Pin every image of `digests` inside `text`
///
/// An image is only replaced if it's enclosed in double quotes or directly
/// followed by a line break, so a reference that is a prefix of a longer one
/// never matches inside of it. All matches are located in the original text
/// and spliced in a single pass, a pinned reference is never matched again
/// and the order of `digests` doesn't matter. If matches of different images
/// overlap, the leftmost-longest one wins.
pub fn rewrite(text: &str, digests: &DigestMap) -> Rewrite {
    let mut matches = Vec::new();
    for (index, (image, _)) in digests.iter().enumerate() {
        let quoted = format!("\"{image}\"");
        for start in memchr::memmem::find_iter(text.as_bytes(), quoted.as_bytes()) {
            matches.push(Anchored {
                start,
                end: start + quoted.len(),
                insert: start + 1 + image.len(),
                index,
            });
        }

        for line_end in ["\n", "\r\n"] {
            let pattern = format!("{image}{line_end}");
            for start in memchr::memmem::find_iter(text.as_bytes(), pattern.as_bytes()) {
                matches.push(Anchored {
                    start,
                    end: start + pattern.len(),
                    insert: start + image.len(),
                    index,
                });
            }
        }
    }
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut counts = vec![0; digests.len()];
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    let mut claimed = 0;
    for m in matches {
        if m.start < claimed {
            continue;
        }
        claimed = m.end;

        let Some((_, digest)) = digests.get_index(m.index) else {
            continue;
        };
        out.push_str(&text[pos..m.insert]);
        out.push('@');
        out.push_str(digest.as_str());
        pos = m.insert;
        counts[m.index] += 1;
    }
    out.push_str(&text[pos..]);

    let mut replacements = IndexMap::with_capacity(digests.len());
    for ((image, digest), count) in digests.iter().zip(counts) {
        debug!("Pinned {count} occurrences of {image:?} to {digest:?}");
        replacements.insert(image.to_string(), count);
    }

    Rewrite {
        text: out,
        replacements,
    }
}

/// Lines that differ between the original and the pinned text, as `(line number, old, new)`
///
/// Pinning never adds or removes line breaks so lines are compared pairwise.
pub fn changed_lines<'a>(old: &'a str, new: &'a str) -> Vec<(usize, &'a str, &'a str)> {
    old.lines()
        .zip(new.lines())
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(idx, (old, new))| (idx + 1, old, new))
        .collect()
}
