use crate::shared::Result;
use std::fmt;
use uuid::Uuid;

/// Maximum length for an image reference (security limit)
pub const MAX_IMAGE_REFERENCE_LENGTH: usize = 512;

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_TAG: &str = "latest";
const DIGEST_MARKER: &str = "@sha256:";
const KEY_HASH_LENGTH: usize = 12;

/// Parsed and normalized container image reference.
///
/// Handles Docker Hub short names, GCR, Artifact Registry and any other
/// registry host, with or without a port:
///
/// - `nginx` → `docker.io/library/nginx:latest`
/// - `user/app:1.2` → `docker.io/user/app:1.2`
/// - `us-docker.pkg.dev/p/repo/app:v1` → unchanged
/// - `nginx@sha256:abc` → `docker.io/library/nginx@sha256:abc`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: String,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();

        if reference.is_empty() {
            anyhow::bail!("Image reference cannot be empty");
        }

        if reference.len() > MAX_IMAGE_REFERENCE_LENGTH {
            anyhow::bail!(
                "Image reference is too long ({} bytes). Maximum allowed: {} bytes",
                reference.len(),
                MAX_IMAGE_REFERENCE_LENGTH
            );
        }

        if reference.chars().any(|c| c.is_whitespace() || c.is_control()) {
            anyhow::bail!("Image reference contains whitespace or control characters");
        }

        let (name_and_tag, digest) = match reference.split_once(DIGEST_MARKER) {
            Some((name, hex)) => {
                if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    anyhow::bail!("Image digest must be a hex-encoded sha256: {}", reference);
                }
                (name, Some(format!("sha256:{}", hex.to_lowercase())))
            }
            None => (reference, None),
        };

        // The tag separator is the last ':' after the last '/', so a registry
        // port such as `localhost:5000/app` is not mistaken for a tag.
        let last_slash = name_and_tag.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match name_and_tag[last_slash..].rfind(':') {
            Some(offset) => {
                let split = last_slash + offset;
                (&name_and_tag[..split], &name_and_tag[split + 1..])
            }
            None => (name_and_tag, DEFAULT_TAG),
        };

        if name.is_empty() || tag.is_empty() {
            anyhow::bail!("Image reference is missing a name or tag: {}", reference);
        }

        let parts: Vec<&str> = name.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            anyhow::bail!("Image reference has an empty path segment: {}", reference);
        }

        let (registry, repository) = match parts.as_slice() {
            [single] => (DEFAULT_REGISTRY.to_string(), format!("library/{}", single)),
            [first, rest @ ..] if Self::looks_like_registry(first) => {
                (first.to_string(), rest.join("/"))
            }
            _ => (DEFAULT_REGISTRY.to_string(), parts.join("/")),
        };

        Ok(Self {
            registry,
            repository,
            tag: tag.to_string(),
            digest,
        })
    }

    fn looks_like_registry(segment: &str) -> bool {
        segment.contains('.') || segment.contains(':') || segment == "localhost"
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// True when the reference pins immutable content.
    pub fn is_pinned(&self) -> bool {
        self.digest.is_some()
    }

    /// Normalized `registry/repo@digest`, or `registry/repo:tag` when no digest is present.
    pub fn full_name(&self) -> String {
        match &self.digest {
            Some(digest) => format!("{}/{}@{}", self.registry, self.repository, digest),
            None => format!("{}/{}:{}", self.registry, self.repository, self.tag),
        }
    }

    pub fn cache_key(&self) -> ScanCacheKey {
        ScanCacheKey::from_normalized(&self.full_name())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Key under which scan results for one exact image are stored and looked up.
///
/// Derived from the normalized reference, so a digest-pinned image maps to
/// the same key regardless of the tag it was deployed under. The readable
/// part is path-safe and lossy; the hash suffix over the full name keeps
/// references that sanitize alike apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanCacheKey(String);

impl ScanCacheKey {
    fn from_normalized(normalized: &str) -> Self {
        let hash = Uuid::new_v5(&Uuid::NAMESPACE_URL, normalized.as_bytes());
        let suffix: String = hash.simple().to_string().chars().take(KEY_HASH_LENGTH).collect();
        Self(format!("{}-{}", sanitize_path_segment(normalized), suffix))
    }

    /// Rebuilds a key that was previously persisted.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_path_segment(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
