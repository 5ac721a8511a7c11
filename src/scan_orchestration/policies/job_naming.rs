use crate::scan_orchestration::domain::ImageReference;
use chrono::{DateTime, Utc};

/// Cloud Run resource names are limited to 63 characters
pub const MAX_JOB_NAME_LENGTH: usize = 63;

/// `-<yyyymmddHHMMSS>-<4 hex>`
const SUFFIX_LENGTH: usize = 1 + 14 + 1 + 4;

/// JobNaming policy for ephemeral scan job names
///
/// Names look like `qscanner-<repository>-<tag>-<timestamp>-<random>`:
/// lowercase, `[a-z0-9-]` only, starting with a letter, never ending with
/// a hyphen, and at most 63 characters.
pub struct JobNaming;

impl JobNaming {
    /// Generates a unique job name for `image` at `now`
    pub fn generate(image: &ImageReference, now: DateTime<Utc>) -> String {
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self::with_suffix(image, now, &random[..4])
    }

    /// Deterministic variant of [`JobNaming::generate`]
    ///
    /// # Arguments
    /// * `image` - Image being scanned
    /// * `now` - Timestamp embedded in the name
    /// * `random` - Disambiguating suffix (lowercase hex expected)
    pub fn with_suffix(image: &ImageReference, now: DateTime<Utc>, random: &str) -> String {
        let raw = format!("qscanner-{}-{}", image.repository(), image.tag());
        let mut base = sanitize(&raw);
        base.truncate(MAX_JOB_NAME_LENGTH - SUFFIX_LENGTH);
        let base = base.trim_end_matches('-');

        format!(
            "{}-{}-{}",
            base,
            now.format("%Y%m%d%H%M%S"),
            sanitize(random)
        )
    }
}

/// Lowercases, maps everything outside `[a-z0-9]` to `-` and collapses runs
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 5).unwrap()
    }

    fn is_valid(name: &str) -> bool {
        name.len() <= MAX_JOB_NAME_LENGTH
            && name.starts_with(|c: char| c.is_ascii_lowercase())
            && !name.ends_with('-')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    #[test]
    fn test_simple_name() {
        let image = ImageReference::parse("gcr.io/my-project/Web_App:V1.2").unwrap();
        let name = JobNaming::with_suffix(&image, now(), "a1b2");
        assert_eq!(name, "qscanner-my-project-web-app-v1-2-20261015093005-a1b2");
        assert!(is_valid(&name));
    }

    #[test]
    fn test_long_repository_is_truncated() {
        let image = ImageReference::parse(
            "us-docker.pkg.dev/a-very-long-project-name/some-repository/deeply/nested/service-image:2026-10-15-release-candidate",
        )
        .unwrap();
        let name = JobNaming::with_suffix(&image, now(), "ffff");
        assert!(is_valid(&name), "invalid name: {}", name);
        assert!(name.ends_with("-20261015093005-ffff"));
    }

    #[test]
    fn test_truncation_never_leaves_double_hyphen_before_suffix() {
        // 43-character budget lands right after a separator
        let image = ImageReference::parse("gcr.io/abcdefghijklmnopqrstuvwxyz0/abcde:tag").unwrap();
        let name = JobNaming::with_suffix(&image, now(), "0000");
        assert!(is_valid(&name));
        assert!(!name.contains("--"));
    }

    #[test]
    fn test_generated_names_are_valid_and_distinct() {
        let image = ImageReference::parse("nginx").unwrap();
        let a = JobNaming::generate(&image, now());
        let b = JobNaming::generate(&image, now());
        assert!(is_valid(&a));
        assert!(a.starts_with("qscanner-library-nginx-latest-"));
        // 1 in 65536 collision chance per run; retry once before failing
        if a == b {
            assert_ne!(a, JobNaming::generate(&image, now()));
        }
    }
}
