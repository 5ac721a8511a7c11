use crate::shared::Result;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Joins a store-relative path onto a root directory
///
/// # Security
/// Blob and metadata paths are built from image references found in
/// deployment events. Only plain relative components are accepted so that a
/// crafted reference cannot escape the store root.
///
/// # Errors
/// Returns an error for empty, absolute, or parent-referencing paths
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    if relative.is_empty() {
        anyhow::bail!("Security: empty path is not allowed");
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            _ => anyhow::bail!(
                "Security: '{}' is not a plain relative path. Absolute paths and '..' are not allowed.",
                relative
            ),
        }
    }
    Ok(resolved)
}

/// Refuses to operate on an existing symbolic link
///
/// # Security
/// Uses `symlink_metadata()` so the link itself is checked, not its target.
/// A path that does not exist yet passes.
///
/// # Arguments
/// * `path` - The path to validate
/// * `operation` - Description of the operation (e.g., "read", "write") for error messages
pub fn validate_not_symlink(path: &Path, operation: &str) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_symlink() => anyhow::bail!(
            "Security: {} is a symbolic link. For security reasons, {} operations on symbolic links are not allowed.",
            path.display(),
            operation
        ),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read metadata for {} operation on {}: {}",
            operation,
            path.display(),
            e
        )),
    }
}

/// Reads a regular file of bounded size
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
/// Returns an error if the path is a symbolic link or not a regular file,
/// or if it is larger than `max_size` bytes
pub fn read_regular_file(path: &Path, max_size: u64) -> Result<Option<Vec<u8>>> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => anyhow::bail!("Failed to read metadata of {}: {}", path.display(), e),
    };

    if metadata.is_symlink() {
        anyhow::bail!(
            "Security: {} is a symbolic link. For security reasons, symbolic links are not allowed.",
            path.display()
        );
    }
    if !metadata.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    if metadata.len() > max_size {
        anyhow::bail!(
            "Security: {} is too large ({} bytes). Maximum allowed size is {} bytes.",
            path.display(),
            metadata.len(),
            max_size
        );
    }

    let content = fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(Some(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_within_accepts_nested_relative_path() {
        let root = Path::new("/data/results");
        let resolved = resolve_within(root, "gcr.io_p_app_v1/20260101T000000000Z-abcd1234.json").unwrap();
        assert_eq!(
            resolved,
            PathBuf::from("/data/results/gcr.io_p_app_v1/20260101T000000000Z-abcd1234.json")
        );
    }

    #[test]
    fn test_resolve_within_rejects_escape() {
        let root = Path::new("/data/results");
        assert!(resolve_within(root, "../etc/passwd").is_err());
        assert!(resolve_within(root, "a/../../b").is_err());
        assert!(resolve_within(root, "/etc/passwd").is_err());
        assert!(resolve_within(root, "").is_err());
    }

    #[test]
    fn test_validate_not_symlink_allows_missing_and_regular() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("report.json");
        assert!(validate_not_symlink(&file_path, "write").is_ok());

        fs::write(&file_path, "{}").unwrap();
        assert!(validate_not_symlink(&file_path, "write").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_not_symlink_rejects_link() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.json");
        let link = temp_dir.path().join("link.json");
        fs::write(&target, "{}").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = validate_not_symlink(&link, "write").unwrap_err();
        assert!(err.to_string().contains("symbolic link"));
    }

    #[test]
    fn test_read_regular_file_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_regular_file(&temp_dir.path().join("nope.json"), 10).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_regular_file_enforces_limit() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("big.json");
        fs::write(&file_path, vec![b'x'; 11]).unwrap();

        let err = read_regular_file(&file_path, 10).unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert_eq!(read_regular_file(&file_path, 11).unwrap().unwrap().len(), 11);
    }

    #[test]
    fn test_read_regular_file_rejects_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_regular_file(temp_dir.path(), 10).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }
}
