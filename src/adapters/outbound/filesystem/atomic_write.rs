use crate::shared::security::validate_not_symlink;
use crate::shared::Result;
use anyhow::Context;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Whether an existing file at the target is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WriteMode {
    Replace,
    KeepExisting,
}

/// Writes `content` to `target` through a temp file in the same directory
///
/// Readers never observe a partially written file. Returns `false` when
/// `KeepExisting` found the target already present.
pub(super) async fn write_atomically(
    target: PathBuf,
    content: Vec<u8>,
    mode: WriteMode,
) -> Result<bool> {
    tokio::task::spawn_blocking(move || write_blocking(&target, &content, mode))
        .await
        .context("file write task panicked")?
}

fn write_blocking(target: &Path, content: &[u8], mode: WriteMode) -> Result<bool> {
    let parent = target
        .parent()
        .with_context(|| format!("{} has no parent directory", target.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    validate_not_symlink(target, "write")?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", target.display()))?;

    match mode {
        WriteMode::Replace => {
            temp.persist(target)
                .with_context(|| format!("Failed to persist {}", target.display()))?;
            Ok(true)
        }
        WriteMode::KeepExisting => match temp.persist_noclobber(target) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(anyhow::Error::new(e.error)
                .context(format!("Failed to persist {}", target.display()))),
        },
    }
}
