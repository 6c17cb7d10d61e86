//! The filesystem collaborator used for pre-flight checks.
use std::path::Path;

/// Answers existence questions about paths on the host.
///
/// Validation is the only consumer; nothing in this crate writes through it.
pub trait FileSystem: Send + Sync {
    /// Returns `true` if `path` resolves to an existing, accessible regular file.
    fn file_exists(&self, path: &Path) -> bool;
}

/// The host filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}
