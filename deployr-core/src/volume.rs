use std::fmt;
use std::path::{Path, PathBuf};

/// A mounted storage volume that an imaging operation targets or reads from.
///
/// Volumes are produced by whatever enumerates and mounts storage on the host;
/// this crate only borrows them for the duration of one operation and never
/// mutates them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume {
    /// The mount point of the volume (e.g., `D:\` or `/mnt/target`), if mounted.
    pub root: Option<PathBuf>,
    /// A human-readable label, used only in diagnostics.
    pub label: Option<String>,
}

impl Volume {
    /// Creates a volume mounted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            label: None,
        }
    }

    /// Creates a volume that has no mount point.
    pub fn unmounted() -> Self {
        Self {
            root: None,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the root path if it is present and non-empty.
    pub fn usable_root(&self) -> Option<&Path> {
        self.root
            .as_deref()
            .filter(|root| !root.as_os_str().is_empty())
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = match self.usable_root() {
            Some(root) => root.display().to_string(),
            None => "[Not mounted]".to_string(),
        };

        match &self.label {
            Some(label) => write!(f, "{:<15} {}", root, label),
            None => write!(f, "{}", root),
        }
    }
}

/// A sub-image inside an image container, addressed by file path and 1-based index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReference {
    pub path: PathBuf,
    pub index: u32,
}

impl ImageReference {
    /// References the first image in the container at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: 1,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.path.display(), self.index)
    }
}
