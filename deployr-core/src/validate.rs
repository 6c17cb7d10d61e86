//! Pre-flight checks run before any imaging utility is started.
//!
//! Every check here is local and synchronous. An operation that fails
//! validation never spawns a process and never touches the volume.
use crate::error::{DeployError, Result};
use crate::fs::FileSystem;
use crate::trace::{TraceEvent, TraceSink};
use crate::volume::{ImageReference, Volume};
use std::path::Path;

pub struct Validator<'a> {
    fs: &'a dyn FileSystem,
    trace: &'a dyn TraceSink,
}

impl<'a> Validator<'a> {
    pub fn new(fs: &'a dyn FileSystem, trace: &'a dyn TraceSink) -> Self {
        Self { fs, trace }
    }

    /// Checks a volume and image before applying the image to the volume.
    ///
    /// # Errors
    ///
    /// - [`DeployError::InvalidArgument`] if the volume has no root, the image
    ///   path is empty, or the index is 0.
    /// - [`DeployError::ImageNotFound`] if the image file does not exist.
    ///
    /// Returns the volume root on success.
    pub fn validate_for_apply<'v>(
        &self,
        volume: &'v Volume,
        image: &ImageReference,
    ) -> Result<&'v Path> {
        let root = require_root(volume, "The volume to apply the image is invalid")?;
        require_path(&image.path, "An image path is required")?;
        if image.index == 0 {
            return Err(DeployError::invalid(
                "Image indices start at 1; index 0 does not exist",
            ));
        }

        self.ensure_image_exists(image)?;
        Ok(root)
    }

    /// Checks a volume and destination before capturing the volume.
    pub fn validate_for_capture<'v>(&self, volume: &'v Volume, destination: &Path) -> Result<&'v Path> {
        let root = require_root(volume, "The volume to capture is invalid")?;
        require_path(destination, "A destination path for the image is required")?;
        Ok(root)
    }

    /// Checks a volume and driver path before servicing drivers.
    pub fn validate_for_driver<'v>(&self, volume: &'v Volume, driver_path: &Path) -> Result<&'v Path> {
        let root = require_root(volume, "The volume to service drivers on is invalid")?;
        require_path(driver_path, "A driver path is required")?;
        Ok(root)
    }

    fn ensure_image_exists(&self, image: &ImageReference) -> Result<()> {
        self.trace.record(&TraceEvent::CheckingImage {
            path: image.path.clone(),
            index: image.index,
        });

        if !self.fs.file_exists(&image.path) {
            return Err(DeployError::ImageNotFound {
                path: image.path.clone(),
            });
        }

        self.trace.record(&TraceEvent::ImageFound {
            path: image.path.clone(),
        });
        Ok(())
    }
}

fn require_root<'v>(volume: &'v Volume, message: &str) -> Result<&'v Path> {
    volume
        .usable_root()
        .ok_or_else(|| DeployError::invalid(message))
}

fn require_path(path: &Path, message: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(DeployError::invalid(message));
    }
    Ok(())
}
