//! The capability every imaging backend provides.
use crate::error::Result;
use crate::operation::OperationContext;
use crate::volume::{ImageReference, Volume};
use async_trait::async_trait;
use std::path::Path;

/// Options for [`ImageService::apply_image`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Apply the image in compact mode (files stay compressed on the volume).
    pub compact: bool,
}

/// Applies images to volumes and captures volumes into images.
///
/// Implementations must run the validator before starting any process, and
/// must only return once the utility they started has stopped.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// A short name for the backend, used in error messages.
    fn tool_name(&self) -> &str;

    /// Writes `image` onto the volume's root directory.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before anything runs. After that, any
    /// non-zero exit of the utility is a [`crate::DeployError::Deployment`],
    /// and honored cancellation is [`crate::DeployError::Cancelled`].
    async fn apply_image(
        &self,
        volume: &Volume,
        image: &ImageReference,
        options: ApplyOptions,
        context: &OperationContext,
    ) -> Result<()>;

    /// Writes the contents of the volume to a new image file at `destination`.
    async fn capture_image(
        &self,
        volume: &Volume,
        destination: &Path,
        context: &OperationContext,
    ) -> Result<()>;
}
