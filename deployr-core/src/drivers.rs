//! Offline driver servicing.
//!
//! Drivers are always serviced with DISM, whatever backend applied the image.
//! Output lines go to the diagnostic trace; callers get no progress stream.
use crate::dism::{self, TOOL_NAME};
use crate::error::Result;
use crate::operation::{OperationDriver, OperationKind};
use crate::process::Invocation;
use crate::volume::Volume;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Adds and removes drivers in the offline image mounted at a volume's root.
#[derive(Clone, Debug)]
pub struct DriverManager {
    driver: OperationDriver,
    dism: PathBuf,
}

impl DriverManager {
    pub fn new(driver: OperationDriver, dism: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            dism: dism.into(),
        }
    }

    /// Adds every driver found under `path`, recursively.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::DeployError::Deployment`] if DISM exits with a
    /// non-zero code.
    pub async fn inject_driver(&self, path: &Path, volume: &Volume) -> Result<()> {
        self.inject_driver_with(path, volume, &CancellationToken::new())
            .await
    }

    pub async fn inject_driver_with(
        &self,
        path: &Path,
        volume: &Volume,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let root = self.driver.validator().validate_for_driver(volume, path)?;
        let invocation = Invocation::new(&self.dism, dism::add_driver_args(path, root));
        self.driver
            .run(OperationKind::AddDriver, TOOL_NAME, invocation, None, cancel)
            .await
    }

    /// Removes the driver package at `path`.
    pub async fn remove_driver(&self, path: &Path, volume: &Volume) -> Result<()> {
        self.remove_driver_with(path, volume, &CancellationToken::new())
            .await
    }

    pub async fn remove_driver_with(
        &self,
        path: &Path,
        volume: &Volume,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let root = self.driver.validator().validate_for_driver(volume, path)?;
        let invocation = Invocation::new(&self.dism, dism::remove_driver_args(path, root));
        self.driver
            .run(OperationKind::RemoveDriver, TOOL_NAME, invocation, None, cancel)
            .await
    }
}
