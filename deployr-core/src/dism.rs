//! The DISM backend.
//!
//! DISM applies and captures WIM images and is also the tool used for
//! offline driver servicing (see [`crate::drivers`]).
use crate::config::ToolConfig;
use crate::drivers::DriverManager;
use crate::error::Result;
use crate::operation::{OperationContext, OperationDriver, OperationKind};
use crate::process::{Invocation, TokioProcessRunner};
use crate::service::{ApplyOptions, ImageService};
use crate::volume::{ImageReference, Volume};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TOOL_NAME: &str = "DISM";

/// `/Apply-Image /ImageFile:<path> /Index:<n> /ApplyDir:<root> [/Compact]`
pub fn apply_args(image: &ImageReference, root: &Path, compact: bool) -> Vec<String> {
    let mut args = vec![
        "/Apply-Image".to_string(),
        format!("/ImageFile:{}", image.path.display()),
        format!("/Index:{}", image.index),
        format!("/ApplyDir:{}", root.display()),
    ];
    if compact {
        args.push("/Compact".to_string());
    }
    args
}

/// `/Capture-Image /ImageFile:<destination> /CaptureDir:<root>`
pub fn capture_args(destination: &Path, root: &Path) -> Vec<String> {
    vec![
        "/Capture-Image".to_string(),
        format!("/ImageFile:{}", destination.display()),
        format!("/CaptureDir:{}", root.display()),
    ]
}

/// `/Add-Driver /Image:<root> /Driver:"<path>" /Recurse`
pub fn add_driver_args(driver: &Path, root: &Path) -> Vec<String> {
    vec![
        "/Add-Driver".to_string(),
        format!("/Image:{}", root.display()),
        format!("/Driver:\"{}\"", driver.display()),
        "/Recurse".to_string(),
    ]
}

/// `/Remove-Driver /Image:<root> /Driver:"<path>"`
pub fn remove_driver_args(driver: &Path, root: &Path) -> Vec<String> {
    vec![
        "/Remove-Driver".to_string(),
        format!("/Image:{}", root.display()),
        format!("/Driver:\"{}\"", driver.display()),
    ]
}

/// Applies and captures images with DISM.
#[derive(Clone, Debug)]
pub struct DismImageService {
    driver: OperationDriver,
    program: PathBuf,
}

impl DismImageService {
    pub fn new(driver: OperationDriver, program: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            program: program.into(),
        }
    }

    /// A service running the configured DISM binary as a child process.
    pub fn from_config(config: &ToolConfig) -> Self {
        let runner = TokioProcessRunner::new(config.termination_grace());
        let driver =
            OperationDriver::new(Arc::new(runner)).with_transcript_lines(config.transcript_lines);
        Self::new(driver, &config.dism_path)
    }

    /// Driver servicing against the same DISM binary and collaborators.
    pub fn drivers(&self) -> DriverManager {
        DriverManager::new(self.driver.clone(), self.program.clone())
    }
}

#[async_trait]
impl ImageService for DismImageService {
    fn tool_name(&self) -> &str {
        TOOL_NAME
    }

    async fn apply_image(
        &self,
        volume: &Volume,
        image: &ImageReference,
        options: ApplyOptions,
        context: &OperationContext,
    ) -> Result<()> {
        let root = self.driver.validator().validate_for_apply(volume, image)?;
        let invocation = Invocation::new(&self.program, apply_args(image, root, options.compact));

        self.driver
            .run(
                OperationKind::ApplyImage,
                TOOL_NAME,
                invocation,
                context.progress(),
                context.cancellation(),
            )
            .await
    }

    async fn capture_image(
        &self,
        volume: &Volume,
        destination: &Path,
        context: &OperationContext,
    ) -> Result<()> {
        let root = self
            .driver
            .validator()
            .validate_for_capture(volume, destination)?;
        let invocation = Invocation::new(&self.program, capture_args(destination, root));

        self.driver
            .run(
                OperationKind::CaptureImage,
                TOOL_NAME,
                invocation,
                context.progress(),
                context.cancellation(),
            )
            .await
    }
}
