//! The wimlib-imagex backend.
//!
//! Useful where DISM is unavailable. wimlib has no driver servicing, so
//! [`WimlibImageService::drivers`] still goes through DISM.
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

pub const TOOL_NAME: &str = "wimlib-imagex";

/// `apply <path> <n> <root> [--compact=XPRESS4K]`
pub fn apply_args(image: &ImageReference, root: &Path, compact: bool) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        image.path.display().to_string(),
        image.index.to_string(),
        root.display().to_string(),
    ];
    if compact {
        args.push("--compact=XPRESS4K".to_string());
    }
    args
}

/// `capture <root> <destination>`
pub fn capture_args(destination: &Path, root: &Path) -> Vec<String> {
    vec![
        "capture".to_string(),
        root.display().to_string(),
        destination.display().to_string(),
    ]
}

#[derive(Clone, Debug)]
pub struct WimlibImageService {
    driver: OperationDriver,
    program: PathBuf,
    dism: PathBuf,
}

impl WimlibImageService {
    pub fn new(driver: OperationDriver, program: impl Into<PathBuf>, dism: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            program: program.into(),
            dism: dism.into(),
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        let runner = TokioProcessRunner::new(config.termination_grace());
        let driver =
            OperationDriver::new(Arc::new(runner)).with_transcript_lines(config.transcript_lines);
        Self::new(driver, &config.wimlib_path, &config.dism_path)
    }

    pub fn drivers(&self) -> DriverManager {
        DriverManager::new(self.driver.clone(), self.dism.clone())
    }
}

#[async_trait]
impl ImageService for WimlibImageService {
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
