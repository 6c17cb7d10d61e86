//! The core, UI-agnostic library for `deployr`.
//!
//! `deployr-core` deploys operating-system images onto mounted volumes, captures
//! volumes back into images, and services drivers in offline images. The
//! imaging itself is done by an external utility (DISM or wimlib-imagex); this
//! crate validates the request, runs the utility, streams its output to the
//! caller, honors cancellation, and classifies the result.
//!
//! The library is structured into several key modules:
//! - [`volume`]: The `Volume` and `ImageReference` inputs.
//! - [`validate`]: Pre-flight checks that run before any process is started.
//! - [`operation`]: The shared invocation protocol (`OperationDriver`).
//! - [`service`]: The `ImageService` capability, implemented by [`dism`] and [`wimlib`].
//! - [`drivers`]: Adding and removing drivers with DISM.
//! - [`progress`]: Relaying the utility's output lines to a progress observer.
//! - [`process`]: The process runner contract and its `tokio` implementation.
//! - [`platform`]: Per-OS argument passing and process termination.
//!
//! Every operation is `async` and returns only after the utility it started
//! has stopped, so a reported failure or cancellation never leaves a
//! privileged process running behind the caller's back.
//!
//! ## Example: Applying an Image with Progress Reporting
//!
//! ```rust,no_run
//! use deployr_core::{
//!     ApplyOptions, DismImageService, ImageReference, ImageService, OperationContext,
//!     ProgressEvent, ToolConfig, Volume,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> deployr_core::Result<()> {
//! let service = DismImageService::from_config(&ToolConfig::from_env());
//! let volume = Volume::new("D:\\");
//! let image = ImageReference::new("C:\\install.wim").with_index(2);
//!
//! // A token the caller can trigger from a Ctrl+C handler or a timeout.
//! let cancel = CancellationToken::new();
//!
//! let context = OperationContext::new()
//!     .with_progress(Arc::new(|event: &ProgressEvent| {
//!         if let Some(percent) = event.percentage() {
//!             println!("{percent:.1}%");
//!         }
//!     }))
//!     .with_cancellation(cancel.clone());
//!
//! service
//!     .apply_image(&volume, &image, ApplyOptions::default(), &context)
//!     .await?;
//!
//! service
//!     .drivers()
//!     .inject_driver(Path::new("C:\\drivers"), &volume)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dism;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod operation;
pub mod platform;
pub mod process;
pub mod progress;
pub mod service;
pub mod trace;
pub mod validate;
pub mod volume;
pub mod wimlib;

pub use config::ToolConfig;
pub use dism::DismImageService;
pub use drivers::DriverManager;
pub use error::{DeployError, Result};
pub use operation::{OperationContext, OperationDriver, OperationKind};
pub use process::{Invocation, ProcessExit, ProcessRunner, TokioProcessRunner};
pub use progress::{ProgressEvent, ProgressObserver};
pub use service::{ApplyOptions, ImageService};
pub use trace::{TraceEvent, TraceSink};
pub use volume::{ImageReference, Volume};
pub use wimlib::WimlibImageService;
