//! The error taxonomy shared by every operation.
use crate::operation::OperationKind;
use std::path::PathBuf;
use thiserror::Error;

/// Everything an imaging operation can fail with.
///
/// Validation errors (`InvalidArgument`, `ImageNotFound`) are raised before any
/// process is started. Every other variant is raised only after the external
/// utility is known to have stopped.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Image not found: {}. Please, verify that the file exists and it's accessible.",
        .path.display()
    )]
    ImageNotFound { path: PathBuf },

    #[error(
        "There has been a problem during {}: {tool} exited with code {exit_code}.",
        .operation.context()
    )]
    Deployment {
        operation: OperationKind,
        tool: String,
        exit_code: i32,
        output: String,
    },

    #[error(
        "There has been a problem during {}: {tool} was terminated before it could finish.",
        .operation.context()
    )]
    Terminated {
        operation: OperationKind,
        tool: String,
        output: String,
    },

    #[error("The {} was cancelled", .operation.context())]
    Cancelled { operation: OperationKind },

    #[error("Could not run the imaging utility for {}: {source:#}", .operation.context())]
    Runner {
        operation: OperationKind,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The exit code reported by the external utility, if it got that far.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Deployment { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// The captured tail of the utility's output, if the process ran.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Deployment { output, .. } | Self::Terminated { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_error_names_context_and_code() {
        let err = DeployError::Deployment {
            operation: OperationKind::AddDriver,
            tool: "DISM".to_string(),
            exit_code: 3,
            output: "Error: 3".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "There has been a problem during deployment: DISM exited with code 3."
        );
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.output(), Some("Error: 3"));
    }

    #[test]
    fn image_not_found_mentions_path() {
        let err = DeployError::ImageNotFound {
            path: PathBuf::from("C:\\missing.wim"),
        };
        assert!(err.to_string().contains("C:\\missing.wim"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn runner_error_keeps_source_chain() {
        let err = DeployError::Runner {
            operation: OperationKind::ApplyImage,
            source: anyhow::anyhow!("no such file").context("failed to start dism"),
        };
        assert_eq!(
            err.to_string(),
            "Could not run the imaging utility for image application: failed to start dism: no such file"
        );
    }
}
