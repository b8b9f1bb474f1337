//! Container lifecycle orchestration over the docker CLI.
//!
//! This module drives images and containers on a target host by sending docker
//! command lines through a [`CommandGateway`](crate::gateway::CommandGateway),
//! parsing the columnar text they print into typed records and reconciling
//! that observed state against the requested action.
//!
//! ## Architecture
//!
//! - [`parser`]: tabular output parser and size normalisation
//! - [`types`]: image/container records, targets, search path, variable expansion
//! - [`command`]: deterministic docker command line builder
//! - [`request`]: typed requests and responses of every action
//! - [`orchestrator`]: the per-action reconciliation procedures
//! - [`dispatch`]: action keywords, request union and response envelope
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dockhand::docker::{DockerOrchestrator, ExpansionContext, RunRequest, Target};
//! use dockhand::gateway::LocalGateway;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = DockerOrchestrator::new(LocalGateway::new());
//!
//!     let request = RunRequest::new(Target::new("local://", "").with_name("db1"), "mysql:5.6")
//!         .with_port("3306", "3306")
//!         .with_env("MYSQL_ROOT_PASSWORD", "**mysql**")
//!         .with_credential("**mysql**", "dev");
//!
//!     let info = orchestrator.run(&ExpansionContext::new(), &request).await?;
//!     println!("{:?}", info);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod dispatch;
pub mod orchestrator;
pub mod parser;
pub mod request;
pub mod types;

pub use command::DockerCommand;
pub use dispatch::{Action, DockerRequest, ResponsePayload, ServiceResponse, Status};
pub use orchestrator::{DockerOrchestrator, OrchestratorConfig};
pub use parser::{extract_columns, parse_containers, parse_images, parse_size};
pub use request::{
    CommandResponse, ContainerCommandRequest, ContainerRemoveRequest, ContainerStartRequest,
    ContainerStatusRequest, ContainerStatusResponse, ContainerStopRequest, ImagesRequest,
    ImagesResponse, PullRequest, RunRequest, StopImagesRequest, StopImagesResponse,
    SysPathRequest,
};
pub use types::{ContainerInfo, ContainerStatus, ExpansionContext, ImageInfo, SearchPath, Target};

use crate::gateway::GatewayError;

/// Docker orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    /// A required request field is missing
    #[error("{0}")]
    Validation(String),

    /// The gateway could not reach or execute on the target
    #[error("{0}")]
    Transport(GatewayError),

    /// The docker CLI reported a failure in otherwise successful output
    #[error("{0}")]
    Cli(String),

    /// A query expected to resolve to exactly one record did not
    #[error("{0}")]
    AmbiguousResult(String),

    /// No handler exists for the requested action
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
}

impl From<GatewayError> for DockerError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::StepFailed {
                command, output, ..
            } => Self::Cli(format!(
                "Error executing {}, {}",
                command,
                parser::strip_terminal_escapes(&output)
            )),
            other => Self::Transport(other),
        }
    }
}

/// Result type for docker operations.
pub type Result<T> = std::result::Result<T, DockerError>;
