//! # Dockhand
//!
//! Container lifecycle orchestration over the docker CLI of a target host.
//! Images and containers are driven by issuing docker command lines through a
//! command gateway and reading the columnar text they print back as typed
//! state.
//!
//! ## Architecture Overview
//!
//! - **[`docker`]**: tabular output parser, typed records, command builder,
//!   the orchestrator actions and the keyword dispatcher
//! - **[`gateway`]**: the command execution contract plus local-shell and
//!   replay implementations
//! - **[`config`]**: TOML configuration with a discovery hierarchy
//! - **[`env`]**: CLI markers, defaults and path helpers
//! - **[`cli`]**: argument parsing for the `dockhand` binary
//!
//! ## Guarantees
//!
//! - One orchestrator runs one action at a time, status queries included.
//! - `run` is destructive-idempotent: a same-named container is always stopped
//!   and removed before the new one is created.
//! - A name conflict reported by `docker run` is retried exactly once.
//! - Multi-valued flags are emitted in key order, so identical requests render
//!   identical command lines.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dockhand::docker::{Action, DockerRequest, ExpansionContext};
//! use dockhand::{DockerOrchestrator, LocalGateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = DockerOrchestrator::new(LocalGateway::new());
//!
//!     let request = DockerRequest::new(Action::Images);
//!     let response = orchestrator.dispatch(&ExpansionContext::new(), &request).await;
//!
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```

/// Environment constants and path utilities.
///
/// Centralizes CLI output markers, defaults and configuration paths.
pub mod env;

/// Configuration loading and discovery.
pub mod config;

/// Command execution gateway contract and transports.
pub mod gateway;

/// Docker image and container orchestration.
pub mod docker;

// CLI module for command-line interface
pub mod cli;

pub use config::{ConfigError, DockhandConfig};
pub use docker::{
    Action, DockerError, DockerOrchestrator, DockerRequest, OrchestratorConfig, ServiceResponse,
};
pub use gateway::{CommandGateway, GatewayError, LocalGateway, ReplayGateway};
