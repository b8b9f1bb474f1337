//! # Command Execution Gateway
//!
//! The contract through which the orchestrator reaches a target host. A gateway
//! receives an ordered list of [`ExecutionStep`]s, runs them strictly in order
//! and returns the captured output of each plus every value pulled out by the
//! steps' regex extractions.
//!
//! ## Core Components
//!
//! - **[`CommandGateway`]**: async trait implemented by every transport
//! - **[`LocalGateway`]**: runs steps through a local shell with `tokio::process`
//! - **[`ReplayGateway`]**: serves recorded output for deterministic tests
//! - **[`GatewayRequest`]** / **[`GatewayResponse`]**: input and output of one call
//!
//! ## Credentials
//!
//! Secrets are never part of a command template. A step carries a map from a
//! placeholder token to a secret; the gateway resolves placeholders at
//! execution time and answers an expected prompt (typically `Password:`) with
//! the secret stored under [`PromptReply::credential_key`] once the prompt
//! shows up in live output.
//!
//! ## Execution Flow
//!
//! ```text
//! GatewayRequest { target, steps, options }
//!        ↓
//!   CommandGateway::execute()
//!        ↓
//!   step 1 → step 2 → ... (stop at first failure)
//!        ↓
//!  GatewayResponse { steps, extracted }
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dockhand::docker::Target;
//! use dockhand::gateway::{CommandGateway, ExecutionStep, GatewayRequest, LocalGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = LocalGateway::new();
//!     let request = GatewayRequest::new(
//!         Target::new("local://", ""),
//!         vec![ExecutionStep::new("docker ps")],
//!     );
//!
//!     let response = gateway.execute(request).await?;
//!     println!("{}", response.stdout());
//!     Ok(())
//! }
//! ```

use crate::docker::{SearchPath, Target};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Local shell transport.
pub mod local;

/// Recorded-output transport for tests.
pub mod replay;

pub use local::LocalGateway;
pub use replay::{RecordedCall, ReplayGateway};

/// Prompt that, once seen in live output, is answered with a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptReply {
    /// Substring to wait for
    pub expected: String,
    /// Key into [`ExecutionStep::credentials`] holding the reply
    pub credential_key: String,
}

/// Named regex extraction applied to a step's output.
///
/// The first capture group is stored, or the whole match when the pattern has
/// no groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub key: String,
    pub pattern: String,
}

/// One command run on the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Command line, possibly containing credential placeholders
    pub command: String,
    /// Placeholder token to secret
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    #[serde(default)]
    pub prompt: Option<PromptReply>,
    /// Substrings that mark the step as failed
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub extractions: Vec<Extraction>,
}

impl ExecutionStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, credentials: BTreeMap<String, String>) -> Self {
        self.credentials.extend(credentials);
        self
    }

    pub fn with_credential(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), secret.into());
        self
    }

    pub fn with_prompt(mut self, expected: impl Into<String>, credential_key: impl Into<String>) -> Self {
        self.prompt = Some(PromptReply {
            expected: expected.into(),
            credential_key: credential_key.into(),
        });
        self
    }

    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors.extend(errors.into_iter().map(Into::into));
        self
    }

    pub fn with_extraction(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.extractions.push(Extraction {
            key: key.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// First failure substring found in `output`, if any.
    pub fn failure_in<'a>(&'a self, output: &str) -> Option<&'a str> {
        self.errors
            .iter()
            .map(String::as_str)
            .find(|error| !error.is_empty() && output.contains(error))
    }

    /// Run this step's extractions over `output`, merging hits into `values`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPattern`] if a pattern does not compile.
    pub fn extract_into(
        &self,
        output: &str,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        for extraction in &self.extractions {
            let regex = Regex::new(&extraction.pattern).map_err(|e| GatewayError::InvalidPattern {
                pattern: extraction.pattern.clone(),
                reason: e.to_string(),
            })?;
            if let Some(caps) = regex.captures(output) {
                let hit = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
                if let Some(hit) = hit {
                    values.insert(extraction.key.clone(), hit.to_string());
                }
            }
        }
        Ok(())
    }
}

/// Options applied to every step of one gateway call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Directories prepended to the executable search path
    #[serde(default)]
    pub search_path: SearchPath,
    /// Upper bound for each step (None = no timeout)
    #[serde(default)]
    pub timeout: Option<Duration>,
    /// Output substrings after which a step stops reading
    #[serde(default)]
    pub terminators: Vec<String>,
}

/// Ordered steps to run against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub target: Target,
    pub steps: Vec<ExecutionStep>,
    #[serde(default)]
    pub options: ExecutionOptions,
}

impl GatewayRequest {
    pub fn new(target: Target, steps: Vec<ExecutionStep>) -> Self {
        Self {
            target,
            steps,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Captured output of one transcript segment.
///
/// A step answering a prompt yields two segments: the output up to and
/// including the prompt, then the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub command: String,
    pub stdout: String,
}

/// Result of a gateway call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub steps: Vec<StepOutput>,
    /// Values produced by every step's extractions
    #[serde(default)]
    pub extracted: BTreeMap<String, String>,
}

impl GatewayResponse {
    /// Combined stdout of every segment.
    pub fn stdout(&self) -> String {
        self.steps.iter().map(|step| step.stdout.as_str()).collect()
    }

    /// Stdout of the segment at `index`.
    pub fn stdout_at(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(|step| step.stdout.as_str())
    }
}

/// Errors raised by a gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A step's output matched one of its failure substrings
    #[error("command {command:?} failed on {matched:?}: {output}")]
    StepFailed {
        command: String,
        matched: String,
        output: String,
    },

    /// Step did not finish in time
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Target cannot be reached through this gateway
    #[error("Target unavailable: {0}")]
    Unavailable(String),

    /// Extraction pattern does not compile
    #[error("invalid extraction pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// No recorded output for a command
    #[error("no recorded output for command {0:?}")]
    NoRecording(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Runs ordered execution steps against a target host.
#[async_trait::async_trait]
pub trait CommandGateway: Send + Sync {
    /// Execute every step of `request` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails, a step times out, or a step's
    /// output matches one of its failure substrings.
    async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;

    /// Gateway type name for logging
    fn gateway_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_in_matches_first_substring() {
        let step = ExecutionStep::new("docker ps").with_errors(["failed", "command not found"]);

        assert_eq!(step.failure_in("sh: docker: command not found"), Some("command not found"));
        assert_eq!(step.failure_in("CONTAINER ID   IMAGE"), None);
    }

    #[test]
    fn test_extract_into() {
        let step = ExecutionStep::new("docker version")
            .with_extraction("version", r"Version:\s+(\S+)")
            .with_extraction("os", r"linux|darwin");
        let mut values = BTreeMap::new();

        step.extract_into("Client:\n Version:      18.03.1-ce\n OS/Arch: linux/amd64", &mut values)
            .unwrap();

        assert_eq!(values.get("version").map(String::as_str), Some("18.03.1-ce"));
        assert_eq!(values.get("os").map(String::as_str), Some("linux"));
    }

    #[test]
    fn test_extract_into_rejects_bad_pattern() {
        let step = ExecutionStep::new("true").with_extraction("broken", "(unclosed");
        let mut values = BTreeMap::new();
        let result = step.extract_into("anything", &mut values);
        assert!(matches!(result, Err(GatewayError::InvalidPattern { .. })));
    }

    #[test]
    fn test_response_stdout_joins_segments() {
        let response = GatewayResponse {
            steps: vec![
                StepOutput {
                    command: "sudo docker ps".to_string(),
                    stdout: "Password:".to_string(),
                },
                StepOutput {
                    command: "sudo docker ps".to_string(),
                    stdout: "\nCONTAINER ID".to_string(),
                },
            ],
            extracted: BTreeMap::new(),
        };
        assert_eq!(response.stdout(), "Password:\nCONTAINER ID");
        assert_eq!(response.stdout_at(1), Some("\nCONTAINER ID"));
        assert_eq!(response.stdout_at(2), None);
    }
}
