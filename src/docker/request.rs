//! Typed requests and responses of every docker action.
//!
//! Every request carries the [`Target`] it applies to and an optional
//! `sys_path`; a non-empty `sys_path` replaces the orchestrator's search path
//! for this and all later actions.

use super::command::DockerCommand;
use super::types::{ContainerInfo, ExpansionContext, ImageInfo, SearchPath, Target};
use super::{DockerError, Result};
use crate::gateway::{GatewayResponse, StepOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Replace the orchestrator's search path without touching the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysPathRequest {
    pub sys_path: SearchPath,
}

/// `docker images`, optionally filtered by repository and tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesRequest {
    pub target: Target,
    pub sys_path: SearchPath,
    pub repository: Option<String>,
    pub tag: Option<String>,
}

impl ImagesRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_sys_path(mut self, sys_path: SearchPath) -> Self {
        self.sys_path = sys_path;
        self
    }

    /// Whether `image` passes the repository and tag filters.
    pub fn matches(&self, image: &ImageInfo) -> bool {
        non_empty(&self.repository).is_none_or(|repository| image.repository == repository)
            && non_empty(&self.tag).is_none_or(|tag| image.tag == tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageInfo>,
}

/// `docker pull repository:tag`; the tag defaults to `latest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub target: Target,
    pub sys_path: SearchPath,
    pub repository: String,
    pub tag: String,
}

impl PullRequest {
    pub fn new(target: Target, repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            target,
            sys_path: SearchPath::default(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn effective_tag(&self) -> &str {
        match self.tag.trim() {
            "" => "latest",
            tag => tag,
        }
    }

    /// # Errors
    ///
    /// Returns [`DockerError::Validation`] when the repository is empty.
    pub fn validate(&self) -> Result<()> {
        if self.repository.trim().is_empty() {
            return Err(DockerError::Validation("repository was empty".to_string()));
        }
        Ok(())
    }
}

/// `docker ps -a`, optionally filtered by exact image and exact name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStatusRequest {
    pub target: Target,
    pub sys_path: SearchPath,
    pub image: Option<String>,
    pub names: Option<String>,
}

impl ContainerStatusRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_names(mut self, names: impl Into<String>) -> Self {
        self.names = Some(names.into());
        self
    }

    pub fn with_sys_path(mut self, sys_path: SearchPath) -> Self {
        self.sys_path = sys_path;
        self
    }

    pub fn matches(&self, container: &ContainerInfo) -> bool {
        non_empty(&self.image).is_none_or(|image| container.image == image)
            && non_empty(&self.names).is_none_or(|names| container.names == names)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatusResponse {
    pub containers: Vec<ContainerInfo>,
}

/// `docker start <target.name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStartRequest {
    pub target: Target,
    pub sys_path: SearchPath,
}

/// `docker stop <target.name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStopRequest {
    pub target: Target,
    pub sys_path: SearchPath,
}

/// `docker rm <target.name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerRemoveRequest {
    pub target: Target,
    pub sys_path: SearchPath,
}

/// Stop every container whose image contains one of `images`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopImagesRequest {
    pub target: Target,
    pub sys_path: SearchPath,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopImagesResponse {
    pub stopped_images: Vec<String>,
}

/// `docker exec` inside the target container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerCommandRequest {
    pub target: Target,
    pub sys_path: SearchPath,
    /// Shell command line, expanded but not escaped
    pub command: String,
    pub interactive: bool,
    pub allocate_terminal: bool,
    pub run_in_background: bool,
    /// Placeholder token to secret
    pub credentials: BTreeMap<String, String>,
}

impl ContainerCommandRequest {
    pub fn new(target: Target, command: impl Into<String>) -> Self {
        Self {
            target,
            command: command.into(),
            ..Default::default()
        }
    }

    /// `-itd` style option cluster, empty when no option is set.
    pub fn exec_options(&self) -> String {
        let flags: String = [
            (self.interactive, 'i'),
            (self.allocate_terminal, 't'),
            (self.run_in_background, 'd'),
        ]
        .iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, flag)| *flag)
        .collect();

        if flags.is_empty() {
            flags
        } else {
            format!("-{}", flags)
        }
    }
}

/// Raw output of a command-style action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub commands: Vec<StepOutput>,
    #[serde(default)]
    pub extracted: BTreeMap<String, String>,
}

impl CommandResponse {
    /// Combined stdout of every command.
    pub fn stdout(&self) -> String {
        self.commands.iter().map(|step| step.stdout.as_str()).collect()
    }
}

impl From<GatewayResponse> for CommandResponse {
    fn from(response: GatewayResponse) -> Self {
        Self {
            commands: response.steps,
            extracted: response.extracted,
        }
    }
}

/// `docker run --name <target.name> ... -d <image> <params>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub target: Target,
    pub sys_path: SearchPath,
    pub image: String,
    pub env: BTreeMap<String, String>,
    /// Host path to container path
    pub mounts: BTreeMap<String, String>,
    /// Host port to container port
    pub ports: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub params: BTreeMap<String, String>,
    /// Placeholder token to secret
    pub credentials: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new(target: Target, image: impl Into<String>) -> Self {
        Self {
            target,
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_mount(mut self, host: impl Into<String>, container: impl Into<String>) -> Self {
        self.mounts.insert(host.into(), container.into());
        self
    }

    pub fn with_port(mut self, host: impl Into<String>, container: impl Into<String>) -> Self {
        self.ports.insert(host.into(), container.into());
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_credential(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), secret.into());
        self
    }

    pub fn with_sys_path(mut self, sys_path: SearchPath) -> Self {
        self.sys_path = sys_path;
        self
    }

    /// # Errors
    ///
    /// Returns [`DockerError::Validation`] when the image or target name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(DockerError::Validation("image was empty".to_string()));
        }
        self.target.require_name().map(|_| ())
    }

    /// The `docker run` command line for this request.
    pub fn command(&self, program: &str, ctx: &ExpansionContext) -> DockerCommand {
        DockerCommand::new(program, "run")
            .option("--name", self.target.name.trim())
            .env_vars(&self.env, ctx)
            .mounts(&self.mounts, ctx)
            .ports(&self.ports, ctx)
            .workdir(self.workdir.as_deref(), ctx)
            .arg("-d")
            .arg(ctx.expand(&self.image))
            .params(&self.params, ctx)
    }
}
