//! Container lifecycle orchestration.
//!
//! Each action is a short procedure: build docker command lines, run them
//! through the gateway, parse the listings, then reconcile. Mutating actions
//! re-read container state from `docker ps` rather than trusting the exit of
//! the mutating command, except `stop`, which is trusted optimistically.
//!
//! One orchestrator runs at most one action at a time, read-only status
//! included. The lock is held from the first lookup to the final verification.

use super::command::DockerCommand;
use super::parser::{parse_containers, parse_images, strip_terminal_escapes};
use super::request::{
    CommandResponse, ContainerCommandRequest, ContainerRemoveRequest, ContainerStartRequest,
    ContainerStatusRequest, ContainerStatusResponse, ContainerStopRequest, ImagesRequest,
    ImagesResponse, PullRequest, RunRequest, StopImagesRequest, StopImagesResponse,
    SysPathRequest,
};
use super::types::{ContainerInfo, ContainerStatus, ExpansionContext, ImageInfo, SearchPath, Target};
use super::{DockerError, Result};
use crate::env::{self, credentials::SUDO_KEY, markers};
use crate::gateway::{CommandGateway, ExecutionOptions, ExecutionStep, GatewayRequest, GatewayResponse};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Docker binary invoked on the target
    pub docker_binary: String,
    /// Initial search path of the instance
    pub search_path: SearchPath,
    /// Gateway timeout per call
    pub timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            docker_binary: env::DEFAULT_DOCKER_BINARY.to_string(),
            search_path: SearchPath::default(),
            timeout: Some(Duration::from_secs(env::DEFAULT_TIMEOUT_SECS)),
        }
    }
}

/// Per-action values threaded through every internal step.
struct Scope<'a> {
    search_path: SearchPath,
    vars: &'a ExpansionContext,
}

/// Docker orchestrator over a command gateway.
pub struct DockerOrchestrator<G> {
    gateway: G,
    config: OrchestratorConfig,
    /// Instance search path; holding the lock is holding the action slot.
    search_path: Mutex<SearchPath>,
}

impl<G: CommandGateway> DockerOrchestrator<G> {
    /// Create an orchestrator with default configuration.
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, OrchestratorConfig::default())
    }

    /// Create an orchestrator with custom configuration.
    pub fn with_config(gateway: G, config: OrchestratorConfig) -> Self {
        let search_path = Mutex::new(config.search_path.clone());
        Self {
            gateway,
            config,
            search_path,
        }
    }

    /// Get the underlying gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Current instance search path.
    pub async fn search_path(&self) -> SearchPath {
        self.search_path.lock().await.clone()
    }

    /// Replace the instance search path. Runs no command.
    pub async fn set_search_path(&self, request: &SysPathRequest) {
        let mut search_path = self.search_path.lock().await;
        debug!("Setting search path: {:?}", request.sys_path.entries());
        *search_path = request.sys_path.clone();
    }

    /// List images, filtered by the request's repository and tag.
    ///
    /// # Errors
    ///
    /// Returns error if the listing command fails.
    pub async fn images(&self, ctx: &ExpansionContext, request: &ImagesRequest) -> Result<ImagesResponse> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.list_images(&scope, request).await
    }

    /// Pull an image and return the single matching local image.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Cli`] if the registry reports the image missing and
    /// [`DockerError::AmbiguousResult`] unless exactly one image matches afterwards.
    pub async fn pull(&self, ctx: &ExpansionContext, request: &PullRequest) -> Result<ImageInfo> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.pull_image(&scope, request).await
    }

    /// List containers matching the request's image and name filters.
    ///
    /// # Errors
    ///
    /// Returns error if the listing command fails.
    pub async fn status(
        &self,
        ctx: &ExpansionContext,
        request: &ContainerStatusRequest,
    ) -> Result<ContainerStatusResponse> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        let containers = self.list_containers(&scope, request).await?;
        Ok(ContainerStatusResponse { containers })
    }

    /// Look up the container named by `target`; `None` unless exactly one matches.
    ///
    /// # Errors
    ///
    /// Returns error if the listing command fails.
    pub async fn status_single(
        &self,
        ctx: &ExpansionContext,
        target: &Target,
        sys_path: &SearchPath,
    ) -> Result<Option<ContainerInfo>> {
        let (scope, _slot) = self.begin(ctx, sys_path).await;
        self.find_container(&scope, target).await
    }

    /// Start the target container and return its verified state.
    ///
    /// # Errors
    ///
    /// Returns error if the target has no name or the start command fails.
    pub async fn start(
        &self,
        ctx: &ExpansionContext,
        request: &ContainerStartRequest,
    ) -> Result<Option<ContainerInfo>> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.start_container(&scope, &request.target).await
    }

    /// Stop the target container; a missing container is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the target has no name or the stop command fails.
    pub async fn stop(
        &self,
        ctx: &ExpansionContext,
        request: &ContainerStopRequest,
    ) -> Result<Option<ContainerInfo>> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.stop_container(&scope, &request.target).await
    }

    /// Remove the target container and return the raw command output.
    ///
    /// # Errors
    ///
    /// Returns error if the target has no name or the remove command fails.
    pub async fn remove(
        &self,
        ctx: &ExpansionContext,
        request: &ContainerRemoveRequest,
    ) -> Result<CommandResponse> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.remove_container(&scope, &request.target).await
    }

    /// Recreate the target container from an image.
    ///
    /// Any existing container with the same name is stopped and removed first,
    /// whatever its state. A name conflict reported by `docker run` is retried
    /// once after another stop and remove.
    ///
    /// # Errors
    ///
    /// Returns error on validation failure, on any failing command, or when the
    /// name is still in use after the retry.
    pub async fn run(&self, ctx: &ExpansionContext, request: &RunRequest) -> Result<Option<ContainerInfo>> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.run_container(&scope, request).await
    }

    /// Stop every running container whose image contains one of the requested images.
    ///
    /// # Errors
    ///
    /// Returns error if the listing or any stop fails.
    pub async fn stop_images(
        &self,
        ctx: &ExpansionContext,
        request: &StopImagesRequest,
    ) -> Result<StopImagesResponse> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.stop_matching_images(&scope, request).await
    }

    /// Run a command inside the target container with `docker exec`.
    ///
    /// # Errors
    ///
    /// Returns error if the target has no name or the command fails.
    pub async fn run_in_container(
        &self,
        ctx: &ExpansionContext,
        request: &ContainerCommandRequest,
    ) -> Result<CommandResponse> {
        let (scope, _slot) = self.begin(ctx, &request.sys_path).await;
        self.exec_in_container(&scope, request).await
    }

    /// Claim the action slot and resolve the search path for this action.
    async fn begin<'a>(
        &'a self,
        vars: &'a ExpansionContext,
        sys_path: &SearchPath,
    ) -> (Scope<'a>, tokio::sync::MutexGuard<'a, SearchPath>) {
        let mut slot = self.search_path.lock().await;
        if !sys_path.is_empty() {
            *slot = sys_path.clone();
        }
        let scope = Scope {
            search_path: slot.clone(),
            vars,
        };
        (scope, slot)
    }

    fn docker(&self, subcommand: &str) -> DockerCommand {
        DockerCommand::new(&self.config.docker_binary, subcommand)
    }

    async fn execute(
        &self,
        scope: &Scope<'_>,
        target: &Target,
        command: &DockerCommand,
        credentials: &BTreeMap<String, String>,
        errors: &[&str],
    ) -> Result<GatewayResponse> {
        let command = command.render();
        debug!("Executing docker command on {}: {}", target.url, command);

        let mut step = ExecutionStep::new(&command)
            .with_credentials(credentials.clone())
            .with_errors(errors.iter().copied().chain([markers::COMMAND_NOT_FOUND]));
        if !target.credential.is_empty() {
            step = step
                .with_credential(SUDO_KEY, &target.credential)
                .with_prompt(markers::PASSWORD_PROMPT, SUDO_KEY);
        }

        let request = GatewayRequest::new(target.clone(), vec![step]).with_options(ExecutionOptions {
            search_path: scope.search_path.clone(),
            timeout: self.config.timeout,
            terminators: Vec::new(),
        });
        let response = self.gateway.execute(request).await?;

        let stdout = response.stdout();
        if stdout.contains(markers::CONTAINER_IN_USE) {
            return Ok(response);
        }
        if stdout.contains(markers::DAEMON_ERROR) {
            return Err(DockerError::Cli(format!(
                "Error executing {}, {}",
                command,
                strip_terminal_escapes(&stdout)
            )));
        }
        Ok(response)
    }

    async fn list_images(&self, scope: &Scope<'_>, request: &ImagesRequest) -> Result<ImagesResponse> {
        let response = self
            .execute(scope, &request.target, &self.docker("images"), &BTreeMap::new(), markers::DEFAULT_ERRORS)
            .await?;

        let images = parse_images(&response.stdout())
            .into_iter()
            .filter(|image| request.matches(image))
            .collect();
        Ok(ImagesResponse { images })
    }

    async fn pull_image(&self, scope: &Scope<'_>, request: &PullRequest) -> Result<ImageInfo> {
        request.validate()?;
        let repository = scope.vars.expand(request.repository.trim());
        let tag = scope.vars.expand(request.effective_tag());

        info!("Pulling image {}:{}", repository, tag);
        let command = self.docker("pull").arg(format!("{}:{}", repository, tag));
        let response = self
            .execute(scope, &request.target, &command, &BTreeMap::new(), markers::DEFAULT_ERRORS)
            .await?;

        let stdout = response.stdout();
        if stdout.contains(markers::NOT_FOUND) {
            return Err(DockerError::Cli(format!(
                "failed to pull docker image, {}",
                strip_terminal_escapes(&stdout)
            )));
        }

        let lookup = ImagesRequest::new(request.target.clone())
            .with_repository(repository.as_str())
            .with_tag(tag.as_str());
        let mut images = self.list_images(scope, &lookup).await?.images;
        if images.len() == 1 {
            return Ok(images.remove(0));
        }
        Err(DockerError::AmbiguousResult(format!(
            "failed to check image status: {}:{} found: {}",
            repository,
            tag,
            images.len()
        )))
    }

    async fn list_containers(
        &self,
        scope: &Scope<'_>,
        request: &ContainerStatusRequest,
    ) -> Result<Vec<ContainerInfo>> {
        let response = self
            .execute(
                scope,
                &request.target,
                &self.docker("ps").arg("-a"),
                &BTreeMap::new(),
                markers::DEFAULT_ERRORS,
            )
            .await?;

        Ok(parse_containers(&response.stdout())
            .into_iter()
            .filter(|container| request.matches(container))
            .collect())
    }

    async fn find_container(&self, scope: &Scope<'_>, target: &Target) -> Result<Option<ContainerInfo>> {
        let name = target.require_name()?;
        let request = ContainerStatusRequest::new(target.clone()).with_names(name);
        let mut containers = self.list_containers(scope, &request).await?;
        if containers.len() == 1 {
            return Ok(containers.pop());
        }
        Ok(None)
    }

    async fn start_container(&self, scope: &Scope<'_>, target: &Target) -> Result<Option<ContainerInfo>> {
        let name = target.require_name()?;
        info!("Starting container: {}", name);
        self.execute(scope, target, &self.docker("start").arg(name), &BTreeMap::new(), markers::DEFAULT_ERRORS)
            .await?;
        self.find_container(scope, target).await
    }

    async fn stop_container(&self, scope: &Scope<'_>, target: &Target) -> Result<Option<ContainerInfo>> {
        let name = target.require_name()?;
        let Some(mut info) = self.find_container(scope, target).await? else {
            debug!("Container {} not found, nothing to stop", name);
            return Ok(None);
        };

        info!("Stopping container: {}", name);
        self.execute(scope, target, &self.docker("stop").arg(name), &BTreeMap::new(), markers::DEFAULT_ERRORS)
            .await?;
        info.status = ContainerStatus::Down;
        Ok(Some(info))
    }

    async fn remove_container(&self, scope: &Scope<'_>, target: &Target) -> Result<CommandResponse> {
        let name = target.require_name()?;
        info!("Removing container: {}", name);
        let response = self
            .execute(scope, target, &self.docker("rm").arg(name), &BTreeMap::new(), markers::DEFAULT_ERRORS)
            .await?;
        Ok(response.into())
    }

    async fn reset_container(&self, scope: &Scope<'_>, target: &Target) -> Result<()> {
        self.stop_container(scope, target).await?;
        self.remove_container(scope, target).await?;
        Ok(())
    }

    async fn run_container(&self, scope: &Scope<'_>, request: &RunRequest) -> Result<Option<ContainerInfo>> {
        request.validate()?;
        let target = &request.target;
        let name = target.require_name()?;

        let existing = ContainerStatusRequest::new(target.clone()).with_names(name);
        if !self.list_containers(scope, &existing).await?.is_empty() {
            info!("Resetting existing container: {}", name);
            self.reset_container(scope, target).await?;
        }

        let command = request.command(&self.config.docker_binary, scope.vars);
        info!("Running container {} from {}", name, request.image);
        let response = self.execute(scope, target, &command, &request.credentials, &[]).await?;

        if response.stdout().contains(markers::CONTAINER_IN_USE) {
            warn!("Container name {} already in use, retrying once", name);
            if let Err(e) = self.stop_container(scope, target).await {
                warn!("Failed to stop conflicting container {}: {}", name, e);
            }
            if let Err(e) = self.remove_container(scope, target).await {
                warn!("Failed to remove conflicting container {}: {}", name, e);
            }

            let retry = self
                .execute(scope, target, &command, &request.credentials, markers::DEFAULT_ERRORS)
                .await?;
            let stdout = retry.stdout();
            if stdout.contains(markers::CONTAINER_IN_USE) {
                return Err(DockerError::Cli(format!(
                    "container name {} still in use after retry, {}",
                    name,
                    strip_terminal_escapes(&stdout)
                )));
            }
        }

        self.find_container(scope, target).await
    }

    async fn stop_matching_images(
        &self,
        scope: &Scope<'_>,
        request: &StopImagesRequest,
    ) -> Result<StopImagesResponse> {
        let patterns: Vec<&str> = request
            .images
            .iter()
            .map(|image| image.trim())
            .filter(|image| !image.is_empty())
            .collect();

        let all = ContainerStatusRequest::new(request.target.clone());
        let containers = self.list_containers(scope, &all).await?;

        let mut response = StopImagesResponse::default();
        for container in containers {
            if !container.is_running() || !patterns.iter().any(|pattern| container.image.contains(pattern)) {
                continue;
            }
            let target = request.target.with_name(container.primary_name());
            self.stop_container(scope, &target).await?;
            response.stopped_images.push(container.image);
        }
        Ok(response)
    }

    async fn exec_in_container(
        &self,
        scope: &Scope<'_>,
        request: &ContainerCommandRequest,
    ) -> Result<CommandResponse> {
        let name = request.target.require_name().map_err(|_| {
            DockerError::Validation(format!(
                "target name was empty for {} and command {}",
                request.target.url, request.command
            ))
        })?;

        let mut command = self.docker("exec");
        let options = request.exec_options();
        if !options.is_empty() {
            command = command.arg(options);
        }
        let command = command.arg(name).raw(scope.vars.expand(&request.command));

        let mut response: CommandResponse = self
            .execute(scope, &request.target, &command, &request.credentials, markers::DEFAULT_ERRORS)
            .await?
            .into();

        // Drop the echoed password exchange so callers see the container's own output.
        if response.commands.len() > 1 && response.commands[0].stdout.contains(markers::PASSWORD_PROMPT) {
            response.commands.remove(0);
        }
        Ok(response)
    }
}
