//! Action keywords, the request union and the response envelope.
//!
//! Callers name an action by keyword and hand over its JSON request; the
//! dispatcher decodes it into the matching [`DockerRequest`] variant, runs the
//! orchestrator handler and always answers with a [`ServiceResponse`].

use super::orchestrator::DockerOrchestrator;
use super::request::{
    CommandResponse, ContainerCommandRequest, ContainerRemoveRequest, ContainerStartRequest,
    ContainerStatusRequest, ContainerStatusResponse, ContainerStopRequest, ImagesRequest,
    ImagesResponse, PullRequest, RunRequest, StopImagesRequest, StopImagesResponse,
    SysPathRequest,
};
use super::types::{ContainerInfo, ExpansionContext, ImageInfo};
use super::{DockerError, Result};
use crate::gateway::CommandGateway;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

/// Keyword of every supported action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Run,
    #[serde(rename = "syspath")]
    SysPath,
    StopImages,
    Images,
    Pull,
    ContainerCommand,
    ContainerStart,
    ContainerStop,
    ContainerStatus,
    ContainerRemove,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Run,
        Action::SysPath,
        Action::StopImages,
        Action::Images,
        Action::Pull,
        Action::ContainerCommand,
        Action::ContainerStart,
        Action::ContainerStop,
        Action::ContainerStatus,
        Action::ContainerRemove,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Action::Run => "run",
            Action::SysPath => "syspath",
            Action::StopImages => "stop-images",
            Action::Images => "images",
            Action::Pull => "pull",
            Action::ContainerCommand => "container-command",
            Action::ContainerStart => "container-start",
            Action::ContainerStop => "container-stop",
            Action::ContainerStatus => "container-status",
            Action::ContainerRemove => "container-remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Action {
    type Err = DockerError;

    fn from_str(keyword: &str) -> Result<Self> {
        let keyword = keyword.trim();
        Action::ALL
            .into_iter()
            .find(|action| action.keyword() == keyword)
            .ok_or_else(|| DockerError::UnsupportedAction(keyword.to_string()))
    }
}

/// Typed request of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "request", rename_all = "kebab-case")]
pub enum DockerRequest {
    Run(RunRequest),
    #[serde(rename = "syspath")]
    SysPath(SysPathRequest),
    StopImages(StopImagesRequest),
    Images(ImagesRequest),
    Pull(PullRequest),
    ContainerCommand(ContainerCommandRequest),
    ContainerStart(ContainerStartRequest),
    ContainerStop(ContainerStopRequest),
    ContainerStatus(ContainerStatusRequest),
    ContainerRemove(ContainerRemoveRequest),
}

impl DockerRequest {
    /// Zero-valued request for `action`.
    pub fn new(action: Action) -> Self {
        match action {
            Action::Run => Self::Run(RunRequest::default()),
            Action::SysPath => Self::SysPath(SysPathRequest::default()),
            Action::StopImages => Self::StopImages(StopImagesRequest::default()),
            Action::Images => Self::Images(ImagesRequest::default()),
            Action::Pull => Self::Pull(PullRequest::default()),
            Action::ContainerCommand => Self::ContainerCommand(ContainerCommandRequest::default()),
            Action::ContainerStart => Self::ContainerStart(ContainerStartRequest::default()),
            Action::ContainerStop => Self::ContainerStop(ContainerStopRequest::default()),
            Action::ContainerStatus => Self::ContainerStatus(ContainerStatusRequest::default()),
            Action::ContainerRemove => Self::ContainerRemove(ContainerRemoveRequest::default()),
        }
    }

    /// Zero-valued request for an action keyword.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::UnsupportedAction`] for an unknown keyword.
    pub fn from_keyword(keyword: &str) -> Result<Self> {
        Ok(Self::new(keyword.parse()?))
    }

    /// Decode the JSON body of an `action` request.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Validation`] if the body does not match the action.
    pub fn from_json(action: Action, body: serde_json::Value) -> Result<Self> {
        fn decode<T: serde::de::DeserializeOwned>(action: Action, body: serde_json::Value) -> Result<T> {
            serde_json::from_value(body)
                .map_err(|e| DockerError::Validation(format!("invalid {} request: {}", action, e)))
        }

        Ok(match action {
            Action::Run => Self::Run(decode(action, body)?),
            Action::SysPath => Self::SysPath(decode(action, body)?),
            Action::StopImages => Self::StopImages(decode(action, body)?),
            Action::Images => Self::Images(decode(action, body)?),
            Action::Pull => Self::Pull(decode(action, body)?),
            Action::ContainerCommand => Self::ContainerCommand(decode(action, body)?),
            Action::ContainerStart => Self::ContainerStart(decode(action, body)?),
            Action::ContainerStop => Self::ContainerStop(decode(action, body)?),
            Action::ContainerStatus => Self::ContainerStatus(decode(action, body)?),
            Action::ContainerRemove => Self::ContainerRemove(decode(action, body)?),
        })
    }

    pub fn action(&self) -> Action {
        match self {
            Self::Run(_) => Action::Run,
            Self::SysPath(_) => Action::SysPath,
            Self::StopImages(_) => Action::StopImages,
            Self::Images(_) => Action::Images,
            Self::Pull(_) => Action::Pull,
            Self::ContainerCommand(_) => Action::ContainerCommand,
            Self::ContainerStart(_) => Action::ContainerStart,
            Self::ContainerStop(_) => Action::ContainerStop,
            Self::ContainerStatus(_) => Action::ContainerStatus,
            Self::ContainerRemove(_) => Action::ContainerRemove,
        }
    }

    /// Phrase prefixed to this request's error in the response envelope.
    fn error_context(&self) -> String {
        match self {
            Self::Run(request) => format!("failed to run container: {}", request.target.name),
            Self::SysPath(_) => "failed to set search path".to_string(),
            Self::StopImages(request) => format!("failed to stop images: {}", request.images.join(", ")),
            Self::Images(request) => format!(
                "failed to check images {}",
                request.tag.as_deref().unwrap_or_default()
            ),
            Self::Pull(request) => format!(
                "failed to pull image {}:{}",
                request.repository,
                request.effective_tag()
            ),
            Self::ContainerCommand(request) => format!(
                "failed to run docker command {} in {}",
                request.command, request.target.name
            ),
            Self::ContainerStart(request) => format!("failed start container {}", request.target.name),
            Self::ContainerStop(request) => format!("failed to stop container: {}", request.target.name),
            Self::ContainerStatus(_) => "failed to check process".to_string(),
            Self::ContainerRemove(request) => format!("failed to remove container: {}", request.target.name),
        }
    }
}

/// Envelope status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Action-specific payload of the envelope. Serialize-only: `null` stands for
/// both [`ResponsePayload::None`] and an absent container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    None,
    Images(ImagesResponse),
    Image(ImageInfo),
    Container(Option<ContainerInfo>),
    Status(ContainerStatusResponse),
    Command(CommandResponse),
    StoppedImages(StopImagesResponse),
}

/// Response envelope returned for every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response: ResponsePayload,
}

impl ServiceResponse {
    pub fn ok(response: ResponsePayload) -> Self {
        Self {
            status: Status::Ok,
            error: None,
            response,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            error: Some(message.into()),
            response: ResponsePayload::None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl<G: CommandGateway> DockerOrchestrator<G> {
    /// Run a typed request and wrap its outcome in the response envelope.
    pub async fn dispatch(&self, ctx: &ExpansionContext, request: &DockerRequest) -> ServiceResponse {
        let action = request.action();
        let span = info_span!("action", action = %action, id = %Uuid::new_v4());

        async {
            match self.handle(ctx, request).await {
                Ok(payload) => ServiceResponse::ok(payload),
                Err(e) => {
                    let message = format!("{}, {}", request.error_context(), e);
                    error!("{}", message);
                    ServiceResponse::error(message)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Decode and run a request named by keyword; a missing body is the zero request.
    pub async fn dispatch_keyword(
        &self,
        ctx: &ExpansionContext,
        keyword: &str,
        body: Option<serde_json::Value>,
    ) -> ServiceResponse {
        let request = keyword.parse::<Action>().and_then(|action| match body {
            Some(body) => DockerRequest::from_json(action, body),
            None => Ok(DockerRequest::new(action)),
        });

        match request {
            Ok(request) => self.dispatch(ctx, &request).await,
            Err(e) => {
                error!("{}", e);
                ServiceResponse::error(e.to_string())
            }
        }
    }

    async fn handle(&self, ctx: &ExpansionContext, request: &DockerRequest) -> Result<ResponsePayload> {
        Ok(match request {
            DockerRequest::Run(request) => ResponsePayload::Container(self.run(ctx, request).await?),
            DockerRequest::SysPath(request) => {
                self.set_search_path(request).await;
                ResponsePayload::None
            }
            DockerRequest::StopImages(request) => {
                ResponsePayload::StoppedImages(self.stop_images(ctx, request).await?)
            }
            DockerRequest::Images(request) => ResponsePayload::Images(self.images(ctx, request).await?),
            DockerRequest::Pull(request) => ResponsePayload::Image(self.pull(ctx, request).await?),
            DockerRequest::ContainerCommand(request) => {
                ResponsePayload::Command(self.run_in_container(ctx, request).await?)
            }
            DockerRequest::ContainerStart(request) => {
                ResponsePayload::Container(self.start(ctx, request).await?)
            }
            DockerRequest::ContainerStop(request) => {
                ResponsePayload::Container(self.stop(ctx, request).await?)
            }
            DockerRequest::ContainerStatus(request) => {
                ResponsePayload::Status(self.status(ctx, request).await?)
            }
            DockerRequest::ContainerRemove(request) => {
                ResponsePayload::Command(self.remove(ctx, request).await?)
            }
        })
    }
}
