//! Request body loading for the binary

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Request file '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("IO error reading '{path}': {source}")]
    IoError { path: PathBuf, source: io::Error },

    #[error("Request in '{path}' is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where the JSON request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSource {
    /// No body, the action runs with its zero request
    Empty,
    Stdin,
    File(PathBuf),
}

impl RequestSource {
    pub fn from_arg(arg: Option<&Path>) -> Self {
        match arg {
            None => Self::Empty,
            Some(path) if path == Path::new("-") => Self::Stdin,
            Some(path) => Self::File(path.to_path_buf()),
        }
    }

    /// Read and decode the body; blank input counts as no body.
    pub fn load(&self) -> Result<Option<serde_json::Value>, InputError> {
        let (path, content) = match self {
            Self::Empty => return Ok(None),
            Self::Stdin => {
                let path = PathBuf::from("<stdin>");
                let mut content = String::new();
                io::stdin()
                    .read_to_string(&mut content)
                    .map_err(|source| InputError::IoError {
                        path: path.clone(),
                        source,
                    })?;
                (path, content)
            }
            Self::File(path) => {
                if !path.exists() {
                    return Err(InputError::NotFound { path: path.clone() });
                }
                let content = fs::read_to_string(path).map_err(|source| InputError::IoError {
                    path: path.clone(),
                    source,
                })?;
                (path.clone(), content)
            }
        };

        debug!("Loaded request from {:?} ({} bytes)", path, content.len());
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| InputError::InvalidJson { path, source })
    }
}
