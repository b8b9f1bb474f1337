//! Environment constants and path utilities for dockhand.
//!
//! This module centralizes the CLI banners the orchestrator reacts to, default
//! binary locations and configuration file names, so parsing and reconciliation
//! code never embeds literal marker strings.

/// Main application directory name (hidden directory like .git, .vscode)
pub const DOCKHAND_DIR_NAME: &str = ".dockhand";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up directly in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "dockhand.toml";

/// Default docker binary name
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Default shell used by the local gateway
pub const DEFAULT_SHELL: &str = "sh";

/// Default gateway timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Markers emitted by the docker CLI that drive reconciliation decisions
pub mod markers {
    /// Banner printed when `docker run --name` collides with an existing container
    pub const CONTAINER_IN_USE: &str = "is already in use by container";

    /// Banner printed when an image is missing locally and cannot be resolved
    pub const UNABLE_TO_FIND_IMAGE: &str = "unable to find image";

    /// Prefix of every daemon-side failure
    pub const DAEMON_ERROR: &str = "Error response";

    /// Generic failure substring
    pub const FAILED: &str = "failed";

    /// Printed by the shell when the docker binary cannot be resolved
    pub const COMMAND_NOT_FOUND: &str = "command not found";

    /// Printed by `docker pull` for an unknown repository or tag
    pub const NOT_FOUND: &str = "not found";

    /// Marker of a running process in `docker ps` output
    pub const RUNNING: &str = "Up";

    /// Interactive password prompt echoed by sudo
    pub const PASSWORD_PROMPT: &str = "Password:";

    /// Header label of the `docker images` listing
    pub const IMAGES_HEADER: &str = "REPOSITORY";

    /// Header label of the `docker ps` listing
    pub const PROCESS_HEADER: &str = "CONTAINER ID";

    /// Failure substrings attached to every docker step
    pub const DEFAULT_ERRORS: &[&str] = &[FAILED, UNABLE_TO_FIND_IMAGE];
}

/// Credential placeholder keys
pub mod credentials {
    /// Placeholder under which the target's own credential answers the sudo prompt
    pub const SUDO_KEY: &str = "**sudo**";
}

use std::path::{Path, PathBuf};

/// Build the main .dockhand directory path from a root directory
pub fn dockhand_dir_path(root: &Path) -> PathBuf {
    root.join(DOCKHAND_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    dockhand_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file paths in the current directory, in lookup order
pub fn local_config_file_paths(current_dir: &Path) -> [PathBuf; 2] {
    [
        current_dir.join(LOCAL_CONFIG_FILE_NAME),
        dockhand_dir_path(current_dir).join(CONFIG_FILE_NAME),
    ]
}
