//! State records and shared value types.
//!
//! Records are built fresh from every parse of CLI output and never cached
//! between calls.

use super::{DockerError, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable pattern is a valid regex")
});

/// Image discovered in `docker images` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub repository: String,
    pub tag: String,
    pub image_id: String,
    /// Size normalised to bytes from the `<number><KB|MB>` column
    pub size_bytes: u64,
}

impl ImageInfo {
    /// `repository:tag` reference of this image.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Whether a listed container process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Up,
    Down,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Container discovered in `docker ps` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub container_id: String,
    pub image: String,
    pub command: String,
    pub status: ContainerStatus,
    pub port: String,
    /// Comma-joined alias list as reported by the CLI
    pub names: String,
}

impl ContainerInfo {
    /// First alias of [`ContainerInfo::names`], the canonical container identity.
    pub fn primary_name(&self) -> &str {
        self.names.split(',').next().unwrap_or_default().trim()
    }

    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Up
    }
}

/// Host, credential and optional container name an action applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Transport URL, e.g. `ssh://127.0.0.1:22/` or `local://`
    #[serde(default)]
    pub url: String,
    /// Credential reference resolved by the gateway
    #[serde(default)]
    pub credential: String,
    /// Container name for start/stop/remove/exec actions
    #[serde(default)]
    pub name: String,
}

impl Target {
    pub fn new(url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: credential.into(),
            name: String::new(),
        }
    }

    /// Copy of this target re-pointed at another container.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Container name, or a validation error when it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Validation`] if the name is blank.
    pub fn require_name(&self) -> Result<&str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DockerError::Validation(format!(
                "target name was empty for {}",
                self.url
            )));
        }
        Ok(name)
    }
}

/// Ordered directories prepended to the remote executable search path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchPath(Vec<String>);

impl SearchPath {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut search_path = Self::default();
        for path in paths {
            search_path.push(path);
        }
        search_path
    }

    /// Append a directory; entries spanning lines and duplicates are ignored.
    pub fn push(&mut self, path: impl Into<String>) {
        let path = path.into();
        if path.is_empty() || path.contains('\n') || self.0.contains(&path) {
            return;
        }
        self.0.push(path);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Entries joined for use as a `PATH` value.
    pub fn env_value(&self) -> String {
        self.0.join(":")
    }

    /// `PATH` value with these entries ahead of `existing`.
    pub fn prepend_to(&self, existing: &str) -> String {
        match (self.is_empty(), existing.is_empty()) {
            (true, _) => existing.to_string(),
            (false, true) => self.env_value(),
            (false, false) => format!("{}:{}", self.env_value(), existing),
        }
    }
}

/// Caller-supplied variables substituted into every value placed on a command line.
///
/// `$name` and `${name}` are replaced; unknown references are left verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionContext {
    variables: BTreeMap<String, String>,
}

impl ExpansionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn expand(&self, text: &str) -> String {
        if self.variables.is_empty() || !text.contains('$') {
            return text.to_string();
        }
        VARIABLE_PATTERN
            .replace_all(text, |caps: &Captures<'_>| {
                let key = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                match self.variables.get(key) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_name_takes_first_alias() {
        let info = ContainerInfo {
            container_id: "b5bcc949f075".to_string(),
            image: "mysql:5.6".to_string(),
            command: "docker-entrypoint...".to_string(),
            status: ContainerStatus::Up,
            port: "0.0.0.0:3306->3306/tcp".to_string(),
            names: "db1,web/db".to_string(),
        };
        assert_eq!(info.primary_name(), "db1");
        assert!(info.is_running());
    }

    #[test]
    fn test_container_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ContainerStatus::Up).unwrap(), "\"up\"");
        assert_eq!(ContainerStatus::Down.to_string(), "down");
    }

    #[test]
    fn test_target_requires_name() {
        let target = Target::new("ssh://127.0.0.1:22/", "localhost.json");
        assert!(matches!(
            target.require_name(),
            Err(DockerError::Validation(_))
        ));

        let named = target.with_name("db1");
        assert_eq!(named.require_name().unwrap(), "db1");
        assert_eq!(named.url, target.url);
    }

    #[test]
    fn test_search_path_push_skips_duplicates_and_multiline() {
        let mut path = SearchPath::new(["/usr/local/bin"]);
        path.push("/usr/local/bin");
        path.push("/opt/bin\n/evil");
        path.push("/opt/docker/bin");

        assert_eq!(path.entries(), ["/usr/local/bin", "/opt/docker/bin"]);
        assert_eq!(path.env_value(), "/usr/local/bin:/opt/docker/bin");
        assert_eq!(
            path.prepend_to("/usr/bin"),
            "/usr/local/bin:/opt/docker/bin:/usr/bin"
        );
        assert_eq!(SearchPath::default().prepend_to("/usr/bin"), "/usr/bin");
    }

    #[test]
    fn test_expansion_context() {
        let ctx = ExpansionContext::new()
            .with_var("home", "/home/dev")
            .with_var("port", "3306");

        assert_eq!(ctx.expand("${home}/my.cnf"), "/home/dev/my.cnf");
        assert_eq!(ctx.expand("$port:$port"), "3306:3306");
        assert_eq!(ctx.expand("$unknown/x"), "$unknown/x");
        assert_eq!(ctx.expand("**mysql**"), "**mysql**");
    }
}
