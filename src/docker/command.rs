//! Docker command line construction.
//!
//! Every structured value (names, images, env entries, mounts, ports, params)
//! is passed through the caller's [`ExpansionContext`] and then shell-escaped
//! before it lands on the command line. Multi-valued flags come from ordered
//! maps, so identical requests always render identical command strings.

use super::types::ExpansionContext;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Escaped on render
    Value(String),
    /// Shell fragment appended verbatim
    Raw(String),
}

/// Builder for one docker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerCommand {
    program: String,
    tokens: Vec<Token>,
}

impl DockerCommand {
    /// Start a command for `program` (usually `docker`) and a subcommand.
    pub fn new(program: impl Into<String>, subcommand: &str) -> Self {
        Self {
            program: program.into(),
            tokens: vec![Token::Value(subcommand.to_string())],
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.tokens.push(Token::Value(value.into()));
        self
    }

    /// Append a flag followed by its value.
    pub fn option(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Append a shell fragment without escaping; empty fragments are skipped.
    ///
    /// Used for exec command lines that legitimately carry pipes and redirects.
    pub fn raw(mut self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        if !fragment.trim().is_empty() {
            self.tokens.push(Token::Raw(fragment));
        }
        self
    }

    /// `-e KEY=VAL` for each entry, values expanded.
    pub fn env_vars(self, env: &BTreeMap<String, String>, ctx: &ExpansionContext) -> Self {
        env.iter().fold(self, |command, (key, value)| {
            command.option("-e", format!("{}={}", key, ctx.expand(value)))
        })
    }

    /// `-v HOST:CONTAINER` for each mount.
    pub fn mounts(self, mounts: &BTreeMap<String, String>, ctx: &ExpansionContext) -> Self {
        self.pairs("-v", mounts, ctx)
    }

    /// `-p HOST:CONTAINER` for each port mapping.
    pub fn ports(self, ports: &BTreeMap<String, String>, ctx: &ExpansionContext) -> Self {
        self.pairs("-p", ports, ctx)
    }

    /// `-w DIR` when a working directory is given.
    pub fn workdir(self, workdir: Option<&str>, ctx: &ExpansionContext) -> Self {
        match workdir.map(str::trim).filter(|dir| !dir.is_empty()) {
            Some(dir) => self.option("-w", ctx.expand(dir)),
            None => self,
        }
    }

    /// Trailing `key value` arguments; an empty value emits the key alone.
    pub fn params(self, params: &BTreeMap<String, String>, ctx: &ExpansionContext) -> Self {
        params.iter().fold(self, |command, (key, value)| {
            let command = command.arg(ctx.expand(key));
            if value.is_empty() {
                command
            } else {
                command.arg(ctx.expand(value))
            }
        })
    }

    fn pairs(self, flag: &str, entries: &BTreeMap<String, String>, ctx: &ExpansionContext) -> Self {
        entries.iter().fold(self, |command, (host, container)| {
            command.option(flag, format!("{}:{}", ctx.expand(host), ctx.expand(container)))
        })
    }

    /// Render the command line.
    pub fn render(&self) -> String {
        let mut line = self.program.clone();
        for token in &self.tokens {
            line.push(' ');
            match token {
                Token::Value(value) => {
                    line.push_str(&shell_escape::unix::escape(Cow::Borrowed(value.as_str())))
                }
                Token::Raw(fragment) => line.push_str(fragment.trim()),
            }
        }
        line
    }
}

impl fmt::Display for DockerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
