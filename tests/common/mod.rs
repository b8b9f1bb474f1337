//! Recorded docker output shared by the integration tests.

#![allow(dead_code)]

use dockhand::docker::{DockerCommand, Target};

pub const IMAGES: &str = "REPOSITORY          TAG                 IMAGE ID            CREATED             SIZE\n\
mysql               5.6                 96dc914914f5        2 weeks ago         299MB\n\
mysql               5.7                 5709795eeffa        2 weeks ago         408 MB\n\
redis               4                   1a8a9ebe9d1f        3 weeks ago         307739KB\n\
\n";

pub const IMAGES_DUPLICATED: &str = "REPOSITORY          TAG                 IMAGE ID            CREATED             SIZE\n\
mysql               5.6                 96dc914914f5        2 weeks ago         299MB\n\
mysql               5.6                 a1b2c3d4e5f6        5 weeks ago         301MB\n";

pub const PS_EMPTY: &str = "CONTAINER ID        IMAGE               COMMAND                  CREATED             STATUS              PORTS                    NAMES\n";

pub const PS_DB1_UP: &str = "CONTAINER ID        IMAGE               COMMAND                  CREATED             STATUS              PORTS                    NAMES\r\n\
b5bcc949f075        mysql:5.6           \"docker-entrypoint...\"   About an hour ago   Up About an hour    0.0.0.0:3306->3306/tcp   db1\r\n";

pub const PS_DB1_DOWN: &str = "CONTAINER ID        IMAGE               COMMAND                  CREATED             STATUS              PORTS                    NAMES\n\
b5bcc949f075        mysql:5.6           \"docker-entrypoint...\"   About an hour ago   Exited (0) 3 minutes ago                     db1\n";

pub const PS_MIXED: &str = "CONTAINER ID        IMAGE               COMMAND                  CREATED             STATUS              PORTS                    NAMES\n\
b5bcc949f075        mysql:5.6           \"docker-entrypoint...\"   About an hour ago   Up About an hour    0.0.0.0:3306->3306/tcp   db1\n\
7d1c2a2b3c4d        redis:4             \"docker-entrypoint...\"   2 hours ago         Up 2 hours          0.0.0.0:6379->6379/tcp   cache\n";

pub const NAME_CONFLICT: &str = "docker: Error response from daemon: Conflict. The container name \"/db1\" is already in use by container \"b5bcc949f075\". You have to remove (or rename) that container to be able to reuse that name.\nSee 'docker run --help'.\n";

pub fn local() -> Target {
    Target::new("local://", "")
}

pub fn db1() -> Target {
    local().with_name("db1")
}

/// Rendered `docker <subcommand> <args..>` line as the orchestrator issues it.
pub fn docker(subcommand: &str, args: &[&str]) -> String {
    args.iter()
        .fold(DockerCommand::new("docker", subcommand), |command, arg| command.arg(*arg))
        .render()
}

/// Index of the first occurrence of `command` in `commands`.
pub fn position(commands: &[String], command: &str) -> usize {
    commands
        .iter()
        .position(|issued| issued == command)
        .unwrap_or_else(|| panic!("{command:?} was not issued: {commands:#?}"))
}
