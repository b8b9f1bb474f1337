//! Parsing of the columnar text printed by `docker ps` and `docker images`.
//!
//! Both listings are whitespace aligned with a single header row. Parsing is
//! pure: identical input always yields identical records.

use super::types::{ContainerInfo, ContainerStatus, ImageInfo};
use crate::env::markers;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Minimum column count of a `docker ps` data row.
pub const MIN_PROCESS_COLUMNS: usize = 7;

/// Minimum column count of a `docker images` data row.
pub const MIN_IMAGE_COLUMNS: usize = 4;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

static TERMINAL_ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|[\x00-\x08\x0b-\x1f\x7f]")
        .expect("terminal escape pattern is a valid regex")
});

/// Split one listing line into its columns.
///
/// Returns `None` for blank lines and header rows. A column opened by a double
/// quote runs until the token that closes it and is returned trimmed, without
/// the quotes.
pub fn extract_columns(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() || is_header(line) {
        return None;
    }

    let mut columns = Vec::new();
    let mut quoted: Option<Vec<&str>> = None;

    for token in line.split_whitespace() {
        match quoted.as_mut() {
            Some(parts) => {
                parts.push(token);
                if token.ends_with('"') {
                    columns.push(unquote(&parts.join(" ")));
                    quoted = None;
                }
            }
            None if token.starts_with('"') && (token.len() == 1 || !token.ends_with('"')) => {
                quoted = Some(vec![token]);
            }
            None if token.starts_with('"') => columns.push(unquote(token)),
            None => columns.push(token.to_string()),
        }
    }
    if let Some(parts) = quoted {
        columns.push(unquote(&parts.join(" ")));
    }

    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}

fn is_header(line: &str) -> bool {
    line.starts_with(markers::IMAGES_HEADER) || line.starts_with(markers::PROCESS_HEADER)
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').trim().to_string()
}

/// Convert a `<number><unit>` size into bytes.
///
/// Units are `KB`, `MB` and `GB` (binary factors); a bare number is read as
/// kilobytes. Non-integral values are not supported and yield zero.
pub fn parse_size(size: &str) -> u64 {
    let size = size.trim();
    let upper = size.to_ascii_uppercase();
    let (number, factor) = if let Some(number) = upper.strip_suffix("GB") {
        (number, GB)
    } else if let Some(number) = upper.strip_suffix("MB") {
        (number, MB)
    } else if let Some(number) = upper.strip_suffix("KB") {
        (number, KB)
    } else if let Some(number) = upper.strip_suffix('B') {
        (number, 1)
    } else {
        (upper.as_str(), KB)
    };

    match number.trim().parse::<u64>() {
        Ok(value) => value.saturating_mul(factor),
        Err(_) => {
            debug!("Unsupported image size {:?}, treating as 0", size);
            0
        }
    }
}

/// Parse every data row of a `docker images` listing, in order.
pub fn parse_images(stdout: &str) -> Vec<ImageInfo> {
    stdout
        .lines()
        .filter_map(extract_columns)
        .filter(|columns| columns.len() >= MIN_IMAGE_COLUMNS)
        .map(|columns| {
            // Size is the trailing column, possibly split from its unit.
            let size: String = columns[columns.len() - 2..]
                .iter()
                .filter(|column| !column.contains("ago"))
                .map(String::as_str)
                .collect();
            ImageInfo {
                repository: columns[0].clone(),
                tag: columns[1].clone(),
                image_id: columns[2].clone(),
                size_bytes: parse_size(&size),
            }
        })
        .collect()
}

/// Parse every data row of a `docker ps` listing, in order.
pub fn parse_containers(stdout: &str) -> Vec<ContainerInfo> {
    stdout
        .lines()
        .filter_map(|line| extract_columns(line).map(|columns| (line, columns)))
        .filter(|(_, columns)| columns.len() >= MIN_PROCESS_COLUMNS)
        .map(|(line, columns)| {
            let status = if line.contains(markers::RUNNING) {
                ContainerStatus::Up
            } else {
                ContainerStatus::Down
            };
            let port = &columns[columns.len() - 2];
            ContainerInfo {
                container_id: columns[0].clone(),
                image: columns[1].clone(),
                command: columns[2].clone(),
                status,
                port: if looks_like_port(port) {
                    port.clone()
                } else {
                    String::new()
                },
                names: columns[columns.len() - 1].clone(),
            }
        })
        .collect()
}

// A stopped container has no ports column, leaving "ago" in its place.
fn looks_like_port(column: &str) -> bool {
    column.contains("->")
        || column.ends_with("/tcp")
        || column.ends_with("/udp")
        || column.ends_with("/sctp")
}

/// Remove terminal control sequences from captured output.
pub fn strip_terminal_escapes(text: &str) -> String {
    TERMINAL_ESCAPES.replace_all(text, "").into_owned()
}
