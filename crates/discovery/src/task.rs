// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task file (`NN-<slug>.md`) parsing.

use crate::frontmatter::{Document, FrontMatterError};
use choo_core::{Task, TaskStatus};
use std::path::Path;

pub const KEY_TASK: &str = "task";
pub const KEY_STATUS: &str = "status";
pub const KEY_BACKPRESSURE: &str = "backpressure";
pub const KEY_DEPENDS_ON: &str = "depends_on";

/// Parsed task file: typed projection over the retained document.
#[derive(Debug, Clone)]
pub struct TaskFile {
    pub doc: Document,
    pub task: Task,
}

impl TaskFile {
    /// Parse a task file. `file_name` supplies the number prefix.
    pub fn parse(file_name: &str, content: &str) -> Result<Self, FrontMatterError> {
        let doc = Document::parse(content)?;

        let number = match number_from_filename(file_name) {
            Some(n) => n,
            // The front-matter `task` key is authoritative only when the
            // filename prefix is absent; discovery filters on the prefix
            // so this is a fallback for direct callers.
            None => doc.get_u64(KEY_TASK).unwrap_or(0) as u32,
        };

        let status = doc
            .get_str(KEY_STATUS)
            .and_then(|s| s.parse::<TaskStatus>().ok())
            .unwrap_or_default();

        let title = doc.title().unwrap_or(file_name).to_string();

        let task = Task {
            number,
            title,
            status,
            backpressure: doc.get_str(KEY_BACKPRESSURE).map(str::to_string),
            depends_on: doc.get_u64_list(KEY_DEPENDS_ON).into_iter().map(|n| n as u32).collect(),
            file_path: file_name.into(),
            body: doc.body.clone(),
        };

        Ok(Self { doc, task })
    }

    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&file_name, &content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

/// `07-wire-codec.md` → 7. Requires exactly the two-digit-dash shape.
pub fn number_from_filename(name: &str) -> Option<u32> {
    let bytes = name.as_bytes();
    if bytes.len() < 3 || !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() || bytes[2] != b'-'
    {
        return None;
    }
    name[..2].parse().ok()
}

/// True for names discovery should treat as task files.
pub fn is_task_filename(name: &str) -> bool {
    name.ends_with(".md") && number_from_filename(name).is_some()
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
