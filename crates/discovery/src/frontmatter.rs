// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML front matter split and round-trip.
//!
//! A document is an optional front-matter block (YAML mapping between two
//! `---` lines at the very top) followed by a markdown body. The mapping
//! is kept whole so keys this tool does not understand survive a
//! read-modify-write cycle.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("unterminated front matter (missing closing ---)")]
    Unterminated,
    #[error("front matter is not a YAML mapping")]
    NotAMapping,
    #[error("malformed front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A parsed markdown document: front-matter mapping plus raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub matter: Mapping,
    /// Everything after the closing `---` line, verbatim.
    pub body: String,
}

impl Document {
    /// Split `content` into front matter and body.
    ///
    /// A document without a leading `---` line has an empty mapping and
    /// the full content as body.
    pub fn parse(content: &str) -> Result<Self, FrontMatterError> {
        let Some(rest) = strip_open_delimiter(content) else {
            return Ok(Self { matter: Mapping::new(), body: content.to_string() });
        };

        let Some((raw_matter, body)) = split_close_delimiter(rest) else {
            return Err(FrontMatterError::Unterminated);
        };

        let matter = if raw_matter.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(raw_matter)? {
                Value::Mapping(mapping) => mapping,
                _ => return Err(FrontMatterError::NotAMapping),
            }
        };

        Ok(Self { matter, body: body.to_string() })
    }

    /// Render back to `---\n<yaml>---\n<body>`, preserving every key.
    pub fn render(&self) -> Result<String, FrontMatterError> {
        if self.matter.is_empty() {
            return Ok(self.body.clone());
        }
        let yaml = serde_yaml::to_string(&Value::Mapping(self.matter.clone()))?;
        Ok(format!("---\n{yaml}---\n{}", self.body))
    }

    /// String value of a front-matter key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.matter.get(key).and_then(Value::as_str)
    }

    /// Unsigned integer value of a front-matter key.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.matter.get(key).and_then(Value::as_u64)
    }

    /// List-of-strings value of a front-matter key. A scalar string is
    /// accepted as a single-element list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.matter.get(key) {
            Some(Value::Sequence(seq)) => {
                seq.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// List-of-integers value of a front-matter key.
    pub fn get_u64_list(&self, key: &str) -> Vec<u64> {
        match self.matter.get(key) {
            Some(Value::Sequence(seq)) => seq.iter().filter_map(Value::as_u64).collect(),
            Some(value) => value.as_u64().into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Set a key, keeping its position when it already exists.
    pub fn set(&mut self, key: &str, value: Value) {
        self.matter.insert(Value::from(key), value);
    }

    /// Set a key to YAML null.
    pub fn set_null(&mut self, key: &str) {
        self.matter.insert(Value::from(key), Value::Null);
    }

    /// First `# ` heading of the body, trimmed.
    pub fn title(&self) -> Option<&str> {
        self.body
            .lines()
            .map(str::trim_start)
            .find(|line| line.starts_with("# "))
            .map(|line| line[2..].trim())
    }
}

fn strip_open_delimiter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix('\r').unwrap_or(rest);
    rest.strip_prefix('\n')
}

/// Find the closing `---` on its own line; returns (matter, body).
fn split_close_delimiter(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if matches!(line.trim_end(), "---") {
            let matter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((matter, body));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
#[path = "frontmatter_tests.rs"]
mod tests;
