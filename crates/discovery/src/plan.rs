// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit plan file (`IMPLEMENTATION_PLAN.md`) parsing.

use crate::frontmatter::{Document, FrontMatterError};
use chrono::{DateTime, Utc};
use choo_core::UnitStatus;
use std::path::Path;

pub const PLAN_FILENAME: &str = "IMPLEMENTATION_PLAN.md";

/// Front-matter keys owned by the unit author.
pub const KEY_UNIT: &str = "unit";
pub const KEY_DEPENDS_ON: &str = "depends_on";
pub const KEY_PROVIDER: &str = "provider";

/// Front-matter keys owned by the orchestrator.
pub const KEY_ORCH_STATUS: &str = "orch_status";
pub const KEY_ORCH_BRANCH: &str = "orch_branch";
pub const KEY_ORCH_PR_NUMBER: &str = "orch_pr_number";
pub const KEY_ORCH_STARTED_AT: &str = "orch_started_at";
pub const KEY_ORCH_COMPLETED_AT: &str = "orch_completed_at";

/// Parsed plan: typed projection over the retained document.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub doc: Document,
    /// `unit` key; discovery checks it against the directory name.
    pub unit: Option<String>,
    pub depends_on: Vec<String>,
    pub provider: Option<String>,
    /// Explicit status override (`orch_status`).
    pub status_override: Option<UnitStatus>,
    pub branch: Option<String>,
    pub pr_number: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlanFile {
    pub fn parse(content: &str) -> Result<Self, FrontMatterError> {
        let doc = Document::parse(content)?;

        let status_override =
            doc.get_str(KEY_ORCH_STATUS).and_then(|s| s.parse::<UnitStatus>().ok());

        Ok(Self {
            unit: doc.get_str(KEY_UNIT).map(str::to_string),
            depends_on: doc.get_str_list(KEY_DEPENDS_ON),
            provider: doc.get_str(KEY_PROVIDER).map(str::to_string),
            status_override,
            branch: doc.get_str(KEY_ORCH_BRANCH).map(str::to_string),
            pr_number: doc.get_u64(KEY_ORCH_PR_NUMBER),
            started_at: parse_time(&doc, KEY_ORCH_STARTED_AT),
            completed_at: parse_time(&doc, KEY_ORCH_COMPLETED_AT),
            doc,
        })
    }

    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

fn parse_time(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get_str(key)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
