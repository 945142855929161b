// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! choo-discovery: unit directory parsing and writeback.
//!
//! A tasks directory contains one subdirectory per unit. Each unit holds
//! an `IMPLEMENTATION_PLAN.md` (unit front matter + plan body) and task
//! files named `NN-<slug>.md`. Front matter is YAML between `---` lines;
//! unknown keys are preserved on every write.

pub mod archive;
pub mod discover;
pub mod frontmatter;
pub mod plan;
pub mod task;
pub mod writeback;

pub use archive::{archive_unit, reset_state, ArchiveError};
pub use discover::{discover, DiscoveryError};
pub use frontmatter::{Document, FrontMatterError};
pub use plan::{PlanFile, PLAN_FILENAME};
pub use task::TaskFile;
pub use writeback::{
    record_completed, record_pr_number, record_started, record_status, set_plan_keys,
    set_task_status, update_document, WritebackError,
};
