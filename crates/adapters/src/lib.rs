// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! choo-adapters: external collaborators behind narrow traits.
//!
//! Code generation (`Provider`), advisory review (`Reviewer`), the local
//! VCS (`Git`), and the hosted PR API (`Forge`) are all external to the
//! orchestration engine. Each gets a trait here plus a concrete
//! implementation that shells out to the corresponding CLI tool, and a
//! fake for tests behind the `test-support` feature.

pub mod forge;
pub mod git;
pub mod provider;
pub mod reviewer;
pub mod subprocess;

pub use forge::{Forge, ForgeError, GhForge, PrRequest, ReviewState};
pub use git::{Git, SystemGit, VcsError, WorktreeInfo};
pub use provider::{CommandProvider, OutputSink, Provider, ProviderError, ProviderType};
pub use reviewer::{PassiveReviewer, ReviewIssue, ReviewResult, Reviewer, ReviewerError, Severity};
pub use subprocess::{run_with_timeout, CommandOutput, SubprocessError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeForge, FakeGit, FakeProvider, FakeReviewer, ProviderCall};
