// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI help output specs
//!
//! Verify usage, version, and exit codes for the command surface.

use crate::prelude::*;

#[test]
fn choo_help_shows_usage() {
    cli().args(&["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn choo_daemon_help_shows_subcommands() {
    cli()
        .args(&["daemon", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("stop")
        .stdout_has("status");
}

#[test]
fn choo_version_prints_and_exits_zero() {
    cli().args(&["version"]).passes().stdout_has("choo ");
}

#[test]
fn unknown_flag_is_usage_error() {
    // clap reports invalid usage with exit code 2.
    cli().args(&["--definitely-not-a-flag"]).fails_with(2);
}
