// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! choo-wire: IPC protocol for daemon communication.
//!
//! Wire format: one JSON object per line (`\n`-delimited).

mod framing;
mod request;
mod response;

pub use framing::{read_frame, read_frame_timeout, write_frame, ProtocolError};
pub use request::{
    ListJobsParams, Method, Request, ShutdownParams, StartJobParams, StopJobParams,
    WatchJobParams,
};
pub use response::{JobEntry, JobStatus, Response, ResponseBody};
