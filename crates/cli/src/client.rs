// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket client for the daemon protocol.

use anyhow::Context;
use choo_wire::{read_frame, write_frame, Method, Request, Response};
use tokio::io::BufReader;
use tokio::net::UnixStream;

pub struct DaemonClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    next_id: u64,
}

impl DaemonClient {
    pub async fn connect(socket_path: &std::path::Path) -> anyhow::Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("daemon not reachable at {}", socket_path.display()))?;
        let (read, writer) = stream.into_split();
        Ok(Self { reader: BufReader::new(read), writer, next_id: 0 })
    }

    /// Send one request and read one response.
    pub async fn call(&mut self, method: Method) -> anyhow::Result<Response> {
        self.next_id += 1;
        write_frame(&mut self.writer, &Request { id: self.next_id, method }).await?;
        Ok(read_frame(&mut self.reader).await?)
    }

    /// Read the next streamed response (watch mode).
    pub async fn next_response(&mut self) -> anyhow::Result<Response> {
        Ok(read_frame(&mut self.reader).await?)
    }
}
