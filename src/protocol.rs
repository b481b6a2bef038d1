// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Line-delimited JSON request/response codec.
//!
//! One record per line, UTF-8, terminated by a single line feed. Records
//! above [`MAX_RECORD_BYTES`] are rejected without being buffered whole.
//! Unknown fields on either side are ignored, so old clients keep working
//! against newer servers and vice versa.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::Error;

/// Upper bound for a single wire record.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// One client request. `method` is matched at dispatch time so an unknown
/// method can still be answered on the requester's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Terminates a request successfully.
    Result,
    /// Streams during a long operation.
    Progress,
    /// Terminates a request with a failure.
    Error,
}

/// One server response record; `id` echoes the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn result(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: ResponseKind::Result,
            result: Some(result),
            error: None,
        }
    }

    pub fn progress(id: impl Into<String>, event: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: ResponseKind::Progress,
            result: Some(event),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ResponseKind::Error,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Concurrency-safe record writer: progress emitters and the final result
/// may race, so each full record is written under one lock acquisition.
pub struct RecordWriter<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    pub async fn write(&self, response: &Response) -> Result<(), Error> {
        let mut line =
            serde_json::to_vec(response).map_err(|err| Error::Protocol(err.to_string()))?;
        line.push(b'\n');
        let mut writer = self.inner.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Read the next request record.
///
/// `Ok(None)` is a clean end-of-stream. A record above the size cap is
/// drained through its terminating newline and reported as a protocol
/// error, leaving the stream positioned at the next record boundary so the
/// connection keeps serving.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>, Error>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        let read = {
            let mut capped = (&mut *reader).take(MAX_RECORD_BYTES as u64 + 1);
            capped.read_until(b'\n', &mut line).await?
        };

        if read == 0 {
            return Ok(None);
        }

        let terminated = line.last() == Some(&b'\n');
        while line.last() == Some(&b'\n') || line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.len() > MAX_RECORD_BYTES {
            if !terminated {
                drain_line(reader).await?;
            }
            return Err(Error::Protocol(format!(
                "record exceeds {MAX_RECORD_BYTES} bytes"
            )));
        }
        if line.is_empty() {
            // blank line between records; keep reading
            continue;
        }

        return serde_json::from_slice(&line)
            .map(Some)
            .map_err(|err| Error::Protocol(format!("malformed request record: {err}")));
    }
}

/// Consume the remainder of an oversized line, up to and including its
/// newline or end-of-stream.
async fn drain_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), Error> {
    loop {
        let buffered = reader.fill_buf().await?;
        if buffered.is_empty() {
            return Ok(());
        }
        match buffered.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = buffered.len();
                reader.consume(len);
            }
        }
    }
}
