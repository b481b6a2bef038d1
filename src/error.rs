// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use thiserror::Error;

/// All failure classes of the crate.
///
/// Most of these are recovered locally and end up accumulated inside a
/// result structure (a failed deletion becomes one line in
/// `CleanupResult::errors`, a failed scanner becomes a `scanner_error`
/// event). The only variants that abort an operation outright are the
/// token errors, the socket startup errors and `Protocol`.
#[derive(Debug, Error)]
pub enum Error {
    /// The safety kernel refused a path at deletion time.
    #[error("blocked: {path} ({reason})")]
    PathBlocked { path: String, reason: String },

    /// A scanner function returned an error. The scan continues with the
    /// next scanner; this is only ever surfaced through a `scanner_error`
    /// event.
    #[error("scanner '{scanner}' failed: {source}")]
    Scan {
        scanner: String,
        #[source]
        source: Box<Error>,
    },

    /// Cleanup was requested but no scan results are stored.
    #[error("invalid token: no scan results are available")]
    TokenMissing,

    /// Cleanup was requested with a token that does not match the stored
    /// one. The slot is emptied either way, so a retry needs a fresh scan.
    #[error("invalid token: token does not match the most recent scan")]
    TokenMismatch,

    /// The category filter of a cleanup request selected nothing.
    #[error("none of the requested categories match prior scan results")]
    NoMatchingCategories,

    /// Malformed, oversized or otherwise unusable protocol record.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The controlling context was cancelled mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Another live instance already owns the listen socket.
    #[error("another instance is already listening on '{}'", .0.display())]
    AlreadyRunning(PathBuf),

    /// Something that is not a socket sits at the listen path.
    #[error("socket path '{}' exists but is not a socket", .0.display())]
    SocketObstructed(PathBuf),

    #[error("failed to bind socket at '{}': {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The home directory of the invoking user could not be determined.
    #[error("could not determine the user's home directory")]
    NoHomeDir,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code when the error escapes `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AlreadyRunning(_) | Error::SocketObstructed(_) | Error::Bind { .. } => 2,
            _ => 1,
        }
    }
}
