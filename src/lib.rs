// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Home-scoped disk reclamation.
//!
//! The crate is organised around three pieces of hard machinery:
//!
//! * the **safety kernel** ([`safety::Safety`]), a path-admission oracle
//!   consulted immediately before every deletion;
//! * the **engine** ([`engine::Engine`]), which drives registered category
//!   scanners, streams progress, and binds each scan's results to a
//!   single-use token that the follow-up cleanup must present;
//! * the **IPC server** ([`server::Server`]), a single-connection
//!   line-delimited-JSON endpoint on a local Unix socket for
//!   out-of-process front-ends.
//!
//! Everything that decides whether a path may be deleted is compiled in;
//! no configuration can relax it.

#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod risk;
pub mod safety;
pub mod scan;
pub mod scanners;
pub mod server;
pub mod token;
pub mod walkthrough;

pub use engine::{CleanupEvent, CleanupOutcome, Engine, ScanEvent, ScanOutcome};
pub use error::Error;
pub use registry::{help_manifest, Registry, ScannerInfo};
pub use report::{CategoryResult, CleanupResult, PermissionIssue, ScanEntry, ScanSummary};
pub use risk::{risk_for, RiskLevel};
pub use safety::Safety;
pub use server::{Server, ServerConfig};
