// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Named collection of category scanners.
//!
//! A scanner is a metadata-plus-function value, not a trait hierarchy. The
//! contract of the function: discover candidates, never delete anything,
//! return an empty list (not an error) when the target environment is
//! absent, and keep any subprocess bounded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::report::CategoryResult;
use crate::risk::{risk_for, RiskLevel};

/// The callable half of a scanner.
pub type ScannerFn = Arc<dyn Fn() -> Result<Vec<CategoryResult>, Error> + Send + Sync>;

/// Registry metadata for one scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInfo {
    /// Unique, stable id; doubles as the category filter key for scanners
    /// that emit a single category.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScannerInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.map(str::to_string),
        }
    }
}

/// Metadata and function bundled together.
pub struct Scanner {
    pub info: ScannerInfo,
    run: ScannerFn,
}

impl Scanner {
    pub(crate) fn handle(&self) -> ScannerFn {
        Arc::clone(&self.run)
    }
}

/// Insertion-ordered scanner collection. Instantiated explicitly and passed
/// to the engine; there is no process-global catalogue.
#[derive(Default)]
pub struct Registry {
    scanners: Vec<Scanner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scanner. Idempotent by id: registering an id twice
    /// replaces the earlier function in place, keeping its position.
    pub fn register<F>(&mut self, info: ScannerInfo, run: F)
    where
        F: Fn() -> Result<Vec<CategoryResult>, Error> + Send + Sync + 'static,
    {
        let scanner = Scanner {
            info,
            run: Arc::new(run),
        };
        if let Some(existing) = self
            .scanners
            .iter_mut()
            .find(|s| s.info.id == scanner.info.id)
        {
            *existing = scanner;
        } else {
            self.scanners.push(scanner);
        }
    }

    /// Scanner metadata in registration order.
    pub fn categories(&self) -> Vec<ScannerInfo> {
        self.scanners.iter().map(|s| s.info.clone()).collect()
    }

    /// Run a single scanner synchronously.
    pub fn run(&self, scanner_id: &str) -> Result<Vec<CategoryResult>, Error> {
        let scanner = self
            .scanners
            .iter()
            .find(|s| s.info.id == scanner_id)
            .ok_or_else(|| Error::Scan {
                scanner: scanner_id.to_string(),
                source: Box::new(Error::Protocol(format!(
                    "no scanner registered under id '{scanner_id}'"
                ))),
            })?;
        (scanner.run)().map_err(|err| Error::Scan {
            scanner: scanner_id.to_string(),
            source: Box::new(err),
        })
    }

    pub(crate) fn scanners(&self) -> &[Scanner] {
        &self.scanners
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }
}

/// One row of the structured-help manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub risk_level: RiskLevel,
}

/// Side-effect-free manifest of scanners, categories and risk levels for
/// front-ends that render their own help.
pub fn help_manifest(registry: &Registry) -> Vec<ManifestEntry> {
    registry
        .scanners()
        .iter()
        .map(|s| ManifestEntry {
            id: s.info.id.clone(),
            name: s.info.name.clone(),
            description: s.info.description.clone(),
            risk_level: risk_for(&s.info.id),
        })
        .collect()
}
