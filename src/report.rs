// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Result structures shared between scanners, engine and IPC layer.
//!
//! These serialize 1:1 into the wire shapes of the IPC protocol, so field
//! names here are contract, not implementation detail.

use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// One cleanup candidate.
///
/// `path` is an absolute, lexically normalised filesystem path, except for
/// pseudo-paths, which name an external resource the executor delegates to
/// instead of removing (recognisable by the `:` that can never occur in an
/// absolute local path, e.g. `docker:build-cache`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub path: String,
    pub description: String,
    pub size: u64,
    pub risk_level: RiskLevel,
}

impl ScanEntry {
    pub fn new(path: impl Into<String>, description: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            size,
            // risk is stamped per-category by the engine before results
            // leave the scan
            risk_level: RiskLevel::Risky,
        }
    }

    /// Pseudo-paths name external resources; filesystem operations skip them.
    pub fn is_pseudo_path(&self) -> bool {
        self.path.contains(':')
    }
}

/// A path a scanner could not read. Never a cleanup candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionIssue {
    pub path: String,
    pub description: String,
}

impl PermissionIssue {
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
        }
    }
}

/// The output of one scanner call: entries of a single semantic kind.
///
/// `total_size` always equals the sum of the entry sizes; mutation goes
/// through [`CategoryResult::push_entry`] to keep that true at every
/// observable point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: String,
    pub description: String,
    pub entries: Vec<ScanEntry>,
    pub total_size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_issues: Vec<PermissionIssue>,
}

impl CategoryResult {
    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            entries: Vec::new(),
            total_size: 0,
            permission_issues: Vec::new(),
        }
    }

    pub fn push_entry(&mut self, entry: ScanEntry) {
        self.total_size += entry.size;
        self.entries.push(entry);
    }

    pub fn push_issue(&mut self, issue: PermissionIssue) {
        self.permission_issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.permission_issues.is_empty()
    }
}

/// Scan-wide envelope handed to the token store and to front-ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub categories: Vec<CategoryResult>,
    pub total_size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_issues: Vec<PermissionIssue>,
}

impl ScanSummary {
    /// Build the envelope: category order is preserved, the total is the
    /// sum of category totals and the permission issues are the flat union
    /// across all categories.
    pub fn from_categories(categories: Vec<CategoryResult>) -> Self {
        let total_size = categories.iter().map(|c| c.total_size).sum();
        let permission_issues = categories
            .iter()
            .flat_map(|c| c.permission_issues.iter().cloned())
            .collect();
        Self {
            categories,
            total_size,
            permission_issues,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.categories.iter().map(|c| c.entries.len()).sum()
    }
}

/// Aggregate outcome of one cleanup run.
///
/// Per-entry failures accumulate here instead of aborting the run, so
/// `removed + failed` always equals the number of entries attempted and
/// `errors` holds one line per failure in attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    pub removed: u64,
    pub failed: u64,
    pub bytes_freed: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
