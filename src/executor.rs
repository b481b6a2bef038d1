// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Deletion pipeline.
//!
//! The loop never short-circuits: a half-finished cleanup leaves the disk
//! in a worse state than a completed one, so per-entry failures are
//! recorded and the walk continues. Cancellation is handled one level up
//! and only silences progress emission; it does not interrupt removal.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::report::{CategoryResult, CleanupResult};
use crate::safety::Safety;

/// Per-entry progress, emitted in order: one `category_start` per
/// category, then one `entry_progress` per entry. `current` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CleanupEvent {
    CategoryStart {
        category: String,
        current: usize,
        total: usize,
    },
    EntryProgress {
        category: String,
        entry_path: String,
        current: usize,
        total: usize,
    },
}

/// Delete every entry of every category, re-validating each path against
/// the safety kernel immediately before removal.
///
/// Per-entry procedure: pseudo-paths are skipped (counted as failures),
/// blocked paths are skipped (counted as failures), a path that is already
/// gone counts as removed, and any other removal error is recorded
/// verbatim. `removed + failed` always equals the number of entries seen.
pub(crate) fn run_cleanup(
    categories: &[CategoryResult],
    safety: &Safety,
    mut emit: impl FnMut(CleanupEvent),
) -> CleanupResult {
    let mut outcome = CleanupResult::default();
    let total_categories = categories.len();

    for (category_index, category) in categories.iter().enumerate() {
        emit(CleanupEvent::CategoryStart {
            category: category.category.clone(),
            current: category_index + 1,
            total: total_categories,
        });

        let total_entries = category.entries.len();
        for (entry_index, entry) in category.entries.iter().enumerate() {
            emit(CleanupEvent::EntryProgress {
                category: category.category.clone(),
                entry_path: entry.path.clone(),
                current: entry_index + 1,
                total: total_entries,
            });

            if entry.is_pseudo_path() {
                outcome
                    .errors
                    .push(format!("skip non-filesystem path: {}", entry.path));
                outcome.failed += 1;
                continue;
            }

            let path = Path::new(&entry.path);

            // mandatory re-check: the filesystem may have changed since the
            // scan (a symlink swapped in, a mount appeared)
            if let Some(reason) = safety.is_blocked(path) {
                outcome.errors.push(
                    Error::PathBlocked {
                        path: entry.path.clone(),
                        reason,
                    }
                    .to_string(),
                );
                outcome.failed += 1;
                continue;
            }

            match remove_entry(path) {
                Ok(()) => {
                    debug!(path = %entry.path, size = entry.size, "removed");
                    outcome.removed += 1;
                    outcome.bytes_freed += entry.size;
                }
                Err(err) => {
                    outcome.errors.push(format!("{}: {err}", entry.path));
                    outcome.failed += 1;
                }
            }
        }
    }

    outcome
}

/// Remove a single path recursively. A path that no longer exists counts
/// as success; a background process may have beaten us to it. Symlinks
/// are unlinked, never followed.
fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
        Ok(meta) if meta.is_dir() => remove_dir_all::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
    }
}
