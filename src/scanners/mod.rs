// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default category scanners.
//!
//! Each module is a small straight-line function fulfilling the scanner
//! contract: discover candidates, never delete, return an empty list when
//! the target environment is absent, keep subprocesses bounded. Every
//! scanner derives its own target paths; the engine never hands them a
//! home directory.

pub mod browser_data;
pub mod container;
pub mod dev_tools;
pub mod downloads;
pub mod temp_files;
pub mod trash;
pub mod user_caches;
pub mod user_logs;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::registry::{Registry, ScannerInfo};
use crate::report::CategoryResult;
use crate::scan::dir_size;

/// Upper bound for any subprocess a scanner spawns.
pub(crate) const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire up the stock scanners. A helper, not an init hook: callers that
/// want a different set build their own registry.
pub fn register_defaults(registry: &mut Registry) {
    registry.register(
        ScannerInfo::new(
            "user-caches",
            "User caches",
            Some("Application caches under ~/Library/Caches"),
        ),
        user_caches::run,
    );
    registry.register(
        ScannerInfo::new(
            "user-logs",
            "User logs",
            Some("Log files under ~/Library/Logs"),
        ),
        user_logs::run,
    );
    registry.register(
        ScannerInfo::new(
            "browser-data",
            "Browser residue",
            Some("Cache directories of installed browsers"),
        ),
        browser_data::run,
    );
    registry.register(
        ScannerInfo::new(
            "dev-tools",
            "Developer tool caches",
            Some("npm, Xcode and CocoaPods caches"),
        ),
        dev_tools::run,
    );
    registry.register(
        ScannerInfo::new(
            "old-downloads",
            "Old downloads",
            Some("Items in ~/Downloads untouched for 90 days"),
        ),
        downloads::run,
    );
    registry.register(
        ScannerInfo::new("trash", "Trash", Some("The user's trash bin")),
        trash::run,
    );
    registry.register(
        ScannerInfo::new(
            "temp-files",
            "Temporary files",
            Some("The per-user temporary directory"),
        ),
        temp_files::run,
    );
    registry.register(
        ScannerInfo::new(
            "container-runtime",
            "Container runtime",
            Some("Space a container runtime reports as reclaimable"),
        ),
        container::run,
    );
}

/// Home directory of the invoking user, if it can be determined. Scanners
/// degrade to empty results when it cannot.
pub(crate) fn home() -> Option<PathBuf> {
    dirs_next::home_dir()
}

/// Add `path` as a single whole-directory entry if it exists, sizing it
/// recursively and carrying walk failures over as permission issues.
pub(crate) fn push_dir_entry(category: &mut CategoryResult, path: &Path, description: &str) {
    if !path.exists() {
        return;
    }
    let (size, issues) = dir_size(path);
    category.push_entry(crate::report::ScanEntry::new(
        crate::safety::normalize_lexically(path).display().to_string(),
        description,
        size,
    ));
    for issue in issues {
        category.push_issue(issue);
    }
}

/// Keep only categories that actually found something.
pub(crate) fn non_empty(categories: Vec<CategoryResult>) -> Vec<CategoryResult> {
    categories.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Run a command with a hard deadline. `Ok(None)` means the command timed
/// out (it is killed) or exited unsuccessfully; `Err` means it could not
/// be spawned at all, which callers treat as "tool not installed".
pub(crate) fn run_bounded(command: &mut Command, limit: Duration) -> std::io::Result<Option<String>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    let mut child = command.spawn()?;
    let started = Instant::now();

    loop {
        match child.try_wait()? {
            Some(status) => {
                if !status.success() {
                    return Ok(None);
                }
                let mut stdout = String::new();
                if let Some(mut pipe) = child.stdout.take() {
                    pipe.read_to_string(&mut stdout)?;
                }
                return Ok(Some(stdout));
            }
            None if started.elapsed() >= limit => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_in_a_stable_order() {
        let mut registry = Registry::new();
        register_defaults(&mut registry);
        let ids: Vec<_> = registry.categories().into_iter().map(|i| i.id).collect();
        assert_eq!(
            ids,
            vec![
                "user-caches",
                "user-logs",
                "browser-data",
                "dev-tools",
                "old-downloads",
                "trash",
                "temp-files",
                "container-runtime",
            ]
        );
        // registering twice replaces, never duplicates
        register_defaults(&mut registry);
        assert_eq!(registry.categories().len(), 8);
    }

    #[test]
    fn run_bounded_captures_output() {
        let out = run_bounded(Command::new("echo").arg("hello"), SUBPROCESS_TIMEOUT).unwrap();
        assert_eq!(out.unwrap().trim(), "hello");
    }

    #[test]
    fn run_bounded_kills_on_timeout() {
        let out = run_bounded(
            Command::new("sleep").arg("30"),
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn run_bounded_missing_binary_is_spawn_error() {
        assert!(run_bounded(
            &mut Command::new("definitely-not-a-real-binary-here"),
            SUBPROCESS_TIMEOUT
        )
        .is_err());
    }
}
