// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs;
use std::io;

use chrono::{DateTime, Local};

use crate::error::Error;
use crate::report::{CategoryResult, PermissionIssue, ScanEntry};
use crate::safety::normalize_lexically;
use crate::scan::dir_size;
use crate::scanners::{home, non_empty};

/// Items untouched for this long are offered for removal.
const STALE_AFTER_DAYS: i64 = 90;

/// Items in `~/Downloads` whose modification time is at least 90 days old.
pub fn run() -> Result<Vec<CategoryResult>, Error> {
    let Some(home) = home() else {
        return Ok(Vec::new());
    };
    let downloads = home.join("Downloads");
    let mut result = CategoryResult::new("old-downloads", "Old downloads");

    let read_dir = match fs::read_dir(&downloads) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            result.push_issue(PermissionIssue::new(
                downloads.display().to_string(),
                err.to_string(),
            ));
            return Ok(non_empty(vec![result]));
        }
    };

    let mut children: Vec<_> = read_dir.filter_map(|child| child.ok()).collect();
    children.sort_by_key(|child| child.path());

    let now = Local::now();
    for child in children {
        let path = child.path();
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                result.push_issue(PermissionIssue::new(
                    path.display().to_string(),
                    err.to_string(),
                ));
                continue;
            }
        };

        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age_days = now
            .signed_duration_since(DateTime::<Local>::from(modified))
            .num_days();
        if age_days < STALE_AFTER_DAYS {
            continue;
        }

        let size = if meta.file_type().is_symlink() {
            0
        } else if meta.is_dir() {
            let (size, issues) = dir_size(&path);
            for issue in issues {
                result.push_issue(issue);
            }
            size
        } else {
            meta.len()
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        result.push_entry(ScanEntry::new(
            normalize_lexically(&path).display().to_string(),
            format!("{name} (untouched for {age_days} days)"),
            size,
        ));
    }

    Ok(non_empty(vec![result]))
}
