// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reusable scan primitives consumed by the scanner implementations.
//!
//! Both helpers degrade gracefully: a missing root is an empty result and
//! an unreadable sub-path becomes a [`PermissionIssue`] instead of failing
//! the walk. Symlinks are never followed.

use std::fs;
use std::io;
use std::path::Path;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::report::{CategoryResult, PermissionIssue, ScanEntry};
use crate::safety::normalize_lexically;

/// List the immediate children of `root` as one entry each.
///
/// Directory children are sized recursively with [`dir_size`]; symlink
/// children are reported with size 0 and not descended into; per-path
/// read failures become permission issues on the result.
pub fn scan_top_level(root: &Path, category_id: &str, description: &str) -> CategoryResult {
    let mut result = CategoryResult::new(category_id, description);

    let read_dir = match fs::read_dir(root) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return result,
        Err(err) => {
            result.push_issue(issue_for(root, &err));
            return result;
        }
    };

    let mut children: Vec<_> = Vec::new();
    for child in read_dir {
        match child {
            Ok(child) => children.push(child.path()),
            Err(err) => result.push_issue(issue_for(root, &err)),
        }
    }
    // read_dir order is filesystem-dependent; keep results reproducible
    children.sort();

    for child in children {
        let name = child
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| child.display().to_string());

        let meta = match fs::symlink_metadata(&child) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                result.push_issue(issue_for(&child, &err));
                continue;
            }
        };

        let path = normalize_lexically(&child).display().to_string();
        if meta.file_type().is_symlink() {
            result.push_entry(ScanEntry::new(path, name, 0));
        } else if meta.is_dir() {
            let (size, issues) = dir_size(&child);
            result.push_entry(ScanEntry::new(path, name, size));
            for issue in issues {
                result.push_issue(issue);
            }
        } else {
            result.push_entry(ScanEntry::new(path, name, meta.len()));
        }
    }

    result
}

/// Total size in bytes of all regular files reachable from `root`,
/// without following symlinks. Unreadable sub-paths contribute 0 and are
/// surfaced to the caller; a missing root is simply 0.
pub fn dir_size(root: &Path) -> (u64, Vec<PermissionIssue>) {
    let mut issues = Vec::new();

    if fs::symlink_metadata(root).is_err() {
        return (0, issues);
    }

    // collect first, then stat in parallel (rayon); walkdir's iterator
    // itself does not parallelize
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                issues.push(issue_for(&path, &io::Error::from(err)));
            }
        }
    }

    let size = files
        .par_iter()
        .filter_map(|file| fs::symlink_metadata(file).ok())
        .map(|meta| meta.len())
        .sum();

    (size, issues)
}

fn issue_for(path: &Path, err: &io::Error) -> PermissionIssue {
    PermissionIssue::new(path.display().to_string(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn missing_root_is_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_top_level(&dir.path().join("nope"), "x", "X");
        assert!(result.entries.is_empty());
        assert!(result.permission_issues.is_empty());
        assert_eq!(dir_size(&dir.path().join("nope")).0, 0);
    }

    #[test]
    fn sizes_children_one_level_deep() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("flat.bin"), vec![0u8; 10]).unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("a"), vec![0u8; 30]).unwrap();
        fs::write(sub.join("b"), vec![0u8; 2]).unwrap();

        let result = scan_top_level(dir.path(), "user-caches", "User caches");
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.total_size, 42);

        let nested = result
            .entries
            .iter()
            .find(|e| e.description == "nested")
            .unwrap();
        assert_eq!(nested.size, 32);
    }

    #[test]
    fn zero_size_files_are_reported_not_omitted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty"), b"").unwrap();
        let result = scan_top_level(dir.path(), "x", "X");
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].size, 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_size_zero_and_not_descended() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("big"), vec![0u8; 4096]).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let result = scan_top_level(dir.path(), "x", "X");
        let link = result
            .entries
            .iter()
            .find(|e| e.description == "link")
            .unwrap();
        assert_eq!(link.size, 0);

        // dir_size must not chase the link either: target counted once
        let (size, issues) = dir_size(dir.path());
        assert_eq!(size, 4096);
        assert!(issues.is_empty());
    }

    #[test]
    fn repeated_scans_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c", "a", "b"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let first = scan_top_level(dir.path(), "x", "X");
        let second = scan_top_level(dir.path(), "x", "X");
        let paths: Vec<_> = first.entries.iter().map(|e| &e.path).collect();
        let paths_again: Vec<_> = second.entries.iter().map(|e| &e.path).collect();
        assert_eq!(paths, paths_again);
    }
}
