// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Space a container runtime reports as reclaimable.
//!
//! The entries here are pseudo-paths (`docker:<kind>`): the executor never
//! touches them on disk, reclaiming this space is delegated to the
//! runtime itself. The `:` makes them unambiguous: it cannot occur in an
//! absolute local path.

use std::process::Command;

use crate::error::Error;
use crate::report::{CategoryResult, ScanEntry};
use crate::scanners::{non_empty, run_bounded, SUBPROCESS_TIMEOUT};

pub fn run() -> Result<Vec<CategoryResult>, Error> {
    let output = match run_bounded(
        Command::new("docker").args(["system", "df", "--format", "{{.Type}}\t{{.Reclaimable}}"]),
        SUBPROCESS_TIMEOUT,
    ) {
        // docker not installed
        Err(_not_found) => return Ok(Vec::new()),
        // daemon unreachable or the call timed out
        Ok(None) => return Ok(Vec::new()),
        Ok(Some(output)) => output,
    };

    let mut result = CategoryResult::new("container-runtime", "Container runtime reclaimable space");
    for line in output.lines() {
        let Some((kind, reclaimable)) = line.split_once('\t') else {
            continue;
        };
        let size = parse_reclaimable(reclaimable);
        if size == 0 {
            continue;
        }
        result.push_entry(ScanEntry::new(
            format!("docker:{}", slug(kind)),
            format!("Docker reclaimable {}", kind.trim().to_lowercase()),
            size,
        ));
    }

    Ok(non_empty(vec![result]))
}

/// Parse docker's human-readable reclaimable column, e.g. `1.5GB (43%)`.
fn parse_reclaimable(value: &str) -> u64 {
    let value = value.split('(').next().unwrap_or("").trim();
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(digits_end);
    let Ok(number) = number.parse::<f64>() else {
        return 0;
    };
    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "B" | "" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return 0,
    };
    (number * multiplier) as u64
}

fn slug(kind: &str) -> String {
    kind.trim()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
