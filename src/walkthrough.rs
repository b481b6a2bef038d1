// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-entry keep/remove selection over plain text streams.
//!
//! No filesystem I/O happens here and no final confirmation is asked;
//! both are the caller's responsibility.

use std::io::{BufRead, Write};

use humansize::{format_size, DECIMAL};

use crate::report::CategoryResult;

/// Walk every entry in order and ask the user to keep or remove it.
/// Accepts `k`/`keep` and `r`/`remove` (case-insensitive); anything else
/// re-prompts. End of input keeps all remaining entries.
///
/// Returns the subset marked for removal, with per-category totals
/// recomputed from the surviving entries. Categories with nothing
/// selected are dropped.
pub fn walkthrough<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    results: &[CategoryResult],
) -> std::io::Result<Vec<CategoryResult>> {
    let mut selected = Vec::new();
    let mut exhausted = false;

    for category in results {
        let mut kept = CategoryResult::new(category.category.clone(), category.description.clone());

        if !exhausted && !category.entries.is_empty() {
            writeln!(output, "{} ({}):", category.description, category.category)?;
        }

        for entry in &category.entries {
            if exhausted {
                break;
            }
            loop {
                write!(
                    output,
                    "  {} ({}) [k/r]? ",
                    entry.path,
                    format_size(entry.size, DECIMAL)
                )?;
                output.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    exhausted = true;
                    break;
                }
                match line.trim().to_ascii_lowercase().as_str() {
                    "r" | "remove" => {
                        kept.push_entry(entry.clone());
                        break;
                    }
                    "k" | "keep" => break,
                    _ => writeln!(output, "  please answer k(eep) or r(emove)")?,
                }
            }
        }

        if !kept.entries.is_empty() {
            selected.push(kept);
        }
    }

    Ok(selected)
}
