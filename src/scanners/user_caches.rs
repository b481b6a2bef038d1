// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::error::Error;
use crate::report::CategoryResult;
use crate::scan::scan_top_level;
use crate::scanners::{home, non_empty};

/// One entry per application cache directory under `~/Library/Caches`.
pub fn run() -> Result<Vec<CategoryResult>, Error> {
    let Some(home) = home() else {
        return Ok(Vec::new());
    };
    let result = scan_top_level(
        &home.join("Library/Caches"),
        "user-caches",
        "Application caches",
    );
    Ok(non_empty(vec![result]))
}
