// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::env;

use crate::error::Error;
use crate::report::CategoryResult;
use crate::scan::scan_top_level;
use crate::scanners::non_empty;

/// One entry per item in the per-user temporary directory (`$TMPDIR`).
/// This is the one scan root outside the home tree the safety kernel
/// admits.
pub fn run() -> Result<Vec<CategoryResult>, Error> {
    let result = scan_top_level(&env::temp_dir(), "temp-files", "Per-user temporary files");
    Ok(non_empty(vec![result]))
}
