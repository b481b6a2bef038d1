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
use crate::scanners::{home, non_empty, push_dir_entry};

/// Cache directories of browsers the user has installed. Only caches;
/// profiles, bookmarks and history are none of our business.
const BROWSER_CACHES: &[(&str, &str)] = &[
    ("Library/Caches/com.apple.Safari", "Safari cache"),
    ("Library/Caches/Google/Chrome", "Chrome cache"),
    ("Library/Caches/Firefox", "Firefox cache"),
    ("Library/Caches/com.microsoft.edgemac", "Edge cache"),
    ("Library/Caches/BraveSoftware", "Brave cache"),
];

pub fn run() -> Result<Vec<CategoryResult>, Error> {
    let Some(home) = home() else {
        return Ok(Vec::new());
    };
    let mut result = CategoryResult::new("browser-data", "Browser caches");
    for (relative, description) in BROWSER_CACHES {
        push_dir_entry(&mut result, &home.join(relative), description);
    }
    Ok(non_empty(vec![result]))
}
