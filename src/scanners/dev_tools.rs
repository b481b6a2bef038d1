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
use crate::scanners::{home, non_empty, push_dir_entry};

/// Developer tool caches: npm, Xcode DerivedData and CocoaPods. One
/// category, under the same id the scanner is registered with, so
/// front-ends can skip or clean it by the id they discovered. All of it
/// is rebuilt on demand by the owning tool.
pub fn run() -> Result<Vec<CategoryResult>, Error> {
    let Some(home) = home() else {
        return Ok(Vec::new());
    };

    // DerivedData grows one directory per project; list them individually
    let mut result = scan_top_level(
        &home.join("Library/Developer/Xcode/DerivedData"),
        "dev-tools",
        "Developer tool caches",
    );
    push_dir_entry(&mut result, &home.join(".npm/_cacache"), "npm content cache");
    push_dir_entry(
        &mut result,
        &home.join("Library/Caches/CocoaPods"),
        "CocoaPods cache",
    );

    Ok(non_empty(vec![result]))
}
