// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashSet;

use crate::report::CategoryResult;

/// Drop every category whose id is in `skip`, preserving the order of the
/// survivors.
pub fn filter_skipped(
    results: Vec<CategoryResult>,
    skip: &HashSet<String>,
) -> Vec<CategoryResult> {
    if skip.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|c| !skip.contains(c.category.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn results(ids: &[&str]) -> Vec<CategoryResult> {
        ids.iter()
            .map(|id| CategoryResult::new(*id, id.to_uppercase()))
            .collect()
    }

    #[test]
    fn empty_skip_set_keeps_everything() {
        let filtered = filter_skipped(results(&["a", "b"]), &HashSet::new());
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn skipped_ids_are_dropped_order_stable() {
        let skip: HashSet<String> = ["b", "d"].iter().map(|s| s.to_string()).collect();
        let filtered = filter_skipped(results(&["a", "b", "c", "d", "e"]), &skip);
        let ids: Vec<_> = filtered.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "e"]);
    }

    #[test]
    fn unknown_skip_ids_are_ignored() {
        let skip: HashSet<String> = ["nope"].iter().map(|s| s.to_string()).collect();
        let filtered = filter_skipped(results(&["a"]), &skip);
        assert_eq!(filtered.len(), 1);
    }
}
