// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use serde::{Deserialize, Serialize};

use crate::report::CategoryResult;

/// Advisory deletion-risk classification attached to every scan entry.
///
/// Risk levels never change whether a deletion is permitted; the safety
/// kernel alone decides that. They exist so front-ends can order and color
/// what they show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Regenerated automatically, removal is never noticed.
    Safe,
    /// Removal may cost the user something (logins, re-downloads).
    Moderate,
    /// Removal can lose data the user might still want.
    Risky,
}

/// Compile-time risk table, keyed by scanner-defined category ids.
///
/// Categories added in the future fall through to `Risky` until they are
/// classified here.
pub fn risk_for(category_id: &str) -> RiskLevel {
    match category_id {
        "user-caches" | "temp-files" | "dev-tools" => RiskLevel::Safe,
        "user-logs" | "browser-data" | "container-runtime" => RiskLevel::Moderate,
        "old-downloads" | "trash" => RiskLevel::Risky,
        _ => RiskLevel::Risky,
    }
}

/// Stamp every entry of a category result with the level `lookup` assigns
/// to its category id.
pub fn set_risk_levels(result: &mut CategoryResult, lookup: impl Fn(&str) -> RiskLevel) {
    let level = lookup(&result.category);
    for entry in &mut result.entries {
        entry.risk_level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ScanEntry;

    #[test]
    fn unknown_categories_default_to_risky() {
        assert_eq!(risk_for("some-future-scanner"), RiskLevel::Risky);
        assert_eq!(risk_for(""), RiskLevel::Risky);
    }

    #[test]
    fn known_categories_are_classified() {
        assert_eq!(risk_for("user-caches"), RiskLevel::Safe);
        assert_eq!(risk_for("user-logs"), RiskLevel::Moderate);
        assert_eq!(risk_for("trash"), RiskLevel::Risky);
    }

    #[test]
    fn set_risk_levels_stamps_all_entries() {
        let mut result = CategoryResult::new("user-caches", "User caches");
        result.push_entry(ScanEntry::new("/tmp/a", "a", 1));
        result.push_entry(ScanEntry::new("/tmp/b", "b", 2));
        set_risk_levels(&mut result, risk_for);
        assert!(result
            .entries
            .iter()
            .all(|e| e.risk_level == RiskLevel::Safe));
    }
}
