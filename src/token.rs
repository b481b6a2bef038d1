// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Single-slot binding between a scan and the cleanup it authorises.
//!
//! Holding at most one `(token, summary)` pair bounds memory, makes a
//! forgotten scan impossible to leak, and makes replay trivially
//! impossible: `take` empties the slot no matter whether the presented
//! token matched.

use std::sync::Mutex;

use rand::RngCore;

use crate::error::Error;
use crate::report::ScanSummary;

/// Tokens carry 128 bits of CSPRNG entropy, hex-encoded.
const TOKEN_BYTES: usize = 16;

/// Mint a fresh opaque scan token.
pub fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut token = String::with_capacity(TOKEN_BYTES * 2);
    for byte in bytes {
        token.push_str(&format!("{byte:02x}"));
    }
    token
}

/// Mutex-guarded single-slot store.
#[derive(Default)]
pub struct TokenStore {
    slot: Mutex<Option<(String, ScanSummary)>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `summary` to `token`, replacing any prior pair.
    pub fn store(&self, token: String, summary: ScanSummary) {
        let mut slot = self.slot.lock().expect("token store lock poisoned");
        *slot = Some((token, summary));
    }

    /// One-shot redemption. The slot is empty afterwards on every path:
    /// a missing pair is `TokenMissing`, a non-matching token discards the
    /// stored pair and is `TokenMismatch`.
    pub fn take(&self, token: &str) -> Result<ScanSummary, Error> {
        let mut slot = self.slot.lock().expect("token store lock poisoned");
        match slot.take() {
            None => Err(Error::TokenMissing),
            Some((stored, summary)) if stored == token => Ok(summary),
            Some(_) => Err(Error::TokenMismatch),
        }
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock().expect("token store lock poisoned");
        *slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot
            .lock()
            .expect("token store lock poisoned")
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ScanSummary;

    fn summary() -> ScanSummary {
        ScanSummary::from_categories(Vec::new())
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn take_with_matching_token_consumes() {
        let store = TokenStore::new();
        store.store("t1".into(), summary());
        assert!(store.take("t1").is_ok());
        assert!(store.is_empty());
        // second use of the same token fails
        assert!(matches!(store.take("t1"), Err(Error::TokenMissing)));
    }

    #[test]
    fn take_with_wrong_token_also_empties() {
        let store = TokenStore::new();
        store.store("t1".into(), summary());
        assert!(matches!(store.take("nope"), Err(Error::TokenMismatch)));
        assert!(store.is_empty());
    }

    #[test]
    fn store_replaces_prior_pair() {
        let store = TokenStore::new();
        store.store("old".into(), summary());
        store.store("new".into(), summary());
        assert!(matches!(store.take("old"), Err(Error::TokenMismatch)));
        store.store("new".into(), summary());
        assert!(store.take("new").is_ok());
    }

    #[test]
    fn clear_empties_the_slot() {
        let store = TokenStore::new();
        store.store("t".into(), summary());
        store.clear();
        assert!(store.is_empty());
    }
}
