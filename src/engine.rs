// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scan and cleanup orchestration.
//!
//! Long operations hand back two paired streams: a bounded event channel
//! and a oneshot `done` record. The done record is sent strictly after the
//! event channel has been closed, and every event send is selectable
//! against the controlling [`CancellationToken`].

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Error;
use crate::executor;
pub use crate::executor::CleanupEvent;
use crate::filter::filter_skipped;
use crate::registry::Registry;
use crate::report::{CategoryResult, CleanupResult, ScanSummary};
use crate::risk::{risk_for, set_risk_levels};
use crate::safety::Safety;
use crate::token::{new_token, TokenStore};

/// Streaming progress of one scan. Per scanner, `scanner_start` strictly
/// precedes its `scanner_done` / `scanner_error`; scanners run in
/// registration order and never interleave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    ScannerStart {
        scanner_id: String,
        label: String,
    },
    ScannerDone {
        scanner_id: String,
        label: String,
    },
    ScannerError {
        scanner_id: String,
        label: String,
        error: String,
    },
}

/// Terminal record of a scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub summary: ScanSummary,
    /// Single-use capability for the follow-up cleanup. Also issued for a
    /// cancelled scan, bound to whatever partial results were collected.
    pub token: String,
    pub error: Option<Error>,
}

/// Terminal record of a cleanup.
#[derive(Debug)]
pub struct CleanupOutcome {
    pub result: CleanupResult,
    /// Set only for pre-flight gate failures (token, category filter);
    /// per-entry failures live in `result.errors`.
    pub error: Option<Error>,
}

/// The engine owns the scanner registry, the safety oracle and the token
/// store. Cloning is cheap; all clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: Registry,
    safety: Safety,
    tokens: TokenStore,
}

impl Engine {
    pub fn new(registry: Registry, safety: Safety) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry,
                safety,
                tokens: TokenStore::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Drive all registered scanners sequentially, in registration order.
    ///
    /// A failing scanner produces a `scanner_error` event and the scan
    /// continues. On cancellation the loop stops at the next boundary, the
    /// event stream closes, and the done record carries the partial
    /// results together with `Error::Cancelled`. Afterwards the skip-set
    /// is applied, a fresh token is minted and the `(token, results)` pair
    /// atomically replaces whatever the store held.
    pub fn scan_all(
        &self,
        cancel: CancellationToken,
        skip: HashSet<String>,
    ) -> (mpsc::Receiver<ScanEvent>, oneshot::Receiver<ScanOutcome>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (done_tx, done_rx) = oneshot::channel();
        let engine = self.clone();

        tokio::spawn(async move {
            let mut categories: Vec<CategoryResult> = Vec::new();
            let mut error = None;

            for scanner in engine.inner.registry.scanners() {
                let info = scanner.info.clone();

                if cancel.is_cancelled()
                    || !send_event(
                        &event_tx,
                        &cancel,
                        ScanEvent::ScannerStart {
                            scanner_id: info.id.clone(),
                            label: info.name.clone(),
                        },
                    )
                    .await
                {
                    error = Some(Error::Cancelled);
                    break;
                }

                // scanner bodies are blocking filesystem work; run them off
                // the async threads but always to completion, so no task
                // outlives the done record
                let run = scanner.handle();
                let event = match task::spawn_blocking(move || run()).await {
                    Ok(Ok(mut results)) => {
                        for category in &mut results {
                            set_risk_levels(category, risk_for);
                        }
                        categories.extend(results);
                        ScanEvent::ScannerDone {
                            scanner_id: info.id.clone(),
                            label: info.name.clone(),
                        }
                    }
                    Ok(Err(err)) => {
                        let err = Error::Scan {
                            scanner: info.id.clone(),
                            source: Box::new(err),
                        };
                        warn!(scanner = %info.id, %err, "scanner failed");
                        ScanEvent::ScannerError {
                            scanner_id: info.id.clone(),
                            label: info.name.clone(),
                            error: err.to_string(),
                        }
                    }
                    Err(join_err) => {
                        warn!(scanner = %info.id, %join_err, "scanner panicked");
                        ScanEvent::ScannerError {
                            scanner_id: info.id.clone(),
                            label: info.name.clone(),
                            error: format!("scanner '{}' panicked", info.id),
                        }
                    }
                };

                if !send_event(&event_tx, &cancel, event).await {
                    error = Some(Error::Cancelled);
                    break;
                }
            }

            let categories = filter_skipped(categories, &skip);
            let summary = ScanSummary::from_categories(categories);
            let token = new_token();
            engine.inner.tokens.store(token.clone(), summary.clone());

            // close the event stream before delivering done
            drop(event_tx);
            let _ = done_tx.send(ScanOutcome {
                summary,
                token,
                error,
            });
        });

        (event_rx, done_rx)
    }

    /// Validate the token, consume it, and delete the stored results.
    ///
    /// The token check is one-shot: the store is emptied before the first
    /// removal, regardless of how the cleanup itself ends. A non-empty
    /// `category_ids` keeps only the named categories and fails without
    /// touching the filesystem when nothing matches. Cancellation silences
    /// progress events but never interrupts the removal loop.
    pub fn cleanup(
        &self,
        cancel: CancellationToken,
        token: String,
        category_ids: Vec<String>,
    ) -> (
        mpsc::Receiver<CleanupEvent>,
        oneshot::Receiver<CleanupOutcome>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (done_tx, done_rx) = oneshot::channel();
        let engine = self.clone();

        tokio::spawn(async move {
            let fail = |done_tx: oneshot::Sender<CleanupOutcome>, err: Error| {
                let _ = done_tx.send(CleanupOutcome {
                    result: CleanupResult::default(),
                    error: Some(err),
                });
            };

            let summary = match engine.inner.tokens.take(&token) {
                Ok(summary) => summary,
                Err(err) => {
                    drop(event_tx);
                    fail(done_tx, err);
                    return;
                }
            };

            let selected: Vec<CategoryResult> = if category_ids.is_empty() {
                summary.categories
            } else {
                summary
                    .categories
                    .into_iter()
                    .filter(|c| category_ids.iter().any(|id| *id == c.category))
                    .collect()
            };

            if selected.is_empty() && !category_ids.is_empty() {
                drop(event_tx);
                fail(done_tx, Error::NoMatchingCategories);
                return;
            }

            let emit_cancel = cancel.clone();
            let emit_tx = event_tx.clone();
            let executed = task::spawn_blocking(move || {
                executor::run_cleanup(&selected, &engine.inner.safety, |event| {
                    // cancellation stops emission only; the removal loop
                    // always runs to completion
                    if emit_cancel.is_cancelled() {
                        return;
                    }
                    let _ = emit_tx.blocking_send(event);
                })
            })
            .await;

            drop(event_tx);
            let outcome = match executed {
                Ok(result) => CleanupOutcome {
                    result,
                    error: None,
                },
                Err(join_err) => CleanupOutcome {
                    result: CleanupResult::default(),
                    error: Some(Error::Io(io::Error::other(format!(
                        "cleanup task failed: {join_err}"
                    )))),
                },
            };
            let _ = done_tx.send(outcome);
        });

        (event_rx, done_rx)
    }

    /// Delete an explicit result list on behalf of an in-process caller
    /// that already collected consent per entry (the interactive
    /// walkthrough). The per-entry safety re-check still applies to every
    /// path. Any stored token is cleared: the selection supersedes the
    /// scan it came from.
    pub async fn cleanup_selected(&self, selected: Vec<CategoryResult>) -> CleanupResult {
        self.inner.tokens.clear();
        let engine = self.clone();
        match task::spawn_blocking(move || {
            executor::run_cleanup(&selected, &engine.inner.safety, |_| {})
        })
        .await
        {
            Ok(result) => result,
            Err(join_err) => {
                warn!(%join_err, "cleanup task failed");
                CleanupResult::default()
            }
        }
    }

    /// Convenience wrapper for in-process callers: run a scan to the end,
    /// forwarding events to `on_event`.
    pub async fn scan_to_end(
        &self,
        skip: HashSet<String>,
        mut on_event: impl FnMut(&ScanEvent),
    ) -> Result<(ScanSummary, String), Error> {
        let (mut events, done) = self.scan_all(CancellationToken::new(), skip);
        while let Some(event) = events.recv().await {
            on_event(&event);
        }
        let outcome = done.await.map_err(|_| Error::Cancelled)?;
        match outcome.error {
            Some(err) => Err(err),
            None => Ok((outcome.summary, outcome.token)),
        }
    }

    /// Convenience wrapper for in-process callers: run a cleanup to the
    /// end, forwarding events to `on_event`.
    pub async fn cleanup_to_end(
        &self,
        token: String,
        category_ids: Vec<String>,
        mut on_event: impl FnMut(&CleanupEvent),
    ) -> Result<CleanupResult, Error> {
        let (mut events, done) = self.cleanup(CancellationToken::new(), token, category_ids);
        while let Some(event) = events.recv().await {
            on_event(&event);
        }
        let outcome = done.await.map_err(|_| Error::Cancelled)?;
        match outcome.error {
            Some(err) => Err(err),
            None => Ok(outcome.result),
        }
    }
}

/// Send one event, racing the controlling token. Returns false when the
/// operation should stop emitting (cancelled, or the receiver is gone).
async fn send_event<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken, event: T) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
