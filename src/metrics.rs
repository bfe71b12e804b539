// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Ambient instrumentation for an [`crate::exec::Evaluator`] run (§10).
//! Counters only; no allocation, no locking beyond the atomics themselves.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;

#[derive(Debug, Default)]
pub struct Metrics {
    /// Times `begin_record` bottomed out at a fresh depth (a `Root` or an
    /// unfetchable `Need`) and a new [`crate::record::RecordState`] was
    /// pushed: a `Root -> Need`/`Done` transition in progress.
    pub(crate) new_memo_entries: AtomicUsize,

    /// Times dispatch returned without pushing a new recording because the
    /// caller didn't opt to match: an unmatched `Root`/`Need` passthrough.
    /// Distinct from [`Self::memo_hits`], which is an actual skip.
    pub(crate) memo_passthroughs: AtomicUsize,

    /// Times dispatch reached a `Done` node and reused its recorded
    /// outcome instead of recomputing.
    pub(crate) memo_hits: AtomicUsize,

    /// Times `fetch_value` returned a fully materialized fragment.
    pub(crate) successful_fetches: AtomicUsize,

    /// Times `fetch_value` could not satisfy the requested width from a
    /// materialized prefix and returned `None` (ordinary control flow,
    /// not an error; §7).
    pub(crate) failed_fetches: AtomicUsize,

    /// Times dispatch observed a `BlackHole` it did not itself create,
    /// i.e. reentrance into an in-progress recording. Always fatal; this
    /// counts how often the invariant a `debug_assert!` enforces at the
    /// same site was actually violated.
    pub(crate) black_hole_traps: AtomicUsize,
}

#[allow(clippy::cast_precision_loss)]
impl Metrics {
    pub fn new_memo_entries(&self) -> usize {
        self.new_memo_entries.load(Relaxed)
    }

    pub fn memo_passthroughs(&self) -> usize {
        self.memo_passthroughs.load(Relaxed)
    }

    pub fn memo_hits(&self) -> usize {
        self.memo_hits.load(Relaxed)
    }

    pub fn successful_fetches(&self) -> usize {
        self.successful_fetches.load(Relaxed)
    }

    pub fn failed_fetches(&self) -> usize {
        self.failed_fetches.load(Relaxed)
    }

    pub fn black_hole_traps(&self) -> usize {
        self.black_hole_traps.load(Relaxed)
    }

    /// Share of memo-trie arrivals that reused a recorded outcome rather
    /// than creating a new entry, in `0.0..=1.0`. `NaN` if the trie was
    /// never consulted.
    pub fn memo_hit_rate(&self) -> f64 {
        let hits = self.memo_hits() as f64;
        let total = hits + self.new_memo_entries() as f64;
        hits / total
    }
}
