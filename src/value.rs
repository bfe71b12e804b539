// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! [`Value`]: a sequence together with the bookkeeping the fetcher needs
//! to grow fetch widths and recognize when a value is already
//! path-compressed (component D).

use crate::seq::MeasuredSeq;
use std::cell::Cell;
use std::rc::Rc;

/// A per-origin growth counter, shared between a value and every
/// fragment split off of it by [`crate::store::add_to_store`].
///
/// The counter cell is deliberately `Rc<Cell<u32>>` rather than a bare
/// field: the sharing is the point (successive fetches against the same
/// origin must see each other's growth), so it is named and narrow
/// instead of incidental aliasing. The growth factor itself is not
/// shared: it is fixed per [`crate::config::EvaluatorConfig`] at
/// construction, not mutated at runtime.
#[derive(Clone, Debug)]
pub struct FetchWidth {
    current: Rc<Cell<u32>>,
    growth_factor: u32,
}

impl FetchWidth {
    /// A fresh cell with the default doubling growth factor.
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self::with_growth_factor(initial, 2)
    }

    /// A fresh cell with an explicit growth factor (§10, config-tunable).
    #[must_use]
    pub fn with_growth_factor(initial: u32, growth_factor: u32) -> Self {
        Self { current: Rc::new(Cell::new(initial.max(1))), growth_factor: growth_factor.max(2) }
    }

    #[must_use]
    pub fn get(&self) -> u32 {
        self.current.get()
    }

    /// Grows the width for the next fetch from this origin by the
    /// configured growth factor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FetchWidthOverflow`] if growing would wrap.
    pub fn grow(&self) -> crate::Result<()> {
        let next = self.current.get().checked_mul(self.growth_factor).ok_or(crate::Error::FetchWidthOverflow)?;
        self.current.set(next);
        Ok(())
    }
}

/// A machine value: a measured sequence plus the metadata the fetcher and
/// path compressor need (§3, §4.D).
///
/// Intentionally *not* `Clone`. Values are owned by exactly one slot (an
/// environment entry, a store entry, or the kontinuation) and moved on
/// every mutation; two slots sharing one `Value` would corrupt
/// `fetch_length`'s per-origin accounting. Call sites that need to reuse
/// a value's contents build a new `Value` from its `seq` (which *is*
/// cheaply `Clone`, being a persistent rope) and a fresh or shared
/// [`FetchWidth`] as appropriate.
#[derive(Debug)]
pub struct Value {
    pub seq: MeasuredSeq,
    pub depth: u32,
    pub fetch_length: FetchWidth,
    pub compressed_since: u32,
}

impl Value {
    #[must_use]
    pub fn new(seq: MeasuredSeq, depth: u32, fetch_length: FetchWidth, compressed_since: u32) -> Self {
        Self { seq, depth, fetch_length, compressed_since }
    }

    /// A value at depth 0 with a fresh, unshared fetch-width cell, as
    /// produced by `from_int`/`from_constructor` (§6).
    #[must_use]
    pub fn fresh(seq: MeasuredSeq, depth: u32, initial_fetch_width: u32) -> Self {
        Self::new(seq, depth, FetchWidth::new(initial_fetch_width), 0)
    }

    /// True when `compressed_since` matches the store's current fetch
    /// epoch, i.e. this value contains no reference to its own depth
    /// (invariant 4, §3).
    #[must_use]
    pub fn is_compressed(&self, current_fetch_epoch: u32) -> bool {
        self.compressed_since == current_fetch_epoch
    }
}
