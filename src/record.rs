// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The recording-depth stack (component E): one [`RecordState`] per
//! active memo scope, owning that scope's store and fetch counter.

use crate::memo::MemoNodeRef;
use crate::state::State;
use crate::store::Store;

/// What the current recording depth is doing with its memo slot.
#[derive(Clone)]
pub enum RecordContext {
    /// Actively extending `node`: the happy path, set on entering a
    /// fresh `Root`/`Need` slot.
    Evaluating(MemoNodeRef),
    /// Re-entered a `Need` whose request could not be fetched at this
    /// depth; new observations must match `node`'s existing request.
    Reentrance(MemoNodeRef),
    /// Not yet attached to any memo node (the initial state of a fresh
    /// recording before `enter_new_memo` runs).
    Building,
}

/// One recording depth's bookkeeping (§3, §4.E). Lives exactly as long
/// as the memo scope it belongs to.
pub struct RecordState {
    /// The state this depth is recording against.
    pub m: State,
    /// This depth's store, keyed by `S i`.
    pub s: Store,
    /// Successful-fetch counter at this depth, incremented by
    /// [`crate::fetch::fetch_value`].
    pub f: u32,
    pub r: RecordContext,
}

impl RecordState {
    #[must_use]
    pub fn new(m: State) -> Self {
        Self { m, s: Store::new(), f: 0, r: RecordContext::Building }
    }
}
