// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! [`Reference`]: the indirection that lets a fragment of one machine's
//! sequence stand in for itself inside another sequence, one recording
//! depth up (component D).

/// Where a [`Reference`] resolves against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefSource {
    /// Environment slot `i`.
    Env(usize),
    /// Store slot `i` (`S i`).
    Store(usize),
    /// The kontinuation.
    Kont,
}

/// A placeholder standing in for a sub-range of another sequence.
///
/// `offset` counts words skipped from the start of the source's sequence.
/// `values_count` is this fragment's degree: the net number of logical
/// values it stands for. It is usually positive (a whole run of complete
/// values, as in an environment slot), but a fragment cut right after a
/// constructor word and before that constructor's arguments carries the
/// constructor's own negative degree, so this is signed rather than a
/// plain count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    pub src: RefSource,
    pub offset: u32,
    pub values_count: i32,
}

impl Reference {
    #[must_use]
    pub fn new(src: RefSource, offset: u32, values_count: i32) -> Self {
        Self { src, offset, values_count }
    }

    /// Splits this reference at `need` logical values: the left half keeps
    /// the same offset and stands for `need` values, the right half is
    /// offset forward by `need` words and stands for the remainder (§4.C,
    /// `pop_n` step 4). `need` must be strictly between `0` and
    /// `values_count`, and `offset + need` must fit in a `u32` word count.
    #[must_use]
    pub fn split_at(&self, need: i32) -> (Reference, Option<Reference>) {
        debug_assert!(need > 0 && need <= self.values_count);
        let left = Reference::new(self.src, self.offset, need);
        let remaining = self.values_count - need;
        let right = if remaining == 0 {
            None
        } else {
            // need > 0 is the caller's contract (debug_assert above).
            Some(Reference::new(self.src, self.offset + need as u32, remaining))
        };
        (left, right)
    }
}
