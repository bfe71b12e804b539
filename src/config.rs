// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! [`EvaluatorConfig`]: tunables for an [`crate::exec::Evaluator`], set
//! once before the first step is registered.

/// Builder for an [`crate::exec::Evaluator`]'s tunables (§10).
///
/// All fields are sizing hints, not correctness-affecting: a program runs
/// identically (modulo instrumentation) no matter how these are set, only
/// the number of `Vec`/`HashMap` reallocations along the way changes.
#[derive(Clone, Debug)]
pub struct EvaluatorConfig {
    /// Number of PC slots the memo trie preallocates roots for.
    pub(crate) initial_pc_capacity: usize,

    /// Initial width, in logical values, of a fresh [`crate::value::FetchWidth`]
    /// cell (§4.D, §8 P6: widths only grow, starting here).
    pub(crate) initial_fetch_width: u32,

    /// Factor a [`crate::value::FetchWidth`] cell grows by on every
    /// successful fetch from the same origin (§4.D, §10). Defaults to 2
    /// (doubling), matching the source's exponential-growth description.
    pub(crate) fetch_width_growth_factor: u32,

    /// Initial capacity of a [`crate::memo::MemoNode::Need`]'s `lookup` map.
    pub(crate) need_lookup_capacity: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            initial_pc_capacity: 64,
            initial_fetch_width: 1,
            fetch_width_growth_factor: 2,
            need_lookup_capacity: 0,
        }
    }
}

impl EvaluatorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many PC slots the memo trie preallocates roots for.
    ///
    /// A program with `N` instructions never benefits from a capacity
    /// smaller than `N`; setting it up front avoids the `Vec::resize_with`
    /// calls [`crate::memo::MemoTrie::root`] otherwise does lazily.
    ///
    /// Defaults to 64.
    #[must_use]
    pub fn initial_pc_capacity(mut self, n: usize) -> Self {
        self.initial_pc_capacity = n;
        self
    }

    /// Sets the initial fetch width, in logical values, new values start
    /// with before any doubling.
    ///
    /// Defaults to 1.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn initial_fetch_width(mut self, n: u32) -> Self {
        assert!(n > 0, "initial fetch width must be positive");
        self.initial_fetch_width = n;
        self
    }

    /// Sets the factor a fetch width grows by on every successful fetch
    /// from the same origin.
    ///
    /// Defaults to 2 (doubling).
    ///
    /// # Panics
    ///
    /// Panics if `n` is less than 2: a factor of 0 or 1 would never grow
    /// the window, defeating the point of a growing fetch width.
    #[must_use]
    pub fn fetch_width_growth_factor(mut self, n: u32) -> Self {
        assert!(n >= 2, "fetch width growth factor must be at least 2");
        self.fetch_width_growth_factor = n;
        self
    }

    /// Sets the initial capacity reserved for a `Need` node's observed-key
    /// lookup table.
    ///
    /// Defaults to 0 (grow on demand). Raise this when a program is known
    /// to branch widely at a particular program point.
    #[must_use]
    pub fn need_lookup_capacity(mut self, n: usize) -> Self {
        self.need_lookup_capacity = n;
        self
    }

    /// Builds the [`crate::exec::Evaluator`] from this configuration.
    #[must_use]
    pub fn build(self) -> crate::exec::Evaluator {
        crate::exec::Evaluator::new(self)
    }
}
