// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Tagged machine words (component A).
//!
//! A [`Word`] is the atomic unit a compiled program's sequences are built
//! from. Its payload encoding is deliberately narrow — the concrete
//! `Word` layout a particular source language wants (boxed doubles, string
//! interning, ...) is out of scope; this crate only needs the two tags
//! `int` and `constructor` and the degree each constructor tag carries.

use crate::hash::WordHash;

/// Identifies a registered constructor tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstructorTag(pub u32);

/// A fixed-width tagged scalar: an integer or a constructor tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Word {
    /// Tag = 0.
    Int(i64),
    /// Tag = 1.
    Constructor(ConstructorTag),
}

impl Word {
    /// Folds the word into a single `u64` for feeding into [`WordHash`].
    /// Tag and payload are kept in disjoint bit ranges so that `Int(0)` and
    /// `Constructor(ConstructorTag(0))` never collide.
    #[must_use]
    pub fn fold(self) -> u64 {
        match self {
            Word::Int(n) => (n as u64) << 1,
            Word::Constructor(ConstructorTag(c)) => (u64::from(c) << 1) | 1,
        }
    }

    #[must_use]
    pub fn hash(self) -> WordHash {
        WordHash::from_word_payload(self.fold())
    }
}

/// Process-wide (in practice, per-[`crate::exec::Evaluator`]) table mapping
/// a [`ConstructorTag`] to its degree: the net number of logical values the
/// constructor's word contributes to a sequence's measure once its
/// arguments are laid out after it (§3, §6).
///
/// Registration is append-only and must be dense: tag `i` must be
/// registered before tag `i+1`. This is checked by
/// [`DegreeTable::set_constructor_degree`] (R2).
#[derive(Debug, Default, Clone)]
pub struct DegreeTable {
    degrees: Vec<i32>,
}

impl DegreeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the degree of the next constructor tag, in ascending
    /// order. Returns the tag that was just registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if `ctag` is not exactly
    /// `self.len()` (i.e. registration skipped a tag or repeated one).
    pub fn set_constructor_degree(
        &mut self,
        ctag: ConstructorTag,
        degree: i32,
    ) -> crate::Result<()> {
        if ctag.0 as usize != self.degrees.len() {
            return Err(crate::error::corrupt(
                "constructor degrees must be registered in ascending, dense order",
            ));
        }
        self.degrees.push(degree);
        Ok(())
    }

    #[must_use]
    pub fn degree(&self, ctag: ConstructorTag) -> Option<i32> {
        self.degrees.get(ctag.0 as usize).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }

    /// Degree contributed by a single [`Word`]: `+1` for an integer word or
    /// a registered constructor's degree (`±1·(1 - arity)`, §6).
    pub fn word_degree(&self, word: Word) -> crate::Result<i32> {
        match word {
            Word::Int(_) => Ok(1),
            Word::Constructor(ctag) => self
                .degree(ctag)
                .ok_or_else(|| crate::error::corrupt("unknown constructor tag")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn registers_in_order() {
        let mut t = DegreeTable::new();
        assert!(t.set_constructor_degree(ConstructorTag(0), 1).is_ok());
        assert!(t.set_constructor_degree(ConstructorTag(1), -1).is_ok());
        assert_eq!(t.degree(ConstructorTag(0)), Some(1));
        assert_eq!(t.degree(ConstructorTag(1)), Some(-1));
    }

    #[test]
    fn rejects_out_of_order() {
        let mut t = DegreeTable::new();
        assert!(t.set_constructor_degree(ConstructorTag(1), 1).is_err());
    }

    #[test]
    fn int_degree_is_one() {
        let t = DegreeTable::new();
        assert_eq!(t.word_degree(Word::Int(42)).unwrap(), 1);
    }
}
