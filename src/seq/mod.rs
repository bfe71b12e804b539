// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Sequences of machine words and references, and the measure that lets
//! the memoizer binary-search them by logical value count or by fully
//! materialized word count (component C).

mod measure;
mod tree;

pub use measure::{Full, Measure};

use crate::reference::Reference;
use crate::word::{DegreeTable, Word};
use std::rc::Rc;
use tree::Tree;

/// An element of a [`MeasuredSeq`]: either a concrete word or a reference
/// to a fragment of another sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqElem {
    Word(Word),
    Reference(Reference),
}

impl SeqElem {
    /// The measure this element contributes as a single-element sequence.
    /// A [`Word`]'s degree depends on the registered [`DegreeTable`]; a
    /// [`Reference`]'s degree is exactly its `values_count` (it always
    /// stands for that many complete logical values, known without
    /// consulting any table).
    pub fn measure(&self, degrees: &DegreeTable) -> crate::Result<Measure> {
        match self {
            SeqElem::Word(w) => {
                let degree = degrees.word_degree(*w)?;
                Ok(Measure::leaf(degree, Some(Full { length: 1, hash: w.hash() })))
            }
            SeqElem::Reference(r) => Ok(reference_measure(r)?),
        }
    }
}

fn reference_measure(r: &Reference) -> crate::Result<Measure> {
    Ok(Measure::leaf(r.values_count, None))
}

/// A persistent sequence of [`SeqElem`]s, measured as described in the
/// module docs. All machine state (the control PC aside) is one of these.
#[derive(Clone, Debug)]
pub struct MeasuredSeq {
    root: Rc<Tree>,
}

impl MeasuredSeq {
    #[must_use]
    pub fn empty() -> Self {
        Self { root: tree::empty() }
    }

    pub fn singleton(elem: SeqElem, degrees: &DegreeTable) -> crate::Result<Self> {
        let m = elem.measure(degrees)?;
        Ok(Self { root: tree::leaf(elem, m) })
    }

    /// Builds a single-element sequence from an element whose measure is
    /// already known (e.g. a [`Reference`] split off of an
    /// already-measured parent, or a `Word` pivot recovered from
    /// [`MeasuredSeq::pop_n`]'s `front`). Skips the [`DegreeTable`] lookup.
    fn singleton_measured(elem: SeqElem, measure: Measure) -> Self {
        Self { root: tree::leaf(elem, measure) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    #[must_use]
    pub fn measure(&self) -> Measure {
        self.root.measure()
    }

    #[must_use]
    pub fn cons(elem: SeqElem, degrees: &DegreeTable, rest: Self) -> crate::Result<Self> {
        let m = elem.measure(degrees)?;
        Ok(Self { root: tree::join(tree::leaf(elem, m), rest.root) })
    }

    #[must_use]
    pub fn snoc(self, elem: SeqElem, degrees: &DegreeTable) -> crate::Result<Self> {
        let m = elem.measure(degrees)?;
        Ok(Self { root: tree::join(self.root, tree::leaf(elem, m)) })
    }

    #[must_use]
    pub fn append(self, other: Self) -> Self {
        Self { root: tree::join(self.root, other.root) }
    }

    /// Splits at the point where `pred` first holds over the accumulated
    /// measure from the start (§4.C). If `pred` never holds, the whole
    /// sequence is the prefix and the suffix is empty.
    #[must_use]
    pub fn split(&self, pred: impl Fn(&Measure) -> bool) -> (Self, Self) {
        let (l, r) = tree::split(&self.root, &pred);
        (Self { root: l }, Self { root: r })
    }

    /// Peeks and removes the leftmost element.
    #[must_use]
    pub fn front(&self) -> Option<(SeqElem, Self)> {
        tree::front(&self.root).map(|(e, _m, rest)| (e, Self { root: rest }))
    }

    /// Like [`MeasuredSeq::front`], but reports a corrupt-state error
    /// instead of `None` when the sequence is unexpectedly empty. Named
    /// to match the informal `_exn` convention the original design used
    /// for "this really should not be empty" call sites.
    pub fn front_exn(&self) -> crate::Result<(SeqElem, Self)> {
        self.front()
            .ok_or_else(|| crate::error::corrupt("front_exn on an empty sequence"))
    }

    /// Splits off the first `n` *logical values* (not words), per §4.C.
    ///
    /// Returns `(prefix, suffix)` such that `measure(prefix).degree == n`
    /// and that degree is also `prefix`'s `max_degree` (P3) — i.e. the
    /// split lands exactly on a value boundary, never mid-value.
    pub fn pop_n(&self, n: u32) -> crate::Result<(Self, Self)> {
        if n == 0 {
            return Ok((Self::empty(), self.clone()));
        }
        let need = i32::try_from(n).map_err(|_| crate::error::corrupt("n does not fit in i32"))?;
        let (prefix, suffix) = self.split(|m| m.max_degree >= need);

        let Some((pivot, pivot_measure, suffix_rest)) = tree::front(&suffix.root) else {
            // pred never held: the whole sequence didn't reach n values.
            return Err(crate::error::corrupt("pop_n: sequence has fewer than n values"));
        };
        let suffix_rest = Self { root: suffix_rest };
        let already = prefix.measure().degree;

        match pivot {
            SeqElem::Word(_) => {
                // The pivot word (degree ±1, per invariant 3 on well-formed
                // words it is never 0) always completes the prefix: it's
                // the one element whose inclusion first reaches `need`.
                if already + pivot_measure.degree != need {
                    return Err(crate::error::corrupt("pop_n: word pivot does not land on boundary"));
                }
                let new_prefix = prefix.append(Self::singleton_measured(pivot, pivot_measure));
                Ok((new_prefix, suffix_rest))
            }
            SeqElem::Reference(r) => {
                let still_need = need - already;
                if still_need <= 0 || still_need > r.values_count {
                    return Err(crate::error::corrupt("pop_n: reference pivot cannot satisfy boundary"));
                }
                let (left, right) = r.split_at(still_need);
                let left_measure = reference_measure(&left)?;
                let new_prefix = prefix.append(Self::singleton_measured(SeqElem::Reference(left), left_measure));
                let new_suffix = match right {
                    Some(r) => {
                        let m = reference_measure(&r)?;
                        Self::singleton_measured(SeqElem::Reference(r), m).append(suffix_rest)
                    }
                    None => suffix_rest,
                };
                Ok((new_prefix, new_suffix))
            }
        }
    }
}
