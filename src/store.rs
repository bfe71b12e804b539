// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The append-only per-depth store of [`Value`]s, and `add_to_store`, the
//! only way a fragment of one value becomes addressable from another
//! (component D).

use crate::reference::{RefSource, Reference};
use crate::seq::{MeasuredSeq, SeqElem};
use crate::value::{FetchWidth, Value};

/// An append-only dynamic array of [`Value`], indexed by `S i`. Lives
/// exactly as long as the [`crate::record::RecordState`] that owns it
/// (§4.E).
#[derive(Debug, Default)]
pub struct Store {
    values: Vec<Value>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Value> {
        self.values.get_mut(i)
    }

    /// Appends `value` and returns the slot index it now lives at.
    fn push(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }
}

/// Appends `seq` to `store` as a fresh depth-`depth` value sharing
/// `fetch_length` with the fragment it was split from, and returns a
/// one-element sequence containing a [`Reference`] to the whole of that
/// new value (§4.D).
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `seq`'s degree does not fit a
/// reference's `values_count` (it always does for well-formed fragments;
/// this only guards against a caller passing a degenerate sequence).
pub fn add_to_store(
    store: &mut Store,
    depth: u32,
    seq: MeasuredSeq,
    fetch_length: FetchWidth,
) -> crate::Result<MeasuredSeq> {
    let values_count = seq.measure().degree;
    let value = Value::new(seq, depth, fetch_length, 0);
    let slot = store.push(value);
    let reference = Reference::new(RefSource::Store(slot), 0, values_count);
    MeasuredSeq::singleton(SeqElem::Reference(reference), &crate::word::DegreeTable::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::{ConstructorTag, DegreeTable, Word};
    use test_log::test;

    fn degrees() -> DegreeTable {
        let mut t = DegreeTable::new();
        t.set_constructor_degree(ConstructorTag(0), 1).unwrap(); // nil
        t
    }

    #[test]
    fn add_to_store_returns_whole_value_reference() {
        let mut store = Store::new();
        let d = degrees();
        let seq = MeasuredSeq::singleton(SeqElem::Word(Word::Constructor(ConstructorTag(0))), &d).unwrap();
        let degree = seq.measure().degree;

        let out = add_to_store(&mut store, 3, seq, FetchWidth::new(1)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().depth, 3);
        assert_eq!(store.get(0).unwrap().compressed_since, 0);

        let (elem, rest) = out.front().unwrap();
        assert!(rest.is_empty());
        match elem {
            SeqElem::Reference(r) => {
                assert_eq!(r.src, RefSource::Store(0));
                assert_eq!(r.offset, 0);
                assert_eq!(r.values_count, degree);
            }
            SeqElem::Word(_) => panic!("expected reference"),
        }
    }

    #[test]
    fn fetch_length_is_shared_with_stored_fragment() {
        let mut store = Store::new();
        let fw = FetchWidth::new(4);
        let seq = MeasuredSeq::empty();
        add_to_store(&mut store, 0, seq, fw.clone()).unwrap();
        fw.grow().unwrap();
        assert_eq!(store.get(0).unwrap().fetch_length.get(), 8);
    }

    /// P4 (reference accounting): the reference handed back always stands
    /// for exactly the degree of the fragment it replaced, whatever that
    /// fragment's shape.
    fn prop_stored_reference_values_count_matches_degree(values: Vec<i64>) -> bool {
        let d = DegreeTable::new();
        let seq = values.iter().fold(MeasuredSeq::empty(), |acc, &n| {
            acc.append(MeasuredSeq::singleton(SeqElem::Word(Word::Int(n)), &d).unwrap())
        });
        let degree = seq.measure().degree;
        let mut store = Store::new();
        let Ok(out) = add_to_store(&mut store, 1, seq, FetchWidth::new(1)) else { return false };
        let Some((SeqElem::Reference(r), rest)) = out.front() else { return false };
        rest.is_empty() && r.src == RefSource::Store(0) && r.offset == 0 && r.values_count == degree
    }

    #[test]
    fn quickcheck_stored_reference_values_count_matches_degree() {
        quickcheck::quickcheck(prop_stored_reference_values_count_matches_degree as fn(Vec<i64>) -> bool);
    }
}
