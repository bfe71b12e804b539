// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The ABI a generated step table is written against (§6): building and
//! taking apart [`Value`]s without reaching into [`MeasuredSeq`] directly.

use crate::exec::Evaluator;
use crate::seq::{MeasuredSeq, SeqElem};
use crate::value::{FetchWidth, Value};
use crate::word::{ConstructorTag, Word};

/// Wraps a plain integer as a fresh depth-0 value (§6).
///
/// # Errors
///
/// Never fails in practice; propagates [`MeasuredSeq::singleton`]'s error
/// type for uniformity with the rest of this module.
pub fn from_int(evaluator: &Evaluator, n: i64) -> crate::Result<Value> {
    let seq = MeasuredSeq::singleton(SeqElem::Word(Word::Int(n)), evaluator.degrees())?;
    let fetch_length =
        FetchWidth::with_growth_factor(evaluator.config().initial_fetch_width, evaluator.config().fetch_width_growth_factor);
    Ok(Value::new(seq, 0, fetch_length, 0))
}

/// Builds a constructor application from its already-evaluated arguments
/// (§6). The arguments must all share one depth — they came from the same
/// environment or store, so this is a caller contract, not user input.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if the arguments don't share a depth,
/// or if `ctag` was never registered in the evaluator's [`crate::word::DegreeTable`].
pub fn from_constructor(evaluator: &Evaluator, ctag: ConstructorTag, args: Vec<Value>) -> crate::Result<Value> {
    let depth = args.first().map_or(0, |v| v.depth);
    for a in &args {
        if a.depth != depth {
            return Err(crate::error::corrupt("from_constructor: arguments at mismatched depths"));
        }
    }
    let mut seq = MeasuredSeq::singleton(SeqElem::Word(Word::Constructor(ctag)), evaluator.degrees())?;
    for a in args {
        seq = seq.append(a.seq);
    }
    let fetch_length =
        FetchWidth::with_growth_factor(evaluator.config().initial_fetch_width, evaluator.config().fetch_width_growth_factor);
    Ok(Value::new(seq, depth, fetch_length, 0))
}

/// Concatenates two values at the same depth into one, e.g. building an
/// environment slot from several already-evaluated sub-values (§6).
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `a` and `b` are at different
/// depths.
pub fn appends(a: Value, b: Value) -> crate::Result<Value> {
    if a.depth != b.depth {
        return Err(crate::error::corrupt("appends: values at mismatched depths"));
    }
    Ok(Value::new(a.seq.append(b.seq), a.depth, a.fetch_length, 0))
}

/// Splits `value` into its first `n` logical values and the remainder
/// (§6), the inverse of [`appends`].
///
/// # Errors
///
/// Propagates [`MeasuredSeq::pop_n`]'s error if `value` has fewer than `n`
/// values.
pub fn splits(value: Value, n: u32) -> crate::Result<(Value, Value)> {
    let Value { seq, depth, fetch_length, .. } = value;
    let (prefix, suffix) = seq.pop_n(n)?;
    Ok((Value::new(prefix, depth, fetch_length.clone(), 0), Value::new(suffix, depth, fetch_length, 0)))
}

/// Reads off a leading integer word (§6). Does not require `value` to be
/// path-compressed: an integer word is always fully materialized, never a
/// reference, so this only inspects the sequence's front.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `value`'s front element is not an
/// integer word.
pub fn to_int(value: &Value) -> crate::Result<i64> {
    let (elem, _) = value.seq.front_exn()?;
    match elem {
        SeqElem::Word(Word::Int(n)) => Ok(n),
        _ => Err(crate::error::corrupt("to_int: expected a leading integer word")),
    }
}

/// The outcome of [`list_match`]: which of the two registered list
/// constructors a value's leading word names, with `Cons`'s two argument
/// values already split out.
pub enum ListMatch {
    Nil,
    Cons { head: Value, tail: Value },
}

/// Dispatches on a value's leading constructor word against the two tags a
/// `nil`/`cons`-shaped list type was registered under, splitting `cons`'s
/// arguments out of the tail (§6). The scrutinee must not have been path
/// compressed past its own leading word — callers that need a fetch first
/// should do so via [`crate::exec::Evaluator::begin_record`] before calling
/// this.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if the leading word isn't a
/// constructor, or names a tag that is neither `nil` nor `cons`.
pub fn list_match(value: Value, nil: ConstructorTag, cons: ConstructorTag) -> crate::Result<ListMatch> {
    let depth = value.depth;
    let fetch_length = value.fetch_length.clone();
    let (elem, rest) = value.seq.front_exn()?;
    let tag = match elem {
        SeqElem::Word(Word::Constructor(t)) => t,
        SeqElem::Word(Word::Int(_)) | SeqElem::Reference(_) => {
            return Err(crate::error::corrupt("list_match: expected a leading constructor word"))
        }
    };
    if tag == nil {
        Ok(ListMatch::Nil)
    } else if tag == cons {
        let (head_seq, tail_seq) = rest.pop_n(1)?;
        Ok(ListMatch::Cons {
            head: Value::new(head_seq, depth, fetch_length.clone(), 0),
            tail: Value::new(tail_seq, depth, fetch_length, 0),
        })
    } else {
        Err(crate::error::corrupt("list_match: constructor tag is neither nil nor cons"))
    }
}
