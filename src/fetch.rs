// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The fetcher and path compressor (component G): the machinery that
//! moves fragments of a value from one recording depth to the next, and
//! keeps values free of references the current depth could resolve
//! itself.

use crate::memo::{FetchRequest, FetchResult};
use crate::metrics::Metrics;
use crate::record::RecordState;
use crate::reference::{RefSource, Reference};
use crate::seq::{MeasuredSeq, SeqElem};
use crate::state::State;
use crate::value::{FetchWidth, Value};
use crate::word::DegreeTable;

fn value_mut<'a>(rs: &'a mut RecordState, src: RefSource) -> crate::Result<&'a mut Value> {
    match src {
        RefSource::Env(i) => rs.m.e.get_mut(i).ok_or_else(|| crate::error::corrupt("env slot out of range")),
        RefSource::Store(i) => rs.s.get_mut(i).ok_or_else(|| crate::error::corrupt("store slot out of range")),
        RefSource::Kont => Ok(&mut rs.m.k),
    }
}

fn value_ref<'a>(rs: &'a RecordState, src: RefSource) -> crate::Result<&'a Value> {
    match src {
        RefSource::Env(i) => rs.m.e.get(i).ok_or_else(|| crate::error::corrupt("env slot out of range")),
        RefSource::Store(i) => rs.s.get(i).ok_or_else(|| crate::error::corrupt("store slot out of range")),
        RefSource::Kont => Ok(&rs.m.k),
    }
}

fn single_reference(r: Reference) -> crate::Result<MeasuredSeq> {
    MeasuredSeq::singleton(SeqElem::Reference(r), &DegreeTable::new())
}

/// Inlines a reference that already points at a value recorded at the
/// *current* depth — a pure sequence substitution, no fetch. See the
/// design note on why a reference pointing at a lower (not-yet-fetched)
/// depth is instead an error here: that case belongs to [`fetch_value`].
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `reference.src` resolves to a
/// value at a depth other than `rs.m.d`.
pub fn resolve(rs: &RecordState, reference: &Reference) -> crate::Result<MeasuredSeq> {
    let target = value_ref(rs, reference.src)?;
    if target.depth != rs.m.d {
        return Err(crate::error::corrupt(
            "resolve: reference targets a depth that must go through fetch_value",
        ));
    }
    let offset = reference.offset;
    let count = u32::try_from(reference.values_count)
        .map_err(|_| crate::error::corrupt("resolve: reference has non-positive values_count"))?;
    let (_, after_offset) = target.seq.pop_n(offset)?;
    let (slice, _) = after_offset.pop_n(count)?;
    Ok(slice)
}

/// Inlines every reference in the value at `src` that [`resolve`] can
/// handle, stopping at the first reference that still points at a lower,
/// not-yet-fetched depth. Idempotent per fetch epoch (§8 P5): a value
/// whose `compressed_since` already matches `rs.f` is returned unchanged.
///
/// # Errors
///
/// Propagates structural errors from [`resolve`] or slot lookup.
pub fn path_compress_value(rs: &mut RecordState, src: RefSource) -> crate::Result<()> {
    let placeholder = Value::fresh(MeasuredSeq::empty(), 0, 1);
    let mut value = std::mem::replace(value_mut(rs, src)?, placeholder);

    if value.is_compressed(rs.f) {
        *value_mut(rs, src)? = value;
        return Ok(());
    }

    loop {
        let (prefix, suffix) = value.seq.split(|m| m.full.is_none());
        match suffix.front() {
            None => {
                value.seq = prefix;
                break;
            }
            Some((SeqElem::Word(_), _)) => {
                // Can't happen: split stopped exactly where `full` first
                // went missing, and every `Word` element is fully
                // materialized on its own.
                value.seq = prefix.append(suffix);
                break;
            }
            Some((SeqElem::Reference(r), after)) => {
                let target_depth = value_ref(rs, r.src)?.depth;
                if target_depth != rs.m.d {
                    value.seq = prefix.append(single_reference(r)?).append(after);
                    break;
                }
                let inlined = resolve(rs, &r)?;
                value.seq = prefix.append(inlined).append(after);
            }
        }
    }

    value.compressed_since = rs.f;
    *value_mut(rs, src)? = value;
    Ok(())
}

/// Moves a prefix of the value at `request.src` from depth `rs.m.d` to
/// `rs.m.d + 1` (§4.G). Returns `None` if the requested width cannot be
/// satisfied by a fully materialized prefix — this is ordinary control
/// flow, not an error (§7).
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] on any structural invariant
/// violation (wrong depth, out-of-range slot, a `pop_n` that doesn't
/// land on a value boundary).
pub fn fetch_value(
    rs: &mut RecordState,
    request: FetchRequest,
    metrics: &Metrics,
) -> crate::Result<Option<FetchResult>> {
    {
        let value = value_ref(rs, request.src)?;
        if value.depth != rs.m.d {
            return Err(crate::error::corrupt("fetch_value: value is not at the recording depth"));
        }
    }
    path_compress_value(rs, request.src)?;

    let (x, y) = {
        let value = value_ref(rs, request.src)?;
        value.seq.pop_n(request.offset)?
    };

    // Isolate the fully materialized prefix first: `full.length >=
    // word_count` is only monotonic (and so safe for a single `split`)
    // within a region with no reference, since `full` turns `None`
    // permanently at the first one rather than comparing as "too short".
    let (materialized, remainder) = y.split(|m| m.full.is_none());
    let (fetched_prefix, leftover) = materialized.split(|m| match m.full {
        Some(full) => full.length >= request.word_count,
        None => false,
    });
    let residue = leftover.append(remainder);
    let length = match fetched_prefix.measure().full {
        Some(full) => full.length,
        None => {
            metrics.failed_fetches.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Ok(None);
        }
    };
    if !residue.is_empty() && length != request.word_count {
        log::trace!("fetch_value: partial fetch of {length} words, wanted {}", request.word_count);
        metrics.failed_fetches.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        return Ok(None);
    }

    let fetch_length = {
        let value = value_ref(rs, request.src)?;
        value.fetch_length.clone()
    };
    // Successive fetches from the same origin see an exponentially
    // growing width (§4.D): grow now, before the result is built, so the
    // *next* request against this origin inherits the wider window.
    fetch_length.grow()?;
    metrics.successful_fetches.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let depth = rs.m.d + 1;

    let have_prefix = x.is_empty();
    let have_suffix = residue.is_empty();
    let transformed_x = if have_prefix {
        MeasuredSeq::empty()
    } else {
        crate::store::add_to_store(&mut rs.s, depth, x, fetch_length.clone())?
    };
    let transformed_rest = if residue.is_empty() {
        MeasuredSeq::empty()
    } else {
        crate::store::add_to_store(&mut rs.s, depth, residue, fetch_length.clone())?
    };

    let new_seq = transformed_x.append(fetched_prefix.clone()).append(transformed_rest);
    rs.f += 1;
    let new_value = Value::new(new_seq, depth, fetch_length, rs.f);
    *value_mut(rs, request.src)? = new_value;

    log::trace!("fetch_value: {length} words fetched from {:?} at offset {}", request.src, request.offset);

    Ok(Some(FetchResult { fetched: fetched_prefix, have_prefix, have_suffix }))
}

/// Rewrites a value at `depth + 1` back down to `depth`, inlining any
/// residual reference into its own depth and resetting the fetch-width
/// cell and compression watermark (§4.G, symmetric to path compression).
pub fn unshift_value(value: Value, depth: u32) -> Value {
    Value::new(value.seq, depth, FetchWidth::new(1), 0)
}

/// Rewrites a recorded inner `state`'s C/E/K back into the depth-`d - 1`
/// shape its `RecordState` parent expects. `C` is an opaque PC and
/// passes through unchanged (§4.G).
pub fn unshift_all(state: State) -> State {
    let depth = state.d.saturating_sub(1);
    let e = state.e.into_iter().map(|v| unshift_value(v, depth)).collect();
    let k = unshift_value(state.k, depth);
    State::new(state.c, e, k, depth, state.last)
}
