// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The memo trie and the entry protocol that drives it (component F).
//!
//! Each PC owns one trie, rooted at a [`MemoNode::Root`]. Observed fetch
//! results grow the trie one `Need -> child` edge at a time; a `Done`
//! node is a frozen skip that lifts a caller straight to the outcome of
//! a previously recorded subcomputation.

use crate::metrics::Metrics;
use crate::record::{RecordContext, RecordState};
use crate::reference::Reference;
use crate::seq::MeasuredSeq;
use crate::state::State;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// What [`crate::fetch::fetch_value`] was asked to bring across: a
/// sub-range of one source, by word count rather than value count (the
/// request may land mid-value; §4.G).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub src: crate::reference::RefSource,
    pub offset: u32,
    pub word_count: u32,
}

/// What a successful fetch produced.
#[derive(Clone, Debug)]
pub struct FetchResult {
    pub fetched: MeasuredSeq,
    pub have_prefix: bool,
    pub have_suffix: bool,
}

/// The hashable projection of a [`FetchResult`] used as `Need.lookup`'s
/// key — content-addressed by the fetched fragment's monoidal hash, not
/// by its structure, so two syntactically different but hash-equal
/// fetches (impossible in practice outside a collision, but not ruled
/// out by the type) are treated as the same trie edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub length: u32,
    pub hash: crate::hash::WordHash,
    pub have_prefix: bool,
    pub have_suffix: bool,
}

impl FetchKey {
    /// Builds the lookup key for a [`FetchResult`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if `fetched` is not fully
    /// materialized — every successful fetch produces a fully
    /// materialized fragment, so this only guards a caller's mistake.
    pub fn of(result: &FetchResult) -> crate::Result<Self> {
        let full = result
            .fetched
            .measure()
            .full
            .ok_or_else(|| crate::error::corrupt("fetch result is not fully materialized"))?;
        Ok(Self {
            length: full.length,
            hash: full.hash,
            have_prefix: result.have_prefix,
            have_suffix: result.have_suffix,
        })
    }
}

/// The frozen closures a `Need` node uses to descend into (`enter`) and
/// return from (`exit`) its recorded subcomputation, capturing the
/// parent state's C/E/K at the point recording began.
///
/// Grounded on the design note's observation that the source simulates
/// this with a recursive in-place mutation; here it is two boxed `Fn`
/// closures so a `Need` can be entered more than once (once per distinct
/// observed `FetchResult`).
#[derive(Clone)]
pub struct Progress {
    pub enter: Rc<dyn Fn(&RecordState) -> crate::Result<State>>,
    pub exit: Rc<dyn Fn(State) -> crate::Result<State>>,
}

/// Lifts a caller's [`RecordState`] directly to a previously recorded
/// outcome, skipping recomputation entirely.
pub type Skip = Rc<dyn Fn(&RecordState) -> crate::Result<State>>;

/// A node in the memo trie (§3).
pub enum MemoNode {
    Root,
    /// Under active construction; visiting it again is reentrance and is
    /// always a bug (the same recording can't suspend on itself).
    BlackHole,
    Need { request: FetchRequest, lookup: FxHashMap<FetchKey, MemoNodeRef>, progress: Progress },
    Done { skip: Skip },
}

pub type MemoNodeRef = Rc<RefCell<MemoNode>>;

/// The PC-indexed forest of memo tries.
pub struct MemoTrie {
    roots: Vec<MemoNodeRef>,
}

impl MemoTrie {
    #[must_use]
    pub fn with_capacity(pc_capacity: usize) -> Self {
        let roots = (0..pc_capacity).map(|_| Rc::new(RefCell::new(MemoNode::Root))).collect();
        Self { roots }
    }

    /// Returns the root memo node for `pc`, growing the trie if `pc` has
    /// not been recorded against before.
    pub fn root(&mut self, pc: usize) -> MemoNodeRef {
        if pc >= self.roots.len() {
            self.roots.resize_with(pc + 1, || Rc::new(RefCell::new(MemoNode::Root)));
        }
        self.roots[pc].clone()
    }
}

/// The result of [`enter_new_memo`]: either the caller's state was
/// returned unchanged (nothing to record, or a `Done` skip was applied),
/// or a fresh depth was entered and its [`RecordState`] must be pushed.
pub enum EnterOutcome {
    Unchanged(State),
    Entered { child: State, record: RecordState },
}

/// Lifts every value in `state` to `state.d + 1` by replacing each with a
/// whole-value [`Reference`] back to itself at the current depth (§4.F:
/// "every value becomes a single `Reference` back to the parent").
fn lift_state(state: &State) -> crate::Result<State> {
    use crate::reference::RefSource;
    use crate::seq::SeqElem;
    use crate::value::Value;

    let degrees = crate::word::DegreeTable::new();
    let lift = |src: RefSource, depth: u32, fetch_len: u32| -> crate::Result<Value> {
        let seq = MeasuredSeq::singleton(SeqElem::Reference(Reference::new(src, 0, 1)), &degrees)?;
        Ok(Value::fresh(seq, depth, fetch_len))
    };

    let mut e = Vec::with_capacity(state.e.len());
    for (i, _) in state.e.iter().enumerate() {
        e.push(lift(RefSource::Env(i), state.d + 1, 1)?);
    }
    let k = lift(RefSource::Kont, state.d + 1, 1)?;
    Ok(State::new(state.c, e, k, state.d + 1, None))
}

/// Traverses the memo trie at `node` for `state`, per §4.F.
///
/// `matched` indicates whether the caller wants to commit to recording
/// at this slot (e.g. a step function that opted in via a
/// `begin_record`-style call) — see the design note on why an unmatched
/// `Root` passes the state through unchanged rather than speculatively
/// expanding.
///
/// Builds one [`RecordState`] for the whole traversal: chasing a chain
/// of already-known `Need` edges (no depth change, just fetches against
/// the same store) stays within that single `RecordState`, and only the
/// node where the chain finally bottoms out — a `Root`, a fresh `Need`
/// child, or a fetch miss — actually lifts to a new depth and hands the
/// accumulated `RecordState` back to the caller to push.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `node` is a [`MemoNode::BlackHole`]
/// (reentrance into an in-progress recording), or propagates
/// [`crate::fetch::fetch_value`]'s errors.
pub fn enter_new_memo(
    state: State,
    node: MemoNodeRef,
    matched: bool,
    metrics: &Metrics,
) -> crate::Result<EnterOutcome> {
    let mut rs = RecordState::new(state);
    dispatch(&mut rs, node, matched, metrics)
}

/// The part of [`enter_new_memo`] that recurses without necessarily
/// lifting depth: shared by the initial call and by `Need` chains.
fn dispatch(rs: &mut RecordState, node: MemoNodeRef, matched: bool, metrics: &Metrics) -> crate::Result<EnterOutcome> {
    let kind = node.borrow().kind();
    match kind {
        MemoKind::Done => {
            let MemoNode::Done { skip } = &*node.borrow() else { unreachable!() };
            let out = skip(rs)?;
            metrics.memo_hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(EnterOutcome::Unchanged(out))
        }
        MemoKind::BlackHole => {
            metrics.black_hole_traps.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            debug_assert!(false, "reentrance into an in-progress memo entry");
            Err(crate::error::corrupt("reentrance into an in-progress memo entry"))
        }
        MemoKind::Root => {
            if !matched {
                let taken = std::mem::replace(&mut rs.m, empty_state_placeholder());
                return Ok(EnterOutcome::Unchanged(taken));
            }
            *node.borrow_mut() = MemoNode::BlackHole;
            rs.r = RecordContext::Evaluating(node);
            enter_here(rs)
        }
        MemoKind::Need => {
            let request = {
                let borrowed = node.borrow();
                let MemoNode::Need { request, .. } = &*borrowed else { unreachable!() };
                *request
            };
            match crate::fetch::fetch_value(rs, request, metrics)? {
                Some(fr) => {
                    let key = FetchKey::of(&fr)?;
                    let existing = {
                        let borrowed = node.borrow();
                        let MemoNode::Need { lookup, .. } = &*borrowed else { unreachable!() };
                        lookup.get(&key).cloned()
                    };
                    match existing {
                        // An already-observed `FetchResult`: the spec's
                        // §4.F "recurse into child with matched=true",
                        // regardless of what the caller originally asked
                        // for — the fetch itself is the commitment now.
                        Some(child) => dispatch(rs, child, true, metrics),
                        None => {
                            let progress = {
                                let borrowed = node.borrow();
                                let MemoNode::Need { progress, .. } = &*borrowed else { unreachable!() };
                                progress.clone()
                            };
                            let fresh = Rc::new(RefCell::new(MemoNode::BlackHole));
                            {
                                let mut borrowed = node.borrow_mut();
                                if let MemoNode::Need { lookup, .. } = &mut *borrowed {
                                    lookup.insert(key, fresh.clone());
                                }
                            }
                            rs.r = RecordContext::Evaluating(fresh);
                            let child = (progress.enter)(rs)?;
                            Ok(enter_with(rs, child))
                        }
                    }
                }
                None => {
                    if matched {
                        rs.r = RecordContext::Reentrance(node);
                        enter_here(rs)
                    } else {
                        let taken = std::mem::replace(&mut rs.m, empty_state_placeholder());
                        Ok(EnterOutcome::Unchanged(taken))
                    }
                }
            }
        }
    }
}

/// Commits the active recording to `request`: called by a step function,
/// while `rs.r` is `Evaluating`/`Reentrance`, once it has decided which
/// fragment it needs fetched before it can continue (§4.F, "growing the
/// trie"). Turns the current `BlackHole` into a fresh `Need`, or, if this
/// PC already committed to the same request on an earlier pass, returns
/// the existing node unchanged so its `lookup` table keeps accumulating.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if there is no active recording, or
/// if the node already committed to a *different* request (a code
/// generator bug: the same PC must always ask for the same shape of
/// fetch).
pub fn request_fetch(rs: &RecordState, request: FetchRequest, progress: Progress) -> crate::Result<MemoNodeRef> {
    let node = match &rs.r {
        RecordContext::Evaluating(n) | RecordContext::Reentrance(n) => n.clone(),
        RecordContext::Building => return Err(crate::error::corrupt("request_fetch outside an active recording")),
    };
    {
        let mut borrowed = node.borrow_mut();
        match &*borrowed {
            MemoNode::Need { request: existing, .. } if *existing == request => {}
            MemoNode::BlackHole => {
                *borrowed = MemoNode::Need { request, lookup: FxHashMap::default(), progress };
            }
            _ => return Err(crate::error::corrupt("request_fetch: node already committed to a different request")),
        }
    }
    Ok(node)
}

/// Freezes the active recording as a memoized skip to `outcome`: called by
/// a step function once it reaches a terminal point for this PC without
/// needing any further fetch (§4.F, "Done").
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if there is no active recording.
pub fn commit_done(rs: &RecordState, skip: Skip) -> crate::Result<()> {
    let node = match &rs.r {
        RecordContext::Evaluating(n) | RecordContext::Reentrance(n) => n.clone(),
        RecordContext::Building => return Err(crate::error::corrupt("commit_done outside an active recording")),
    };
    *node.borrow_mut() = MemoNode::Done { skip };
    Ok(())
}

/// Lifts `rs.m` to a new recording depth and hands `rs` itself back as
/// the record to push, per "`BlackHole`/`Reentrance` ... still enter".
fn enter_here(rs: &mut RecordState) -> crate::Result<EnterOutcome> {
    let child = lift_state(&rs.m)?;
    Ok(enter_with(rs, child))
}

/// Takes `rs`'s accumulated recording out as the `RecordState` to push,
/// pairing it with an already-computed `child` state. Shared by the two
/// ways a trie traversal bottoms out into a fresh depth: lifting the
/// caller's own state (`enter_here`) and replaying a `Need`'s captured
/// `progress.enter` (the `dispatch` miss branch).
fn enter_with(rs: &mut RecordState, child: State) -> EnterOutcome {
    let taken = std::mem::replace(rs, RecordState::new(empty_state_placeholder()));
    EnterOutcome::Entered { child, record: taken }
}

fn empty_state_placeholder() -> State {
    use crate::seq::MeasuredSeq;
    use crate::value::Value;
    State::new(0, Vec::new(), Value::fresh(MeasuredSeq::empty(), 0, 1), 0, None)
}

enum MemoKind {
    Root,
    BlackHole,
    Need,
    Done,
}

impl MemoNode {
    fn kind(&self) -> MemoKind {
        match self {
            MemoNode::Root => MemoKind::Root,
            MemoNode::BlackHole => MemoKind::BlackHole,
            MemoNode::Need { .. } => MemoKind::Need,
            MemoNode::Done { .. } => MemoKind::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::WordHash;
    use crate::value::Value;
    use test_log::test;

    #[test]
    fn trie_grows_on_demand() {
        let mut trie = MemoTrie::with_capacity(2);
        assert!(matches!(*trie.root(0).borrow(), MemoNode::Root));
        assert!(matches!(*trie.root(5).borrow(), MemoNode::Root));
    }

    #[test]
    fn unmatched_root_passes_state_through() {
        let k = Value::fresh(MeasuredSeq::empty(), 0, 1);
        let state = State::new(7, Vec::new(), k, 0, None);
        let node = Rc::new(RefCell::new(MemoNode::Root));
        let metrics = Metrics::default();
        let outcome = enter_new_memo(state, node, false, &metrics).unwrap();
        match outcome {
            EnterOutcome::Unchanged(s) => assert_eq!(s.c, 7),
            EnterOutcome::Entered { .. } => panic!("unmatched Root must not enter"),
        }
        assert_eq!(metrics.memo_passthroughs(), 0); // dispatch doesn't self-count; begin_record does
    }

    #[test]
    fn matched_root_lifts_and_flips_to_blackhole() {
        let k = Value::fresh(MeasuredSeq::empty(), 0, 1);
        let state = State::new(7, Vec::new(), k, 0, None);
        let node = Rc::new(RefCell::new(MemoNode::Root));
        let outcome = enter_new_memo(state, node.clone(), true, &Metrics::default()).unwrap();
        assert!(matches!(*node.borrow(), MemoNode::BlackHole));
        match outcome {
            EnterOutcome::Entered { child, record } => {
                assert_eq!(child.d, 1);
                assert_eq!(record.m.d, 0);
            }
            EnterOutcome::Unchanged(_) => panic!("matched Root must enter"),
        }
    }

    #[test]
    fn blackhole_reentry_is_fatal_and_counted() {
        let k = Value::fresh(MeasuredSeq::empty(), 0, 1);
        let state = State::new(0, Vec::new(), k, 0, None);
        let node = Rc::new(RefCell::new(MemoNode::BlackHole));
        let metrics = Metrics::default();
        assert!(enter_new_memo(state, node, true, &metrics).is_err());
        assert_eq!(metrics.black_hole_traps(), 1);
    }

    #[test]
    fn done_node_runs_skip_and_counts_a_memo_hit() {
        let k = Value::fresh(MeasuredSeq::empty(), 0, 1);
        let state = State::new(3, Vec::new(), k, 0, None);
        let skip: Skip = Rc::new(|_rs: &RecordState| {
            Ok(State::new(99, Vec::new(), Value::fresh(MeasuredSeq::empty(), 0, 1), 0, None))
        });
        let node = Rc::new(RefCell::new(MemoNode::Done { skip }));
        let metrics = Metrics::default();
        match enter_new_memo(state, node, true, &metrics).unwrap() {
            EnterOutcome::Unchanged(s) => assert_eq!(s.c, 99),
            EnterOutcome::Entered { .. } => panic!("Done must not enter"),
        }
        assert_eq!(metrics.memo_hits(), 1);
    }

    /// Builds a `Need` node whose `progress.enter` just lifts the incoming
    /// `RecordState`'s own state to depth+1, mirroring what a real
    /// step-table-captured closure does (§4.F).
    fn need_node(request: FetchRequest) -> MemoNodeRef {
        let progress = Progress {
            enter: Rc::new(|rs: &RecordState| lift_state(&rs.m)),
            exit: Rc::new(Ok),
        };
        Rc::new(RefCell::new(MemoNode::Need { request, lookup: FxHashMap::default(), progress }))
    }

    fn int_kont(n: i64) -> Value {
        let degrees = crate::word::DegreeTable::new();
        let seq = MeasuredSeq::singleton(crate::seq::SeqElem::Word(crate::word::Word::Int(n)), &degrees).unwrap();
        Value::fresh(seq, 0, 1)
    }

    #[test]
    fn need_miss_enters_via_progress_enter_instead_of_erroring() {
        let k = int_kont(42);
        let state = State::new(0, Vec::new(), k, 0, None);
        let request = FetchRequest { src: crate::reference::RefSource::Kont, offset: 0, word_count: 1 };
        let node = need_node(request);
        let metrics = Metrics::default();

        let outcome = enter_new_memo(state, node.clone(), true, &metrics).unwrap();
        match outcome {
            EnterOutcome::Entered { child, .. } => assert_eq!(child.d, 1),
            EnterOutcome::Unchanged(_) => panic!("a fresh FetchResult must enter, not pass through"),
        }
        assert_eq!(metrics.new_memo_entries.load(std::sync::atomic::Ordering::Relaxed), 0); // begin_record counts this, not dispatch
        let MemoNode::Need { lookup, .. } = &*node.borrow() else { panic!("node must still be a Need") };
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn need_hit_recurses_with_matched_forced_true() {
        // Learn the exact `FetchKey` a fetch of a lone `Int(7)` kontinuation
        // produces, the same way a first pass through this `Need` would.
        let probe_state = State::new(0, Vec::new(), int_kont(7), 0, None);
        let mut probe_rs = RecordState::new(probe_state);
        let request = FetchRequest { src: crate::reference::RefSource::Kont, offset: 0, word_count: 1 };
        let fr = crate::fetch::fetch_value(&mut probe_rs, request, &Metrics::default()).unwrap().unwrap();
        let key = FetchKey::of(&fr).unwrap();

        // Pre-populate `lookup` with that key pointing at a `Root`, as if a
        // prior pass had observed this exact fetch result but never
        // committed to recording past it.
        let mut lookup = FxHashMap::default();
        let root_child = Rc::new(RefCell::new(MemoNode::Root));
        lookup.insert(key, root_child);
        let progress = Progress { enter: Rc::new(|rs: &RecordState| lift_state(&rs.m)), exit: Rc::new(Ok) };
        let node = Rc::new(RefCell::new(MemoNode::Need { request, lookup, progress }));

        // The caller itself didn't ask to match, but a lookup hit must
        // still force matched=true on the child: a `Root` child recursed
        // into with matched=false would merely pass through.
        let state = State::new(0, Vec::new(), int_kont(7), 0, None);
        let outcome = enter_new_memo(state, node, false, &Metrics::default()).unwrap();
        match outcome {
            EnterOutcome::Entered { child, .. } => assert_eq!(child.d, 1),
            EnterOutcome::Unchanged(_) => panic!("a lookup hit must force matched=true on the child"),
        }
    }

    #[test]
    fn request_fetch_then_commit_done_round_trip_through_a_record_state() {
        let state = State::new(0, Vec::new(), int_kont(5), 0, None);
        let mut rs = RecordState::new(state);
        rs.r = RecordContext::Evaluating(Rc::new(RefCell::new(MemoNode::BlackHole)));

        let request = FetchRequest { src: crate::reference::RefSource::Kont, offset: 0, word_count: 1 };
        let progress = Progress { enter: Rc::new(|rs: &RecordState| lift_state(&rs.m)), exit: Rc::new(Ok) };
        let node = request_fetch(&rs, request, progress).unwrap();
        assert!(matches!(*node.borrow(), MemoNode::Need { .. }));

        // A second commitment to the same request on the same node is a
        // no-op, not an error: it returns the node already there.
        let progress2 = Progress { enter: Rc::new(|rs: &RecordState| lift_state(&rs.m)), exit: Rc::new(Ok) };
        let node2 = request_fetch(&rs, request, progress2).unwrap();
        assert!(Rc::ptr_eq(&node, &node2));

        let skip: Skip = Rc::new(|_rs: &RecordState| Ok(State::new(1, Vec::new(), int_kont(9), 0, None)));
        commit_done(&rs, skip).unwrap();
        assert!(matches!(*node.borrow(), MemoNode::Done { .. }));
    }

    #[test]
    fn request_fetch_outside_a_recording_errors() {
        let state = State::new(0, Vec::new(), int_kont(5), 0, None);
        let rs = RecordState::new(state);
        let request = FetchRequest { src: crate::reference::RefSource::Kont, offset: 0, word_count: 1 };
        let progress = Progress { enter: Rc::new(|rs: &RecordState| lift_state(&rs.m)), exit: Rc::new(Ok) };
        assert!(request_fetch(&rs, request, progress).is_err());
    }

    #[test]
    fn fetch_key_of_empty_fragment() {
        let result = FetchResult { fetched: MeasuredSeq::empty(), have_prefix: true, have_suffix: true };
        assert_eq!(
            FetchKey::of(&result).unwrap(),
            FetchKey { length: 0, hash: WordHash::identity(), have_prefix: true, have_suffix: true }
        );
    }

    #[test]
    fn fetch_key_rejects_non_materialized_fragment() {
        use crate::reference::{RefSource, Reference};
        use crate::seq::SeqElem;
        use crate::word::DegreeTable;

        let r = Reference::new(RefSource::Store(0), 0, 1);
        let fetched = MeasuredSeq::singleton(SeqElem::Reference(r), &DegreeTable::new()).unwrap();
        let result = FetchResult { fetched, have_prefix: true, have_suffix: true };
        assert!(FetchKey::of(&result).is_err());
    }
}
