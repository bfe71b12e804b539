// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The CEK driver (component H): `exec_cek`, the state-manipulation
//! primitives the generated step table is built from, and the
//! `Evaluator` that owns the process-wide-in-spirit tables (§4.H, §9).

use crate::config::EvaluatorConfig;
use crate::memo::{EnterOutcome, FetchRequest, MemoNodeRef, MemoTrie, Progress, Skip};
use crate::metrics::Metrics;
use crate::record::RecordState;
use crate::seq::{MeasuredSeq, SeqElem};
use crate::state::State;
use crate::value::Value;
use crate::word::{ConstructorTag, DegreeTable};
use std::rc::Rc;

/// What a step function leaves the driver with: more work, or a final
/// result. Replaces the distilled spec's "sentinel PC or out-of-band
/// done condition" (§4.H) with an explicit alternative.
pub enum StepOutcome {
    Continue(State),
    Done(MeasuredSeq),
}

/// A single numbered transition, registered via [`Evaluator::add_exp`].
pub type StepFn = Rc<dyn Fn(&mut Evaluator, State) -> crate::Result<StepOutcome>>;

/// Owns the tables a running program needs: the step table, the
/// constructor-degree table, the memo trie, and the explicit recording
/// stack (§4.E, §9's note on these being per-instance, not statics).
pub struct Evaluator {
    degrees: DegreeTable,
    exp_table: Vec<StepFn>,
    memo: MemoTrie,
    stack: Vec<RecordState>,
    config: EvaluatorConfig,
    metrics: Metrics,
    frozen: bool,
}

impl Evaluator {
    #[must_use]
    pub fn new(config: EvaluatorConfig) -> Self {
        let memo = MemoTrie::with_capacity(config.initial_pc_capacity);
        Self {
            degrees: DegreeTable::new(),
            exp_table: Vec::new(),
            memo,
            stack: Vec::new(),
            config,
            metrics: Metrics::default(),
            frozen: false,
        }
    }

    /// Appends a step function and returns its PC.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Frozen`] if called after [`Self::exec_cek`]
    /// has run once.
    pub fn add_exp(&mut self, step: StepFn) -> crate::Result<u32> {
        if self.frozen {
            return Err(crate::Error::Frozen);
        }
        self.exp_table.push(step);
        Ok(u32::try_from(self.exp_table.len() - 1).unwrap_or(u32::MAX))
    }

    /// Registers the next constructor tag's degree (§6, R2).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Frozen`] if called after first execution,
    /// or propagates [`DegreeTable::set_constructor_degree`]'s error if
    /// `ctag` isn't the next dense tag.
    pub fn set_constructor_degree(&mut self, ctag: ConstructorTag, degree: i32) -> crate::Result<()> {
        if self.frozen {
            return Err(crate::Error::Frozen);
        }
        self.degrees.set_constructor_degree(ctag, degree)
    }

    #[must_use]
    pub fn degrees(&self) -> &DegreeTable {
        &self.degrees
    }

    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// A content fingerprint of the registered step count and constructor
    /// degrees (§10). Two evaluators built by the same code generator run
    /// against the same program fingerprint; a caller persisting a memo
    /// trie across process runs (outside the scope of this crate, which
    /// only keeps it in memory) can use this to detect a stale trie from
    /// before a rebuild.
    #[must_use]
    pub fn program_fingerprint(&self) -> u64 {
        let mut bytes = Vec::with_capacity(4 + self.degrees.len() * 4);
        bytes.extend_from_slice(&u32::try_from(self.exp_table.len()).unwrap_or(u32::MAX).to_le_bytes());
        for i in 0..self.degrees.len() {
            let ctag = ConstructorTag(u32::try_from(i).unwrap_or(u32::MAX));
            if let Some(degree) = self.degrees.degree(ctag) {
                bytes.extend_from_slice(&degree.to_le_bytes());
            }
        }
        xxhash_rust::xxh3::xxh3_64(&bytes)
    }

    /// Drops the memo and the recording stack, keeping the registered
    /// step/degree tables — a fresh memo for a second run of the same
    /// program within the same process (§10, "supplemented features").
    pub fn reset(&mut self) {
        self.memo = MemoTrie::with_capacity(self.config.initial_pc_capacity);
        self.stack.clear();
        self.metrics = Metrics::default();
    }

    /// Runs the step table starting at `pc` until a step function
    /// returns [`StepOutcome::Done`], returning the final sequence.
    ///
    /// Freezes the step/degree tables on first call: registering new
    /// steps or constructor degrees afterward is an error, matching the
    /// teacher crate's manifest-freeze-after-open pattern.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if `pc` is out of range or a
    /// step function reports a structural violation.
    pub fn exec_cek(&mut self, pc: u32, env: Vec<Value>, k: Value) -> crate::Result<MeasuredSeq> {
        self.frozen = true;
        let mut state = State::new(pc, env, k, 0, None);
        loop {
            let idx = state.c as usize;
            let step = self
                .exp_table
                .get(idx)
                .cloned()
                .ok_or_else(|| crate::error::corrupt("pc out of range of the step table"))?;
            log::trace!("exec_cek: pc={} depth={}", state.c, state.d);
            match step(self, state)? {
                StepOutcome::Continue(next) => state = next,
                StepOutcome::Done(result) => return Ok(result),
            }
        }
    }

    /// Attempts to begin or continue recording at `pc` for `state`,
    /// pushing a new [`RecordState`] onto the stack when entry succeeds.
    /// Step functions call this at the two suspension points named in
    /// §4.H: before consuming the head of `k`, and before matching a
    /// scrutinee.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::memo::enter_new_memo`]'s errors.
    pub fn begin_record(&mut self, state: State, matched: bool) -> crate::Result<State> {
        let pc = state.c as usize;
        let node = self.memo.root(pc);
        match crate::memo::enter_new_memo(state, node, matched, &self.metrics)? {
            EnterOutcome::Unchanged(s) => {
                self.metrics.memo_passthroughs.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Ok(s)
            }
            EnterOutcome::Entered { child, record } => {
                self.metrics.new_memo_entries.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.stack.push(record);
                Ok(child)
            }
        }
    }

    /// Commits the active recording to `request`, see
    /// [`crate::memo::request_fetch`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if there is no active recording.
    pub fn request_fetch(&self, request: FetchRequest, progress: Progress) -> crate::Result<MemoNodeRef> {
        let rs = self
            .stack
            .last()
            .ok_or_else(|| crate::error::corrupt("request_fetch with no active recording"))?;
        crate::memo::request_fetch(rs, request, progress)
    }

    /// Freezes the active recording as a skip to `outcome`, see
    /// [`crate::memo::commit_done`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if there is no active recording.
    pub fn commit_done(&self, skip: Skip) -> crate::Result<()> {
        let rs = self
            .stack
            .last()
            .ok_or_else(|| crate::error::corrupt("commit_done with no active recording"))?;
        crate::memo::commit_done(rs, skip)
    }

    /// Completes the active recording and folds its result back into the
    /// enclosing depth via `unshift_all` (§4.F, "Completion").
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Corrupt`] if there is no active recording
    /// to end.
    pub fn end_record(&mut self, state: State) -> crate::Result<State> {
        if self.stack.pop().is_none() {
            return Err(crate::error::corrupt("end_record with no active recording"));
        }
        Ok(crate::fetch::unshift_all(state))
    }
}

/// Pushes `v` onto the environment (§4.H state primitives).
pub fn push_env(e: &mut Vec<Value>, v: Value) {
    e.push(v);
}

/// Pops the most recently pushed environment slot.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if the environment is empty.
pub fn pop_env(e: &mut Vec<Value>) -> crate::Result<Value> {
    e.pop().ok_or_else(|| crate::error::corrupt("pop_env on an empty environment"))
}

/// Asserts the environment has exactly `expected` slots.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] on a mismatch.
pub fn assert_env_length(e: &[Value], expected: usize) -> crate::Result<()> {
    if e.len() != expected {
        return Err(crate::error::corrupt("environment length assertion failed"));
    }
    Ok(())
}

/// Drops the top `n` environment slots.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `n` exceeds the environment's
/// length.
pub fn drop_n(e: &mut Vec<Value>, n: usize) -> crate::Result<()> {
    if n > e.len() {
        return Err(crate::error::corrupt("drop_n: n exceeds environment length"));
    }
    e.truncate(e.len() - n);
    Ok(())
}

/// Keeps only the last `n` environment slots, discarding the rest.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `n` exceeds the environment's
/// length.
pub fn env_keep_last_n(e: &mut Vec<Value>, n: usize) -> crate::Result<()> {
    if n > e.len() {
        return Err(crate::error::corrupt("env_keep_last_n: n exceeds environment length"));
    }
    *e = e.split_off(e.len() - n);
    Ok(())
}

/// Splits off the last `n` environment slots to return them to a caller.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `n` exceeds the environment's
/// length.
pub fn return_n(e: &mut Vec<Value>, n: usize) -> crate::Result<Vec<Value>> {
    if n > e.len() {
        return Err(crate::error::corrupt("return_n: n exceeds environment length"));
    }
    Ok(e.split_off(e.len() - n))
}

/// Replaces the environment wholesale, e.g. after a call returns.
pub fn restore_env(e: &mut Vec<Value>, saved: Vec<Value>) {
    *e = saved;
}

/// Peeks the next kontinuation frame: the leading [`SeqElem`] of `k`'s
/// sequence and the remaining tail, without consuming `k` itself.
///
/// # Errors
///
/// Returns [`crate::Error::Corrupt`] if `k`'s sequence is empty.
pub fn get_next_cont(k: &Value) -> crate::Result<(SeqElem, MeasuredSeq)> {
    k.seq.front().ok_or_else(|| crate::error::corrupt("get_next_cont on an empty kontinuation"))
}
