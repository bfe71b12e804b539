use ant::conv::{self, ListMatch};
use ant::exec::{Evaluator, StepFn, StepOutcome};
use ant::state::State;
use ant::value::Value;
use ant::word::ConstructorTag;
use ant::EvaluatorConfig;
use std::rc::Rc;

pub const NIL: ConstructorTag = ConstructorTag(0);
pub const CONS: ConstructorTag = ConstructorTag(1);

/// A two-instruction step table computing `map (+1)` over a `nil`/`cons`
/// list, by hand rather than through any code generator.
///
/// PC 0 ("match") scrutinizes `env[0]`, the still-to-process suffix of the
/// input list, against `nil`/`cons`. On `cons`, it increments the head and
/// pushes it onto a pending-heads stack carried in the rest of `env`
/// before looping back to PC 0 on the tail. On `nil`, it seeds `env[0]`
/// with an empty result list and falls through to PC 1.
///
/// PC 1 ("unwind") pops one pending head at a time and conses it onto the
/// accumulated result, terminating once no pending heads remain.
pub fn build_list_incr_evaluator() -> ant::Result<Evaluator> {
    let mut evaluator = EvaluatorConfig::new().build();
    evaluator.set_constructor_degree(NIL, 1)?;
    evaluator.set_constructor_degree(CONS, -1)?;

    let match_step: StepFn = Rc::new(|evaluator: &mut Evaluator, state: State| {
        let State { e, k, d, last, .. } = state;
        let mut rest = e;
        let target = rest.remove(0);
        match conv::list_match(target, NIL, CONS)? {
            ListMatch::Nil => {
                let result = conv::from_constructor(evaluator, NIL, Vec::new())?;
                let mut env = vec![result];
                env.extend(rest);
                Ok(StepOutcome::Continue(State::new(1, env, k, d, last)))
            }
            ListMatch::Cons { head, tail } => {
                let n = conv::to_int(&head)?;
                let incremented = conv::from_int(evaluator, n + 1)?;
                let mut env = vec![tail, incremented];
                env.extend(rest);
                Ok(StepOutcome::Continue(State::new(0, env, k, d, last)))
            }
        }
    });

    let unwind_step: StepFn = Rc::new(|evaluator: &mut Evaluator, state: State| {
        let State { e, k, d, last, .. } = state;
        let mut rest = e;
        let result = rest.remove(0);
        if rest.is_empty() {
            return Ok(StepOutcome::Done(result.seq));
        }
        let head = rest.remove(0);
        let new_result = conv::from_constructor(evaluator, CONS, vec![head, result])?;
        let mut env = vec![new_result];
        env.extend(rest);
        Ok(StepOutcome::Continue(State::new(1, env, k, d, last)))
    });

    assert_eq!(evaluator.add_exp(match_step)?, 0);
    assert_eq!(evaluator.add_exp(unwind_step)?, 1);
    Ok(evaluator)
}

pub fn build_list(evaluator: &Evaluator, items: &[i64]) -> ant::Result<Value> {
    let mut acc = conv::from_constructor(evaluator, NIL, Vec::new())?;
    for &n in items.iter().rev() {
        let head = conv::from_int(evaluator, n)?;
        acc = conv::from_constructor(evaluator, CONS, vec![head, acc])?;
    }
    Ok(acc)
}

pub fn collect_list(mut value: Value) -> ant::Result<Vec<i64>> {
    let mut out = Vec::new();
    loop {
        match conv::list_match(value, NIL, CONS)? {
            ListMatch::Nil => break,
            ListMatch::Cons { head, tail } => {
                out.push(conv::to_int(&head)?);
                value = tail;
            }
        }
    }
    Ok(out)
}
