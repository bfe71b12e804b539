use ant::value::Value;
use ant::{EvaluatorConfig, MeasuredSeq, State};
use test_log::test;

fn empty_state(pc: u32) -> State {
    State::new(pc, Vec::new(), Value::fresh(MeasuredSeq::empty(), 0, 1), 0, None)
}

#[test]
fn matched_entry_lifts_depth_and_counts_as_a_new_memo_entry() -> ant::Result<()> {
    let mut evaluator = EvaluatorConfig::new().build();
    let entered = evaluator.begin_record(empty_state(0), true)?;
    assert_eq!(entered.d, 1);
    assert_eq!(evaluator.metrics().new_memo_entries(), 1);

    let unwound = evaluator.end_record(entered)?;
    assert_eq!(unwound.d, 0);
    Ok(())
}

#[test]
fn unmatched_entry_is_a_passthrough() -> ant::Result<()> {
    let mut evaluator = EvaluatorConfig::new().build();
    let passthrough = evaluator.begin_record(empty_state(3), false)?;
    assert_eq!(passthrough.d, 0);
    assert_eq!(passthrough.c, 3);
    assert_eq!(evaluator.metrics().memo_passthroughs(), 1);
    assert_eq!(evaluator.metrics().new_memo_entries(), 0);
    Ok(())
}

#[test]
fn end_record_without_an_active_recording_errors() {
    let mut evaluator = EvaluatorConfig::new().build();
    assert!(evaluator.end_record(empty_state(0)).is_err());
}

#[test]
fn reset_drops_metrics_and_the_recording_stack() -> ant::Result<()> {
    let mut evaluator = EvaluatorConfig::new().build();
    evaluator.begin_record(empty_state(0), true)?;
    assert_eq!(evaluator.metrics().new_memo_entries(), 1);

    evaluator.reset();
    assert_eq!(evaluator.metrics().new_memo_entries(), 0);
    assert_eq!(evaluator.metrics().memo_passthroughs(), 0);

    // A fresh begin_record after reset works exactly as it did the first
    // time, against a clean memo trie.
    let entered = evaluator.begin_record(empty_state(0), true)?;
    assert_eq!(entered.d, 1);
    Ok(())
}
