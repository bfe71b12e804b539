mod common;

use ant::value::Value;
use common::{build_list, build_list_incr_evaluator, collect_list};
use test_log::test;

fn run(items: &[i64]) -> ant::Result<Vec<i64>> {
    let mut evaluator = build_list_incr_evaluator()?;
    let input = build_list(&evaluator, items)?;
    let k = Value::fresh(ant::MeasuredSeq::empty(), 0, 1);
    let result_seq = evaluator.exec_cek(0, vec![input], k)?;
    collect_list(Value::fresh(result_seq, 0, 1))
}

#[test]
fn empty_list_stays_empty() -> ant::Result<()> {
    assert_eq!(run(&[])?, Vec::<i64>::new());
    Ok(())
}

#[test]
fn single_element_list_is_incremented() -> ant::Result<()> {
    assert_eq!(run(&[1])?, vec![2]);
    Ok(())
}

#[test]
fn longer_list_is_incremented_elementwise() -> ant::Result<()> {
    assert_eq!(run(&[1, 2, 3])?, vec![2, 3, 4]);
    Ok(())
}

#[test]
fn negative_and_zero_values_increment_correctly() -> ant::Result<()> {
    assert_eq!(run(&[-1, 0, -5])?, vec![0, 1, -4]);
    Ok(())
}

#[test]
fn running_twice_on_fresh_evaluators_is_deterministic() -> ant::Result<()> {
    assert_eq!(run(&[1, 2, 3])?, run(&[1, 2, 3])?);
    Ok(())
}
