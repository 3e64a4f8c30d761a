//! Merging concurrent partials does not depend on arrival order.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use tessera_state::{GraphState, Message, PartialState, Report, TaskOutput, merge, merge_batch};

/// One partial per task, each with a few messages at arbitrary times.
fn partials() -> impl Strategy<Value = Vec<PartialState>> {
  prop::collection::vec(
    (prop::collection::vec((0i64..5, 0u32..3), 0..4), any::<bool>()),
    1..6,
  )
  .prop_map(|specs| {
    specs
      .into_iter()
      .enumerate()
      .map(|(i, (messages, failed_first))| {
        let task = format!("task_{}", i);
        let mut partial = PartialState::new().with_result(
          &task,
          TaskOutput {
            raw: i.to_string(),
            value: json!({ "n": i }),
            degraded: failed_first,
          },
        );
        for (secs, attempt) in messages {
          let at = Utc.timestamp_opt(secs, 0).unwrap();
          let message = if failed_first && attempt == 0 {
            Message::attempt_failed(&task, attempt, "timeout")
          } else {
            Message::output(&task, attempt, format!("out {}", secs))
          };
          partial = partial.with_message(message.at(at));
        }
        partial
      })
      .collect()
  })
}

proptest! {
  #[test]
  fn batch_merge_is_order_independent(parts in partials(), seed in any::<u64>()) {
    let mut parts = parts;
    // Only the last task writes the report.
    if let Some(last) = parts.pop() {
      parts.push(last.with_report(Report::default()));
    }

    let mut shuffled = parts.clone();
    // Deterministic permutation driven by the seed.
    let len = shuffled.len();
    for i in (1..len).rev() {
      let j = (seed as usize).wrapping_mul(i + 7) % (i + 1);
      shuffled.swap(i, j);
    }

    let forward = merge_batch(GraphState::new("in", 2), parts.clone()).unwrap();
    let permuted = merge_batch(GraphState::new("in", 2), shuffled).unwrap();
    prop_assert_eq!(&forward, &permuted);

    let sorted = forward
      .messages
      .windows(2)
      .all(|pair| pair[0].timestamp <= pair[1].timestamp);
    prop_assert!(sorted);
  }

  #[test]
  fn later_batches_append_after_the_log(first in partials(), second in partials()) {
    let after_first = merge_batch(GraphState::new("in", 2), first).unwrap();
    let logged = after_first.messages.clone();
    let after_second = merge_batch(after_first, second).unwrap();
    prop_assert_eq!(&after_second.messages[..logged.len()], &logged[..]);
  }
}

#[test]
fn merge_keeps_earlier_contributions() {
  let state = GraphState::new("in", 1);
  let state = merge(
    state,
    PartialState::new().with_message(Message::output("a", 0, "first")),
  );
  let state = merge(
    state,
    PartialState::new().with_message(Message::output("b", 0, "second")),
  );
  assert_eq!(state.messages.len(), 2);
  assert!(state.messages.iter().any(|m| m.task == "a"));
}
