//! Property tests for the merge discipline.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use civicflow::message::Message;
use civicflow::node::NodePartial;
use civicflow::reducers::apply_partial;
use civicflow::state::WorkflowState;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Probe {
    counter: u64,
}

fn message_batches() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec(".{0,20}", 0..4), 0..8)
}

proptest! {
    /// Applying any sequence of partial updates never shrinks or reorders
    /// the existing message history.
    #[test]
    fn messages_are_append_only(batches in message_batches()) {
        let mut state: WorkflowState<Probe> = WorkflowState::new_with_user_message("seed");
        let initial = state.messages.get().clone();

        for (i, batch) in batches.iter().enumerate() {
            let messages: Vec<Message> =
                batch.iter().map(|c| Message::assistant(c)).collect();
            let partial = NodePartial::new()
                .with_messages(messages)
                .with_domain(Probe { counter: i as u64 });
            apply_partial(&mut state, partial);
        }

        let finals = state.messages.get();
        prop_assert!(finals.len() >= initial.len());
        prop_assert_eq!(&finals[..initial.len()], &initial[..]);

        let expected: usize = initial.len() + batches.iter().map(Vec::len).sum::<usize>();
        prop_assert_eq!(finals.len(), expected);
    }

    /// The domain channel always reflects the last replacement.
    #[test]
    fn domain_reflects_last_write(counters in prop::collection::vec(0u64..1000, 1..10)) {
        let mut state: WorkflowState<Probe> = WorkflowState::default();
        for &counter in &counters {
            apply_partial(&mut state, NodePartial::new().with_domain(Probe { counter }));
        }
        prop_assert_eq!(state.domain.get().counter, *counters.last().unwrap());
        prop_assert_eq!(state.domain.version() as usize, counters.len() + 1);
    }
}
