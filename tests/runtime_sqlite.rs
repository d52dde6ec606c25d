//! SQLite checkpointer round-trips against a temp database.

#![cfg(feature = "sqlite")]

use serde::{Deserialize, Serialize};

use civicflow::message::Message;
use civicflow::runtime::{Checkpoint, Checkpointer, SqliteCheckpointer};
use civicflow::state::WorkflowState;
use civicflow::types::NodeKind;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Probe {
    marker: u32,
}

async fn temp_checkpointer() -> (tempfile::TempDir, SqliteCheckpointer<Probe>) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("checkpoints.db");
    let url = format!("sqlite://{}", db_path.display());
    let cp = SqliteCheckpointer::connect(&url).await.unwrap();
    (dir, cp)
}

#[tokio::test]
async fn save_and_load_roundtrip() {
    let (_dir, cp) = temp_checkpointer().await;

    let mut state: WorkflowState<Probe> = WorkflowState::new_with_user_message("what does the bill do?");
    state.push_message(Message::assistant("it reforms postal health benefits"));
    state.domain.get_mut().marker = 7;
    state.domain.bump();

    cp.save(Checkpoint::new(
        "user1::room1::hr3076",
        2,
        state.clone(),
        NodeKind::Custom("cost_estimate".into()),
    ))
    .await
    .unwrap();

    let loaded = cp
        .load_latest("user1::room1::hr3076")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.step, 2);
    assert_eq!(loaded.cursor, NodeKind::Custom("cost_estimate".into()));
    assert_eq!(loaded.state, state);
}

#[tokio::test]
async fn latest_row_tracks_the_newest_step() {
    let (_dir, cp) = temp_checkpointer().await;
    let state: WorkflowState<Probe> = WorkflowState::new_with_user_message("hi");

    for step in 0..3_u64 {
        cp.save(Checkpoint::new(
            "sess",
            step,
            state.clone(),
            if step == 2 {
                NodeKind::End
            } else {
                NodeKind::Custom("next".into())
            },
        ))
        .await
        .unwrap();
    }

    let loaded = cp.load_latest("sess").await.unwrap().unwrap();
    assert_eq!(loaded.step, 2);
    assert_eq!(loaded.cursor, NodeKind::End);
}

#[tokio::test]
async fn unknown_session_is_none() {
    let (_dir, cp) = temp_checkpointer().await;
    assert!(cp.load_latest("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn resaving_a_step_is_idempotent() {
    let (_dir, cp) = temp_checkpointer().await;
    let state: WorkflowState<Probe> = WorkflowState::new_with_user_message("hi");

    let checkpoint = Checkpoint::new("sess", 1, state, NodeKind::Custom("b".into()));
    cp.save(checkpoint.clone()).await.unwrap();
    cp.save(checkpoint).await.unwrap();

    let loaded = cp.load_latest("sess").await.unwrap().unwrap();
    assert_eq!(loaded.step, 1);
}

#[tokio::test]
async fn list_sessions_orders_by_recency() {
    let (_dir, cp) = temp_checkpointer().await;
    let state: WorkflowState<Probe> = WorkflowState::default();

    cp.save(Checkpoint::new("alpha", 0, state.clone(), NodeKind::End))
        .await
        .unwrap();
    cp.save(Checkpoint::new("beta", 0, state, NodeKind::End))
        .await
        .unwrap();

    let sessions = cp.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.contains(&"alpha".to_string()));
    assert!(sessions.contains(&"beta".to_string()));
}
