//! Integration tests for lock ordering, bounded waits and release guarantees.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use federation_core::{Action, ActionKind, EntityKey, StepDescriptor, StoreRef, TransactionId};
use federation_lock::{LockConfig, LockCoordinator, LockError};
use serde_json::json;

fn step(index: usize, store: &str, entity_type: &str, ids: &[&str]) -> StepDescriptor {
    StepDescriptor {
        step_index: index,
        target_store: StoreRef::local(store),
        response_key: format!("step{index}"),
        forward_action: Action::new(ActionKind::Update, "update", entity_type, json!({})),
        compensating_action: Some(Action::new(
            ActionKind::Revert,
            "revert",
            entity_type,
            json!({}),
        )),
        entity_keys: ids
            .iter()
            .map(|id| EntityKey::new(entity_type, *id))
            .collect::<BTreeSet<_>>(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_transactions_in_opposite_orders_all_complete() {
    let coordinator = LockCoordinator::new(LockConfig::new(Duration::from_secs(10)));

    let mut handles = Vec::new();
    for i in 0..32 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            // Half the transactions declare orders before users, half after.
            let steps = if i % 2 == 0 {
                vec![
                    step(0, "orders", "Order", &["1", "2"]),
                    step(1, "users", "User", &["1"]),
                ]
            } else {
                vec![
                    step(0, "users", "User", &["1"]),
                    step(1, "orders", "Order", &["2", "1"]),
                ]
            };
            let set = coordinator
                .acquire(TransactionId::new(), &steps)
                .await
                .expect("acquire within bound");
            tokio::time::sleep(Duration::from_millis(1)).await;
            drop(set);
        }));
    }

    let all = join_all(handles);
    tokio::time::timeout(Duration::from_secs(30), all)
        .await
        .expect("no deadlock");

    assert_eq!(coordinator.active_keys(), 0);
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        handle.await.expect("task completes");
    }
}

#[tokio::test]
async fn waiter_acquires_after_holder_releases() -> anyhow::Result<()> {
    let coordinator = LockCoordinator::default();
    let steps = vec![step(0, "orders", "Order", &["1"])];
    let holder = coordinator.acquire(TransactionId::new(), &steps).await?;

    let waiter = {
        let coordinator = coordinator.clone();
        let steps = steps.clone();
        tokio::spawn(async move { coordinator.acquire(TransactionId::new(), &steps).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(holder);
    let set = waiter.await??;

    assert_eq!(set.tokens().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeout_reports_the_blocking_entity() -> anyhow::Result<()> {
    let coordinator = LockCoordinator::new(LockConfig::new(Duration::from_secs(5)));
    let _holder = coordinator
        .acquire(TransactionId::new(), &[step(0, "users", "User", &["7"])])
        .await?;

    let err = coordinator
        .acquire(
            TransactionId::new(),
            &[
                step(0, "orders", "Order", &["1"]),
                step(1, "users", "User", &["7"]),
            ],
        )
        .await
        .expect_err("users/User#7 is held");

    assert_eq!(
        err,
        LockError::Timeout {
            store: StoreRef::local("users"),
            entity_key: EntityKey::new("User", "7"),
            waited: Duration::from_secs(5),
        }
    );
    assert!(!coordinator.is_held(&StoreRef::local("orders"), &EntityKey::new("Order", "1")));
    Ok(())
}

#[tokio::test]
async fn panicking_holder_releases_its_locks() {
    let coordinator = LockCoordinator::default();
    let steps = vec![step(0, "orders", "Order", &["1"])];

    let task = {
        let coordinator = coordinator.clone();
        let steps = steps.clone();
        tokio::spawn(async move {
            let _set = coordinator
                .acquire(TransactionId::new(), &steps)
                .await
                .expect("uncontended");
            panic!("step blew up while holding locks");
        })
    };

    assert!(task.await.is_err());
    assert!(!coordinator.is_held(&StoreRef::local("orders"), &EntityKey::new("Order", "1")));

    let again = coordinator
        .acquire(TransactionId::new(), &steps)
        .await
        .expect("lock is free again");
    assert_eq!(again.tokens().len(), 1);
}

#[tokio::test]
async fn disjoint_transactions_do_not_block_each_other() -> anyhow::Result<()> {
    let coordinator = Arc::new(LockCoordinator::new(LockConfig::new(Duration::ZERO)));

    let a = coordinator
        .acquire(TransactionId::new(), &[step(0, "orders", "Order", &["1"])])
        .await?;
    let b = coordinator
        .acquire(TransactionId::new(), &[step(0, "orders", "Order", &["2"])])
        .await?;

    assert_eq!(coordinator.active_keys(), 2);
    drop((a, b));
    assert_eq!(coordinator.active_keys(), 0);
    Ok(())
}
