use std::sync::Arc;

use ff_core::error::AppError;
use ff_core::traits::{MockMailTransport, MockTaskHandler, Task};
use ff_service::TaskRunner;
use ff_tasks_local::{LogTransport, Outcome, RetryPolicy, Worker};
use integration_tests::World;

#[tokio::test]
async fn queued_deletion_runs_through_the_worker() {
    let mut w = World::new().await;
    let a = w.register("a").await;
    let as_a = w.viewer(&a).await;
    w.drain();

    w.app.request_account_deletion(&as_a, a.id).await.unwrap();
    let tasks = w.drain();
    assert_eq!(tasks, vec![Task::DeleteAccount { user_id: a.id }]);

    let worker = Worker::new(
        Arc::new(TaskRunner::new(w.app.db.clone(), Arc::new(LogTransport))),
        RetryPolicy::new(3, 1),
    );
    assert_eq!(worker.process(&tasks[0]).await, Outcome::Done { attempts: 1 });
    // Running it again is harmless.
    assert_eq!(worker.process(&tasks[0]).await, Outcome::Done { attempts: 1 });
    assert!(matches!(w.app.get_user(a.id).await, Err(AppError::NotFound(..))));
}

#[tokio::test]
async fn failing_mail_is_retried_then_abandoned() {
    let mut w = World::new().await;
    w.register("a").await;
    let mail = w.drain().pop().unwrap();

    let mut transport = MockMailTransport::new();
    transport
        .expect_deliver()
        .times(3)
        .returning(|_| Err(AppError::internal("smtp unreachable")));
    let worker = Worker::new(
        Arc::new(TaskRunner::new(w.app.db.clone(), Arc::new(transport))),
        RetryPolicy::new(3, 1),
    );
    assert!(matches!(worker.process(&mail).await, Outcome::Exhausted(_)));
}

#[test]
fn tasks_serialize_with_a_kind_tag() {
    let task = Task::DeleteAccount { user_id: 7 };
    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "delete_account", "user_id": 7 }));
    let back: Task = serde_json::from_value(json).unwrap();
    assert_eq!(back, task);
}

#[test]
fn worker_stops_when_every_producer_is_gone() {
    let (queue, rx) = ff_tasks_local::ChannelQueue::new();
    drop(queue);
    // No expectations: any call would panic.
    let worker = Worker::new(Arc::new(MockTaskHandler::new()), RetryPolicy::default());
    tokio_test::block_on(worker.run(rx, std::future::pending()));
}
