use crontask_core::{SchedulerError, Transport};
use crontask_infrastructure::SqliteTransport;
use crontask_testing_utils::{null_task, TaskBuilder};

async fn memory_transport() -> SqliteTransport {
    SqliteTransport::connect("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn test_create_and_get() {
    let transport = memory_transport().await;
    let task = TaskBuilder::shell(&["echo", "hello"])
        .with_name("hello")
        .with_expression("*/5 * * * *")
        .with_priority(3)
        .build();

    transport.create(task.clone()).await.unwrap();

    assert_eq!(transport.get("hello").await.unwrap(), task);
    assert!(transport.get("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let transport = memory_transport().await;
    transport.create(null_task("foo")).await.unwrap();

    let err = transport.create(null_task("foo")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Conflict(_)));
    assert_eq!(transport.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_keeps_insertion_order() {
    let transport = memory_transport().await;
    for name in ["c", "a", "b"] {
        transport.create(null_task(name)).await.unwrap();
    }

    assert_eq!(transport.list().await.unwrap().names(), vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_update_and_rename() {
    let transport = memory_transport().await;
    transport.create(null_task("foo")).await.unwrap();
    transport.create(null_task("bar")).await.unwrap();

    let updated = TaskBuilder::new().with_name("foo").with_priority(9).build();
    transport.update("foo", updated).await.unwrap();
    assert_eq!(transport.get("foo").await.unwrap().priority(), 9);

    assert!(transport
        .update("foo", null_task("bar"))
        .await
        .unwrap_err()
        .is_conflict());
    assert!(transport
        .update("missing", null_task("missing"))
        .await
        .unwrap_err()
        .is_not_found());

    transport.update("foo", null_task("baz")).await.unwrap();
    assert!(transport.get("foo").await.unwrap_err().is_not_found());
    assert!(transport.get("baz").await.is_ok());
}

#[tokio::test]
async fn test_pause_resume_and_delete() {
    let transport = memory_transport().await;
    transport.create(null_task("foo")).await.unwrap();

    transport.pause("foo").await.unwrap();
    assert!(!transport.get("foo").await.unwrap().is_enabled());
    assert!(transport.pause("foo").await.unwrap_err().is_conflict());

    transport.resume("foo").await.unwrap();
    assert!(transport.resume("foo").await.unwrap_err().is_conflict());

    transport.delete("foo").await.unwrap();
    assert!(transport.delete("foo").await.unwrap_err().is_not_found());
    assert!(transport.pause("foo").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_clear() {
    let transport = memory_transport().await;
    transport.create(null_task("a")).await.unwrap();
    transport.create(null_task("b")).await.unwrap();

    transport.clear().await.unwrap();

    assert!(transport.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tasks_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("tasks.db").display());

    {
        let transport = SqliteTransport::connect(&url).await.unwrap();
        transport.create(null_task("persistent")).await.unwrap();
        transport.pause("persistent").await.unwrap();
    }

    let transport = SqliteTransport::connect(&url).await.unwrap();
    let task = transport.get("persistent").await.unwrap();
    assert!(!task.is_enabled());
}
