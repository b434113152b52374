use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use crontask_core::{
    LockStore, MessageQueue, SchedulePolicyOrchestrator, SchedulerError, Transport,
};
use crontask_dispatcher::{Scheduler, DUE_TASKS_LOCK};
use crontask_infrastructure::{InMemoryLockStore, InMemoryMessageQueue, InMemoryTransport};
use crontask_testing_utils::{null_task, MockTransport, RecordingEventListener, TaskBuilder};

fn noon_thirty() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap()
}

fn scheduler() -> Scheduler {
    Scheduler::new(Arc::new(InMemoryTransport::default()), Tz::UTC)
}

#[tokio::test]
async fn test_schedule_stamps_and_persists_task() {
    let scheduler = scheduler();
    let before = Utc::now();

    scheduler.schedule(null_task("foo")).await.unwrap();

    let task = scheduler.transport().get("foo").await.unwrap();
    assert!(task.scheduled_at().unwrap() >= before);
    assert!(task.arrival_time().is_some());
    assert_eq!(task.timezone(), Some(Tz::UTC));
}

#[tokio::test]
async fn test_schedule_keeps_task_timezone() {
    let scheduler = scheduler();
    let task = TaskBuilder::new()
        .with_name("paris")
        .with_timezone(Tz::Europe__Paris)
        .build();

    scheduler.schedule(task).await.unwrap();

    let stored = scheduler.transport().get("paris").await.unwrap();
    assert_eq!(stored.timezone(), Some(Tz::Europe__Paris));
}

#[tokio::test]
async fn test_schedule_duplicate_conflicts() {
    let scheduler = scheduler();
    scheduler.schedule(null_task("foo")).await.unwrap();

    let err = scheduler.schedule(null_task("foo")).await.unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(scheduler.get_tasks().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_queued_task_is_published() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let scheduler = scheduler().with_message_queue(queue.clone());

    scheduler
        .schedule(TaskBuilder::new().with_name("async").queued().build())
        .await
        .unwrap();

    assert!(scheduler.get_tasks().await.unwrap().is_empty());
    assert_eq!(queue.len().await.unwrap(), 1);
    let message = queue.consume().await.unwrap().unwrap();
    assert_eq!(message.task.name(), "async");
}

#[tokio::test]
async fn test_queued_task_without_queue_is_persisted() {
    let scheduler = scheduler();

    scheduler
        .schedule(TaskBuilder::new().with_name("async").queued().build())
        .await
        .unwrap();

    assert!(scheduler.transport().get("async").await.is_ok());
}

#[tokio::test]
async fn test_lifecycle_operations_emit_events() {
    let scheduler = scheduler();
    let listener = Arc::new(RecordingEventListener::new());
    scheduler.events().add_listener(listener.clone());

    scheduler.schedule(null_task("foo")).await.unwrap();
    scheduler.pause("foo").await.unwrap();
    scheduler.resume("foo").await.unwrap();
    scheduler
        .update("foo", TaskBuilder::new().with_name("foo").with_priority(5).build())
        .await
        .unwrap();
    scheduler.unschedule("foo").await.unwrap();

    assert_eq!(
        listener.names(),
        vec![
            "task_scheduled",
            "task_paused",
            "task_resumed",
            "task_updated",
            "task_unscheduled"
        ]
    );
    assert!(scheduler.get_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_operation_emits_nothing() {
    let scheduler = scheduler();
    let listener = Arc::new(RecordingEventListener::new());
    scheduler.events().add_listener(listener.clone());

    assert!(scheduler.pause("missing").await.unwrap_err().is_not_found());
    assert!(scheduler.unschedule("missing").await.unwrap_err().is_not_found());

    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn test_pause_twice_conflicts() {
    let scheduler = scheduler();
    scheduler.schedule(null_task("foo")).await.unwrap();
    scheduler.pause("foo").await.unwrap();

    assert!(scheduler.pause("foo").await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_due_tasks_match_current_minute() {
    let scheduler = scheduler();
    let transport = scheduler.transport();
    transport
        .create(TaskBuilder::new().with_name("every_minute").build())
        .await
        .unwrap();
    transport
        .create(TaskBuilder::new().with_name("at_12_30").with_expression("30 12 * * *").build())
        .await
        .unwrap();
    transport
        .create(TaskBuilder::new().with_name("hourly").with_expression("0 * * * *").build())
        .await
        .unwrap();

    let due = scheduler.get_due_tasks_at(noon_thirty()).await.unwrap();

    assert_eq!(due.names(), vec!["every_minute", "at_12_30"]);
}

#[tokio::test]
async fn test_due_tasks_ignore_seconds_within_the_minute() {
    let scheduler = scheduler();
    scheduler
        .transport()
        .create(TaskBuilder::new().with_name("at_12_30").with_expression("30 12 * * *").build())
        .await
        .unwrap();

    let late_in_minute = noon_thirty().with_second(59).unwrap();

    assert_eq!(scheduler.get_due_tasks_at(late_in_minute).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_due_tasks_skip_tasks_already_run_this_minute() {
    let scheduler = scheduler();
    let mut ran_this_minute = TaskBuilder::new().with_name("ran_this_minute").build();
    ran_this_minute.set_last_execution(Some(noon_thirty() + Duration::seconds(5)));
    let mut ran_last_minute = TaskBuilder::new().with_name("ran_last_minute").build();
    ran_last_minute.set_last_execution(Some(noon_thirty() - Duration::seconds(1)));

    let transport = scheduler.transport();
    transport.create(ran_this_minute).await.unwrap();
    transport.create(ran_last_minute).await.unwrap();

    let due = scheduler
        .get_due_tasks_at(noon_thirty() + Duration::seconds(30))
        .await
        .unwrap();

    assert_eq!(due.names(), vec!["ran_last_minute"]);
}

#[tokio::test]
async fn test_due_tasks_use_task_timezone() {
    let scheduler = scheduler();
    let transport = scheduler.transport();
    transport
        .create(
            TaskBuilder::new()
                .with_name("paris")
                .with_expression("30 13 * * *")
                .with_timezone(Tz::Europe__Paris)
                .build(),
        )
        .await
        .unwrap();
    transport
        .create(TaskBuilder::new().with_name("utc").with_expression("30 13 * * *").build())
        .await
        .unwrap();

    let due = scheduler.get_due_tasks_at(noon_thirty()).await.unwrap();

    assert_eq!(due.names(), vec!["paris"]);
}

#[tokio::test]
async fn test_due_tasks_fall_back_to_scheduler_timezone() {
    let scheduler = Scheduler::new(Arc::new(InMemoryTransport::default()), Tz::Asia__Tokyo);
    scheduler
        .transport()
        .create(TaskBuilder::new().with_name("tokyo").with_expression("30 21 * * *").build())
        .await
        .unwrap();

    let due = scheduler.get_due_tasks_at(noon_thirty()).await.unwrap();

    assert_eq!(due.names(), vec!["tokyo"]);
}

#[tokio::test]
async fn test_due_tasks_skip_paused_tasks() {
    let scheduler = scheduler();
    let transport = scheduler.transport();
    transport.create(TaskBuilder::new().with_name("paused").paused().build()).await.unwrap();
    transport.create(null_task("enabled")).await.unwrap();

    let due = scheduler.get_due_tasks_at(noon_thirty()).await.unwrap();

    assert_eq!(due.names(), vec!["enabled"]);
}

#[tokio::test]
async fn test_due_tasks_respect_execution_window() {
    let now = noon_thirty();
    let scheduler = scheduler();
    let transport = scheduler.transport();
    transport
        .create(
            TaskBuilder::new()
                .with_name("not_started")
                .with_execution_window(Some(now + Duration::minutes(30)), None)
                .build(),
        )
        .await
        .unwrap();
    transport
        .create(
            TaskBuilder::new()
                .with_name("ended")
                .with_execution_window(None, Some(now - Duration::minutes(30)))
                .build(),
        )
        .await
        .unwrap();
    transport
        .create(
            TaskBuilder::new()
                .with_name("inside")
                .with_execution_window(Some(now - Duration::hours(1)), Some(now + Duration::hours(1)))
                .build(),
        )
        .await
        .unwrap();
    transport
        .create(
            TaskBuilder::new()
                .with_name("boundaries")
                .with_execution_window(Some(now), Some(now))
                .build(),
        )
        .await
        .unwrap();

    let due = scheduler.get_due_tasks_at(now).await.unwrap();

    assert_eq!(due.names(), vec!["inside", "boundaries"]);
}

#[tokio::test]
async fn test_due_tasks_sorted_by_policy() {
    let orchestrator = Arc::new(SchedulePolicyOrchestrator::with_default_policies());
    let scheduler = scheduler().with_policy(orchestrator, "nice").unwrap();
    let transport = scheduler.transport();
    transport.create(TaskBuilder::new().with_name("low").with_nice(10).build()).await.unwrap();
    transport.create(TaskBuilder::new().with_name("high").with_nice(-10).build()).await.unwrap();

    let due = scheduler.get_due_tasks_at(noon_thirty()).await.unwrap();

    assert_eq!(due.names(), vec!["high", "low"]);
}

#[tokio::test]
async fn test_unknown_policy_is_rejected() {
    let orchestrator = Arc::new(SchedulePolicyOrchestrator::with_default_policies());
    let err = scheduler().with_policy(orchestrator, "random").unwrap_err();

    assert!(matches!(err, SchedulerError::Configuration(_)));
}

#[tokio::test]
async fn test_due_tasks_lock_held_returns_empty() {
    let lock = Arc::new(InMemoryLockStore::new());
    let scheduler = scheduler().with_due_task_lock(lock.clone());
    scheduler.transport().create(null_task("foo")).await.unwrap();

    assert!(lock.try_acquire(DUE_TASKS_LOCK).await.unwrap());
    assert!(scheduler.get_due_tasks_at(noon_thirty()).await.unwrap().is_empty());

    lock.release(DUE_TASKS_LOCK).await.unwrap();
    assert_eq!(scheduler.get_due_tasks_at(noon_thirty()).await.unwrap().len(), 1);
    assert!(!lock.is_locked(DUE_TASKS_LOCK));
}

#[tokio::test]
async fn test_due_tasks_lock_released_on_transport_error() {
    let lock = Arc::new(InMemoryLockStore::new());
    let transport = MockTransport::new("broken");
    transport.fail_always();
    let scheduler = Scheduler::new(Arc::new(transport), Tz::UTC).with_due_task_lock(lock.clone());

    assert!(scheduler.get_due_tasks_at(noon_thirty()).await.is_err());
    assert!(!lock.is_locked(DUE_TASKS_LOCK));
}

#[tokio::test]
async fn test_next_execution_time() {
    let scheduler = scheduler();
    scheduler
        .schedule(TaskBuilder::new().with_name("hourly").with_expression("0 * * * *").build())
        .await
        .unwrap();

    let next = scheduler.next_execution_time("hourly").await.unwrap().unwrap();

    assert!(next > Utc::now());
    assert_eq!(next.minute(), 0);
    assert!(next - Utc::now() <= Duration::hours(1));
    assert!(scheduler
        .next_execution_time("missing")
        .await
        .unwrap_err()
        .is_not_found());
}
