//! Dispatcher behavior: who gets notified, with what wording, and that
//! notification failures never take anything else down.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use server_core::kernel::jobs::{Job, JobEvent, JobEventBus, JobStatus, FLYER_PROCESSING};
use server_core::kernel::notifications::NotificationDispatcher;
use server_core::kernel::test_dependencies::{MockPushNotificationService, MockUserLookup};
use server_core::kernel::traits::NotificationPriority;

fn completed_flyer_job(creator: Option<&str>, result: serde_json::Value) -> Job {
    let data = match creator {
        Some(id) => json!({"creatorId": id, "photoUrl": "https://x/y.jpg"}),
        None => json!({"photoUrl": "https://x/y.jpg"}),
    };
    let mut job = Job::pending(FLYER_PROCESSING, data);
    job.status = JobStatus::Completed;
    job.result = Some(result);
    job
}

fn dispatcher(
    users: MockUserLookup,
    push: MockPushNotificationService,
) -> (NotificationDispatcher, JobEventBus) {
    let events = JobEventBus::new();
    let dispatcher =
        NotificationDispatcher::new(Arc::new(users), Arc::new(push), events.clone());
    (dispatcher, events)
}

#[tokio::test]
async fn completed_flyer_sends_event_count_wording() {
    let users = MockUserLookup::new().with_recipient("user-1", Some("ExponentPushToken[abc]"));
    let push = MockPushNotificationService::new();
    let (dispatcher, _events) = dispatcher(users, push.clone());

    let job = completed_flyer_job(
        Some("user-1"),
        json!({"events": [{"title": "a"}, {"title": "b"}, {"title": "c"}]}),
    );
    dispatcher.dispatch(&job).await.unwrap();

    let sent = push.sent_messages();
    assert_eq!(sent.len(), 1);
    let (recipient, message) = &sent[0];
    assert_eq!(recipient, "user-1");
    assert_eq!(message.title, "🎉 3 Events Found!");
    assert_eq!(
        message.body,
        "We found 3 events in your flyer and added them to the community calendar."
    );
    assert_eq!(message.priority, NotificationPriority::Normal);
    assert_eq!(message.data["type"], "job_completed");
    assert_eq!(message.data["jobId"], json!(job.id));
    assert_eq!(message.data["jobType"], FLYER_PROCESSING);
}

#[tokio::test]
async fn failed_job_sends_high_priority_failure_wording() {
    let users = MockUserLookup::new().with_recipient("user-1", Some("ExponentPushToken[abc]"));
    let push = MockPushNotificationService::new();
    let (dispatcher, _events) = dispatcher(users, push.clone());

    let mut job = Job::pending(FLYER_PROCESSING, json!({"creatorId": "user-1"}));
    job.status = JobStatus::Failed;
    job.error = Some("timeout".to_string());
    dispatcher.dispatch(&job).await.unwrap();

    assert!(push.was_sent_with_title("Processing Failed"));
    let (_, message) = &push.sent_messages()[0];
    assert_eq!(message.priority, NotificationPriority::High);
    assert_eq!(message.data["type"], "job_failed");
    assert_eq!(message.data["error"], "timeout");
}

#[tokio::test]
async fn jobs_without_a_creator_stay_silent() {
    let users = MockUserLookup::new().with_recipient("user-1", Some("t"));
    let push = MockPushNotificationService::new();
    let (dispatcher, _events) = dispatcher(users, push.clone());

    let job = completed_flyer_job(None, json!({"events": [{"title": "a"}]}));
    dispatcher.dispatch(&job).await.unwrap();
    assert_eq!(push.sent_count(), 0);
}

#[tokio::test]
async fn unmapped_job_types_stay_silent() {
    let users = MockUserLookup::new().with_recipient("user-1", Some("t"));
    let push = MockPushNotificationService::new();
    let (dispatcher, _events) = dispatcher(users, push.clone());

    let mut job = Job::pending("periodic-cleanup", json!({"creatorId": "user-1"}));
    job.status = JobStatus::Completed;
    job.result = Some(json!({"pruned": 3}));
    dispatcher.dispatch(&job).await.unwrap();
    assert_eq!(push.sent_count(), 0);
}

#[tokio::test]
async fn unknown_creators_stay_silent() {
    let users = MockUserLookup::new();
    let push = MockPushNotificationService::new();
    let (dispatcher, _events) = dispatcher(users, push.clone());

    let job = completed_flyer_job(Some("ghost"), json!({"events": [{"title": "a"}]}));
    dispatcher.dispatch(&job).await.unwrap();
    assert_eq!(push.sent_count(), 0);
}

#[tokio::test]
async fn delivery_failures_do_not_stop_the_dispatcher() {
    let users = MockUserLookup::new().with_recipient("user-1", Some("t"));
    let push = MockPushNotificationService::failing();
    let (dispatcher, events) = dispatcher(users, push);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(dispatcher.run(shutdown.clone()));

    let job = completed_flyer_job(Some("user-1"), json!({"events": [{"title": "a"}]}));
    events.publish(JobEvent::Completed { job });

    // The failed send is logged and swallowed; the loop keeps consuming
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn non_terminal_events_never_notify() {
    let users = MockUserLookup::new().with_recipient("user-1", Some("t"));
    let push = MockPushNotificationService::new();
    let (dispatcher, events) = dispatcher(users, push.clone());

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(dispatcher.run(shutdown.clone()));

    let mut job = Job::pending(FLYER_PROCESSING, json!({"creatorId": "user-1"}));
    job.status = JobStatus::Processing;
    events.publish(JobEvent::Claimed { job: job.clone() });
    events.publish(JobEvent::Progress { job });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(push.sent_count(), 0);

    shutdown.cancel();
    task.await.unwrap();
}
