//! Notification wording.
//!
//! Pure functions from a job's outcome to the user-facing title and body.
//! Completions go out at normal priority; failures at high priority so they
//! surface even with the app backgrounded.

use crate::kernel::jobs::{
    CIVIC_ENGAGEMENT_PROCESSING, FLYER_PROCESSING, PRIVATE_EVENT_PROCESSING,
};
use crate::kernel::traits::NotificationPriority;

use super::outcomes::{FlyerOutcome, JobOutcome};

/// Title, body and priority for one notification.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageContent {
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
}

/// Message for a completed job.
pub fn completion_message(outcome: &JobOutcome) -> MessageContent {
    let (title, body) = match outcome {
        JobOutcome::Flyer(FlyerOutcome::Events(events)) if events.len() == 1 => (
            "🎉 Event Added!".to_string(),
            format!(
                "\"{}\" was added to the community calendar.",
                events[0].title
            ),
        ),
        JobOutcome::Flyer(FlyerOutcome::Events(events)) => (
            format!("🎉 {} Events Found!", events.len()),
            format!(
                "We found {} events in your flyer and added them to the community calendar.",
                events.len()
            ),
        ),
        JobOutcome::Flyer(FlyerOutcome::Duplicate) => (
            "Already on the Calendar".to_string(),
            "This flyer matches an event that's already on the community calendar.".to_string(),
        ),
        JobOutcome::Flyer(FlyerOutcome::NoEventFound) => (
            "No Events Found".to_string(),
            "We couldn't find any event details in your flyer. Try a clearer photo.".to_string(),
        ),
        JobOutcome::PrivateEvent => (
            "🎉 Private Event Created!".to_string(),
            "Your private event is ready to share.".to_string(),
        ),
        JobOutcome::CivicEngagement => (
            "✅ Opportunity Added".to_string(),
            "Your civic engagement opportunity was added to the community board.".to_string(),
        ),
    };

    MessageContent {
        title,
        body,
        priority: NotificationPriority::Normal,
    }
}

/// Message for a failed job. `None` for job types without a notification
/// mapping.
pub fn failure_message(job_type: &str) -> Option<MessageContent> {
    let body = match job_type {
        FLYER_PROCESSING => "We couldn't process your flyer. Please try again.",
        PRIVATE_EVENT_PROCESSING => "We couldn't create your private event. Please try again.",
        CIVIC_ENGAGEMENT_PROCESSING => {
            "We couldn't add your civic engagement opportunity. Please try again."
        }
        _ => return None,
    };

    Some(MessageContent {
        title: "Processing Failed".to_string(),
        body: body.to_string(),
        priority: NotificationPriority::High,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::notifications::outcomes::ExtractedEvent;

    fn event(title: &str) -> ExtractedEvent {
        ExtractedEvent {
            title: title.to_string(),
            venue: None,
            starts_at: None,
        }
    }

    #[test]
    fn single_flyer_event_names_the_event() {
        let msg = completion_message(&JobOutcome::Flyer(FlyerOutcome::Events(vec![event(
            "Night Market",
        )])));
        assert_eq!(msg.title, "🎉 Event Added!");
        assert_eq!(
            msg.body,
            "\"Night Market\" was added to the community calendar."
        );
        assert_eq!(msg.priority, NotificationPriority::Normal);
    }

    #[test]
    fn multiple_flyer_events_report_the_count() {
        let msg = completion_message(&JobOutcome::Flyer(FlyerOutcome::Events(vec![
            event("a"),
            event("b"),
            event("c"),
        ])));
        assert_eq!(msg.title, "🎉 3 Events Found!");
        assert_eq!(
            msg.body,
            "We found 3 events in your flyer and added them to the community calendar."
        );
    }

    #[test]
    fn two_flyer_events_use_the_reference_wording() {
        let msg = completion_message(&JobOutcome::Flyer(FlyerOutcome::Events(vec![
            event("a"),
            event("b"),
        ])));
        assert_eq!(msg.title, "🎉 2 Events Found!");
        assert_eq!(
            msg.body,
            "We found 2 events in your flyer and added them to the community calendar."
        );
    }

    #[test]
    fn duplicate_and_empty_flyers_get_soft_wording() {
        let dup = completion_message(&JobOutcome::Flyer(FlyerOutcome::Duplicate));
        assert_eq!(dup.title, "Already on the Calendar");

        let none = completion_message(&JobOutcome::Flyer(FlyerOutcome::NoEventFound));
        assert_eq!(none.title, "No Events Found");
    }

    #[test]
    fn failures_are_high_priority() {
        let msg = failure_message(FLYER_PROCESSING).unwrap();
        assert_eq!(msg.title, "Processing Failed");
        assert_eq!(msg.priority, NotificationPriority::High);
    }

    #[test]
    fn unknown_type_failures_stay_silent() {
        assert!(failure_message("mystery-job").is_none());
    }
}
