//! Push notifications for finished jobs.
//!
//! Split into three layers so wording stays testable without I/O:
//! [`outcomes`] interprets result payloads, [`messages`] maps outcomes to
//! title/body/priority, and [`dispatcher`] does the lookup-and-send.

pub mod dispatcher;
pub mod messages;
pub mod outcomes;

pub use dispatcher::NotificationDispatcher;
pub use messages::{completion_message, failure_message, MessageContent};
pub use outcomes::{parse_outcome, ExtractedEvent, FlyerOutcome, JobOutcome};
