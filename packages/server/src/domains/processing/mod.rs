//! Submission processing domain: the handlers behind the user-facing job
//! types plus the housekeeping job.

pub mod cleanup;
pub mod handlers;

pub use handlers::{register_handlers, submit_cleanup_job};
