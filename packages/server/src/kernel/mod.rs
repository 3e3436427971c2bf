//! Kernel: the infrastructure layer the domains build on.
//!
//! Holds the job subsystem, live sessions, notifications and the `Base*`
//! trait seams with their production and test implementations. Domain code
//! (extraction phases, wording) lives under `domains/` and
//! `kernel/notifications/`, never here.

pub mod deps;
pub mod extraction;
pub mod jobs;
pub mod notifications;
pub mod sessions;
pub mod test_dependencies;
pub mod traits;
pub mod users;

pub use deps::ServerDeps;
