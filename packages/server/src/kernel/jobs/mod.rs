//! Asynchronous job subsystem.
//!
//! Jobs move through a simple, one-way lifecycle:
//!
//! ```text
//! pending ──► processing ──► completed
//!                      └───► failed
//! ```
//!
//! The pieces:
//! - [`Job`] / [`JobStatus`]: the durable record and its state machine
//! - [`BaseJobStore`](crate::kernel::traits::BaseJobStore) implementations:
//!   [`InMemoryJobStore`], [`PostgresJobStore`]
//! - [`JobRegistry`]: job type string → handler
//! - [`WorkerPool`]: polling scheduler with bounded concurrency
//! - [`JobEventBus`]: broadcast of [`JobEvent`]s to the gateway and
//!   notification dispatcher

pub mod events;
pub mod job;
pub mod pg_store;
pub mod registry;
pub mod store;
pub mod worker;

pub use events::{JobEvent, JobEventBus};
pub use job::{Job, JobStatus, ProgressDetails};
pub use pg_store::PostgresJobStore;
pub use registry::{JobRegistry, SharedJobRegistry};
pub use store::InMemoryJobStore;
pub use worker::{JobContext, WorkerPool, WorkerPoolConfig};

// Job type identifiers. These are wire-visible strings: clients submit them
// in `add_job` and receive them back in session snapshots.
pub const FLYER_PROCESSING: &str = "flyer-processing";
pub const PRIVATE_EVENT_PROCESSING: &str = "private-event-processing";
pub const CIVIC_ENGAGEMENT_PROCESSING: &str = "civic-engagement-processing";
pub const PERIODIC_CLEANUP: &str = "periodic-cleanup";
