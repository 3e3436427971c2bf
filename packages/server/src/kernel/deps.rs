//! Dependency container wired once at startup.
//!
//! Everything behind a `Base*` trait lives here so handlers, the gateway and
//! the dispatcher take the same bundle and tests can swap in mocks.

use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::kernel::jobs::JobEventBus;
use crate::kernel::sessions::SessionRegistry;
use crate::kernel::traits::{
    BaseExtractionService, BaseJobStore, BasePushNotificationService, BaseUserLookup,
};

#[derive(Clone, TypedBuilder)]
pub struct ServerDeps {
    pub job_store: Arc<dyn BaseJobStore>,
    #[builder(default)]
    pub job_events: JobEventBus,
    #[builder(default)]
    pub sessions: SessionRegistry,
    pub user_lookup: Arc<dyn BaseUserLookup>,
    pub push_service: Arc<dyn BasePushNotificationService>,
    pub extraction: Arc<dyn BaseExtractionService>,
}
