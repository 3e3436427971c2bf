//! Mock implementations of the `Base*` traits for tests.
//!
//! Mocks record their calls in `Arc<Mutex<Vec<...>>>` so assertions can
//! inspect exactly what a component asked for.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{InMemoryJobStore, JobEventBus};
use crate::kernel::sessions::SessionRegistry;
use crate::kernel::traits::{
    BaseExtractionService, BasePushNotificationService, BaseUserLookup, DeliveryReceipt,
    PushMessage, Recipient,
};

// ============================================================================
// User lookup
// ============================================================================

/// Lookup backed by a fixed list of recipients.
#[derive(Default, Clone)]
pub struct MockUserLookup {
    recipients: Arc<Mutex<Vec<Recipient>>>,
}

impl MockUserLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipient(self, id: &str, push_token: Option<&str>) -> Self {
        self.recipients.lock().unwrap().push(Recipient {
            id: id.to_string(),
            push_token: push_token.map(String::from),
        });
        self
    }
}

#[async_trait]
impl BaseUserLookup for MockUserLookup {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Recipient>> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == user_id)
            .cloned())
    }
}

// ============================================================================
// Push notifications
// ============================================================================

/// Records every (recipient id, message) pair instead of sending.
#[derive(Default, Clone)]
pub struct MockPushNotificationService {
    sent: Arc<Mutex<Vec<(String, PushMessage)>>>,
    fail: bool,
}

impl MockPushNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variant whose every send fails, for error-suppression tests.
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub fn sent_messages(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn was_sent_with_title(&self, title: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|(_, m)| m.title == title)
    }
}

#[async_trait]
impl BasePushNotificationService for MockPushNotificationService {
    async fn send_to_user(
        &self,
        recipient: &Recipient,
        message: &PushMessage,
    ) -> Result<DeliveryReceipt> {
        if self.fail {
            return Err(anyhow!("push provider unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.id.clone(), message.clone()));
        Ok(DeliveryReceipt {
            success: 1,
            failed: 0,
        })
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Pops queued results in order; errs when the queue runs dry.
#[derive(Default, Clone)]
pub struct MockExtractionService {
    results: Arc<Mutex<Vec<Result<serde_json::Value>>>>,
}

impl MockExtractionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_result(self, result: serde_json::Value) -> Self {
        self.results.lock().unwrap().push(Ok(result));
        self
    }

    pub fn queue_error(self, message: &str) -> Self {
        self.results.lock().unwrap().push(Err(anyhow!("{message}")));
        self
    }
}

#[async_trait]
impl BaseExtractionService for MockExtractionService {
    async fn extract(
        &self,
        _job_type: &str,
        _payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            return Err(anyhow!("no queued extraction result"));
        }
        results.remove(0)
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Fully mocked [`ServerDeps`] for integration tests.
pub struct TestDependencies {
    pub store: Arc<InMemoryJobStore>,
    pub events: JobEventBus,
    pub sessions: SessionRegistry,
    pub users: MockUserLookup,
    pub push: MockPushNotificationService,
    pub extraction: MockExtractionService,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryJobStore::new()),
            events: JobEventBus::new(),
            sessions: SessionRegistry::new(),
            users: MockUserLookup::new(),
            push: MockPushNotificationService::new(),
            extraction: MockExtractionService::new(),
        }
    }

    pub fn into_deps(self) -> ServerDeps {
        ServerDeps::builder()
            .job_store(self.store)
            .job_events(self.events)
            .sessions(self.sessions)
            .user_lookup(Arc::new(self.users))
            .push_service(Arc::new(self.push))
            .extraction(Arc::new(self.extraction))
            .build()
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
