//! Session registry: session id → tracked jobs + live connections.
//!
//! Sessions are in-memory only. A process restart loses them; clients
//! re-create or re-join, and the Job Store remains the source of truth for
//! job state. Sessions with zero connections are kept so a reconnecting
//! client can pick its tracked set back up.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::ServerMessage;

/// Outbound channel for one WebSocket connection. The socket task owns the
/// receiving end and writes frames to the wire.
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Default)]
struct SessionEntry {
    job_ids: HashSet<Uuid>,
    connections: HashMap<Uuid, ConnectionSender>,
}

/// Shared registry of live sessions. Clone is cheap (Arc inside).
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session with the given connection attached.
    pub async fn create_session(&self, conn_id: Uuid, sender: ConnectionSender) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut entry = SessionEntry::default();
        entry.connections.insert(conn_id, sender);
        self.sessions.write().await.insert(session_id, entry);
        debug!(session_id = %session_id, conn_id = %conn_id, "session created");
        session_id
    }

    /// Attach a connection to a session, creating the session if the id is
    /// unknown. Re-joining is idempotent.
    pub async fn join(&self, session_id: Uuid, conn_id: Uuid, sender: ConnectionSender) {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session_id).or_default();
        entry.connections.insert(conn_id, sender);
        debug!(session_id = %session_id, conn_id = %conn_id, "connection joined session");
    }

    /// Remove a connection from a session (socket closed). The session and
    /// its tracked set survive for later re-joins.
    pub async fn detach(&self, session_id: Uuid, conn_id: Uuid) {
        if let Some(entry) = self.sessions.write().await.get_mut(&session_id) {
            entry.connections.remove(&conn_id);
            debug!(session_id = %session_id, conn_id = %conn_id, "connection detached");
        }
    }

    /// Track a job in a session. Returns `false` for unknown sessions;
    /// re-adding an already-tracked job is fine.
    pub async fn add_job(&self, session_id: Uuid, job_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(entry) => {
                entry.job_ids.insert(job_id);
                true
            }
            None => false,
        }
    }

    /// Empty a session's tracked set. Returns `false` for unknown sessions.
    pub async fn clear_jobs(&self, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(entry) => {
                entry.job_ids.clear();
                true
            }
            None => false,
        }
    }

    /// The job ids a session tracks, or `None` for unknown sessions.
    pub async fn tracked_jobs(&self, session_id: Uuid) -> Option<Vec<Uuid>> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|e| e.job_ids.iter().copied().collect())
    }

    /// Whether a session tracks a given job.
    pub async fn tracks(&self, session_id: Uuid, job_id: Uuid) -> bool {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .is_some_and(|e| e.job_ids.contains(&job_id))
    }

    /// Every session currently tracking `job_id`. Multiple sessions may
    /// track the same job.
    pub async fn sessions_tracking(&self, job_id: Uuid) -> Vec<Uuid> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.job_ids.contains(&job_id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Send a message to every connection in a session. Closed channels are
    /// pruned on the spot.
    pub async fn broadcast(&self, session_id: Uuid, message: &ServerMessage) {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(&session_id) else {
            return;
        };

        entry.connections.retain(|conn_id, sender| {
            match sender.send(message.clone()) {
                Ok(()) => true,
                Err(_) => {
                    warn!(session_id = %session_id, conn_id = %conn_id,
                        "dropping closed connection");
                    false
                }
            }
        });
    }

    pub async fn connection_count(&self, session_id: Uuid) -> usize {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map_or(0, |e| e.connections.len())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ids of every live session.
    pub async fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Drop sessions with no connections and no tracked jobs.
    pub async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| !e.connections.is_empty() || !e.job_ids.is_empty());
        before - sessions.len()
    }

    /// Run [`cleanup`](Self::cleanup) on a fixed interval until `shutdown`
    /// fires. Joins with unknown ids allocate entries, so without this the
    /// map only ever grows.
    pub fn spawn_cleanup(
        &self,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = registry.cleanup().await;
                        if reaped > 0 {
                            debug!(reaped, "reaped idle sessions");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (ConnectionSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn create_then_track_and_query() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let session_id = registry.create_session(Uuid::new_v4(), tx).await;

        let job_id = Uuid::new_v4();
        assert!(registry.add_job(session_id, job_id).await);
        assert!(registry.tracks(session_id, job_id).await);
        assert_eq!(registry.tracked_jobs(session_id).await.unwrap(), vec![job_id]);
        assert_eq!(registry.sessions_tracking(job_id).await, vec![session_id]);
    }

    #[tokio::test]
    async fn join_unknown_session_creates_it_empty() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let session_id = Uuid::new_v4();
        registry.join(session_id, Uuid::new_v4(), tx).await;

        assert_eq!(registry.connection_count(session_id).await, 1);
        assert!(registry.tracked_jobs(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_job_is_idempotent() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let session_id = registry.create_session(Uuid::new_v4(), tx).await;
        let job_id = Uuid::new_v4();

        assert!(registry.add_job(session_id, job_id).await);
        assert!(registry.add_job(session_id, job_id).await);
        assert_eq!(registry.tracked_jobs(session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_tracked_set_but_keeps_session() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let session_id = registry.create_session(Uuid::new_v4(), tx).await;
        registry.add_job(session_id, Uuid::new_v4()).await;

        assert!(registry.clear_jobs(session_id).await);
        assert!(registry.tracked_jobs(session_id).await.unwrap().is_empty());
        assert_eq!(registry.connection_count(session_id).await, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let registry = SessionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let session_id = registry.create_session(Uuid::new_v4(), tx1).await;
        registry.join(session_id, Uuid::new_v4(), tx2).await;

        let msg = ServerMessage::SessionUpdate {
            session_id,
            jobs: vec![],
        };
        registry.broadcast(session_id, &msg).await;

        assert_eq!(rx1.recv().await.unwrap(), msg);
        assert_eq!(rx2.recv().await.unwrap(), msg);
    }

    #[tokio::test]
    async fn broadcast_prunes_closed_connections() {
        let registry = SessionRegistry::new();
        let (tx1, rx1) = channel();
        let (tx2, _rx2) = channel();
        let session_id = registry.create_session(Uuid::new_v4(), tx1).await;
        registry.join(session_id, Uuid::new_v4(), tx2).await;
        drop(rx1);

        registry
            .broadcast(
                session_id,
                &ServerMessage::SessionUpdate {
                    session_id,
                    jobs: vec![],
                },
            )
            .await;
        assert_eq!(registry.connection_count(session_id).await, 1);
    }

    #[tokio::test]
    async fn detached_session_survives_for_rejoin() {
        let registry = SessionRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();
        let session_id = registry.create_session(conn, tx).await;
        let job_id = Uuid::new_v4();
        registry.add_job(session_id, job_id).await;

        registry.detach(session_id, conn).await;
        assert_eq!(registry.connection_count(session_id).await, 0);

        let (tx2, _rx2) = channel();
        registry.join(session_id, Uuid::new_v4(), tx2).await;
        assert!(registry.tracks(session_id, job_id).await);
    }

    #[tokio::test]
    async fn cleanup_drops_only_empty_sessions() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let conn = Uuid::new_v4();
        let empty = registry.create_session(conn, tx).await;
        registry.detach(empty, conn).await;

        let (tx2, _rx2) = channel();
        let live = registry.create_session(Uuid::new_v4(), tx2).await;
        registry.add_job(live, Uuid::new_v4()).await;

        assert_eq!(registry.cleanup().await, 1);
        assert_eq!(registry.session_count().await, 1);
        assert!(registry.tracked_jobs(live).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_cleanup_reaps_idle_sessions() {
        let registry = SessionRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();
        let session_id = registry.create_session(conn, tx).await;
        registry.detach(session_id, conn).await;

        let shutdown = CancellationToken::new();
        let handle = registry.spawn_cleanup(Duration::from_secs(60), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.session_count().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
