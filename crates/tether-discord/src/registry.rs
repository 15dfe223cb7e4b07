//! Channel → session registry.
//!
//! Purely in-memory: sessions do not survive a restart, and there is no
//! cross-process coordination.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use tether_agent::{AiThread, BackendError, ThreadService};

use crate::queue::SerialQueue;

/// One conversation channel's pairing of backend thread and turn queue.
pub struct Session {
    pub thread: Arc<dyn AiThread>,
    pub queue: SerialQueue,
    pending_context: Mutex<Option<String>>,
}

impl Session {
    /// Take the seeded system context. Yields `Some` on the first turn only.
    pub async fn take_seeded_context(&self) -> Option<String> {
        self.pending_context.lock().await.take()
    }
}

/// Process-wide mapping from Discord channel to live session.
pub struct ChatRegistry {
    service: Arc<dyn ThreadService>,
    system_context: Option<String>,
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
}

impl ChatRegistry {
    pub fn new(service: Arc<dyn ThreadService>, system_context: Option<String>) -> Self {
        Self {
            service,
            system_context,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the channel's session, creating it (and its backend thread) on
    /// first contact. The map lock is held across thread creation so two
    /// concurrent first mentions cannot allocate two threads for one channel.
    pub async fn get_or_create(&self, channel_id: u64) -> Result<Arc<Session>, BackendError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&channel_id) {
            return Ok(Arc::clone(session));
        }

        let thread = self.service.create_thread().await?;
        let session = Arc::new(Session {
            thread,
            queue: SerialQueue::new(),
            pending_context: Mutex::new(self.system_context.clone()),
        });
        sessions.insert(channel_id, Arc::clone(&session));
        info!(channel_id, "session created");
        Ok(session)
    }

    /// Drop the channel's session. An in-flight turn on the removed session
    /// runs to completion on its own handle; nothing new reaches it. Returns
    /// whether a session existed.
    pub async fn clear(&self, channel_id: u64) -> bool {
        let existed = self.sessions.lock().await.remove(&channel_id).is_some();
        if existed {
            info!(channel_id, "session cleared");
        }
        existed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use tether_agent::{FilePayload, FileRef, StreamEvent, TurnRequest};

    struct StubThread;

    #[async_trait]
    impl AiThread for StubThread {
        async fn upload_file(&self, file: FilePayload) -> Result<FileRef, BackendError> {
            Ok(FileRef {
                id: "f".into(),
                name: file.name,
            })
        }

        async fn stream_turn(
            &self,
            _req: TurnRequest,
            _tx: mpsc::Sender<StreamEvent>,
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    struct StubService {
        created: AtomicUsize,
    }

    #[async_trait]
    impl ThreadService for StubService {
        async fn create_thread(&self) -> Result<Arc<dyn AiThread>, BackendError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubThread))
        }
    }

    fn registry(system_context: Option<String>) -> (Arc<StubService>, ChatRegistry) {
        let service = Arc::new(StubService {
            created: AtomicUsize::new(0),
        });
        let registry = ChatRegistry::new(Arc::clone(&service) as Arc<dyn ThreadService>, system_context);
        (service, registry)
    }

    #[tokio::test]
    async fn one_session_per_channel() {
        let (service, registry) = registry(None);
        let a = registry.get_or_create(1).await.unwrap();
        let b = registry.get_or_create(1).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(service.created.load(Ordering::SeqCst), 1);

        registry.get_or_create(2).await.unwrap();
        assert_eq!(service.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_then_mention_makes_a_fresh_session() {
        let (service, registry) = registry(None);
        let old = registry.get_or_create(7).await.unwrap();
        assert!(registry.clear(7).await);

        let fresh = registry.get_or_create(7).await.unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(service.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_without_session_is_a_noop() {
        let (_, registry) = registry(None);
        assert!(!registry.clear(42).await);
    }

    #[tokio::test]
    async fn seeded_context_is_taken_once() {
        let (_, registry) = registry(Some("you are helpful".into()));
        let session = registry.get_or_create(1).await.unwrap();
        assert_eq!(
            session.take_seeded_context().await.as_deref(),
            Some("you are helpful")
        );
        assert!(session.take_seeded_context().await.is_none());
    }
}
