//! Process-local session storage. Sessions do not survive a restart and are
//! not shared between instances.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::RwLock;

const SESSION_ID_LEN: usize = 48;

/// The authenticated admin a session is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: i32,
    pub admin_username: String,
}

#[derive(Debug)]
struct SessionRecord {
    identity: AdminIdentity,
    created_at: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Binds a fresh session id to `identity`.
    pub async fn create(&self, identity: AdminIdentity) -> String {
        let session_id = new_session_id();
        let ttl = self.ttl;

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, record| record.created_at.elapsed() < ttl);
        sessions.insert(
            session_id.clone(),
            SessionRecord {
                identity,
                created_at: Instant::now(),
            },
        );

        session_id
    }

    /// Returns the identity for a live session. An expired session is
    /// dropped and treated as absent; sessions are never renewed.
    pub async fn resolve(&self, session_id: &str) -> Option<AdminIdentity> {
        {
            let sessions = self.sessions.read().await;
            let record = sessions.get(session_id)?;
            if record.created_at.elapsed() < self.ttl {
                return Some(record.identity.clone());
            }
        }

        self.sessions.write().await.remove(session_id);
        None
    }

    pub async fn destroy(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}
