use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// One user's session: an identifier plus the typed workflow state it owns.
///
/// The state is an explicit value object, not an ambient key-value bag; every
/// mutation goes through loading the session, producing the next state and
/// saving it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session<S> {
    pub id: String,
    pub state: S,
}

impl<S> Session<S> {
    pub fn new(id: impl Into<String>, state: S) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage<S>: Send + Sync {
    async fn save(&self, session: Session<S>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session<S>>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage<S> {
    sessions: Arc<DashMap<String, Session<S>>>,
}

impl<S> InMemorySessionStorage<S> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl<S> Default for InMemorySessionStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> SessionStorage<S> for InMemorySessionStorage<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn save(&self, session: Session<S>) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<S>>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
