//! Bookkeeping for several live sessions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::error::RegistryError;
use crate::session::{SESSION_TARGET, Session};

/// Live sessions keyed by the process id of their editor.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<u32, Session>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session under its process id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Detached`] for sessions without a supervised
    /// process and [`RegistryError::Duplicate`] if the id is already taken.
    pub fn insert(&mut self, session: Session) -> Result<(), RegistryError> {
        let pid = session.pid().ok_or(RegistryError::Detached)?;
        match self.sessions.entry(pid) {
            Entry::Vacant(slot) => {
                slot.insert(session);
                debug!(target: SESSION_TARGET, pid, "registered session");
                Ok(())
            }
            Entry::Occupied(_) => Err(RegistryError::Duplicate { pid }),
        }
    }

    /// Looks up the session for `pid`.
    #[must_use]
    pub fn get(&self, pid: u32) -> Option<&Session> {
        self.sessions.get(&pid)
    }

    /// Removes the session for `pid` without shutting it down.
    pub fn remove(&mut self, pid: u32) -> Option<Session> {
        self.sessions.remove(&pid)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Process ids of every registered session.
    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.sessions.keys().copied()
    }

    /// Shuts down and forgets every session.
    pub fn shutdown_all(&mut self) {
        for (pid, session) in self.sessions.drain() {
            debug!(target: SESSION_TARGET, pid, "shutting down session");
            session.shutdown();
        }
    }
}
