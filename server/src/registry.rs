//! Registry of live sessions and the broadcast fan-out primitive
//!
//! The registry is the only state shared between connection tasks. It
//! stores weak handles so that membership says nothing about lifetime:
//! a session's handle stays alive for as long as its own task or an
//! in-progress broadcast holds a strong reference to it.
//!
//! Access goes through a single `RwLock` (see [`SharedRegistry`]).
//! Insertions and removals take the write lock, fan-out takes the read
//! lock, so a broadcast never iterates while the map is being mutated.

use crate::session::{SessionHandle, SessionId};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

/// Registry shared by the listener and every session task
pub type SharedRegistry = Arc<RwLock<SessionRegistry>>;

/// Set of sessions whose read loop is currently active
#[derive(Debug)]
pub struct SessionRegistry {
    /// Non-owning handles indexed by session ID
    sessions: HashMap<SessionId, Weak<SessionHandle>>,
    /// Next ID handed out to a new connection
    next_session_id: SessionId,
}

impl SessionRegistry {
    /// Creates an empty registry. Session IDs start from 1.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Creates an empty registry wrapped for sharing between tasks
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Allocates a fresh session ID
    pub fn next_id(&mut self) -> SessionId {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    /// Makes a session visible to broadcast fan-out.
    ///
    /// Called exactly once per session, when it starts. A repeated insert
    /// for the same ID replaces the previous handle.
    pub fn add(&mut self, handle: &Arc<SessionHandle>) {
        self.sessions.insert(handle.id(), Arc::downgrade(handle));
        info!(
            "Session {} registered from {} ({} online)",
            handle.id(),
            handle.peer(),
            self.sessions.len()
        );
    }

    /// Removes a session from the registry
    ///
    /// Returns true if the session was present. Removing an absent session
    /// is a no-op, so tear-down can run in any order.
    pub fn remove(&mut self, id: SessionId) -> bool {
        if self.sessions.remove(&id).is_some() {
            info!(
                "Session {} unregistered ({} online)",
                id,
                self.sessions.len()
            );
            true
        } else {
            false
        }
    }

    /// Delivers `text` once to every registered session except `sender`
    ///
    /// Takes a snapshot of the live handles first, so each session is
    /// visited at most once. Handles whose session has already been dropped
    /// are skipped. Returns the number of sessions the text was handed to.
    pub fn broadcast(&self, sender: SessionId, text: &str) -> usize {
        let targets: Vec<Arc<SessionHandle>> = self
            .sessions
            .iter()
            .filter(|(id, _)| **id != sender)
            .filter_map(|(_, handle)| handle.upgrade())
            .collect();

        for target in &targets {
            target.deliver(text.to_string());
        }

        debug!(
            "Session {} broadcast to {} session(s)",
            sender,
            targets.len()
        );
        targets.len()
    }

    /// Returns true if the session is currently registered
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Returns the number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
