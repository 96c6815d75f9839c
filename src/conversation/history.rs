//! In-memory dialog history, bounded per user.

use crate::UserId;

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a transcript. Serializes to the chat-completions message shape.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DialogTurn {
    pub role: Role,
    pub content: String,
}

impl DialogTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Recent turns per user. Nothing is persisted; a restart forgets everything.
#[derive(Debug)]
pub struct DialogHistory {
    capacity: usize,
    dialogs: RwLock<HashMap<UserId, VecDeque<DialogTurn>>>,
}

impl DialogHistory {
    /// `capacity` is clamped to at least one turn.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            dialogs: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a turn, evicting the oldest one when the user's queue is full.
    pub async fn append(&self, user_id: UserId, role: Role, content: impl Into<String>) {
        let mut dialogs = self.dialogs.write().await;
        let turns = dialogs
            .entry(user_id)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if turns.len() == self.capacity {
            turns.pop_front();
        }
        turns.push_back(DialogTurn::new(role, content));
    }

    /// Snapshot of a user's turns, oldest first. Empty for unknown users.
    pub async fn read(&self, user_id: UserId) -> Vec<DialogTurn> {
        self.dialogs
            .read()
            .await
            .get(&user_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for DialogHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
