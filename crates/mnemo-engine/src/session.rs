// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded session buffers with LRU capacity eviction and TTL expiry.
//!
//! One coarse lock guards the whole map; contention is low because every
//! operation is a short in-memory mutation. A round is one user turn
//! followed by one assistant turn; when a session accumulates
//! `summary_trigger_rounds` rounds, `append` drains and returns the window
//! for reflection.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mnemo_config::SessionManagerConfig;
use mnemo_core::{DialogueMessage, Role};
use tracing::debug;

struct SessionEntry {
    messages: VecDeque<DialogueMessage>,
    rounds_since_reflection: u32,
    last_touched: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            rounds_since_reflection: 0,
            last_touched: Instant::now(),
        }
    }
}

/// Bounded map of session id -> rolling dialogue buffer.
pub struct SessionManager {
    inner: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    ttl: Duration,
    max_history: usize,
    trigger_rounds: u32,
}

impl SessionManager {
    pub fn new(config: &SessionManagerConfig, trigger_rounds: u32) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_sessions: config.max_sessions.max(1),
            ttl: Duration::from_secs(config.session_ttl),
            max_history: config.max_history_messages.max(2),
            trigger_rounds: trigger_rounds.max(1),
        }
    }

    /// Append a message to a session buffer.
    ///
    /// An assistant message directly following a user message closes a
    /// round. When the round counter reaches the trigger, the buffered
    /// window is drained and returned for reflection, and the counter
    /// resets.
    pub fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        timestamp: i64,
    ) -> Option<Vec<DialogueMessage>> {
        let mut map = self.inner.lock().expect("session lock poisoned");
        self.expire_locked(&mut map, session_id);

        if !map.contains_key(session_id) && map.len() >= self.max_sessions {
            evict_lru(&mut map);
        }
        let entry = map
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::new);

        let closes_round = role == Role::Assistant
            && entry.messages.back().is_some_and(|m| m.role == Role::User);
        if closes_round {
            entry.rounds_since_reflection += 1;
        }

        entry.messages.push_back(DialogueMessage {
            role,
            content: content.to_string(),
            timestamp,
        });
        while entry.messages.len() > self.max_history {
            entry.messages.pop_front();
        }
        entry.last_touched = Instant::now();

        if entry.rounds_since_reflection >= self.trigger_rounds {
            let window: Vec<DialogueMessage> = entry.messages.drain(..).collect();
            entry.rounds_since_reflection = 0;
            debug!(session_id, messages = window.len(), "reflection window drained");
            return Some(window);
        }
        None
    }

    /// Current buffer contents, refreshing the LRU position.
    pub fn get(&self, session_id: &str) -> Option<Vec<DialogueMessage>> {
        let mut map = self.inner.lock().expect("session lock poisoned");
        self.expire_locked(&mut map, session_id);
        map.get_mut(session_id).map(|entry| {
            entry.last_touched = Instant::now();
            entry.messages.iter().cloned().collect()
        })
    }

    /// Remove every expired session. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut map = self.inner.lock().expect("session lock poisoned");
        let before = map.len();
        let ttl = self.ttl;
        map.retain(|_, entry| entry.last_touched.elapsed() <= ttl);
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, "expired sessions swept");
        }
        removed
    }

    /// Number of tracked sessions, expired entries included until swept.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("session lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expire_locked(&self, map: &mut HashMap<String, SessionEntry>, session_id: &str) {
        if let Some(entry) = map.get(session_id)
            && entry.last_touched.elapsed() > self.ttl
        {
            map.remove(session_id);
        }
    }
}

fn evict_lru(map: &mut HashMap<String, SessionEntry>) {
    let oldest = map
        .iter()
        .min_by_key(|(_, entry)| entry.last_touched)
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        debug!(session_id = %id, "evicting least recently touched session");
        map.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_sessions: usize, ttl_secs: u64) -> SessionManagerConfig {
        SessionManagerConfig {
            max_sessions,
            session_ttl: ttl_secs,
            max_history_messages: 40,
        }
    }

    #[test]
    fn round_counting_requires_user_then_assistant() {
        let mgr = SessionManager::new(&config(10, 3600), 2);

        assert!(mgr.append("s1", Role::User, "hi", 1).is_none());
        assert!(mgr.append("s1", Role::Assistant, "hello", 2).is_none());
        // Two assistant messages in a row close no extra round.
        assert!(mgr.append("s1", Role::Assistant, "still me", 3).is_none());
        assert!(mgr.append("s1", Role::User, "ok", 4).is_none());
        let window = mgr.append("s1", Role::Assistant, "done", 5);
        assert!(window.is_some(), "second round should trigger");
        let window = window.unwrap();
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].content, "hi");
    }

    #[test]
    fn trigger_resets_counter_and_buffer() {
        let mgr = SessionManager::new(&config(10, 3600), 1);
        mgr.append("s1", Role::User, "a", 1);
        assert!(mgr.append("s1", Role::Assistant, "b", 2).is_some());

        // Buffer drained; next round starts fresh.
        assert!(mgr.get("s1").unwrap().is_empty());
        mgr.append("s1", Role::User, "c", 3);
        let window = mgr.append("s1", Role::Assistant, "d", 4).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "c");
    }

    #[test]
    fn capacity_evicts_least_recently_touched() {
        let mgr = SessionManager::new(&config(2, 3600), 10);
        mgr.append("a", Role::User, "1", 1);
        mgr.append("b", Role::User, "2", 2);
        // Touch "a" so "b" becomes the eviction candidate.
        mgr.get("a");
        mgr.append("c", Role::User, "3", 3);

        assert_eq!(mgr.len(), 2);
        assert!(mgr.get("a").is_some());
        assert!(mgr.get("b").is_none());
        assert!(mgr.get("c").is_some());
    }

    #[test]
    fn ttl_expires_lazily_on_access() {
        let mgr = SessionManager::new(&config(10, 0), 10);
        mgr.append("s1", Role::User, "hi", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(mgr.get("s1").is_none(), "expired session should be gone");
    }

    #[test]
    fn sweep_removes_expired_sessions() {
        let mgr = SessionManager::new(&config(10, 0), 10);
        mgr.append("s1", Role::User, "hi", 1);
        mgr.append("s2", Role::User, "hi", 2);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(mgr.sweep(), 2);
        assert!(mgr.is_empty());
    }

    #[test]
    fn history_bound_drops_oldest_messages() {
        let cfg = SessionManagerConfig {
            max_sessions: 10,
            session_ttl: 3600,
            max_history_messages: 4,
        };
        let mgr = SessionManager::new(&cfg, 100);
        for i in 0..6 {
            mgr.append("s1", Role::User, &format!("m{i}"), i);
        }
        let buffer = mgr.get("s1").unwrap();
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer[0].content, "m2");
    }

    #[test]
    fn sessions_are_independent() {
        let mgr = SessionManager::new(&config(10, 3600), 1);
        mgr.append("s1", Role::User, "a", 1);
        mgr.append("s2", Role::User, "b", 2);
        assert!(mgr.append("s1", Role::Assistant, "r", 3).is_some());
        // s2's round counter is untouched.
        assert_eq!(mgr.get("s2").unwrap().len(), 1);
    }
}
