use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, RpcError};

/// Proof of a registered pending request.
///
/// Deliberately neither `Clone` nor `Copy`: resolving or discarding consumes
/// the token, so an entry can be answered at most once.
#[derive(Debug)]
pub struct Token {
    correlation_id: u32,
}

impl Token {
    /// The correlation id this token was registered under.
    pub fn correlation_id(&self) -> u32 {
        self.correlation_id
    }
}

/// Bookkeeping for one request awaiting an external answer.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Method of the originating request, echoed in the response.
    pub method: u8,
    /// When the entry was registered, for expiry sweeps.
    pub registered_at: Instant,
}

/// Requests whose answer depends on an event outside the protocol layer.
///
/// Keyed by correlation id and scoped to one connection. Access is
/// internally synchronized so a host may share the table with the thread
/// delivering external events.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<u32, PendingEntry>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request.
    ///
    /// Fails with `AlreadyPending` while an entry for the same correlation
    /// id is outstanding; callers answer the duplicate with an error instead
    /// of silently overwriting the slot.
    pub fn register(&self, correlation_id: u32, method: u8) -> Result<Token> {
        let mut entries = self.lock();
        if entries.contains_key(&correlation_id) {
            return Err(RpcError::AlreadyPending(correlation_id));
        }
        entries.insert(
            correlation_id,
            PendingEntry {
                method,
                registered_at: Instant::now(),
            },
        );
        Ok(Token { correlation_id })
    }

    /// Consume a token, removing and returning its entry.
    ///
    /// Shared by the resolve and discard paths. Fails with `StaleToken` when
    /// the entry was already consumed, swept by expiry, or discarded on
    /// connection close.
    pub fn take(&self, token: Token) -> Result<PendingEntry> {
        self.lock()
            .remove(&token.correlation_id)
            .ok_or(RpcError::StaleToken(token.correlation_id))
    }

    /// Drop every entry, as on connection close. Returns how many were
    /// discarded.
    pub fn discard_all(&self) -> usize {
        let mut entries = self.lock();
        let discarded = entries.len();
        entries.clear();
        discarded
    }

    /// Remove and return entries older than `age`.
    pub fn expire_older_than(&self, age: Duration) -> Vec<(u32, PendingEntry)> {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired: Vec<u32> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.registered_at) >= age)
            .map(|(rid, _)| *rid)
            .collect();
        expired
            .into_iter()
            .filter_map(|rid| entries.remove(&rid).map(|entry| (rid, entry)))
            .collect()
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, PendingEntry>> {
        self.entries.lock().expect("pending table lock poisoned")
    }
}
