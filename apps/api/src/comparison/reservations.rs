//! PendingPair bookkeeping for one project.
//!
//! A reservation ties a pair to the session it was shown to. It expires
//! after a fixed TTL so a vanished reviewer never blocks a pair for good.
//! The book is not persisted and is only touched under the project lock.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::models::comparison::PairKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub pair: PairKey,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct ReservationBook {
    by_session: HashMap<String, Reservation>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops reservations whose TTL has run out. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.by_session.len();
        self.by_session.retain(|_, r| r.expires_at > now);
        before - self.by_session.len()
    }

    /// The session's own live reservation, if any.
    pub fn held_by(&self, session_id: &str) -> Option<Reservation> {
        self.by_session.get(session_id).copied()
    }

    /// Pairs currently reserved by sessions other than `session_id`.
    pub fn reserved_by_others(&self, session_id: &str) -> HashSet<PairKey> {
        self.by_session
            .iter()
            .filter(|(session, _)| session.as_str() != session_id)
            .map(|(_, r)| r.pair)
            .collect()
    }

    /// Reserves `pair` for `session_id`, replacing whatever it held before.
    pub fn reserve(
        &mut self,
        session_id: &str,
        pair: PairKey,
        now: Instant,
        ttl: Duration,
    ) -> Reservation {
        let reservation = Reservation {
            pair,
            expires_at: now + ttl,
        };
        self.by_session.insert(session_id.to_string(), reservation);
        reservation
    }

    /// Releases every reservation on `pair`, whoever holds it.
    pub fn release_pair(&mut self, pair: PairKey) {
        self.by_session.retain(|_, r| r.pair != pair);
    }

    pub fn release_session(&mut self, session_id: &str) -> Option<Reservation> {
        self.by_session.remove(session_id)
    }

    pub fn clear(&mut self) {
        self.by_session.clear();
    }

    pub fn len(&self) -> usize {
        self.by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_session.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn key(a: u128, b: u128) -> PairKey {
        PairKey::new(Uuid::from_u128(a), Uuid::from_u128(b))
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_reservation_expires_after_ttl() {
        let mut book = ReservationBook::new();
        book.reserve("alice", key(1, 2), Instant::now(), TTL);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(book.purge_expired(Instant::now()), 0);
        assert!(book.held_by("alice").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(book.purge_expired(Instant::now()), 1);
        assert!(book.held_by("alice").is_none());
    }

    #[test]
    fn test_others_excludes_own_session() {
        let mut book = ReservationBook::new();
        let now = Instant::now();
        book.reserve("alice", key(1, 2), now, TTL);
        book.reserve("bob", key(3, 4), now, TTL);

        let others = book.reserved_by_others("alice");
        assert_eq!(others.len(), 1);
        assert!(others.contains(&key(3, 4)));
    }

    #[test]
    fn test_session_holds_one_reservation() {
        let mut book = ReservationBook::new();
        let now = Instant::now();
        book.reserve("alice", key(1, 2), now, TTL);
        book.reserve("alice", key(1, 3), now, TTL);
        assert_eq!(book.len(), 1);
        assert_eq!(book.held_by("alice").map(|r| r.pair), Some(key(1, 3)));
    }

    #[test]
    fn test_release_pair_frees_holder() {
        let mut book = ReservationBook::new();
        let now = Instant::now();
        book.reserve("alice", key(1, 2), now, TTL);
        book.reserve("bob", key(3, 4), now, TTL);
        book.release_pair(key(2, 1));
        assert!(book.held_by("alice").is_none());
        assert!(book.held_by("bob").is_some());
        assert!(book.release_session("bob").is_some());
        assert!(book.is_empty());
    }
}
