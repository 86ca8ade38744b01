// ============================================================================
// Collection State
// ============================================================================
//
// Every command takes a ticket from its collection when it is issued.
// Reconciliation compares tickets instead of trusting arrival order:
//
// - a full fetch older than the last applied full fetch is dropped;
// - a record written or removed by a command issued after a fetch keeps the
//   command's result when that fetch lands;
// - a command response for a record a newer fetch already delivered is kept
//   only when its `updated_at` is later than the cached copy;
// - anything issued before the last `clear` (sign-out) is dropped.
//
// ============================================================================

use crate::model::{Connection, Profile};
use crate::storage::EntityTable;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Loading/error/freshness flags shared by both collections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStatus {
    in_flight: usize,
    error: Option<String>,
    last_fetched: Option<DateTime<Utc>>,
}

impl CollectionStatus {
    /// True while at least one command on the collection is awaiting a response
    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Human-readable message of the last failed command, cleared when the
    /// next command starts
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.last_fetched
    }

    fn begin(&mut self) {
        self.in_flight += 1;
        self.error = None;
    }

    fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// Issues tickets and remembers the sign-out floor
#[derive(Debug, Clone, Default)]
struct Sequencer {
    next: u64,
    floor: u64,
}

impl Sequencer {
    fn issue(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    fn is_stale(&self, ticket: u64) -> bool {
        ticket <= self.floor
    }

    fn reset_floor(&mut self) {
        self.floor = self.next;
    }
}

// ============================================================================
// Connections
// ============================================================================

/// Cached connection graph of the signed-in user
#[derive(Debug, Clone, Default)]
pub struct ConnectionsState {
    table: EntityTable<Connection>,
    status: CollectionStatus,
    seq: Sequencer,
    applied_fetch: u64,
    written: HashMap<String, u64>,
    removed: HashMap<String, u64>,
}

impl ConnectionsState {
    pub fn table(&self) -> &EntityTable<Connection> {
        &self.table
    }

    pub fn status(&self) -> &CollectionStatus {
        &self.status
    }

    /// Pending phase: take a ticket, mark loading, clear the error
    pub(crate) fn begin(&mut self) -> u64 {
        self.status.begin();
        self.seq.issue()
    }

    /// Rejected phase: stop loading and keep the data as it is
    pub(crate) fn fail(&mut self, ticket: u64, message: String) {
        self.status.finish();
        if !self.seq.is_stale(ticket) {
            self.status.error = Some(message);
        }
    }

    /// Fulfilled phase of a full fetch. Returns false if the response was
    /// superseded and dropped.
    pub(crate) fn apply_fetch(
        &mut self,
        ticket: u64,
        records: Vec<Connection>,
        now: DateTime<Utc>,
    ) -> bool {
        self.status.finish();
        if self.seq.is_stale(ticket) || ticket < self.applied_fetch {
            return false;
        }

        let mut merged = Vec::with_capacity(records.len());
        let mut included = HashSet::new();

        for record in records {
            if self.removed.get(&record.id).is_some_and(|t| *t > ticket) {
                continue;
            }
            let newer_write = self.written.get(&record.id).is_some_and(|t| *t > ticket);
            let kept = if newer_write {
                self.table.get(&record.id).cloned().unwrap_or(record)
            } else {
                record
            };
            included.insert(kept.id.clone());
            merged.push(kept);
        }

        // Records created by commands issued after this fetch
        for (id, written_at) in &self.written {
            if *written_at > ticket && !included.contains(id) {
                if let Some(existing) = self.table.get(id) {
                    merged.push(existing.clone());
                }
            }
        }

        self.table.upsert_many(merged);
        self.applied_fetch = ticket;
        self.written.retain(|_, t| *t > ticket);
        self.removed.retain(|_, t| *t > ticket);
        self.status.last_fetched = Some(now);
        true
    }

    /// Fulfilled phase of a create/transition. Returns false if a newer
    /// command already decided this record's state, or a newer fetch
    /// delivered a version at least as recent.
    pub(crate) fn apply_upsert(
        &mut self,
        ticket: u64,
        record: Connection,
        now: DateTime<Utc>,
    ) -> bool {
        self.status.finish();
        if self.seq.is_stale(ticket) {
            return false;
        }

        let id = record.id.clone();
        let newer_write = self.written.get(&id).is_some_and(|t| *t > ticket);
        let newer_remove = self.removed.get(&id).is_some_and(|t| *t > ticket);
        // A fetch issued later may have been answered before the server
        // processed this command; the later server timestamp wins.
        let newer_fetch_has_it = self.applied_fetch > ticket
            && self
                .table
                .get(&id)
                .is_some_and(|cached| cached.updated_at >= record.updated_at);
        if newer_write || newer_remove || newer_fetch_has_it {
            return false;
        }

        self.table.upsert_one(record);
        self.written.insert(id.clone(), ticket);
        self.removed.remove(&id);
        self.status.last_fetched = Some(now);
        true
    }

    /// Fulfilled phase of a cancellation
    pub(crate) fn apply_remove(&mut self, ticket: u64, id: &str, now: DateTime<Utc>) -> bool {
        self.status.finish();
        if self.seq.is_stale(ticket) {
            return false;
        }

        self.table.remove(id);
        self.written.remove(id);
        self.removed.insert(id.to_string(), ticket);
        self.status.last_fetched = Some(now);
        true
    }

    /// Drop everything; responses to commands issued before now are ignored
    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.status = CollectionStatus::default();
        self.written.clear();
        self.removed.clear();
        self.seq.reset_floor();
        self.applied_fetch = self.seq.next;
    }
}

// ============================================================================
// Profile
// ============================================================================

/// The signed-in user's profile: zero or one record
#[derive(Debug, Clone, Default)]
pub struct ProfileState {
    table: EntityTable<Profile>,
    status: CollectionStatus,
    seq: Sequencer,
    applied: u64,
}

impl ProfileState {
    pub fn table(&self) -> &EntityTable<Profile> {
        &self.table
    }

    pub fn status(&self) -> &CollectionStatus {
        &self.status
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.table.first()
    }

    pub(crate) fn begin(&mut self) -> u64 {
        self.status.begin();
        self.seq.issue()
    }

    pub(crate) fn fail(&mut self, ticket: u64, message: String) {
        self.status.finish();
        if !self.seq.is_stale(ticket) {
            self.status.error = Some(message);
        }
    }

    /// Fulfilled phase of a fetch or write: the server's record replaces
    /// whatever is held. Returns false if a newer command already landed.
    pub(crate) fn apply(
        &mut self,
        ticket: u64,
        profile: Option<Profile>,
        now: DateTime<Utc>,
    ) -> bool {
        self.status.finish();
        if self.seq.is_stale(ticket) || ticket < self.applied {
            return false;
        }

        match profile {
            Some(profile) => self.table.upsert_many([profile]),
            None => self.table.clear(),
        }
        self.applied = ticket;
        self.status.last_fetched = Some(now);
        true
    }

    /// Restore a persisted profile without touching in-flight bookkeeping
    pub(crate) fn restore(
        &mut self,
        profile: Option<Profile>,
        last_fetched: Option<DateTime<Utc>>,
    ) {
        match profile {
            Some(profile) => self.table.upsert_many([profile]),
            None => self.table.clear(),
        }
        self.status.last_fetched = last_fetched;
    }

    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.status = CollectionStatus::default();
        self.seq.reset_floor();
        self.applied = self.seq.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ConnectionStatus;
    use chrono::TimeDelta;

    fn conn(id: &str, status: ConnectionStatus, created_at: DateTime<Utc>) -> Connection {
        Connection {
            id: id.into(),
            requester_id: "u1".into(),
            recipient_id: "u2".into(),
            status,
            message: None,
            created_at,
            updated_at: created_at,
            requester: None,
            recipient: None,
        }
    }

    #[test]
    fn test_loading_tracks_overlapping_commands() {
        let mut state = ConnectionsState::default();
        let a = state.begin();
        let b = state.begin();
        assert!(state.status().loading());

        state.fail(a, "boom".into());
        assert!(state.status().loading());
        assert_eq!(state.status().error(), Some("boom"));

        assert!(state.apply_fetch(b, vec![], Utc::now()));
        assert!(!state.status().loading());
        assert!(state.status().last_fetched().is_some());
    }

    #[test]
    fn test_begin_clears_error() {
        let mut state = ConnectionsState::default();
        let t = state.begin();
        state.fail(t, "boom".into());
        state.begin();
        assert_eq!(state.status().error(), None);
    }

    #[test]
    fn test_late_fetch_does_not_resurrect_status() {
        let now = Utc::now();
        let mut state = ConnectionsState::default();
        let initial = state.begin();
        state.apply_fetch(initial, vec![conn("c1", ConnectionStatus::Pending, now)], now);

        let fetch = state.begin();
        let transition = state.begin();
        let accepted = conn("c1", ConnectionStatus::Accepted, now);
        assert!(state.apply_upsert(transition, accepted, now));

        // The fetch captured the record before the transition
        assert!(state.apply_fetch(fetch, vec![conn("c1", ConnectionStatus::Pending, now)], now));
        assert_eq!(
            state.table().get("c1").map(|c| c.status),
            Some(ConnectionStatus::Accepted)
        );
    }

    #[test]
    fn test_late_fetch_keeps_new_and_removed_records() {
        let now = Utc::now();
        let mut state = ConnectionsState::default();
        let first = state.begin();
        state.apply_fetch(first, vec![conn("old", ConnectionStatus::Pending, now)], now);

        let fetch = state.begin();
        let create = state.begin();
        let cancel = state.begin();
        state.apply_upsert(
            create,
            conn("new", ConnectionStatus::Pending, now + TimeDelta::seconds(1)),
            now,
        );
        state.apply_remove(cancel, "old", now);

        state.apply_fetch(fetch, vec![conn("old", ConnectionStatus::Pending, now)], now);
        assert_eq!(state.table().ids(), &["new"]);
        assert!(state.table().is_consistent());
    }

    #[test]
    fn test_confirmed_transition_outlives_earlier_answered_fetch() {
        let now = Utc::now();
        let mut state = ConnectionsState::default();
        let initial = state.begin();
        state.apply_fetch(initial, vec![conn("c1", ConnectionStatus::Pending, now)], now);

        let transition = state.begin();
        let fetch = state.begin();
        // The fetch was answered before the server processed the transition
        assert!(state.apply_fetch(fetch, vec![conn("c1", ConnectionStatus::Pending, now)], now));

        let mut accepted = conn("c1", ConnectionStatus::Accepted, now);
        accepted.updated_at = now + TimeDelta::seconds(1);
        assert!(state.apply_upsert(transition, accepted, now));
        assert_eq!(
            state.table().get("c1").map(|c| c.status),
            Some(ConnectionStatus::Accepted)
        );
    }

    #[test]
    fn test_outdated_transition_loses_to_newer_fetch() {
        let now = Utc::now();
        let later = now + TimeDelta::seconds(5);
        let mut state = ConnectionsState::default();

        let transition = state.begin();
        let fetch = state.begin();
        let mut blocked = conn("c1", ConnectionStatus::Blocked, now);
        blocked.updated_at = later;
        assert!(state.apply_fetch(fetch, vec![blocked], later));

        let mut accepted = conn("c1", ConnectionStatus::Accepted, now);
        accepted.updated_at = now + TimeDelta::seconds(1);
        assert!(!state.apply_upsert(transition, accepted, later));
        assert_eq!(
            state.table().get("c1").map(|c| c.status),
            Some(ConnectionStatus::Blocked)
        );
        assert!(!state.status().loading());
    }

    #[test]
    fn test_mutation_response_stamps_freshness() {
        let now = Utc::now();
        let mut state = ConnectionsState::default();
        let create = state.begin();
        assert!(state.apply_upsert(create, conn("a", ConnectionStatus::Pending, now), now));
        assert_eq!(state.status().last_fetched(), Some(now));

        let later = now + TimeDelta::seconds(30);
        let cancel = state.begin();
        assert!(state.apply_remove(cancel, "a", later));
        assert_eq!(state.status().last_fetched(), Some(later));
        assert!(state.table().is_empty());
    }

    #[test]
    fn test_older_fetch_is_superseded() {
        let now = Utc::now();
        let mut state = ConnectionsState::default();
        let older = state.begin();
        let newer = state.begin();

        assert!(state.apply_fetch(newer, vec![conn("a", ConnectionStatus::Accepted, now)], now));
        assert!(!state.apply_fetch(older, vec![], now));
        assert_eq!(state.table().len(), 1);
        assert!(!state.status().loading());
    }

    #[test]
    fn test_clear_drops_in_flight_responses() {
        let now = Utc::now();
        let mut state = ConnectionsState::default();
        let fetch = state.begin();
        let create = state.begin();
        state.clear();

        assert!(!state.apply_fetch(fetch, vec![conn("a", ConnectionStatus::Pending, now)], now));
        assert!(!state.apply_upsert(create, conn("b", ConnectionStatus::Pending, now), now));
        state.fail(create, "late".into());
        assert!(state.table().is_empty());
        assert_eq!(state.status().error(), None);
        assert_eq!(state.status().last_fetched(), None);
    }

    #[test]
    fn test_profile_newest_issued_wins() {
        let now = Utc::now();
        let mut state = ProfileState::default();
        let fetch = state.begin();
        let write = state.begin();

        let mut written = Profile::new("u1", "Ada", now);
        written.bio = Some("updated".into());
        assert!(state.apply(write, Some(written), now));
        assert!(!state.apply(fetch, Some(Profile::new("u1", "Ada", now)), now));

        assert_eq!(
            state.profile().and_then(|p| p.bio.clone()),
            Some("updated".into())
        );
    }
}
