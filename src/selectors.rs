//! Read-only derived views over committed state.
//!
//! Nothing here fetches or caches; every function recomputes from the table
//! it is given and is cheap enough to call on every render.

use crate::lifecycle::{ConnectionStatus, ViewerStatus, viewer_status};
use crate::model::{Connection, Profile, ProfileSummary};
use crate::storage::EntityTable;
use crate::store::ProfileState;

/// All connections, most recently created first
pub fn all_connections(table: &EntityTable<Connection>) -> Vec<&Connection> {
    table.iter().collect()
}

pub fn connection_by_id<'a>(
    table: &'a EntityTable<Connection>,
    id: &str,
) -> Option<&'a Connection> {
    table.get(id)
}

/// The record joining `viewer_id` and `other_id`.
///
/// If the pair has several records, the newest live one (pending or
/// accepted) wins, otherwise the newest of any status.
pub fn connection_between<'a>(
    table: &'a EntityTable<Connection>,
    viewer_id: &str,
    other_id: &str,
) -> Option<&'a Connection> {
    let mut newest = None;
    for connection in table.iter().filter(|c| c.joins(viewer_id, other_id)) {
        if connection.status.is_live() {
            return Some(connection);
        }
        newest.get_or_insert(connection);
    }
    newest
}

/// Label `viewer_id` sees for one record
pub fn viewer_status_of(viewer_id: &str, connection: &Connection) -> ViewerStatus {
    viewer_status(viewer_id, Some(connection))
}

/// Label `viewer_id` sees for their relationship with `other_id`;
/// `none` when no record exists
pub fn viewer_status_with(
    table: &EntityTable<Connection>,
    viewer_id: &str,
    other_id: &str,
) -> ViewerStatus {
    viewer_status(viewer_id, connection_between(table, viewer_id, other_id))
}

/// Records involving `viewer_id` whose viewer-relative label is `label`
pub fn connections_with_status<'a>(
    table: &'a EntityTable<Connection>,
    viewer_id: &str,
    label: ViewerStatus,
) -> Vec<&'a Connection> {
    table
        .iter()
        .filter(|c| c.involves(viewer_id) && viewer_status(viewer_id, Some(*c)) == label)
        .collect()
}

/// Requests waiting for `viewer_id` to answer
pub fn pending_received<'a>(
    table: &'a EntityTable<Connection>,
    viewer_id: &str,
) -> Vec<&'a Connection> {
    connections_with_status(table, viewer_id, ViewerStatus::PendingReceived)
}

/// Requests `viewer_id` sent that are still unanswered
pub fn pending_sent<'a>(
    table: &'a EntityTable<Connection>,
    viewer_id: &str,
) -> Vec<&'a Connection> {
    connections_with_status(table, viewer_id, ViewerStatus::PendingSent)
}

/// The other party of every accepted connection, sorted by name
pub fn accepted_peers<'a>(
    table: &'a EntityTable<Connection>,
    viewer_id: &str,
) -> Vec<&'a ProfileSummary> {
    let mut peers: Vec<&ProfileSummary> = table
        .iter()
        .filter(|c| c.status == ConnectionStatus::Accepted)
        .filter_map(|c| c.counterpart(viewer_id))
        .collect();

    peers.sort_by(|a, b| {
        a.full_name
            .to_lowercase()
            .cmp(&b.full_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    peers
}

/// Number of records per stored status, in [`ConnectionStatus::ALL`] order
pub fn status_counts(table: &EntityTable<Connection>) -> [(ConnectionStatus, usize); 4] {
    ConnectionStatus::ALL.map(|status| {
        let count = table.iter().filter(|c| c.status == status).count();
        (status, count)
    })
}

pub fn profile(state: &ProfileState) -> Option<&Profile> {
    state.profile()
}

pub fn display_name(state: &ProfileState) -> Option<String> {
    state.profile().map(Profile::display_name)
}

/// Developer access as computed by the server; false without a profile
pub fn is_developer(state: &ProfileState) -> bool {
    state.profile().is_some_and(|p| p.is_developer)
}
