use super::{FetchOutcome, SyncStore};
use crate::core::{Result, SyncError};
use crate::freshness::should_fetch;
use crate::lifecycle::{ConnectionStatus, validate_cancel, validate_transition};
use crate::model::{Connection, NewConnectionRequest};
use tracing::{debug, warn};

impl SyncStore {
    /// Refresh the whole connection graph of the signed-in user.
    ///
    /// Skipped within the TTL unless `force` is set. A failure keeps the
    /// cached records and records the error.
    pub async fn fetch_connections(&self, force: bool) -> Result<FetchOutcome> {
        let Some(viewer) = self.viewer_id().await else {
            debug!("fetch_connections skipped: not signed in");
            return Ok(FetchOutcome::Unauthenticated);
        };

        let ticket = {
            let mut state = self.connections.write().await;
            let now = self.clock.now();
            if !should_fetch(state.status().last_fetched(), self.config.ttl, force, now) {
                debug!(viewer = %viewer, "fetch_connections skipped: cache is fresh");
                return Ok(FetchOutcome::Fresh);
            }
            state.begin()
        };

        let result = self.connection_transport.list_connections(&viewer).await;

        let mut state = self.connections.write().await;
        match result {
            Ok(records) => {
                let count = records.len();
                if state.apply_fetch(ticket, records, self.clock.now()) {
                    debug!(viewer = %viewer, count, ticket, "connections reconciled");
                    Ok(FetchOutcome::Fetched(count))
                } else {
                    debug!(viewer = %viewer, ticket, "connections response superseded");
                    Ok(FetchOutcome::Superseded)
                }
            }
            Err(err) => {
                let err = SyncError::from(err);
                warn!(viewer = %viewer, error = %err, "fetch_connections failed");
                state.fail(ticket, err.user_message());
                Err(err)
            }
        }
    }

    /// Send a connection request from the signed-in user to `recipient_id`.
    ///
    /// Nothing is inserted until the collaborator confirms, so a duplicate
    /// request surfaces as an error instead of a phantom record.
    pub async fn send_request(
        &self,
        recipient_id: &str,
        message: Option<&str>,
    ) -> Result<Option<Connection>> {
        let Some(viewer) = self.viewer_id().await else {
            debug!("send_request skipped: not signed in");
            return Ok(None);
        };

        let ticket = {
            let mut state = self.connections.write().await;
            let ticket = state.begin();
            if recipient_id.trim().is_empty() || recipient_id == viewer {
                let err = SyncError::validation("You cannot connect with yourself");
                state.fail(ticket, err.user_message());
                return Err(err);
            }
            ticket
        };

        let request = NewConnectionRequest {
            requester_id: viewer.clone(),
            recipient_id: recipient_id.to_string(),
            message: message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        };
        let result = self.connection_transport.create_connection(&request).await;

        let mut state = self.connections.write().await;
        match result {
            Ok(connection) => {
                debug!(
                    id = %connection.id,
                    requester = %viewer,
                    recipient = recipient_id,
                    "connection requested"
                );
                state.apply_upsert(ticket, connection.clone(), self.clock.now());
                Ok(Some(connection))
            }
            Err(err) => {
                let err = SyncError::from(err);
                warn!(recipient = recipient_id, error = %err, "send_request failed");
                state.fail(ticket, err.user_message());
                Err(err)
            }
        }
    }

    /// Move a connection to `target` on behalf of the signed-in user.
    ///
    /// Cached records are checked against the lifecycle rules first; a
    /// refused move leaves the record untouched. Records not in the cache are
    /// left for the collaborator to judge and inserted on success.
    pub async fn transition_connection(
        &self,
        id: &str,
        target: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        let Some(viewer) = self.viewer_id().await else {
            debug!("transition_connection skipped: not signed in");
            return Ok(None);
        };

        let ticket = {
            let mut state = self.connections.write().await;
            let ticket = state.begin();
            let refusal = state
                .table()
                .get(id)
                .and_then(|existing| validate_transition(Some(existing), &viewer, target).err());
            if let Some(refusal) = refusal {
                let err = SyncError::from(refusal);
                warn!(id, actor = %viewer, %target, error = %err, "transition refused");
                state.fail(ticket, err.user_message());
                return Err(err);
            }
            ticket
        };

        let result = self
            .connection_transport
            .update_connection_status(id, target)
            .await;

        let mut state = self.connections.write().await;
        match result {
            Ok(connection) => {
                debug!(id, status = %connection.status, "connection transitioned");
                state.apply_upsert(ticket, connection.clone(), self.clock.now());
                Ok(Some(connection))
            }
            Err(err) => {
                let err = SyncError::from(err);
                warn!(id, %target, error = %err, "transition_connection failed");
                state.fail(ticket, err.user_message());
                Err(err)
            }
        }
    }

    /// Accept a request received by the signed-in user
    pub async fn accept_request(&self, id: &str) -> Result<Option<Connection>> {
        self.transition_connection(id, ConnectionStatus::Accepted).await
    }

    /// Decline a request received by the signed-in user
    pub async fn decline_request(&self, id: &str) -> Result<Option<Connection>> {
        self.transition_connection(id, ConnectionStatus::Declined).await
    }

    /// Block the other participant of a pending or accepted connection
    pub async fn block_connection(&self, id: &str) -> Result<Option<Connection>> {
        self.transition_connection(id, ConnectionStatus::Blocked).await
    }

    /// Withdraw a pending request sent by the signed-in user.
    ///
    /// The only hard delete: on success the record leaves the cache.
    /// Returns `Ok(false)` when nobody is signed in.
    pub async fn cancel_request(&self, id: &str) -> Result<bool> {
        let Some(viewer) = self.viewer_id().await else {
            debug!("cancel_request skipped: not signed in");
            return Ok(false);
        };

        let ticket = {
            let mut state = self.connections.write().await;
            let ticket = state.begin();
            let refusal = state
                .table()
                .get(id)
                .and_then(|existing| validate_cancel(Some(existing), &viewer).err());
            if let Some(refusal) = refusal {
                let err = SyncError::from(refusal);
                warn!(id, actor = %viewer, error = %err, "cancel refused");
                state.fail(ticket, err.user_message());
                return Err(err);
            }
            ticket
        };

        let result = self.connection_transport.delete_connection(id).await;

        let mut state = self.connections.write().await;
        match result {
            Ok(()) => {
                debug!(id, "connection request cancelled");
                state.apply_remove(ticket, id, self.clock.now());
                Ok(true)
            }
            Err(err) => {
                let err = SyncError::from(err);
                warn!(id, error = %err, "cancel_request failed");
                state.fail(ticket, err.user_message());
                Err(err)
            }
        }
    }
}
