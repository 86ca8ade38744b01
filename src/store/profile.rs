use super::{FetchOutcome, SyncStore};
use crate::core::{Result, SyncError};
use crate::freshness::should_fetch;
use crate::model::{Profile, ProfileUpdate};
use tracing::{debug, warn};

impl SyncStore {
    /// Refresh the signed-in user's profile.
    ///
    /// Skipped within the TTL unless `force` is set; a profile restored from
    /// the persisted session keeps its original fetch time.
    pub async fn fetch_profile(&self, force: bool) -> Result<FetchOutcome> {
        let Some(viewer) = self.viewer_id().await else {
            debug!("fetch_profile skipped: not signed in");
            return Ok(FetchOutcome::Unauthenticated);
        };

        let ticket = {
            let mut state = self.profile.write().await;
            let now = self.clock.now();
            if !should_fetch(state.status().last_fetched(), self.config.ttl, force, now) {
                debug!(viewer = %viewer, "fetch_profile skipped: cache is fresh");
                return Ok(FetchOutcome::Fresh);
            }
            state.begin()
        };

        let result = self.profile_repository.get_profile(&viewer).await;

        let applied = {
            let mut state = self.profile.write().await;
            match result {
                Ok(profile) => {
                    let count = usize::from(profile.is_some());
                    state.apply(ticket, profile, self.clock.now()).then_some(count)
                }
                Err(err) => {
                    let err = SyncError::from(err);
                    warn!(viewer = %viewer, error = %err, "fetch_profile failed");
                    state.fail(ticket, err.user_message());
                    return Err(err);
                }
            }
        };

        match applied {
            Some(count) => {
                self.persist_session().await;
                Ok(FetchOutcome::Fetched(count))
            }
            None => Ok(FetchOutcome::Superseded),
        }
    }

    /// Write a partial update of the signed-in user's profile.
    ///
    /// The held profile is replaced by the server's answer, never merged
    /// locally: derived fields such as the developer flag only come from the
    /// write path.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Option<Profile>> {
        let Some(viewer) = self.viewer_id().await else {
            debug!("update_profile skipped: not signed in");
            return Ok(None);
        };

        let ticket = {
            let mut state = self.profile.write().await;
            let ticket = state.begin();
            if let Err(err) = update.validate() {
                warn!(viewer = %viewer, error = %err, "profile update rejected");
                state.fail(ticket, err.user_message());
                return Err(err);
            }
            ticket
        };

        let result = self
            .profile_repository
            .update_profile(&viewer, &update)
            .await;

        let applied = {
            let mut state = self.profile.write().await;
            match result {
                Ok(profile) => {
                    debug!(viewer = %viewer, fields = update.fields().len(), "profile updated");
                    state.apply(ticket, Some(profile.clone()), self.clock.now());
                    profile
                }
                Err(err) => {
                    let err = SyncError::from(err);
                    warn!(viewer = %viewer, error = %err, "update_profile failed");
                    state.fail(ticket, err.user_message());
                    return Err(err);
                }
            }
        };

        self.persist_session().await;
        Ok(Some(applied))
    }
}
