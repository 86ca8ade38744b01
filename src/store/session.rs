use super::SyncStore;
use crate::core::{Result, UserId};
use crate::model::AuthIdentity;
use crate::persist::PersistedSession;
use tracing::{debug, info, warn};

impl SyncStore {
    /// Id of the signed-in user, if any
    pub async fn viewer_id(&self) -> Option<UserId> {
        self.auth.read().await.as_ref().map(|a| a.user_id.clone())
    }

    pub async fn auth_identity(&self) -> Option<AuthIdentity> {
        self.auth.read().await.clone()
    }

    /// Restore the persisted session, if one exists.
    ///
    /// Call once before first use. Only the auth identity and the profile come
    /// back; the connection graph always starts empty. Returns true when a
    /// session was restored.
    pub async fn rehydrate(&self) -> Result<bool> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let Some(session) = persistence.load()? else {
            return Ok(false);
        };

        let viewer = session.auth.as_ref().map(|a| a.user_id.clone());
        // A profile that does not belong to the restored identity is dropped.
        let profile = session
            .profile
            .filter(|p| viewer.as_deref() == Some(p.id.as_str()));
        let restored_profile = profile.is_some();

        *self.auth.write().await = session.auth;
        self.profile.write().await.restore(
            profile,
            session.profile_last_fetched.filter(|_| restored_profile),
        );

        info!(
            viewer = viewer.as_deref().unwrap_or("-"),
            restored_profile, "session rehydrated"
        );
        Ok(true)
    }

    /// Start a session for `identity`.
    ///
    /// Switching to a different user tears down the previous user's slices
    /// first.
    pub async fn sign_in(&self, identity: AuthIdentity) {
        {
            let mut auth = self.auth.write().await;
            let switching = auth
                .as_ref()
                .is_some_and(|current| current.user_id != identity.user_id);
            if switching {
                self.connections.write().await.clear();
                self.profile.write().await.clear();
            }
            debug!(viewer = %identity.user_id, switching, "signed in");
            *auth = Some(identity);
        }
        self.persist_session().await;
    }

    /// End the session: clears every slice and the persisted snapshot.
    ///
    /// Responses to commands still in flight are ignored when they land.
    pub async fn sign_out(&self) -> Result<()> {
        let _guard = self.session_guard.lock().await;
        *self.auth.write().await = None;
        self.connections.write().await.clear();
        self.profile.write().await.clear();

        if let Some(persistence) = &self.persistence {
            persistence.clear()?;
        }
        debug!("signed out");
        Ok(())
    }

    /// Write the whitelisted slices to session storage.
    ///
    /// The snapshot is taken and written under `session_guard`. Once signed
    /// out, the stored snapshot is removed instead of rewritten. A storage
    /// failure is logged; it never fails the command that changed the state.
    pub(crate) async fn persist_session(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let _guard = self.session_guard.lock().await;

        let Some(auth) = self.auth.read().await.clone() else {
            if let Err(err) = persistence.clear() {
                warn!(key = persistence.key(), error = %err, "failed to clear session");
            }
            return;
        };
        let (profile, last_fetched) = {
            let state = self.profile.read().await;
            (state.profile().cloned(), state.status().last_fetched())
        };

        let session = PersistedSession::new(Some(auth), profile, last_fetched);
        if let Err(err) = persistence.save(&session) {
            warn!(key = persistence.key(), error = %err, "failed to persist session");
        }
    }
}
