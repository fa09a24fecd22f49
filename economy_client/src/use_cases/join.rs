// Two-step join (fetch a code, then join with it), heartbeat, and session persistence.

use crate::domain::{
    AuthGateway, ClientError, JoinCode, JoinRequest, PlayerId, Role, Session, SessionStore,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct JoinClient {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn SessionStore>,
}

impl JoinClient {
    pub fn new(auth: Arc<dyn AuthGateway>, store: Arc<dyn SessionStore>) -> Self {
        Self { auth, store }
    }

    pub async fn get_join_code(&self) -> Result<JoinCode, ClientError> {
        self.auth.get_join_code().await
    }

    // Codes are not reserved, so a failure between the two steps just means fetching a
    // fresh one next time.
    #[tracing::instrument(name = "join", skip_all, fields(player_name = %player_name, %role))]
    pub async fn join(
        &self,
        player_name: &str,
        role: Role,
        superuser_token: Option<&str>,
    ) -> Result<Session, ClientError> {
        let player_name = player_name.trim();
        if player_name.is_empty() {
            return Err(ClientError::validation("player name is required"));
        }
        let superuser_token = match (role, superuser_token.map(str::trim)) {
            (Role::GameMaster, Some(token)) if !token.is_empty() => Some(token.to_string()),
            (Role::GameMaster, _) => {
                return Err(ClientError::validation(
                    "a superuser token is required to join as GM",
                ));
            }
            _ => None,
        };

        let code = self.auth.get_join_code().await?;
        let session = self
            .auth
            .join(JoinRequest {
                code,
                player_name: player_name.to_string(),
                role,
                superuser_token,
            })
            .await
            .inspect_err(|e| warn!(error = %e, "join rejected"))?;

        // The session stays usable even if it cannot be persisted.
        if let Err(e) = self.store.save(&session).await {
            warn!(error = %e, "failed to persist session");
        }
        info!(player_id = %session.player_id, "joined game");
        Ok(session)
    }

    // Heartbeat failures never interrupt the session.
    pub async fn poke(&self, player_id: PlayerId) {
        if let Err(e) = self.auth.poke(player_id).await {
            warn!(%player_id, error = %e, "heartbeat failed");
        }
    }

    pub async fn restore(&self) -> Option<Session> {
        let session = self.store.load().await;
        if let Some(session) = &session {
            info!(player_id = %session.player_id, role = %session.role, "restored session");
        }
        session
    }

    pub async fn clear(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear stored session");
        }
        info!("session cleared");
    }
}
