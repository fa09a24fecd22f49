use crate::domain::{AuthGateway, ClientError, JoinCode, JoinRequest, PlayerId, Session};
use crate::interface_adapters::clients::http::{read_json, transport_error, upstream_error};
use crate::interface_adapters::protocol::{
    CodeResponse, JoinRequestDto, JoinResponseDto, PokeRequestDto,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

// Thin reqwest client for the session endpoints.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

// Everything that goes wrong while obtaining a code is an auth failure, except a body we
// could not understand.
fn code_failure(err: ClientError) -> ClientError {
    match err {
        ClientError::Protocol(_) => err,
        other => ClientError::Auth(format!("could not obtain join code: {}", other.message())),
    }
}

// Join rejections keep the backend's text; infrastructure failures become auth errors.
fn join_failure(err: ClientError) -> ClientError {
    match err {
        ClientError::Validation(message)
        | ClientError::NotFound(message)
        | ClientError::Auth(message) => ClientError::Validation(message),
        ClientError::Transport(message) => ClientError::Auth(format!("join failed: {message}")),
        ClientError::Server { message, .. } => ClientError::Auth(message),
        ClientError::Protocol(_) => err,
    }
}

#[async_trait]
impl AuthGateway for AuthClient {
    async fn get_join_code(&self) -> Result<JoinCode, ClientError> {
        let url = format!("{}/api/v1/auth/code", self.base_url);
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| code_failure(transport_error(err)))?;

        let payload = read_json::<CodeResponse>(res).await.map_err(code_failure)?;
        if payload.code.trim().is_empty() {
            return Err(ClientError::Auth("backend issued an empty join code".to_string()));
        }
        Ok(JoinCode(payload.code))
    }

    async fn join(&self, req: JoinRequest) -> Result<Session, ClientError> {
        let url = format!("{}/api/v1/auth/join", self.base_url);
        let body = JoinRequestDto {
            code: req.code.as_str(),
            player_name: &req.player_name,
            role: req.role,
            superuser_token: req.superuser_token.as_deref(),
        };
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| join_failure(transport_error(err)))?;

        let payload = read_json::<JoinResponseDto>(res)
            .await
            .map_err(join_failure)?;
        if let Some(error) = payload.error.as_deref().filter(|error| !error.trim().is_empty()) {
            return Err(ClientError::Validation(error.to_string()));
        }
        let player_id = payload.resolved_player_id().ok_or_else(|| {
            ClientError::Protocol("join response is missing the player id".to_string())
        })?;

        Ok(Session {
            player_id,
            player_name: payload
                .resolved_player_name()
                .map(str::to_string)
                .unwrap_or(req.player_name),
            role: payload.role.unwrap_or(req.role),
        })
    }

    async fn poke(&self, player_id: PlayerId) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/auth/poke", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&PokeRequestDto { player_id })
            .send()
            .await
            .map_err(transport_error)?;

        if res.status().is_success() {
            return Ok(());
        }
        Err(upstream_error(res).await)
    }
}
