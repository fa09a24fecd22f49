use crate::domain::{PlayerId, Role};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Response of GET /api/v1/auth/code.
#[derive(Debug, Deserialize)]
pub struct CodeResponse {
    pub code: String,
}

// Body of POST /api/v1/auth/join.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestDto<'a> {
    pub code: &'a str,
    pub player_name: &'a str,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superuser_token: Option<&'a str>,
}

// Session-shaped join reply. Older backends answer with `id`/`name`, some send both
// spellings, and the role may be missing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponseDto {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub id: Option<PlayerId>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    // Some backends report a rejected join inside a 2xx body.
    #[serde(default)]
    pub error: Option<String>,
}

impl JoinResponseDto {
    // `playerId` wins over `id`.
    pub fn resolved_player_id(&self) -> Option<PlayerId> {
        self.player_id.or(self.id)
    }

    pub fn resolved_player_name(&self) -> Option<&str> {
        self.player_name.as_deref().or(self.name.as_deref())
    }
}

// Body of POST /api/v1/auth/poke.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PokeRequestDto {
    pub player_id: PlayerId,
}

// Send and give endpoints take the bare amount as a JSON number.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct AmountBody(#[serde(with = "rust_decimal::serde::float")] pub Decimal);
