use crate::domain::{ClientError, LedgerGateway, Player, PlayerId, Transaction};
use crate::interface_adapters::clients::http::{expect_success, read_json, transport_error};
use crate::interface_adapters::protocol::AmountBody;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use rust_decimal::Decimal;
use std::time::Duration;

// Thin reqwest client for the ledger endpoints. Ordering and validation live in the use cases.
#[derive(Clone)]
pub struct LedgerClient {
    http: Client,
    base_url: String,
}

impl LedgerClient {
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

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        let res = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        read_json(res).await
    }

    async fn post_amount(&self, path: &str, amount: Decimal) -> Result<(), ClientError> {
        let url = format!("{}{path}", self.base_url);
        let res = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&AmountBody(amount))
            .send()
            .await
            .map_err(transport_error)?;
        expect_success(res).await
    }
}

#[async_trait]
impl LedgerGateway for LedgerClient {
    async fn list_players(&self) -> Result<Vec<Player>, ClientError> {
        self.get_json("/api/gamemaster/players").await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        self.get_json("/api/Transactions").await
    }

    async fn list_player_transactions(
        &self,
        player_id: PlayerId,
    ) -> Result<Vec<Transaction>, ClientError> {
        self.get_json(&format!("/api/Players/{player_id}/transactions"))
            .await
    }

    async fn send(&self, from: PlayerId, to: PlayerId, amount: Decimal) -> Result<(), ClientError> {
        self.post_amount(&format!("/api/Players/{from}/send/{to}"), amount)
            .await
    }

    async fn grant(&self, player_id: PlayerId, amount: Decimal) -> Result<(), ClientError> {
        self.post_amount(&format!("/api/gamemaster/give/{player_id}"), amount)
            .await
    }
}
