// Response handling shared by the reqwest clients.

use crate::domain::ClientError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Transport(format!("request timed out: {err}"))
    } else {
        ClientError::Transport(err.to_string())
    }
}

// Decode a 2xx JSON body, or map the failure into the taxonomy.
pub(crate) async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if !status.is_success() {
        return Err(upstream_error(res).await);
    }

    let is_json = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if !is_json {
        return Err(ClientError::Protocol(
            "expected JSON response from server".to_string(),
        ));
    }

    let body = res.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body)
        .map_err(|err| ClientError::Protocol(format!("unexpected response shape: {err}")))
}

pub(crate) async fn expect_success(res: Response) -> Result<(), ClientError> {
    if res.status().is_success() {
        return Ok(());
    }
    Err(upstream_error(res).await)
}

pub(crate) async fn upstream_error(res: Response) -> ClientError {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    let message = server_message(&text).unwrap_or_else(|| default_message(status));
    classify(status, message)
}

pub(crate) fn classify(status: StatusCode, message: String) -> ClientError {
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(message),
        status if status.is_server_error() => ClientError::Server {
            status: status.as_u16(),
            message,
        },
        _ => ClientError::Validation(message),
    }
}

fn default_message(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown status")
    )
}

// Pull the human-readable text out of an error body, preferring structured fields.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => {
            if let Some(message) = non_empty_str(fields.get("message")) {
                return Some(message);
            }
            if let Some(Value::Object(errors)) = fields.get("errors") {
                let joined = errors
                    .values()
                    .flat_map(|value| match value {
                        Value::Array(items) => items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect::<Vec<_>>(),
                        Value::String(text) => vec![text.clone()],
                        _ => Vec::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(". ");
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            ["detail", "title", "error"]
                .iter()
                .find_map(|key| non_empty_str(fields.get(*key)))
                .or_else(|| Some(body.to_string()))
        }
        Ok(Value::String(text)) if !text.trim().is_empty() => Some(text),
        _ => Some(body.to_string()),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
