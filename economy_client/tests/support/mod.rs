// In-process fake economy backend shared by the integration tests.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use economy_client::domain::PlayerId;
use economy_client::interface_adapters::clients::{AuthClient, LedgerClient};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};
use uuid::Uuid;

// Token the fake backend accepts for GM joins.
pub const SUPERUSER_TOKEN: &str = "letmein";
// Balance every joined player starts with.
pub const STARTING_BALANCE: i64 = 100;

// Base URL of the fake backend, set by the first test that needs it.
static SERVER_URL: OnceLock<String> = OnceLock::new();

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FakePlayer {
    id: Uuid,
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FakeTransaction {
    id: Uuid,
    from_player_id: String,
    to_player_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Backend {
    // Issued join codes and whether they were consumed.
    codes: HashMap<String, bool>,
    players: Vec<FakePlayer>,
    transactions: Vec<FakeTransaction>,
}

type Shared = Arc<Mutex<Backend>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinBody {
    code: String,
    player_name: String,
    role: String,
    superuser_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct AmountBody(#[serde(with = "rust_decimal::serde::float")] Decimal);

#[derive(Deserialize)]
struct SeedBody {
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}

fn problem(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

async fn issue_code(State(backend): State<Shared>) -> Response {
    let code = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    backend.lock().expect("backend lock").codes.insert(code.clone(), false);
    Json(json!({ "code": code })).into_response()
}

async fn join(State(backend): State<Shared>, Json(body): Json<JoinBody>) -> Response {
    let mut backend = backend.lock().expect("backend lock");
    match backend.codes.get_mut(&body.code) {
        Some(used) if !*used => *used = true,
        _ => {
            return problem(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid or expired join code" }),
            );
        }
    }
    if body.role == "GM" && body.superuser_token.as_deref() != Some(SUPERUSER_TOKEN) {
        return problem(
            StatusCode::UNAUTHORIZED,
            json!({ "message": "Invalid superuser token" }),
        );
    }
    if backend.players.iter().any(|p| p.name == body.player_name) {
        return problem(
            StatusCode::BAD_REQUEST,
            json!({ "title": "Bad Request", "message": "Player name already taken" }),
        );
    }
    let id = Uuid::new_v4();
    backend.players.push(FakePlayer {
        id,
        name: body.player_name.clone(),
        balance: Decimal::from(STARTING_BALANCE),
    });
    // Both id spellings, as the newer backend sends them.
    Json(json!({ "id": id, "playerId": id, "playerName": body.player_name, "role": body.role }))
        .into_response()
}

async fn poke() -> StatusCode {
    StatusCode::OK
}

async fn list_players(State(backend): State<Shared>) -> Response {
    Json(backend.lock().expect("backend lock").players.clone()).into_response()
}

async fn list_transactions(State(backend): State<Shared>) -> Response {
    Json(backend.lock().expect("backend lock").transactions.clone()).into_response()
}

async fn player_transactions(State(backend): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let backend = backend.lock().expect("backend lock");
    if !backend.players.iter().any(|p| p.id == id) {
        return problem(StatusCode::NOT_FOUND, json!({ "title": "Player not found" }));
    }
    let key = id.to_string();
    let history: Vec<_> = backend
        .transactions
        .iter()
        .filter(|tx| tx.to_player_id == id || tx.from_player_id == key)
        .cloned()
        .collect();
    Json(history).into_response()
}

async fn send(
    State(backend): State<Shared>,
    Path((from, to)): Path<(Uuid, Uuid)>,
    Json(AmountBody(amount)): Json<AmountBody>,
) -> Response {
    let mut backend = backend.lock().expect("backend lock");
    let Some(sender) = backend.players.iter().position(|p| p.id == from) else {
        return problem(StatusCode::NOT_FOUND, json!({ "title": "Player not found" }));
    };
    let Some(receiver) = backend.players.iter().position(|p| p.id == to) else {
        return problem(StatusCode::NOT_FOUND, json!({ "title": "Player not found" }));
    };
    if backend.players[sender].balance < amount {
        return problem(
            StatusCode::BAD_REQUEST,
            json!({ "message": "Insufficient balance" }),
        );
    }
    backend.players[sender].balance -= amount;
    backend.players[receiver].balance += amount;
    backend.transactions.push(FakeTransaction {
        id: Uuid::new_v4(),
        from_player_id: from.to_string(),
        to_player_id: to,
        amount,
        timestamp: Utc::now(),
    });
    StatusCode::OK.into_response()
}

async fn give(
    State(backend): State<Shared>,
    Path(id): Path<Uuid>,
    Json(AmountBody(amount)): Json<AmountBody>,
) -> Response {
    let mut backend = backend.lock().expect("backend lock");
    let Some(player) = backend.players.iter_mut().find(|p| p.id == id) else {
        return problem(StatusCode::NOT_FOUND, json!({ "title": "Player not found" }));
    };
    player.balance += amount;
    backend.transactions.push(FakeTransaction {
        id: Uuid::new_v4(),
        from_player_id: "system".to_string(),
        to_player_id: id,
        amount,
        timestamp: Utc::now(),
    });
    StatusCode::OK.into_response()
}

async fn create_seeded_player(State(backend): State<Shared>, Json(body): Json<SeedBody>) -> Response {
    let id = Uuid::new_v4();
    backend.lock().expect("backend lock").players.push(FakePlayer {
        id,
        name: body.name,
        balance: body.balance,
    });
    Json(json!({ "id": id })).into_response()
}

// Answers every route with a login page instead of JSON.
async fn html_page() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body>Please sign in</body></html>",
    )
        .into_response()
}

async fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "").into_response()
}

// Answers after the ledger clients in the timeout tests have given up.
async fn slow_listing() -> Response {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!([])).into_response()
}

const RS: char = '\u{1e}';

fn invocation(target: &str, text: &str) -> String {
    format!("{}{RS}", json!({ "type": 1, "target": target, "arguments": [text] }))
}

async fn hub(ws: WebSocketUpgrade, Path(script): Path<String>) -> Response {
    ws.on_upgrade(move |socket| run_hub_script(socket, script))
}

async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    socket.send(WsMessage::Text(text.into())).await.is_ok()
}

// Each script plays one hub behavior after the client handshake.
async fn run_hub_script(mut socket: WebSocket, script: String) {
    match socket.recv().await {
        Some(Ok(WsMessage::Text(text))) if text.as_str().contains("\"protocol\":\"json\"") => {}
        _ => return,
    }

    match script.as_str() {
        // Handshake reply and several records share one frame; a close follows.
        "greeting" => {
            let first = format!(
                "{{}}{RS}{}{{\"type\":6}}{RS}{}{}",
                invocation("Receive", "hello"),
                invocation("Other", "skip"),
                invocation("Receive", "world"),
            );
            if !send_text(&mut socket, first).await {
                return;
            }
            if !send_text(&mut socket, format!("{{\"type\":7}}{RS}")).await {
                return;
            }
        }
        "close-error" => {
            if !send_text(&mut socket, format!("{{}}{RS}")).await {
                return;
            }
            let close = format!("{{\"type\":7,\"error\":\"Server shutting down\"}}{RS}");
            if !send_text(&mut socket, close).await {
                return;
            }
        }
        "reject" => {
            let reply = format!("{{\"error\":\"Requested protocol 'json' is not available.\"}}{RS}");
            if !send_text(&mut socket, reply).await {
                return;
            }
        }
        // Only answers once the client has pinged.
        "ping" => {
            if !send_text(&mut socket, format!("{{}}{RS}")).await {
                return;
            }
            loop {
                match socket.recv().await {
                    Some(Ok(WsMessage::Text(text))) if text.as_str().contains("\"type\":6") => {
                        if !send_text(&mut socket, invocation("Receive", "pong")).await {
                            return;
                        }
                        break;
                    }
                    Some(Ok(_)) => continue,
                    _ => return,
                }
            }
        }
        _ => return,
    }

    // Stay open until the client goes away.
    while let Some(Ok(_)) = socket.recv().await {}
}

fn app() -> Router {
    let backend: Shared = Arc::new(Mutex::new(Backend::default()));
    Router::new()
        .route("/api/v1/auth/code", get(issue_code))
        .route("/api/v1/auth/join", post(join))
        .route("/api/v1/auth/poke", post(poke))
        .route("/api/gamemaster/players", get(list_players))
        .route("/api/gamemaster/give/{id}", post(give))
        .route("/api/Transactions", get(list_transactions))
        .route("/api/Players/{id}/transactions", get(player_transactions))
        .route("/api/Players/{id}/send/{to}", post(send))
        .route("/test/players", post(create_seeded_player))
        .route("/html/{*rest}", get(html_page).post(html_page))
        .route("/down/{*rest}", get(unavailable).post(unavailable))
        .route("/slow/{*rest}", get(slow_listing))
        .route("/hubs/{script}", get(hub))
        .with_state(backend)
}

// Start the fake backend once per test binary and return its base URL.
pub fn ensure_server() -> &'static str {
    SERVER_URL.get_or_init(|| {
        // The server thread reports its bound address back over this channel.
        let (url_tx, url_rx) = std::sync::mpsc::channel::<String>();
        // A dedicated OS thread and runtime keep the backend alive across the
        // per-test runtimes created by `#[tokio::test]`.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("fake backend runtime");
            runtime.block_on(async move {
                // Port 0 lets the OS pick a free port.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral port");
                let addr = listener.local_addr().expect("bound address");
                // The socket is already listening, so early connects wait in the backlog.
                url_tx
                    .send(format!("http://{addr}"))
                    .expect("test thread waits for the url");
                axum::serve(listener, app()).await.expect("fake backend failed");
            });
        });
        url_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("fake backend did not start in time")
    })
    .as_str()
}

pub fn auth_client() -> AuthClient {
    AuthClient::new(ensure_server(), Duration::from_secs(5)).expect("auth client")
}

pub fn ledger_client() -> LedgerClient {
    LedgerClient::new(ensure_server(), Duration::from_secs(5)).expect("ledger client")
}

// Ledger client pointed at a prefix whose routes all misbehave the same way.
pub fn ledger_client_at(prefix: &str) -> LedgerClient {
    LedgerClient::new(
        format!("{}/{prefix}", ensure_server()),
        Duration::from_secs(5),
    )
    .expect("ledger client")
}

// Ledger client with a short timeout against the slow routes.
pub fn impatient_ledger_client() -> LedgerClient {
    LedgerClient::new(
        format!("{}/slow", ensure_server()),
        Duration::from_millis(200),
    )
    .expect("ledger client")
}

pub fn hub_url(script: &str) -> String {
    format!("{}/hubs/{script}", ensure_server())
}

// Names are unique per test so tests can share one backend.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8])
}

pub async fn seed_player(name: &str, balance: i64) -> PlayerId {
    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("{}/test/players", ensure_server()))
        .json(&json!({ "name": name, "balance": balance }))
        .send()
        .await
        .expect("seed request")
        .json()
        .await
        .expect("seed response");
    body["id"]
        .as_str()
        .expect("seeded id")
        .parse()
        .expect("valid player id")
}

// Fresh session directory under the system temp dir.
pub fn session_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(unique_name("economy-session"))
}
