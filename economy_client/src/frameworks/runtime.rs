// Framework bootstrap for the economy client runtime.

use crate::domain::{ClientError, Player, Role, Session, Transaction};
use crate::frameworks::config::{ClientConfig, ConfigError};
use crate::interface_adapters::clients::{AuthClient, LedgerClient};
use crate::interface_adapters::display::{
    NameBook, event_row, player_row, sort_players, transaction_row,
};
use crate::interface_adapters::hub::{ScheduledReconnect, SignalRTransport};
use crate::interface_adapters::session_store::{CookieJarStore, SystemClock};
use crate::use_cases::{AppState, Dashboard, FeedState, HistoryScope, LiveFeed, Snapshot};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

const FEED_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no stored session; set ECONOMY_PLAYER_NAME to join")]
    NoSession,
}

/// Output shape for log lines, picked by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    // Anything other than "json" falls back to compact terminal output.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Loads `.env`, installs the tracing subscriber and routes panics into the log.
/// Safe to call twice; the second subscriber is refused and reported.
pub fn init_runtime() {
    let env_file = dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("economy_client=info,warn"));
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    if let Err(e) = installed {
        tracing::warn!(error = %e, "tracing subscriber already installed");
        return;
    }
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    std::panic::set_hook(Box::new(|info| {
        tracing::error!(
            %info,
            backtrace = %std::backtrace::Backtrace::capture(),
            "economy client panicked"
        );
    }));
}

pub async fn run_with_config() -> Result<(), RuntimeError> {
    init_runtime();
    let config = ClientConfig::load()?;
    run(config).await
}

pub fn build_state(config: &ClientConfig) -> Result<AppState, RuntimeError> {
    let timeout = config.http_timeout();
    let auth = AuthClient::new(config.api_url.clone(), timeout)?;
    let ledger = LedgerClient::new(config.api_url.clone(), timeout)?;
    let sessions = CookieJarStore::new(&config.session_dir, Arc::new(SystemClock));
    tracing::debug!(
        api_url = %config.api_url,
        session_file = %sessions.path().display(),
        "clients configured"
    );

    Ok(AppState {
        auth: Arc::new(auth),
        ledger: Arc::new(ledger),
        sessions: Arc::new(sessions),
        limits: config.limits(),
        poll_interval: config.poll_interval(),
    })
}

pub async fn run(config: ClientConfig) -> Result<(), RuntimeError> {
    let mut dashboard = Dashboard::new(build_state(&config)?);
    let session = resolve_session(&mut dashboard, &config).await?;
    tracing::info!(
        player_id = %session.player_id,
        player_name = %session.player_name,
        role = %session.role,
        "session active"
    );

    let mut feeds = dashboard.start_polling()?;

    let transport = SignalRTransport::new(&config.hub_url, config.hub_event.clone())?;
    tracing::info!(url = %transport.url(), event = %config.hub_event, "live feed configured");
    let mut feed = LiveFeed::new(
        Arc::new(transport),
        Arc::new(ScheduledReconnect::default()),
        config.feed_retention,
    );
    feed.start();
    let mut feed_state = feed.subscribe_state();
    let mut seen_events = 0;

    // Heartbeats run detached so a slow backend never stalls shutdown or snapshots.
    let mut heartbeat_task: Option<JoinHandle<()>> = None;
    let mut heartbeat = interval(config.heartbeat_interval());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut feed_check = interval(FEED_CHECK_INTERVAL);
    feed_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                break;
            }
            _ = heartbeat.tick() => {
                if heartbeat_task.as_ref().is_some_and(|task| !task.is_finished()) {
                    tracing::debug!("previous heartbeat still in flight; skipping");
                } else {
                    heartbeat_task = dashboard.heartbeat().map(tokio::spawn);
                }
            }
            changed = feeds.players.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feeds.players.borrow_and_update().clone();
                log_players(snapshot, config.feed_display);
            }
            changed = feeds.transactions.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feeds.transactions.borrow_and_update().clone();
                let players = dashboard.queries().cached_players().unwrap_or_default();
                log_transactions(snapshot, &players, feeds.scope, config.feed_display);
            }
            changed = feed_state.changed() => {
                if changed.is_ok() {
                    let state = *feed_state.borrow_and_update();
                    log_feed_state(state);
                }
            }
            _ = feed_check.tick() => {
                let received = feed.received();
                let fresh = received.saturating_sub(seen_events);
                if fresh > 0 {
                    let shown = usize::try_from(fresh)
                        .unwrap_or(usize::MAX)
                        .min(config.feed_display);
                    for event in feed.recent(shown) {
                        tracing::info!(event = %event_row(&event), "live event");
                    }
                    seen_events = received;
                }
            }
        }
    }

    if let Some(task) = heartbeat_task.take() {
        task.abort();
    }
    feed.stop();
    dashboard.teardown();
    tracing::info!("shutdown complete");
    Ok(())
}

// A stored cookie wins; otherwise join with the configured identity.
async fn resolve_session(
    dashboard: &mut Dashboard,
    config: &ClientConfig,
) -> Result<Session, RuntimeError> {
    if let Some(session) = dashboard.restore().await {
        return Ok(session.clone());
    }
    let Some(player_name) = config.player_name.as_deref() else {
        return Err(RuntimeError::NoSession);
    };
    let role = config.role.unwrap_or(Role::Player);
    let session = dashboard
        .join(player_name, role, config.superuser_token.as_deref())
        .await
        .inspect_err(|e| tracing::error!(error = %e, hint = ?e.hint(), "join failed"))?;
    Ok(session.clone())
}

fn log_players(snapshot: Snapshot<Vec<Player>>, limit: usize) {
    match snapshot {
        Some(Ok(mut players)) => {
            sort_players(&mut players);
            tracing::info!(count = players.len(), "players refreshed");
            for player in players.iter().take(limit) {
                tracing::info!(player = %player_row(player), "player");
            }
        }
        Some(Err(e)) => tracing::warn!(error = %e, hint = ?e.hint(), "player listing unavailable"),
        None => {}
    }
}

fn log_transactions(
    snapshot: Snapshot<Vec<Transaction>>,
    players: &[Player],
    scope: HistoryScope,
    limit: usize,
) {
    match snapshot {
        Some(Ok(transactions)) => {
            let names = NameBook::new(players);
            tracing::info!(?scope, count = transactions.len(), "history refreshed");
            for tx in transactions.iter().take(limit) {
                tracing::info!(transaction = %transaction_row(tx, &names), "transaction");
            }
        }
        Some(Err(e)) => tracing::warn!(error = %e, hint = ?e.hint(), "history unavailable"),
        None => {}
    }
}

fn log_feed_state(state: FeedState) {
    match state {
        FeedState::Connected => tracing::info!("live feed online"),
        FeedState::Disconnected => tracing::warn!("live feed offline"),
        other => tracing::debug!(state = ?other, "live feed state changed"),
    }
}
