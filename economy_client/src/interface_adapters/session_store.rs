use crate::domain::{Clock, Session, SessionStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "playerSession";
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

// On-disk cookie record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    expires_at: u64,
}

/// Cookie-style persistence: one JSON file per cookie name with an absolute expiry.
pub struct CookieJarStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CookieJarStore {
    pub fn new(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_COOKIE}.json")),
            clock,
            ttl: SESSION_TTL,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn discard(&self, reason: &str) {
        warn!(path = %self.path.display(), reason, "discarding stored session");
        if let Err(e) = self.clear().await {
            warn!(error = %e, "failed to remove stored session");
        }
    }
}

#[async_trait]
impl SessionStore for CookieJarStore {
    async fn save(&self, session: &Session) -> Result<(), String> {
        let value = serde_json::to_string(session).map_err(|e| e.to_string())?;
        let cookie = StoredCookie {
            name: SESSION_COOKIE.to_string(),
            value,
            expires_at: self.clock.now_epoch_seconds() + self.ttl.as_secs(),
        };
        let bytes = serde_json::to_vec_pretty(&cookie).map_err(|e| e.to_string())?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| format!("create {}: {e}", dir.display()))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| format!("write {}: {e}", self.path.display()))?;
        debug!(path = %self.path.display(), expires_at = cookie.expires_at, "session saved");
        Ok(())
    }

    async fn load(&self) -> Option<Session> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, "failed to read stored session");
                self.discard("unreadable").await;
                return None;
            }
        };

        let Ok(cookie) = serde_json::from_slice::<StoredCookie>(&bytes) else {
            self.discard("corrupt cookie").await;
            return None;
        };
        if cookie.name != SESSION_COOKIE {
            self.discard("unexpected cookie name").await;
            return None;
        }
        if cookie.expires_at <= self.clock.now_epoch_seconds() {
            self.discard("expired").await;
            return None;
        }
        match serde_json::from_str::<Session>(&cookie.value) {
            Ok(session) => Some(session),
            Err(_) => {
                self.discard("corrupt session value").await;
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), String> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("remove {}: {e}", self.path.display())),
        }
    }
}

/// Process-local store for tests and runs that should not persist anything.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    session: Arc<Mutex<Option<Session>>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), String> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn clear(&self) -> Result<(), String> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
