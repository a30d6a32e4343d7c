use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::claims::{decode_claims, Role};
use crate::errors::{ClientError, ClientResult};

/// Supplies the bearer token for API calls and is told when the server
/// rejects it.
pub trait SessionProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Called once per 401/403 response.
    fn on_unauthorized(&self);

    /// Role from the token's claims; `Unknown` when there is no usable token.
    fn role(&self) -> Role {
        self.token()
            .and_then(|token| decode_claims(&token).ok())
            .map(|claims| claims.role)
            .unwrap_or(Role::Unknown)
    }
}

fn read_lock<T: Clone>(lock: &RwLock<T>) -> T {
    match lock.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write_lock<T>(lock: &RwLock<T>, value: T) {
    match lock.write() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

/// In-memory session holding a single token.
#[derive(Debug, Default)]
pub struct StaticSession {
    token: RwLock<Option<String>>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: Option<String>) {
        write_lock(&self.token, token);
    }
}

impl SessionProvider for StaticSession {
    fn token(&self) -> Option<String> {
        read_lock(&self.token)
    }

    fn on_unauthorized(&self) {
        warn!("access token rejected by server; dropping in-memory session");
        self.set_token(None);
    }
}

/// Session persisted to disk between CLI invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub saved_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredSession {
    pub fn new(access_token: impl Into<String>, email: Option<String>) -> Self {
        Self {
            email,
            access_token: access_token.into(),
            token_type: default_token_type(),
            saved_at: Utc::now(),
        }
    }
}

/// Default location of the session file: `$LABFLOW_HOME/session.json` or
/// `~/.labflow/session.json`.
pub fn session_file_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LABFLOW_HOME") {
        let mut path = PathBuf::from(dir);
        path.push("session.json");
        return Some(path);
    }

    std::env::var("HOME").ok().map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".labflow");
        path.push("session.json");
        path
    })
}

/// File-backed session. The file is read once on open and removed when the
/// server rejects the token.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    current: RwLock<Option<StoredSession>>,
}

impl FileSession {
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let current = read_session(&path)?;
        debug!(path = %path.display(), loaded = current.is_some(), "opened session file");
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Option<StoredSession> {
        read_lock(&self.current)
    }

    pub fn save(&self, session: StoredSession) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::Session(format!("failed creating directory {}: {}", parent.display(), e))
            })?;
        }
        let payload = serde_json::to_vec_pretty(&session)?;
        fs::write(&self.path, payload).map_err(|e| {
            ClientError::Session(format!("failed writing {}: {}", self.path.display(), e))
        })?;
        write_lock(&self.current, Some(session));
        Ok(())
    }

    pub fn clear(&self) -> ClientResult<()> {
        write_lock(&self.current, None);
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ClientError::Session(format!("failed to remove {}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }
}

impl SessionProvider for FileSession {
    fn token(&self) -> Option<String> {
        self.current().map(|session| session.access_token)
    }

    fn on_unauthorized(&self) {
        warn!(path = %self.path.display(), "access token rejected by server; clearing saved session");
        if let Err(err) = self.clear() {
            warn!(error = %err, "failed to clear saved session");
        }
    }
}

fn read_session(path: &Path) -> ClientResult<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path).map_err(|e| {
        ClientError::Session(format!("failed to read session file {}: {}", path.display(), e))
    })?;
    let session = serde_json::from_str(&data).map_err(|e| {
        ClientError::Session(format!("failed to parse session file {}: {}", path.display(), e))
    })?;
    Ok(Some(session))
}
