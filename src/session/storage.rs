use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// Identity fields the client keeps between visits. Mirrors the `session`
/// object returned by the callback endpoint; tokens are never stored on the
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub discord_id: String,
    pub discord_username: String,
    pub discord_avatar: Option<String>,
}

/// Persistent slot for the serialized identity. Reads and writes are
/// synchronous, matching the platform storage they stand in for.
pub trait SessionStorage {
    fn load(&self) -> AppResult<Option<StoredIdentity>>;
    fn save(&self, identity: &StoredIdentity) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

/// Volatile storage for tests and previews.
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<StoredIdentity>>,
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> AppResult<Option<StoredIdentity>> {
        Ok(self.slot.lock().expect("storage lock poisoned").clone())
    }

    fn save(&self, identity: &StoredIdentity) -> AppResult<()> {
        *self.slot.lock().expect("storage lock poisoned") = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.slot.lock().expect("storage lock poisoned") = None;
        Ok(())
    }
}

/// Single-key JSON file, the durable equivalent of the browser's local
/// storage entry.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStorage for JsonFileStorage {
    fn load(&self) -> AppResult<Option<StoredIdentity>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow::Error::from(e).into()),
        };
        let identity = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("corrupt session file: {}", e))?;
        Ok(Some(identity))
    }

    fn save(&self, identity: &StoredIdentity) -> AppResult<()> {
        let raw = serde_json::to_string(identity)
            .map_err(|e| anyhow::anyhow!("serialize session: {}", e))?;
        std::fs::write(&self.path, raw).map_err(anyhow::Error::from)?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::from(e).into()),
        }
    }
}

/// Session state as the UI must see it. `Loading` is distinct from
/// `SignedOut`: the UI must not render a logged-out view before the stored
/// identity has been restored, or it flashes the wrong state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    SignedOut,
    SignedIn(StoredIdentity),
}

/// The client's auth context: current identity plus the storage it
/// persists through.
pub struct AuthContext<S: SessionStorage> {
    storage: S,
    state: AuthState,
}

impl<S: SessionStorage> AuthContext<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            state: AuthState::Loading,
        }
    }

    /// Restore a prior identity from storage. Runs once on mount; after it
    /// returns the context is never `Loading` again.
    pub fn restore(&mut self) -> AppResult<()> {
        self.state = match self.storage.load()? {
            Some(identity) => AuthState::SignedIn(identity),
            None => AuthState::SignedOut,
        };
        Ok(())
    }

    pub fn login(&mut self, identity: StoredIdentity) -> AppResult<()> {
        self.storage.save(&identity)?;
        self.state = AuthState::SignedIn(identity);
        Ok(())
    }

    pub fn logout(&mut self) -> AppResult<()> {
        self.storage.clear()?;
        self.state = AuthState::SignedOut;
        Ok(())
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, AuthState::Loading)
    }

    pub fn current(&self) -> Option<&StoredIdentity> {
        match &self.state {
            AuthState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> StoredIdentity {
        StoredIdentity {
            discord_id: "123".to_string(),
            discord_username: "vojta".to_string(),
            discord_avatar: Some("https://cdn.discordapp.com/avatars/123/abc.png".to_string()),
        }
    }

    #[test]
    fn context_starts_loading_not_signed_out() {
        let ctx = AuthContext::new(MemoryStorage::default());
        assert!(ctx.is_loading());
        assert_ne!(*ctx.state(), AuthState::SignedOut);
    }

    #[test]
    fn login_persists_and_logout_erases() {
        let mut ctx = AuthContext::new(MemoryStorage::default());
        ctx.restore().unwrap();
        assert_eq!(*ctx.state(), AuthState::SignedOut);

        ctx.login(identity()).unwrap();
        assert_eq!(ctx.current(), Some(&identity()));

        // A fresh context over the same storage sees the saved identity.
        let storage = MemoryStorage::default();
        storage.save(&identity()).unwrap();
        let mut fresh = AuthContext::new(storage);
        fresh.restore().unwrap();
        assert_eq!(fresh.current(), Some(&identity()));

        fresh.logout().unwrap();
        assert_eq!(*fresh.state(), AuthState::SignedOut);
    }

    #[test]
    fn json_file_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("discord_user.json"));

        assert_eq!(storage.load().unwrap(), None);

        storage.save(&identity()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(identity()));

        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
        // Clearing twice is fine.
        storage.clear().unwrap();
    }

    #[test]
    fn restore_picks_up_file_written_by_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discord_user.json");

        {
            let mut ctx = AuthContext::new(JsonFileStorage::new(&path));
            ctx.restore().unwrap();
            ctx.login(identity()).unwrap();
        }

        let mut ctx = AuthContext::new(JsonFileStorage::new(&path));
        assert!(ctx.is_loading());
        ctx.restore().unwrap();
        assert_eq!(ctx.current(), Some(&identity()));
    }
}
