//! Session persistence in the state tree.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_core::types::state::StateObject;
use garmin_state::keys;

use crate::oauth::tokens::SessionBundle;

/// Reads and writes the token bundle, the cookie jar and the connection flag.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tree: Arc<dyn StateTree>,
}

impl SessionStore {
    /// Creates a new session store over `tree`.
    pub fn new(tree: Arc<dyn StateTree>) -> Self {
        Self { tree }
    }

    /// Create the `info` and `auth` nodes.
    pub async fn ensure_objects(&self) -> AppResult<()> {
        self.tree.set_object("info", StateObject::channel("Information")).await?;
        self.tree
            .set_object(
                keys::INFO_CONNECTION,
                StateObject::state("Device or service connected", "indicator.connected", false),
            )
            .await?;
        self.tree.set_object(keys::AUTH, StateObject::channel("Authentication")).await?;
        self.tree
            .set_object(keys::AUTH_SESSION, StateObject::state("Session", "json", false))
            .await?;
        self.tree
            .set_object(keys::AUTH_COOKIE, StateObject::state("Cookie jar", "json", false))
            .await?;
        Ok(())
    }

    /// The persisted token bundle, if one exists and parses.
    pub async fn load_bundle(&self) -> AppResult<Option<SessionBundle>> {
        let Some(raw) = self.tree.get_string(keys::AUTH_SESSION).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(bundle) => Ok(Some(bundle)),
            Err(e) => {
                warn!(error = %e, "Stored session is unreadable, ignoring it");
                Ok(None)
            }
        }
    }

    /// The persisted cookie jar JSON.
    pub async fn load_cookies(&self) -> AppResult<Option<String>> {
        self.tree.get_string(keys::AUTH_COOKIE).await
    }

    /// Persist a session and flush the tree.
    pub async fn save(&self, bundle: &SessionBundle, cookies: &str) -> AppResult<()> {
        let session = serde_json::to_string(bundle)?;
        self.tree.set_state(keys::AUTH_SESSION, Value::String(session), true).await?;
        self.tree
            .set_state(keys::AUTH_COOKIE, Value::String(cookies.to_string()), true)
            .await?;
        self.tree.flush().await?;
        debug!("Session persisted");
        Ok(())
    }

    /// Blank the persisted session and cookies.
    pub async fn clear(&self) -> AppResult<()> {
        self.tree.set_state(keys::AUTH_SESSION, json!(""), true).await?;
        self.tree.set_state(keys::AUTH_COOKIE, json!(""), true).await?;
        self.tree.flush().await
    }

    /// Write `info.connection`.
    pub async fn set_connection(&self, connected: bool) -> AppResult<()> {
        self.tree.set_state(keys::INFO_CONNECTION, json!(connected), true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::tokens::OAuth2Token;
    use garmin_state::MemoryStateTree;

    #[tokio::test]
    async fn test_save_load_clear() {
        let tree = Arc::new(MemoryStateTree::new());
        let store = SessionStore::new(tree.clone());
        store.ensure_objects().await.unwrap();

        let bundle = SessionBundle::new(None, OAuth2Token::from_static("at"));
        store.save(&bundle, "[]").await.unwrap();

        assert_eq!(store.load_bundle().await.unwrap(), Some(bundle));
        assert_eq!(store.load_cookies().await.unwrap().as_deref(), Some("[]"));

        store.clear().await.unwrap();
        assert_eq!(store.load_bundle().await.unwrap(), None);
        assert_eq!(store.load_cookies().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_bundle_is_ignored() {
        let tree = Arc::new(MemoryStateTree::new());
        tree.set_state(keys::AUTH_SESSION, json!("{not json"), true).await.unwrap();
        let store = SessionStore::new(tree);
        assert_eq!(store.load_bundle().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_connection() {
        let tree = Arc::new(MemoryStateTree::new());
        SessionStore::new(tree.clone()).set_connection(true).await.unwrap();
        let state = tree.get_state(keys::INFO_CONNECTION).await.unwrap().unwrap();
        assert_eq!(state.val, json!(true));
    }
}
