//! Cookie jar shared with the HTTP client and persisted in the state tree.

use std::sync::Arc;

use cookie_store::CookieStore;
use reqwest_cookie_store::CookieStoreMutex;
use tracing::debug;

use garmin_core::error::AppError;
use garmin_core::result::AppResult;

/// Cookie jar that can be saved to and restored from JSON.
///
/// The HTTP client holds the same `Arc`, so restoring replaces the
/// contents in place rather than swapping the jar.
#[derive(Debug, Clone, Default)]
pub struct PersistentCookieJar {
    store: Arc<CookieStoreMutex>,
}

impl PersistentCookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider to pass to `reqwest::ClientBuilder::cookie_provider`.
    pub fn provider(&self) -> Arc<CookieStoreMutex> {
        Arc::clone(&self.store)
    }

    /// Replace the contents with a previously saved jar.
    pub fn load_json(&self, json: &str) -> AppResult<()> {
        let loaded = cookie_store::serde::json::load_all(json.as_bytes())
            .map_err(|e| AppError::storage(format!("Cookie jar could not be parsed: {e}")))?;
        let count = loaded.iter_any().count();
        *self.lock()? = loaded;
        debug!(cookies = count, "Restored cookie jar");
        Ok(())
    }

    /// Serialize every cookie, including session cookies.
    pub fn to_json(&self) -> AppResult<String> {
        let mut buf = Vec::new();
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(&*self.lock()?, &mut buf)
            .map_err(|e| AppError::storage(format!("Cookie jar could not be saved: {e}")))?;
        String::from_utf8(buf).map_err(|e| AppError::storage(format!("Cookie jar is not UTF-8: {e}")))
    }

    /// Drop every cookie.
    pub fn clear(&self) -> AppResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Number of cookies held, expired ones included.
    pub fn len(&self) -> AppResult<usize> {
        Ok(self.lock()?.iter_any().count())
    }

    /// Whether the jar holds no cookies.
    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, CookieStore>> {
        self.store
            .lock()
            .map_err(|_| AppError::internal("Cookie jar lock poisoned"))
    }
}
