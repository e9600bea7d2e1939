//! # garmin-auth
//!
//! Authentication against Garmin Connect.
//!
//! The login is a fixed script that replays what the mobile app's embedded
//! browser does:
//!
//! 1. load the SSO widget and scrape the CSRF token,
//! 2. post the credentials (and, when challenged, the MFA code),
//! 3. scrape the service ticket from the response,
//! 4. trade the ticket for an OAuth1 token,
//! 5. trade the OAuth1 token for an OAuth2 bearer token.
//!
//! The OAuth1 token lives for about a year and is used to mint new OAuth2
//! tokens on refresh. The token bundle and the SSO cookie jar are persisted
//! in the state tree.

pub mod cookies;
pub mod http;
pub mod oauth;
pub mod session;
pub mod sso;

pub use cookies::PersistentCookieJar;
pub use oauth::tokens::{OAuth1Token, OAuth2Token, SessionBundle};
pub use session::manager::{AuthPhase, LoginOutcome, SessionManager};
