//! HTML scraping of the SSO pages.
//!
//! The SSO never returns JSON; everything the login needs (CSRF token,
//! page title, service ticket) is cut out of the HTML with regexes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use garmin_core::error::AppError;
use garmin_core::result::AppResult;

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("valid input tag regex"));

static NAME_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\sname\s*=\s*["']([^"']*)["']"#).expect("valid name attribute regex")
});

static VALUE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\svalue\s*=\s*["']([^"']*)["']"#).expect("valid value attribute regex")
});

static CSRF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="_csrf"\s+value="(.+?)""#).expect("valid csrf regex")
});

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid title regex"));

static EMBED_TICKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"embed\?ticket=([^"]+)""#).expect("valid embed ticket regex"));

static TICKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ticket=([^"]+)""#).expect("valid ticket regex"));

/// Marker of the MFA form in the sign-in page.
const MFA_FORM_MARKER: &str = "submit-mfa-verification-code-form";

const USER_PREFERENCES_MARKER: &str = "window.VIEWER_USERPREFERENCES = ";
const SOCIAL_PROFILE_MARKER: &str = "window.VIEWER_SOCIAL_PROFILE = ";

/// JSON blobs some Connect pages embed for the logged-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerGlobals {
    /// `window.VIEWER_USERPREFERENCES`.
    pub user_preferences: Option<Value>,
    /// `window.VIEWER_SOCIAL_PROFILE`.
    pub social_profile: Option<Value>,
}

impl ViewerGlobals {
    /// The user's display name, needed by several data endpoints.
    pub fn display_name(&self) -> Option<&str> {
        self.user_preferences
            .as_ref()
            .and_then(|p| p.get("displayName"))
            .or_else(|| self.social_profile.as_ref().and_then(|p| p.get("displayName")))
            .and_then(Value::as_str)
    }
}

/// Every `<input>` carrying both a `name` and a `value` attribute.
pub fn extract_hidden_inputs(html: &str) -> HashMap<String, String> {
    INPUT_TAG
        .find_iter(html)
        .filter_map(|tag| {
            let tag = tag.as_str();
            let name = NAME_ATTR.captures(tag)?.get(1)?.as_str();
            let value = VALUE_ATTR.captures(tag)?.get(1)?.as_str();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// The CSRF token of the sign-in form.
pub fn extract_csrf(html: &str) -> AppResult<String> {
    if let Some(token) = extract_hidden_inputs(html).remove("_csrf") {
        return Ok(token);
    }
    CSRF.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::scrape("CSRF token not found in sign-in page"))
}

/// Text of the `<title>` element.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Whether the page asks for a multi-factor code.
pub fn is_mfa_challenge(html: &str) -> bool {
    extract_title(html).is_some_and(|t| t.contains("MFA")) || html.contains(MFA_FORM_MARKER)
}

/// The service ticket issued after a successful sign-in.
pub fn extract_ticket(html: &str) -> AppResult<String> {
    EMBED_TICKET
        .captures(html)
        .or_else(|| TICKET.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::scrape("Service ticket not found in sign-in response"))
}

/// The viewer JSON blobs, if the page carries any.
pub fn extract_viewer_globals(html: &str) -> Option<ViewerGlobals> {
    let globals = ViewerGlobals {
        user_preferences: extract_assignment(html, USER_PREFERENCES_MARKER),
        social_profile: extract_assignment(html, SOCIAL_PROFILE_MARKER),
    };
    if globals.user_preferences.is_none() && globals.social_profile.is_none() {
        None
    } else {
        Some(globals)
    }
}

/// Parse the JSON literal assigned after `marker`, terminated by `;` and a newline.
fn extract_assignment(html: &str, marker: &str) -> Option<Value> {
    let start = html.find(marker)? + marker.len();
    let rest = &html[start..];
    let end = rest.find(";\n").unwrap_or(rest.len());
    match serde_json::from_str(rest[..end].trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(marker = marker.trim(), error = %e, "Embedded JSON could not be parsed");
            None
        }
    }
}
