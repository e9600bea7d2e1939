//! Fixed state ids used by the adapter.
//!
//! Centralising id construction prevents typos and makes it easy
//! to find every node the adapter writes.

// ── Info ───────────────────────────────────────────────────

/// Connection indicator, `true` while logged in.
pub const INFO_CONNECTION: &str = "info.connection";

// ── Auth ───────────────────────────────────────────────────

/// Channel holding persisted authentication material.
pub const AUTH: &str = "auth";

/// Persisted token bundle (JSON string).
pub const AUTH_SESSION: &str = "auth.session";

/// Persisted cookie jar (JSON string).
pub const AUTH_COOKIE: &str = "auth.cookie";

// ── Profile ────────────────────────────────────────────────

/// User preferences published after login.
pub const USER_PREFERENCES: &str = "userpreferences";

/// Social profile published after login.
pub const SOCIAL_PROFILE: &str = "social_profile";

// ── Devices ────────────────────────────────────────────────

/// Channel holding one device node per registered Garmin device.
pub const DEVICES: &str = "devices";

/// Device node for a unit id.
pub fn device(unit_id: &str) -> String {
    format!("{DEVICES}.{unit_id}")
}

/// Flattened registration record of a device.
pub fn device_general(unit_id: &str) -> String {
    format!("{DEVICES}.{unit_id}.general")
}

/// Channel holding writable commands of a device.
pub fn device_remote(unit_id: &str) -> String {
    format!("{DEVICES}.{unit_id}.remote")
}

/// Writable refresh button of a device.
pub fn device_refresh(unit_id: &str) -> String {
    format!("{DEVICES}.{unit_id}.remote.Refresh")
}

/// Parse a command id of the form `devices.<unitId>.remote.<command>`.
///
/// Returns the unit id and the command name.
pub fn parse_device_command(id: &str) -> Option<(&str, &str)> {
    let rest = id.strip_prefix(DEVICES)?.strip_prefix('.')?;
    let mut parts = rest.split('.');
    let unit_id = parts.next()?;
    if parts.next()? != "remote" {
        return None;
    }
    let command = parts.next()?;
    if parts.next().is_some() || unit_id.is_empty() || command.is_empty() {
        return None;
    }
    Some((unit_id, command))
}
