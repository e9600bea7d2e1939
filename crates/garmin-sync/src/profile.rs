//! User profile: display name, preferences and social profile.

use serde_json::Value;
use tracing::{info, warn};

use garmin_auth::sso::scrape::ViewerGlobals;
use garmin_core::error::AppError;
use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_state::{FlattenOptions, JsonFlattener, keys};

use crate::client::ConnectClient;

const SOCIAL_PROFILE_PATH: &str = "userprofile-service/socialProfile";
const USER_SETTINGS_PATH: &str = "userprofile-service/userprofile/user-settings";

/// What the adapter needs to know about the account owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Name used in the per-user endpoint paths.
    pub display_name: String,
    pub user_preferences: Option<Value>,
    pub social_profile: Option<Value>,
}

impl Profile {
    fn from_parts(
        user_preferences: Option<Value>,
        social_profile: Option<Value>,
    ) -> AppResult<Self> {
        let globals = ViewerGlobals {
            user_preferences,
            social_profile,
        };
        let display_name = globals
            .display_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::external("Profile does not contain a display name"))?;
        Ok(Self {
            display_name,
            user_preferences: globals.user_preferences,
            social_profile: globals.social_profile,
        })
    }
}

/// Build the profile from the login page globals, or fetch it from the API.
pub async fn load(client: &ConnectClient, viewer: Option<ViewerGlobals>) -> AppResult<Profile> {
    if let Some(viewer) = viewer {
        match Profile::from_parts(viewer.user_preferences, viewer.social_profile) {
            Ok(profile) => return Ok(profile),
            Err(e) => warn!(error = %e, "Login page globals incomplete, fetching profile"),
        }
    }

    let social_profile = client.get_json(SOCIAL_PROFILE_PATH).await?;
    let user_preferences = match client.get_json(USER_SETTINGS_PATH).await {
        Ok(settings) => settings,
        Err(e) if e.is_unauthorized() => return Err(e),
        Err(e) => {
            warn!(error = %e, "User settings unavailable");
            None
        }
    };

    let profile = Profile::from_parts(user_preferences, social_profile)?;
    info!(display_name = %profile.display_name, "Loaded user profile");
    Ok(profile)
}

/// Mirror the preferences and social profile into the tree.
pub async fn publish(tree: &dyn StateTree, profile: &Profile) -> AppResult<()> {
    let flattener = JsonFlattener::new(tree);
    if let Some(preferences) = &profile.user_preferences {
        flattener
            .parse(keys::USER_PREFERENCES, preferences, &FlattenOptions::default())
            .await?;
    }
    if let Some(social) = &profile.social_profile {
        flattener
            .parse(keys::SOCIAL_PROFILE, social, &FlattenOptions::default())
            .await?;
    }
    Ok(())
}
