//! The fixed set of daily endpoints mirrored into the tree.

use chrono::{Days, NaiveDate};

/// Days of history fetched by the ranged endpoints.
const HISTORY_DAYS: u64 = 6;

/// One polled endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Root id of the payload in the state tree.
    pub path: &'static str,
    /// API path relative to the Connect API host.
    pub url: String,
    /// Display name of the root channel.
    pub desc: &'static str,
}

impl Endpoint {
    fn new(path: &'static str, url: String, desc: &'static str) -> Self {
        Self { path, url, desc }
    }
}

/// Endpoints to poll for `display_name` on `today`.
///
/// `adhoc` adds the challenge history and personal records, which change
/// rarely and are expensive.
pub fn catalog(display_name: &str, today: NaiveDate, adhoc: bool) -> Vec<Endpoint> {
    let date = today.format("%Y-%m-%d").to_string();
    let since = today
        .checked_sub_days(Days::new(HISTORY_DAYS))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string();

    let mut endpoints = vec![
        Endpoint::new(
            "usersummary",
            format!("usersummary-service/usersummary/daily/{display_name}?calendarDate={date}"),
            "User Summary Daily",
        ),
        Endpoint::new(
            "maxmet",
            format!("metrics-service/metrics/maxmet/daily/{date}/{date}"),
            "Max Metrics Daily",
        ),
        Endpoint::new(
            "hydration",
            format!("usersummary-service/usersummary/hydration/daily/{date}"),
            "Hydration Daily",
        ),
        Endpoint::new(
            "dailysleep",
            format!(
                "wellness-service/wellness/dailySleepData/{display_name}?date={date}&nonSleepBufferMinutes=60"
            ),
            "Daily Sleep",
        ),
        Endpoint::new(
            "dailystress",
            format!("wellness-service/wellness/dailyStress/{date}"),
            "Daily Stress",
        ),
        Endpoint::new(
            "heartrate",
            format!("userstats-service/wellness/daily/{display_name}?fromDate={since}"),
            "Resting Heartrate",
        ),
        Endpoint::new(
            "trainingstatus",
            format!("metrics-service/metrics/trainingstatus/aggregated/{date}"),
            "Training Status",
        ),
        Endpoint::new(
            "activities",
            "activitylist-service/activities/search/activities?start=0&limit=10".to_string(),
            "Activities",
        ),
        Endpoint::new(
            "weight",
            format!("weight-service/weight/dateRange?startDate={since}&endDate={date}"),
            "Weight",
        ),
    ];

    if adhoc {
        endpoints.push(Endpoint::new(
            "adhocchallenge",
            "adhocchallenge-service/adHocChallenge/historical".to_string(),
            "Adhoc Challenge",
        ));
        endpoints.push(Endpoint::new(
            "personalrecords",
            format!("personalrecord-service/personalrecord/prs/{display_name}"),
            "Personal Records",
        ));
    }

    endpoints
}
