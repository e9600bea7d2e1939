//! Polls the endpoint catalog and mirrors every payload into the tree.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info};

use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_state::{FlattenOptions, JsonFlattener};

use crate::client::ConnectClient;
use crate::endpoints::{self, Endpoint};

/// Outcome of one pass over the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Endpoints whose payload was written.
    pub updated: usize,
    /// Endpoints that answered with an empty body.
    pub empty: usize,
    /// Endpoints that failed for a reason other than 401.
    pub failed: usize,
    /// At least one endpoint rejected the token.
    pub unauthorized: bool,
}

/// Fetches the catalog and writes each payload under its path.
#[derive(Debug)]
pub struct Poller {
    client: Arc<ConnectClient>,
    tree: Arc<dyn StateTree>,
    adhoc: bool,
}

impl Poller {
    pub fn new(client: Arc<ConnectClient>, tree: Arc<dyn StateTree>, adhoc: bool) -> Self {
        Self {
            client,
            tree,
            adhoc,
        }
    }

    /// Poll every endpoint for `display_name` on `today`.
    ///
    /// Failures are logged and do not stop the pass.
    pub async fn update_all(
        &self,
        display_name: &str,
        today: NaiveDate,
    ) -> AppResult<PollReport> {
        let mut report = PollReport::default();

        for endpoint in endpoints::catalog(display_name, today, self.adhoc) {
            match self.update_one(&endpoint).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.empty += 1,
                Err(e) if e.is_unauthorized() => {
                    info!(path = endpoint.path, "Endpoint answered 401, token refresh needed");
                    report.unauthorized = true;
                }
                Err(e) => {
                    error!(url = %self.client.url(&endpoint.url), error = %e, "Update failed");
                    report.failed += 1;
                }
            }
        }

        self.tree.flush().await?;
        debug!(?report, "Poll finished");
        Ok(report)
    }

    async fn update_one(&self, endpoint: &Endpoint) -> AppResult<bool> {
        let Some(payload) = self.client.get_json(&endpoint.url).await? else {
            return Ok(false);
        };

        let options = FlattenOptions::indexed()
            .with_channel_name(endpoint.desc)
            .with_write(true);
        JsonFlattener::new(self.tree.as_ref())
            .parse(endpoint.path, &payload, &options)
            .await?;
        Ok(true)
    }
}
