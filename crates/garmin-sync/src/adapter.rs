//! Adapter lifecycle: ready, run, state changes, unload.
//!
//! One task owns every timer. The poll interval and the token refresh
//! interval tick forever; a 401 arms a one-shot refresh timer (replacing any
//! pending one) and an unhandled command arms a one-shot poll timer.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};

use garmin_auth::{AuthPhase, LoginOutcome, SessionManager};
use garmin_core::config::AppConfig;
use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_core::types::state::StateChange;
use garmin_state::keys;

use crate::client::ConnectClient;
use crate::devices::DeviceRegistry;
use crate::poller::{PollReport, Poller};
use crate::profile;

/// What a state change asks the adapter to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    /// Acknowledged write or nothing to do.
    Ignore,
    /// Poll right away.
    PollNow,
    /// Poll after the delay.
    PollAfter(Duration),
}

/// Mirrors one Garmin account into a state tree.
#[derive(Debug)]
pub struct Adapter {
    config: AppConfig,
    tree: Arc<dyn StateTree>,
    session: Arc<SessionManager>,
    client: Arc<ConnectClient>,
    devices: DeviceRegistry,
    poller: Poller,
    display_name: RwLock<Option<String>>,
    last_report: RwLock<PollReport>,
    /// Set when the first poll in `on_ready` hit a 401.
    retry_on_start: AtomicBool,
}

impl Adapter {
    /// Wire up the adapter. `config` should already be normalized.
    pub fn new(config: AppConfig, tree: Arc<dyn StateTree>) -> AppResult<Self> {
        let session = Arc::new(SessionManager::new(&config, Arc::clone(&tree))?);
        let client = Arc::new(ConnectClient::new(&config.api, Arc::clone(&session))?);
        let poller = Poller::new(Arc::clone(&client), Arc::clone(&tree), config.polling.adhoc);

        Ok(Self {
            devices: DeviceRegistry::new(Arc::clone(&tree)),
            config,
            tree,
            session,
            client,
            poller,
            display_name: RwLock::new(None),
            last_report: RwLock::new(PollReport::default()),
            retry_on_start: AtomicBool::new(false),
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn tree(&self) -> &Arc<dyn StateTree> {
        &self.tree
    }

    /// Report of the most recent poll.
    pub async fn last_report(&self) -> PollReport {
        self.last_report.read().await.clone()
    }

    /// Start-up: restore or log in, discover devices, poll once.
    ///
    /// Returns `true` when the adapter ended up logged in.
    pub async fn on_ready(&self) -> AppResult<bool> {
        self.tree
            .set_state(keys::INFO_CONNECTION, json!(false), true)
            .await?;

        if self.session.restore().await? {
            self.tree
                .set_state(keys::INFO_CONNECTION, json!(true), true)
                .await?;
        } else if self.session.login().await? == LoginOutcome::MfaRequired {
            return Ok(false);
        }

        match self.devices.discover(&self.client).await {
            Ok(ids) => debug!(?ids, "Device discovery finished"),
            Err(e) if e.is_unauthorized() => {
                self.retry_on_start.store(true, Ordering::SeqCst);
            }
            Err(e) => error!(error = %e, "Device discovery failed"),
        }

        if self.poll_once().await {
            self.retry_on_start.store(true, Ordering::SeqCst);
        }
        Ok(true)
    }

    /// Poll the catalog once, loading the profile first if needed.
    pub async fn update(&self) -> AppResult<PollReport> {
        if self.session.phase().await != AuthPhase::LoggedIn {
            debug!("Not logged in, skipping update");
            return Ok(PollReport::default());
        }

        let display_name = self.display_name().await?;
        self.poller
            .update_all(&display_name, Utc::now().date_naive())
            .await
    }

    async fn display_name(&self) -> AppResult<String> {
        if let Some(name) = self.display_name.read().await.clone() {
            return Ok(name);
        }

        let viewer = self.session.viewer_globals().await;
        let profile = profile::load(&self.client, viewer).await?;
        profile::publish(self.tree.as_ref(), &profile).await?;

        *self.display_name.write().await = Some(profile.display_name.clone());
        Ok(profile.display_name)
    }

    /// Returns `true` when a token refresh is needed.
    async fn poll_once(&self) -> bool {
        match self.update().await {
            Ok(report) => {
                let unauthorized = report.unauthorized;
                *self.last_report.write().await = report;
                unauthorized
            }
            Err(e) if e.is_unauthorized() => true,
            Err(e) => {
                error!(error = %e, "Update failed");
                false
            }
        }
    }

    async fn refresh_session(&self) {
        debug!("Refreshing token");
        if let Err(e) = self.session.refresh().await {
            error!(error = %e, "Token refresh failed");
        }
    }

    /// React to a write in the tree.
    pub fn on_state_change(&self, change: &StateChange) -> StateAction {
        if change.state.ack {
            return StateAction::Ignore;
        }

        match keys::parse_device_command(&change.id) {
            Some((unit_id, "Refresh")) => {
                info!(unit_id, "Refresh requested");
                StateAction::PollNow
            }
            _ => {
                let delay = self.config.polling.command_delay();
                info!(
                    id = %change.id,
                    value = %change.state.val,
                    "Unacknowledged write, updating in {}s",
                    delay.as_secs()
                );
                StateAction::PollAfter(delay)
            }
        }
    }

    /// Drive every timer until `cancel` turns `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let poll_every = self.config.polling.interval();
        info!(
            interval_secs = poll_every.as_secs_f64(),
            "Adapter loop started"
        );

        let mut poll = delayed_interval(poll_every);
        let mut refresh_every = self.session.refresh_interval().await;
        let mut refresh = delayed_interval(refresh_every);

        let mut retry: Option<Pin<Box<Sleep>>> = None;
        let mut command: Option<Pin<Box<Sleep>>> = None;
        if self.retry_on_start.swap(false, Ordering::SeqCst) {
            retry = Some(self.unauthorized_timer());
        }

        let mut changes = self.tree.subscribe();
        let mut listening = true;

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        info!("Adapter received shutdown signal");
                        break;
                    }
                }
                _ = poll.tick() => {
                    if self.poll_once().await {
                        retry = Some(self.unauthorized_timer());
                    }
                }
                _ = refresh.tick() => {
                    self.refresh_session().await;
                }
                _ = fire(&mut retry) => {
                    retry = None;
                    self.refresh_session().await;
                }
                _ = fire(&mut command) => {
                    command = None;
                    if self.poll_once().await {
                        retry = Some(self.unauthorized_timer());
                    }
                }
                received = changes.recv(), if listening => match received {
                    Ok(change) => match self.on_state_change(&change) {
                        StateAction::Ignore => {}
                        StateAction::PollNow => {
                            if self.poll_once().await {
                                retry = Some(self.unauthorized_timer());
                            }
                        }
                        StateAction::PollAfter(delay) => {
                            command = Some(Box::pin(time::sleep(delay)));
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "State change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("State change feed closed");
                        listening = false;
                    }
                },
            }

            let lifetime = self.session.refresh_interval().await;
            if lifetime != refresh_every {
                info!(secs = lifetime.as_secs(), "Token lifetime changed, rescheduling refresh");
                refresh_every = lifetime;
                refresh = delayed_interval(refresh_every);
            }
        }
    }

    fn unauthorized_timer(&self) -> Pin<Box<Sleep>> {
        let delay = self.config.polling.unauthorized_retry();
        info!("Refresh token in {} seconds", delay.as_secs());
        Box::pin(time::sleep(delay))
    }

    /// Shutdown: mark the connection down and flush the tree.
    pub async fn on_unload(&self) {
        if let Err(e) = self
            .tree
            .set_state(keys::INFO_CONNECTION, json!(false), true)
            .await
        {
            warn!(error = %e, "Failed to update connection state");
        }
        if let Err(e) = self.tree.flush().await {
            error!(error = %e, "Failed to flush state tree");
        }
        info!("Adapter unloaded");
    }
}

/// Interval whose first tick is one period from now.
fn delayed_interval(period: Duration) -> Interval {
    let period = period.max(Duration::from_secs(1));
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Wait for an optional one-shot timer; never completes when unset.
async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
