// ── Device coordinator ──
//
// Follows one bath heater: periodic refresh, the cached normalized state,
// and the merged control-write protocol with token-expiry retry. A
// scheduled refresh and a user command never overlap: each holds the
// coordinator's operation lock for its whole duration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use zinguo_api::transport::{TlsMode, TransportConfig};
use zinguo_api::{Credentials, DeviceSummary, SessionManager, ZinguoClient};

use crate::command::{ChangeSet, payload};
use crate::config::{CoordinatorConfig, TlsVerification};
use crate::convert;
use crate::error::CoreError;
use crate::model::DeviceState;

const UPDATE_CHANNEL_SIZE: usize = 64;

/// Control write attempts before giving up on a rejected token.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

// ── Observable state ─────────────────────────────────────────────

/// Where the current refresh cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Authenticating,
    Fetching,
    Normalizing,
}

/// Why the cached state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UpdateKind {
    /// Result of a refresh.
    Polled,
    /// Local guess right after an acknowledged control write.
    Optimistic,
    /// Confirming refresh after a write disagreed with the guess.
    Confirmed,
}

/// One change of the cached state, as seen by subscribers.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub kind: UpdateKind,
    pub state: Arc<DeviceState>,
    pub at: DateTime<Utc>,
}

// ── Coordinator ──────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Owns one
/// [`SessionManager`] and serializes every refresh and control write
/// against it.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    /// Taken on shutdown, which releases the HTTP client.
    session: Mutex<Option<Arc<SessionManager>>>,
    /// Held across a whole refresh or a whole control write.
    op_lock: Mutex<()>,
    state: watch::Sender<Option<Arc<DeviceState>>>,
    phase: watch::Sender<RefreshPhase>,
    updates: broadcast::Sender<StateUpdate>,
    last_update_success: AtomicBool,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build the HTTP client and session for `config`. Does not touch the
    /// network; call [`start()`](Self::start) or [`refresh()`](Self::refresh).
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let client = ZinguoClient::new(&build_transport(&config))?;
        let credentials = Credentials::new(config.account.clone(), config.password.clone());
        let session = if config.endpoints.is_empty() {
            SessionManager::with_default_endpoints(client, credentials)?
        } else {
            SessionManager::new(client, credentials, config.endpoints.clone())
        };
        Ok(Self::with_session(config, Arc::new(session)))
    }

    /// Coordinator around an existing session.
    pub fn with_session(config: CoordinatorConfig, session: Arc<SessionManager>) -> Self {
        let (state, _) = watch::channel(None);
        let (phase, _) = watch::channel(RefreshPhase::Idle);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                session: Mutex::new(Some(session)),
                op_lock: Mutex::new(()),
                state,
                phase,
                updates,
                last_update_success: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Configured display name, else the cloud-side name.
    pub fn name(&self) -> Option<String> {
        self.inner
            .config
            .name
            .clone()
            .or_else(|| self.state().and_then(|s| s.name.clone()))
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Fetch the first state, then spawn the periodic refresh task.
    ///
    /// A failed first refresh is returned and nothing is spawned.
    pub async fn start(&self) -> Result<Arc<DeviceState>, CoreError> {
        let state = self.refresh().await?;

        let period = self.inner.config.poll_interval;
        if !period.is_zero() {
            let coordinator = self.clone();
            let cancel = self.inner.cancel.child_token();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(refresh_task(coordinator, period, cancel)));
        }

        info!(
            mac = %self.inner.config.mac,
            poll_secs = period.as_secs(),
            "coordinator started"
        );
        Ok(state)
    }

    /// Stop the refresh task, wait for any in-flight operation, and release
    /// the session and its HTTP client. Later operations fail with
    /// [`CoreError::ShutDown`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let _guard = self.inner.op_lock.lock().await;
        self.inner.session.lock().await.take();
        self.inner.phase.send_replace(RefreshPhase::Idle);
        debug!("coordinator shut down");
    }

    // ── State observation ────────────────────────────────────────

    /// Last normalized state, if any refresh has succeeded yet.
    pub fn state(&self) -> Option<Arc<DeviceState>> {
        self.inner.state.borrow().clone()
    }

    /// `false` until the first successful refresh, and after any failed one.
    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::Acquire)
    }

    /// Watch the refresh state machine.
    pub fn phase(&self) -> watch::Receiver<RefreshPhase> {
        self.inner.phase.subscribe()
    }

    /// Every published state, tagged with why it changed.
    pub fn updates(&self) -> broadcast::Receiver<StateUpdate> {
        self.inner.updates.subscribe()
    }

    // ── Operations ───────────────────────────────────────────────

    /// Fetch and normalize the device, replacing the cached state.
    pub async fn refresh(&self) -> Result<Arc<DeviceState>, CoreError> {
        let _guard = self.inner.op_lock.lock().await;
        let state = self.fetch_state().await?;
        Ok(self.publish(state, UpdateKind::Polled))
    }

    /// Every device bound to the account.
    pub async fn list_devices(&self) -> Result<Vec<DeviceSummary>, CoreError> {
        let _guard = self.inner.op_lock.lock().await;
        let session = self.session().await?;
        let auth = session.ensure_token().await?;

        match session.client().list_devices(&auth).await {
            Ok(devices) => {
                debug!(count = devices.len(), "listed devices");
                Ok(devices)
            }
            Err(e) => {
                if e.is_auth_expired() {
                    session.invalidate().await;
                }
                Err(e.into())
            }
        }
    }

    /// Send a write and report whether the device acknowledged it.
    ///
    /// Failures are logged, never raised. A `false` result means the command
    /// was not confirmed; see [`try_send_control_command`](Self::try_send_control_command)
    /// for the error itself.
    pub async fn send_control_command(&self, change_set: &ChangeSet) -> bool {
        match self.try_send_control_command(change_set).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, mac = %self.inner.config.mac, "control command failed");
                false
            }
        }
    }

    /// Send a write: merge it into the cached state, transmit, then publish
    /// an optimistic state and reconcile it with one confirming refresh.
    ///
    /// A rejected token triggers a fresh login and a resend, at most
    /// [`MAX_SEND_ATTEMPTS`] sends in total. Bad credentials and every other
    /// failure end the write immediately.
    pub async fn try_send_control_command(&self, change_set: &ChangeSet) -> Result<(), CoreError> {
        change_set.validate()?;

        let _guard = self.inner.op_lock.lock().await;
        let session = self.session().await?;
        let config = &self.inner.config;
        let kind = change_set.kind();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let auth = session.ensure_token().await?;

            let cached = self.state();
            let body = payload::build(change_set, cached.as_deref(), &config.mac, &config.account);
            debug!(
                attempt,
                max_attempts = MAX_SEND_ATTEMPTS,
                %kind,
                fields = change_set.len(),
                "sending control command"
            );

            match session.client().control(&auth, &body).await {
                Ok(()) => break,
                Err(e) if e.is_auth_expired() => {
                    session.invalidate().await;
                    if attempt >= MAX_SEND_ATTEMPTS {
                        return Err(CoreError::TokenRejected { attempts: attempt });
                    }
                    warn!(attempt, "control token rejected, logging in again");
                    session.login().await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(attempt, "control command acknowledged");
        self.reconcile(change_set).await;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    async fn session(&self) -> Result<Arc<SessionManager>, CoreError> {
        self.inner
            .session
            .lock()
            .await
            .clone()
            .ok_or(CoreError::ShutDown)
    }

    fn set_phase(&self, phase: RefreshPhase) {
        self.inner.phase.send_replace(phase);
    }

    fn publish(&self, state: DeviceState, kind: UpdateKind) -> Arc<DeviceState> {
        let state = Arc::new(state);
        self.inner.state.send_replace(Some(Arc::clone(&state)));
        let _ = self.inner.updates.send(StateUpdate {
            kind,
            state: Arc::clone(&state),
            at: Utc::now(),
        });
        state
    }

    /// One refresh cycle. Records the outcome in `last_update_success` and
    /// always ends in [`RefreshPhase::Idle`]. Caller holds the operation lock.
    async fn fetch_state(&self) -> Result<DeviceState, CoreError> {
        let result = self.fetch_state_inner().await;
        self.set_phase(RefreshPhase::Idle);
        self.inner
            .last_update_success
            .store(result.is_ok(), Ordering::Release);
        result
    }

    async fn fetch_state_inner(&self) -> Result<DeviceState, CoreError> {
        let mac = &self.inner.config.mac;
        if mac.is_empty() {
            return Err(CoreError::Config {
                message: "no device MAC configured".into(),
            });
        }

        let session = self.session().await?;
        if !session.has_token().await {
            self.set_phase(RefreshPhase::Authenticating);
        }
        let auth = session.ensure_token().await?;

        self.set_phase(RefreshPhase::Fetching);
        let raw = match session.client().get_device_by_mac(&auth, mac).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.is_auth_expired() {
                    debug!("token rejected during refresh, clearing it");
                    session.invalidate().await;
                }
                return Err(e.into());
            }
        };

        self.set_phase(RefreshPhase::Normalizing);
        Ok(convert::normalize(&raw))
    }

    /// Optimistic patch, settle delay, confirming refresh.
    async fn reconcile(&self, change_set: &ChangeSet) {
        if let Some(current) = self.state() {
            let mut guess = (*current).clone();
            if change_set.apply_to(&mut guess) {
                self.publish(guess, UpdateKind::Optimistic);
            }
        }

        tokio::time::sleep(self.inner.config.settle_delay).await;

        match self.fetch_state().await {
            Ok(fresh) => {
                if self.state().as_deref() == Some(&fresh) {
                    debug!("device state matches the optimistic guess");
                } else {
                    self.publish(fresh, UpdateKind::Confirmed);
                }
            }
            Err(e) => {
                warn!(error = %e, "confirming refresh failed, keeping optimistic state");
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically refresh the device.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match coordinator.refresh().await {
                    Ok(_) => {}
                    Err(CoreError::ShutDown) => break,
                    Err(e) if e.is_transient() => {
                        warn!(error = %e, "periodic refresh failed, retrying next tick");
                    }
                    Err(e) => error!(error = %e, "periodic refresh failed"),
                }
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &CoordinatorConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
