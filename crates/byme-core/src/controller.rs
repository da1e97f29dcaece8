// ── Controller: the update coordinator ──
//
// Lifecycle of one web server connection: initial login, the periodic
// poll cycle that keeps the device table fresh, and command writes.
// Poll failures never escape the loop; they are broadcast to subscribers
// and retried on the next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use byme_api::{SetValueOptionals, WebClient};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{Device, Platform};
use crate::project::Project;
use crate::store::DeviceMap;
use crate::stream::DeviceStream;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Coordinator state observable by consumers.
///
/// `Idle → Authenticating → Fetching → Ready`, then `Ready → Fetching`
/// on every tick. A failed cycle drops back to `Idle`; the next tick
/// logs in again if the session was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Authenticating,
    Fetching,
    Ready,
}

/// Broadcast after every poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// The table was republished. Sent even if no value changed.
    Updated { version: u64, device_count: usize },
    /// The cycle failed and will be retried on the next tick.
    Failed { message: String },
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    client: Arc<WebClient>,
    project: Arc<Project>,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<UpdateEvent>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller from configuration. Does NOT connect;
    /// call [`connect()`](Self::connect) to log in and start polling.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let client = Arc::new(WebClient::new(
            config.base_url()?,
            config.username.clone(),
            config.password.clone(),
            config.transport(),
        )?);
        let project = Arc::new(Project::new(
            Arc::clone(&client),
            config.overrides.clone(),
            config.ignore.clone(),
            config.global_channel_id.clone(),
        ));
        let (connection_state, _) = watch::channel(ConnectionState::Idle);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                project,
                connection_state,
                event_tx,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &Arc<WebClient> {
        &self.inner.client
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.inner.project
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Log in, load the device table and start the poll task.
    ///
    /// Unlike later cycles, failures here are returned: rejected
    /// credentials or an unreachable server should fail setup loudly.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.establish().await?;

        let ctrl = self.clone();
        let cancel = self.inner.cancel.clone();
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(refresh_task(ctrl, cancel)));

        info!(
            devices = self.inner.project.device_count(),
            "connected to controller"
        );
        Ok(())
    }

    async fn establish(&self) -> Result<(), CoreError> {
        self.set_state(ConnectionState::Authenticating);
        if let Err(e) = self.login().await {
            self.set_state(ConnectionState::Idle);
            return Err(e);
        }

        self.set_state(ConnectionState::Fetching);
        if let Err(e) = self.bounded_update(true).await {
            self.set_state(ConnectionState::Idle);
            return Err(e);
        }
        self.set_state(ConnectionState::Ready);
        Ok(())
    }

    /// Stop polling and drop the session.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.client.logout();
        self.set_state(ConnectionState::Idle);
        debug!("disconnected");
    }

    /// One-shot: connect without background polling, run `f`, disconnect.
    pub async fn oneshot<F, Fut, T>(config: ControllerConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let controller = Controller::new(config)?;
        controller.establish().await?;
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }

    // ── Poll cycle ───────────────────────────────────────────────

    /// Run one coordinator cycle.
    ///
    /// Logs in first if there is no session, then updates the table.
    /// The outcome is broadcast to subscribers either way.
    pub async fn poll_once(&self, forced: bool) -> Result<usize, CoreError> {
        let outcome = self.run_cycle(forced).await;
        match &outcome {
            Ok(device_count) => {
                self.set_state(ConnectionState::Ready);
                let _ = self.inner.event_tx.send(UpdateEvent::Updated {
                    version: self.inner.project.version(),
                    device_count: *device_count,
                });
            }
            Err(e) => {
                self.set_state(ConnectionState::Idle);
                let _ = self.inner.event_tx.send(UpdateEvent::Failed {
                    message: e.to_string(),
                });
            }
        }
        outcome
    }

    async fn run_cycle(&self, forced: bool) -> Result<usize, CoreError> {
        if !self.inner.client.is_logged() {
            self.set_state(ConnectionState::Authenticating);
            self.login().await?;
        }
        self.set_state(ConnectionState::Fetching);
        let devices = self.bounded_update(forced).await?;
        Ok(devices.len())
    }

    async fn login(&self) -> Result<(), CoreError> {
        let timeout = self.inner.config.timeout;
        let established = tokio::time::timeout(timeout, self.inner.client.check_login())
            .await
            .map_err(|_| timeout_error(timeout))??;
        if established {
            Ok(())
        } else {
            Err(CoreError::AuthenticationFailed {
                message: "controller accepted the login but returned no session".into(),
            })
        }
    }

    async fn bounded_update(&self, forced: bool) -> Result<Arc<DeviceMap>, CoreError> {
        let limit = self.inner.config.update_timeout;
        match tokio::time::timeout(limit, self.inner.project.update(forced)).await {
            Ok(result) => result,
            Err(_) => {
                // Same treatment as a transport failure: start over next tick.
                self.inner.client.clear_session();
                Err(timeout_error(limit))
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state);
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Set a named attribute of a device.
    ///
    /// The cached value changes before the request is sent, so readers
    /// see the new value at once. A failed write is corrected by the
    /// next poll.
    pub async fn change_state(
        &self,
        object_id: &str,
        status_name: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        let pending = self
            .inner
            .project
            .apply_local_state(object_id, status_name, value)
            .await?;
        let optionals = if pending.device_type == Platform::Climate {
            SetValueOptionals::SyncDb
        } else {
            SetValueOptionals::None
        };

        debug!(object_id, status_name, value, "sending state change");
        self.login().await?;
        self.inner
            .client
            .set_device_status(&pending.status_id, value, optionals)
            .await?;
        Ok(())
    }

    /// Re-read one device outside the poll cycle.
    pub async fn refresh_device(&self, object_id: &str) -> Result<Arc<Device>, CoreError> {
        self.login().await?;
        self.inner.project.refresh_device(object_id).await
    }

    /// Download the web server's CA certificate to the configured path.
    pub async fn install_certificate(&self) -> Result<bool, CoreError> {
        Ok(self.inner.client.install_certificate().await?)
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to coordinator state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to per-cycle update events.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Subscribe to device table snapshots.
    pub fn devices(&self) -> DeviceStream {
        self.inner.project.subscribe()
    }

    pub fn devices_snapshot(&self) -> Arc<DeviceMap> {
        self.inner.project.devices()
    }

    pub fn get_by_type(&self, platform: Platform) -> DeviceMap {
        self.inner.project.get_by_type(platform)
    }

    pub fn type_exists(&self, platform: Platform) -> Option<usize> {
        self.inner.project.type_exists(platform)
    }
}

fn timeout_error(limit: Duration) -> CoreError {
    CoreError::Timeout {
        timeout_secs: limit.as_secs(),
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Poll the controller until cancelled.
///
/// Sleeps after each cycle completes, so a slow cycle delays the next
/// one instead of overlapping it.
async fn refresh_task(controller: Controller, cancel: CancellationToken) {
    loop {
        let delay = controller
            .inner
            .config
            .poll_interval
            .for_device_count(controller.inner.project.device_count());

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        // A cycle in flight is abandoned on disconnect.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = controller.poll_once(false) => {
                if let Err(e) = result {
                    warn!(error = %e, "poll cycle failed, retrying next tick");
                }
            }
        }
    }
}
