use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, ConfirmationCheckRequest, ConfirmationCheckResponse, PollerError,
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Where the poller asks for appointments that newly became payable or
/// confirmed.
#[async_trait]
pub trait ConfirmationSource: Send + Sync {
    async fn fetch_new_confirmations(&self, known_ids: &[Uuid]) -> Result<Vec<Appointment>, PollerError>;
}

/// Invoked after new confirmations arrive so the caller can reload whatever
/// shows the "pay now" action.
pub trait RefreshHook: Send + Sync {
    fn refresh(&self);
}

impl<F> RefreshHook for F
where
    F: Fn() + Send + Sync,
{
    fn refresh(&self) {
        self()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationNotice {
    pub appointment_id: Uuid,
    pub doctor_name: String,
    pub price: Option<i64>,
    pub message: String,
}

impl ConfirmationNotice {
    pub fn from_appointment(appointment: &Appointment) -> Self {
        let doctor_name = appointment.doctor_name().unwrap_or("Your doctor").to_string();
        let message = match appointment.price {
            Some(price) => format!(
                "{} set the consultation price to {} KRW. Please complete your payment.",
                doctor_name, price
            ),
            None => format!("{} confirmed your appointment.", doctor_name),
        };

        Self {
            appointment_id: appointment.id,
            doctor_name,
            price: appointment.price,
            message,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PollerState {
    #[default]
    Idle,
    Notifying(ConfirmationNotice),
}

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub notification_ttl: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            notification_ttl: NOTIFICATION_TTL,
        }
    }
}

#[derive(Debug)]
enum PollerCommand {
    Dismiss,
    Shutdown,
}

pub struct ConfirmationPoller<S> {
    source: S,
    refresh: Arc<dyn RefreshHook>,
    config: PollerConfig,
    known_ids: HashSet<Uuid>,
    state: PollerState,
    hide_at: Option<Instant>,
}

impl<S: ConfirmationSource> ConfirmationPoller<S> {
    /// `initial_ids` are the appointments already awaiting payment when the
    /// page was loaded; they are never announced.
    pub fn new(
        source: S,
        initial_ids: impl IntoIterator<Item = Uuid>,
        refresh: Arc<dyn RefreshHook>,
    ) -> Self {
        Self {
            source,
            refresh,
            config: PollerConfig::default(),
            known_ids: initial_ids.into_iter().collect(),
            state: PollerState::Idle,
            hide_at: None,
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn known_ids(&self) -> &HashSet<Uuid> {
        &self.known_ids
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    /// One poll. Errors are logged and swallowed; the next tick tries again.
    pub async fn poll_once(&mut self) -> Option<ConfirmationNotice> {
        let known: Vec<Uuid> = self.known_ids.iter().copied().collect();

        match self.source.fetch_new_confirmations(&known).await {
            Ok(appointments) => self.apply(appointments),
            Err(e) => {
                warn!("Confirmation poll failed: {}", e);
                None
            }
        }
    }

    /// Announces the first unseen appointment and remembers all unseen ids.
    pub fn apply(&mut self, appointments: Vec<Appointment>) -> Option<ConfirmationNotice> {
        let fresh: Vec<&Appointment> = appointments.iter()
            .filter(|appointment| !self.known_ids.contains(&appointment.id))
            .collect();

        let notice = ConfirmationNotice::from_appointment(fresh.first()?);

        self.known_ids.extend(fresh.iter().map(|appointment| appointment.id));
        self.state = PollerState::Notifying(notice.clone());
        self.hide_at = Some(Instant::now() + self.config.notification_ttl);

        info!(
            "New confirmation for appointment {} ({} new, {} known)",
            notice.appointment_id, fresh.len(), self.known_ids.len()
        );

        self.refresh.refresh();

        Some(notice)
    }

    /// Hides the notification. The known-id set is kept.
    pub fn dismiss(&mut self) {
        self.state = PollerState::Idle;
        self.hide_at = None;
    }

    pub fn spawn(self) -> PollerHandle
    where
        S: 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(self.state.clone());

        let task = tokio::spawn(self.run(command_rx, state_tx));

        PollerHandle {
            commands: command_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    #[instrument(skip_all)]
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PollerCommand>,
        state_tx: watch::Sender<PollerState>,
    ) {
        debug!("Confirmation poller started with {} known ids", self.known_ids.len());

        let first_tick = Instant::now() + self.config.poll_interval;
        let mut ticker = time::interval_at(first_tick, self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let hide_at = self.hide_at;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(PollerCommand::Dismiss) => self.dismiss(),
                    Some(PollerCommand::Shutdown) | None => break,
                },
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = time::sleep_until(hide_at.unwrap_or_else(Instant::now)), if hide_at.is_some() => {
                    debug!("Notification expired");
                    self.dismiss();
                }
            }

            state_tx.send_replace(self.state.clone());
        }

        debug!("Confirmation poller stopped");
    }
}

/// Owner of a running poller. Dropping it cancels the loop.
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<PollerCommand>,
    state: watch::Receiver<PollerState>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn dismiss(&self) {
        if self.commands.send(PollerCommand::Dismiss).is_err() {
            debug!("Dismiss ignored, poller already stopped");
        }
    }

    pub fn state(&self) -> PollerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.clone()
    }

    pub async fn shutdown(mut self) {
        if self.commands.send(PollerCommand::Shutdown).is_err() {
            debug!("Poller already stopped");
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Confirmation poller ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Polls the API's confirmation-check endpoint on behalf of a signed-in
/// patient.
pub struct HttpConfirmationSource {
    client: Client,
    endpoint: String,
    auth_token: String,
}

impl HttpConfirmationSource {
    pub fn new(api_base_url: &str, auth_token: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!(
                "{}/appointments/confirmations/check",
                api_base_url.trim_end_matches('/')
            ),
            auth_token: auth_token.to_string(),
        }
    }
}

#[async_trait]
impl ConfirmationSource for HttpConfirmationSource {
    async fn fetch_new_confirmations(&self, known_ids: &[Uuid]) -> Result<Vec<Appointment>, PollerError> {
        let request = ConfirmationCheckRequest {
            known_ids: known_ids.to_vec(),
        };

        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PollerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PollerError::Network(format!("HTTP {}: {}", status, body)));
        }

        let body: ConfirmationCheckResponse = response.json().await
            .map_err(|e| PollerError::InvalidResponse(e.to_string()))?;

        Ok(body.appointments)
    }
}
